/// The extension APIs the background coordinator talks to
/// Every call is awaitable and fails with a typed `BrowserError`

use crate::error::BrowserError;
use crate::tab_data::{
    ContentScript, TabId, TabInfo, TabQuery, WindowId, WindowInfo, WindowSpec, WindowUpdate,
    WorkArea,
};
use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait(?Send)]
pub trait Browser {
    // tabs
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<TabInfo>, BrowserError>;
    async fn send_to_tab(&self, tab: TabId, message: &Value) -> Result<Value, BrowserError>;
    async fn create_tab(&self, url: &str) -> Result<TabInfo, BrowserError>;
    async fn activate_tab(&self, tab: TabId) -> Result<TabInfo, BrowserError>;
    async fn remove_tab(&self, tab: TabId) -> Result<(), BrowserError>;
    /// Resolves once the tab next reports `status: "complete"`
    async fn wait_for_tab_complete(&self, tab: TabId) -> Result<(), BrowserError>;

    // scripting
    fn content_scripts(&self) -> Vec<ContentScript>;
    async fn execute_script_file(&self, tab: TabId, file: &str, all_frames: bool) -> Result<(), BrowserError>;
    async fn insert_css_file(&self, tab: TabId, file: &str, all_frames: bool) -> Result<(), BrowserError>;
    /// Posts the "show fallback UI" window message into every frame of the tab
    async fn post_fallback_signal(&self, tab: TabId) -> Result<(), BrowserError>;

    // windows
    async fn create_window(&self, spec: &WindowSpec) -> Result<WindowId, BrowserError>;
    async fn update_window(&self, window: WindowId, update: &WindowUpdate) -> Result<(), BrowserError>;
    /// Load `url` in the first tab of `window`
    async fn navigate_window(&self, window: WindowId, url: &str) -> Result<(), BrowserError>;
    async fn remove_window(&self, window: WindowId) -> Result<(), BrowserError>;
    async fn current_window(&self) -> Result<WindowInfo, BrowserError>;
    async fn primary_work_area(&self) -> Result<WorkArea, BrowserError>;
    /// Start forwarding window focus and removal events to the coordinator
    fn watch_windows(&self);

    // side panel
    async fn enable_side_panel(&self, tab: Option<TabId>) -> Result<(), BrowserError>;
    async fn open_side_panel(&self, tab: TabId) -> Result<(), BrowserError>;
    async fn close_side_panel(&self, tab: TabId) -> Result<(), BrowserError>;

    // action popup
    async fn set_action_popup(&self, page: &str) -> Result<(), BrowserError>;
    async fn open_action_popup(&self) -> Result<(), BrowserError>;

    // storage
    async fn storage_get(&self, keys: &[&str]) -> Result<Map<String, Value>, BrowserError>;
    async fn storage_set(&self, items: Map<String, Value>) -> Result<(), BrowserError>;

    // runtime
    fn extension_url(&self, path: &str) -> String;
    async fn runtime_message(&self, message: &Value) -> Result<(), BrowserError>;
    async fn fetch_text(&self, url: &str) -> Result<String, BrowserError>;
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, BrowserError>;

    // time
    async fn sleep(&self, ms: u32);
    fn now_ms(&self) -> f64;
}

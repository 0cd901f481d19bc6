/// In-memory browser used by the unit tests
use crate::browser::Browser;
use crate::error::BrowserError;
use crate::tab_data::{
    ContentScript, TabId, TabInfo, TabQuery, WindowId, WindowInfo, WindowSpec, WindowType,
    WindowUpdate, WorkArea,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pub const ALWAYS: usize = usize::MAX;

/// Every observable call the coordinator makes, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send { tab: TabId, message: Value, at: f64 },
    CreateTab(String),
    ActivateTab(TabId),
    RemoveTab(TabId),
    WaitForComplete(TabId),
    ExecuteScript { tab: TabId, file: String, all_frames: bool },
    InsertCss { tab: TabId, file: String, all_frames: bool },
    FallbackPost { tab: TabId, at: f64 },
    CreateWindow(WindowSpec),
    UpdateWindow(WindowId, WindowUpdate),
    RemoveWindow(WindowId),
    NavigateWindow(WindowId, String),
    EnableSidePanel(Option<TabId>),
    OpenSidePanel(TabId),
    CloseSidePanel(TabId),
    SetActionPopup(String),
    OpenActionPopup,
    StorageSet(Map<String, Value>),
    RuntimeMessage(Value),
    Sleep(u32),
    /// A slow API call completed and its caller resumed
    Resumed,
}

/// Pending on the first poll, ready on the second
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

pub struct FakeBrowser {
    tabs: RefCell<Vec<TabInfo>>,
    next_tab_id: Cell<TabId>,
    failing_sends: RefCell<HashMap<TabId, usize>>,
    windows: RefCell<Vec<WindowId>>,
    next_window_id: Cell<WindowId>,
    current_window: RefCell<Option<WindowInfo>>,
    work_area: Cell<Option<WorkArea>>,
    storage: RefCell<Map<String, Value>>,
    fetches: RefCell<HashMap<String, Result<Vec<u8>, BrowserError>>>,
    calls: RefCell<Vec<Call>>,
    clock: Cell<f64>,
    watch_count: Cell<usize>,
    fail_side_panel_open: Cell<bool>,
    fail_action_popup: Cell<bool>,
    slow_calls: Cell<bool>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        FakeBrowser {
            tabs: RefCell::new(Vec::new()),
            next_tab_id: Cell::new(1000),
            failing_sends: RefCell::new(HashMap::new()),
            windows: RefCell::new(Vec::new()),
            next_window_id: Cell::new(100),
            current_window: RefCell::new(None),
            work_area: Cell::new(Some(WorkArea::default())),
            storage: RefCell::new(Map::new()),
            fetches: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            clock: Cell::new(1_000_000.0),
            watch_count: Cell::new(0),
            fail_side_panel_open: Cell::new(false),
            fail_action_popup: Cell::new(false),
            slow_calls: Cell::new(false),
        }
    }

    // setup

    pub fn add_tab(&self, id: TabId, url: &str, active: bool) {
        let mut tab = TabInfo::new(id, url, active);
        tab.window_id = Some(1);
        self.tabs.borrow_mut().push(tab);
    }

    pub fn add_tab_info(&self, tab: TabInfo) {
        self.tabs.borrow_mut().push(tab);
    }

    pub fn close_tab(&self, id: TabId) {
        self.tabs.borrow_mut().retain(|t| t.id != Some(id));
    }

    pub fn set_active(&self, id: TabId) {
        for tab in self.tabs.borrow_mut().iter_mut() {
            tab.active = tab.id == Some(id);
        }
    }

    /// Make the next `times` sends to `tab` fail (`ALWAYS` for every send)
    pub fn fail_sends(&self, tab: TabId, times: usize) {
        self.failing_sends.borrow_mut().insert(tab, times);
    }

    pub fn set_work_area(&self, area: Option<WorkArea>) {
        self.work_area.set(area);
    }

    pub fn set_current_window(&self, id: WindowId, kind: WindowType) {
        *self.current_window.borrow_mut() = Some(WindowInfo { id, kind });
    }

    /// The user closed a window outside the extension's control
    pub fn close_window(&self, id: WindowId) {
        self.windows.borrow_mut().retain(|w| *w != id);
    }

    pub fn store(&self, key: &str, value: Value) {
        self.storage.borrow_mut().insert(key.to_string(), value);
    }

    pub fn set_fetch(&self, url: &str, result: Result<Vec<u8>, BrowserError>) {
        self.fetches.borrow_mut().insert(url.to_string(), result);
    }

    pub fn fail_side_panel_open(&self, fail: bool) {
        self.fail_side_panel_open.set(fail);
    }

    pub fn fail_action_popup(&self, fail: bool) {
        self.fail_action_popup.set(fail);
    }

    /// Make tab queries, storage writes and side panel calls yield before completing
    pub fn slow_calls(&self, slow: bool) {
        self.slow_calls.set(slow);
    }

    pub fn advance(&self, ms: f64) {
        self.clock.set(self.clock.get() + ms);
    }

    // inspection

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn stored(&self, key: &str) -> Option<Value> {
        self.storage.borrow().get(key).cloned()
    }

    /// Times at which messages were sent to `tab`
    pub fn send_times(&self, tab: TabId) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { tab: t, at, .. } if t == tab => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn messages_to(&self, tab: TabId) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { tab: t, message, .. } if t == tab => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn fallback_posts(&self, tab: TabId) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::FallbackPost { tab: t, at } if t == tab => Some(at),
                _ => None,
            })
            .collect()
    }

    pub fn created_windows(&self) -> Vec<WindowSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateWindow(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn window_updates(&self) -> Vec<(WindowId, WindowUpdate)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UpdateWindow(id, update) => Some((id, update)),
                _ => None,
            })
            .collect()
    }

    pub fn created_tab_urls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateTab(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn has_call(&self, call: &Call) -> bool {
        self.calls.borrow().contains(call)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn watch_count(&self) -> usize {
        self.watch_count.get()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    async fn settle(&self) {
        if self.slow_calls.get() {
            YieldOnce(false).await;
            self.record(Call::Resumed);
        }
    }

    fn find_tab(&self, id: TabId) -> Option<TabInfo> {
        self.tabs.borrow().iter().find(|t| t.id == Some(id)).cloned()
    }
}

#[async_trait(?Send)]
impl Browser for FakeBrowser {
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<TabInfo>, BrowserError> {
        self.settle().await;
        Ok(self
            .tabs
            .borrow()
            .iter()
            .filter(|t| query.active.is_none_or(|active| t.active == active))
            .cloned()
            .collect())
    }

    async fn send_to_tab(&self, tab: TabId, message: &Value) -> Result<Value, BrowserError> {
        self.record(Call::Send {
            tab,
            message: message.clone(),
            at: self.clock.get(),
        });

        if self.find_tab(tab).is_none() {
            return Err(BrowserError::NoReceiver);
        }

        let mut failing = self.failing_sends.borrow_mut();
        if let Some(remaining) = failing.get_mut(&tab) {
            if *remaining > 0 {
                if *remaining != ALWAYS {
                    *remaining -= 1;
                }
                return Err(BrowserError::NoReceiver);
            }
        }
        Ok(json!({ "ok": true }))
    }

    async fn create_tab(&self, url: &str) -> Result<TabInfo, BrowserError> {
        self.record(Call::CreateTab(url.to_string()));
        let id = self.next_tab_id.get();
        self.next_tab_id.set(id + 1);
        self.add_tab(id, url, false);
        self.find_tab(id).ok_or(BrowserError::NoReceiver)
    }

    async fn activate_tab(&self, tab: TabId) -> Result<TabInfo, BrowserError> {
        self.record(Call::ActivateTab(tab));
        if self.find_tab(tab).is_none() {
            return Err(BrowserError::api("tabs.update", format!("No tab with id: {}", tab)));
        }
        self.set_active(tab);
        self.find_tab(tab).ok_or(BrowserError::NoReceiver)
    }

    async fn remove_tab(&self, tab: TabId) -> Result<(), BrowserError> {
        self.record(Call::RemoveTab(tab));
        self.close_tab(tab);
        Ok(())
    }

    async fn wait_for_tab_complete(&self, tab: TabId) -> Result<(), BrowserError> {
        self.record(Call::WaitForComplete(tab));
        Ok(())
    }

    fn content_scripts(&self) -> Vec<ContentScript> {
        vec![
            ContentScript {
                js: vec!["content-scripts/content.js".to_string()],
                css: vec![],
                all_frames: true,
            },
            ContentScript {
                js: vec!["toolbar-mount.js".to_string()],
                css: vec!["content-scripts/toolbar.css".to_string()],
                all_frames: false,
            },
        ]
    }

    async fn execute_script_file(&self, tab: TabId, file: &str, all_frames: bool) -> Result<(), BrowserError> {
        self.record(Call::ExecuteScript {
            tab,
            file: file.to_string(),
            all_frames,
        });
        Ok(())
    }

    async fn insert_css_file(&self, tab: TabId, file: &str, all_frames: bool) -> Result<(), BrowserError> {
        self.record(Call::InsertCss {
            tab,
            file: file.to_string(),
            all_frames,
        });
        Ok(())
    }

    async fn post_fallback_signal(&self, tab: TabId) -> Result<(), BrowserError> {
        self.record(Call::FallbackPost {
            tab,
            at: self.clock.get(),
        });
        if self.find_tab(tab).is_none() {
            return Err(BrowserError::api("scripting.executeScript", "No tab"));
        }
        Ok(())
    }

    async fn create_window(&self, spec: &WindowSpec) -> Result<WindowId, BrowserError> {
        self.record(Call::CreateWindow(spec.clone()));
        let id = self.next_window_id.get();
        self.next_window_id.set(id + 1);
        self.windows.borrow_mut().push(id);
        Ok(id)
    }

    async fn update_window(&self, window: WindowId, update: &WindowUpdate) -> Result<(), BrowserError> {
        self.record(Call::UpdateWindow(window, *update));
        if self.windows.borrow().contains(&window) {
            Ok(())
        } else {
            Err(BrowserError::api("windows.update", format!("No window with id: {}", window)))
        }
    }

    async fn navigate_window(&self, window: WindowId, url: &str) -> Result<(), BrowserError> {
        self.record(Call::NavigateWindow(window, url.to_string()));
        if self.windows.borrow().contains(&window) {
            Ok(())
        } else {
            Err(BrowserError::api("tabs.query", format!("No window with id: {}", window)))
        }
    }

    async fn remove_window(&self, window: WindowId) -> Result<(), BrowserError> {
        self.record(Call::RemoveWindow(window));
        self.close_window(window);
        Ok(())
    }

    async fn current_window(&self) -> Result<WindowInfo, BrowserError> {
        self.current_window
            .borrow()
            .clone()
            .ok_or_else(|| BrowserError::api("windows.getCurrent", "no current window"))
    }

    async fn primary_work_area(&self) -> Result<WorkArea, BrowserError> {
        self.work_area
            .get()
            .ok_or_else(|| BrowserError::api("system.display.getInfo", "no displays"))
    }

    fn watch_windows(&self) {
        self.watch_count.set(self.watch_count.get() + 1);
    }

    async fn enable_side_panel(&self, tab: Option<TabId>) -> Result<(), BrowserError> {
        self.record(Call::EnableSidePanel(tab));
        self.settle().await;
        Ok(())
    }

    async fn open_side_panel(&self, tab: TabId) -> Result<(), BrowserError> {
        self.record(Call::OpenSidePanel(tab));
        self.settle().await;
        if self.fail_side_panel_open.get() {
            return Err(BrowserError::api(
                "sidePanel.open",
                "`sidePanel.open()` may only be called in response to a user gesture.",
            ));
        }
        Ok(())
    }

    async fn close_side_panel(&self, tab: TabId) -> Result<(), BrowserError> {
        self.record(Call::CloseSidePanel(tab));
        Ok(())
    }

    async fn set_action_popup(&self, page: &str) -> Result<(), BrowserError> {
        self.record(Call::SetActionPopup(page.to_string()));
        Ok(())
    }

    async fn open_action_popup(&self) -> Result<(), BrowserError> {
        self.record(Call::OpenActionPopup);
        if self.fail_action_popup.get() {
            return Err(BrowserError::api("action.openPopup", "no user gesture"));
        }
        Ok(())
    }

    async fn storage_get(&self, keys: &[&str]) -> Result<Map<String, Value>, BrowserError> {
        let storage = self.storage.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| storage.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn storage_set(&self, items: Map<String, Value>) -> Result<(), BrowserError> {
        self.record(Call::StorageSet(items.clone()));
        self.settle().await;
        self.storage.borrow_mut().extend(items);
        Ok(())
    }

    fn extension_url(&self, path: &str) -> String {
        format!("chrome-extension://fake-id/{}", path.trim_start_matches('/'))
    }

    async fn runtime_message(&self, message: &Value) -> Result<(), BrowserError> {
        self.record(Call::RuntimeMessage(message.clone()));
        Ok(())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, BrowserError> {
        let bytes = self.fetch_bytes(url).await?;
        String::from_utf8(bytes).map_err(|e| BrowserError::Decode(e.to_string()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, BrowserError> {
        self.fetches
            .borrow()
            .get(url)
            .cloned()
            .unwrap_or(Err(BrowserError::Http(404)))
    }

    async fn sleep(&self, ms: u32) {
        self.record(Call::Sleep(ms));
        self.advance(ms as f64);
    }

    fn now_ms(&self) -> f64 {
        self.clock.get()
    }
}

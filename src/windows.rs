/// Floating tool window and alert window, one of each at most

use crate::browser::Browser;
use crate::coordinator::Coordinator;
use crate::placement::{
    ALERT_HEIGHT, ALERT_WIDTH, DEFAULT_CENTERED_PERCENT, alert_bounds, alert_fingerprint,
    anchored_bounds, centered_bounds, toolbar_anchor,
};
use crate::storage::{self, ToolConfig};
use crate::tab_data::{Anchor, Bounds, WindowId, WindowSpec, WindowState, WindowType, WindowUpdate, WorkArea};
use crate::tools::{AlertPayload, Embedding, Tool, alert_url, tool_url};

/// Size used when a tool window is opened next to the toolbar or a click
pub const TOOL_WINDOW_PERCENT: f64 = 0.4;

#[derive(Debug, Default)]
pub struct PopupHandles {
    pub tool: Option<WindowId>,
    pub alert: Option<WindowId>,
    /// Page last loaded into each window
    tool_url: Option<String>,
    alert_url: Option<String>,
    listeners_installed: bool,
}

/// Which handle a window operation reuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Tool,
    Alert,
}

impl PopupHandles {
    fn get(&self, slot: Slot) -> Option<WindowId> {
        match slot {
            Slot::Tool => self.tool,
            Slot::Alert => self.alert,
        }
    }

    fn url(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Tool => self.tool_url.as_deref(),
            Slot::Alert => self.alert_url.as_deref(),
        }
    }

    fn set(&mut self, slot: Slot, window: Option<(WindowId, String)>) {
        let (id, url) = window.unzip();
        match slot {
            Slot::Tool => (self.tool, self.tool_url) = (id, url),
            Slot::Alert => (self.alert, self.alert_url) = (id, url),
        }
    }

    /// Clear whichever handle points at a window that was closed
    pub fn forget(&mut self, window: WindowId) {
        if self.tool == Some(window) {
            self.set(Slot::Tool, None);
        }
        if self.alert == Some(window) {
            self.set(Slot::Alert, None);
        }
    }
}

impl<B: Browser> Coordinator<B> {
    async fn work_area(&self) -> WorkArea {
        match self.browser.primary_work_area().await {
            Ok(area) => area,
            Err(err) => {
                log::debug!("display query failed, using default work area: {}", err);
                WorkArea::default()
            }
        }
    }

    async fn tool_config(&self) -> ToolConfig {
        storage::load(&self.browser, ToolConfig::KEYS)
            .await
            .unwrap_or_else(|err| {
                log::warn!("could not read tool settings: {}", err);
                ToolConfig::default()
            })
    }

    /// Move the window in `slot` to `bounds` showing `url`, or create it if it is gone
    async fn place_window(&self, slot: Slot, url: String, bounds: Bounds) -> Option<WindowId> {
        let existing = self.popups.borrow().get(slot);

        if let Some(id) = existing {
            match self.browser.update_window(id, &WindowUpdate::place(bounds)).await {
                Ok(()) => {
                    log::debug!("reused {:?} window {}", slot, id);
                    let stale = self.popups.borrow().url(slot) != Some(url.as_str());
                    if stale {
                        match self.browser.navigate_window(id, &url).await {
                            Ok(()) => self.popups.borrow_mut().set(slot, Some((id, url))),
                            Err(err) => log::warn!("could not load {} in window {}: {}", url, id, err),
                        }
                    }
                    return Some(id);
                }
                Err(err) => {
                    log::debug!("{:?} window {} is gone ({}); creating a new one", slot, id, err);
                    self.popups.borrow_mut().set(slot, None);
                }
            }
        }

        let mut spec = WindowSpec::popup(url, Some(bounds));
        spec.state = Some(WindowState::Normal);
        match self.browser.create_window(&spec).await {
            Ok(id) => {
                self.popups.borrow_mut().set(slot, Some((id, spec.url)));
                self.ensure_window_listeners();
                Some(id)
            }
            Err(err) => {
                log::warn!("windows.create failed: {}", err);
                None
            }
        }
    }

    /// Open `tool` in a floating window beside `anchor`
    pub async fn open_tool_near(&self, tool: &Tool, anchor: Anchor, percent: f64) -> Option<WindowId> {
        let url = tool_url(&self.tool_config().await, tool, Embedding::Window);
        let bounds = anchored_bounds(&self.work_area().await, anchor, percent);
        log::debug!("opening {} at {:?}", tool, bounds);
        self.place_window(Slot::Tool, url, bounds).await
    }

    /// Open `tool` next to the floating toolbar on the right edge of the screen
    pub async fn open_tool_window(&self, tool: &Tool) -> Option<WindowId> {
        let anchor = toolbar_anchor(&self.work_area().await);
        self.open_tool_near(tool, anchor, TOOL_WINDOW_PERCENT).await
    }

    /// Open `tool` in a large centered window
    pub async fn open_tool_centered(&self, tool: &Tool, percent: Option<f64>) -> Option<WindowId> {
        let url = tool_url(&self.tool_config().await, tool, Embedding::Popup);
        let bounds = centered_bounds(&self.work_area().await, percent.unwrap_or(DEFAULT_CENTERED_PERCENT));
        self.place_window(Slot::Tool, url, bounds).await
    }

    /// Show an alert window unless the same alert was shown within the cooldown
    ///
    /// Returns whether a window operation happened.
    pub async fn open_alert(&self, alert: &AlertPayload) -> bool {
        let admitted = self
            .alerts
            .borrow_mut()
            .admit(alert_fingerprint(alert), self.browser.now_ms());
        if !admitted {
            log::debug!("duplicate alert suppressed");
            return false;
        }

        let url = alert_url(&self.tool_config().await, alert, ALERT_WIDTH, ALERT_HEIGHT);
        let bounds = alert_bounds(&self.work_area().await);
        self.place_window(Slot::Alert, url, bounds).await.is_some()
    }

    /// Open a plain popup window that is not tracked by either handle
    pub async fn open_untracked_popup(&self, url: String, width: i32, height: i32) -> Option<WindowId> {
        let spec = WindowSpec {
            url,
            kind: WindowType::Popup,
            state: None,
            bounds: Some(Bounds { left: 0, top: 0, width, height }),
            focused: true,
        };
        match self.browser.create_window(&spec).await {
            Ok(id) => Some(id),
            Err(err) => {
                log::warn!("windows.create failed: {}", err);
                None
            }
        }
    }

    /// Install the focus and removal listeners, at most once per process
    pub fn ensure_window_listeners(&self) {
        let mut popups = self.popups.borrow_mut();
        if popups.listeners_installed {
            return;
        }
        popups.listeners_installed = true;
        drop(popups);
        self.browser.watch_windows();
    }

    /// `windows.onFocusChanged`: close the tool window when focus moves to another window
    pub async fn on_window_focus_changed(&self, focused: Option<WindowId>) {
        let Some(focused) = focused else {
            return;
        };
        if !self.auto_close_on_blur.get() {
            return;
        }
        let Some(tool) = self.popups.borrow().tool else {
            return;
        };
        if focused == tool {
            return;
        }

        log::debug!("tool window {} lost focus to {}; closing", tool, focused);
        if let Err(err) = self.browser.remove_window(tool).await {
            log::debug!("windows.remove({}) failed: {}", tool, err);
        }
        self.popups.borrow_mut().forget(tool);
    }

    /// `windows.onRemoved`
    pub fn on_window_removed(&self, window: WindowId) {
        self.popups.borrow_mut().forget(window);
    }

    /// Resize the focused window, but only when it is one of our popups
    pub async fn resize_focused_popup(&self, width: Option<f64>, height: Option<f64>) {
        let window = match self.browser.current_window().await {
            Ok(window) => window,
            Err(err) => {
                log::debug!("windows.getCurrent failed: {}", err);
                return;
            }
        };
        if window.kind != WindowType::Popup {
            return;
        }

        let update = WindowUpdate {
            width: width.map(|w| w.floor() as i32),
            height: height.map(|h| h.floor() as i32),
            ..WindowUpdate::default()
        };
        if update.is_empty() {
            return;
        }
        if let Err(err) = self.browser.update_window(window.id, &update).await {
            log::warn!("resize failed: {}", err);
        }
    }

    pub fn tool_window(&self) -> Option<WindowId> {
        self.popups.borrow().tool
    }

    pub fn alert_window(&self) -> Option<WindowId> {
        self.popups.borrow().alert
    }
}

/// Side panel open/closed state per tab
use crate::browser::Browser;
use crate::coordinator::Coordinator;
use crate::storage::keys;
use crate::tab_data::{TabId, TabQuery};
use crate::tools::Tool;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelState {
    Closed,
    Open(Tool),
}

/// What a toggle request should do given the current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Open(Tool),
    Close,
}

#[derive(Debug, Default)]
pub struct SidePanelTracker {
    panels: HashMap<TabId, Tool>,
}

impl SidePanelTracker {
    pub fn new() -> Self {
        SidePanelTracker::default()
    }

    pub fn state(&self, tab: TabId) -> PanelState {
        match self.panels.get(&tab) {
            Some(tool) => PanelState::Open(tool.clone()),
            None => PanelState::Closed,
        }
    }

    /// Toggling the tool that is already showing closes the panel; anything else opens `tool`
    pub fn plan_toggle(&self, tab: TabId, tool: &Tool) -> Transition {
        match self.panels.get(&tab) {
            Some(open) if open == tool => Transition::Close,
            _ => Transition::Open(tool.clone()),
        }
    }

    pub fn opened(&mut self, tab: TabId, tool: Tool) {
        self.panels.insert(tab, tool);
    }

    pub fn closed(&mut self, tab: TabId) {
        self.panels.remove(&tab);
    }

    /// Drop all state for a tab that no longer exists
    pub fn forget(&mut self, tab: TabId) {
        self.panels.remove(&tab);
    }

    pub fn open_count(&self) -> usize {
        self.panels.len()
    }
}

pub const DEFAULT_PANEL_TOOL: Tool = Tool::ControllerTesting;

impl<B: Browser> Coordinator<B> {
    /// Resolve the tab a side panel request is about
    ///
    /// Order: explicit id, current active tab, last active tab, then a live
    /// query of the active tab in the current window.
    pub async fn resolve_tab(&self, explicit: Option<TabId>) -> Option<TabId> {
        if let Some(tab) = explicit.or_else(|| self.active.borrow().implicit_target()) {
            return Some(tab);
        }
        log::debug!("could not resolve tab id immediately; querying");
        self.query_active_tab(TabQuery::active_in_current_window()).await
    }

    /// Open `tool` in the side panel, or close it if that tool is already showing
    pub async fn toggle_side_panel(&self, tab: Option<TabId>, tool: Option<Tool>) -> Option<PanelState> {
        let tool = tool.unwrap_or(DEFAULT_PANEL_TOOL);
        let Some(tab) = self.resolve_tab(tab).await else {
            log::warn!("unable to resolve a tab for the side panel ({})", tool);
            return None;
        };

        let transition = self.side_panels.borrow().plan_toggle(tab, &tool);
        match transition {
            Transition::Close => self.close_side_panel(tab).await,
            Transition::Open(tool) => self.open_side_panel(tab, tool).await,
        }
        Some(self.side_panels.borrow().state(tab))
    }

    /// Explicit close; the tracker ends up `Closed` whatever it was before
    pub async fn close_side_panel(&self, tab: TabId) {
        if let Err(err) = self.browser.close_side_panel(tab).await {
            log::warn!("sidePanel close error: {}", err);
        }
        self.side_panels.borrow_mut().closed(tab);
        log::debug!("side panel closed for tab {}", tab);
    }

    /// Point the panel at `tool` and open it for `tab`
    ///
    /// `sidePanel.open` is only honoured while the user gesture that caused the
    /// request lasts, so all three calls start in the same poll and none is
    /// awaited before `open` has been issued.
    pub async fn open_side_panel(&self, tab: TabId, tool: Tool) {
        // The panel page watches this key and renders whichever tool it names
        let mut items = Map::new();
        items.insert(keys::SIDE_PANEL_TOOL.to_string(), Value::String(tool.to_string()));
        items.insert(keys::SIDE_PANEL_URL.to_string(), Value::Null);

        let (stored, enabled, opened) = futures::join!(
            self.browser.storage_set(items),
            self.browser.enable_side_panel(Some(tab)),
            self.browser.open_side_panel(tab),
        );

        if let Err(err) = stored {
            log::warn!("failed to store side panel tool {}: {}", tool, err);
        }
        if let Err(err) = enabled {
            log::warn!("sidePanel setOptions error: {}", err);
        }
        match opened {
            Ok(()) => {
                log::debug!("side panel opened for tool {} on tab {}", tool, tab);
                self.side_panels.borrow_mut().opened(tab, tool);
            }
            Err(err) => log::warn!("sidePanel open error: {}", err),
        }
    }

    /// Toggle a tool for the active tab of a window
    pub(crate) async fn toggle_for_active_tab(&self, query: TabQuery, tool: Tool) -> Option<PanelState> {
        match self.query_active_tab(query).await {
            Some(tab) => self.toggle_side_panel(Some(tab), Some(tool)).await,
            None => {
                log::warn!("no active tab to open {} in", tool);
                None
            }
        }
    }

    pub fn side_panel_state(&self, tab: TabId) -> PanelState {
        self.side_panels.borrow().state(tab)
    }
}

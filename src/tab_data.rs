/// Data structures exchanged with the tabs, windows and display APIs
use serde::{Deserialize, Serialize};

pub type TabId = u32;
pub type WindowId = i32;

/// Information about a browser tab
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabInfo {
    pub id: Option<TabId>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub fav_icon_url: Option<String>,
    pub active: bool,
    pub window_id: Option<WindowId>,
    pub last_accessed: Option<f64>,
}

impl TabInfo {
    pub fn new(id: TabId, url: &str, active: bool) -> TabInfo {
        TabInfo {
            id: Some(id),
            url: Some(url.to_string()),
            active,
            ..TabInfo::default()
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }
}

/// Filter passed to `tabs.query`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_window: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_focused_window: Option<bool>,
}

impl TabQuery {
    pub fn all() -> Self {
        TabQuery::default()
    }

    pub fn active_in_current_window() -> Self {
        TabQuery {
            active: Some(true),
            current_window: Some(true),
            ..TabQuery::default()
        }
    }

    pub fn active_in_last_focused_window() -> Self {
        TabQuery {
            active: Some(true),
            last_focused_window: Some(true),
            ..TabQuery::default()
        }
    }

    pub fn last_focused_window() -> Self {
        TabQuery {
            last_focused_window: Some(true),
            ..TabQuery::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    #[default]
    Normal,
    Popup,
    Panel,
    App,
    Devtools,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub id: WindowId,
    #[serde(default, rename = "type")]
    pub kind: WindowType,
}

/// Usable area of a display (excludes task bars and docks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorkArea {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for WorkArea {
    fn default() -> Self {
        WorkArea {
            left: 0,
            top: 0,
            width: 1280,
            height: 800,
        }
    }
}

/// A screen point a tool window is placed next to
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Window position and size in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Normal,
}

/// Arguments for `windows.create`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSpec {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: WindowType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WindowState>,
    #[serde(flatten)]
    pub bounds: Option<Bounds>,
    pub focused: bool,
}

impl WindowSpec {
    pub fn popup(url: String, bounds: Option<Bounds>) -> Self {
        WindowSpec {
            url,
            kind: WindowType::Popup,
            state: None,
            bounds,
            focused: true,
        }
    }
}

/// Arguments for `windows.update`; unset fields are left alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WindowState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused: Option<bool>,
}

impl WindowUpdate {
    /// Bring a reused window back to the front at new bounds
    pub fn place(bounds: Bounds) -> Self {
        WindowUpdate {
            state: Some(WindowState::Normal),
            left: Some(bounds.left),
            top: Some(bounds.top),
            width: Some(bounds.width),
            height: Some(bounds.height),
            focused: Some(true),
        }
    }

    pub fn focus() -> Self {
        WindowUpdate {
            focused: Some(true),
            ..WindowUpdate::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == WindowUpdate::default()
    }
}

/// A content script entry declared in the manifest
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContentScript {
    pub js: Vec<String>,
    pub css: Vec<String>,
    pub all_frames: bool,
}

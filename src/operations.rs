/// Tab list operations: summaries for the command palette, POS tab lookup

use crate::domain::is_pos_url;
use crate::tab_data::{TabId, TabInfo, WindowId};
use serde::Serialize;

/// The fields of a tab the command palette lists
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSummary {
    pub id: Option<TabId>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub fav_icon_url: Option<String>,
    pub active: bool,
    pub window_id: Option<WindowId>,
}

impl From<&TabInfo> for TabSummary {
    fn from(tab: &TabInfo) -> Self {
        TabSummary {
            id: tab.id,
            title: tab.title.clone(),
            url: tab.url.clone(),
            fav_icon_url: tab.fav_icon_url.clone(),
            active: tab.active,
            window_id: tab.window_id,
        }
    }
}

pub fn summarize_tabs(tabs: &[TabInfo]) -> Vec<TabSummary> {
    tabs.iter().map(TabSummary::from).collect()
}

/// Most recently accessed point-of-sale tab (tabs never accessed count as oldest)
pub fn most_recent_pos_tab(tabs: &[TabInfo]) -> Option<&TabInfo> {
    let mut pos_tabs: Vec<&TabInfo> = tabs.iter().filter(|tab| is_pos_url(tab.url())).collect();

    // Stable sort keeps tab order among equal timestamps
    pos_tabs.sort_by(|a, b| {
        let a_time = a.last_accessed.unwrap_or(0.0);
        let b_time = b.last_accessed.unwrap_or(0.0);
        b_time.total_cmp(&a_time)
    });

    pos_tabs.into_iter().next()
}

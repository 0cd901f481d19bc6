/// Tracks which tab is active, and which was active before it
use crate::tab_data::TabId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveTabTracker {
    current: Option<TabId>,
    last: Option<TabId>,
    previous: Option<TabId>,
}

impl ActiveTabTracker {
    pub fn new() -> Self {
        ActiveTabTracker::default()
    }

    pub fn current(&self) -> Option<TabId> {
        self.current
    }

    pub fn last(&self) -> Option<TabId> {
        self.last
    }

    /// The tab that was active before the last switch
    pub fn previous(&self) -> Option<TabId> {
        self.previous
    }

    /// Record that `tab` became the active tab
    pub fn activated(&mut self, tab: TabId) {
        if let Some(last) = self.last {
            if last != tab {
                self.previous = Some(last);
            }
        }
        self.last = Some(tab);
        self.current = Some(tab);
    }

    /// Seed the current tab without touching history (startup query)
    pub fn set_current(&mut self, tab: Option<TabId>) {
        self.current = tab;
    }

    /// Forget a closed tab; returns true when the current tab must be re-resolved
    pub fn removed(&mut self, tab: TabId) -> bool {
        if self.previous == Some(tab) {
            self.previous = None;
        }
        if self.last == Some(tab) {
            self.last = None;
        }
        if self.current == Some(tab) {
            self.current = None;
            return true;
        }
        false
    }

    /// Best guess at the tab a request without an explicit target is about
    pub fn implicit_target(&self) -> Option<TabId> {
        self.current.or(self.last)
    }
}

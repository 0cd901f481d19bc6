/// Background coordinator: one owned object holding all worker state
/// State cells are never borrowed across an `.await`

use crate::browser::Browser;
use crate::placement::AlertGate;
use crate::side_panel::SidePanelTracker;
use crate::storage::{self, Settings, keys};
use crate::tab_data::{TabId, TabQuery};
use crate::tracker::ActiveTabTracker;
use crate::windows::PopupHandles;
use serde_json::Value;
use std::cell::{Cell, RefCell};

pub const ONBOARDING_PATH: &str = "/tools/preview";

/// Why `runtime.onInstalled` fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
    Other,
}

impl InstallReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "install" => InstallReason::Install,
            "update" => InstallReason::Update,
            _ => InstallReason::Other,
        }
    }
}

pub struct Coordinator<B: Browser> {
    pub(crate) browser: B,
    pub(crate) active: RefCell<ActiveTabTracker>,
    pub(crate) side_panels: RefCell<SidePanelTracker>,
    pub(crate) popups: RefCell<PopupHandles>,
    pub(crate) alerts: RefCell<AlertGate>,
    pub(crate) auto_close_on_blur: Cell<bool>,
    pub(crate) debug: Cell<bool>,
}

impl<B: Browser> Coordinator<B> {
    pub fn new(browser: B) -> Self {
        Coordinator {
            browser,
            active: RefCell::new(ActiveTabTracker::new()),
            side_panels: RefCell::new(SidePanelTracker::new()),
            popups: RefCell::new(PopupHandles::default()),
            alerts: RefCell::new(AlertGate::new()),
            auto_close_on_blur: Cell::new(true),
            debug: Cell::new(true),
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn active_tabs(&self) -> ActiveTabTracker {
        *self.active.borrow()
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.get()
    }

    pub fn set_auto_close_on_blur(&self, enabled: bool) {
        self.auto_close_on_blur.set(enabled);
    }

    /// Switch verbose logging on or off
    pub fn set_debug(&self, enabled: bool) {
        self.debug.set(enabled);
        log::set_max_level(if enabled {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        });
    }

    /// Seed the active tab from a live query when the worker boots
    pub async fn initialize(&self) {
        log::debug!("service worker booted");
        if let Some(tab) = self.query_active_tab(TabQuery::active_in_last_focused_window()).await {
            log::debug!("initial active tab {}", tab);
            self.active.borrow_mut().set_current(Some(tab));
        }
    }

    /// `runtime.onInstalled`: seed defaults exactly once
    pub async fn on_installed(&self, reason: InstallReason) {
        log::debug!("onInstalled {:?}", reason);

        let items = match reason {
            InstallReason::Install => Settings::default().to_items(),
            _ => match self.browser.storage_get(Settings::KEYS).await {
                Ok(existing) => Settings::missing_defaults(&existing),
                Err(err) => {
                    log::warn!("could not read settings to fill defaults: {}", err);
                    return;
                }
            },
        };

        if !items.is_empty() {
            if let Err(err) = self.browser.storage_set(items).await {
                log::warn!("failed to seed default settings: {}", err);
            }
        }

        if reason == InstallReason::Install {
            let url = format!("{}{}", storage::DEFAULT_SCANNER_BASE_URL, ONBOARDING_PATH);
            if let Err(err) = self.browser.create_tab(&url).await {
                log::warn!("failed to open welcome tab: {}", err);
            }
        }
    }

    /// `runtime.onStartup`: pin the hosted tool URL and load the debug flag
    pub async fn on_startup(&self) {
        let mut items = serde_json::Map::new();
        items.insert(
            keys::SCANNER_BASE_URL.to_string(),
            Value::String(storage::DEFAULT_SCANNER_BASE_URL.to_string()),
        );
        if let Err(err) = self.browser.storage_set(items).await {
            log::warn!("failed to reset scannerBaseUrl: {}", err);
        }

        self.load_debug_flag().await;
    }

    /// Apply the persisted `debugLogs` switch (verbose when unset)
    pub async fn load_debug_flag(&self) {
        let debug = match self.browser.storage_get(&[keys::DEBUG_LOGS]).await {
            Ok(items) => items.get(keys::DEBUG_LOGS).and_then(Value::as_bool).unwrap_or(true),
            Err(_) => true,
        };
        self.set_debug(debug);
        log::debug!("debug flag loaded: {}", debug);
    }

    /// `tabs.onActivated`
    pub fn on_tab_activated(&self, tab: TabId) {
        self.active.borrow_mut().activated(tab);
        log::debug!("active tab changed to {}", tab);
    }

    /// `tabs.onRemoved`: purge every piece of per-tab state
    pub async fn on_tab_removed(&self, tab: TabId) {
        self.side_panels.borrow_mut().forget(tab);
        let lost_current = self.active.borrow_mut().removed(tab);

        if lost_current {
            let replacement = self.query_active_tab(TabQuery::active_in_last_focused_window()).await;
            self.active.borrow_mut().set_current(replacement);
        }
    }

    /// Id of the first tab matching `query`
    pub(crate) async fn query_active_tab(&self, query: TabQuery) -> Option<TabId> {
        match self.browser.query_tabs(query).await {
            Ok(tabs) => tabs.into_iter().find_map(|t| t.id),
            Err(err) => {
                log::warn!("tabs.query failed: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowser;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_install_seeds_defaults_and_opens_onboarding() {
        let coordinator = Coordinator::new(FakeBrowser::new());

        block_on(coordinator.on_installed(InstallReason::Install));

        let browser = coordinator.browser();
        assert_eq!(browser.stored("scannerBaseUrl"), Some(json!("https://paymore-extension.vercel.app")));
        assert_eq!(browser.stored("globalEnabled"), Some(json!(true)));
        assert_eq!(
            browser.created_tab_urls(),
            vec!["https://paymore-extension.vercel.app/tools/preview".to_string()]
        );
    }

    #[test]
    fn test_update_only_fills_missing_keys() {
        let browser = FakeBrowser::new();
        browser.store("pmSelectedStore", json!("Taylor"));
        browser.store("disabledSites", json!(["ebay.com"]));
        let coordinator = Coordinator::new(browser);

        block_on(coordinator.on_installed(InstallReason::Update));

        let browser = coordinator.browser();
        assert_eq!(browser.stored("pmSelectedStore"), Some(json!("Taylor")));
        assert_eq!(browser.stored("disabledSites"), Some(json!(["ebay.com"])));
        assert_eq!(browser.stored("isEnabled"), Some(json!(true)));
        assert!(browser.created_tab_urls().is_empty());
    }

    #[test]
    fn test_startup_loads_debug_flag() {
        let browser = FakeBrowser::new();
        browser.store("debugLogs", json!(false));
        browser.store("scannerBaseUrl", json!("http://localhost:3000"));
        let coordinator = Coordinator::new(browser);

        block_on(coordinator.on_startup());

        assert!(!coordinator.debug_enabled());
        assert_eq!(
            coordinator.browser().stored("scannerBaseUrl"),
            Some(json!("https://paymore-extension.vercel.app"))
        );
    }

    #[test]
    fn test_initialize_seeds_current_tab() {
        let browser = FakeBrowser::new();
        browser.add_tab(5, "https://pos.paymore.tech", true);
        let coordinator = Coordinator::new(browser);

        block_on(coordinator.initialize());

        assert_eq!(coordinator.active_tabs().current(), Some(5));
        assert_eq!(coordinator.active_tabs().previous(), None);
    }

    #[test]
    fn test_removing_current_tab_requeries() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://a.example", false);
        browser.add_tab(2, "https://b.example", true);
        let coordinator = Coordinator::new(browser);
        coordinator.on_tab_activated(1);
        coordinator.on_tab_activated(2);

        coordinator.browser().close_tab(2);
        coordinator.browser().set_active(1);
        block_on(coordinator.on_tab_removed(2));

        let active = coordinator.active_tabs();
        assert_eq!(active.current(), Some(1));
        assert_eq!(active.last(), None);
        assert_eq!(active.previous(), Some(1));
    }
}

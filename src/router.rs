/// Dispatch of decoded requests to the coordinator subsystems

use crate::browser::Browser;
use crate::coordinator::Coordinator;
use crate::messages::{Broadcast, Request, Response, tab_messages};
use crate::operations::{most_recent_pos_tab, summarize_tabs};
use crate::storage::{self, SiteConfig, StoreSelection, keys};
use crate::tab_data::{TabId, TabQuery, WindowUpdate};
use crate::tools::Tool;
use crate::windows::TOOL_WINDOW_PERCENT;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::FutureExt;
use serde_json::{Map, Value, json};
use url::Url;

pub const QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";
pub const POS_URL: &str = "https://pos.paymore.tech";

/// URL of a PNG QR code for `text`, `size` pixels square
pub fn qr_code_url(text: &str, size: u32) -> String {
    let dimensions = format!("{}x{}", size, size);
    match Url::parse_with_params(QR_SERVICE_URL, &[("size", dimensions.as_str()), ("data", text)]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}?size={}", QR_SERVICE_URL, dimensions),
    }
}

fn png_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

impl<B: Browser> Coordinator<B> {
    /// Decode and handle one inbound runtime message
    pub async fn handle_message(&self, message: &Value, sender_tab: Option<TabId>) -> Response {
        match Request::decode(message) {
            Ok(request) => self.dispatch(request, sender_tab).await,
            Err(err) => {
                log::debug!("rejected message {}: {}", message, err);
                Response::from(err)
            }
        }
    }

    /// Answer a request whose handler never waits on the browser
    ///
    /// Returns `None` when the handler awaits browser work and the reply
    /// channel has to stay open for it.
    pub fn respond_now(&self, message: &Value, sender_tab: Option<TabId>) -> Option<Response> {
        let request = match Request::decode(message) {
            Ok(request) => request,
            Err(err) => {
                log::debug!("rejected message {}: {}", message, err);
                return Some(Response::from(err));
            }
        };
        if request.keeps_channel_open() {
            return None;
        }
        self.dispatch(request, sender_tab).now_or_never()
    }

    pub async fn dispatch(&self, request: Request, sender_tab: Option<TabId>) -> Response {
        log::debug!(
            "dispatch {:?} from tab {:?} (async reply: {})",
            request,
            sender_tab,
            request.keeps_channel_open()
        );

        match request {
            Request::ContentScriptReady { url } => {
                log::debug!("content script ready {:?}", url);
                Response::raw(json!({ "ok": true }))
            }
            Request::OpenInActionPopup { tool } => {
                self.open_in_action_popup(&tool).await;
                Response::ok()
            }
            Request::OpenInSidebar { tool } | Request::ToggleSidepanelTool { tool } => {
                self.toggle_side_panel(sender_tab, Some(tool)).await;
                Response::ok()
            }
            Request::OpenPaytonSidepanel => {
                self.toggle_side_panel(sender_tab, Some(Tool::Settings)).await;
                Response::ok()
            }
            Request::OpenToolbarCustomization => {
                self.open_toolbar_customization().await;
                Response::ok()
            }
            Request::CloseSidebar => {
                match self.resolve_tab(sender_tab).await {
                    Some(tab) => self.close_side_panel(tab).await,
                    None => log::warn!("closeSidebar: no tab to close the panel in"),
                }
                Response::ok()
            }
            Request::OpenToolWindow { tool } => {
                self.open_tool_window(&tool).await;
                Response::ok()
            }
            Request::OpenToolWindowAt { tool, anchor } => {
                self.open_tool_near(&tool, anchor, TOOL_WINDOW_PERCENT).await;
                Response::ok()
            }
            Request::OpenToolWindowCentered { tool, percent } => {
                self.open_tool_centered(&tool, percent).await;
                Response::ok()
            }
            Request::ResizeToolForTab { width, height } => {
                self.resize_focused_popup(width, height).await;
                Response::ok()
            }
            Request::GetControllerStatus => Response::raw(json!({ "connected": false, "name": null })),
            Request::TriggerControllerTest => {
                self.toggle_for_active_tab(TabQuery::active_in_current_window(), Tool::ControllerTesting)
                    .await;
                Response::ok()
            }
            Request::OpenCheckoutPrices => {
                self.open_checkout_prices().await;
                Response::ok()
            }
            Request::OpenUrl { url } | Request::OpenTab { url } => self.open_tab(&url).await,
            Request::OpenOptions => {
                let opened = self.open_options_popup().await;
                Response::raw(json!({ "success": opened }))
            }
            Request::HideControllerModal => {
                self.send_to_active_tab(&tab_messages::hide_controller_modal()).await;
                Response::ok()
            }
            Request::ToggleToolbar => {
                self.send_to_active_tab(&tab_messages::toggle_toolbar()).await;
                Response::ok()
            }
            Request::GetActiveTab => self.get_active_tab().await,
            Request::GetTabs => match self.browser.query_tabs(TabQuery::all()).await {
                Ok(tabs) => Response::raw(json!({ "tabs": summarize_tabs(&tabs) })),
                Err(err) => Response::failure(err.to_string()),
            },
            Request::SwitchTab { tab_id } => self.switch_tab(tab_id).await,
            Request::GetPreviousTab => Response::raw(json!({ "tabId": self.active_tabs().previous() })),
            Request::FetchCsvLinks { url } => match self.browser.fetch_text(&url).await {
                Ok(data) => Response::success(json!({ "data": data })),
                Err(err) => {
                    log::warn!("CSV fetch error: {}", err);
                    Response::failure(err.to_string())
                }
            },
            Request::FetchResource { url } => {
                let resource = self.browser.extension_url(&url);
                match self.browser.fetch_text(&resource).await {
                    Ok(html) => Response::raw(json!({ "ok": true, "html": html })),
                    Err(err) => Response::raw(json!({ "ok": false, "error": err.to_string() })),
                }
            }
            Request::ToggleDebug { value } => {
                self.set_debug(value);
                self.store_value(keys::DEBUG_LOGS, Value::Bool(value)).await;
                log::debug!("debug toggled {}", value);
                Response::success(json!({ "debug": value }))
            }
            Request::GenerateQr { text, size } => match self.browser.fetch_bytes(&qr_code_url(&text, size)).await {
                Ok(png) => Response::success(json!({ "dataUrl": png_data_url(&png) })),
                Err(err) => {
                    log::warn!("generateQr error: {}", err);
                    Response::failure(err.to_string())
                }
            },
            Request::Ping => {
                log::debug!("pong");
                Response::raw(json!({ "pong": true, "time": self.browser.now_ms() }))
            }
            Request::OpenQrScanner => {
                self.open_qr_scanner(sender_tab).await;
                Response::ok()
            }
            Request::OpenFloatingToolbar => {
                self.open_in_action_popup(&Tool::FloatingToolbar).await;
                Response::ok()
            }
            Request::GoBackToPos => {
                self.go_back_to_pos().await;
                Response::ok()
            }
            Request::QrCodeScanned { data, timestamp } => {
                self.store_value(keys::LAST_SCANNED_QR, json!({ "data": data, "timestamp": timestamp }))
                    .await;
                self.send_to_active_tab(&tab_messages::qr_code_scanned(&data, &timestamp))
                    .await;
                Response::ok()
            }
            Request::CloseQrScanner => Response::ok(),
            Request::SetStore { store, room } => self.set_store(&store, room.as_deref()).await,
            Request::GetStore => {
                let selection: StoreSelection = storage::load(&self.browser, StoreSelection::KEYS)
                    .await
                    .unwrap_or_default();
                Response::success(json!({ "store": selection.store, "room": selection.room }))
            }
            Request::CheckSiteStatus { domain } => {
                let sites = self.site_config().await;
                Response::success(json!({
                    "disabled": sites.is_disabled(&domain),
                    "globalEnabled": sites.global_enabled,
                    "disabledSites": sites.disabled_sites,
                }))
            }
            Request::UpdateDisabledSites { sites } => {
                let cleaned = SiteConfig::clean_sites(&sites);
                if let Err(response) = self.save_disabled_sites(&cleaned).await {
                    return response;
                }
                Response::ok()
            }
            Request::ToggleCurrentSite { enabled, domain } => {
                let mut sites = self.site_config().await;
                if enabled {
                    sites.enable_site(&domain);
                } else {
                    sites.disable_site(&domain);
                }
                if let Err(response) = self.save_disabled_sites(&sites.disabled_sites).await {
                    return response;
                }
                Response::success(json!({ "disabledSites": sites.disabled_sites }))
            }
            Request::CheckoutPricesDataUpdated { data } => {
                let mut items = Map::new();
                items.insert(keys::CHECKOUT_PRICES_DATA.to_string(), data);
                items.insert(keys::CHECKOUT_PRICES_LAST_UPDATED.to_string(), json!(self.browser.now_ms()));
                if let Err(err) = self.browser.storage_set(items).await {
                    log::warn!("failed to store checkout prices: {}", err);
                }
                Response::ok()
            }
            Request::OpenAlert { alert } => {
                let shown = self.open_alert(&alert).await;
                Response::success(json!({ "shown": shown }))
            }
            Request::SetUpcHighlighter { enabled } => {
                self.store_value(keys::UPC_HIGHLIGHTER_ENABLED, Value::Bool(enabled)).await;
                self.broadcast(&Broadcast::UpcHighlighterChanged { enabled }).await;
                Response::ok()
            }
            Request::HealthCheck => {
                Response::raw(json!({ "status": "healthy", "timestamp": self.browser.now_ms() }))
            }
            Request::ContentScriptAnnounce => Response::raw(json!({ "status": "acknowledged" })),
        }
    }

    async fn store_value(&self, key: &str, value: Value) {
        let mut items = Map::new();
        items.insert(key.to_string(), value);
        if let Err(err) = self.browser.storage_set(items).await {
            log::warn!("failed to store {}: {}", key, err);
        }
    }

    async fn site_config(&self) -> SiteConfig {
        storage::load(&self.browser, SiteConfig::KEYS)
            .await
            .unwrap_or_else(|err| {
                log::warn!("could not read site settings: {}", err);
                SiteConfig::default()
            })
    }

    async fn save_disabled_sites(&self, sites: &[String]) -> Result<(), Response> {
        let mut items = Map::new();
        items.insert(keys::DISABLED_SITES.to_string(), json!(sites));
        if let Err(err) = self.browser.storage_set(items).await {
            log::warn!("failed to store disabled sites: {}", err);
            return Err(Response::failure(err.to_string()));
        }
        self.broadcast(&Broadcast::SettingsChanged {
            disabled_sites: sites.to_vec(),
        })
        .await;
        Ok(())
    }

    async fn set_store(&self, store: &str, room: Option<&str>) -> Response {
        let selection = StoreSelection::new(store, room);
        if let Err(err) = storage::save(&self.browser, &selection).await {
            log::warn!("failed to store selection: {}", err);
            return Response::failure(err.to_string());
        }

        self.broadcast(&Broadcast::StoreChanged {
            store: selection.store.clone(),
            room: selection.room.clone(),
        })
        .await;
        Response::success(json!({ "store": selection.store, "room": selection.room }))
    }

    async fn open_tab(&self, url: &str) -> Response {
        match self.browser.create_tab(url).await {
            Ok(tab) => Response::success(json!({ "tabId": tab.id })),
            Err(err) => Response::failure(err.to_string()),
        }
    }

    async fn get_active_tab(&self) -> Response {
        let tabs = self
            .browser
            .query_tabs(TabQuery::active_in_current_window())
            .await
            .unwrap_or_default();
        match tabs.into_iter().next() {
            Some(tab) => Response::raw(json!({ "tab": tab })),
            None => Response::raw(json!({ "error": "No active tab found" })),
        }
    }

    async fn switch_tab(&self, tab: TabId) -> Response {
        match self.browser.activate_tab(tab).await {
            Ok(info) => {
                if let Some(window) = info.window_id {
                    if let Err(err) = self.browser.update_window(window, &WindowUpdate::focus()).await {
                        log::debug!("could not focus window {}: {}", window, err);
                    }
                }
                Response::ok()
            }
            Err(err) => Response::failure(err.to_string()),
        }
    }

    /// Toggle checkout prices for the active tab, or any tab when none is active
    async fn open_checkout_prices(&self) {
        let tool = Tool::CheckoutPrices;
        if self
            .toggle_for_active_tab(TabQuery::active_in_last_focused_window(), tool.clone())
            .await
            .is_some()
        {
            return;
        }
        if let Some(tab) = self.query_active_tab(TabQuery::all()).await {
            self.toggle_side_panel(Some(tab), Some(tool)).await;
        }
    }

    /// Open the QR session tool in the side panel, never toggling it closed
    async fn open_qr_scanner(&self, sender_tab: Option<TabId>) {
        match self.resolve_tab(sender_tab).await {
            Some(tab) => self.open_side_panel(tab, Tool::QrSession).await,
            None => log::warn!("openQRScanner: no active tab"),
        }
    }

    /// Return to the most recent point-of-sale tab and close the current one
    async fn go_back_to_pos(&self) {
        let tabs = self.browser.query_tabs(TabQuery::all()).await.unwrap_or_default();

        let Some(target) = most_recent_pos_tab(&tabs).cloned() else {
            log::debug!("no POS tabs found, opening a new one");
            if let Err(err) = self.browser.create_tab(POS_URL).await {
                log::warn!("could not open POS: {}", err);
            }
            return;
        };
        let Some(target_id) = target.id else {
            return;
        };

        // Resolve the tab being left before focus moves to the POS tab
        let leaving = self.query_active_tab(TabQuery::active_in_current_window()).await;

        log::debug!("found POS tab {} {}", target_id, target.url());
        if let Err(err) = self.browser.activate_tab(target_id).await {
            log::warn!("could not activate POS tab: {}", err);
        }
        if let Some(window) = target.window_id {
            if let Err(err) = self.browser.update_window(window, &WindowUpdate::focus()).await {
                log::debug!("could not focus window {}: {}", window, err);
            }
        }

        if let Some(leaving) = leaving.filter(|tab| *tab != target_id) {
            if let Err(err) = self.browser.remove_tab(leaving).await {
                log::debug!("could not close tab {}: {}", leaving, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrowserError;
    use crate::side_panel::PanelState;
    use crate::tab_data::{Bounds, TabInfo};
    use crate::testing::{ALWAYS, Call, FakeBrowser};
    use futures::executor::block_on;

    fn coordinator() -> Coordinator<FakeBrowser> {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://pos.paymore.tech/checkout", true);
        browser.add_tab(2, "https://www.ebay.com", false);
        Coordinator::new(browser)
    }

    fn handle(coordinator: &Coordinator<FakeBrowser>, message: Value, sender: Option<TabId>) -> Value {
        block_on(coordinator.handle_message(&message, sender)).into_value()
    }

    fn broadcasts(browser: &FakeBrowser, tab: TabId, action: &str) -> Vec<Value> {
        browser
            .messages_to(tab)
            .into_iter()
            .filter(|m| m["action"] == action)
            .collect()
    }

    #[test]
    fn test_unknown_action() {
        let coordinator = coordinator();

        assert_eq!(
            handle(&coordinator, json!({"action": "selfDestruct"}), None),
            json!({"ok": false, "error": "unknown_action"})
        );
        assert!(coordinator.browser().calls().is_empty());
    }

    #[test]
    fn test_missing_tool() {
        let coordinator = coordinator();

        for action in ["openInSidebar", "openToolWindow", "openToolWindowAt", "openToolWindowCentered", "openInActionPopup"] {
            assert_eq!(
                handle(&coordinator, json!({ "action": action }), Some(1)),
                json!({"success": false, "error": "missing_tool"}),
                "{}",
                action
            );
        }
        assert!(coordinator.browser().calls().is_empty());
    }

    #[test]
    fn test_open_tool_window_at_example() {
        let coordinator = coordinator();

        let response = handle(
            &coordinator,
            json!({"action": "openToolWindowAt", "tool": "qr-session", "anchor": {"x": 1260, "y": 400}}),
            Some(1),
        );

        assert_eq!(response, json!({"success": true}));
        let created = coordinator.browser().created_windows();
        assert_eq!(created[0].bounds, Some(Bounds { left: 732, top: 220, width: 512, height: 360 }));
    }

    #[test]
    fn test_set_store_twice_broadcasts_each_time() {
        let coordinator = coordinator();

        let first = handle(&coordinator, json!({"action": "setStore", "store": "Taylor"}), None);
        assert_eq!(first, json!({"success": true, "store": "Taylor", "room": "taylor-store"}));

        let second = handle(
            &coordinator,
            json!({"action": "setStore", "store": "Southgate", "room": "southgate-store"}),
            None,
        );
        assert_eq!(second["room"], "southgate-store");

        let browser = coordinator.browser();
        assert_eq!(browser.stored("pmSelectedStore"), Some(json!("Southgate")));
        assert_eq!(browser.stored("pmStoreRoom"), Some(json!("southgate-store")));
        for tab in [1, 2] {
            assert_eq!(
                broadcasts(browser, tab, "pm-store-changed"),
                vec![
                    json!({"action": "pm-store-changed", "store": "Taylor", "room": "taylor-store"}),
                    json!({"action": "pm-store-changed", "store": "Southgate", "room": "southgate-store"}),
                ]
            );
        }
    }

    #[test]
    fn test_set_store_succeeds_with_unreachable_tabs() {
        let coordinator = coordinator();
        coordinator.browser().fail_sends(2, ALWAYS);

        let response = handle(&coordinator, json!({"action": "setStore", "store": "Elsewhere"}), None);

        assert_eq!(response, json!({"success": true, "store": "Elsewhere", "room": "southgate-store"}));
    }

    #[test]
    fn test_get_store_defaults_to_empty() {
        let coordinator = coordinator();

        assert_eq!(
            handle(&coordinator, json!({"action": "getStore"}), None),
            json!({"success": true, "store": "", "room": ""})
        );
    }

    #[test]
    fn test_toggle_sidebar_for_sender_tab() {
        let coordinator = coordinator();

        handle(&coordinator, json!({"action": "openInSidebar", "tool": "scout"}), Some(2));
        assert_eq!(coordinator.side_panel_state(2), PanelState::Open(Tool::Scout));

        handle(&coordinator, json!({"action": "toggleSidepanelTool", "tool": "scout"}), Some(2));
        assert_eq!(coordinator.side_panel_state(2), PanelState::Closed);

        handle(&coordinator, json!({"action": "toggleSidepanelTool"}), Some(2));
        assert_eq!(coordinator.side_panel_state(2), PanelState::Open(Tool::Settings));

        handle(&coordinator, json!({"action": "closeSidebar"}), Some(2));
        assert_eq!(coordinator.side_panel_state(2), PanelState::Closed);
    }

    #[test]
    fn test_sidebar_tool_opens_before_any_call_completes() {
        let coordinator = coordinator();
        coordinator.browser().slow_calls(true);

        handle(&coordinator, json!({"action": "toggleSidepanelTool", "tool": "scout"}), Some(2));

        let calls = coordinator.browser().calls();
        let opened = calls.iter().position(|c| *c == Call::OpenSidePanel(2)).unwrap();
        let first_resume = calls.iter().position(|c| *c == Call::Resumed).unwrap();
        assert!(opened < first_resume);
        assert_eq!(coordinator.side_panel_state(2), PanelState::Open(Tool::Scout));
    }

    #[test]
    fn test_qr_scanner_uses_known_active_tab() {
        let coordinator = coordinator();
        coordinator.on_tab_activated(2);
        coordinator.browser().slow_calls(true);

        handle(&coordinator, json!({"action": "openQRScanner"}), None);

        let calls = coordinator.browser().calls();
        let opened = calls.iter().position(|c| *c == Call::OpenSidePanel(2)).unwrap();
        let first_resume = calls.iter().position(|c| *c == Call::Resumed).unwrap();
        assert!(opened < first_resume);
        assert_eq!(coordinator.side_panel_state(2), PanelState::Open(Tool::QrSession));
    }

    #[test]
    fn test_respond_now_only_for_immediate_requests() {
        let coordinator = coordinator();

        let pong = coordinator.respond_now(&json!({"action": "ping"}), None).unwrap();
        assert_eq!(pong.get("pong"), Some(&json!(true)));

        let rejected = coordinator.respond_now(&json!({"action": "bogus"}), None).unwrap();
        assert_eq!(rejected.into_value(), json!({"ok": false, "error": "unknown_action"}));

        assert_eq!(coordinator.respond_now(&json!({"action": "getStore"}), None), None);
        assert_eq!(coordinator.respond_now(&json!({"action": "openQRScanner"}), Some(1)), None);
        assert!(coordinator.browser().calls().is_empty());
    }

    #[test]
    fn test_open_qr_scanner_never_closes() {
        let coordinator = coordinator();

        handle(&coordinator, json!({"action": "openQRScanner"}), None);
        handle(&coordinator, json!({"action": "openQRScanner"}), None);

        assert_eq!(coordinator.side_panel_state(1), PanelState::Open(Tool::QrSession));
        assert!(!coordinator.browser().has_call(&Call::CloseSidePanel(1)));
    }

    #[test]
    fn test_check_site_status() {
        let coordinator = coordinator();
        coordinator.browser().store("disabledSites", json!(["ebay.com"]));

        let response = handle(&coordinator, json!({"action": "checkSiteStatus", "domain": "www.ebay.com"}), None);

        assert_eq!(
            response,
            json!({"success": true, "disabled": true, "globalEnabled": true, "disabledSites": ["ebay.com"]})
        );
    }

    #[test]
    fn test_update_disabled_sites_cleans_and_broadcasts() {
        let coordinator = coordinator();

        let response = handle(
            &coordinator,
            json!({"action": "updateDisabledSites", "sites": ["https://eBay.com/sch", "ebay.com", " "]}),
            None,
        );

        assert_eq!(response, json!({"success": true}));
        let browser = coordinator.browser();
        assert_eq!(browser.stored("disabledSites"), Some(json!(["ebay.com"])));
        assert_eq!(
            broadcasts(browser, 1, "pm-settings-changed"),
            vec![json!({"action": "pm-settings-changed", "disabledSites": ["ebay.com"]})]
        );
    }

    #[test]
    fn test_toggle_current_site() {
        let coordinator = coordinator();

        let off = handle(&coordinator, json!({"action": "toggleCurrentSite", "enabled": false, "domain": "ebay.com"}), None);
        assert_eq!(off, json!({"success": true, "disabledSites": ["ebay.com"]}));

        let again = handle(&coordinator, json!({"action": "toggleCurrentSite", "enabled": false, "domain": "ebay.com"}), None);
        assert_eq!(again["disabledSites"], json!(["ebay.com"]));

        let on = handle(&coordinator, json!({"action": "toggleCurrentSite", "enabled": true, "domain": "ebay.com"}), None);
        assert_eq!(on, json!({"success": true, "disabledSites": []}));
    }

    #[test]
    fn test_generate_qr_returns_data_url() {
        let coordinator = coordinator();
        coordinator
            .browser()
            .set_fetch(&qr_code_url("hello world", 128), Ok(vec![0x89, b'P', b'N', b'G']));

        let response = handle(&coordinator, json!({"action": "generateQr", "text": "hello world", "size": 128}), None);

        assert_eq!(response, json!({"success": true, "dataUrl": "data:image/png;base64,iVBORw=="}));
    }

    #[test]
    fn test_generate_qr_fetch_failure() {
        let coordinator = coordinator();

        let response = handle(&coordinator, json!({"action": "generateQr", "text": "x"}), None);

        assert_eq!(response, json!({"success": false, "error": "HTTP 404"}));
    }

    #[test]
    fn test_qr_code_url() {
        assert_eq!(
            qr_code_url("a b&c", 256),
            "https://api.qrserver.com/v1/create-qr-code/?size=256x256&data=a+b%26c"
        );
    }

    #[test]
    fn test_fetch_csv_links() {
        let coordinator = coordinator();
        coordinator
            .browser()
            .set_fetch("https://sheets.example/links.csv", Ok(b"name,url\n".to_vec()));

        assert_eq!(
            handle(&coordinator, json!({"action": "FETCH_CSV_LINKS", "url": "https://sheets.example/links.csv"}), None),
            json!({"success": true, "data": "name,url\n"})
        );
        assert_eq!(
            handle(&coordinator, json!({"action": "FETCH_CSV_LINKS"}), None),
            json!({"success": false, "error": "missing_url"})
        );
    }

    #[test]
    fn test_fetch_resource_resolves_extension_url() {
        let coordinator = coordinator();
        coordinator.browser().set_fetch(
            "chrome-extension://fake-id/content-scripts/modal.html",
            Ok(b"<div></div>".to_vec()),
        );

        assert_eq!(
            handle(&coordinator, json!({"action": "fetchResource", "url": "content-scripts/modal.html"}), None),
            json!({"ok": true, "html": "<div></div>"})
        );
        coordinator.browser().set_fetch(
            "chrome-extension://fake-id/missing.html",
            Err(BrowserError::Http(500)),
        );
        assert_eq!(
            handle(&coordinator, json!({"action": "fetchResource", "url": "missing.html"}), None),
            json!({"ok": false, "error": "HTTP 500"})
        );
    }

    #[test]
    fn test_open_tab_and_switch_tab() {
        let coordinator = coordinator();

        let opened = handle(&coordinator, json!({"action": "OPEN_TAB", "url": "https://example.org"}), None);
        assert_eq!(opened, json!({"success": true, "tabId": 1000}));

        let switched = handle(&coordinator, json!({"action": "SWITCH_TAB", "tabId": 2}), None);
        assert_eq!(switched, json!({"success": true}));
        let browser = coordinator.browser();
        assert!(browser.has_call(&Call::ActivateTab(2)));
        assert!(browser.has_call(&Call::UpdateWindow(1, WindowUpdate::focus())));
    }

    #[test]
    fn test_get_tabs_and_previous_tab() {
        let coordinator = coordinator();
        coordinator.on_tab_activated(1);
        coordinator.on_tab_activated(2);

        let tabs = handle(&coordinator, json!({"action": "GET_TABS"}), None);
        assert_eq!(tabs["tabs"].as_array().map(Vec::len), Some(2));
        assert_eq!(tabs["tabs"][0]["url"], "https://pos.paymore.tech/checkout");

        assert_eq!(handle(&coordinator, json!({"action": "GET_PREVIOUS_TAB"}), None), json!({"tabId": 1}));
    }

    #[test]
    fn test_get_active_tab() {
        let coordinator = coordinator();
        assert_eq!(handle(&coordinator, json!({"action": "getActiveTab"}), None)["tab"]["id"], 1);

        let empty = Coordinator::new(FakeBrowser::new());
        assert_eq!(
            handle(&empty, json!({"action": "getActiveTab"}), None),
            json!({"error": "No active tab found"})
        );
    }

    #[test]
    fn test_go_back_to_pos_focuses_recent_tab_and_closes_current() {
        let browser = FakeBrowser::new();
        browser.add_tab_info(TabInfo {
            last_accessed: Some(10.0),
            window_id: Some(3),
            ..TabInfo::new(1, "https://pos.paymore.tech/a", false)
        });
        browser.add_tab_info(TabInfo {
            last_accessed: Some(20.0),
            window_id: Some(4),
            ..TabInfo::new(2, "https://pos.paymore.tech/b", false)
        });
        browser.add_tab(9, "https://paymore-extension.vercel.app/tools/scout", true);
        let coordinator = Coordinator::new(browser);

        handle(&coordinator, json!({"action": "goBackToPOS"}), None);

        let browser = coordinator.browser();
        assert!(browser.has_call(&Call::ActivateTab(2)));
        assert!(browser.has_call(&Call::UpdateWindow(4, WindowUpdate::focus())));
        assert!(browser.has_call(&Call::RemoveTab(9)));
    }

    #[test]
    fn test_go_back_to_pos_opens_pos_when_missing() {
        let browser = FakeBrowser::new();
        browser.add_tab(1, "https://www.ebay.com", true);
        let coordinator = Coordinator::new(browser);

        handle(&coordinator, json!({"action": "goBackToPOS"}), None);

        assert_eq!(coordinator.browser().created_tab_urls(), vec![POS_URL.to_string()]);
    }

    #[test]
    fn test_toggle_debug_persists() {
        let coordinator = coordinator();

        let response = handle(&coordinator, json!({"action": "toggleDebug", "value": false}), None);

        assert_eq!(response, json!({"success": true, "debug": false}));
        assert!(!coordinator.debug_enabled());
        assert_eq!(coordinator.browser().stored("debugLogs"), Some(json!(false)));
    }

    #[test]
    fn test_qr_code_scanned_persists_and_delivers() {
        let coordinator = coordinator();

        handle(&coordinator, json!({"action": "qrCodeScanned", "data": "ABC123", "timestamp": 42}), None);

        let browser = coordinator.browser();
        assert_eq!(browser.stored("lastScannedQR"), Some(json!({"data": "ABC123", "timestamp": 42})));
        assert_eq!(
            browser.messages_to(1),
            vec![json!({"action": "qrCodeScanned", "data": "ABC123", "timestamp": 42})]
        );
    }

    #[test]
    fn test_hide_controller_modal_survives_delivery_failure() {
        let coordinator = coordinator();
        coordinator.browser().fail_sends(1, ALWAYS);

        let response = handle(&coordinator, json!({"action": "hideControllerModal"}), None);

        assert_eq!(response, json!({"success": true}));
        assert_eq!(coordinator.browser().fallback_posts(1).len(), 1);
    }

    #[test]
    fn test_open_alert_reports_dedup() {
        let coordinator = coordinator();
        let message = json!({"action": "openAlert", "text": "Manager to register 2", "user": "sam"});

        assert_eq!(handle(&coordinator, message.clone(), None), json!({"success": true, "shown": true}));
        assert_eq!(handle(&coordinator, message, None), json!({"success": true, "shown": false}));
    }

    #[test]
    fn test_set_upc_highlighter() {
        let coordinator = coordinator();

        handle(&coordinator, json!({"action": "setUpcHighlighter", "enabled": false}), None);

        let browser = coordinator.browser();
        assert_eq!(browser.stored("upcHighlighterEnabled"), Some(json!(false)));
        assert_eq!(
            broadcasts(browser, 2, "upc-highlighter-settings-changed"),
            vec![json!({"action": "upc-highlighter-settings-changed", "enabled": false})]
        );
    }

    #[test]
    fn test_open_checkout_prices_falls_back_to_first_tab() {
        let browser = FakeBrowser::new();
        browser.add_tab(4, "https://www.ebay.com", false);
        let coordinator = Coordinator::new(browser);

        handle(&coordinator, json!({"action": "openCheckoutPrices"}), None);

        assert_eq!(coordinator.side_panel_state(4), PanelState::Open(Tool::CheckoutPrices));
    }

    #[test]
    fn test_simple_replies() {
        let coordinator = coordinator();

        assert_eq!(handle(&coordinator, json!({"action": "csReady"}), None), json!({"ok": true}));
        assert_eq!(
            handle(&coordinator, json!({"action": "getControllerStatus"}), None),
            json!({"connected": false, "name": null})
        );
        assert_eq!(handle(&coordinator, json!({"action": "ping"}), None), json!({"pong": true, "time": 1_000_000.0}));
        assert_eq!(
            handle(&coordinator, json!({"type": "CONTENT_SCRIPT_READY"}), None),
            json!({"status": "acknowledged"})
        );
        assert_eq!(
            handle(&coordinator, json!({"type": "EXTENSION_HEALTH_CHECK"}), None),
            json!({"status": "healthy", "timestamp": 1_000_000.0})
        );
    }
}

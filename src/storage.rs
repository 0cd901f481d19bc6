/// Settings persisted in chrome.storage.local

use crate::browser::Browser;
use crate::domain::{is_site_disabled, normalize_site};
use crate::error::BrowserError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_SCANNER_BASE_URL: &str = "https://paymore-extension.vercel.app";

pub mod keys {
    pub const IS_ENABLED: &str = "isEnabled";
    pub const AUTO_SHOW_MODAL: &str = "autoShowModal";
    pub const SCANNER_BASE_URL: &str = "scannerBaseUrl";
    pub const SELECTED_STORE: &str = "pmSelectedStore";
    pub const STORE_ROOM: &str = "pmStoreRoom";
    pub const DISABLED_SITES: &str = "disabledSites";
    pub const GLOBAL_ENABLED: &str = "globalEnabled";
    pub const SIDE_PANEL_TOOL: &str = "sidePanelTool";
    pub const SIDE_PANEL_URL: &str = "sidePanelUrl";
    pub const ACTION_POPUP_URL: &str = "actionPopupUrl";
    pub const TOOLS_PASSWORD: &str = "toolsPassword";
    pub const DEBUG_LOGS: &str = "debugLogs";
    pub const POPUP_INTENT: &str = "popupIntent";
    pub const LAST_SCANNED_QR: &str = "lastScannedQR";
    pub const CHECKOUT_PRICES_DATA: &str = "checkoutPricesData";
    pub const CHECKOUT_PRICES_LAST_UPDATED: &str = "checkoutPricesLastUpdated";
    pub const UPC_HIGHLIGHTER_ENABLED: &str = "upcHighlighterEnabled";
}

/// Everything seeded into storage on install
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub is_enabled: bool,
    pub auto_show_modal: bool,
    pub vibration_enabled: bool,
    pub debug_logs: bool,
    pub scanner_base_url: String,
    pub pm_selected_store: String,
    pub pm_store_room: String,
    pub disabled_sites: Vec<String>,
    pub current_site_enabled: bool,
    pub global_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            is_enabled: true,
            auto_show_modal: true,
            vibration_enabled: true,
            debug_logs: true,
            scanner_base_url: DEFAULT_SCANNER_BASE_URL.to_string(),
            pm_selected_store: String::new(),
            pm_store_room: String::new(),
            disabled_sites: Vec::new(),
            current_site_enabled: true,
            global_enabled: true,
        }
    }
}

impl Settings {
    pub const KEYS: &'static [&'static str] = &[
        keys::IS_ENABLED,
        keys::AUTO_SHOW_MODAL,
        "vibrationEnabled",
        keys::DEBUG_LOGS,
        keys::SCANNER_BASE_URL,
        keys::SELECTED_STORE,
        keys::STORE_ROOM,
        keys::DISABLED_SITES,
        "currentSiteEnabled",
        keys::GLOBAL_ENABLED,
    ];

    /// Defaults for the keys not already present in `existing`
    pub fn missing_defaults(existing: &Map<String, Value>) -> Map<String, Value> {
        let mut defaults = Settings::default().to_items();
        defaults.retain(|key, _| !existing.contains_key(key));
        defaults
    }

    pub fn to_items(&self) -> Map<String, Value> {
        to_items(self)
    }
}

/// Where hosted tools live and how to unlock them
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolConfig {
    pub scanner_base_url: String,
    pub tools_password: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            scanner_base_url: DEFAULT_SCANNER_BASE_URL.to_string(),
            tools_password: String::new(),
        }
    }
}

impl ToolConfig {
    pub const KEYS: &'static [&'static str] = &[keys::SCANNER_BASE_URL, keys::TOOLS_PASSWORD];

    pub fn base_url(&self) -> &str {
        self.scanner_base_url.trim_end_matches('/')
    }

    pub fn password(&self) -> Option<&str> {
        Some(self.tools_password.as_str()).filter(|p| !p.is_empty())
    }
}

/// Per-site enable/disable switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    pub disabled_sites: Vec<String>,
    pub global_enabled: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            disabled_sites: Vec::new(),
            global_enabled: true,
        }
    }
}

impl SiteConfig {
    pub const KEYS: &'static [&'static str] = &[keys::DISABLED_SITES, keys::GLOBAL_ENABLED];

    pub fn is_disabled(&self, domain: &str) -> bool {
        is_site_disabled(domain, &self.disabled_sites, self.global_enabled)
    }

    /// Remove a site from the disabled list, returns whether it was listed
    pub fn enable_site(&mut self, domain: &str) -> bool {
        let original_len = self.disabled_sites.len();
        self.disabled_sites.retain(|site| site != domain);
        self.disabled_sites.len() < original_len
    }

    /// Add a site to the disabled list, returns whether it was added
    pub fn disable_site(&mut self, domain: &str) -> bool {
        if self.disabled_sites.iter().any(|site| site == domain) {
            return false;
        }
        self.disabled_sites.push(domain.to_string());
        true
    }

    /// Normalize and dedupe a list of user-entered sites, keeping first occurrences
    pub fn clean_sites(sites: &[String]) -> Vec<String> {
        let mut cleaned: Vec<String> = Vec::new();
        for site in sites.iter().filter_map(|s| normalize_site(s)) {
            if !cleaned.contains(&site) {
                cleaned.push(site);
            }
        }
        cleaned
    }
}

/// The store (and realtime room) this browser is working for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSelection {
    #[serde(rename = "pmSelectedStore")]
    pub store: String,
    #[serde(rename = "pmStoreRoom")]
    pub room: String,
}

impl StoreSelection {
    pub const KEYS: &'static [&'static str] = &[keys::SELECTED_STORE, keys::STORE_ROOM];

    /// Build a selection, deriving the room from the store name when not given
    pub fn new(store: &str, room: Option<&str>) -> Self {
        let room = match room.filter(|r| !r.is_empty()) {
            Some(room) => room.to_string(),
            None => default_room(store).to_string(),
        };
        StoreSelection {
            store: store.to_string(),
            room,
        }
    }
}

pub fn default_room(store: &str) -> &'static str {
    if store == "Taylor" { "taylor-store" } else { "southgate-store" }
}

/// Serialize a settings struct into storage items
pub fn to_items<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Read a group of keys, filling anything missing from the type's defaults
pub async fn load<T, B>(browser: &B, keys: &[&str]) -> Result<T, BrowserError>
where
    T: DeserializeOwned,
    B: Browser + ?Sized,
{
    let items = browser.storage_get(keys).await?;
    serde_json::from_value(Value::Object(items)).map_err(|e| BrowserError::Decode(e.to_string()))
}

/// Write a group of settings
pub async fn save<T, B>(browser: &B, value: &T) -> Result<(), BrowserError>
where
    T: Serialize,
    B: Browser + ?Sized,
{
    browser.storage_set(to_items(value)).await
}

/// Tool identifiers and hosted tool URLs

use crate::storage::ToolConfig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use url::Url;
use url::form_urlencoded::byte_serialize;

/// A feature surface of the hosted toolset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tool {
    CheckoutPrices,
    ControllerTesting,
    PriceCharting,
    UpcSearch,
    Scout,
    Settings,
    QrSession,
    FloatingToolbar,
    Help,
    MinReqs,
    ShopifySearch,
    ShopifyStorefront,
    Ebay,
    Links,
    Paymore,
    /// Unrecognized tool name, kept verbatim; opens the tool site root
    Other(String),
}

const KNOWN_TOOLS: &[(Tool, &str, &str)] = &[
    (Tool::CheckoutPrices, "checkout-prices", "/tools/checkout-prices"),
    (Tool::ControllerTesting, "controller-testing", "/tools/controller-testing"),
    (Tool::PriceCharting, "price-charting", "/tools/price-charting"),
    (Tool::UpcSearch, "upc-search", "/tools/upc-search"),
    (Tool::Scout, "scout", "/tools/scout"),
    (Tool::Settings, "settings", "/tools/settings"),
    (Tool::QrSession, "qr-session", "/tools/qr-session"),
    (Tool::FloatingToolbar, "floating-toolbar", "/tools/floating-toolbar"),
    (Tool::Help, "help", "/tools/help"),
    (Tool::MinReqs, "min-reqs", "/tools/min-reqs"),
    (Tool::ShopifySearch, "shopify-search", "/tools/shopify/search"),
    (Tool::ShopifyStorefront, "shopify-storefront", "/tools/shopify/storefront"),
    (Tool::Ebay, "ebay", "/tools/ebay"),
    (Tool::Links, "links", "/tools/links"),
    (Tool::Paymore, "paymore", "/tools/paymore"),
];

impl Tool {
    pub fn parse(name: &str) -> Tool {
        let name = name.trim();
        KNOWN_TOOLS
            .iter()
            .find(|(_, key, _)| *key == name)
            .map(|(tool, _, _)| tool.clone())
            .unwrap_or_else(|| Tool::Other(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Tool::Other(name) => name,
            known => KNOWN_TOOLS
                .iter()
                .find(|(tool, _, _)| tool == known)
                .map(|(_, key, _)| *key)
                .unwrap_or_default(),
        }
    }

    /// Path of the tool on the hosted tool site
    pub fn path(&self) -> &'static str {
        KNOWN_TOOLS
            .iter()
            .find(|(tool, _, _)| tool == self)
            .map(|(_, _, path)| *path)
            .unwrap_or("/")
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Tool::Other(_))
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Tool {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Tool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Tool::parse(&name))
    }
}

/// How a hosted tool page is embedded, told to the page through a marker query flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedding {
    /// Centered popup window
    Popup,
    /// Floating window anchored near the toolbar or a click
    Window,
}

impl Embedding {
    fn marker(self) -> &'static str {
        match self {
            Embedding::Popup => "pm_popup",
            Embedding::Window => "pm_window",
        }
    }
}

/// Build the URL of a hosted tool page
pub fn tool_url(config: &ToolConfig, tool: &Tool, embedding: Embedding) -> String {
    let raw = format!("{}{}", config.base_url(), tool.path());

    match Url::parse(&raw) {
        Ok(mut url) => {
            {
                let mut query = url.query_pairs_mut();
                query.append_pair(embedding.marker(), "1");
                if let Some(password) = config.password() {
                    query.append_pair("password", password);
                }
            }
            url.to_string()
        }
        Err(_) => {
            // Relative or malformed base: assemble by hand
            let mut url = format!("{}?{}=1", raw, embedding.marker());
            if let Some(password) = config.password() {
                url.push_str("&password=");
                url.extend(byte_serialize(password.as_bytes()));
            }
            url
        }
    }
}

/// Text shown by the alert window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertPayload {
    pub text: String,
    pub user: String,
    pub room: String,
}

impl AlertPayload {
    pub fn new(text: Option<String>, user: Option<String>, room: Option<String>) -> Self {
        AlertPayload {
            text: text.unwrap_or_default(),
            user: user.unwrap_or_default(),
            room: room.filter(|r| !r.is_empty()).unwrap_or_else(|| "team".to_string()),
        }
    }
}

/// Build the URL of the alert page for a fixed-size alert window
pub fn alert_url(config: &ToolConfig, alert: &AlertPayload, width: i32, height: i32) -> String {
    let raw = format!("{}/tools/alert", config.base_url());
    let mut pairs: Vec<(&str, String)> = Vec::new();

    if let Some(password) = config.password() {
        pairs.push(("password", password.to_string()));
    }
    if !alert.text.is_empty() {
        pairs.push(("text", alert.text.clone()));
    }
    if !alert.user.is_empty() {
        pairs.push(("user", alert.user.clone()));
    }
    pairs.push(("room", alert.room.clone()));
    pairs.push(("pm_window", "1".to_string()));
    pairs.push(("pm_w", width.to_string()));
    pairs.push(("pm_h", height.to_string()));

    match Url::parse(&raw) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
            url.to_string()
        }
        Err(_) => {
            let query: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, byte_serialize(v.as_bytes()).collect::<String>()))
                .collect();
            format!("{}?{}", raw, query.join("&"))
        }
    }
}

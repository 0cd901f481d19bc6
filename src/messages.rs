/// Inbound requests, their responses, and broadcasts to content scripts

use crate::error::RequestError;
use crate::tab_data::{Anchor, TabId};
use crate::tools::{AlertPayload, Tool};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A decoded request, one variant per action, carrying exactly its fields
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ContentScriptReady { url: Option<String> },
    OpenInActionPopup { tool: Tool },
    OpenInSidebar { tool: Tool },
    OpenToolbarCustomization,
    CloseSidebar,
    OpenToolWindow { tool: Tool },
    OpenToolWindowAt { tool: Tool, anchor: Anchor },
    OpenToolWindowCentered { tool: Tool, percent: Option<f64> },
    ResizeToolForTab { width: Option<f64>, height: Option<f64> },
    GetControllerStatus,
    TriggerControllerTest,
    OpenCheckoutPrices,
    OpenUrl { url: String },
    OpenOptions,
    HideControllerModal,
    ToggleToolbar,
    GetActiveTab,
    GetTabs,
    SwitchTab { tab_id: TabId },
    GetPreviousTab,
    OpenTab { url: String },
    FetchCsvLinks { url: String },
    FetchResource { url: String },
    ToggleDebug { value: bool },
    GenerateQr { text: String, size: u32 },
    Ping,
    OpenQrScanner,
    OpenFloatingToolbar,
    OpenPaytonSidepanel,
    ToggleSidepanelTool { tool: Tool },
    GoBackToPos,
    QrCodeScanned { data: Value, timestamp: Value },
    CloseQrScanner,
    SetStore { store: String, room: Option<String> },
    GetStore,
    CheckSiteStatus { domain: String },
    UpdateDisabledSites { sites: Vec<String> },
    ToggleCurrentSite { enabled: bool, domain: String },
    CheckoutPricesDataUpdated { data: Value },
    OpenAlert { alert: AlertPayload },
    SetUpcHighlighter { enabled: bool },
    HealthCheck,
    ContentScriptAnnounce,
}

/// Wire shape of inbound messages; every field optional so validation can name what is missing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawMessage {
    action: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    tool: Option<String>,
    anchor: Option<Value>,
    percent: Option<Value>,
    width: Option<Value>,
    height: Option<Value>,
    url: Option<String>,
    tab_id: Option<Value>,
    value: Option<Value>,
    text: Option<String>,
    size: Option<Value>,
    data: Option<Value>,
    timestamp: Option<Value>,
    store: Option<String>,
    room: Option<String>,
    domain: Option<String>,
    sites: Option<Value>,
    enabled: Option<Value>,
    user: Option<String>,
}

fn required(field: Option<String>, name: &'static str) -> Result<String, RequestError> {
    field.filter(|s| !s.is_empty()).ok_or(RequestError::Missing(name))
}

fn required_tool(field: Option<String>) -> Result<Tool, RequestError> {
    required(field, "tool").map(|t| Tool::parse(&t))
}

/// Numbers may arrive as JSON numbers or numeric strings
fn number(value: &Option<Value>) -> Option<f64> {
    match value.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn tab_id(value: &Option<Value>) -> Option<TabId> {
    number(value)
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= TabId::MAX as f64)
        .map(|n| n as TabId)
}

impl Request {
    /// Decode an inbound message
    pub fn decode(message: &Value) -> Result<Request, RequestError> {
        let raw: RawMessage =
            serde_json::from_value(message.clone()).map_err(|_| RequestError::Invalid("request"))?;

        if let Some(action) = raw.action.clone() {
            return Request::from_action(&action, raw);
        }

        match raw.kind.as_deref() {
            Some("EXTENSION_HEALTH_CHECK") => Ok(Request::HealthCheck),
            Some("CONTENT_SCRIPT_READY") => Ok(Request::ContentScriptAnnounce),
            _ => Err(RequestError::UnknownAction),
        }
    }

    fn from_action(action: &str, raw: RawMessage) -> Result<Request, RequestError> {
        let request = match action {
            "csReady" => Request::ContentScriptReady { url: raw.url },
            "openInActionPopup" => Request::OpenInActionPopup {
                tool: required_tool(raw.tool)?,
            },
            "openInSidebar" => Request::OpenInSidebar {
                tool: required_tool(raw.tool)?,
            },
            "openToolbarCustomization" => Request::OpenToolbarCustomization,
            "closeSidebar" => Request::CloseSidebar,
            "openToolWindow" => Request::OpenToolWindow {
                tool: required_tool(raw.tool)?,
            },
            "openToolWindowAt" => {
                let tool = required_tool(raw.tool)?;
                let anchor = raw
                    .anchor
                    .map(|a| Anchor {
                        x: number(&a.get("x").cloned()).unwrap_or(0.0),
                        y: number(&a.get("y").cloned()).unwrap_or(0.0),
                    })
                    .unwrap_or_default();
                Request::OpenToolWindowAt { tool, anchor }
            }
            "openToolWindowCentered" => Request::OpenToolWindowCentered {
                tool: required_tool(raw.tool)?,
                percent: number(&raw.percent),
            },
            "resizeToolForTab" => Request::ResizeToolForTab {
                width: number(&raw.width).filter(|w| *w > 0.0),
                height: number(&raw.height).filter(|h| *h > 0.0),
            },
            "getControllerStatus" => Request::GetControllerStatus,
            "triggerControllerTest" => Request::TriggerControllerTest,
            "openCheckoutPrices" => Request::OpenCheckoutPrices,
            "openUrl" => Request::OpenUrl {
                url: required(raw.url, "url")?,
            },
            "OPEN_OPTIONS" => Request::OpenOptions,
            "hideControllerModal" => Request::HideControllerModal,
            "toggleToolbar" => Request::ToggleToolbar,
            "getActiveTab" => Request::GetActiveTab,
            "GET_TABS" => Request::GetTabs,
            "SWITCH_TAB" => Request::SwitchTab {
                tab_id: tab_id(&raw.tab_id).ok_or(RequestError::Missing("tab_id"))?,
            },
            "GET_PREVIOUS_TAB" => Request::GetPreviousTab,
            "OPEN_TAB" => Request::OpenTab {
                url: required(raw.url, "url")?,
            },
            "FETCH_CSV_LINKS" => Request::FetchCsvLinks {
                url: required(raw.url, "url")?,
            },
            "fetchResource" => Request::FetchResource {
                url: required(raw.url, "url")?,
            },
            "toggleDebug" => Request::ToggleDebug {
                value: truthy(&raw.value),
            },
            "generateQr" => Request::GenerateQr {
                text: required(raw.text, "text")?,
                size: number(&raw.size)
                    .filter(|s| *s >= 1.0)
                    .map(|s| s.min(2048.0) as u32)
                    .unwrap_or(256),
            },
            "ping" => Request::Ping,
            "openQRScanner" => Request::OpenQrScanner,
            "openFloatingToolbar" => Request::OpenFloatingToolbar,
            "openPaytonSidepanel" => Request::OpenPaytonSidepanel,
            "toggleSidepanelTool" => Request::ToggleSidepanelTool {
                tool: raw
                    .tool
                    .filter(|t| !t.is_empty())
                    .map(|t| Tool::parse(&t))
                    .unwrap_or(Tool::Settings),
            },
            "goBackToPOS" => Request::GoBackToPos,
            "qrCodeScanned" => Request::QrCodeScanned {
                data: raw.data.unwrap_or(Value::Null),
                timestamp: raw.timestamp.unwrap_or(Value::Null),
            },
            "closeQRScanner" => Request::CloseQrScanner,
            "setStore" => Request::SetStore {
                store: required(raw.store, "store")?,
                room: raw.room.filter(|r| !r.is_empty()),
            },
            "getStore" => Request::GetStore,
            "checkSiteStatus" => Request::CheckSiteStatus {
                domain: required(raw.domain, "domain")?,
            },
            "updateDisabledSites" => {
                let sites = match raw.sites {
                    Some(Value::Array(items)) => items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s),
                            _ => Err(RequestError::Invalid("sites_array")),
                        })
                        .collect::<Result<Vec<String>, RequestError>>()?,
                    _ => return Err(RequestError::Invalid("sites_array")),
                };
                Request::UpdateDisabledSites { sites }
            }
            "toggleCurrentSite" => match (raw.enabled, raw.domain.filter(|d| !d.is_empty())) {
                (Some(Value::Bool(enabled)), Some(domain)) => Request::ToggleCurrentSite { enabled, domain },
                _ => return Err(RequestError::Invalid("parameters")),
            },
            "checkoutPricesDataUpdated" => Request::CheckoutPricesDataUpdated {
                data: raw.data.unwrap_or(Value::Null),
            },
            "openAlert" => Request::OpenAlert {
                alert: AlertPayload::new(raw.text, raw.user, raw.room),
            },
            "setUpcHighlighter" => match raw.enabled {
                Some(Value::Bool(enabled)) => Request::SetUpcHighlighter { enabled },
                _ => return Err(RequestError::Invalid("parameters")),
            },
            _ => return Err(RequestError::UnknownAction),
        };
        Ok(request)
    }

    /// Whether the handler awaits browser work before it can answer
    ///
    /// The listener must keep the reply channel open for these.
    pub fn keeps_channel_open(&self) -> bool {
        !matches!(
            self,
            Request::ContentScriptReady { .. }
                | Request::GetControllerStatus
                | Request::GetPreviousTab
                | Request::Ping
                | Request::CloseQrScanner
                | Request::HealthCheck
                | Request::ContentScriptAnnounce
        )
    }
}

/// A JSON object sent back over the request's reply channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Response(Map<String, Value>);

impl Response {
    /// `{success: true}`
    pub fn ok() -> Self {
        Response::success(json!({}))
    }

    /// `{success: true, ...fields}`
    pub fn success(fields: Value) -> Self {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(true));
        if let Value::Object(fields) = fields {
            body.extend(fields);
        }
        Response(body)
    }

    /// `{success: false, error}`
    pub fn failure(error: impl Into<String>) -> Self {
        Response::raw(json!({ "success": false, "error": error.into() }))
    }

    /// A response with a handler-specific shape
    pub fn raw(body: Value) -> Self {
        match body {
            Value::Object(map) => Response(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Response(map)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_success(&self) -> bool {
        self.get("success").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::UnknownAction => Response::raw(json!({ "ok": false, "error": err.code() })),
            other => Response::failure(other.code()),
        }
    }
}

/// Notifications pushed to every tab's content scripts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action")]
pub enum Broadcast {
    #[serde(rename = "pm-store-changed")]
    StoreChanged { store: String, room: String },
    #[serde(rename = "pm-settings-changed", rename_all = "camelCase")]
    SettingsChanged { disabled_sites: Vec<String> },
    #[serde(rename = "upc-highlighter-settings-changed")]
    UpcHighlighterChanged { enabled: bool },
}

impl Broadcast {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Messages delivered to a single tab's content scripts
pub mod tab_messages {
    use serde_json::{Value, json};

    pub fn toggle_toolbar() -> Value {
        json!({ "type": "TOGGLE_TOOLBAR" })
    }

    pub fn hide_controller_modal() -> Value {
        json!({ "action": "hideControllerModal" })
    }

    pub fn qr_code_scanned(data: &Value, timestamp: &Value) -> Value {
        json!({ "action": "qrCodeScanned", "data": data, "timestamp": timestamp })
    }

    pub fn toolbar_customization_intent() -> Value {
        json!({ "action": "toolbarCustomizationIntent" })
    }
}

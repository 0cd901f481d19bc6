/// Toolbar popup: store picker and tool launcher

use yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use patternfly_yew::prelude::*;
use serde::Serialize;
use serde_json::{Value, json};
use crate::storage::default_room;
use crate::tools::Tool;
use crate::ui::components::{ConnectionStatus, StatusBadge, StoreToggle};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = sendMessage, catch)]
    async fn runtime_send_message(message: JsValue) -> Result<JsValue, JsValue>;
}

pub const STORES: [&str; 2] = ["Southgate", "Taylor"];

/// Buttons offered by the popup, each mapped to one router action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    CheckoutPrices,
    PriceCharting,
    UpcSearch,
    Scout,
    ControllerTesting,
    QrScanner,
    CustomizeToolbar,
    BackToPos,
}

impl Launch {
    pub const ALL: [Launch; 8] = [
        Launch::CheckoutPrices,
        Launch::PriceCharting,
        Launch::UpcSearch,
        Launch::Scout,
        Launch::ControllerTesting,
        Launch::QrScanner,
        Launch::CustomizeToolbar,
        Launch::BackToPos,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Launch::CheckoutPrices => "Checkout Prices",
            Launch::PriceCharting => "Price Charting",
            Launch::UpcSearch => "UPC Search",
            Launch::Scout => "Scout",
            Launch::ControllerTesting => "Controller Testing",
            Launch::QrScanner => "Scan QR Code",
            Launch::CustomizeToolbar => "Customize Toolbar",
            Launch::BackToPos => "Back to POS",
        }
    }

    pub fn message(self) -> Value {
        match self {
            Launch::CheckoutPrices => json!({ "action": "openCheckoutPrices" }),
            Launch::PriceCharting => tool_window(Tool::PriceCharting),
            Launch::UpcSearch => tool_window(Tool::UpcSearch),
            Launch::Scout => tool_window(Tool::Scout),
            Launch::ControllerTesting => {
                json!({ "action": "toggleSidepanelTool", "tool": Tool::ControllerTesting.as_str() })
            }
            Launch::QrScanner => json!({ "action": "openQRScanner" }),
            Launch::CustomizeToolbar => json!({ "action": "openToolbarCustomization" }),
            Launch::BackToPos => json!({ "action": "goBackToPOS" }),
        }
    }
}

fn tool_window(tool: Tool) -> Value {
    json!({ "action": "openToolWindow", "tool": tool.as_str() })
}

pub fn set_store_message(store: &str) -> Value {
    json!({ "action": "setStore", "store": store, "room": default_room(store) })
}

#[derive(Clone, PartialEq)]
enum AppState {
    Idle,
    Busy(String),
    Error(String),
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| AppState::Idle);
    let status = use_state(|| ConnectionStatus::Checking);
    let store = use_state(|| None::<String>);

    // Ping the worker and load the selected store on mount
    {
        let status = status.clone();
        let store = store.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                match send(&json!({ "action": "ping" })).await {
                    Ok(reply) if reply.get("pong").and_then(Value::as_bool) == Some(true) => {
                        status.set(ConnectionStatus::Connected);
                    }
                    Ok(_) => status.set(ConnectionStatus::Unreachable),
                    Err(e) => {
                        log::warn!("ping failed: {}", e);
                        status.set(ConnectionStatus::Unreachable);
                        return;
                    }
                }

                if let Ok(reply) = send(&json!({ "action": "getStore" })).await {
                    let selected = reply
                        .get("store")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string);
                    store.set(selected);
                }
            });
            || ()
        });
    }

    let on_store = {
        let state = state.clone();
        let store = store.clone();
        Callback::from(move |selected: &'static str| {
            let state = state.clone();
            let store = store.clone();
            state.set(AppState::Busy(format!("Switching to {}...", selected)));
            spawn_local(async move {
                match send(&set_store_message(selected)).await {
                    Ok(reply) if reply.get("success").and_then(Value::as_bool) == Some(true) => {
                        store.set(Some(selected.to_string()));
                        state.set(AppState::Idle);
                    }
                    Ok(reply) => {
                        let error = reply.get("error").and_then(Value::as_str).unwrap_or("unknown error");
                        state.set(AppState::Error(format!("Failed to set store: {}", error)));
                    }
                    Err(e) => state.set(AppState::Error(format!("Failed to set store: {}", e))),
                }
            });
        })
    };

    let on_launch = {
        let state = state.clone();
        move |launch: Launch| {
            let state = state.clone();
            Callback::from(move |_: MouseEvent| {
                let state = state.clone();
                spawn_local(async move {
                    if let Err(e) = send(&launch.message()).await {
                        state.set(AppState::Error(format!("{} failed: {}", launch.label(), e)));
                    }
                });
            })
        }
    };

    let is_busy = matches!(*state, AppState::Busy(_));
    let is_offline = *status == ConnectionStatus::Unreachable;

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"PayMore"}</h1>
            <StatusBadge status={*status} />

            {match &*state {
                AppState::Busy(msg) => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{msg}</p>
                    </div>
                },
                AppState::Error(err) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                            {err.clone()}
                        </Alert>
                    </div>
                },
                AppState::Idle => html! {}
            }}

            <div class="message-top-margin">
                <h2 class="stats-title">{"Store"}</h2>
                <StoreToggle
                    stores={STORES.to_vec()}
                    selected={(*store).clone()}
                    onselect={on_store}
                    disabled={is_busy || is_offline}
                />
            </div>

            <div class="flex-column-gap tab-pane-content">
                {for Launch::ALL.iter().map(|launch| html! {
                    <Button
                        onclick={on_launch(*launch)}
                        disabled={is_busy || is_offline}
                        variant={ButtonVariant::Secondary}
                        block={true}
                    >
                        {launch.label()}
                    </Button>
                })}
            </div>

            <p class="footer-popup">
                {concat!("PayMore Extension v", env!("CARGO_PKG_VERSION"))}
            </p>
        </div>
    }
}

async fn send(message: &Value) -> Result<Value, String> {
    let js_message = message
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| e.to_string())?;
    let reply = runtime_send_message(js_message)
        .await
        .map_err(|e| e.as_string().unwrap_or_else(|| format!("{:?}", e)))?;
    serde_wasm_bindgen::from_value(reply).map_err(|e| e.to_string())
}

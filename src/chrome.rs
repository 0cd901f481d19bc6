/// `Browser` backed by the real `chrome.*` extension APIs

use crate::browser::Browser;
use crate::error::BrowserError;
use crate::tab_data::{
    ContentScript, TabId, TabInfo, TabQuery, WindowId, WindowInfo, WindowSpec, WindowUpdate,
    WorkArea,
};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// `chrome.windows.WINDOW_ID_NONE`
const WINDOW_ID_NONE: WindowId = -1;
const SIDE_PANEL_PAGE: &str = "sidepanel.html";

#[wasm_bindgen]
extern "C" {
    // tabs
    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = query, catch)]
    async fn tabs_query(query: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = sendMessage, catch)]
    async fn tabs_send_message(tab_id: u32, message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = create, catch)]
    async fn tabs_create(properties: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = update, catch)]
    async fn tabs_update(tab_id: u32, properties: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = remove, catch)]
    async fn tabs_remove(tab_id: u32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onUpdated"], js_name = addListener)]
    fn add_tab_updated_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onUpdated"], js_name = removeListener)]
    fn remove_tab_updated_listener(callback: &js_sys::Function);

    // scripting
    #[wasm_bindgen(js_namespace = ["chrome", "scripting"], js_name = executeScript, catch)]
    async fn scripting_execute_script(injection: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "scripting"], js_name = insertCSS, catch)]
    async fn scripting_insert_css(injection: JsValue) -> Result<JsValue, JsValue>;

    // windows
    #[wasm_bindgen(js_namespace = ["chrome", "windows"], js_name = create, catch)]
    async fn windows_create(data: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "windows"], js_name = update, catch)]
    async fn windows_update(window_id: i32, info: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "windows"], js_name = remove, catch)]
    async fn windows_remove(window_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "windows"], js_name = getCurrent, catch)]
    async fn windows_get_current() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "windows", "onFocusChanged"], js_name = addListener)]
    fn add_focus_changed_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "windows", "onRemoved"], js_name = addListener)]
    fn add_window_removed_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "system", "display"], js_name = getInfo, catch)]
    async fn display_get_info() -> Result<JsValue, JsValue>;

    // side panel
    #[wasm_bindgen(js_namespace = ["chrome", "sidePanel"], js_name = setOptions, catch)]
    async fn side_panel_set_options(options: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "sidePanel"], js_name = open, catch)]
    async fn side_panel_open(options: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "sidePanel"], js_name = close, catch)]
    async fn side_panel_close(options: JsValue) -> Result<JsValue, JsValue>;

    // action
    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = setPopup, catch)]
    async fn action_set_popup(details: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "action"], js_name = openPopup, catch)]
    async fn action_open_popup() -> Result<JsValue, JsValue>;

    // storage
    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = get, catch)]
    async fn storage_local_get(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "local"], js_name = set, catch)]
    async fn storage_local_set(items: JsValue) -> Result<JsValue, JsValue>;

    // runtime
    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = getURL)]
    fn runtime_get_url(path: &str) -> String;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = getManifest)]
    fn runtime_get_manifest() -> JsValue;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = sendMessage, catch)]
    async fn runtime_send_message(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_name = fetch, catch)]
    async fn global_fetch(url: &str) -> Result<JsValue, JsValue>;
}

// Injected with `scripting.executeScript({func})`; the browser re-parses the
// function source inside the page, so it cannot close over anything.
#[wasm_bindgen(inline_js = "export function fallback_signal() {
    return () => window.postMessage({ source: 'paymore', action: 'showControllerModal' }, '*');
}")]
extern "C" {
    fn fallback_signal() -> js_sys::Function;
}

/// Window lifecycle events forwarded to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    FocusChanged(Option<WindowId>),
    Removed(WindowId),
}

pub type WindowEventSink = Rc<dyn Fn(WindowEvent)>;

pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, BrowserError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| BrowserError::Decode(e.to_string()))
}

pub fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, BrowserError> {
    serde_wasm_bindgen::from_value(value).map_err(|e| BrowserError::Decode(e.to_string()))
}

/// Best-effort text of a rejection value
pub fn js_error_message(err: &JsValue) -> String {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

fn api_error(api: &'static str, err: JsValue) -> BrowserError {
    BrowserError::api(api, js_error_message(&err))
}

type SinkSlot = Rc<RefCell<Option<WindowEventSink>>>;

fn emit(slot: &SinkSlot, event: WindowEvent) {
    // Clone out first so the sink may replace itself
    let sink = slot.borrow().clone();
    match sink {
        Some(sink) => sink(event),
        None => log::debug!("window event with no sink: {:?}", event),
    }
}

pub struct ChromeBrowser {
    window_events: SinkSlot,
}

impl ChromeBrowser {
    pub fn new() -> Self {
        ChromeBrowser {
            window_events: Rc::new(RefCell::new(None)),
        }
    }

    /// Where window focus/removal events go once `watch_windows` runs
    pub fn set_window_event_sink(&self, sink: WindowEventSink) {
        *self.window_events.borrow_mut() = Some(sink);
    }

    async fn fetch(&self, url: &str) -> Result<web_sys::Response, BrowserError> {
        let response: web_sys::Response = global_fetch(url)
            .await
            .map_err(|e| api_error("fetch", e))?
            .dyn_into()
            .map_err(|_| BrowserError::Decode("fetch did not return a Response".to_string()))?;
        if !response.ok() {
            return Err(BrowserError::Http(response.status()));
        }
        Ok(response)
    }
}

impl Default for ChromeBrowser {
    fn default() -> Self {
        ChromeBrowser::new()
    }
}

#[async_trait(?Send)]
impl Browser for ChromeBrowser {
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<TabInfo>, BrowserError> {
        let tabs = tabs_query(to_js(&query)?)
            .await
            .map_err(|e| api_error("tabs.query", e))?;
        from_js(tabs)
    }

    async fn send_to_tab(&self, tab: TabId, message: &Value) -> Result<Value, BrowserError> {
        match tabs_send_message(tab, to_js(message)?).await {
            Ok(response) => Ok(from_js(response).unwrap_or(Value::Null)),
            Err(err) => {
                let message = js_error_message(&err);
                if message.contains("Receiving end does not exist") {
                    Err(BrowserError::NoReceiver)
                } else {
                    Err(BrowserError::api("tabs.sendMessage", message))
                }
            }
        }
    }

    async fn create_tab(&self, url: &str) -> Result<TabInfo, BrowserError> {
        let tab = tabs_create(to_js(&json!({ "url": url, "active": true }))?)
            .await
            .map_err(|e| api_error("tabs.create", e))?;
        from_js(tab)
    }

    async fn activate_tab(&self, tab: TabId) -> Result<TabInfo, BrowserError> {
        let tab = tabs_update(tab, to_js(&json!({ "active": true }))?)
            .await
            .map_err(|e| api_error("tabs.update", e))?;
        from_js(tab)
    }

    async fn remove_tab(&self, tab: TabId) -> Result<(), BrowserError> {
        tabs_remove(tab).await.map_err(|e| api_error("tabs.remove", e))?;
        Ok(())
    }

    async fn wait_for_tab_complete(&self, tab: TabId) -> Result<(), BrowserError> {
        type Listener = Closure<dyn FnMut(JsValue, JsValue)>;

        let slot: Rc<RefCell<Option<Listener>>> = Rc::new(RefCell::new(None));
        let promise = js_sys::Promise::new(&mut |resolve: js_sys::Function, _reject| {
            let own_slot = slot.clone();
            let listener = Listener::new(move |updated: JsValue, change: JsValue| {
                let status = js_sys::Reflect::get(&change, &JsValue::from_str("status"))
                    .ok()
                    .and_then(|s| s.as_string());
                if updated.as_f64() != Some(tab as f64) || status.as_deref() != Some("complete") {
                    return;
                }
                if let Some(listener) = own_slot.borrow().as_ref() {
                    remove_tab_updated_listener(listener.as_ref().unchecked_ref());
                }
                if let Err(err) = resolve.call0(&JsValue::NULL) {
                    log::debug!("tab load resolve failed: {}", js_error_message(&err));
                }
            });

            add_tab_updated_listener(listener.as_ref().unchecked_ref());
            *slot.borrow_mut() = Some(listener);
        });

        let loaded = JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| api_error("tabs.onUpdated", e));
        // The listener has returned by now; dropping it breaks the Rc cycle
        slot.borrow_mut().take();
        loaded
    }

    fn content_scripts(&self) -> Vec<ContentScript> {
        let manifest = runtime_get_manifest();
        let entries = js_sys::Reflect::get(&manifest, &JsValue::from_str("content_scripts"))
            .unwrap_or(JsValue::UNDEFINED);
        if entries.is_undefined() {
            return Vec::new();
        }
        from_js(entries).unwrap_or_else(|err| {
            log::warn!("unreadable content_scripts in manifest: {}", err);
            Vec::new()
        })
    }

    async fn execute_script_file(&self, tab: TabId, file: &str, all_frames: bool) -> Result<(), BrowserError> {
        let injection = json!({
            "target": { "tabId": tab, "allFrames": all_frames },
            "files": [file],
        });
        scripting_execute_script(to_js(&injection)?)
            .await
            .map_err(|e| api_error("scripting.executeScript", e))?;
        Ok(())
    }

    async fn insert_css_file(&self, tab: TabId, file: &str, all_frames: bool) -> Result<(), BrowserError> {
        let injection = json!({
            "target": { "tabId": tab, "allFrames": all_frames },
            "files": [file],
        });
        scripting_insert_css(to_js(&injection)?)
            .await
            .map_err(|e| api_error("scripting.insertCSS", e))?;
        Ok(())
    }

    async fn post_fallback_signal(&self, tab: TabId) -> Result<(), BrowserError> {
        let injection = to_js(&json!({ "target": { "tabId": tab, "allFrames": true } }))?;
        js_sys::Reflect::set(&injection, &JsValue::from_str("func"), &fallback_signal())
            .map_err(|e| api_error("scripting.executeScript", e))?;
        scripting_execute_script(injection)
            .await
            .map_err(|e| api_error("scripting.executeScript", e))?;
        Ok(())
    }

    async fn create_window(&self, spec: &WindowSpec) -> Result<WindowId, BrowserError> {
        let window = windows_create(to_js(spec)?)
            .await
            .map_err(|e| api_error("windows.create", e))?;
        let window: WindowInfo = from_js(window)?;
        Ok(window.id)
    }

    async fn update_window(&self, window: WindowId, update: &WindowUpdate) -> Result<(), BrowserError> {
        windows_update(window, to_js(update)?)
            .await
            .map_err(|e| api_error("windows.update", e))?;
        Ok(())
    }

    async fn navigate_window(&self, window: WindowId, url: &str) -> Result<(), BrowserError> {
        let tabs = tabs_query(to_js(&json!({ "windowId": window }))?)
            .await
            .map_err(|e| api_error("tabs.query", e))?;
        let tabs: Vec<TabInfo> = from_js(tabs)?;
        let tab = tabs
            .into_iter()
            .find_map(|t| t.id)
            .ok_or_else(|| BrowserError::api("tabs.query", format!("no tab in window {}", window)))?;
        tabs_update(tab, to_js(&json!({ "url": url }))?)
            .await
            .map_err(|e| api_error("tabs.update", e))?;
        Ok(())
    }

    async fn remove_window(&self, window: WindowId) -> Result<(), BrowserError> {
        windows_remove(window)
            .await
            .map_err(|e| api_error("windows.remove", e))?;
        Ok(())
    }

    async fn current_window(&self) -> Result<WindowInfo, BrowserError> {
        let window = windows_get_current()
            .await
            .map_err(|e| api_error("windows.getCurrent", e))?;
        from_js(window)
    }

    async fn primary_work_area(&self) -> Result<WorkArea, BrowserError> {
        let displays: Vec<Value> = from_js(
            display_get_info()
                .await
                .map_err(|e| api_error("system.display.getInfo", e))?,
        )?;
        let area = displays
            .into_iter()
            .next()
            .and_then(|display| display.get("workArea").cloned())
            .ok_or_else(|| BrowserError::api("system.display.getInfo", "no displays"))?;
        serde_json::from_value(area).map_err(|e| BrowserError::Decode(e.to_string()))
    }

    fn watch_windows(&self) {
        let focus_slot = self.window_events.clone();
        let removed_slot = self.window_events.clone();

        let on_focus = Closure::<dyn Fn(JsValue)>::new(move |window: JsValue| {
            let focused = window
                .as_f64()
                .map(|id| id as WindowId)
                .filter(|id| *id != WINDOW_ID_NONE);
            emit(&focus_slot, WindowEvent::FocusChanged(focused));
        });
        let on_removed = Closure::<dyn Fn(JsValue)>::new(move |window: JsValue| {
            if let Some(id) = window.as_f64() {
                emit(&removed_slot, WindowEvent::Removed(id as WindowId));
            }
        });

        add_focus_changed_listener(on_focus.as_ref().unchecked_ref());
        add_window_removed_listener(on_removed.as_ref().unchecked_ref());
        // Listeners live as long as the worker
        on_focus.forget();
        on_removed.forget();
    }

    async fn enable_side_panel(&self, tab: Option<TabId>) -> Result<(), BrowserError> {
        let mut options = json!({ "enabled": true, "path": SIDE_PANEL_PAGE });
        if let Some(tab) = tab {
            options["tabId"] = json!(tab);
        }
        side_panel_set_options(to_js(&options)?)
            .await
            .map_err(|e| api_error("sidePanel.setOptions", e))?;
        Ok(())
    }

    async fn open_side_panel(&self, tab: TabId) -> Result<(), BrowserError> {
        side_panel_open(to_js(&json!({ "tabId": tab }))?)
            .await
            .map_err(|e| api_error("sidePanel.open", e))?;
        Ok(())
    }

    async fn close_side_panel(&self, tab: TabId) -> Result<(), BrowserError> {
        side_panel_close(to_js(&json!({ "tabId": tab }))?)
            .await
            .map_err(|e| api_error("sidePanel.close", e))?;
        Ok(())
    }

    async fn set_action_popup(&self, page: &str) -> Result<(), BrowserError> {
        action_set_popup(to_js(&json!({ "popup": page }))?)
            .await
            .map_err(|e| api_error("action.setPopup", e))?;
        Ok(())
    }

    async fn open_action_popup(&self) -> Result<(), BrowserError> {
        action_open_popup()
            .await
            .map_err(|e| api_error("action.openPopup", e))?;
        Ok(())
    }

    async fn storage_get(&self, keys: &[&str]) -> Result<Map<String, Value>, BrowserError> {
        let items = storage_local_get(to_js(keys)?)
            .await
            .map_err(|e| api_error("storage.local.get", e))?;
        from_js(items)
    }

    async fn storage_set(&self, items: Map<String, Value>) -> Result<(), BrowserError> {
        storage_local_set(to_js(&items)?)
            .await
            .map_err(|e| api_error("storage.local.set", e))?;
        Ok(())
    }

    fn extension_url(&self, path: &str) -> String {
        runtime_get_url(path)
    }

    async fn runtime_message(&self, message: &Value) -> Result<(), BrowserError> {
        runtime_send_message(to_js(message)?)
            .await
            .map_err(|e| api_error("runtime.sendMessage", e))?;
        Ok(())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, BrowserError> {
        let response = self.fetch(url).await?;
        let text = response.text().map_err(|e| api_error("fetch", e))?;
        JsFuture::from(text)
            .await
            .map_err(|e| api_error("fetch", e))?
            .as_string()
            .ok_or_else(|| BrowserError::Decode("response body is not text".to_string()))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, BrowserError> {
        let response = self.fetch(url).await?;
        let buffer = response.array_buffer().map_err(|e| api_error("fetch", e))?;
        let buffer = JsFuture::from(buffer).await.map_err(|e| api_error("fetch", e))?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }

    async fn sleep(&self, ms: u32) {
        gloo_timers::future::TimeoutFuture::new(ms).await;
    }

    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

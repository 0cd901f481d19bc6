/// Service worker entry point: builds the coordinator and wires browser events to it

use crate::chrome::{ChromeBrowser, WindowEvent, from_js, js_error_message, to_js};
use crate::commands::{Command, ContextMenuItem};
use crate::coordinator::{Coordinator, InstallReason};
use crate::messages::Response;
use crate::tab_data::TabId;
use serde_json::{Value, json};
use std::rc::{Rc, Weak};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

type Background = Coordinator<ChromeBrowser>;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    fn add_message_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onInstalled"], js_name = addListener)]
    fn add_installed_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onStartup"], js_name = addListener)]
    fn add_startup_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onActivated"], js_name = addListener)]
    fn add_tab_activated_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onRemoved"], js_name = addListener)]
    fn add_tab_removed_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "commands", "onCommand"], js_name = addListener)]
    fn add_command_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "contextMenus", "onClicked"], js_name = addListener)]
    fn add_context_menu_listener(callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ["chrome", "contextMenus"], js_name = removeAll, catch)]
    async fn context_menus_remove_all() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "contextMenus"], js_name = create, catch)]
    fn context_menus_create(properties: JsValue) -> Result<JsValue, JsValue>;
}

fn field(object: &JsValue, name: &str) -> JsValue {
    js_sys::Reflect::get(object, &JsValue::from_str(name)).unwrap_or(JsValue::UNDEFINED)
}

fn tab_id(value: JsValue) -> Option<TabId> {
    value.as_f64().filter(|id| *id >= 0.0).map(|id| id as TabId)
}

/// Register `callback` with an `addListener` binding for the worker's lifetime
fn listen<F>(add: fn(&js_sys::Function), callback: F)
where
    F: Fn(JsValue, JsValue, JsValue) -> JsValue + 'static,
{
    let closure = Closure::<dyn Fn(JsValue, JsValue, JsValue) -> JsValue>::new(callback);
    add(closure.as_ref().unchecked_ref());
    closure.forget();
}

fn reply(send_response: &js_sys::Function, response: Response) {
    let value = match to_js(&response.into_value()) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("could not encode response: {}", err);
            return;
        }
    };
    // Throws when the sender went away before the reply
    if let Err(err) = send_response.call1(&JsValue::NULL, &value) {
        log::debug!("sendResponse failed: {}", js_error_message(&err));
    }
}

async fn install_context_menus() {
    if let Err(err) = context_menus_remove_all().await {
        log::debug!("contextMenus.removeAll failed: {}", js_error_message(&err));
    }
    for item in ContextMenuItem::ALL {
        let properties = json!({ "id": item.id(), "title": item.title(), "contexts": ["selection"] });
        let created = to_js(&properties)
            .map_err(|e| e.to_string())
            .and_then(|props| context_menus_create(props).map_err(|e| js_error_message(&e)));
        if let Err(err) = created {
            log::warn!("contextMenus.create {} failed: {}", item.id(), err);
        }
    }
}

fn wire_window_events(coordinator: &Rc<Background>) {
    let weak: Weak<Background> = Rc::downgrade(coordinator);
    coordinator
        .browser()
        .set_window_event_sink(Rc::new(move |event: WindowEvent| {
            let Some(coordinator) = weak.upgrade() else {
                return;
            };
            match event {
                WindowEvent::FocusChanged(window) => {
                    spawn_local(async move { coordinator.on_window_focus_changed(window).await });
                }
                WindowEvent::Removed(window) => coordinator.on_window_removed(window),
            }
        }));
}

fn wire_runtime_events(coordinator: &Rc<Background>) {
    let handler = coordinator.clone();
    listen(add_message_listener, move |message, sender, send_response| {
        let message: Value = match from_js(message) {
            Ok(message) => message,
            Err(err) => {
                log::debug!("undecodable message: {}", err);
                Value::Null
            }
        };
        let sender_tab = tab_id(field(&field(&sender, "tab"), "id"));
        let send_response: js_sys::Function = send_response.unchecked_into();

        if let Some(response) = handler.respond_now(&message, sender_tab) {
            reply(&send_response, response);
            return JsValue::FALSE;
        }

        let handler = handler.clone();
        spawn_local(async move {
            let response = handler.handle_message(&message, sender_tab).await;
            reply(&send_response, response);
        });
        // Keep the reply channel open until the handler finishes
        JsValue::TRUE
    });

    let installer = coordinator.clone();
    listen(add_installed_listener, move |details, _, _| {
        let reason = InstallReason::parse(&field(&details, "reason").as_string().unwrap_or_default());
        let installer = installer.clone();
        spawn_local(async move { installer.on_installed(reason).await });
        JsValue::UNDEFINED
    });

    let starter = coordinator.clone();
    listen(add_startup_listener, move |_, _, _| {
        let starter = starter.clone();
        spawn_local(async move { starter.on_startup().await });
        JsValue::UNDEFINED
    });
}

fn wire_tab_events(coordinator: &Rc<Background>) {
    let activated = coordinator.clone();
    listen(add_tab_activated_listener, move |info, _, _| {
        if let Some(tab) = tab_id(field(&info, "tabId")) {
            activated.on_tab_activated(tab);
        }
        JsValue::UNDEFINED
    });

    let removed = coordinator.clone();
    listen(add_tab_removed_listener, move |tab, _, _| {
        if let Some(tab) = tab_id(tab) {
            let removed = removed.clone();
            spawn_local(async move { removed.on_tab_removed(tab).await });
        }
        JsValue::UNDEFINED
    });
}

fn wire_user_input(coordinator: &Rc<Background>) {
    let commands = coordinator.clone();
    listen(add_command_listener, move |name, _, _| {
        let name = name.as_string().unwrap_or_default();
        match Command::parse(&name) {
            Some(command) => {
                let commands = commands.clone();
                spawn_local(async move { commands.on_command(command).await });
            }
            None => log::debug!("unhandled command {}", name),
        }
        JsValue::UNDEFINED
    });

    let menus = coordinator.clone();
    listen(add_context_menu_listener, move |info, _, _| {
        let id = field(&info, "menuItemId").as_string().unwrap_or_default();
        let selection = field(&info, "selectionText").as_string().unwrap_or_default();
        if let Some(item) = ContextMenuItem::parse(&id) {
            let menus = menus.clone();
            spawn_local(async move {
                menus.on_context_menu_click(item, &selection).await;
            });
        }
        JsValue::UNDEFINED
    });
}

/// Boot the background service worker
#[wasm_bindgen]
pub fn start_background() {
    let coordinator = Rc::new(Coordinator::new(ChromeBrowser::new()));

    wire_window_events(&coordinator);
    wire_runtime_events(&coordinator);
    wire_tab_events(&coordinator);
    wire_user_input(&coordinator);

    spawn_local(async move {
        install_context_menus().await;
        coordinator.load_debug_flag().await;
        coordinator.initialize().await;
    });
}

/// PayMore - Chrome Extension background coordinator and popup
/// Built with Rust + WASM + Yew

pub mod action_popup;
pub mod browser;
pub mod commands;
pub mod coordinator;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod messages;
pub mod operations;
pub mod placement;
pub mod router;
pub mod side_panel;
pub mod storage;
pub mod tab_data;
pub mod tools;
pub mod tracker;
pub mod windows;
pub mod ui;

// Chrome bindings and event wiring only exist inside the extension
#[cfg(target_arch = "wasm32")]
pub mod chrome;
#[cfg(target_arch = "wasm32")]
mod background;

#[cfg(test)]
mod testing;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the toolbar popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

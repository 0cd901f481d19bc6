/// Opening extension pages in the toolbar action popup
use crate::browser::Browser;
use crate::coordinator::Coordinator;
use crate::messages::tab_messages;
use crate::storage::keys;
use crate::tools::Tool;
use serde_json::{Map, Value};

pub const DEFAULT_ACTION_POPUP: &str = "popup.html";
pub const OPTIONS_ACTION_POPUP: &str = "options.html";
const SIDE_PANEL_PAGE: &str = "sidepanel.html";

pub const TOOLBAR_CUSTOMIZATION_INTENT: &str = "toolbar-customization";
const CUSTOMIZATION_WINDOW_WIDTH: i32 = 480;
const CUSTOMIZATION_WINDOW_HEIGHT: i32 = 640;
const POPUP_NOTIFY_DELAY_MS: u32 = 100;

/// Extension page backing a tool in the action popup, if it can be shown there
pub fn action_popup_page(tool: &Tool) -> Option<&'static str> {
    match tool {
        Tool::Settings => Some(OPTIONS_ACTION_POPUP),
        Tool::ControllerTesting => Some(SIDE_PANEL_PAGE),
        _ => None,
    }
}

impl<B: Browser> Coordinator<B> {
    /// Point the action popup at the page for `tool` and open it
    ///
    /// Returns false for tools the popup cannot host.
    pub async fn open_in_action_popup(&self, tool: &Tool) -> bool {
        let Some(page) = action_popup_page(tool) else {
            log::debug!("unsupported tool for action popup: {}", tool);
            return false;
        };

        let mut items = Map::new();
        items.insert(
            keys::ACTION_POPUP_URL.to_string(),
            Value::String(self.browser.extension_url(page)),
        );
        if let Err(err) = self.browser.storage_set(items).await {
            log::warn!("failed to store action popup url: {}", err);
            return false;
        }

        match self.browser.open_action_popup().await {
            Ok(()) => true,
            Err(err) => {
                log::debug!("openPopup error: {}", err);
                false
            }
        }
    }

    /// Show the options page in the action popup, then put the default popup back
    pub async fn open_options_popup(&self) -> bool {
        let opened = match self.browser.set_action_popup(OPTIONS_ACTION_POPUP).await {
            Ok(()) => self.browser.open_action_popup().await,
            Err(err) => Err(err),
        };

        if let Err(err) = self.browser.set_action_popup(DEFAULT_ACTION_POPUP).await {
            log::warn!("failed to restore default action popup: {}", err);
        }

        match opened {
            Ok(()) => true,
            Err(err) => {
                log::warn!("failed to open options popup: {}", err);
                false
            }
        }
    }

    /// Open the popup in toolbar customization mode
    ///
    /// Falls back to a standalone popup window when the action popup cannot be
    /// opened, and tells the popup page about the intent shortly after.
    pub async fn open_toolbar_customization(&self) {
        let mut items = Map::new();
        items.insert(
            keys::POPUP_INTENT.to_string(),
            Value::String(TOOLBAR_CUSTOMIZATION_INTENT.to_string()),
        );
        if let Err(err) = self.browser.storage_set(items).await {
            log::warn!("failed to store popup intent: {}", err);
        }

        if let Err(err) = self.browser.open_action_popup().await {
            log::debug!("openPopup error: {}; opening popup window instead", err);
            let url = self.browser.extension_url(DEFAULT_ACTION_POPUP);
            self.open_untracked_popup(url, CUSTOMIZATION_WINDOW_WIDTH, CUSTOMIZATION_WINDOW_HEIGHT)
                .await;
        }

        self.browser.sleep(POPUP_NOTIFY_DELAY_MS).await;
        if let Err(err) = self
            .browser
            .runtime_message(&tab_messages::toolbar_customization_intent())
            .await
        {
            log::debug!("toolbar customization notify error: {}", err);
        }
    }
}

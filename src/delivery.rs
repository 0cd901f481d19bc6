/// Best-effort delivery of messages to content scripts

use crate::browser::Browser;
use crate::coordinator::Coordinator;
use crate::domain::is_injectable;
use crate::messages::Broadcast;
use crate::tab_data::{TabId, TabInfo, TabQuery};
use futures::future::join_all;
use serde_json::Value;

pub const INJECTION_SETTLE_MS: u32 = 500;
pub const BLANK_TARGET_URL: &str = "https://example.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A content script received the message on this attempt (1 or 2)
    Delivered { attempt: u8 },
    /// Both sends failed; the in-page fallback signal was posted
    FallbackPosted,
    /// Both sends and the fallback post failed
    FallbackFailed,
}

/// Per-recipient results of a broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<TabId>,
    pub failed: Vec<TabId>,
}

/// Pick the tab a message for "the active tab" should go to
///
/// The active tab if scripts can run there, otherwise the first tab that
/// accepts scripts.
pub fn pick_target(tabs: &[TabInfo]) -> Option<TabId> {
    let injectable = |t: &&TabInfo| t.id.is_some() && is_injectable(t.url());

    tabs.iter()
        .filter(|t| t.active)
        .find(injectable)
        .or_else(|| tabs.iter().find(injectable))
        .and_then(|t| t.id)
}

impl<B: Browser> Coordinator<B> {
    /// Deliver `message` to one tab, escalating through injection and the fallback post
    pub async fn deliver_to_tab(&self, tab: TabId, message: &Value) -> DeliveryOutcome {
        match self.browser.send_to_tab(tab, message).await {
            Ok(response) => {
                log::debug!("message delivered to tab {}; response={}", tab, response);
                return DeliveryOutcome::Delivered { attempt: 1 };
            }
            Err(err) => log::debug!("send attempt 1 to tab {} failed: {}", tab, err),
        }

        log::debug!("injecting content scripts into tab {}", tab);
        self.inject_content_scripts(tab).await;
        self.browser.sleep(INJECTION_SETTLE_MS).await;

        match self.browser.send_to_tab(tab, message).await {
            Ok(response) => {
                log::debug!("message delivered to tab {} after injection; response={}", tab, response);
                return DeliveryOutcome::Delivered { attempt: 2 };
            }
            Err(err) => log::debug!("send attempt 2 to tab {} failed: {}", tab, err),
        }

        log::debug!("final fallback: posting showControllerModal into tab {}", tab);
        match self.browser.post_fallback_signal(tab).await {
            Ok(()) => DeliveryOutcome::FallbackPosted,
            Err(err) => {
                log::warn!("fallback post into tab {} failed: {}", tab, err);
                DeliveryOutcome::FallbackFailed
            }
        }
    }

    /// Re-run every content script the manifest declares; individual failures are ignored
    async fn inject_content_scripts(&self, tab: TabId) {
        for entry in self.browser.content_scripts() {
            for file in &entry.css {
                if let Err(err) = self.browser.insert_css_file(tab, file, entry.all_frames).await {
                    log::debug!("insertCSS {} failed: {}", file, err);
                }
            }
            for file in &entry.js {
                if let Err(err) = self.browser.execute_script_file(tab, file, entry.all_frames).await {
                    log::debug!("executeScript {} failed: {}", file, err);
                }
            }
        }
    }

    /// Deliver to the active tab of the last-focused window
    ///
    /// With no tab that accepts scripts, a blank tab is opened and the message
    /// is delivered once it finishes loading.
    pub async fn send_to_active_tab(&self, message: &Value) -> Option<DeliveryOutcome> {
        log::debug!("sendToActiveTab {}", message);
        let tabs = match self.browser.query_tabs(TabQuery::last_focused_window()).await {
            Ok(tabs) => tabs,
            Err(err) => {
                log::warn!("tabs.query failed: {}", err);
                Vec::new()
            }
        };

        let target = match pick_target(&tabs) {
            Some(tab) => tab,
            None => {
                log::debug!("no injectable tab in the focused window; creating one");
                let created = match self.browser.create_tab(BLANK_TARGET_URL).await {
                    Ok(tab) => tab,
                    Err(err) => {
                        log::warn!("could not create a tab to deliver to: {}", err);
                        return None;
                    }
                };
                let id = created.id?;
                if let Err(err) = self.browser.wait_for_tab_complete(id).await {
                    log::warn!("new tab {} never finished loading: {}", id, err);
                    return None;
                }
                id
            }
        };

        let outcome = self.deliver_to_tab(target, message).await;
        log::debug!("delivery to tab {} finished: {:?}", target, outcome);
        Some(outcome)
    }

    /// Send a notification to every open tab, collecting who got it
    ///
    /// No injection or retries: tabs without a listener are simply recorded as failed.
    pub async fn broadcast(&self, notification: &Broadcast) -> BroadcastReport {
        let tabs = match self.browser.query_tabs(TabQuery::all()).await {
            Ok(tabs) => tabs,
            Err(err) => {
                log::warn!("broadcast skipped, tabs.query failed: {}", err);
                return BroadcastReport::default();
            }
        };

        let message = notification.to_value();
        let ids: Vec<TabId> = tabs.iter().filter_map(|t| t.id).collect();
        let results = join_all(ids.iter().map(|id| self.browser.send_to_tab(*id, &message))).await;

        let mut report = BroadcastReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(_) => report.delivered.push(id),
                Err(_) => report.failed.push(id),
            }
        }
        log::debug!(
            "broadcast {}: {} delivered, {} unreachable",
            message["action"],
            report.delivered.len(),
            report.failed.len()
        );
        report
    }
}

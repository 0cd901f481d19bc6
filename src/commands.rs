/// Keyboard shortcuts and the selection context menu
use crate::browser::Browser;
use crate::coordinator::Coordinator;
use crate::domain::is_injectable;
use crate::messages::{Request, Response, tab_messages};
use crate::tab_data::TabQuery;
use crate::tools::Tool;
use url::Url;
use url::form_urlencoded::byte_serialize;

const EBAY_SOLD_BASE: &str =
    "https://www.ebay.com/sch/i.html?_nkw=iphone+15&_sacat=0&_from=R40&_dmd=2&rt=nc&LH_Sold=1&LH_Complete=1";
const UPC_LOOKUP_BASE: &str = "https://www.upcitemdb.com/upc/";
const GOOGLE_SEARCH_BASE: &str = "https://www.google.com/search?q=";
const PRICE_CHARTING_BASE: &str =
    "https://www.pricecharting.com/search-products?type=prices&q=grand+theft+auto&go=Go";

/// Commands declared in the manifest's `commands` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleToolbar,
    OpenOptions,
    OpenToolbarSidePanel,
}

impl Command {
    pub fn parse(name: &str) -> Option<Command> {
        match name {
            "toggle-toolbar" => Some(Command::ToggleToolbar),
            "open-options" => Some(Command::OpenOptions),
            "open-toolbar-sidepanel" => Some(Command::OpenToolbarSidePanel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMenuItem {
    EbaySold,
    GoogleUpc,
    GoogleMpn,
    UpcLookup,
    PriceCharting,
}

impl ContextMenuItem {
    pub const ALL: [ContextMenuItem; 5] = [
        ContextMenuItem::EbaySold,
        ContextMenuItem::GoogleUpc,
        ContextMenuItem::GoogleMpn,
        ContextMenuItem::UpcLookup,
        ContextMenuItem::PriceCharting,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ContextMenuItem::EbaySold => "pm-search-ebay-sold",
            ContextMenuItem::GoogleUpc => "pm-search-google-upc",
            ContextMenuItem::GoogleMpn => "pm-search-google-mpn",
            ContextMenuItem::UpcLookup => "pm-search-upc",
            ContextMenuItem::PriceCharting => "pm-search-price-charting",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ContextMenuItem::EbaySold => "Search for sold listings on eBay",
            ContextMenuItem::GoogleUpc => "Search for UPC on Google",
            ContextMenuItem::GoogleMpn => "Search for MPN on Google",
            ContextMenuItem::UpcLookup => "Search on UPCItemDB",
            ContextMenuItem::PriceCharting => "Search on PriceCharting",
        }
    }

    pub fn parse(id: &str) -> Option<ContextMenuItem> {
        ContextMenuItem::ALL.into_iter().find(|item| item.id() == id)
    }

    /// Search page for the selected text; `None` for a blank selection
    pub fn search_url(self, selection: &str) -> Option<String> {
        let selection = selection.trim();
        if selection.is_empty() {
            return None;
        }

        let url = match self {
            ContextMenuItem::EbaySold => with_query_param(EBAY_SOLD_BASE, "_nkw", selection),
            ContextMenuItem::PriceCharting => with_query_param(PRICE_CHARTING_BASE, "q", selection),
            ContextMenuItem::UpcLookup => match Url::parse(UPC_LOOKUP_BASE) {
                Ok(mut url) => {
                    if let Ok(mut segments) = url.path_segments_mut() {
                        segments.pop_if_empty().push(selection);
                    }
                    url.to_string()
                }
                Err(_) => format!("{}{}", UPC_LOOKUP_BASE, encode(selection)),
            },
            ContextMenuItem::GoogleUpc => format!("{}{}", GOOGLE_SEARCH_BASE, encode(&format!("UPC for {}", selection))),
            ContextMenuItem::GoogleMpn => format!("{}{}", GOOGLE_SEARCH_BASE, encode(&format!("MPN for {}", selection))),
        };
        Some(url)
    }
}

fn encode(text: &str) -> String {
    byte_serialize(text.as_bytes()).collect()
}

/// Replace one query parameter of `base`, keeping the others in order
fn with_query_param(base: &str, key: &str, value: &str) -> String {
    let Ok(mut url) = Url::parse(base) else {
        return format!("{}?{}={}", base, key, encode(value));
    };

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    match pairs.iter_mut().find(|(k, _)| k == key) {
        Some(pair) => pair.1 = value.to_string(),
        None => pairs.push((key.to_string(), value.to_string())),
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

impl<B: Browser> Coordinator<B> {
    /// `commands.onCommand`
    pub async fn on_command(&self, command: Command) {
        log::debug!("command {:?}", command);
        match command {
            Command::ToggleToolbar => self.toggle_toolbar_in_active_tab().await,
            Command::OpenOptions => {
                self.dispatch(Request::OpenOptions, None).await;
            }
            Command::OpenToolbarSidePanel => {
                self.toggle_side_panel(None, Some(Tool::FloatingToolbar)).await;
            }
        }
    }

    /// One toggle for the focused tab; pages without the content script are skipped
    async fn toggle_toolbar_in_active_tab(&self) {
        let tab = match self.browser.query_tabs(TabQuery::active_in_current_window()).await {
            Ok(tabs) => tabs.into_iter().next(),
            Err(err) => {
                log::warn!("tabs.query failed: {}", err);
                return;
            }
        };
        match tab {
            Some(tab) if is_injectable(tab.url()) => {
                let Some(id) = tab.id else { return };
                if let Err(err) = self.browser.send_to_tab(id, &tab_messages::toggle_toolbar()).await {
                    log::debug!("toggle-toolbar not delivered to tab {}: {}", id, err);
                }
            }
            Some(tab) => log::debug!("toggle-toolbar ignored on {}", tab.url()),
            None => log::debug!("toggle-toolbar: no active tab"),
        }
    }

    /// `contextMenus.onClicked`: open a search for the selection in a new tab
    pub async fn on_context_menu_click(&self, item: ContextMenuItem, selection: &str) -> Option<Response> {
        let url = item.search_url(selection)?;
        match self.browser.create_tab(&url).await {
            Ok(tab) => Some(Response::success(serde_json::json!({ "tabId": tab.id }))),
            Err(err) => {
                log::warn!("failed to open {} search: {}", item.id(), err);
                None
            }
        }
    }
}

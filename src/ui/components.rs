/// Reusable UI components

use yew::prelude::*;

/// Reachability of the background worker, as seen by the popup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Checking,
    Connected,
    Unreachable,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Checking => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Unreachable => "Background unavailable",
        }
    }

    fn color(self) -> &'static str {
        match self {
            ConnectionStatus::Checking => "#9e9e9e",
            ConnectionStatus::Connected => "#4caf50",
            ConnectionStatus::Unreachable => "#f44336",
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct StatusBadgeProps {
    pub status: ConnectionStatus,
}

#[function_component(StatusBadge)]
pub fn status_badge(props: &StatusBadgeProps) -> Html {
    let dot = format!(
        "display: inline-block; width: 8px; height: 8px; border-radius: 50%; margin-right: 6px; background-color: {};",
        props.status.color()
    );

    html! {
        <span class="status-badge">
            <span style={dot}></span>
            {props.status.label()}
        </span>
    }
}

#[derive(Properties, PartialEq)]
pub struct StoreToggleProps {
    pub stores: Vec<&'static str>,
    pub selected: Option<String>,
    pub onselect: Callback<&'static str>,
    #[prop_or(false)]
    pub disabled: bool,
}

/// One segment per store; the selected store is highlighted
#[function_component(StoreToggle)]
pub fn store_toggle(props: &StoreToggleProps) -> Html {
    let base_style = "flex: 1; padding: 8px 12px; border: none; font-size: 13px; cursor: pointer; font-weight: 500; transition: all 0.2s;";

    html! {
        <div class="store-toggle" style="display: flex; border-radius: 4px; overflow: hidden;">
            {for props.stores.iter().map(|store| {
                let store = *store;
                let selected = props.selected.as_deref() == Some(store);
                let variant_style = if selected {
                    "background-color: #5B4FE8; color: white;"
                } else {
                    "background-color: #e0e0e0; color: #333;"
                };
                let onselect = props.onselect.clone();
                html! {
                    <button
                        onclick={Callback::from(move |_: MouseEvent| onselect.emit(store))}
                        disabled={props.disabled}
                        style={format!("{} {}", base_style, variant_style)}
                    >
                        {store}
                    </button>
                }
            })}
        </div>
    }
}

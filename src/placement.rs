/// Window geometry and alert de-duplication
use crate::tab_data::{Anchor, Bounds, WorkArea};
use crate::tools::AlertPayload;

pub const TOOL_MIN_WIDTH: i32 = 420;
pub const TOOL_MIN_HEIGHT: i32 = 360;
pub const CENTERED_MIN_WIDTH: i32 = 500;
pub const CENTERED_MIN_HEIGHT: i32 = 400;
pub const ALERT_WIDTH: i32 = 420;
pub const ALERT_HEIGHT: i32 = 220;
pub const ANCHOR_GAP: i32 = 16;
pub const DEFAULT_ANCHORED_PERCENT: f64 = 0.35;
pub const DEFAULT_CENTERED_PERCENT: f64 = 0.85;
pub const ALERT_COOLDOWN_MS: f64 = 5000.0;
const FINGERPRINT_MAX_CHARS: usize = 512;

fn scaled(extent: i32, percent: f64) -> i32 {
    (extent as f64 * percent).floor() as i32
}

fn usable_percent(percent: f64, fallback: f64) -> f64 {
    if percent.is_finite() && percent > 0.0 { percent } else { fallback }
}

/// Place a window beside an anchor point, fully inside the work area
///
/// The window opens to the left of anchors in the right half of the work area
/// and to the right otherwise, vertically centered on the anchor.
pub fn anchored_bounds(area: &WorkArea, anchor: Anchor, percent: f64) -> Bounds {
    let percent = usable_percent(percent, DEFAULT_ANCHORED_PERCENT);
    let width = TOOL_MIN_WIDTH.max(scaled(area.width, percent));
    let height = TOOL_MIN_HEIGHT.max(scaled(area.height, percent));

    let ax = anchor.x.max(0.0);
    let ay = anchor.y.max(0.0);

    let open_left = ax > area.left as f64 + area.width as f64 * 0.5;
    let left = if open_left {
        (ax - width as f64 - ANCHOR_GAP as f64).floor() as i32
    } else {
        (ax + ANCHOR_GAP as f64).floor() as i32
    };
    let top = (ay - (height / 2) as f64).floor() as i32;

    Bounds {
        left: left.max(area.left).min(area.left + area.width - width),
        top: top.max(area.top).min(area.top + area.height - height),
        width,
        height,
    }
}

/// Center a window covering `percent` of the work area
pub fn centered_bounds(area: &WorkArea, percent: f64) -> Bounds {
    let percent = usable_percent(percent, DEFAULT_CENTERED_PERCENT);
    let width = CENTERED_MIN_WIDTH.max(scaled(area.width, percent));
    let height = CENTERED_MIN_HEIGHT.max(scaled(area.height, percent));

    Bounds {
        left: (area.left + (area.width - width).div_euclid(2)).max(0),
        top: (area.top + (area.height - height).div_euclid(2)).max(0),
        width,
        height,
    }
}

/// Fixed-size alert window, centered horizontally in the upper third
pub fn alert_bounds(area: &WorkArea) -> Bounds {
    Bounds {
        left: (area.left + (area.width - ALERT_WIDTH).div_euclid(2)).max(0),
        top: (area.top + (area.height - ALERT_HEIGHT).div_euclid(3)).max(0),
        width: ALERT_WIDTH,
        height: ALERT_HEIGHT,
    }
}

/// The right-middle of the work area, where the floating toolbar sits
pub fn toolbar_anchor(area: &WorkArea) -> Anchor {
    Anchor {
        x: (area.left + area.width - 72) as f64,
        y: (area.top + area.height / 2) as f64,
    }
}

/// Dedup key for an alert: `room|user|text`, capped at 512 characters
pub fn alert_fingerprint(alert: &AlertPayload) -> String {
    format!("{}|{}|{}", alert.room, alert.user, alert.text)
        .chars()
        .take(FINGERPRINT_MAX_CHARS)
        .collect()
}

/// Remembers the last alert shown and rejects repeats inside the cooldown
#[derive(Debug, Default)]
pub struct AlertGate {
    last: Option<(String, f64)>,
}

impl AlertGate {
    pub fn new() -> Self {
        AlertGate::default()
    }

    /// Returns true (and records the alert) when it should be shown
    pub fn admit(&mut self, fingerprint: String, now_ms: f64) -> bool {
        if let Some((last, at)) = &self.last {
            if *last == fingerprint && now_ms - at < ALERT_COOLDOWN_MS {
                return false;
            }
        }
        self.last = Some((fingerprint, now_ms));
        true
    }
}

use crate::constants::{DIM_LAYER_ARGB, FALLBACK_GLYPH, ICON_SIZE};
use crate::platform::AppIcon;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayAction {
    Dismiss,
    Grace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Badge {
    Icon(AppIcon),
    Glyph(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub action: OverlayAction,
    pub label: String,
    pub enabled: bool,
}

/// What to show for one blocked application, already resolved by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowRequest {
    pub app_id: String,
    pub label: String,
    pub icon: Option<AppIcon>,
}

/// Declarative description of the overlay card. Renderers draw it; nothing
/// here knows how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayContent {
    pub app_id: String,
    pub title: String,
    pub badge: Badge,
    pub message: String,
    pub primary: ActionButton,
    pub grace: Option<ActionButton>,
    pub dim_argb: u32,
    pub icon_size: u16,
}

impl OverlayContent {
    pub fn new(request: ShowRequest, message: &str, grace_delay: Option<Duration>) -> Self {
        let badge = match request.icon {
            Some(icon) => Badge::Icon(icon),
            None => Badge::Glyph(fallback_glyph(&request.label)),
        };
        Self {
            app_id: request.app_id,
            title: request.label,
            badge,
            message: message.to_string(),
            primary: ActionButton {
                action: OverlayAction::Dismiss,
                label: "Close".into(),
                enabled: true,
            },
            grace: grace_delay.map(|delay| ActionButton {
                action: OverlayAction::Grace,
                label: format!("Wait {}s", delay.as_secs()),
                enabled: true,
            }),
            dim_argb: DIM_LAYER_ARGB,
            icon_size: ICON_SIZE,
        }
    }

    /// Disable the grace button and relabel it. Returns false when there is no
    /// grace button or it was already pressed.
    pub fn mark_grace_pending(&mut self, delay: Duration) -> bool {
        match self.grace.as_mut() {
            Some(button) if button.enabled => {
                button.enabled = false;
                button.label = format!("Closing in {}s...", delay.as_secs());
                true
            }
            Some(_) | None => false,
        }
    }
}

/// Uppercase first character of the label, or `?` for a blank label.
pub fn fallback_glyph(label: &str) -> char {
    label
        .trim()
        .chars()
        .next()
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or(FALLBACK_GLYPH)
}

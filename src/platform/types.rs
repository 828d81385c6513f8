use crate::error::AppError;
use crate::overlay::OverlayContent;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// "The foreground application changed to `app_id`", stamped in Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundEvent {
    pub app_id: String,
    pub observed_at: u64,
}

impl ForegroundEvent {
    pub fn new(app_id: &str, observed_at: u64) -> Self {
        Self {
            app_id: app_id.to_string(),
            observed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformEventKind {
    WindowStateChanged,
    WindowContentChanged,
    ViewFocused,
    #[serde(other)]
    Other,
}

/// Raw event as delivered by a platform source. Only window-state changes
/// naming a package are foreground changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub kind: PlatformEventKind,
    #[serde(default)]
    pub package: Option<String>,
    pub timestamp: u64,
}

impl PlatformEvent {
    pub fn into_foreground(self) -> Option<ForegroundEvent> {
        match self.kind {
            PlatformEventKind::WindowStateChanged => {}
            PlatformEventKind::WindowContentChanged
            | PlatformEventKind::ViewFocused
            | PlatformEventKind::Other => return None,
        }
        let package = self.package?;
        let package = package.trim();
        if package.is_empty() {
            return None;
        }
        Some(ForegroundEvent::new(package, self.timestamp))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppIcon {
    /// Encoded PNG bytes.
    Png(Vec<u8>),
    /// Icon theme name, resolved by the renderer.
    Named(String),
    Path(PathBuf),
}

/// Best-effort display data for an application. Both fields may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppInfo {
    pub label: Option<String>,
    pub icon: Option<AppIcon>,
}

/// Fire-and-forget "go to the home screen".
pub trait HomeScreen: Send {
    fn go_home(&self);
}

/// Overlay permission. Queried before every show, never cached.
pub trait OverlayPermission: Send {
    fn is_granted(&self) -> bool;

    /// Ask the user to grant the permission. How that is presented is up to the platform.
    fn request(&self);
}

pub trait AppCatalog: Send {
    fn app_info(&self, app_id: &str) -> AppInfo;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Draws overlay content above every other application.
pub trait OverlaySurface: Send {
    fn attach(&mut self, content: &OverlayContent) -> Result<SurfaceId, AppError>;

    fn update(&mut self, id: SurfaceId, content: &OverlayContent) -> Result<(), AppError>;

    /// May fail if the platform already reclaimed the surface.
    fn release(&mut self, id: SurfaceId) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_state_change_becomes_foreground_event() {
        let event = PlatformEvent {
            kind: PlatformEventKind::WindowStateChanged,
            package: Some(" com.video.app ".into()),
            timestamp: 42,
        };
        assert_eq!(
            event.into_foreground(),
            Some(ForegroundEvent::new("com.video.app", 42))
        );
    }

    #[test]
    fn test_other_kinds_are_ignored() {
        for kind in [
            PlatformEventKind::WindowContentChanged,
            PlatformEventKind::ViewFocused,
            PlatformEventKind::Other,
        ] {
            let event = PlatformEvent {
                kind,
                package: Some("com.video.app".into()),
                timestamp: 0,
            };
            assert_eq!(event.into_foreground(), None);
        }
    }

    #[test]
    fn test_missing_package_is_ignored() {
        let event = PlatformEvent {
            kind: PlatformEventKind::WindowStateChanged,
            package: None,
            timestamp: 0,
        };
        assert_eq!(event.into_foreground(), None);
    }

    #[test]
    fn test_unknown_kind_deserializes_as_other() {
        let raw = r#"{"kind":"notification_posted","package":"com.a","timestamp":1}"#;
        let event: PlatformEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, PlatformEventKind::Other);
    }
}

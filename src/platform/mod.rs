//! Platform seams: foreground source, home screen, overlay permission, app
//! catalog and overlay surface.
//!
//! The monitor only ever sees the traits in [`types`]. On Linux with an X11
//! display the [`linux`] backend provides them; anywhere else the headless
//! stand-ins log instead of acting, and foreground events must arrive over the
//! native messaging host.

pub mod catalog;
pub mod headless;
pub mod permission;
pub mod types;

#[cfg(target_os = "linux")]
pub mod linux;

pub use types::{
    AppCatalog, AppIcon, AppInfo, ForegroundEvent, HomeScreen, OverlayPermission,
    OverlaySurface, PlatformEvent, PlatformEventKind, SurfaceId,
};

use crate::monitor::MonitorHandle;
use catalog::DesktopEntryCatalog;
use headless::{HeadlessHome, LogSurface};
use permission::ConfigFilePermission;
use std::path::Path;
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

/// The capabilities the monitor needs from the host system.
pub struct Platform {
    pub home: Box<dyn HomeScreen>,
    pub permission: Box<dyn OverlayPermission>,
    pub catalog: Box<dyn AppCatalog>,
    pub surface: Box<dyn OverlaySurface>,
}

impl Platform {
    pub fn headless(config_path: &Path) -> Self {
        Self {
            home: Box::new(HeadlessHome),
            permission: Box::new(ConfigFilePermission::new(config_path)),
            catalog: Box::new(DesktopEntryCatalog::from_xdg()),
            surface: Box::new(LogSurface::default()),
        }
    }

    /// Best available backend for this machine.
    ///
    /// Overlay taps are reported back through `handle`.
    pub fn native(config_path: &Path, handle: &MonitorHandle) -> Self {
        #[cfg(target_os = "linux")]
        {
            match linux::X11Backend::connect(handle) {
                Ok(backend) => {
                    log::info!("Using X11 backend");
                    return Self {
                        home: Box::new(backend.home),
                        permission: Box::new(ConfigFilePermission::new(config_path)),
                        catalog: Box::new(DesktopEntryCatalog::from_xdg()),
                        surface: Box::new(backend.surface),
                    };
                }
                Err(e) => log::warn!("X11 unavailable, running headless: {e}"),
            }
        }

        #[cfg(not(target_os = "linux"))]
        let _ = handle;

        Self::headless(config_path)
    }
}

/// A foreground source thread blocked on its event stream, plus the means to
/// wake it for shutdown.
pub struct ForegroundSource {
    thread: JoinHandle<()>,
    wake: Box<dyn FnOnce() + Send>,
}

impl ForegroundSource {
    /// `wake` must make `thread` return promptly.
    pub fn new(thread: JoinHandle<()>, wake: Box<dyn FnOnce() + Send>) -> Self {
        Self { thread, wake }
    }

    /// Wake the thread and wait for it to finish.
    pub fn stop(self) {
        (self.wake)();
        if self.thread.join().is_err() {
            log::warn!("Foreground source panicked");
        }
    }
}

/// Start the native foreground-change source, if this platform has one.
pub fn start_foreground_source(handle: &MonitorHandle) -> Option<ForegroundSource> {
    #[cfg(target_os = "linux")]
    {
        match linux::spawn_foreground_source(handle.clone()) {
            Ok(source) => Some(source),
            Err(e) => {
                log::warn!("No native foreground source, relying on the native host: {e}");
                None
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = handle;
        log::info!("No native foreground source on this platform, relying on the native host");
        None
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

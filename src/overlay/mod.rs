//! Overlay renderer: owns the single overlay instance and its timers.
//!
//! At most one surface exists at a time. Every exit path (user tap, auto
//! timeout, grace delay, deactivation) goes through [`OverlayRenderer::dismiss`],
//! which releases the surface exactly once. Timers are never cancelled; a timer
//! whose token is no longer the overlay's current one is ignored when it fires.

pub mod content;

pub use content::{fallback_glyph, ActionButton, Badge, OverlayAction, OverlayContent, ShowRequest};

use crate::config::Config;
use crate::error::AppError;
use crate::platform::{OverlayPermission, OverlaySurface, SurfaceId};
use crate::scheduler::{Deferred, Scheduler, TimerToken};
use log::{debug, info, warn};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySettings {
    pub auto_dismiss: Duration,
    pub grace_delay: Duration,
    pub grace_enabled: bool,
    pub message: String,
}

impl From<&Config> for OverlaySettings {
    fn from(config: &Config) -> Self {
        Self {
            auto_dismiss: config.auto_dismiss(),
            grace_delay: config.grace_delay(),
            grace_enabled: config.grace_enabled,
            message: config.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowingOverlay {
    pub app_id: String,
    pub started_at: u64,
    pub dismiss_timer: TimerToken,
    pub grace_pending: bool,
    pub content: OverlayContent,
    surface: SurfaceId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayState {
    Hidden,
    Showing(ShowingOverlay),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Shown,
    PermissionDenied,
    AlreadyShowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    User,
    AutoTimeout,
    GraceElapsed,
    Deactivated,
}

pub struct OverlayRenderer {
    permission: Box<dyn OverlayPermission>,
    surface: Box<dyn OverlaySurface>,
    settings: OverlaySettings,
    state: OverlayState,
    next_token: u64,
}

impl OverlayRenderer {
    pub fn new(
        permission: Box<dyn OverlayPermission>,
        surface: Box<dyn OverlaySurface>,
        settings: OverlaySettings,
    ) -> Self {
        Self {
            permission,
            surface,
            settings,
            state: OverlayState::Hidden,
            next_token: 0,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn is_showing(&self) -> bool {
        matches!(self.state, OverlayState::Showing(_))
    }

    /// Show the overlay for one blocked application.
    ///
    /// Missing permission and an overlay that is already up are reported as
    /// outcomes, not errors. Only a platform failure to attach is an error.
    pub fn show(
        &mut self,
        request: ShowRequest,
        now_ms: u64,
        scheduler: &mut dyn Scheduler,
    ) -> Result<ShowOutcome, AppError> {
        if self.is_showing() {
            return Ok(ShowOutcome::AlreadyShowing);
        }
        if !self.permission.is_granted() {
            return Ok(ShowOutcome::PermissionDenied);
        }

        let grace = self.settings.grace_enabled.then_some(self.settings.grace_delay);
        let content = OverlayContent::new(request, &self.settings.message, grace);
        let surface = self.surface.attach(&content)?;

        let token = self.allocate_token();
        scheduler.schedule(self.settings.auto_dismiss, Deferred::AutoDismiss(token));

        info!("Overlay displayed for {}", content.app_id);
        self.state = OverlayState::Showing(ShowingOverlay {
            app_id: content.app_id.clone(),
            started_at: now_ms,
            dismiss_timer: token,
            grace_pending: false,
            content,
            surface,
        });
        Ok(ShowOutcome::Shown)
    }

    pub fn request_permission(&self) {
        self.permission.request();
    }

    /// Tear the overlay down. Returns true if a surface was released; calling
    /// it while hidden is a no-op.
    pub fn dismiss(&mut self, reason: DismissReason) -> bool {
        match std::mem::replace(&mut self.state, OverlayState::Hidden) {
            OverlayState::Hidden => false,
            OverlayState::Showing(showing) => {
                if let Err(e) = self.surface.release(showing.surface) {
                    debug!("Overlay surface for {} already gone: {e}", showing.app_id);
                }
                info!("Overlay removed ({reason:?})");
                true
            }
        }
    }

    pub fn on_action(&mut self, action: OverlayAction, scheduler: &mut dyn Scheduler) {
        match action {
            OverlayAction::Dismiss => {
                self.dismiss(DismissReason::User);
            }
            OverlayAction::Grace => self.start_grace(scheduler),
        }
    }

    /// A dismiss timer fired. Only the overlay's current token has any effect.
    pub fn on_timer(&mut self, token: TimerToken, reason: DismissReason) -> bool {
        match &self.state {
            OverlayState::Showing(showing) if showing.dismiss_timer == token => {
                self.dismiss(reason)
            }
            OverlayState::Showing(_) | OverlayState::Hidden => {
                debug!("Ignoring stale overlay timer {token:?}");
                false
            }
        }
    }

    fn start_grace(&mut self, scheduler: &mut dyn Scheduler) {
        if !self.settings.grace_enabled {
            debug!("Grace action disabled, ignoring");
            return;
        }
        let token = self.allocate_token();
        let delay = self.settings.grace_delay;

        let OverlayState::Showing(showing) = &mut self.state else {
            return;
        };
        if showing.grace_pending || !showing.content.mark_grace_pending(delay) {
            return;
        }
        if let Err(e) = self.surface.update(showing.surface, &showing.content) {
            warn!("Failed to update overlay for grace delay: {e}");
        }
        showing.grace_pending = true;
        // Replacing the token retires the pending auto-dismiss.
        showing.dismiss_timer = token;
        scheduler.schedule(delay, Deferred::GraceElapsed(token));
        info!("Grace delay started for {}", showing.app_id);
    }

    fn allocate_token(&mut self) -> TimerToken {
        self.next_token += 1;
        TimerToken(self.next_token)
    }
}

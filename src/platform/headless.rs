//! Stand-ins used when no display backend is available.

use super::{HomeScreen, OverlaySurface, SurfaceId};
use crate::error::AppError;
use crate::overlay::OverlayContent;
use log::info;

pub struct HeadlessHome;

impl HomeScreen for HeadlessHome {
    fn go_home(&self) {
        info!("Home screen requested (no display backend)");
    }
}

/// Logs overlay content instead of drawing it.
#[derive(Debug, Default)]
pub struct LogSurface {
    next_id: u64,
    attached: Option<SurfaceId>,
}

impl OverlaySurface for LogSurface {
    fn attach(&mut self, content: &OverlayContent) -> Result<SurfaceId, AppError> {
        self.next_id += 1;
        let id = SurfaceId(self.next_id);
        self.attached = Some(id);
        info!("[overlay] {}: {}", content.title, content.message);
        Ok(id)
    }

    fn update(&mut self, id: SurfaceId, content: &OverlayContent) -> Result<(), AppError> {
        if self.attached != Some(id) {
            return Err(AppError::Platform(format!("surface {id:?} is not attached")));
        }
        if let Some(grace) = &content.grace {
            info!("[overlay] {}", grace.label);
        }
        Ok(())
    }

    fn release(&mut self, id: SurfaceId) -> Result<(), AppError> {
        if self.attached.take() != Some(id) {
            return Err(AppError::Platform(format!("surface {id:?} is not attached")));
        }
        Ok(())
    }
}

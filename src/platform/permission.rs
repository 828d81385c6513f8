use super::OverlayPermission;
use crate::config::Config;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Overlay permission backed by the `overlayAllowed` setting.
///
/// Desktop systems have no runtime overlay permission, so the user grants it
/// by editing the config file. The file is re-read on every query; a change
/// takes effect on the next block without a restart.
pub struct ConfigFilePermission {
    path: PathBuf,
}

impl ConfigFilePermission {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl OverlayPermission for ConfigFilePermission {
    fn is_granted(&self) -> bool {
        match Config::load(&self.path) {
            Ok(config) => config.overlay_allowed,
            Err(e) => {
                warn!("Could not read {}: {e}", self.path.display());
                false
            }
        }
    }

    fn request(&self) {
        info!(
            "Overlay is disabled. Set \"overlayAllowed\": true in {} to show it",
            self.path.display()
        );
    }
}

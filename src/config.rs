use crate::constants::{
    DEFAULT_AUTO_DISMISS, DEFAULT_BLOCKED_MESSAGE, DEFAULT_GRACE_DELAY, DEFAULT_REDIRECT_DELAY,
};
use crate::error::AppError;
use crate::validation::validate_delay_ms;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

/// User-tunable settings, stored as JSON next to the other project files.
///
/// Unknown keys are ignored and missing keys fall back to defaults, so older
/// files keep loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub redirect_delay_ms: u64,
    pub auto_dismiss_ms: u64,
    pub grace_delay_ms: u64,
    pub grace_enabled: bool,
    /// Desktop stand-in for the platform overlay permission.
    pub overlay_allowed: bool,
    pub message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redirect_delay_ms: millis(DEFAULT_REDIRECT_DELAY),
            auto_dismiss_ms: millis(DEFAULT_AUTO_DISMISS),
            grace_delay_ms: millis(DEFAULT_GRACE_DELAY),
            grace_enabled: true,
            overlay_allowed: false,
            message: DEFAULT_BLOCKED_MESSAGE.to_string(),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Config {
    /// Read the config file, writing the defaults first if it does not exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            let config = Self::default();
            let formatted = serde_json::to_string_pretty(&config)?;
            fs::write(path, format!("{formatted}\n"))?;
            log::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_delay_ms("redirectDelayMs", self.redirect_delay_ms)?;
        validate_delay_ms("autoDismissMs", self.auto_dismiss_ms)?;
        validate_delay_ms("graceDelayMs", self.grace_delay_ms)?;
        if self.message.trim().is_empty() {
            return Err(AppError::InvalidInput {
                field: "message",
                reason: "cannot be empty".into(),
            });
        }
        Ok(())
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn auto_dismiss(&self) -> Duration {
        Duration::from_millis(self.auto_dismiss_ms)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }
}

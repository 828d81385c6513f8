use crate::constants::{MAX_APP_ID_LEN, MAX_BLOCKED_APPS};
use crate::error::AppError;
use std::collections::BTreeSet;

/// Validate a single application identifier.
/// Returns the trimmed identifier if valid.
pub fn validate_app_id(app_id: &str) -> Result<&str, AppError> {
    let app_id = app_id.trim();
    if app_id.is_empty() {
        return Err(AppError::InvalidInput {
            field: "app_id",
            reason: "cannot be empty".into(),
        });
    }
    if app_id.len() > MAX_APP_ID_LEN {
        return Err(AppError::InvalidInput {
            field: "app_id",
            reason: format!("cannot exceed {MAX_APP_ID_LEN} characters"),
        });
    }
    if app_id.chars().any(char::is_control) {
        return Err(AppError::InvalidInput {
            field: "app_id",
            reason: "cannot contain control characters".into(),
        });
    }
    Ok(app_id)
}

/// Validate a complete block list as received from the editing surface.
///
/// Identifiers are trimmed and de-duplicated. A single malformed entry rejects
/// the whole list: a partially applied list would be neither the old nor the new value.
pub fn validate_block_list<I, S>(apps: I) -> Result<BTreeSet<String>, AppError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = BTreeSet::new();
    for app in apps {
        set.insert(validate_app_id(app.as_ref())?.to_string());
        if set.len() > MAX_BLOCKED_APPS {
            return Err(AppError::InvalidInput {
                field: "apps",
                reason: format!("cannot exceed {MAX_BLOCKED_APPS} entries"),
            });
        }
    }
    Ok(set)
}

/// Validate a timer delay in milliseconds. Zero would run the callback in the same turn.
pub fn validate_delay_ms(field: &'static str, delay_ms: u64) -> Result<u64, AppError> {
    if delay_ms == 0 {
        return Err(AppError::InvalidInput {
            field,
            reason: "must be positive".into(),
        });
    }
    const MAX_DELAY_MS: u64 = 60 * 1000;
    if delay_ms > MAX_DELAY_MS {
        return Err(AppError::InvalidInput {
            field,
            reason: format!("cannot exceed {MAX_DELAY_MS} ms"),
        });
    }
    Ok(delay_ms)
}

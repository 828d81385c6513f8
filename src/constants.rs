// src/constants.rs

use std::time::Duration;

/// Store key holding the blocked application identifiers
pub const BLOCKED_APPS_KEY: &str = "blocked_apps";

/// Broadcast action fired by the editing surface after it rewrites the block list
pub const UPDATE_BLOCKED_APPS_ACTION: &str = "UPDATE_BLOCKED_APPS";

/// Extra carrying the new block list inside an `UPDATE_BLOCKED_APPS` broadcast
pub const APPS_EXTRA: &str = "apps";

/// Minimum time between two block actions, in milliseconds
pub const DEBOUNCE_WINDOW_MS: u64 = 1000;

/// Default delay before the home-screen redirect runs
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_millis(150);

/// Default lifetime of an overlay nobody interacts with
pub const DEFAULT_AUTO_DISMISS: Duration = Duration::from_millis(3000);

/// Default delay between pressing the grace action and the overlay going away
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_secs(5);

/// Message shown on the overlay card
pub const DEFAULT_BLOCKED_MESSAGE: &str = "Blocked";

/// Semi-transparent black behind the card (ARGB)
pub const DIM_LAYER_ARGB: u32 = 0xAA00_0000;

/// Edge length of the icon (or fallback glyph) on the card
pub const ICON_SIZE: u16 = 80;

/// Glyph used when neither an icon nor a usable label exists
pub const FALLBACK_GLYPH: char = '?';

/// Maximum length of a single application identifier
pub const MAX_APP_ID_LEN: usize = 255;

/// Maximum number of identifiers accepted in one block list
pub const MAX_BLOCKED_APPS: usize = 1000;

/// Native messaging frames are capped at 1MB (1024 * 1024 bytes)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

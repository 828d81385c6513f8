//! In-process broadcast bus carrying block-list updates from the editing surface.
//!
//! Delivery is best effort and at-least-once: receivers must treat every
//! broadcast as an idempotent replace.

use crate::constants::APPS_EXTRA;
use crate::db::safe_lock;
use crate::error::AppError;
use crate::validation::validate_block_list;
use crate::store::BlockSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A named broadcast with a JSON object of extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub action: String,
    #[serde(default)]
    pub extras: Map<String, Value>,
}

impl Broadcast {
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            extras: Map::new(),
        }
    }

    #[must_use]
    pub fn with_string_list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = values.into_iter().map(|v| Value::String(v.into())).collect();
        self.extras.insert(key.to_string(), Value::Array(list));
        self
    }

    /// Read a string array extra. Non-string entries are skipped; a missing or
    /// non-array extra yields `None`.
    pub fn string_list(&self, key: &str) -> Option<Vec<String>> {
        let items = self.extras.get(key)?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }

    /// Decode the validated block list carried under `apps`.
    pub fn block_set(&self) -> Result<BlockSet, AppError> {
        let apps = self.string_list(APPS_EXTRA).ok_or_else(|| AppError::InvalidInput {
            field: "apps",
            reason: "missing or not a list".into(),
        })?;
        validate_block_list(apps)
    }
}

pub type Receiver = Arc<dyn Fn(&Broadcast) + Send + Sync>;

/// Handle returned by [`SyncChannel::register`], needed to unregister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    id: u64,
    action: String,
}

impl Registration {
    pub fn action(&self) -> &str {
        &self.action
    }
}

struct Entry {
    id: u64,
    action: String,
    receiver: Receiver,
}

#[derive(Default)]
pub struct SyncChannel {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl SyncChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, action: &str, receiver: Receiver) -> Result<Registration, AppError> {
        let action = action.trim();
        if action.is_empty() {
            return Err(AppError::Registration {
                channel: "sync channel",
                reason: "action cannot be empty".into(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        safe_lock(&self.entries, "Sync channel").push(Entry {
            id,
            action: action.to_string(),
            receiver,
        });
        log::debug!("Registered receiver {id} for {action}");
        Ok(Registration {
            id,
            action: action.to_string(),
        })
    }

    /// Returns false if the registration was already gone.
    pub fn unregister(&self, registration: &Registration) -> bool {
        let mut entries = safe_lock(&self.entries, "Sync channel");
        let before = entries.len();
        entries.retain(|e| e.id != registration.id);
        entries.len() != before
    }

    /// Deliver to every receiver registered for the broadcast's action.
    /// Returns how many receivers were invoked.
    pub fn broadcast(&self, broadcast: &Broadcast) -> usize {
        let targets: Vec<Receiver> = safe_lock(&self.entries, "Sync channel")
            .iter()
            .filter(|e| e.action == broadcast.action)
            .map(|e| Arc::clone(&e.receiver))
            .collect();

        if targets.is_empty() {
            log::debug!("No receivers for {}", broadcast.action);
        }
        for receiver in &targets {
            receiver(broadcast);
        }
        targets.len()
    }

    pub fn receiver_count(&self, action: &str) -> usize {
        safe_lock(&self.entries, "Sync channel")
            .iter()
            .filter(|e| e.action == action)
            .count()
    }
}

//! Durable key/value store for block lists.
//!
//! Values are sets of application identifiers kept as sorted JSON arrays in the
//! `preferences` table. Writes that do not change the stored value are no-ops
//! and do not wake listeners, so a monitor writing back what it was just told
//! cannot start a notify/write loop.

use crate::db::{safe_lock, with_connection, Database};
use crate::error::AppError;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Set of blocked application identifiers.
pub type BlockSet = BTreeSet<String>;

/// Callback fired after a key's value changed. Receives the key and the new value.
pub type ChangeListener = Arc<dyn Fn(&str, &BlockSet) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    key: String,
    listener: ChangeListener,
}

pub struct BlockListStore {
    db: Arc<Mutex<Database>>,
    listeners: Mutex<Vec<Subscription>>,
    next_listener: AtomicU64,
}

impl BlockListStore {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self {
            db,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Load the set stored under `key`. A key that was never written is the empty set.
    pub fn get(&self, key: &str) -> Result<BlockSet, AppError> {
        let raw: Option<String> = with_connection(&self.db, "load preference", |conn| {
            conn.query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
        })?;

        match raw {
            Some(raw) => {
                let apps: Vec<String> = serde_json::from_str(&raw)?;
                Ok(apps.into_iter().collect())
            }
            None => Ok(BlockSet::new()),
        }
    }

    /// Replace the set stored under `key` (last writer wins).
    ///
    /// Returns whether the stored value changed. Listeners run only on change,
    /// after the database lock has been released.
    pub fn put(&self, key: &str, apps: &BlockSet) -> Result<bool, AppError> {
        let value = serde_json::to_string(apps)?;
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0);

        let changed = with_connection(&self.db, "save preference", |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT value FROM preferences WHERE key = ?1",
                    [key],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.as_deref() == Some(value.as_str()) {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, updated_at],
            )?;
            Ok(true)
        })?;

        if changed {
            self.notify(key, apps);
        }
        Ok(changed)
    }

    /// Register a change listener for `key`.
    pub fn subscribe(&self, key: &str, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        safe_lock(&self.listeners, "Store listeners").push(Subscription {
            id,
            key: key.to_string(),
            listener,
        });
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = safe_lock(&self.listeners, "Store listeners");
        let before = listeners.len();
        listeners.retain(|s| s.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, key: &str) -> usize {
        safe_lock(&self.listeners, "Store listeners")
            .iter()
            .filter(|s| s.key == key)
            .count()
    }

    fn notify(&self, key: &str, apps: &BlockSet) {
        let targets: Vec<ChangeListener> = safe_lock(&self.listeners, "Store listeners")
            .iter()
            .filter(|s| s.key == key)
            .map(|s| Arc::clone(&s.listener))
            .collect();

        for listener in targets {
            listener(key, apps);
        }
    }
}

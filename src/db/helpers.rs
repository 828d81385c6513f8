// src/db/helpers.rs

use crate::db::Database;
use crate::error::AppError;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lock a mutex, recovering from poisoning if necessary
pub fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("{context} mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Execute a database operation with lock recovery and error logging.
///
/// # Example
/// ```ignore
/// with_connection(&db, "load blocked apps", |conn| {
///     conn.query_row("SELECT value FROM preferences WHERE key = ?1", [key], |row| row.get(0))
/// })
/// ```
pub fn with_connection<F, T>(
    db: &Arc<Mutex<Database>>,
    operation: &str,
    f: F,
) -> Result<T, AppError>
where
    F: FnOnce(&Connection) -> rusqlite::Result<T>,
{
    let db = safe_lock(db, "Database");
    f(db.connection()).map_err(|e| {
        log::error!("Failed to {operation}: {e}");
        AppError::from(e)
    })
}

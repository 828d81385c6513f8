pub mod schema;
pub mod migrations;
pub mod helpers;
pub use helpers::{safe_lock, with_connection};

use rusqlite::{Connection, Result};
use std::path::Path;
use std::time::Duration;

/// The editing surface writes the same file, so wait briefly instead of failing on its lock.
const BUSY_TIMEOUT: Duration = Duration::from_millis(500);

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Open and migrate in one step.
    pub fn open_migrated(path: &Path) -> Result<Self> {
        let db = Self::open(path)?;
        migrations::run(db.connection())?;
        Ok(db)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

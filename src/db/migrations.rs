use rusqlite::{Connection, Result};
use super::schema::{SCHEMA, SCHEMA_VERSION};

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    record_version(conn)?;
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

fn record_version(conn: &Connection) -> Result<()> {
    if current_version(conn)? < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

//! Database schema and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        // Fresh database - create the base table, then migrate forward
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate(conn, 1)?;
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
///
/// Version 1 only knew the LTE signal fields.
pub(crate) fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- Pending measurements, deleted once uploaded
        CREATE TABLE IF NOT EXISTS network_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            latitude REAL,
            longitude REAL,
            network_type TEXT,
            plmn_id TEXT,
            tac INTEGER,
            cell_id INTEGER,
            rsrp INTEGER,
            rsrq INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_network_logs_timestamp
            ON network_logs(timestamp);
        "#,
    )?;

    Ok(())
}

/// Version 2 adds the WCDMA and GSM signal fields, the channel number and the LTE band.
fn migrate_to_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE network_logs ADD COLUMN rscp INTEGER;
        ALTER TABLE network_logs ADD COLUMN ecno INTEGER;
        ALTER TABLE network_logs ADD COLUMN rxlev INTEGER;
        ALTER TABLE network_logs ADD COLUMN arfcn INTEGER;
        ALTER TABLE network_logs ADD COLUMN band TEXT;
        "#,
    )?;
    Ok(())
}

/// Run migrations from old_version to current.
fn migrate(conn: &Connection, old_version: i32) -> Result<()> {
    if old_version < 2 {
        info!("Migrating database schema from v{} to v2", old_version);
        let tx = conn.unchecked_transaction()?;
        migrate_to_v2(&tx)?;
        set_schema_version(&tx, 2)?;
        tx.commit()?;
    }

    Ok(())
}

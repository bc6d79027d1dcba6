//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|v| v != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: headers, lines, and sync batch tracking
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS order_headers (
            record_uuid TEXT PRIMARY KEY,
            order_no TEXT NOT NULL UNIQUE,
            customer TEXT NOT NULL,
            season TEXT,
            content TEXT NOT NULL,
            row_hash TEXT,
            sync_state TEXT NOT NULL,
            action_type TEXT NOT NULL,
            external_id TEXT,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            sync_attempted_at INTEGER,
            sync_completed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_headers_state ON order_headers(sync_state);
        CREATE INDEX IF NOT EXISTS idx_headers_customer ON order_headers(customer);
        CREATE INDEX IF NOT EXISTS idx_headers_created ON order_headers(created_at);

        CREATE TABLE IF NOT EXISTS order_lines (
            record_uuid TEXT NOT NULL REFERENCES order_headers(record_uuid) ON DELETE CASCADE,
            size_code TEXT NOT NULL,
            qty INTEGER NOT NULL,
            row_hash TEXT,
            sync_state TEXT NOT NULL,
            action_type TEXT NOT NULL,
            external_id TEXT,
            external_parent_id TEXT,
            last_error TEXT,
            is_removed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            sync_attempted_at INTEGER,
            sync_completed_at INTEGER,
            PRIMARY KEY (record_uuid, size_code)
        );
        CREATE INDEX IF NOT EXISTS idx_lines_state ON order_lines(sync_state);

        CREATE TABLE IF NOT EXISTS sync_batches (
            id TEXT PRIMARY KEY,
            customer TEXT NOT NULL,
            status TEXT NOT NULL,
            headers_attempted INTEGER NOT NULL DEFAULT 0,
            headers_synced INTEGER NOT NULL DEFAULT 0,
            headers_failed INTEGER NOT NULL DEFAULT 0,
            lines_attempted INTEGER NOT NULL DEFAULT 0,
            lines_synced INTEGER NOT NULL DEFAULT 0,
            lines_failed INTEGER NOT NULL DEFAULT 0,
            started_at INTEGER NOT NULL,
            finished_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_batches_customer ON sync_batches(customer);

        INSERT INTO schema_version (version) VALUES (1);",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

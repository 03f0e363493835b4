//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        apply(conn, 1, MIGRATION_V1)?;
    }
    if version < 2 {
        apply(conn, 2, MIGRATION_V2)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|value| value != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Version 1: mapping records, unique on the five-column composite key
const MIGRATION_V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS object_mappings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        integration TEXT NOT NULL,
        integration_object_name TEXT NOT NULL,
        integration_object_id TEXT NOT NULL,
        internal_object_name TEXT NOT NULL,
        internal_object_id TEXT NOT NULL,
        last_sync_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (
            integration,
            integration_object_name,
            integration_object_id,
            internal_object_name,
            internal_object_id
        )
    )",
    "CREATE INDEX IF NOT EXISTS idx_object_mappings_integration_object
        ON object_mappings(integration, integration_object_name, integration_object_id, internal_object_name)",
    "CREATE INDEX IF NOT EXISTS idx_object_mappings_internal_object
        ON object_mappings(integration, internal_object_name, internal_object_id, integration_object_name)",
];

/// Version 2: identifier values of internal objects, matched by the locator
const MIGRATION_V2: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS internal_object_fields (
        object_type TEXT NOT NULL,
        object_id TEXT NOT NULL,
        field TEXT NOT NULL,
        value TEXT NOT NULL COLLATE NOCASE,
        PRIMARY KEY (object_type, object_id, field)
    )",
    "CREATE INDEX IF NOT EXISTS idx_internal_object_fields_lookup
        ON internal_object_fields(object_type, field, value)",
];

fn apply(conn: &mut Connection, version: i32, statements: &[&str]) -> Result<()> {
    // Dropping the transaction on error rolls it back. A second driver
    // migrating the same file concurrently may already have recorded `version`.
    let tx = conn.transaction()?;
    for stmt in statements {
        tx.execute(stmt, [])?;
    }
    tx.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}

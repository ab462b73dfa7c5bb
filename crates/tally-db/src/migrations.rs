//! Forward-only schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`. [`STEPS`] holds one
//! SQL batch per version; step `i` takes the database from version `i` to
//! `i + 1`. Each step commits together with its version bump.

use rusqlite::Connection;

use crate::{schema, DbError, Result};

/// Upgrade batches, oldest first. Append to add a version.
const STEPS: &[&str] = &[schema::SCHEMA_V1];

/// Apply every step above the stored version.
pub fn run(conn: &Connection) -> Result<()> {
    apply(conn, STEPS)
}

fn apply(conn: &Connection, steps: &[&str]) -> Result<()> {
    let target = steps.len() as u32;
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if current > target {
        return Err(DbError::Migration(format!(
            "database version {current} is newer than supported {target}"
        )));
    }

    for (version, batch) in (1..=target).zip(steps).skip(current as usize) {
        tracing::info!(version, "applying schema migration");
        conn.execute_batch(&format!(
            "BEGIN IMMEDIATE;\n{batch}\nPRAGMA user_version = {version};\nCOMMIT;"
        ))
        .map_err(|e| {
            let _ = conn.execute_batch("ROLLBACK;");
            DbError::Migration(format!("migration to v{version} failed: {e}"))
        })?;
    }
    Ok(())
}

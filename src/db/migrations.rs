//! Forward-only schema migration framework.
//!
//! The schema version lives in SQLite's `user_version` slot. A fresh store
//! starts at 0 and is brought up to [`CURRENT_SCHEMA_VERSION`] on first open;
//! an older store applies only the pending steps. Each step runs inside a
//! single transaction and stamps the new version before committing.

use rusqlite::Connection;

use crate::db::schema;
use crate::error::{KnowledgeError, Result};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Read the schema version from the `user_version` pragma.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.pragma_update(None, "user_version", version)
}

/// Run any pending forward-only migrations.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(
        schema_version = version,
        target = CURRENT_SCHEMA_VERSION,
        "checking migrations"
    );

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let sql = match next {
            1 => schema::V1_SQL,
            2 => schema::V2_SQL,
            3 => schema::V3_SQL,
            _ => {
                return Err(KnowledgeError::SchemaMigration {
                    version: next,
                    detail: "unknown migration target".into(),
                })
            }
        };

        let tx = conn
            .transaction()
            .map_err(|e| migration_failed(next, &e))?;
        tx.execute_batch(sql).map_err(|e| migration_failed(next, &e))?;
        set_schema_version(&tx, next).map_err(|e| migration_failed(next, &e))?;
        tx.commit().map_err(|e| migration_failed(next, &e))?;

        version = next;
    }

    Ok(())
}

fn migration_failed(version: u32, err: &rusqlite::Error) -> KnowledgeError {
    KnowledgeError::SchemaMigration {
        version,
        detail: err.to_string(),
    }
}

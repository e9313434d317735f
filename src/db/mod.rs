pub mod migrations;
pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Open (or create) the knowledge store at the given path, with pragmas set
/// and the schema migrated to the current version.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open knowledge store at {}", path.display()))?;

    // WAL for concurrent readers, foreign keys for referential integrity
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // Wait up to 5 seconds for locks instead of failing immediately
    conn.pragma_update(None, "busy_timeout", "5000")?;

    migrations::run_migrations(&mut conn).context("failed to run migrations")?;

    let integrity: String = conn.pragma_query_value(None, "quick_check", |row| row.get(0))?;
    if integrity != "ok" {
        anyhow::bail!(
            "knowledge store integrity check failed: {integrity}. \
             The file at {} may be corrupt; restore it from version control.",
            path.display()
        );
    }

    tracing::info!(path = %path.display(), "knowledge store ready");
    Ok(conn)
}

/// Open a fresh in-memory store, fully migrated. For tests and merge staging.
pub fn open_memory_database() -> Result<Connection> {
    let mut conn =
        Connection::open_in_memory().context("failed to open in-memory store")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/.megamemory/knowledge.db");
        let conn = open_database(&path).unwrap();
        assert_eq!(
            migrations::get_schema_version(&conn).unwrap(),
            migrations::CURRENT_SCHEMA_VERSION
        );
        assert!(path.exists());
    }

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.db");

        {
            let conn = open_database(&path).unwrap();
            conn.execute(
                "INSERT INTO nodes (id, name, kind, summary, created_at, updated_at) \
                 VALUES ('auth', 'Auth', 'module', 'Handles JWT validation', \
                 '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }

        let conn = open_database(&path).unwrap();
        let name: String = conn
            .query_row("SELECT name FROM nodes WHERE id = 'auth'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(name, "Auth");
    }
}

//! SQL DDL for the knowledge graph tables, split by schema version.
//!
//! Each constant is the full delta for one migration step. v1 creates the
//! `nodes` and `edges` tables, v2 adds the merge-metadata columns, v3 adds
//! the `timeline` table. All DDL uses `IF NOT EXISTS` where SQLite allows it.

/// v1 — base graph tables and their indices.
pub const V1_SQL: &str = r#"
-- Concept nodes
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT NOT NULL CHECK(kind IN ('feature','module','pattern','config','decision','component')),
    summary TEXT NOT NULL,
    why TEXT,
    file_refs TEXT,
    parent_id TEXT REFERENCES nodes(id),
    created_by_task TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    removed_at TEXT,
    removed_reason TEXT,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id);
CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);
CREATE INDEX IF NOT EXISTS idx_nodes_removed ON nodes(removed_at);

-- Typed directed relationships
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_id TEXT NOT NULL REFERENCES nodes(id),
    to_id TEXT NOT NULL REFERENCES nodes(id),
    relation TEXT NOT NULL CHECK(relation IN ('connects_to','depends_on','implements','calls','configured_by')),
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);
CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation);
"#;

/// v2 — merge metadata on both tables.
pub const V2_SQL: &str = r#"
ALTER TABLE nodes ADD COLUMN merge_group TEXT;
ALTER TABLE nodes ADD COLUMN needs_merge INTEGER NOT NULL DEFAULT 0;
ALTER TABLE nodes ADD COLUMN source_branch TEXT;
ALTER TABLE nodes ADD COLUMN merge_timestamp TEXT;

ALTER TABLE edges ADD COLUMN merge_group TEXT;
ALTER TABLE edges ADD COLUMN needs_merge INTEGER NOT NULL DEFAULT 0;
ALTER TABLE edges ADD COLUMN source_branch TEXT;
ALTER TABLE edges ADD COLUMN merge_timestamp TEXT;

CREATE INDEX IF NOT EXISTS idx_nodes_merge_group ON nodes(merge_group);
CREATE INDEX IF NOT EXISTS idx_nodes_needs_merge ON nodes(needs_merge);
CREATE INDEX IF NOT EXISTS idx_edges_merge_group ON edges(merge_group);
CREATE INDEX IF NOT EXISTS idx_edges_needs_merge ON edges(needs_merge);
"#;

/// v3 — append-only activity log.
pub const V3_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS timeline (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    tool TEXT NOT NULL,
    params TEXT NOT NULL,
    result_summary TEXT NOT NULL,
    is_write INTEGER NOT NULL,
    is_error INTEGER NOT NULL,
    affected_ids TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_timeline_timestamp ON timeline(timestamp);
CREATE INDEX IF NOT EXISTS idx_timeline_tool ON timeline(tool);
"#;

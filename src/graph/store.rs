//! The persistent store contract — node and edge CRUD, joins, and the raw
//! helpers the merge engine builds on.
//!
//! All functions operate on a borrowed [`Connection`] so callers own the
//! transaction boundary: the tool layer wraps each tool call in one
//! transaction, which is what makes a node insert, its declared edges, and
//! its timeline entry commit atomically. [`rename_node_id`] is the exception
//! and manages its own transaction because it must toggle foreign-key
//! enforcement around the self-referential update.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{KnowledgeError, Result};
use crate::graph::now_ts;
use crate::graph::types::{Edge, Node, NodeKind, RelationType};
use crate::graph::{bytes_to_embedding, embedding_to_bytes};

const NODE_COLS: &str = "id, name, kind, summary, why, file_refs, parent_id, created_by_task, \
     created_at, updated_at, removed_at, removed_reason, embedding, \
     merge_group, needs_merge, source_branch, merge_timestamp";

const EDGE_COLS: &str =
    "id, from_id, to_id, relation, description, created_at, merge_group, needs_merge, \
     source_branch, merge_timestamp";

/// Fields for a freshly created node. Timestamps are stamped at insert time;
/// merge metadata starts clear.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub summary: String,
    pub why: Option<String>,
    pub file_refs: Option<Vec<String>>,
    pub parent_id: Option<String>,
    pub created_by_task: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// Partial update for [`update_node`]. Only supplied fields are applied.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub name: Option<String>,
    pub kind: Option<NodeKind>,
    pub summary: Option<String>,
    pub why: Option<String>,
    pub file_refs: Option<Vec<String>>,
    pub parent_id: Option<String>,
    pub created_by_task: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// An edge joined with its neighbor's display name.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborEdge {
    #[serde(flatten)]
    pub edge: Edge,
    pub neighbor_name: String,
}

/// Overall store counts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphStats {
    pub nodes: i64,
    pub edges: i64,
    pub removed: i64,
}

// ── Row mapping ───────────────────────────────────────────────────────────────

struct RawNode {
    id: String,
    name: String,
    kind: String,
    summary: String,
    why: Option<String>,
    file_refs: Option<String>,
    parent_id: Option<String>,
    created_by_task: Option<String>,
    created_at: String,
    updated_at: String,
    removed_at: Option<String>,
    removed_reason: Option<String>,
    embedding: Option<Vec<u8>>,
    merge_group: Option<String>,
    needs_merge: bool,
    source_branch: Option<String>,
    merge_timestamp: Option<String>,
}

fn map_raw_node(row: &Row<'_>) -> rusqlite::Result<RawNode> {
    Ok(RawNode {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        summary: row.get(3)?,
        why: row.get(4)?,
        file_refs: row.get(5)?,
        parent_id: row.get(6)?,
        created_by_task: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        removed_at: row.get(10)?,
        removed_reason: row.get(11)?,
        embedding: row.get(12)?,
        merge_group: row.get(13)?,
        needs_merge: row.get(14)?,
        source_branch: row.get(15)?,
        merge_timestamp: row.get(16)?,
    })
}

impl TryFrom<RawNode> for Node {
    type Error = KnowledgeError;

    fn try_from(raw: RawNode) -> Result<Node> {
        let kind = NodeKind::from_stored(&raw.kind)?;
        let file_refs = match raw.file_refs {
            Some(json) => Some(serde_json::from_str::<Vec<String>>(&json).map_err(|e| {
                KnowledgeError::InvariantViolation(format!(
                    "unparseable file_refs on {}: {e}",
                    raw.id
                ))
            })?),
            None => None,
        };
        let embedding = raw.embedding.as_deref().map(bytes_to_embedding).transpose()?;

        Ok(Node {
            id: raw.id,
            name: raw.name,
            kind,
            summary: raw.summary,
            why: raw.why,
            file_refs,
            parent_id: raw.parent_id,
            created_by_task: raw.created_by_task,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            removed_at: raw.removed_at,
            removed_reason: raw.removed_reason,
            embedding,
            merge_group: raw.merge_group,
            needs_merge: raw.needs_merge,
            source_branch: raw.source_branch,
            merge_timestamp: raw.merge_timestamp,
        })
    }
}

fn collect_nodes(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Node>> {
    let mut stmt = conn.prepare(sql)?;
    let raws: Vec<RawNode> = stmt
        .query_map(params, map_raw_node)?
        .collect::<rusqlite::Result<_>>()?;
    raws.into_iter().map(Node::try_from).collect()
}

struct RawEdge {
    id: i64,
    from_id: String,
    to_id: String,
    relation: String,
    description: Option<String>,
    created_at: String,
    merge_group: Option<String>,
    needs_merge: bool,
    source_branch: Option<String>,
    merge_timestamp: Option<String>,
}

fn map_raw_edge(row: &Row<'_>) -> rusqlite::Result<RawEdge> {
    Ok(RawEdge {
        id: row.get(0)?,
        from_id: row.get(1)?,
        to_id: row.get(2)?,
        relation: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        merge_group: row.get(6)?,
        needs_merge: row.get(7)?,
        source_branch: row.get(8)?,
        merge_timestamp: row.get(9)?,
    })
}

impl TryFrom<RawEdge> for Edge {
    type Error = KnowledgeError;

    fn try_from(raw: RawEdge) -> Result<Edge> {
        Ok(Edge {
            id: raw.id,
            from_id: raw.from_id,
            to_id: raw.to_id,
            relation: RelationType::from_stored(&raw.relation)?,
            description: raw.description,
            created_at: raw.created_at,
            merge_group: raw.merge_group,
            needs_merge: raw.needs_merge,
            source_branch: raw.source_branch,
            merge_timestamp: raw.merge_timestamp,
        })
    }
}

fn file_refs_json(refs: Option<&Vec<String>>) -> Result<Option<String>> {
    refs.map(|r| {
        serde_json::to_string(r)
            .map_err(|e| KnowledgeError::InvariantViolation(format!("unencodable file_refs: {e}")))
    })
    .transpose()
}

// ── Node operations ───────────────────────────────────────────────────────────

/// Insert a new node. Fails with `Duplicate` if the id exists (live or
/// removed) and `InvalidParent` if the parent is missing or removed.
pub fn insert_node(conn: &Connection, node: &NewNode) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM nodes WHERE id = ?1",
        params![node.id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(KnowledgeError::Duplicate(node.id.clone()));
    }

    if let Some(parent) = &node.parent_id {
        assert_live_parent(conn, parent)?;
        assert_no_cycle(conn, &node.id, parent)?;
    }

    let now = now_ts();
    conn.execute(
        "INSERT INTO nodes (id, name, kind, summary, why, file_refs, parent_id, created_by_task, \
         created_at, updated_at, embedding) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10)",
        params![
            node.id,
            node.name,
            node.kind.as_str(),
            node.summary,
            node.why,
            file_refs_json(node.file_refs.as_ref())?,
            node.parent_id,
            node.created_by_task,
            now,
            node.embedding.as_deref().map(embedding_to_bytes),
        ],
    )?;

    Ok(())
}

/// Fetch a live node by id.
pub fn get_node(conn: &Connection, id: &str) -> Result<Option<Node>> {
    let raw = conn
        .query_row(
            &format!("SELECT {NODE_COLS} FROM nodes WHERE id = ?1 AND removed_at IS NULL"),
            params![id],
            map_raw_node,
        )
        .optional()?;
    raw.map(Node::try_from).transpose()
}

/// Fetch a node by id whether or not it has been soft-deleted.
pub fn get_node_including_removed(conn: &Connection, id: &str) -> Result<Option<Node>> {
    let raw = conn
        .query_row(
            &format!("SELECT {NODE_COLS} FROM nodes WHERE id = ?1"),
            params![id],
            map_raw_node,
        )
        .optional()?;
    raw.map(Node::try_from).transpose()
}

/// Apply a partial update to a live node. Returns whether any field actually
/// changed; `updated_at` is bumped only then.
pub fn update_node(conn: &Connection, id: &str, patch: &NodePatch) -> Result<bool> {
    let current = get_node(conn, id)?.ok_or_else(|| KnowledgeError::NotFound(id.to_string()))?;

    if let Some(parent) = &patch.parent_id {
        if parent == id {
            return Err(KnowledgeError::InvalidParent(format!(
                "{parent} cannot be its own parent"
            )));
        }
        assert_live_parent(conn, parent)?;
        assert_no_cycle(conn, id, parent)?;
    }

    let mut changed = false;
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    let push = |sets: &mut Vec<String>,
                    values: &mut Vec<Box<dyn rusqlite::ToSql>>,
                    col: &str,
                    value: Box<dyn rusqlite::ToSql>| {
        sets.push(format!("{col} = ?{}", values.len() + 1));
        values.push(value);
    };

    if let Some(name) = &patch.name {
        if *name != current.name {
            changed = true;
            push(&mut sets, &mut values, "name", Box::new(name.clone()));
        }
    }
    if let Some(kind) = patch.kind {
        if kind != current.kind {
            changed = true;
            push(&mut sets, &mut values, "kind", Box::new(kind.as_str()));
        }
    }
    if let Some(summary) = &patch.summary {
        if *summary != current.summary {
            changed = true;
            push(&mut sets, &mut values, "summary", Box::new(summary.clone()));
        }
    }
    if let Some(why) = &patch.why {
        if Some(why) != current.why.as_ref() {
            changed = true;
            push(&mut sets, &mut values, "why", Box::new(why.clone()));
        }
    }
    if let Some(refs) = &patch.file_refs {
        if Some(refs) != current.file_refs.as_ref() {
            changed = true;
            push(
                &mut sets,
                &mut values,
                "file_refs",
                Box::new(file_refs_json(Some(refs))?),
            );
        }
    }
    if let Some(parent) = &patch.parent_id {
        if Some(parent) != current.parent_id.as_ref() {
            changed = true;
            push(&mut sets, &mut values, "parent_id", Box::new(parent.clone()));
        }
    }
    if let Some(task) = &patch.created_by_task {
        if Some(task) != current.created_by_task.as_ref() {
            changed = true;
            push(
                &mut sets,
                &mut values,
                "created_by_task",
                Box::new(task.clone()),
            );
        }
    }
    if let Some(embedding) = &patch.embedding {
        if Some(embedding) != current.embedding.as_ref() {
            changed = true;
            push(
                &mut sets,
                &mut values,
                "embedding",
                Box::new(embedding_to_bytes(embedding)),
            );
        }
    }

    if !changed {
        return Ok(false);
    }

    push(&mut sets, &mut values, "updated_at", Box::new(now_ts()));
    values.push(Box::new(id.to_string()));

    let sql = format!(
        "UPDATE nodes SET {} WHERE id = ?{}",
        sets.join(", "),
        values.len()
    );
    conn.execute(&sql, rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())))?;

    Ok(true)
}

/// Soft-delete a node: mark it removed, hard-delete its incident edges, and
/// turn its live children into roots. The caller's transaction makes the
/// cascade atomic.
pub fn soft_delete_node(conn: &Connection, id: &str, reason: &str) -> Result<()> {
    let node = get_node_including_removed(conn, id)?
        .ok_or_else(|| KnowledgeError::NotFound(id.to_string()))?;
    if !node.is_live() {
        return Err(KnowledgeError::AlreadyRemoved(id.to_string()));
    }

    conn.execute(
        "DELETE FROM edges WHERE from_id = ?1 OR to_id = ?1",
        params![id],
    )?;
    conn.execute(
        "UPDATE nodes SET parent_id = NULL WHERE parent_id = ?1 AND removed_at IS NULL",
        params![id],
    )?;
    conn.execute(
        "UPDATE nodes SET removed_at = ?1, removed_reason = ?2, updated_at = ?1 WHERE id = ?3",
        params![now_ts(), reason, id],
    )?;

    Ok(())
}

/// Remove a node row and its incident edges unconditionally. Only conflict
/// resolution uses this.
pub fn hard_delete_node(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM edges WHERE from_id = ?1 OR to_id = ?1",
        params![id],
    )?;
    conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
    Ok(())
}

/// Atomically substitute a node's id everywhere it appears: the node row,
/// children's `parent_id`, and both edge endpoints. Foreign keys are disabled
/// for the duration because `parent_id` references `nodes(id)`.
pub fn rename_node_id(conn: &mut Connection, old: &str, new: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM nodes WHERE id = ?1",
        params![old],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(KnowledgeError::NotFound(old.to_string()));
    }
    if old != new {
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM nodes WHERE id = ?1",
            params![new],
            |row| row.get(0),
        )?;
        if taken {
            return Err(KnowledgeError::Duplicate(new.to_string()));
        }
    } else {
        return Ok(());
    }

    conn.pragma_update(None, "foreign_keys", "OFF")?;
    let result = (|| -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute("UPDATE nodes SET id = ?1 WHERE id = ?2", params![new, old])?;
        tx.execute(
            "UPDATE nodes SET parent_id = ?1 WHERE parent_id = ?2",
            params![new, old],
        )?;
        tx.execute(
            "UPDATE edges SET from_id = ?1 WHERE from_id = ?2",
            params![new, old],
        )?;
        tx.execute(
            "UPDATE edges SET to_id = ?1 WHERE to_id = ?2",
            params![new, old],
        )?;
        tx.commit()?;
        Ok(())
    })();
    conn.pragma_update(None, "foreign_keys", "ON")?;
    result
}

fn assert_live_parent(conn: &Connection, parent_id: &str) -> Result<()> {
    let live: Option<bool> = conn
        .query_row(
            "SELECT removed_at IS NULL FROM nodes WHERE id = ?1",
            params![parent_id],
            |row| row.get(0),
        )
        .optional()?;
    match live {
        Some(true) => Ok(()),
        _ => Err(KnowledgeError::InvalidParent(parent_id.to_string())),
    }
}

/// Walk up the parent chain from `parent_id`; refuse if `node_id` appears.
/// The ownership relation must stay a forest even though edges may cycle.
fn assert_no_cycle(conn: &Connection, node_id: &str, parent_id: &str) -> Result<()> {
    let mut cursor = Some(parent_id.to_string());
    let mut hops = 0usize;
    while let Some(current) = cursor {
        if current == node_id {
            return Err(KnowledgeError::InvalidParent(format!(
                "{parent_id} would make {node_id} its own ancestor"
            )));
        }
        hops += 1;
        if hops > 10_000 {
            return Err(KnowledgeError::InvariantViolation(
                "parent chain does not terminate".into(),
            ));
        }
        cursor = conn
            .query_row(
                "SELECT parent_id FROM nodes WHERE id = ?1",
                params![current],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
    }
    Ok(())
}

// ── Edge operations ───────────────────────────────────────────────────────────

/// Insert an edge between two live nodes. Returns the new edge's id. The
/// missing endpoint is named in the error.
pub fn insert_edge(
    conn: &Connection,
    from_id: &str,
    to_id: &str,
    relation: RelationType,
    description: Option<&str>,
) -> Result<i64> {
    for endpoint in [from_id, to_id] {
        if get_node(conn, endpoint)?.is_none() {
            return Err(KnowledgeError::NotFound(endpoint.to_string()));
        }
    }

    conn.execute(
        "INSERT INTO edges (from_id, to_id, relation, description, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![from_id, to_id, relation.as_str(), description, now_ts()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete edges matching the (from, to, relation) triple. Returns how many
/// rows went away.
pub fn delete_edge(
    conn: &Connection,
    from_id: &str,
    to_id: &str,
    relation: RelationType,
) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM edges WHERE from_id = ?1 AND to_id = ?2 AND relation = ?3",
        params![from_id, to_id, relation.as_str()],
    )?;
    Ok(n)
}

/// Live children of a node, ordered by name. Unresolved conflict variants
/// are excluded, like every other live-graph answer.
pub fn get_children(conn: &Connection, parent_id: &str) -> Result<Vec<Node>> {
    collect_nodes(
        conn,
        &format!(
            "SELECT {NODE_COLS} FROM nodes \
             WHERE parent_id = ?1 AND removed_at IS NULL AND needs_merge = 0 \
             ORDER BY name"
        ),
        params![parent_id],
    )
}

fn neighbor_edges(conn: &Connection, sql: &str, id: &str) -> Result<Vec<NeighborEdge>> {
    let mut stmt = conn.prepare(sql)?;
    let rows: Vec<(RawEdge, String)> = stmt
        .query_map(params![id], |row| {
            Ok((map_raw_edge(row)?, row.get::<_, String>(10)?))
        })?
        .collect::<rusqlite::Result<_>>()?;
    rows.into_iter()
        .map(|(raw, neighbor_name)| {
            Ok(NeighborEdge {
                edge: Edge::try_from(raw)?,
                neighbor_name,
            })
        })
        .collect()
}

/// Outgoing edges of a node joined with each target's name. Edges to removed
/// neighbors are excluded (and should not exist at all, per the cascade rule).
pub fn get_outgoing_edges(conn: &Connection, id: &str) -> Result<Vec<NeighborEdge>> {
    neighbor_edges(
        conn,
        &format!(
            "SELECT e.{}, n.name FROM edges e \
             JOIN nodes n ON n.id = e.to_id \
             WHERE e.from_id = ?1 AND n.removed_at IS NULL ORDER BY e.id",
            EDGE_COLS.replace(", ", ", e.")
        ),
        id,
    )
}

/// Incoming edges of a node joined with each source's name.
pub fn get_incoming_edges(conn: &Connection, id: &str) -> Result<Vec<NeighborEdge>> {
    neighbor_edges(
        conn,
        &format!(
            "SELECT e.{}, n.name FROM edges e \
             JOIN nodes n ON n.id = e.from_id \
             WHERE e.to_id = ?1 AND n.removed_at IS NULL ORDER BY e.id",
            EDGE_COLS.replace(", ", ", e.")
        ),
        id,
    )
}

// ── Graph-wide queries ────────────────────────────────────────────────────────

/// Live roots (no parent), ordered by name. Unresolved conflict variants are
/// excluded; `list_conflicts` is the surface for those.
pub fn get_root_nodes(conn: &Connection) -> Result<Vec<Node>> {
    collect_nodes(
        conn,
        &format!(
            "SELECT {NODE_COLS} FROM nodes \
             WHERE parent_id IS NULL AND removed_at IS NULL AND needs_merge = 0 \
             ORDER BY name"
        ),
        [],
    )
}

/// Live nodes carrying an embedding — the semantic search candidate set.
/// Unresolved conflict variants are excluded.
pub fn get_all_active_nodes_with_embeddings(conn: &Connection) -> Result<Vec<Node>> {
    collect_nodes(
        conn,
        &format!(
            "SELECT {NODE_COLS} FROM nodes \
             WHERE removed_at IS NULL AND embedding IS NOT NULL AND needs_merge = 0 \
             ORDER BY id"
        ),
        [],
    )
}

/// Node, edge, and removed-node counts.
pub fn get_stats(conn: &Connection) -> Result<GraphStats> {
    let nodes: i64 = conn.query_row(
        "SELECT COUNT(*) FROM nodes WHERE removed_at IS NULL",
        [],
        |row| row.get(0),
    )?;
    let edges: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
    let removed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM nodes WHERE removed_at IS NOT NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(GraphStats {
        nodes,
        edges,
        removed,
    })
}

/// Live node counts per kind.
pub fn get_kinds_breakdown(conn: &Connection) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT kind, COUNT(*) FROM nodes WHERE removed_at IS NULL GROUP BY kind",
    )?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(rows.into_iter().collect())
}

// ── Merge helpers ─────────────────────────────────────────────────────────────

/// Every node flagged `needs_merge`, removed variants included, ordered by
/// group then id.
pub fn get_conflict_nodes(conn: &Connection) -> Result<Vec<Node>> {
    collect_nodes(
        conn,
        &format!(
            "SELECT {NODE_COLS} FROM nodes WHERE needs_merge = 1 ORDER BY merge_group, id"
        ),
        [],
    )
}

/// All variants belonging to one merge group, removed variants included.
pub fn get_nodes_by_merge_group(conn: &Connection, merge_group: &str) -> Result<Vec<Node>> {
    collect_nodes(
        conn,
        &format!("SELECT {NODE_COLS} FROM nodes WHERE merge_group = ?1 ORDER BY id"),
        params![merge_group],
    )
}

/// Clear merge metadata on one node.
pub fn clear_node_merge_flags(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE nodes SET merge_group = NULL, needs_merge = 0, source_branch = NULL, \
         merge_timestamp = NULL WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Clear merge metadata on every edge flagged with the given group.
pub fn clear_edge_merge_flags_by_group(conn: &Connection, merge_group: &str) -> Result<()> {
    conn.execute(
        "UPDATE edges SET merge_group = NULL, needs_merge = 0, source_branch = NULL, \
         merge_timestamp = NULL WHERE merge_group = ?1",
        params![merge_group],
    )?;
    Ok(())
}

/// Every node row, verbatim. The merge engine's scan.
pub fn get_all_nodes_raw(conn: &Connection) -> Result<Vec<Node>> {
    collect_nodes(
        conn,
        &format!("SELECT {NODE_COLS} FROM nodes ORDER BY id"),
        [],
    )
}

/// Every edge row, verbatim.
pub fn get_all_edges_raw(conn: &Connection) -> Result<Vec<Edge>> {
    let mut stmt = conn.prepare(&format!("SELECT {EDGE_COLS} FROM edges ORDER BY id"))?;
    let raws: Vec<RawEdge> = stmt
        .query_map([], map_raw_edge)?
        .collect::<rusqlite::Result<_>>()?;
    raws.into_iter().map(Edge::try_from).collect()
}

/// Insert a node carrying timestamps and merge flags verbatim. Used by the
/// merge engine, which owns referential ordering.
pub fn insert_node_raw(conn: &Connection, node: &Node) -> Result<()> {
    if node.needs_merge && node.merge_group.is_none() {
        return Err(KnowledgeError::InvariantViolation(format!(
            "{} has needs_merge without a merge_group",
            node.id
        )));
    }

    conn.execute(
        &format!(
            "INSERT INTO nodes ({NODE_COLS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            node.id,
            node.name,
            node.kind.as_str(),
            node.summary,
            node.why,
            file_refs_json(node.file_refs.as_ref())?,
            node.parent_id,
            node.created_by_task,
            node.created_at,
            node.updated_at,
            node.removed_at,
            node.removed_reason,
            node.embedding.as_deref().map(embedding_to_bytes),
            node.merge_group,
            node.needs_merge,
            node.source_branch,
            node.merge_timestamp,
        ],
    )?;
    Ok(())
}

/// Insert an edge carrying timestamps and merge flags verbatim. The id is
/// reassigned by the target store.
pub fn insert_edge_raw(conn: &Connection, edge: &Edge) -> Result<i64> {
    conn.execute(
        "INSERT INTO edges (from_id, to_id, relation, description, created_at, \
         merge_group, needs_merge, source_branch, merge_timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            edge.from_id,
            edge.to_id,
            edge.relation.as_str(),
            edge.description,
            edge.created_at,
            edge.merge_group,
            edge.needs_merge,
            edge.source_branch,
            edge.merge_timestamp,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn new_node(id: &str) -> NewNode {
        NewNode {
            id: id.to_string(),
            name: id.to_string(),
            kind: NodeKind::Module,
            summary: format!("summary of {id}"),
            why: None,
            file_refs: None,
            parent_id: None,
            created_by_task: None,
            embedding: None,
        }
    }

    #[test]
    fn insert_and_get_node() {
        let conn = test_db();
        insert_node(&conn, &new_node("auth")).unwrap();

        let node = get_node(&conn, "auth").unwrap().unwrap();
        assert_eq!(node.id, "auth");
        assert_eq!(node.kind, NodeKind::Module);
        assert!(node.is_live());
        assert_eq!(node.created_at, node.updated_at);
    }

    #[test]
    fn duplicate_id_rejected_even_when_removed() {
        let conn = test_db();
        insert_node(&conn, &new_node("auth")).unwrap();
        soft_delete_node(&conn, "auth", "retired").unwrap();

        let err = insert_node(&conn, &new_node("auth")).unwrap_err();
        assert_eq!(err.kind(), "Duplicate");
    }

    #[test]
    fn parent_must_be_live() {
        let conn = test_db();
        insert_node(&conn, &new_node("parent")).unwrap();
        soft_delete_node(&conn, "parent", "gone").unwrap();

        let mut child = new_node("child");
        child.parent_id = Some("parent".into());
        let err = insert_node(&conn, &child).unwrap_err();
        assert_eq!(err.kind(), "InvalidParent");
    }

    #[test]
    fn parent_cycle_refused_on_update() {
        let conn = test_db();
        insert_node(&conn, &new_node("a")).unwrap();
        let mut b = new_node("b");
        b.parent_id = Some("a".into());
        insert_node(&conn, &b).unwrap();

        // a → parent b would make a its own ancestor
        let patch = NodePatch {
            parent_id: Some("b".into()),
            ..Default::default()
        };
        let err = update_node(&conn, "a", &patch).unwrap_err();
        assert_eq!(err.kind(), "InvalidParent");
    }

    #[test]
    fn update_node_reports_no_change() {
        let conn = test_db();
        insert_node(&conn, &new_node("auth")).unwrap();
        let before = get_node(&conn, "auth").unwrap().unwrap();

        let patch = NodePatch {
            summary: Some(before.summary.clone()),
            ..Default::default()
        };
        assert!(!update_node(&conn, "auth", &patch).unwrap());

        let after = get_node(&conn, "auth").unwrap().unwrap();
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn update_node_applies_supplied_fields() {
        let conn = test_db();
        insert_node(&conn, &new_node("auth")).unwrap();

        let patch = NodePatch {
            summary: Some("rewritten".into()),
            why: Some("because".into()),
            ..Default::default()
        };
        assert!(update_node(&conn, "auth", &patch).unwrap());

        let node = get_node(&conn, "auth").unwrap().unwrap();
        assert_eq!(node.summary, "rewritten");
        assert_eq!(node.why.as_deref(), Some("because"));
        assert_eq!(node.name, "auth");
    }

    #[test]
    fn soft_delete_cascades_edges_and_children() {
        let conn = test_db();
        insert_node(&conn, &new_node("a")).unwrap();
        insert_node(&conn, &new_node("b")).unwrap();
        let mut child = new_node("a-child");
        child.parent_id = Some("a".into());
        insert_node(&conn, &child).unwrap();
        insert_edge(&conn, "a", "b", RelationType::Calls, None).unwrap();

        soft_delete_node(&conn, "a", "retired").unwrap();

        assert!(get_node(&conn, "a").unwrap().is_none());
        let removed = get_node_including_removed(&conn, "a").unwrap().unwrap();
        assert_eq!(removed.removed_reason.as_deref(), Some("retired"));

        assert!(get_outgoing_edges(&conn, "a").unwrap().is_empty());
        assert!(get_incoming_edges(&conn, "b").unwrap().is_empty());

        // Child became a root, still live
        let child = get_node(&conn, "a-child").unwrap().unwrap();
        assert!(child.parent_id.is_none());
    }

    #[test]
    fn double_soft_delete_rejected() {
        let conn = test_db();
        insert_node(&conn, &new_node("a")).unwrap();
        soft_delete_node(&conn, "a", "once").unwrap();
        let err = soft_delete_node(&conn, "a", "twice").unwrap_err();
        assert_eq!(err.kind(), "AlreadyRemoved");
    }

    #[test]
    fn edges_join_neighbor_names() {
        let conn = test_db();
        insert_node(&conn, &new_node("api")).unwrap();
        insert_node(&conn, &new_node("auth")).unwrap();
        insert_edge(&conn, "api", "auth", RelationType::DependsOn, Some("jwt")).unwrap();

        let outgoing = get_outgoing_edges(&conn, "api").unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].edge.to_id, "auth");
        assert_eq!(outgoing[0].neighbor_name, "auth");
        assert_eq!(outgoing[0].edge.description.as_deref(), Some("jwt"));

        let incoming = get_incoming_edges(&conn, "auth").unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].edge.from_id, "api");
    }

    #[test]
    fn edge_to_missing_node_names_the_endpoint() {
        let conn = test_db();
        insert_node(&conn, &new_node("api")).unwrap();
        let err = insert_edge(&conn, "api", "ghost", RelationType::Calls, None).unwrap_err();
        assert!(matches!(err, KnowledgeError::NotFound(ref id) if id == "ghost"));
    }

    #[test]
    fn rename_preserves_edge_topology() {
        let mut conn = test_db();
        insert_node(&conn, &new_node("old")).unwrap();
        insert_node(&conn, &new_node("peer")).unwrap();
        let mut child = new_node("kid");
        child.parent_id = Some("old".into());
        insert_node(&conn, &child).unwrap();
        insert_edge(&conn, "old", "peer", RelationType::Calls, None).unwrap();
        insert_edge(&conn, "peer", "old", RelationType::DependsOn, Some("d")).unwrap();

        rename_node_id(&mut conn, "old", "new").unwrap();

        assert!(get_node(&conn, "old").unwrap().is_none());
        let renamed = get_node(&conn, "new").unwrap().unwrap();
        assert_eq!(renamed.name, "old");

        let kid = get_node(&conn, "kid").unwrap().unwrap();
        assert_eq!(kid.parent_id.as_deref(), Some("new"));

        let outgoing = get_outgoing_edges(&conn, "new").unwrap();
        let incoming = get_incoming_edges(&conn, "new").unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(incoming.len(), 1);
        assert_eq!(outgoing[0].edge.to_id, "peer");
        assert_eq!(incoming[0].edge.from_id, "peer");
        assert_eq!(incoming[0].edge.description.as_deref(), Some("d"));
    }

    #[test]
    fn rename_to_taken_id_rejected() {
        let mut conn = test_db();
        insert_node(&conn, &new_node("a")).unwrap();
        insert_node(&conn, &new_node("b")).unwrap();
        let err = rename_node_id(&mut conn, "a", "b").unwrap_err();
        assert_eq!(err.kind(), "Duplicate");
    }

    #[test]
    fn roots_exclude_conflicted_and_removed() {
        let conn = test_db();
        insert_node(&conn, &new_node("root")).unwrap();
        insert_node(&conn, &new_node("gone")).unwrap();
        soft_delete_node(&conn, "gone", "x").unwrap();

        let mut conflicted = get_node(&conn, "root").unwrap().unwrap();
        conflicted.id = "other::left".into();
        conflicted.needs_merge = true;
        conflicted.merge_group = Some("g".into());
        insert_node_raw(&conn, &conflicted).unwrap();

        let roots = get_root_nodes(&conn).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, "root");
    }

    #[test]
    fn children_exclude_conflict_variants() {
        let conn = test_db();
        insert_node(&conn, &new_node("app")).unwrap();
        let mut child = new_node("app-child");
        child.parent_id = Some("app".into());
        insert_node(&conn, &child).unwrap();

        // A conflicted variant parked under the same live parent
        let mut variant = get_node(&conn, "app-child").unwrap().unwrap();
        variant.id = "app/widget::left".into();
        variant.needs_merge = true;
        variant.merge_group = Some("g".into());
        insert_node_raw(&conn, &variant).unwrap();

        let children = get_children(&conn, "app").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "app-child");
    }

    #[test]
    fn stats_and_kind_breakdown() {
        let conn = test_db();
        insert_node(&conn, &new_node("a")).unwrap();
        let mut b = new_node("b");
        b.kind = NodeKind::Feature;
        insert_node(&conn, &b).unwrap();
        insert_edge(&conn, "a", "b", RelationType::Calls, None).unwrap();
        insert_node(&conn, &new_node("c")).unwrap();
        soft_delete_node(&conn, "c", "x").unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.removed, 1);

        let kinds = get_kinds_breakdown(&conn).unwrap();
        assert_eq!(kinds.get("module"), Some(&1));
        assert_eq!(kinds.get("feature"), Some(&1));
    }

    #[test]
    fn raw_insert_preserves_flags_and_timestamps() {
        let conn = test_db();
        let node = Node {
            id: "x::left".into(),
            name: "x".into(),
            kind: NodeKind::Decision,
            summary: "s".into(),
            why: None,
            file_refs: Some(vec!["src/x.rs:1-10".into()]),
            parent_id: None,
            created_by_task: None,
            created_at: "2024-06-01T00:00:00Z".into(),
            updated_at: "2024-06-02T00:00:00Z".into(),
            removed_at: None,
            removed_reason: None,
            embedding: None,
            merge_group: Some("g1".into()),
            needs_merge: true,
            source_branch: Some("left".into()),
            merge_timestamp: Some("2024-06-03T00:00:00Z".into()),
        };
        insert_node_raw(&conn, &node).unwrap();

        let back = get_node_including_removed(&conn, "x::left").unwrap().unwrap();
        assert_eq!(back.created_at, "2024-06-01T00:00:00Z");
        assert!(back.needs_merge);
        assert_eq!(back.merge_group.as_deref(), Some("g1"));
        assert_eq!(back.file_refs.as_deref(), Some(&["src/x.rs:1-10".to_string()][..]));
    }

    #[test]
    fn raw_insert_enforces_merge_group_invariant() {
        let conn = test_db();
        let mut node = Node {
            id: "bad".into(),
            name: "bad".into(),
            kind: NodeKind::Module,
            summary: "s".into(),
            why: None,
            file_refs: None,
            parent_id: None,
            created_by_task: None,
            created_at: now_ts(),
            updated_at: now_ts(),
            removed_at: None,
            removed_reason: None,
            embedding: None,
            merge_group: None,
            needs_merge: true,
            source_branch: None,
            merge_timestamp: None,
        };
        let err = insert_node_raw(&conn, &node).unwrap_err();
        assert_eq!(err.kind(), "InvariantViolation");

        node.merge_group = Some("g".into());
        insert_node_raw(&conn, &node).unwrap();
    }

    #[test]
    fn embedding_survives_storage() {
        let conn = test_db();
        let mut node = new_node("vec");
        let mut emb = vec![0.0f32; 384];
        emb[3] = 1.0;
        node.embedding = Some(emb.clone());
        insert_node(&conn, &node).unwrap();

        let stored = get_node(&conn, "vec").unwrap().unwrap();
        assert_eq!(stored.embedding.unwrap(), emb);

        let active = get_all_active_nodes_with_embeddings(&conn).unwrap();
        assert_eq!(active.len(), 1);
    }
}

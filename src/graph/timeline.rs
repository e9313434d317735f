//! Append-only activity log and time-travel queries.
//!
//! Every tool invocation appends one row; `seq` is strictly increasing and
//! timestamps are non-decreasing. Time-travel reconstructs the graph as of a
//! past timestamp straight from node/edge lifecycle columns, so it works even
//! for events older than the timeline table itself.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{KnowledgeError, Result};
use crate::graph::store;
use crate::graph::types::{Edge, Node, TimelineEntry};

/// Cheap summary of the log.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineBounds {
    pub first: Option<String>,
    pub last: Option<String>,
    pub count: i64,
}

/// Predicates for [`get_timeline_entries`]. All optional; time range is
/// inclusive on both ends.
#[derive(Debug, Clone, Default)]
pub struct TimelineFilter {
    pub writes_only: bool,
    pub tool: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: Option<usize>,
}

/// Append one audit row. Returns the assigned sequence number.
pub fn insert_timeline_entry(
    conn: &Connection,
    timestamp: &str,
    tool: &str,
    params_json: &str,
    result_summary: &str,
    is_write: bool,
    is_error: bool,
    affected_ids: &[String],
) -> Result<i64> {
    let affected = serde_json::to_string(affected_ids)
        .map_err(|e| KnowledgeError::InvariantViolation(format!("unencodable affected_ids: {e}")))?;
    conn.execute(
        "INSERT INTO timeline (timestamp, tool, params, result_summary, is_write, is_error, affected_ids) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            timestamp,
            tool,
            params_json,
            result_summary,
            is_write,
            is_error,
            affected,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_entry(row: &Row<'_>) -> rusqlite::Result<(TimelineEntry, String)> {
    Ok((
        TimelineEntry {
            seq: row.get(0)?,
            timestamp: row.get(1)?,
            tool: row.get(2)?,
            params: row.get(3)?,
            result_summary: row.get(4)?,
            is_write: row.get(5)?,
            is_error: row.get(6)?,
            affected_ids: Vec::new(),
        },
        row.get(7)?,
    ))
}

fn decode_entry((mut entry, affected_json): (TimelineEntry, String)) -> Result<TimelineEntry> {
    entry.affected_ids = serde_json::from_str(&affected_json).map_err(|e| {
        KnowledgeError::InvariantViolation(format!(
            "unparseable affected_ids on timeline seq {}: {e}",
            entry.seq
        ))
    })?;
    Ok(entry)
}

const ENTRY_COLS: &str =
    "seq, timestamp, tool, params, result_summary, is_write, is_error, affected_ids";

/// First/last timestamps and total row count.
pub fn get_timeline_bounds(conn: &Connection) -> Result<TimelineBounds> {
    let row: Option<(Option<String>, Option<String>, i64)> = conn
        .query_row(
            "SELECT MIN(timestamp), MAX(timestamp), COUNT(*) FROM timeline",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let (first, last, count) = row.unwrap_or((None, None, 0));
    Ok(TimelineBounds { first, last, count })
}

/// Ordered scan with optional predicates.
pub fn get_timeline_entries(conn: &Connection, filter: &TimelineFilter) -> Result<Vec<TimelineEntry>> {
    let mut sql = format!("SELECT {ENTRY_COLS} FROM timeline WHERE 1=1");
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if filter.writes_only {
        sql.push_str(" AND is_write = 1");
    }
    if let Some(tool) = &filter.tool {
        values.push(Box::new(tool.clone()));
        sql.push_str(&format!(" AND tool = ?{}", values.len()));
    }
    if let Some(since) = &filter.since {
        values.push(Box::new(since.clone()));
        sql.push_str(&format!(" AND timestamp >= ?{}", values.len()));
    }
    if let Some(until) = &filter.until {
        values.push(Box::new(until.clone()));
        sql.push_str(&format!(" AND timestamp <= ?{}", values.len()));
    }
    sql.push_str(" ORDER BY seq");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<(TimelineEntry, String)> = stmt
        .query_map(
            rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
            map_entry,
        )?
        .collect::<rusqlite::Result<_>>()?;
    rows.into_iter().map(decode_entry).collect()
}

/// Approximately `n` entries evenly sampled over the sequence. The first and
/// last entries are always included; indices collapsed by rounding are
/// deduplicated.
pub fn get_timeline_ticks(conn: &Connection, n: usize) -> Result<Vec<TimelineEntry>> {
    let mut stmt = conn.prepare("SELECT seq FROM timeline ORDER BY seq")?;
    let seqs: Vec<i64> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    if seqs.is_empty() || n == 0 {
        return Ok(Vec::new());
    }

    let mut picked: Vec<i64> = Vec::with_capacity(n);
    if n == 1 || seqs.len() == 1 {
        picked.push(seqs[0]);
        if seqs.len() > 1 {
            picked.push(*seqs.last().expect("non-empty"));
        }
    } else {
        for i in 0..n {
            let idx = (i as f64 * (seqs.len() - 1) as f64 / (n - 1) as f64).round() as usize;
            picked.push(seqs[idx]);
        }
    }
    picked.dedup();

    let mut stmt =
        conn.prepare(&format!("SELECT {ENTRY_COLS} FROM timeline WHERE seq = ?1"))?;
    let mut entries = Vec::with_capacity(picked.len());
    for seq in picked {
        let row = stmt.query_row(params![seq], map_entry)?;
        entries.push(decode_entry(row)?);
    }
    Ok(entries)
}

/// Every node that existed at time `t`: created on or before `t` and not yet
/// removed at `t`.
pub fn get_nodes_at_time(conn: &Connection, t: &str) -> Result<Vec<Node>> {
    let all = store::get_all_nodes_raw(conn)?;
    Ok(all
        .into_iter()
        .filter(|n| {
            n.created_at.as_str() <= t
                && match &n.removed_at {
                    None => true,
                    Some(removed) => removed.as_str() > t,
                }
        })
        .collect())
}

/// Every edge that existed at time `t` with both endpoints alive at `t`.
pub fn get_edges_at_time(conn: &Connection, t: &str) -> Result<Vec<Edge>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.from_id, e.to_id, e.relation, e.description, e.created_at, \
                e.merge_group, e.needs_merge, e.source_branch, e.merge_timestamp \
         FROM edges e \
         JOIN nodes f ON f.id = e.from_id \
         JOIN nodes t2 ON t2.id = e.to_id \
         WHERE e.created_at <= ?1 \
           AND f.created_at <= ?1 AND (f.removed_at IS NULL OR f.removed_at > ?1) \
           AND t2.created_at <= ?1 AND (t2.removed_at IS NULL OR t2.removed_at > ?1) \
         ORDER BY e.id",
    )?;
    let raws: Vec<Edge> = stmt
        .query_map(params![t], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, bool>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, Option<String>>(9)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(|(id, from_id, to_id, relation, description, created_at, mg, nm, sb, mt)| {
            Ok(Edge {
                id,
                from_id,
                to_id,
                relation: crate::graph::types::RelationType::from_stored(&relation)?,
                description,
                created_at,
                merge_group: mg,
                needs_merge: nm,
                source_branch: sb,
                merge_timestamp: mt,
            })
        })
        .collect::<Result<Vec<Edge>>>()?;
    Ok(raws)
}

/// Reconstruct an activity history for stores whose timeline predates v3 (or
/// is sparse): project each node's lifecycle timestamps into synthetic
/// entries and merge them with the real log. A synthetic record is dropped
/// when a real entry already describes the same event.
pub fn synthesize_timeline(conn: &Connection) -> Result<Vec<TimelineEntry>> {
    let real = get_timeline_entries(conn, &TimelineFilter::default())?;

    // Key real write events by (tool, timestamp, node) so projections of the
    // same underlying event are recognized.
    let mut seen: std::collections::HashSet<(String, String, String)> =
        std::collections::HashSet::new();
    for entry in &real {
        for id in &entry.affected_ids {
            seen.insert((entry.tool.clone(), entry.timestamp.clone(), id.clone()));
        }
    }

    let mut synthetic: Vec<TimelineEntry> = Vec::new();
    let mut push_synthetic = |tool: &str, timestamp: &str, id: &str| {
        if seen.contains(&(tool.to_string(), timestamp.to_string(), id.to_string())) {
            return;
        }
        synthetic.push(TimelineEntry {
            seq: 0,
            timestamp: timestamp.to_string(),
            tool: tool.to_string(),
            params: "{}".to_string(),
            result_summary: format!("projected from {id} timestamps"),
            is_write: true,
            is_error: false,
            affected_ids: vec![id.to_string()],
        });
    };

    for node in store::get_all_nodes_raw(conn)? {
        push_synthetic("create_concept", &node.created_at, &node.id);
        if node.updated_at != node.created_at && node.removed_at.as_ref() != Some(&node.updated_at)
        {
            push_synthetic("update_concept", &node.updated_at, &node.id);
        }
        if let Some(removed) = &node.removed_at {
            push_synthetic("remove_concept", removed, &node.id);
        }
    }

    let mut merged = real;
    merged.extend(synthetic);
    merged.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.seq.cmp(&b.seq))
    });
    Ok(merged)
}

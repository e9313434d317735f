//! Two-way merge of divergent graph files.
//!
//! Reconciles a `left` and `right` store into a fresh output store. Nodes are
//! settled first, edges after, because edge targets may move to suffixed
//! conflict variants. Disagreements become first-class conflict groups: both
//! versions survive under `<id>::left` / `<id>::right` with `needs_merge`
//! set, for later resolution via the CLI or the `resolve_conflict` tool.

pub mod resolve;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::error::{KnowledgeError, Result};
use crate::graph::now_ts;
use crate::graph::slug::{canonical_id, has_merge_suffix, LEFT_SUFFIX, RIGHT_SUFFIX};
use crate::graph::store;
use crate::graph::types::{Edge, Node};

/// Counters and minted conflict groups from one merge run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    /// Ids present on one side only, or identical on both.
    pub clean: usize,
    /// Ids present on both sides with differing content.
    pub concept_conflicts: usize,
    /// Conflicted nodes whose two edge sets also disagree.
    pub edge_conflicts: usize,
    /// Ids whose lone or agreed record is soft-deleted.
    pub removed_clean: usize,
    /// Newly minted conflict group UUIDs.
    pub merge_groups: Vec<String>,
}

/// One edge awaiting pass 2, tagged with the side it came from so the target
/// remap can be resolved per-origin.
struct QueuedEdge {
    edge: Edge,
    origin: Side,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn key(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Side::Left => LEFT_SUFFIX,
            Side::Right => RIGHT_SUFFIX,
        }
    }
}

/// Content identity for node records: display fields, ownership, file refs,
/// and removed-state. Embeddings, timestamps, and merge metadata are
/// deliberately ignored.
pub fn content_identical(a: &Node, b: &Node) -> bool {
    a.name == b.name
        && a.kind == b.kind
        && a.summary == b.summary
        && a.why.as_deref().unwrap_or("") == b.why.as_deref().unwrap_or("")
        && a.parent_id == b.parent_id
        && a.file_refs.as_deref().unwrap_or(&[]) == b.file_refs.as_deref().unwrap_or(&[])
        && a.removed_at.is_some() == b.removed_at.is_some()
}

fn edge_key(e: &Edge) -> (String, &'static str, Option<String>) {
    (e.to_id.clone(), e.relation.as_str(), e.description.clone())
}

/// Multiset equality of two outgoing-edge sets for the same source node.
fn edge_sets_identical(a: &[&Edge], b: &[&Edge]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts: HashMap<(String, &'static str, Option<String>), i64> = HashMap::new();
    for e in a {
        *counts.entry(edge_key(e)).or_default() += 1;
    }
    for e in b {
        let entry = counts.entry(edge_key(e)).or_default();
        *entry -= 1;
        if *entry < 0 {
            return false;
        }
    }
    true
}

struct MergeState {
    report: MergeReport,
    /// `"left:<canonical>"` / `"right:<canonical>"` → suffixed target id.
    remap: HashMap<String, String>,
    queued: Vec<QueuedEdge>,
    /// Inserted nodes whose `parent_id` may need the same remap as edges:
    /// `(node id in output, parent canonical id, origin side)`.
    parent_fixups: Vec<(String, String, Side)>,
}

/// Merge two open stores into a third, empty one.
pub fn merge_connections(
    left: &Connection,
    right: &Connection,
    out: &Connection,
    left_label: &str,
    right_label: &str,
) -> Result<MergeReport> {
    let left_nodes = store::get_all_nodes_raw(left)?;
    let right_nodes = store::get_all_nodes_raw(right)?;
    let left_edges = store::get_all_edges_raw(left)?;
    let right_edges = store::get_all_edges_raw(right)?;

    let mut edges_by_from: HashMap<(Side, &str), Vec<&Edge>> = HashMap::new();
    for e in &left_edges {
        edges_by_from
            .entry((Side::Left, e.from_id.as_str()))
            .or_default()
            .push(e);
    }
    for e in &right_edges {
        edges_by_from
            .entry((Side::Right, e.from_id.as_str()))
            .or_default()
            .push(e);
    }

    // Group variants per canonical id. BTreeMap keeps processing order
    // deterministic, which keeps the counters deterministic.
    let mut groups: BTreeMap<String, (Vec<&Node>, Vec<&Node>)> = BTreeMap::new();
    for n in &left_nodes {
        groups
            .entry(canonical_id(&n.id).to_string())
            .or_default()
            .0
            .push(n);
    }
    for n in &right_nodes {
        groups
            .entry(canonical_id(&n.id).to_string())
            .or_default()
            .1
            .push(n);
    }

    let mut state = MergeState {
        report: MergeReport::default(),
        remap: HashMap::new(),
        queued: Vec::new(),
        parent_fixups: Vec::new(),
    };
    let merge_ts = now_ts();

    // Pass 1 inserts nodes in canonical-id order, which is not parents-first,
    // and conflicted parents end up under suffixed ids. The engine owns
    // referential ordering, so key checks stay off until both passes finish.
    out.pragma_update(None, "foreign_keys", "OFF")?;

    // Pass 1: nodes.
    for (canon, (left_vs, right_vs)) in &groups {
        let preexisting = left_vs
            .iter()
            .chain(right_vs.iter())
            .any(|n| has_merge_suffix(&n.id) && n.needs_merge);

        if preexisting {
            carry_preexisting_conflict(out, canon, left_vs, right_vs, &edges_by_from, &mut state)?;
            continue;
        }

        match (left_vs.first(), right_vs.first()) {
            (Some(node), None) => {
                insert_clean(out, node, Side::Left, &edges_by_from, &mut state)?;
            }
            (None, Some(node)) => {
                insert_clean(out, node, Side::Right, &edges_by_from, &mut state)?;
            }
            (Some(l), Some(r)) if content_identical(l, r) => {
                insert_identical_pair(out, l, r, &edges_by_from, &mut state)?;
            }
            (Some(l), Some(r)) => {
                mint_conflict(
                    out,
                    canon,
                    l,
                    r,
                    left_label,
                    right_label,
                    &merge_ts,
                    &edges_by_from,
                    &mut state,
                )?;
            }
            (None, None) => unreachable!("canonical group with no variants"),
        }
    }

    // Pass 2: edges, with targets remapped per origin side.
    for q in &state.queued {
        let mut edge = q.edge.clone();
        if !has_merge_suffix(&edge.to_id) {
            let key = format!("{}:{}", q.origin.key(), edge.to_id);
            if let Some(target) = state.remap.get(&key) {
                edge.to_id = target.clone();
            }
        }
        store::insert_edge_raw(out, &edge)?;
    }

    // Parent pointers get the same treatment: a child whose parent became a
    // suffixed conflict variant follows its own side's copy.
    for (node_id, parent_canon, side) in &state.parent_fixups {
        let parent_present: bool = out.query_row(
            "SELECT COUNT(*) > 0 FROM nodes WHERE id = ?1",
            rusqlite::params![parent_canon],
            |row| row.get(0),
        )?;
        if parent_present {
            continue;
        }
        let key = format!("{}:{parent_canon}", side.key());
        if let Some(target) = state.remap.get(&key) {
            out.execute(
                "UPDATE nodes SET parent_id = ?1 WHERE id = ?2",
                rusqlite::params![target, node_id],
            )?;
        }
    }

    out.pragma_update(None, "foreign_keys", "ON")?;

    Ok(state.report)
}

/// Carry forward every variant of an already-conflicted canonical id,
/// verbatim, and register remaps so clean edges still land on a variant.
fn carry_preexisting_conflict(
    out: &Connection,
    canon: &str,
    left_vs: &[&Node],
    right_vs: &[&Node],
    edges_by_from: &HashMap<(Side, &str), Vec<&Edge>>,
    state: &mut MergeState,
) -> Result<()> {
    let mut carried: BTreeMap<&str, (&Node, Side)> = BTreeMap::new();
    for n in left_vs {
        carried.entry(n.id.as_str()).or_insert((n, Side::Left));
    }
    for n in right_vs {
        carried.entry(n.id.as_str()).or_insert((n, Side::Right));
    }

    for (id, (node, side)) in &carried {
        store::insert_node_raw(out, node)?;
        if let Some(parent) = &node.parent_id {
            state
                .parent_fixups
                .push((node.id.clone(), canonical_id(parent).to_string(), *side));
        }
        if let Some(edges) = edges_by_from.get(&(*side, *id)) {
            for e in edges {
                state.queued.push(QueuedEdge {
                    edge: (*e).clone(),
                    origin: *side,
                });
            }
        }
    }

    // Prefer the variant whose suffix matches the origin side, otherwise the
    // first available.
    for side in [Side::Left, Side::Right] {
        let preferred = format!("{canon}{}", side.suffix());
        let target = if carried.contains_key(preferred.as_str()) {
            preferred
        } else if let Some(first) = carried.keys().find(|id| has_merge_suffix(id)) {
            first.to_string()
        } else {
            continue;
        };
        state
            .remap
            .insert(format!("{}:{canon}", side.key()), target);
    }

    Ok(())
}

fn insert_clean(
    out: &Connection,
    node: &Node,
    side: Side,
    edges_by_from: &HashMap<(Side, &str), Vec<&Edge>>,
    state: &mut MergeState,
) -> Result<()> {
    store::insert_node_raw(out, node)?;
    if let Some(parent) = &node.parent_id {
        state
            .parent_fixups
            .push((node.id.clone(), canonical_id(parent).to_string(), side));
    }
    if node.removed_at.is_some() {
        state.report.removed_clean += 1;
    } else {
        state.report.clean += 1;
    }
    if let Some(edges) = edges_by_from.get(&(side, node.id.as_str())) {
        for e in edges {
            state.queued.push(QueuedEdge {
                edge: (*e).clone(),
                origin: side,
            });
        }
    }
    Ok(())
}

/// Both sides agree: keep one copy, union the two edge sets with duplicates
/// removed by content key.
fn insert_identical_pair(
    out: &Connection,
    left_node: &Node,
    right_node: &Node,
    edges_by_from: &HashMap<(Side, &str), Vec<&Edge>>,
    state: &mut MergeState,
) -> Result<()> {
    store::insert_node_raw(out, left_node)?;
    if let Some(parent) = &left_node.parent_id {
        state
            .parent_fixups
            .push((left_node.id.clone(), canonical_id(parent).to_string(), Side::Left));
    }
    if left_node.removed_at.is_some() {
        state.report.removed_clean += 1;
    } else {
        state.report.clean += 1;
    }

    let mut seen: std::collections::HashSet<(String, &'static str, Option<String>)> =
        std::collections::HashSet::new();
    for (side, node) in [(Side::Left, left_node), (Side::Right, right_node)] {
        if let Some(edges) = edges_by_from.get(&(side, node.id.as_str())) {
            for e in edges {
                if seen.insert(edge_key(e)) {
                    state.queued.push(QueuedEdge {
                        edge: (*e).clone(),
                        origin: side,
                    });
                }
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn mint_conflict(
    out: &Connection,
    canon: &str,
    left_node: &Node,
    right_node: &Node,
    left_label: &str,
    right_label: &str,
    merge_ts: &str,
    edges_by_from: &HashMap<(Side, &str), Vec<&Edge>>,
    state: &mut MergeState,
) -> Result<()> {
    let group = uuid::Uuid::new_v4().to_string();
    state.report.concept_conflicts += 1;
    state.report.merge_groups.push(group.clone());

    let left_edges = edges_by_from
        .get(&(Side::Left, left_node.id.as_str()))
        .cloned()
        .unwrap_or_default();
    let right_edges = edges_by_from
        .get(&(Side::Right, right_node.id.as_str()))
        .cloned()
        .unwrap_or_default();
    let edges_conflict = !edge_sets_identical(&left_edges, &right_edges);
    if edges_conflict {
        state.report.edge_conflicts += 1;
    }

    for (side, node, label, edges) in [
        (Side::Left, left_node, left_label, &left_edges),
        (Side::Right, right_node, right_label, &right_edges),
    ] {
        let suffixed = format!("{canon}{}", side.suffix());
        let mut variant = node.clone();
        variant.id = suffixed.clone();
        variant.needs_merge = true;
        variant.merge_group = Some(group.clone());
        variant.source_branch = Some(label.to_string());
        variant.merge_timestamp = Some(merge_ts.to_string());
        store::insert_node_raw(out, &variant)?;
        if let Some(parent) = &variant.parent_id {
            state
                .parent_fixups
                .push((suffixed.clone(), canonical_id(parent).to_string(), side));
        }

        state
            .remap
            .insert(format!("{}:{canon}", side.key()), suffixed.clone());

        for e in edges {
            let mut edge = (*e).clone();
            edge.from_id = suffixed.clone();
            if edges_conflict {
                edge.needs_merge = true;
                edge.merge_group = Some(group.clone());
                edge.source_branch = Some(label.to_string());
                edge.merge_timestamp = Some(merge_ts.to_string());
            }
            state.queued.push(QueuedEdge {
                edge,
                origin: side,
            });
        }
    }

    Ok(())
}

/// Merge two graph files into `into` (defaults to overwriting `left`). The
/// output is written to a temp sibling and atomically renamed into place.
pub fn merge_files(
    left_path: &Path,
    right_path: &Path,
    into: Option<&Path>,
    left_label: &str,
    right_label: &str,
) -> Result<MergeReport> {
    let out_final: PathBuf = into.unwrap_or(left_path).to_path_buf();
    let tmp_path = temp_sibling(&out_final);

    let merge_io = |path: &Path| {
        let path = path.display().to_string();
        move |e: anyhow::Error| KnowledgeError::MergeIo {
            path: path.clone(),
            detail: e.to_string(),
        }
    };

    if !left_path.exists() {
        return Err(KnowledgeError::MergeIo {
            path: left_path.display().to_string(),
            detail: "no such file".into(),
        });
    }
    if !right_path.exists() {
        return Err(KnowledgeError::MergeIo {
            path: right_path.display().to_string(),
            detail: "no such file".into(),
        });
    }

    let left = db::open_database(left_path).map_err(merge_io(left_path))?;
    let right = db::open_database(right_path).map_err(merge_io(right_path))?;

    if tmp_path.exists() {
        std::fs::remove_file(&tmp_path).map_err(|e| KnowledgeError::MergeIo {
            path: tmp_path.display().to_string(),
            detail: e.to_string(),
        })?;
    }
    let out = db::open_database(&tmp_path).map_err(merge_io(&tmp_path))?;

    let report = merge_connections(&left, &right, &out, left_label, right_label)?;

    // Close every handle before the rename; WAL sidecars are checkpointed
    // back into the main file on close.
    drop(left);
    drop(right);
    drop(out);

    std::fs::rename(&tmp_path, &out_final).map_err(|e| KnowledgeError::MergeIo {
        path: out_final.display().to_string(),
        detail: e.to_string(),
    })?;

    tracing::info!(
        out = %out_final.display(),
        clean = report.clean,
        concept_conflicts = report.concept_conflicts,
        edge_conflicts = report.edge_conflicts,
        removed_clean = report.removed_clean,
        "merge complete"
    );

    Ok(report)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "knowledge.db".into());
    path.with_file_name(format!("{name}.merge-tmp"))
}

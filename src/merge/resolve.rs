//! Conflict resolution strategies: keep one side, or keep both.
//!
//! `keep left` / `keep right` hard-delete the loser and rename the winner
//! back to the canonical id; `keep both` renames each variant to
//! `<canonical>-<branch>`. Every path ends by clearing merge metadata on the
//! surviving node(s) and on every edge flagged with the group. Edge
//! references survive the renames because [`store::rename_node_id`] rewrites
//! both endpoints atomically.

use rusqlite::Connection;

use crate::error::{KnowledgeError, Result};
use crate::graph::slug::{canonical_id, merge_suffix};
use crate::graph::store;
use crate::graph::types::Node;

/// Which variant(s) survive resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepChoice {
    Left,
    Right,
    Both,
}

impl std::str::FromStr for KeepChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "both" => Ok(Self::Both),
            _ => Err(format!("invalid keep choice: {s}. Expected left, right, or both")),
        }
    }
}

/// Load the variants of a merge group, failing with `NotFound` when empty.
pub fn load_group(conn: &Connection, merge_group: &str) -> Result<Vec<Node>> {
    let variants = store::get_nodes_by_merge_group(conn, merge_group)?;
    if variants.is_empty() {
        return Err(KnowledgeError::NotFound(merge_group.to_string()));
    }
    Ok(variants)
}

/// Pick the winner the way `resolve_conflict` does: a live variant beats a
/// soft-deleted one (the conflict was "one side deleted"); among live
/// variants the `::left` one wins.
pub fn pick_winner(variants: &[Node]) -> &Node {
    let live: Vec<&Node> = variants.iter().filter(|n| n.is_live()).collect();
    let candidates: Vec<&Node> = if live.is_empty() {
        variants.iter().collect()
    } else {
        live
    };
    candidates
        .iter()
        .find(|n| merge_suffix(&n.id) == Some("left"))
        .copied()
        .unwrap_or(candidates[0])
}

/// Hard-delete every losing variant in one transaction, then rename the
/// winner back to its canonical id (the rename runs its own transaction
/// because it toggles foreign-key enforcement). Returns the canonical id.
/// Merge flags are left set; callers finish with [`clear_group_flags`]
/// inside their own transaction.
pub fn promote_winner(
    conn: &mut Connection,
    merge_group: &str,
    winner_id: &str,
) -> Result<String> {
    let variants = load_group(conn, merge_group)?;
    if !variants.iter().any(|n| n.id == winner_id) {
        return Err(KnowledgeError::NotFound(format!(
            "{winner_id} is not part of merge group {merge_group}"
        )));
    }

    let tx = conn.transaction()?;
    for variant in &variants {
        if variant.id != winner_id {
            store::hard_delete_node(&tx, &variant.id)?;
        }
    }
    tx.commit()?;

    let canonical = canonical_id(winner_id).to_string();
    if winner_id != canonical {
        store::rename_node_id(conn, winner_id, &canonical)?;
    }
    Ok(canonical)
}

/// Clear merge metadata on the surviving node and on every edge flagged with
/// the group. Statement-level; the caller owns the transaction.
pub fn clear_group_flags(conn: &Connection, node_id: &str, merge_group: &str) -> Result<()> {
    store::clear_node_merge_flags(conn, node_id)?;
    store::clear_edge_merge_flags_by_group(conn, merge_group)?;
    Ok(())
}

/// Resolve a group by keeping one winner: hard-delete every other variant,
/// rename the winner back to its canonical id, and clear merge flags on the
/// node and the group's edges. Returns the canonical id.
pub fn resolve_to_winner(
    conn: &mut Connection,
    merge_group: &str,
    winner_id: &str,
) -> Result<String> {
    let canonical = promote_winner(conn, merge_group, winner_id)?;

    let tx = conn.transaction()?;
    clear_group_flags(&tx, &canonical, merge_group)?;
    tx.commit()?;

    tracing::info!(merge_group, winner = %canonical, "conflict resolved");
    Ok(canonical)
}

/// Resolve a group per an explicit CLI choice. Returns the surviving ids.
pub fn resolve_keep(
    conn: &mut Connection,
    merge_group: &str,
    choice: KeepChoice,
) -> Result<Vec<String>> {
    let variants = load_group(conn, merge_group)?;

    match choice {
        KeepChoice::Left | KeepChoice::Right => {
            let wanted = if choice == KeepChoice::Left {
                "left"
            } else {
                "right"
            };
            let winner = variants
                .iter()
                .find(|n| merge_suffix(&n.id) == Some(wanted))
                .ok_or_else(|| {
                    KnowledgeError::NotFound(format!(
                        "merge group {merge_group} has no ::{wanted} variant"
                    ))
                })?;
            let id = winner.id.clone();
            Ok(vec![resolve_to_winner(conn, merge_group, &id)?])
        }
        KeepChoice::Both => {
            let mut kept = Vec::with_capacity(variants.len());
            for variant in &variants {
                let canonical = canonical_id(&variant.id).to_string();
                let branch = variant
                    .source_branch
                    .clone()
                    .or_else(|| merge_suffix(&variant.id).map(str::to_string))
                    .unwrap_or_else(|| "kept".to_string());
                let new_id = format!("{canonical}-{}", crate::graph::slug::slugify(&branch, None));
                store::rename_node_id(conn, &variant.id, &new_id)?;
                kept.push(new_id);
            }

            let tx = conn.transaction()?;
            for id in &kept {
                store::clear_node_merge_flags(&tx, id)?;
            }
            store::clear_edge_merge_flags_by_group(&tx, merge_group)?;
            tx.commit()?;

            tracing::info!(merge_group, kept = ?kept, "conflict resolved keeping both");
            Ok(kept)
        }
    }
}

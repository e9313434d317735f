//! `list_conflicts` — unresolved merge conflicts, grouped.
//!
//! Returns every `needs_merge` node grouped by merge group, each group
//! carrying its timestamp and the competing versions, removed-vs-live
//! conflicts included.

use std::collections::BTreeMap;

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::slug::canonical_id;
use crate::graph::store;

/// Parameters for the `list_conflicts` tool (none).
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListConflictsParams {}

/// One competing version of a conflicted concept.
#[derive(Debug, Serialize)]
pub struct ConflictVersion {
    /// The suffixed id as stored (`<id>::left` / `<id>::right`).
    pub id: String,
    /// The id both versions are competing for.
    pub canonical_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    pub name: String,
    pub kind: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_refs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<String>,
}

/// One conflict group: the competing versions of a single concept.
#[derive(Debug, Serialize)]
pub struct ConflictGroup {
    pub merge_group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_timestamp: Option<String>,
    pub versions: Vec<ConflictVersion>,
}

#[derive(Debug, Serialize)]
pub struct ListConflictsResponse {
    pub groups: Vec<ConflictGroup>,
    pub total: usize,
}

pub fn run(conn: &Connection) -> Result<ListConflictsResponse> {
    let mut grouped: BTreeMap<String, ConflictGroup> = BTreeMap::new();

    for node in store::get_conflict_nodes(conn)? {
        let Some(group_id) = node.merge_group.clone() else {
            // needs_merge without a group would be corruption; the raw scan
            // never yields it because insert_node_raw refuses it.
            continue;
        };
        let entry = grouped
            .entry(group_id.clone())
            .or_insert_with(|| ConflictGroup {
                merge_group: group_id,
                merge_timestamp: node.merge_timestamp.clone(),
                versions: Vec::new(),
            });
        entry.versions.push(ConflictVersion {
            canonical_id: canonical_id(&node.id).to_string(),
            id: node.id,
            source_branch: node.source_branch,
            name: node.name,
            kind: node.kind.to_string(),
            summary: node.summary,
            why: node.why,
            file_refs: node.file_refs,
            parent_id: node.parent_id,
            removed_at: node.removed_at,
        });
    }

    let groups: Vec<ConflictGroup> = grouped.into_values().collect();
    let total = groups.len();
    Ok(ListConflictsResponse { groups, total })
}

//! `link` / `unlink` — typed edges between live concepts.

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::store;
use crate::graph::types::RelationType;
use crate::tools::record_timeline;

/// Parameters for the `link` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LinkParams {
    #[schemars(description = "Source concept id")]
    pub from: String,
    #[schemars(description = "Target concept id")]
    pub to: String,
    #[schemars(description = "Relation: connects_to, depends_on, implements, calls, or configured_by")]
    pub relation: RelationType,
    #[schemars(description = "Optional free-text description of the relationship")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LinkResult {
    pub edge_id: i64,
    pub message: String,
}

/// Parameters for the `unlink` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UnlinkParams {
    #[schemars(description = "Source concept id")]
    pub from: String,
    #[schemars(description = "Target concept id")]
    pub to: String,
    #[schemars(description = "Relation of the edge(s) to remove")]
    pub relation: RelationType,
}

#[derive(Debug, Serialize)]
pub struct UnlinkResult {
    pub removed: usize,
    pub message: String,
}

pub fn run_link(conn: &mut Connection, params: &LinkParams) -> Result<LinkResult> {
    let tx = conn.transaction()?;

    // Both endpoints must be live; the missing one is named in the error.
    let edge_id = store::insert_edge(
        &tx,
        &params.from,
        &params.to,
        params.relation,
        params.description.as_deref(),
    )?;

    let message = format!(
        "Linked {} -[{}]-> {}",
        params.from, params.relation, params.to
    );
    record_timeline(
        &tx,
        "link",
        &serde_json::to_string(params).unwrap_or_default(),
        &message,
        true,
        false,
        &[params.from.clone(), params.to.clone()],
    );

    tx.commit()?;
    Ok(LinkResult { edge_id, message })
}

pub fn run_unlink(conn: &mut Connection, params: &UnlinkParams) -> Result<UnlinkResult> {
    let tx = conn.transaction()?;

    let removed = store::delete_edge(&tx, &params.from, &params.to, params.relation)?;
    let message = format!(
        "Removed {removed} edge(s) {} -[{}]-> {}",
        params.from, params.relation, params.to
    );
    record_timeline(
        &tx,
        "unlink",
        &serde_json::to_string(params).unwrap_or_default(),
        &message,
        true,
        false,
        &[params.from.clone(), params.to.clone()],
    );

    tx.commit()?;
    Ok(UnlinkResult { removed, message })
}

//! `remove_concept` — soft-delete a concept.
//!
//! The node stays in the store with `removed_at`/`removed_reason` set; its
//! edges are hard-deleted and its live children become roots, all in one
//! transaction.

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::store;
use crate::tools::record_timeline;

/// Parameters for the `remove_concept` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RemoveConceptParams {
    #[schemars(description = "Id of the concept to remove")]
    pub id: String,
    #[schemars(description = "Why the concept is being removed")]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct RemoveConceptResult {
    pub id: String,
    pub message: String,
}

pub fn run(conn: &mut Connection, params: &RemoveConceptParams) -> Result<RemoveConceptResult> {
    let tx = conn.transaction()?;

    store::soft_delete_node(&tx, &params.id, &params.reason)?;

    let message = format!("Removed concept {} ({})", params.id, params.reason);
    record_timeline(
        &tx,
        "remove_concept",
        &serde_json::to_string(params).unwrap_or_default(),
        &message,
        true,
        false,
        std::slice::from_ref(&params.id),
    );

    tx.commit()?;
    Ok(RemoveConceptResult {
        id: params.id.clone(),
        message,
    })
}

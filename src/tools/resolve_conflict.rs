//! `resolve_conflict` — settle one merge group with resolved content.
//!
//! Winner selection: a live variant beats a soft-deleted one; otherwise the
//! `::left` variant wins. The loser is hard-deleted, the winner is renamed
//! back to the canonical id, the resolved patch is applied, and the
//! embedding is regenerated because the summary changed. The hard-deletes
//! commit as one transaction and the flag-clear + patch + timeline entry as
//! another; only the rename runs apart, inside its own foreign-key-toggling
//! transaction.

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::embedding::{embedding_text, EmbeddingProvider};
use crate::error::Result;
use crate::graph::store::{self, NodePatch};
use crate::merge::resolve;
use crate::tools::record_timeline;

/// The content the resolved concept should carry.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedFields {
    #[schemars(description = "The reconciled summary")]
    pub summary: String,
    #[schemars(description = "Optional reconciled rationale")]
    pub why: Option<String>,
    #[schemars(description = "Optional reconciled file references")]
    pub file_refs: Option<Vec<String>>,
}

/// Parameters for the `resolve_conflict` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ResolveConflictParams {
    #[schemars(description = "UUID of the merge group to resolve")]
    pub merge_group: String,
    pub resolved: ResolvedFields,
    #[schemars(description = "Why this resolution is correct")]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveConflictResult {
    pub id: String,
    pub message: String,
}

pub fn run(
    conn: &mut Connection,
    provider: &dyn EmbeddingProvider,
    params: &ResolveConflictParams,
) -> Result<ResolveConflictResult> {
    let variants = resolve::load_group(conn, &params.merge_group)?;
    let winner = resolve::pick_winner(&variants);
    let winner_id = winner.id.clone();

    // Embed before any write so an embedding failure leaves the store
    // untouched. A winner that was itself soft-deleted stays removed; the
    // resolution only settles the identity, so no re-embed is needed.
    let embedding = if winner.is_live() {
        Some(provider.embed(&embedding_text(
            &winner.name,
            winner.kind,
            &params.resolved.summary,
        ))?)
    } else {
        None
    };

    // Losers are hard-deleted in one transaction, then the winner is renamed
    // (the rename owns its transaction because it toggles foreign keys).
    let canonical = resolve::promote_winner(conn, &params.merge_group, &winner_id)?;

    // Flag-clear, resolved patch, and the timeline entry commit together.
    let tx = conn.transaction()?;
    resolve::clear_group_flags(&tx, &canonical, &params.merge_group)?;
    let message = match embedding {
        Some(embedding) => {
            store::update_node(
                &tx,
                &canonical,
                &NodePatch {
                    summary: Some(params.resolved.summary.clone()),
                    why: params.resolved.why.clone(),
                    file_refs: params.resolved.file_refs.clone(),
                    embedding: Some(embedding),
                    ..Default::default()
                },
            )?;
            format!("Resolved {} as {canonical}: {}", params.merge_group, params.reason)
        }
        None => format!(
            "Resolved {} as {canonical} (concept remains removed): {}",
            params.merge_group, params.reason
        ),
    };
    record_timeline(
        &tx,
        "resolve_conflict",
        &serde_json::to_string(params).unwrap_or_default(),
        &message,
        true,
        false,
        std::slice::from_ref(&canonical),
    );
    tx.commit()?;

    tracing::info!(merge_group = %params.merge_group, winner = %canonical, "conflict resolved");

    Ok(ResolveConflictResult {
        id: canonical,
        message,
    })
}

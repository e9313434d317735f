//! `create_concept` — add a concept (and optionally its first edges).
//!
//! The id is derived from the name with [`slugify`], the embedding is
//! computed before anything is written, and the node, its declared edges,
//! and the timeline entry commit in one transaction.

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::embedding::{embedding_text, EmbeddingProvider};
use crate::error::{KnowledgeError, Result};
use crate::graph::slug::{has_merge_suffix, is_valid_id, slugify};
use crate::graph::store::{self, NewNode};
use crate::graph::types::{NodeKind, RelationType};
use crate::tools::record_timeline;

/// One edge to create alongside the concept.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EdgeSpec {
    /// Target concept id.
    #[schemars(description = "Id of the target concept")]
    pub to: String,
    #[schemars(description = "Relation: connects_to, depends_on, implements, calls, or configured_by")]
    pub relation: RelationType,
    #[schemars(description = "Optional free-text description of the relationship")]
    pub description: Option<String>,
}

/// Parameters for the `create_concept` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateConceptParams {
    /// Human display name; the id is derived from it.
    #[schemars(description = "Human name of the concept. The id is a slug of this.")]
    pub name: String,

    #[schemars(description = "Kind: feature, module, pattern, config, decision, or component")]
    pub kind: NodeKind,

    /// What this concept is, in a sentence or two.
    #[schemars(description = "Free-text summary of the concept")]
    pub summary: String,

    #[schemars(description = "Optional rationale: why this exists or was decided")]
    pub why: Option<String>,

    /// Nest under an existing concept.
    #[schemars(description = "Optional parent concept id; the new id is nested under it")]
    pub parent_id: Option<String>,

    #[schemars(description = "Optional file path references, e.g. 'src/auth.rs:10-42'")]
    pub file_refs: Option<Vec<String>>,

    /// Edges to create once the node exists. Unknown targets are skipped.
    #[schemars(description = "Optional edges to create from this concept")]
    pub edges: Option<Vec<EdgeSpec>>,

    #[schemars(description = "Optional tag of the task that created this concept")]
    pub created_by_task: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateConceptResult {
    pub id: String,
    pub message: String,
}

pub fn run(
    conn: &mut Connection,
    provider: &dyn EmbeddingProvider,
    params: &CreateConceptParams,
) -> Result<CreateConceptResult> {
    let id = slugify(&params.name, params.parent_id.as_deref());
    if !is_valid_id(&id) || has_merge_suffix(&id) {
        return Err(KnowledgeError::InvalidId(params.name.clone()));
    }

    if params.summary.trim().is_empty() {
        return Err(KnowledgeError::EmbeddingInput);
    }

    // Embedding failure is fatal to this call; nothing is written.
    let embedding = provider.embed(&embedding_text(&params.name, params.kind, &params.summary))?;

    let tx = conn.transaction()?;

    store::insert_node(
        &tx,
        &NewNode {
            id: id.clone(),
            name: params.name.clone(),
            kind: params.kind,
            summary: params.summary.clone(),
            why: params.why.clone(),
            file_refs: params.file_refs.clone(),
            parent_id: params.parent_id.clone(),
            created_by_task: params.created_by_task.clone(),
            embedding: Some(embedding),
        },
    )?;

    let mut affected = vec![id.clone()];
    let mut linked = 0usize;
    let mut skipped = 0usize;
    for spec in params.edges.as_deref().unwrap_or(&[]) {
        if store::get_node(&tx, &spec.to)?.is_some() {
            store::insert_edge(&tx, &id, &spec.to, spec.relation, spec.description.as_deref())?;
            affected.push(spec.to.clone());
            linked += 1;
        } else {
            // Convenience contract: unknown targets do not abort creation.
            tracing::debug!(from = %id, to = %spec.to, "skipping edge to unknown concept");
            skipped += 1;
        }
    }

    let message = if skipped > 0 {
        format!("Created concept {id} with {linked} edge(s); skipped {skipped} unknown target(s)")
    } else if linked > 0 {
        format!("Created concept {id} with {linked} edge(s)")
    } else {
        format!("Created concept {id}")
    };

    record_timeline(
        &tx,
        "create_concept",
        &serde_json::to_string(params).unwrap_or_default(),
        &message,
        true,
        false,
        &affected,
    );

    tx.commit()?;

    Ok(CreateConceptResult { id, message })
}

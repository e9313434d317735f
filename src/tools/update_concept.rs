//! `update_concept` — patch an existing concept.
//!
//! When `name`, `kind`, or `summary` change, the embedding is regenerated
//! from the post-patch values. An update that changes nothing is idempotent
//! and does not bump `updated_at`.

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::embedding::{embedding_text, EmbeddingProvider};
use crate::error::{KnowledgeError, Result};
use crate::graph::store::{self, NodePatch};
use crate::graph::types::NodeKind;
use crate::tools::record_timeline;

/// Fields that may change.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConceptChanges {
    #[schemars(description = "New display name (the id does not change)")]
    pub name: Option<String>,
    #[schemars(description = "New kind")]
    pub kind: Option<NodeKind>,
    #[schemars(description = "New summary")]
    pub summary: Option<String>,
    #[schemars(description = "New rationale")]
    pub why: Option<String>,
    #[schemars(description = "Replacement file references")]
    pub file_refs: Option<Vec<String>>,
    #[schemars(description = "New parent concept id")]
    pub parent_id: Option<String>,
    #[schemars(description = "New creating-task tag")]
    pub created_by_task: Option<String>,
}

/// Parameters for the `update_concept` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateConceptParams {
    #[schemars(description = "Id of the concept to update")]
    pub id: String,
    pub changes: ConceptChanges,
}

#[derive(Debug, Serialize)]
pub struct UpdateConceptResult {
    pub id: String,
    pub changed: bool,
    pub changed_fields: Vec<String>,
    pub message: String,
}

pub fn run(
    conn: &mut Connection,
    provider: &dyn EmbeddingProvider,
    params: &UpdateConceptParams,
) -> Result<UpdateConceptResult> {
    let current = store::get_node(conn, &params.id)?
        .ok_or_else(|| KnowledgeError::NotFound(params.id.clone()))?;

    let changes = &params.changes;

    // Regenerate the embedding whenever a field that feeds it is touched,
    // using the post-patch values.
    let touches_embedding =
        changes.name.is_some() || changes.kind.is_some() || changes.summary.is_some();
    let embedding = if touches_embedding {
        let name = changes.name.as_deref().unwrap_or(&current.name);
        let kind = changes.kind.unwrap_or(current.kind);
        let summary = changes.summary.as_deref().unwrap_or(&current.summary);
        if summary.trim().is_empty() {
            return Err(KnowledgeError::EmbeddingInput);
        }
        Some(provider.embed(&embedding_text(name, kind, summary))?)
    } else {
        None
    };

    let changed_fields = diff_fields(&current, changes);

    let tx = conn.transaction()?;
    let changed = store::update_node(
        &tx,
        &params.id,
        &NodePatch {
            name: changes.name.clone(),
            kind: changes.kind,
            summary: changes.summary.clone(),
            why: changes.why.clone(),
            file_refs: changes.file_refs.clone(),
            parent_id: changes.parent_id.clone(),
            created_by_task: changes.created_by_task.clone(),
            embedding,
        },
    )?;

    let message = if changed {
        format!("Updated {} ({})", params.id, changed_fields.join(", "))
    } else {
        format!("No changes for {} — already up to date", params.id)
    };

    record_timeline(
        &tx,
        "update_concept",
        &serde_json::to_string(params).unwrap_or_default(),
        &message,
        true,
        false,
        std::slice::from_ref(&params.id),
    );

    tx.commit()?;

    Ok(UpdateConceptResult {
        id: params.id.clone(),
        changed,
        changed_fields,
        message,
    })
}

fn diff_fields(current: &crate::graph::types::Node, changes: &ConceptChanges) -> Vec<String> {
    let mut fields = Vec::new();
    if changes.name.as_ref().is_some_and(|v| *v != current.name) {
        fields.push("name".to_string());
    }
    if changes.kind.is_some_and(|v| v != current.kind) {
        fields.push("kind".to_string());
    }
    if changes.summary.as_ref().is_some_and(|v| *v != current.summary) {
        fields.push("summary".to_string());
    }
    if changes
        .why
        .as_ref()
        .is_some_and(|v| Some(v) != current.why.as_ref())
    {
        fields.push("why".to_string());
    }
    if changes
        .file_refs
        .as_ref()
        .is_some_and(|v| Some(v) != current.file_refs.as_ref())
    {
        fields.push("file_refs".to_string());
    }
    if changes
        .parent_id
        .as_ref()
        .is_some_and(|v| Some(v) != current.parent_id.as_ref())
    {
        fields.push("parent_id".to_string());
    }
    if changes
        .created_by_task
        .as_ref()
        .is_some_and(|v| Some(v) != current.created_by_task.as_ref())
    {
        fields.push("created_by_task".to_string());
    }
    fields
}

//! The tool layer — the operations agents invoke.
//!
//! Each tool lives in its own module as a pure function over the store (plus
//! the embedding provider where needed); [`KnowledgeTools`] wires them into
//! an MCP tool router. Every invocation is recorded in the timeline; a
//! recording failure is swallowed and reported on the diagnostic channel so
//! it can never fail the tool itself.

pub mod create_concept;
pub mod link;
pub mod list_conflicts;
pub mod list_roots;
pub mod remove_concept;
pub mod resolve_conflict;
pub mod understand;
pub mod update_concept;

use std::future::Future;
use std::sync::{Arc, Mutex};

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::KnowledgeConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::KnowledgeError;
use crate::graph::{now_ts, timeline};

/// Append a timeline row for a tool invocation. Never fails: a logging error
/// is reported via tracing and otherwise dropped.
pub fn record_timeline(
    conn: &Connection,
    tool: &str,
    params_json: &str,
    result_summary: &str,
    is_write: bool,
    is_error: bool,
    affected_ids: &[String],
) {
    if let Err(e) = timeline::insert_timeline_entry(
        conn,
        &now_ts(),
        tool,
        params_json,
        result_summary,
        is_write,
        is_error,
        affected_ids,
    ) {
        tracing::warn!(tool, error = %e, "timeline logging failed");
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

fn wire_err(err: KnowledgeError) -> String {
    err.to_wire().to_string()
}

/// The MCP tool handler. Holds shared state (store connection, embedding
/// provider, config) and exposes every tool via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct KnowledgeTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    embedding: Arc<dyn EmbeddingProvider>,
    config: Arc<KnowledgeConfig>,
}

impl KnowledgeTools {
    /// Run a tool body on the blocking pool with exclusive store access,
    /// recording a timeline row when the body errors.
    async fn run_blocking<T, F>(
        &self,
        tool_name: &'static str,
        params_json: String,
        is_write: bool,
        body: F,
    ) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &dyn EmbeddingProvider) -> Result<T, KnowledgeError>
            + Send
            + 'static,
    {
        let db = Arc::clone(&self.db);
        let embedding = Arc::clone(&self.embedding);

        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| wire_err(KnowledgeError::InvariantViolation(format!(
                    "store lock poisoned: {e}"
                ))))?;
            match body(&mut conn, embedding.as_ref()) {
                Ok(value) => Ok(value),
                Err(e) => {
                    record_timeline(
                        &conn,
                        tool_name,
                        &params_json,
                        &e.to_string(),
                        is_write,
                        true,
                        &[],
                    );
                    Err(wire_err(e))
                }
            }
        })
        .await
        .map_err(|e| format!("tool task failed: {e}"))?
    }
}

#[tool_router]
impl KnowledgeTools {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        embedding: Arc<dyn EmbeddingProvider>,
        config: Arc<KnowledgeConfig>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            embedding,
            config,
        }
    }

    #[tool(
        description = "Query the knowledge graph by natural-language intent before starting work. Returns the most relevant concepts with their parents, children, and relationships."
    )]
    async fn understand(
        &self,
        Parameters(mut params): Parameters<understand::UnderstandParams>,
    ) -> Result<String, String> {
        params.top_k = params.top_k.or(Some(self.config.retrieval.default_top_k));
        let params_json = to_json(&params)?;
        let summary_json = params_json.clone();
        let response = self
            .run_blocking("understand", params_json, false, move |conn, provider| {
                let response = understand::run(conn, provider, &params)?;
                record_timeline(
                    conn,
                    "understand",
                    &summary_json,
                    &format!("{} match(es)", response.matches.len()),
                    false,
                    false,
                    &[],
                );
                Ok(response)
            })
            .await?;
        to_json(&response)
    }

    #[tool(
        description = "Create a concept: a feature, module, pattern, config, decision, or component. Optionally link it to existing concepts in the same call."
    )]
    async fn create_concept(
        &self,
        Parameters(params): Parameters<create_concept::CreateConceptParams>,
    ) -> Result<String, String> {
        let params_json = to_json(&params)?;
        let result = self
            .run_blocking("create_concept", params_json, true, move |conn, provider| {
                create_concept::run(conn, provider, &params)
            })
            .await?;
        tracing::info!(id = %result.id, "concept created");
        to_json(&result)
    }

    #[tool(
        description = "Update a concept's fields. Changing name, kind, or summary re-embeds the concept."
    )]
    async fn update_concept(
        &self,
        Parameters(params): Parameters<update_concept::UpdateConceptParams>,
    ) -> Result<String, String> {
        let params_json = to_json(&params)?;
        let result = self
            .run_blocking("update_concept", params_json, true, move |conn, provider| {
                update_concept::run(conn, provider, &params)
            })
            .await?;
        to_json(&result)
    }

    #[tool(description = "Create a typed directed relationship between two concepts.")]
    async fn link(
        &self,
        Parameters(params): Parameters<link::LinkParams>,
    ) -> Result<String, String> {
        let params_json = to_json(&params)?;
        let result = self
            .run_blocking("link", params_json, true, move |conn, _| {
                link::run_link(conn, &params)
            })
            .await?;
        to_json(&result)
    }

    #[tool(description = "Remove relationship edge(s) between two concepts.")]
    async fn unlink(
        &self,
        Parameters(params): Parameters<link::UnlinkParams>,
    ) -> Result<String, String> {
        let params_json = to_json(&params)?;
        let result = self
            .run_blocking("unlink", params_json, true, move |conn, _| {
                link::run_unlink(conn, &params)
            })
            .await?;
        to_json(&result)
    }

    #[tool(
        description = "Soft-delete a concept. Its edges are removed and its children become roots; history is preserved."
    )]
    async fn remove_concept(
        &self,
        Parameters(params): Parameters<remove_concept::RemoveConceptParams>,
    ) -> Result<String, String> {
        let params_json = to_json(&params)?;
        let result = self
            .run_blocking("remove_concept", params_json, true, move |conn, _| {
                remove_concept::run(conn, &params)
            })
            .await?;
        to_json(&result)
    }

    #[tool(
        description = "List every root concept with its children, plus overall graph statistics."
    )]
    async fn list_roots(
        &self,
        Parameters(params): Parameters<list_roots::ListRootsParams>,
    ) -> Result<String, String> {
        let params_json = to_json(&params)?;
        let summary_json = params_json.clone();
        let response = self
            .run_blocking("list_roots", params_json, false, move |conn, _| {
                let response = list_roots::run(conn)?;
                record_timeline(
                    conn,
                    "list_roots",
                    &summary_json,
                    &format!("{} root(s)", response.roots.len()),
                    false,
                    false,
                    &[],
                );
                Ok(response)
            })
            .await?;
        to_json(&response)
    }

    #[tool(description = "List unresolved merge conflicts, grouped by merge group.")]
    async fn list_conflicts(
        &self,
        Parameters(params): Parameters<list_conflicts::ListConflictsParams>,
    ) -> Result<String, String> {
        let params_json = to_json(&params)?;
        let summary_json = params_json.clone();
        let response = self
            .run_blocking("list_conflicts", params_json, false, move |conn, _| {
                let response = list_conflicts::run(conn)?;
                record_timeline(
                    conn,
                    "list_conflicts",
                    &summary_json,
                    &format!("{} conflict group(s)", response.total),
                    false,
                    false,
                    &[],
                );
                Ok(response)
            })
            .await?;
        to_json(&response)
    }

    #[tool(
        description = "Resolve a merge conflict group with reconciled content. The live (or left) variant wins and is renamed back to the canonical id."
    )]
    async fn resolve_conflict(
        &self,
        Parameters(params): Parameters<resolve_conflict::ResolveConflictParams>,
    ) -> Result<String, String> {
        let params_json = to_json(&params)?;
        let result = self
            .run_blocking("resolve_conflict", params_json, true, move |conn, provider| {
                resolve_conflict::run(conn, provider, &params)
            })
            .await?;
        to_json(&result)
    }
}

#[tool_handler]
impl ServerHandler for KnowledgeTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Megamemory is a per-project knowledge graph. Call understand before \
                 starting work, create_concept and link as you learn the codebase, and \
                 list_conflicts after merging branches."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

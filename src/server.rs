//! MCP server initialization for the stdio transport.
//!
//! Wires the store, the embedding provider, and the tool handler into a
//! running server. The store and provider are constructed once and shared;
//! the single `Arc<Mutex<Connection>>` is what serializes writers.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use rmcp::ServiceExt;

use crate::config::KnowledgeConfig;
use crate::db;
use crate::embedding;
use crate::tools::KnowledgeTools;

/// Shared setup: open the store, create the embedding provider.
fn setup_shared_state(
    config: KnowledgeConfig,
) -> Result<(
    Arc<Mutex<rusqlite::Connection>>,
    Arc<dyn embedding::EmbeddingProvider>,
    Arc<KnowledgeConfig>,
)> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    let db = Arc::new(Mutex::new(conn));

    let provider = embedding::create_provider(&config.embedding)?;
    let embedding: Arc<dyn embedding::EmbeddingProvider> = Arc::from(provider);
    tracing::info!("embedding provider ready");

    Ok((db, embedding, Arc::new(config)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: KnowledgeConfig) -> Result<()> {
    tracing::info!("starting megamemory MCP server on stdio");

    let (db, embedding, config) = setup_shared_state(config)?;

    let tools = KnowledgeTools::new(db, embedding, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running — waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

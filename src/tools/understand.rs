//! `understand` — semantic query over the graph.
//!
//! Embeds the query, scores every live concept with an embedding, and wraps
//! each of the top matches in a context envelope: the node itself plus its
//! parent, children, and both-directional edges.

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::graph::search::find_top_k;
use crate::graph::store;
use crate::graph::types::Node;

/// Parameters for the `understand` tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UnderstandParams {
    /// Natural-language description of what you are about to work on.
    #[schemars(description = "Natural language query describing the intent")]
    pub query: String,

    /// Maximum number of matches to return. Defaults to 10.
    #[schemars(description = "Maximum number of matches to return (default 10)")]
    pub top_k: Option<usize>,
}

/// A node's live parent, by reference.
#[derive(Debug, Clone, Serialize)]
pub struct ParentRef {
    pub id: String,
    pub name: String,
}

/// A live child in compact form.
#[derive(Debug, Clone, Serialize)]
pub struct ChildRef {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub summary: String,
}

/// One edge with its neighbor resolved.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeRef {
    pub relation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub neighbor_id: String,
    pub neighbor_name: String,
}

/// One match: the node plus its immediate graph context and score.
#[derive(Debug, Serialize)]
pub struct ContextEnvelope {
    #[serde(flatten)]
    pub node: Node,
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    pub children: Vec<ChildRef>,
    pub outgoing: Vec<EdgeRef>,
    pub incoming: Vec<EdgeRef>,
}

#[derive(Debug, Serialize)]
pub struct UnderstandResponse {
    pub matches: Vec<ContextEnvelope>,
}

pub const DEFAULT_TOP_K: usize = 10;

pub fn run(
    conn: &Connection,
    provider: &dyn EmbeddingProvider,
    params: &UnderstandParams,
) -> Result<UnderstandResponse> {
    if params.query.trim().is_empty() {
        return Ok(UnderstandResponse { matches: vec![] });
    }

    let candidates = store::get_all_active_nodes_with_embeddings(conn)?;
    if candidates.is_empty() {
        return Ok(UnderstandResponse { matches: vec![] });
    }

    let query_embedding = provider.embed(&params.query)?;
    let scored: Vec<(String, Option<Vec<f32>>)> = candidates
        .iter()
        .map(|n| (n.id.clone(), n.embedding.clone()))
        .collect();
    let top = find_top_k(
        &query_embedding,
        &scored,
        params.top_k.unwrap_or(DEFAULT_TOP_K),
    )?;

    let mut matches = Vec::with_capacity(top.len());
    for (id, similarity) in top {
        let Some(node) = store::get_node(conn, &id)? else {
            continue;
        };
        matches.push(build_envelope(conn, node, similarity)?);
    }

    Ok(UnderstandResponse { matches })
}

fn build_envelope(conn: &Connection, node: Node, similarity: f32) -> Result<ContextEnvelope> {
    let parent = match &node.parent_id {
        Some(pid) => store::get_node(conn, pid)?.map(|p| ParentRef {
            id: p.id,
            name: p.name,
        }),
        None => None,
    };

    let children = store::get_children(conn, &node.id)?
        .into_iter()
        .map(|c| ChildRef {
            id: c.id,
            name: c.name,
            kind: c.kind.to_string(),
            summary: c.summary,
        })
        .collect();

    let outgoing = store::get_outgoing_edges(conn, &node.id)?
        .into_iter()
        .map(|e| EdgeRef {
            relation: e.edge.relation.to_string(),
            description: e.edge.description,
            neighbor_id: e.edge.to_id,
            neighbor_name: e.neighbor_name,
        })
        .collect();

    let incoming = store::get_incoming_edges(conn, &node.id)?
        .into_iter()
        .map(|e| EdgeRef {
            relation: e.edge.relation.to_string(),
            description: e.edge.description,
            neighbor_id: e.edge.from_id,
            neighbor_name: e.neighbor_name,
        })
        .collect();

    Ok(ContextEnvelope {
        node,
        similarity,
        parent,
        children,
        outgoing,
        incoming,
    })
}

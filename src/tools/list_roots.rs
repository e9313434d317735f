//! `list_roots` — top-level view of the graph.
//!
//! Every live root with one level of children, plus overall stats. An empty
//! graph gets a bootstrap hint instead of a bare empty list.

use std::collections::HashMap;

use rusqlite::Connection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::store::{self, GraphStats};
use crate::tools::understand::ChildRef;

/// Parameters for the `list_roots` tool (none).
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListRootsParams {}

/// One root with its immediate live children.
#[derive(Debug, Serialize)]
pub struct RootEntry {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub summary: String,
    pub children: Vec<ChildRef>,
}

#[derive(Debug, Serialize)]
pub struct ListRootsResponse {
    pub roots: Vec<RootEntry>,
    pub stats: GraphStats,
    pub kinds: HashMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

pub fn run(conn: &Connection) -> Result<ListRootsResponse> {
    let stats = store::get_stats(conn)?;
    let kinds = store::get_kinds_breakdown(conn)?;

    let mut roots = Vec::new();
    for node in store::get_root_nodes(conn)? {
        let children = store::get_children(conn, &node.id)?
            .into_iter()
            .map(|c| ChildRef {
                id: c.id,
                name: c.name,
                kind: c.kind.to_string(),
                summary: c.summary,
            })
            .collect();
        roots.push(RootEntry {
            id: node.id,
            name: node.name,
            kind: node.kind.to_string(),
            summary: node.summary,
            children,
        });
    }

    let hint = (stats.nodes == 0).then(|| {
        "The graph is empty. Bootstrap it with create_concept for your project's \
         main modules, features, and decisions."
            .to_string()
    });

    Ok(ListRootsResponse {
        roots,
        stats,
        kinds,
        hint,
    })
}

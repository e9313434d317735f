#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use megamemory::db;
use megamemory::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use megamemory::error::{KnowledgeError, Result};
use megamemory::graph::store::{self, NewNode};
use megamemory::graph::types::NodeKind;
use rusqlite::Connection;

/// Open a fresh in-memory store with all migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Deterministic 384-dim unit vector with a spike at position `seed`.
/// Distinct seeds produce orthogonal vectors.
pub fn spike_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

/// Deterministic fake embedding provider for tests.
///
/// Each distinct input text is assigned the next free spike dimension, so
/// identical texts embed identically (cosine 1.0) and different texts embed
/// orthogonally (cosine 0.0). Empty input is rejected the way the real
/// provider rejects it.
pub struct StubEmbedder {
    assigned: Mutex<HashMap<String, usize>>,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            assigned: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for StubEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(KnowledgeError::EmbeddingInput);
        }
        let mut assigned = self.assigned.lock().unwrap();
        let next = assigned.len();
        let dim = *assigned.entry(text.to_string()).or_insert(next);
        Ok(spike_embedding(dim))
    }
}

/// Insert a bare module node straight through the store, with an optional
/// orthogonal embedding.
pub fn insert_plain_node(conn: &Connection, id: &str, embedding_seed: Option<usize>) {
    store::insert_node(
        conn,
        &NewNode {
            id: id.to_string(),
            name: id.to_string(),
            kind: NodeKind::Module,
            summary: format!("summary of {id}"),
            why: None,
            file_refs: None,
            parent_id: None,
            created_by_task: None,
            embedding: embedding_seed.map(spike_embedding),
        },
    )
    .unwrap();
}

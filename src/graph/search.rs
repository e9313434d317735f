//! Cosine-similarity retrieval over the candidate set.
//!
//! The target regime is well under 10k concepts, so retrieval is an
//! exhaustive scan: score every candidate, sort descending, take `k`.

use crate::embedding::EMBEDDING_DIM;
use crate::error::{KnowledgeError, Result};

/// Cosine similarity of two vectors. Returns 0.0 if either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(KnowledgeError::EmbeddingDim {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

/// Score every candidate against the query and return the top `k` as
/// `(id, similarity)` pairs, best first. Candidates with missing or empty
/// embeddings are skipped.
pub fn find_top_k(
    query: &[f32],
    candidates: &[(String, Option<Vec<f32>>)],
    k: usize,
) -> Result<Vec<(String, f32)>> {
    let mut scored: Vec<(String, f32)> = Vec::with_capacity(candidates.len());
    for (id, embedding) in candidates {
        let Some(embedding) = embedding else { continue };
        if embedding.is_empty() {
            continue;
        }
        let score = cosine_similarity(query, embedding)?;
        scored.push((id.clone(), score));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    Ok(scored)
}

/// Sanity-check a stored embedding: right width, unit norm up to rounding.
pub fn is_unit_embedding(v: &[f32]) -> bool {
    if v.len() != EMBEDDING_DIM {
        return false;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    (norm - 1.0).abs() < 1e-3
}

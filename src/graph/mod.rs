//! The graph storage and query engine.
//!
//! Persistence and retrieval for concept nodes and typed edges: the store
//! contract ([`store`]), semantic retrieval ([`search`]), the activity log
//! and time-travel queries ([`timeline`]), id formation ([`slug`]), and the
//! record types ([`types`]).

pub mod search;
pub mod slug;
pub mod store;
pub mod timeline;
pub mod types;

use crate::error::{KnowledgeError, Result};

/// Current UTC timestamp at second resolution. The fixed format orders
/// lexicographically, which the time-travel queries rely on.
pub fn now_ts() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Encode an embedding as raw little-endian float32 bytes for storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a stored embedding blob. Little-endian on disk regardless of host.
pub fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(KnowledgeError::InvariantViolation(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_bytes_round_trip() {
        let original = vec![0.0f32, 1.0, -1.0, 0.5, f32::MIN_POSITIVE];
        let bytes = embedding_to_bytes(&original);
        assert_eq!(bytes.len(), original.len() * 4);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), original);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let err = bytes_to_embedding(&[0u8; 7]).unwrap_err();
        assert_eq!(err.kind(), "InvariantViolation");
    }

    #[test]
    fn now_ts_has_second_resolution() {
        let ts = now_ts();
        assert_eq!(ts.len(), "2025-01-01T00:00:00Z".len());
        assert!(ts.ends_with('Z'));
    }
}

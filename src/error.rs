//! Stable error kinds surfaced to the tool layer and CLI.
//!
//! Every failure the engine can report maps to exactly one [`KnowledgeError`]
//! variant. The transport serializes errors as `{error_kind, message}`, so the
//! set of kinds (and their string names) is part of the wire contract.

use serde_json::json;

/// All errors the graph engine can surface.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// Node or merge group does not exist (or is soft-deleted where liveness is required).
    #[error("not found: {0}")]
    NotFound(String),

    /// Creating an id that already exists, live or removed.
    #[error("duplicate id: {0}")]
    Duplicate(String),

    /// `parent_id` references a node that is missing or removed.
    #[error("invalid parent: {0}")]
    InvalidParent(String),

    /// Id failed the slug grammar, or uses a reserved merge suffix.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// Soft-deleting a node that is already soft-deleted.
    #[error("already removed: {0}")]
    AlreadyRemoved(String),

    /// Empty or whitespace-only text handed to the embedding provider.
    #[error("embedding input is empty")]
    EmbeddingInput,

    /// Vector length mismatch during similarity computation.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDim { expected: usize, actual: usize },

    /// Embedding provider could not be initialized.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A schema migration could not complete.
    #[error("schema migration to v{version} failed: {detail}")]
    SchemaMigration { version: u32, detail: String },

    /// Failure opening, writing, or renaming a store during merge.
    #[error("merge I/O failure at {path}: {detail}")]
    MergeIo { path: String, detail: String },

    /// The store contains a condition the invariants forbid.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Underlying SQLite failure outside the kinds above.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl KnowledgeError {
    /// Stable kind name used in the `{error_kind, message}` wire shape.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::Duplicate(_) => "Duplicate",
            Self::InvalidParent(_) => "InvalidParent",
            Self::InvalidId(_) => "InvalidId",
            Self::AlreadyRemoved(_) => "AlreadyRemoved",
            Self::EmbeddingInput => "EmbeddingInput",
            Self::EmbeddingDim { .. } => "EmbeddingDim",
            Self::EmbeddingUnavailable(_) => "EmbeddingUnavailable",
            Self::SchemaMigration { .. } => "SchemaMigration",
            Self::MergeIo { .. } => "MergeIO",
            Self::InvariantViolation(_) => "InvariantViolation",
            Self::Storage(_) => "Storage",
        }
    }

    /// Serialize to the wire shape the transport returns to the agent.
    pub fn to_wire(&self) -> serde_json::Value {
        json!({
            "error_kind": self.kind(),
            "message": self.to_string(),
        })
    }
}

/// Engine-wide result alias.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

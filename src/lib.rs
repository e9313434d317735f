//! Per-project knowledge graph server — persistent cross-session memory for
//! coding agents, over MCP.
//!
//! Agents write concepts (features, modules, patterns, configs, decisions,
//! components) and typed relationships in natural language, then query the
//! graph by intent before starting work. The graph lives in a single SQLite
//! file per project, is indexed with dense vector embeddings, and answers
//! semantic queries over them.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL, foreign keys) with the schema version stamped
//!   in `user_version`; embeddings stored as raw float32 blobs on the nodes
//! - **Embeddings**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dims);
//!   retrieval is an exhaustive cosine scan
//! - **Merge**: two-way reconciliation of divergent graph files, with
//!   conflict groups resolved via CLI or the `resolve_conflict` tool
//! - **Timeline**: append-only activity log with time-travel reconstruction
//! - **Transport**: MCP over stdio
//!
//! # Modules
//!
//! - [`config`] — configuration from TOML and environment variables
//! - [`db`] — SQLite open, schema, and migrations
//! - [`embedding`] — text-to-vector pipeline via ONNX Runtime
//! - [`graph`] — the store, slugifier, semantic search, and timeline
//! - [`merge`] — the two-way merge engine and resolution strategies
//! - [`tools`] — the agent-facing tool layer
//! - [`server`] — MCP stdio wiring
//! - [`cli`] — command implementations for the `megamemory` binary

pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod merge;
pub mod server;
pub mod tools;

//! Semantic memory consistency for AI agents.
//!
//! Before a new memory is stored, mnemos embeds it, searches existing memories
//! for near-identical ones (duplicates), and asks a reasoning model whether
//! any close-but-different memory contradicts it. Embeddings are cached in two
//! tiers and provider health is tracked so a failing model degrades the check
//! instead of breaking it.
//!
//! # Architecture
//!
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Cache**: In-process LRU in front of a SQLite table, pruned by TTL
//! - **Search**: Exhaustive cosine similarity with a bounded top-K buffer
//! - **Reasoning**: Any OpenAI-compatible `/chat/completions` endpoint
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, and migrations
//! - [`embedding`]: Embedding providers and the two-tier cache
//! - [`reasoning`]: Reasoning providers used to judge contradictions
//! - [`memory`]: Record store, similarity search, and issue detection
//! - [`resilience`]: Retry with backoff and provider health monitoring
//! - [`engine`]: [`engine::ConsistencyEngine`], which ties the above together

pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod memory;
pub mod reasoning;
pub mod resilience;
pub mod vector;

pub use engine::ConsistencyEngine;
pub use error::{Error, Result};

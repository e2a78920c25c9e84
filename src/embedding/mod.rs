//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] contract, a local ONNX implementation
//! (all-MiniLM-L6-v2, 384 dimensions, L2-normalized), and the two-tier
//! [`cache::EmbeddingCache`] that sits in front of any provider.

pub mod cache;
pub mod local;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::resilience::health::{HealthCheck, HealthProbe};

/// Number of dimensions in the default model's vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// External embedding capability.
///
/// `embed` fails with [`crate::Error::EmbeddingFailed`] (or a network /
/// timeout variant) on model or transport errors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider identifier used in logs and health reports.
    fn name(&self) -> &str;

    /// Model identifier. Part of every cache key.
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }

    async fn health_check(&self) -> HealthCheck;
}

/// Adapts an embedding provider to the monitor's probe contract.
pub struct EmbeddingProbe(pub Arc<dyn EmbeddingProvider>);

#[async_trait]
impl HealthProbe for EmbeddingProbe {
    fn provider_name(&self) -> &str {
        self.0.name()
    }

    async fn health_check(&self) -> HealthCheck {
        self.0.health_check().await
    }
}

/// Create an embedding provider from config.
///
/// Currently only `"local"` is supported (ONNX Runtime + all-MiniLM-L6-v2).
/// Fails if model files are missing; run `mnemos model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

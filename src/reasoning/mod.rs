//! External reasoning capability used to judge contradictions.
//!
//! Only the `chat(prompt) -> text` contract matters to the engine; output
//! format is not guaranteed, which is why verdict parsing is defensive.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::resilience::health::{HealthCheck, HealthProbe};

#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Send a single-turn prompt and return the raw completion text.
    /// Fails with [`crate::Error::ReasoningFailed`] or a transport variant.
    async fn chat(&self, prompt: &str) -> Result<String>;

    async fn health_check(&self) -> HealthCheck;
}

/// Adapts a reasoning provider to the monitor's probe contract.
pub struct ReasoningProbe(pub Arc<dyn ReasoningProvider>);

#[async_trait]
impl HealthProbe for ReasoningProbe {
    fn provider_name(&self) -> &str {
        self.0.name()
    }

    async fn health_check(&self) -> HealthCheck {
        self.0.health_check().await
    }
}

/// Create a reasoning provider from config.
pub fn create_provider(
    config: &crate::config::ReasoningConfig,
) -> anyhow::Result<Arc<dyn ReasoningProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(http::OpenAiCompatibleProvider::new(config)?)),
        other => anyhow::bail!("unknown reasoning provider: {other}. Supported: openai"),
    }
}

//! The consistency engine.
//!
//! [`ConsistencyEngine`] owns one embedding cache, both providers, the retry
//! policy, and a health monitor per provider. It is constructed explicitly and
//! passed to whoever needs it; nothing here is process-global.

use std::sync::Arc;

use crate::config::{DetectionConfig, MnemosConfig};
use crate::embedding::cache::{CacheStats, EmbeddingCache};
use crate::embedding::store::DurableTier;
use crate::embedding::{EmbeddingProbe, EmbeddingProvider};
use crate::error::Result;
use crate::memory::detect::{detect_issues, DetectOptions};
use crate::memory::types::{DetectionReport, MemoryRecord};
use crate::reasoning::{ReasoningProbe, ReasoningProvider};
use crate::resilience::health::{HealthMonitor, HealthState, MonitorSettings};
use crate::resilience::retry::{with_retry, RetryPolicy};

pub struct ConsistencyEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    reasoner: Arc<dyn ReasoningProvider>,
    cache: EmbeddingCache,
    retry: RetryPolicy,
    detection: DetectionConfig,
    embedding_health: HealthMonitor,
    reasoning_health: HealthMonitor,
}

impl ConsistencyEngine {
    /// Build an engine. The cache is keyed by the embedder's model, and
    /// `durable` (if any) becomes its second tier.
    pub fn new(
        config: &MnemosConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        reasoner: Arc<dyn ReasoningProvider>,
        durable: Option<Box<dyn DurableTier>>,
    ) -> Self {
        let settings = MonitorSettings::from(&config.health);
        let cache = EmbeddingCache::new(embedder.model().to_string(), &config.cache, durable);

        let embedding_health = HealthMonitor::new(
            Arc::new(EmbeddingProbe(Arc::clone(&embedder))),
            settings.clone(),
        );
        let reasoning_health =
            HealthMonitor::new(Arc::new(ReasoningProbe(Arc::clone(&reasoner))), settings);

        Self {
            embedder,
            reasoner,
            cache,
            retry: RetryPolicy::from(&config.retry),
            detection: config.detection.clone(),
            embedding_health,
            reasoning_health,
        }
    }

    /// Embed `text`, going through the cache. Misses call the provider under
    /// the retry policy; a terminal failure is reported to the embedding
    /// monitor and returned.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = &self.embedder;
        let result = self
            .cache
            .get_or_compute(text, || with_retry(&self.retry, || embedder.embed(text)))
            .await;

        if let Err(e) = &result {
            tracing::warn!(provider = %embedder.name(), error = %e, "embedding failed");
            self.embedding_health.report_failure(e.to_string());
        }
        result
    }

    /// Embed the subject and check it against `existing`.
    ///
    /// Only embedding failures are returned as errors. Reasoning failures
    /// show up as [`DetectionReport::skipped_pairs`].
    pub async fn check(
        &self,
        subject_id: &str,
        text: &str,
        existing: &[MemoryRecord],
    ) -> Result<DetectionReport> {
        let embedding = self.embed(text).await?;
        Ok(self
            .detect_with_embedding(subject_id, text, &embedding, existing)
            .await)
    }

    /// Run detection for a subject whose embedding is already known.
    pub async fn detect_with_embedding(
        &self,
        subject_id: &str,
        text: &str,
        embedding: &[f32],
        existing: &[MemoryRecord],
    ) -> DetectionReport {
        let options = DetectOptions {
            duplicate_threshold: self.detection.duplicate_threshold,
            contradiction_threshold: self.detection.contradiction_threshold,
            max_candidates: self.detection.max_candidates,
            retry: self.retry.clone(),
            health: Some(&self.reasoning_health),
        };
        let report = detect_issues(
            subject_id,
            text,
            embedding,
            existing,
            self.reasoner.as_ref(),
            &options,
        )
        .await;

        tracing::info!(
            subject = %subject_id,
            duplicates = report.duplicates.len(),
            contradictions = report.contradictions.len(),
            skipped_pairs = report.skipped_pairs,
            "consistency check complete"
        );
        report
    }

    /// Start periodic health checks for both providers.
    pub fn start_monitoring(&self) {
        self.embedding_health.start();
        self.reasoning_health.start();
    }

    /// Stop both monitors. Cache contents are kept.
    pub fn shutdown(&self) {
        self.embedding_health.stop();
        self.reasoning_health.stop();
        tracing::debug!("consistency engine shut down");
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn embedding_monitor(&self) -> &HealthMonitor {
        &self.embedding_health
    }

    pub fn reasoning_monitor(&self) -> &HealthMonitor {
        &self.reasoning_health
    }

    pub fn embedding_health(&self) -> HealthState {
        self.embedding_health.get_status()
    }

    pub fn reasoning_health(&self) -> HealthState {
        self.reasoning_health.get_status()
    }
}

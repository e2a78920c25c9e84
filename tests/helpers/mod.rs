#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mnemos::config::MnemosConfig;
use mnemos::db;
use mnemos::embedding::EmbeddingProvider;
use mnemos::memory::types::MemoryRecord;
use mnemos::reasoning::ReasoningProvider;
use mnemos::resilience::health::HealthCheck;
use mnemos::resilience::retry::RetryPolicy;
use mnemos::{Error, Result};
use rusqlite::Connection;

pub const DIM: usize = 384;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Deterministic 384-dim embedding with a spike at position `seed`.
/// Distinct seeds are orthogonal.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed as usize % DIM] = 1.0;
    v
}

/// Unit vector in the plane of dims 0 and 1, `deg` degrees from dim 0.
/// Cosine similarity between two of these is cos of the angle between them.
pub fn angled_embedding(deg: f64) -> Vec<f32> {
    let r = deg.to_radians();
    let mut v = vec![0.0f32; DIM];
    v[0] = r.cos() as f32;
    v[1] = r.sin() as f32;
    v
}

/// Angle whose cosine is `similarity`.
pub fn angle_for(similarity: f64) -> f64 {
    similarity.acos().to_degrees()
}

pub fn record(id: &str, content: &str, embedding: Vec<f32>) -> MemoryRecord {
    MemoryRecord::new(id, content, embedding)
}

/// Retry policy with millisecond delays so failure tests stay fast.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        backoff_multiplier: 2.0,
        max_delay: Duration::from_millis(5),
    }
}

/// Default config with fast retries.
pub fn test_config() -> MnemosConfig {
    let mut config = MnemosConfig::default();
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

// ── Mock embedding provider ──────────────────────────────────────────────────

/// Returns scripted vectors per text (a spike derived from the text length
/// otherwise). Can be told to fail the next N calls.
pub struct MockEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    pub calls: AtomicUsize,
    failures_left: AtomicU32,
    pub healthy: AtomicBool,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            calls: AtomicUsize::new(0),
            failures_left: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.failures_left.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_left.store(pending - 1, Ordering::SeqCst);
            return Err(Error::embedding_failed("scripted failure"));
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| test_embedding(text.len() as u8)))
    }

    async fn health_check(&self) -> HealthCheck {
        if self.healthy.load(Ordering::SeqCst) {
            HealthCheck::ok()
        } else {
            HealthCheck::failed("mock embedder down")
        }
    }
}

// ── Mock reasoning provider ──────────────────────────────────────────────────

type Responder = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Answers every prompt through a closure and counts calls.
pub struct MockReasoner {
    responder: Responder,
    pub calls: AtomicUsize,
    pub healthy: AtomicBool,
}

impl MockReasoner {
    pub fn new(responder: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Always replies with `text`.
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fails with a retryable error.
    pub fn failing() -> Self {
        Self::new(|_| Err(Error::reasoning_failed("scripted failure")))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for MockReasoner {
    fn name(&self) -> &str {
        "mock-reasoner"
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(prompt)
    }

    async fn health_check(&self) -> HealthCheck {
        if self.healthy.load(Ordering::SeqCst) {
            HealthCheck::ok()
        } else {
            HealthCheck::failed("mock reasoner down")
        }
    }
}

pub fn verdict_json(contradicts: bool, confidence: u8, explanation: &str) -> String {
    serde_json::json!({
        "contradicts": contradicts,
        "confidence": confidence,
        "explanation": explanation,
    })
    .to_string()
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}

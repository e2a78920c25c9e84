//! Local ONNX Runtime embedding provider.
//!
//! Implements [`EmbeddingProvider`] using the all-MiniLM-L6-v2 model via `ort`.
//! Handles tokenization, inference, mean pooling, and L2 normalization.
//! Inference is CPU-bound and runs on tokio's blocking pool.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::resilience::health::HealthCheck;

/// Maximum sequence length for all-MiniLM-L6-v2 (trained at 256).
const MAX_SEQ_LEN: usize = 256;

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

/// Local ONNX-based embedding provider.
pub struct LocalEmbeddingProvider {
    model: Arc<OnnxModel>,
    model_name: String,
}

fn onnx_err(e: impl std::fmt::Display) -> Error {
    Error::embedding_failed(e.to_string())
}

fn load_err(e: impl std::fmt::Display) -> Error {
    Error::ModelLoadFailed {
        reason: e.to_string(),
    }
}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(Error::MissingDependency {
                    what: format!(
                        "{} (run `mnemos model download` first)",
                        path.display()
                    ),
                });
            }
        }

        let session = Session::builder()
            .map_err(load_err)?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .with_intra_threads(4)
            .map_err(load_err)?
            .commit_from_file(&model_path)
            .map_err(load_err)?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            Error::ModelLoadFailed {
                reason: format!("failed to load tokenizer: {e}"),
            }
        })?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| Error::ModelLoadFailed {
                reason: format!("failed to set truncation: {e}"),
            })?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
            }),
            model_name: config.model.clone(),
        })
    }
}

impl OnnxModel {
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::embedding_failed(format!("tokenization failed: {e}")))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let seq_len = ids.len();
        let shape = vec![1i64, seq_len as i64];

        let input_ids = Tensor::from_array((shape.clone(), ids.into_boxed_slice())).map_err(onnx_err)?;
        let attention_mask =
            Tensor::from_array((shape.clone(), mask.clone().into_boxed_slice())).map_err(onnx_err)?;
        // single sentence, no segment B
        let token_type_ids =
            Tensor::from_array((shape, vec![0i64; seq_len].into_boxed_slice())).map_err(onnx_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| Error::embedding_failed(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            })
            .map_err(onnx_err)?;

        // Output name varies by export; fall back to index 0.
        let token_emb = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (shape, data) = token_emb.try_extract_tensor::<f32>().map_err(onnx_err)?;
        let dims: &[i64] = &shape;
        if dims.len() != 3 || dims[2] != EMBEDDING_DIM as i64 {
            return Err(Error::embedding_failed(format!(
                "unexpected token_embeddings shape: {dims:?}, expected [1, seq, {EMBEDDING_DIM}]"
            )));
        }

        Ok(mean_pool(data, &mask, dims[1] as usize, EMBEDDING_DIM))
    }
}

/// Attention-masked mean pooling over token vectors, then L2 normalization.
fn mean_pool(data: &[f32], mask: &[i64], seq_len: usize, hidden: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;
    for s in 0..seq_len.min(mask.len()) {
        if mask[s] > 0 {
            let row = &data[s * hidden..(s + 1) * hidden];
            for (acc, x) in sum.iter_mut().zip(row) {
                *acc += x;
            }
            count += 1.0;
        }
    }
    if count > 0.0 {
        sum.iter_mut().for_each(|x| *x /= count);
    }
    l2_normalize(&sum)
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || model.embed_one(&text))
            .await
            .map_err(|e| Error::embedding_failed(format!("embedding task failed: {e}")))?
    }

    async fn health_check(&self) -> HealthCheck {
        match self.embed("health check").await {
            Ok(v) if v.len() == EMBEDDING_DIM => HealthCheck::ok(),
            Ok(v) => HealthCheck::failed(format!("unexpected dimensions: {}", v.len())),
            Err(e) => HealthCheck::failed(e.to_string()),
        }
    }
}

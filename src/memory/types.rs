//! Core data types for the consistency pipeline.
//!
//! [`MemoryRecord`] is owned by the record store and only read here;
//! [`SimilarityMatch`], [`ContradictionVerdict`], and [`DetectionReport`] are
//! transient results handed back to the caller.

use serde::{Deserialize, Serialize};

/// A stored memory as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    /// `None` for records that were never embedded; such records are skipped
    /// by similarity search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryRecord {
    pub fn new(id: impl Into<String>, content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding: Some(embedding),
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityMatch {
    pub id: String,
    /// Cosine similarity in `[-1, 1]`.
    pub similarity: f64,
    pub content: String,
}

/// The reasoning service's judgement on one subject/candidate pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContradictionVerdict {
    pub subject_id: String,
    pub candidate_id: String,
    pub contradicts: bool,
    /// `0..=100`.
    pub confidence: u8,
    pub explanation: String,
    /// Similarity that put this pair up for review.
    pub similarity: f64,
}

/// Output of [`crate::memory::detect::detect_issues`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionReport {
    /// Similarity-descending.
    pub duplicates: Vec<SimilarityMatch>,
    /// Only pairs judged contradictory, in the order they were reviewed.
    pub contradictions: Vec<ContradictionVerdict>,
    /// Candidate pairs that could not be judged (reasoning call failed or
    /// the provider was unavailable).
    pub skipped_pairs: usize,
}

impl DetectionReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.contradictions.is_empty()
    }
}

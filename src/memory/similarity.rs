//! Bounded top-K similarity search.
//!
//! Keeps a result buffer of at most `limit` entries. Once the buffer is full
//! the effective threshold rises to the buffer's minimum, so later candidates
//! only displace an entry when they strictly beat it. The buffer is re-sorted
//! only when such a displacement happens, never per candidate.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::memory::types::{MemoryRecord, SimilarityMatch};
use crate::vector::cosine_similarity;

pub const DEFAULT_THRESHOLD: f64 = 0.70;
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub threshold: f64,
    pub limit: usize,
    /// Exclusive upper bound. Candidates at or above it are skipped before
    /// they can take a slot in the buffer.
    pub ceiling: Option<f64>,
    pub exclude_ids: HashSet<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
            ceiling: None,
            exclude_ids: HashSet::new(),
        }
    }
}

impl SearchOptions {
    pub fn new(threshold: f64, limit: usize) -> Self {
        Self {
            threshold,
            limit,
            ceiling: None,
            exclude_ids: HashSet::new(),
        }
    }

    pub fn below(mut self, ceiling: f64) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    pub fn excluding<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ids.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// (similarity, input position)
type Scored = (f64, usize);

/// Descending by similarity; equal scores keep input order.
fn sort_desc(buffer: &mut [Scored]) {
    buffer.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
}

/// Find candidates at or above `options.threshold`, best first, at most
/// `options.limit` of them.
///
/// Candidates without an embedding, excluded ids, candidates at or above
/// `options.ceiling`, and candidates whose similarity cannot be computed
/// (dimension mismatch) are skipped.
pub fn find_similar(
    query: &[f32],
    candidates: &[MemoryRecord],
    options: &SearchOptions,
) -> Vec<SimilarityMatch> {
    let limit = options.limit;
    if limit == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut buffer: Vec<Scored> = Vec::with_capacity(limit);
    let mut floor = options.threshold;

    for (idx, candidate) in candidates.iter().enumerate() {
        if options.exclude_ids.contains(&candidate.id) {
            continue;
        }
        let Some(embedding) = candidate.embedding.as_deref() else {
            continue;
        };

        let sim = match cosine_similarity(query, embedding) {
            Ok(s) if s.is_finite() => s,
            Ok(_) => {
                tracing::debug!(id = %candidate.id, "skipping candidate with non-finite similarity");
                continue;
            }
            Err(e) => {
                tracing::warn!(id = %candidate.id, error = %e, "skipping candidate");
                continue;
            }
        };

        if sim < floor || options.ceiling.is_some_and(|c| sim >= c) {
            continue;
        }

        if buffer.len() < limit {
            buffer.push((sim, idx));
            if buffer.len() == limit {
                sort_desc(&mut buffer);
                floor = floor.max(buffer[limit - 1].0);
            }
            continue;
        }

        // Full buffer: a tie with the current minimum loses to the earlier entry.
        if sim <= buffer[limit - 1].0 {
            continue;
        }
        buffer[limit - 1] = (sim, idx);
        sort_desc(&mut buffer);
        floor = floor.max(buffer[limit - 1].0);
    }

    sort_desc(&mut buffer);
    buffer
        .into_iter()
        .map(|(similarity, idx)| SimilarityMatch {
            id: candidates[idx].id.clone(),
            similarity,
            content: candidates[idx].content.clone(),
        })
        .collect()
}

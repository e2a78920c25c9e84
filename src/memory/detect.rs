//! Duplicate and contradiction detection.
//!
//! [`detect_issues`] runs two similarity passes over the existing memories:
//!
//! 1. **Duplicates**: matches at or above `duplicate_threshold`.
//! 2. **Contradiction candidates**: matches at or above
//!    `contradiction_threshold` but below `duplicate_threshold`. Each pair
//!    goes to the reasoning provider, and the reply is parsed with
//!    [`parse_verdict`], falling back to [`heuristic_verdict`].
//!
//! A failed reasoning call skips that pair only. It is logged, counted in
//! [`DetectionReport::skipped_pairs`], and reported to the health monitor.

use serde_json::Value;

use crate::config::{DetectionConfig, RetryConfig};
use crate::memory::similarity::{find_similar, SearchOptions};
use crate::memory::types::{ContradictionVerdict, DetectionReport, MemoryRecord};
use crate::reasoning::ReasoningProvider;
use crate::resilience::health::{HealthMonitor, HealthStatus};
use crate::resilience::retry::{with_retry, RetryPolicy};

/// Confidence reported when the reply only mentions a contradiction in prose.
pub const HEURISTIC_CONFIDENCE: u8 = 50;

/// Knobs for one detection run.
pub struct DetectOptions<'a> {
    pub duplicate_threshold: f64,
    pub contradiction_threshold: f64,
    pub max_candidates: usize,
    pub retry: RetryPolicy,
    /// Monitor for the reasoning provider. When its status is `Unavailable`
    /// pairs are skipped instead of called.
    pub health: Option<&'a HealthMonitor>,
}

impl Default for DetectOptions<'_> {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default(), &RetryConfig::default())
    }
}

impl<'a> DetectOptions<'a> {
    pub fn from_config(detection: &DetectionConfig, retry: &RetryConfig) -> Self {
        Self {
            duplicate_threshold: detection.duplicate_threshold,
            contradiction_threshold: detection.contradiction_threshold,
            max_candidates: detection.max_candidates,
            retry: RetryPolicy::from(retry),
            health: None,
        }
    }

    pub fn with_health(mut self, monitor: &'a HealthMonitor) -> Self {
        self.health = Some(monitor);
        self
    }
}

// ── Verdict parsing ──────────────────────────────────────────────────────────

/// A verdict before it is attached to a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub contradicts: bool,
    pub confidence: u8,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedVerdict {
    Parsed(Judgement),
    Unparseable(String),
}

/// Strict parse: the first well-formed JSON object in `raw` must carry a
/// boolean `contradicts` and a numeric `confidence`. Confidence is clamped to
/// `0..=100`; `explanation` defaults to empty.
pub fn parse_verdict(raw: &str) -> ParsedVerdict {
    first_json_object(raw)
        .and_then(|value| judgement_from_value(&value))
        .map(ParsedVerdict::Parsed)
        .unwrap_or_else(|| ParsedVerdict::Unparseable(raw.to_string()))
}

/// Coarse fallback for replies without usable JSON.
pub fn heuristic_verdict(raw: &str) -> Judgement {
    let contradicts = raw.to_lowercase().contains("contradict");
    let explanation: String = raw.trim().chars().take(200).collect();
    Judgement {
        contradicts,
        confidence: if contradicts { HEURISTIC_CONFIDENCE } else { 0 },
        explanation,
    }
}

/// Parse, falling back to the heuristic.
pub fn interpret(raw: &str) -> Judgement {
    match parse_verdict(raw) {
        ParsedVerdict::Parsed(judgement) => judgement,
        ParsedVerdict::Unparseable(text) => heuristic_verdict(&text),
    }
}

fn first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => Some(value),
            _ => None,
        }
    })
}

fn judgement_from_value(value: &Value) -> Option<Judgement> {
    let contradicts = value.get("contradicts")?.as_bool()?;
    let confidence = value.get("confidence")?.as_f64()?;
    let explanation = value
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(Judgement {
        contradicts,
        confidence: confidence.clamp(0.0, 100.0).round() as u8,
        explanation,
    })
}

/// Prompt asking whether two statements can both be true.
pub fn build_prompt(subject: &str, candidate: &str) -> String {
    format!(
        "You are checking a personal memory store for conflicting facts.\n\
         \n\
         Statement A: {subject:?}\n\
         Statement B: {candidate:?}\n\
         \n\
         Ignore differences in wording, tone, or level of detail. Decide only \
         whether both statements can be true at the same time. They contradict \
         if accepting one forces rejecting the other.\n\
         \n\
         Respond with a single JSON object and nothing else:\n\
         {{\"contradicts\": true or false, \"confidence\": integer 0-100, \
         \"explanation\": \"one short sentence\"}}"
    )
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Check a subject memory against existing ones for duplicates and
/// contradictions. Never fails: reasoning errors only skip their pair.
pub async fn detect_issues(
    subject_id: &str,
    subject_text: &str,
    subject_embedding: &[f32],
    existing: &[MemoryRecord],
    reasoner: &dyn ReasoningProvider,
    options: &DetectOptions<'_>,
) -> DetectionReport {
    // Step 1: duplicates
    let dup_search = SearchOptions::new(options.duplicate_threshold, options.max_candidates)
        .excluding([subject_id]);
    let duplicates = find_similar(subject_embedding, existing, &dup_search);

    // Step 2: contradiction candidates. The ceiling drops every duplicate,
    // including ones past the step 1 limit, before the top-K cut.
    let review_search =
        SearchOptions::new(options.contradiction_threshold, options.max_candidates)
            .below(options.duplicate_threshold)
            .excluding([subject_id]);
    let candidates = find_similar(subject_embedding, existing, &review_search);

    tracing::debug!(
        subject = %subject_id,
        duplicates = duplicates.len(),
        candidates = candidates.len(),
        "similarity passes complete"
    );

    let mut contradictions = Vec::new();
    let mut skipped_pairs = 0;

    for candidate in candidates {
        if let Some(monitor) = options.health {
            if monitor.get_status().status == HealthStatus::Unavailable {
                tracing::warn!(
                    subject = %subject_id,
                    candidate = %candidate.id,
                    provider = %monitor.provider_name(),
                    "reasoning provider unavailable; skipping pair"
                );
                skipped_pairs += 1;
                continue;
            }
        }

        // Step 3: ask, then parse defensively
        let prompt = build_prompt(subject_text, &candidate.content);
        let raw = match with_retry(&options.retry, || reasoner.chat(&prompt)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    subject = %subject_id,
                    candidate = %candidate.id,
                    error = %e,
                    "contradiction check failed; skipping pair"
                );
                if let Some(monitor) = options.health {
                    monitor.report_failure(e.to_string());
                }
                skipped_pairs += 1;
                continue;
            }
        };

        let judgement = interpret(&raw);
        tracing::debug!(
            candidate = %candidate.id,
            contradicts = judgement.contradicts,
            confidence = judgement.confidence,
            "pair judged"
        );
        if judgement.contradicts {
            contradictions.push(ContradictionVerdict {
                subject_id: subject_id.to_string(),
                candidate_id: candidate.id,
                contradicts: true,
                confidence: judgement.confidence,
                explanation: judgement.explanation,
                similarity: candidate.similarity,
            });
        }
    }

    DetectionReport {
        duplicates,
        contradictions,
        skipped_pairs,
    }
}

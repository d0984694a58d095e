//! Retrieval pipeline: score, threshold, rank, cut, and join.
//!
//! ```text
//! query ─► prepare ─► score every chunk ─► drop score < min_score
//!       ─► sort (score desc, id asc) ─► take top_k ─► join "\n\n" ─► cap chars
//! ```
//!
//! Zero surviving chunks is a normal, empty result; the sufficiency gate
//! decides what to do with it.

use std::cmp::Ordering;
use std::time::Instant;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::constants::{CONTEXT_SEPARATOR, DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MIN_SCORE, DEFAULT_TOP_K};
use crate::corpus::{Corpus, EvidenceChunk};
use crate::errors::CoreError;
use crate::query::Query;
use crate::scoring::{PreparedQuery, RelevanceScorer};

// ============================================================================
// Options
// ============================================================================

/// Pipeline parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalOptions {
    /// Chunks scoring strictly below this are discarded.
    pub min_score: f32,
    /// Maximum number of chunks retained.
    pub top_k: usize,
    /// Maximum context length, in characters.
    pub max_context_chars: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl RetrievalOptions {
    /// Override `top_k` when `Some`.
    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        if let Some(k) = top_k {
            self.top_k = k;
        }
        self
    }

    /// Override `min_score` when `Some`.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        if let Some(s) = min_score {
            self.min_score = s;
        }
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// A chunk borrowed from the corpus, with its relevance score.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    /// The corpus chunk.
    pub chunk: &'a EvidenceChunk,
    /// Relevance score (higher is better).
    pub score: f32,
}

impl Serialize for ScoredChunk<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ScoredChunk", 4)?;
        s.serialize_field("id", &self.chunk.id)?;
        s.serialize_field("score", &self.score)?;
        s.serialize_field("sourceLabel", &self.chunk.source_label)?;
        s.serialize_field("text", &self.chunk.text)?;
        s.end()
    }
}

/// Outcome of one retrieval call.
///
/// `evidence_count == chunks.len()` always holds, and `context_text` never
/// exceeds the configured character cap.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult<'a> {
    /// Retained chunks, best first.
    pub chunks: Vec<ScoredChunk<'a>>,
    /// Retained chunk texts joined with a blank line, capped.
    pub context_text: String,
    /// Number of retained chunks.
    pub evidence_count: usize,
    /// Whether the context was cut at the character cap.
    pub truncated: bool,
    /// Number of chunks that passed the threshold before the top-K cut.
    pub matched: usize,
}

impl RetrievalResult<'_> {
    /// An empty result.
    pub fn empty() -> Self {
        Self {
            chunks: Vec::new(),
            context_text: String::new(),
            evidence_count: 0,
            truncated: false,
            matched: 0,
        }
    }

    /// Whether no chunk survived.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the full pipeline for `query` against `corpus`.
///
/// # Errors
///
/// Scorer errors ([`CoreError::ScoringUnavailable`],
/// [`CoreError::EmbeddingDimensionMismatch`]) are propagated unchanged.
pub async fn retrieve<'a>(
    corpus: &'a Corpus,
    scorer: &dyn RelevanceScorer,
    query: &Query,
    options: &RetrievalOptions,
) -> Result<RetrievalResult<'a>, CoreError> {
    let prepared = scorer.prepare(query).await?;
    scorer.ensure_compatible(&prepared, corpus)?;
    Ok(rank(corpus, scorer, &prepared, options))
}

/// Score, threshold, rank, and join with an already prepared query.
pub fn rank<'a>(
    corpus: &'a Corpus,
    scorer: &dyn RelevanceScorer,
    prepared: &PreparedQuery,
    options: &RetrievalOptions,
) -> RetrievalResult<'a> {
    let started = Instant::now();

    let mut scored: Vec<ScoredChunk<'a>> = corpus
        .chunks()
        .iter()
        .map(|chunk| ScoredChunk {
            chunk,
            score: scorer.score(prepared, chunk),
        })
        .filter(|s| !s.score.is_nan() && s.score >= options.min_score)
        .collect();

    let matched = scored.len();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    scored.truncate(options.top_k);

    let (context_text, truncated) = build_context(&scored, options.max_context_chars);

    debug!(
        "Retrieval: {} scored, {} matched (min_score {}), {} kept, context {} chars{} in {}ms",
        corpus.len(),
        matched,
        options.min_score,
        scored.len(),
        context_text.chars().count(),
        if truncated { " (truncated)" } else { "" },
        started.elapsed().as_millis()
    );

    RetrievalResult {
        evidence_count: scored.len(),
        chunks: scored,
        context_text,
        truncated,
        matched,
    }
}

/// Join chunk texts and cut the result at `max_chars` characters.
fn build_context(chunks: &[ScoredChunk<'_>], max_chars: usize) -> (String, bool) {
    let mut text = chunks
        .iter()
        .map(|s| s.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    let cut = text.char_indices().nth(max_chars).map(|(i, _)| i);
    match cut {
        Some(byte_idx) => {
            text.truncate(byte_idx);
            (text, true)
        }
        None => (text, false),
    }
}

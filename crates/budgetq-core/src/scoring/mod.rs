//! Relevance scoring strategies.
//!
//! This module provides:
//! - [`RelevanceScorer`] - the strategy trait used by the retrieval pipeline
//! - [`LexicalScorer`] - keyword overlap, deterministic and local
//! - [`VectorScorer`] - embedding similarity through an [`EmbeddingModel`]
//! - [`create_scorer`] - factory selecting a strategy from configuration
//!
//! ## Score convention
//!
//! Higher is more relevant for every strategy. The retrieval threshold is a
//! lower bound and ranking sorts scores in descending order.

mod lexical;
mod vector;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use budgetq_model::EmbeddingModel;

use crate::config::AppConfig;
use crate::corpus::{Corpus, EvidenceChunk};
use crate::errors::CoreError;
use crate::model_adapter::IntoCoreResult;
use crate::query::Query;

pub use lexical::{tokenize, LexicalScorer};
pub use vector::{cosine_similarity, dot_product, VectorScorer};

// ============================================================================
// ScorerKind
// ============================================================================

/// Which relevance strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    /// Keyword overlap (default).
    #[default]
    Lexical,

    /// Embedding similarity.
    Vector,
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => write!(f, "lexical"),
            Self::Vector => write!(f, "vector"),
        }
    }
}

impl FromStr for ScorerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexical" | "keyword" => Ok(Self::Lexical),
            "vector" | "embedding" | "semantic" => Ok(Self::Vector),
            _ => Err(format!(
                "Unknown scorer: '{}'. Use 'lexical' or 'vector'.",
                s
            )),
        }
    }
}

// ============================================================================
// SimilarityMetric
// ============================================================================

/// Similarity metric for the vector scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,

    /// Raw dot product. Equals cosine only for unit-normalised vectors.
    Dot,

    /// Euclidean distance. Parsed so configuration can reject it explicitly.
    L2,
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Dot => write!(f, "dot"),
            Self::L2 => write!(f, "l2"),
        }
    }
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "l2" | "euclidean" => Ok(Self::L2),
            _ => Err(format!(
                "Unknown metric: '{}'. Use 'cosine' or 'dot'.",
                s
            )),
        }
    }
}

// ============================================================================
// PreparedQuery
// ============================================================================

/// Per-request query representation, computed once and reused for every chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedQuery {
    /// Distinct lowercase tokens, in order of first occurrence.
    Lexical {
        /// Query tokens.
        tokens: Vec<String>,
    },

    /// Query embedding and its L2 norm.
    Vector {
        /// The query vector.
        embedding: Vec<f32>,
        /// Precomputed norm of `embedding`.
        norm: f32,
    },
}

impl PreparedQuery {
    /// Whether the query can match anything at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Lexical { tokens } => tokens.is_empty(),
            Self::Vector { embedding, .. } => embedding.is_empty(),
        }
    }
}

// ============================================================================
// RelevanceScorer
// ============================================================================

/// A relevance strategy.
///
/// `prepare` may suspend (the vector strategy calls an external service);
/// `score` is pure and runs once per chunk.
#[async_trait]
pub trait RelevanceScorer: Send + Sync + fmt::Debug {
    /// Which strategy this is.
    fn kind(&self) -> ScorerKind;

    /// Compute the per-request query representation.
    ///
    /// # Errors
    ///
    /// [`CoreError::ScoringUnavailable`] when an external dependency fails
    /// or times out.
    async fn prepare(&self, query: &Query) -> Result<PreparedQuery, CoreError>;

    /// Score one chunk. Higher is more relevant.
    fn score(&self, prepared: &PreparedQuery, chunk: &EvidenceChunk) -> f32;

    /// Check that `prepared` can be compared against `corpus`.
    fn ensure_compatible(&self, _prepared: &PreparedQuery, _corpus: &Corpus) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Build a scorer of `kind`, normally `config.retrieval.scorer` unless the
/// caller overrides it.
///
/// The lexical scorer never touches the embedding configuration; the vector
/// scorer constructs the embedding capability eagerly so a missing API key
/// surfaces before any query runs.
pub fn create_scorer(config: &AppConfig, kind: ScorerKind) -> Result<Arc<dyn RelevanceScorer>, CoreError> {
    match kind {
        ScorerKind::Lexical => Ok(Arc::new(LexicalScorer::new())),
        ScorerKind::Vector => {
            let model: Arc<dyn EmbeddingModel> =
                Arc::from(budgetq_model::create_embedding_model(&config.embedding).into_core_result()?);
            let timeout = Duration::from_secs(config.embedding.timeout_secs);
            Ok(Arc::new(VectorScorer::new(model, config.retrieval.metric, timeout)?))
        }
    }
}

//! Evidence corpus: the immutable in-memory chunk collection.
//!
//! This module provides:
//! - [`EvidenceChunk`] - one retrievable fragment of the budget documents
//! - [`Corpus`] - the validated, read-only chunk set
//! - [`CorpusStats`] - summary counts for `budgetq corpus stats`
//! - [`load_corpus`] / [`write_corpus`] - JSON and JSONL persistence
//! - [`CorpusHandle`] - the ready/not-ready container shared by request tasks
//! - [`embed_corpus`] - offline embedding for the vector scorer
//!
//! ## Lifecycle
//!
//! The corpus is loaded once at startup, wrapped in an `Arc`, and never
//! mutated afterwards. Requests only ever borrow chunks.

mod embed;
mod handle;
mod loader;

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CorpusLoadError;

pub use embed::embed_corpus;
pub use handle::{CorpusHandle, CorpusState};
pub use loader::{load_corpus, parse_corpus, write_corpus, CorpusFormat};

// ============================================================================
// EvidenceChunk
// ============================================================================

/// A single retrievable fragment of the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceChunk {
    /// Unique, stable id for the lifetime of the index.
    pub id: u64,

    /// The fragment text.
    pub text: String,

    /// Human-readable origin (document title, page), used for citations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,

    /// Precomputed embedding, when the corpus was embedded offline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl EvidenceChunk {
    /// Create a chunk without label or embedding.
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            source_label: None,
            embedding: None,
        }
    }

    /// Attach a source label.
    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = Some(label.into());
        self
    }

    /// Attach an embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

// ============================================================================
// Corpus
// ============================================================================

/// The validated, read-only chunk set.
///
/// Construction enforces unique ids and a single embedding dimension; after
/// that the corpus only hands out shared references.
#[derive(Debug, Clone)]
pub struct Corpus {
    source: PathBuf,
    chunks: Vec<EvidenceChunk>,
    dimension: Option<usize>,
    loaded_at: DateTime<Utc>,
}

impl Corpus {
    /// Validate `chunks` and build a corpus attributed to `source`.
    pub fn new(source: impl Into<PathBuf>, chunks: Vec<EvidenceChunk>) -> Result<Self, CorpusLoadError> {
        let source = source.into();
        let mut seen = HashSet::with_capacity(chunks.len());
        let mut dimension: Option<usize> = None;

        for chunk in &chunks {
            if !seen.insert(chunk.id) {
                return Err(CorpusLoadError::DuplicateId {
                    path: source.clone(),
                    id: chunk.id,
                });
            }

            if let Some(embedding) = &chunk.embedding {
                match dimension {
                    None => dimension = Some(embedding.len()),
                    Some(expected) if expected != embedding.len() => {
                        return Err(CorpusLoadError::InconsistentDimension {
                            path: source.clone(),
                            id: chunk.id,
                            expected,
                            found: embedding.len(),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Self {
            source,
            chunks,
            dimension,
            loaded_at: Utc::now(),
        })
    }

    /// Build a corpus from bare texts; ids follow position. Handy for tests and demos.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| EvidenceChunk::new(i as u64, t.as_ref()))
            .collect();
        Self {
            source: PathBuf::from("<memory>"),
            chunks,
            dimension: None,
            loaded_at: Utc::now(),
        }
    }

    /// All chunks, in corpus order.
    pub fn chunks(&self) -> &[EvidenceChunk] {
        &self.chunks
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the corpus loaded successfully but holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding dimension shared by all embedded chunks.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Where the corpus was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Look up a chunk by id.
    pub fn get(&self, id: u64) -> Option<&EvidenceChunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// Compute summary statistics.
    pub fn stats(&self) -> CorpusStats {
        let labels: BTreeSet<&str> = self
            .chunks
            .iter()
            .filter_map(|c| c.source_label.as_deref())
            .collect();

        CorpusStats {
            source: self.source.display().to_string(),
            chunks: self.chunks.len(),
            embedded_chunks: self.chunks.iter().filter(|c| c.embedding.is_some()).count(),
            dimension: self.dimension,
            source_labels: labels.into_iter().map(str::to_string).collect(),
            total_chars: self.chunks.iter().map(|c| c.text.chars().count()).sum(),
            loaded_at: self.loaded_at,
        }
    }
}

// ============================================================================
// CorpusStats
// ============================================================================

/// Summary counts for a loaded corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusStats {
    /// Corpus file path.
    pub source: String,
    /// Total chunk count.
    pub chunks: usize,
    /// Chunks carrying an embedding.
    pub embedded_chunks: usize,
    /// Shared embedding dimension, if any chunk is embedded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    /// Distinct source labels, sorted.
    pub source_labels: Vec<String>,
    /// Total characters across all chunk texts.
    pub total_chars: usize,
    /// When the corpus was loaded.
    pub loaded_at: DateTime<Utc>,
}

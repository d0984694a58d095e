//! Embedding-similarity scoring.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use budgetq_model::EmbeddingModel;

use super::{PreparedQuery, RelevanceScorer, ScorerKind, SimilarityMetric};
use crate::corpus::{Corpus, EvidenceChunk};
use crate::errors::CoreError;
use crate::model_adapter::scoring_unavailable;
use crate::query::Query;

/// Dot product of two equal-length vectors; 0.0 when lengths differ.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; 0.0 for mismatched lengths or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_with_norm(a, l2_norm(a), b)
}

fn cosine_with_norm(a: &[f32], norm_a: f32, b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product(a, b) / (norm_a * norm_b)
}

/// Scores chunks by similarity between the query embedding and each chunk's
/// precomputed embedding.
///
/// Chunks without an embedding score 0.0. The query embedding call runs
/// under `timeout`; failure or expiry is reported as
/// [`CoreError::ScoringUnavailable`] and never silently degraded.
#[derive(Debug, Clone)]
pub struct VectorScorer {
    model: Arc<dyn EmbeddingModel>,
    metric: SimilarityMetric,
    timeout: Duration,
}

impl VectorScorer {
    /// Create a vector scorer.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidConfiguration`] for [`SimilarityMetric::L2`].
    pub fn new(
        model: Arc<dyn EmbeddingModel>,
        metric: SimilarityMetric,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        if metric == SimilarityMetric::L2 {
            return Err(CoreError::InvalidConfiguration {
                message: "the vector scorer does not support the l2 metric".to_string(),
                hint: "Use 'cosine' or 'dot'".to_string(),
            });
        }
        Ok(Self {
            model,
            metric,
            timeout,
        })
    }

    /// The metric in use.
    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}

#[async_trait]
impl RelevanceScorer for VectorScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::Vector
    }

    async fn prepare(&self, query: &Query) -> Result<PreparedQuery, CoreError> {
        let started = std::time::Instant::now();
        let embedding = match tokio::time::timeout(self.timeout, self.model.embed_one(query.as_str())).await {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(e)) => {
                warn!("Query embedding failed: {}", e);
                return Err(scoring_unavailable(&e));
            }
            Err(_) => {
                warn!(
                    "Query embedding timed out after {}ms",
                    self.timeout.as_millis()
                );
                return Err(CoreError::ScoringUnavailable {
                    reason: format!(
                        "embedding model '{}' did not answer within {}s",
                        self.model.model_id(),
                        self.timeout.as_secs_f32()
                    ),
                });
            }
        };

        if embedding.is_empty() {
            return Err(CoreError::ScoringUnavailable {
                reason: format!("embedding model '{}' returned an empty vector", self.model.model_id()),
            });
        }

        debug!(
            "Embedded query with {} ({} dims) in {}ms",
            self.model.model_id(),
            embedding.len(),
            started.elapsed().as_millis()
        );

        let norm = l2_norm(&embedding);
        Ok(PreparedQuery::Vector { embedding, norm })
    }

    fn score(&self, prepared: &PreparedQuery, chunk: &EvidenceChunk) -> f32 {
        let PreparedQuery::Vector { embedding, norm } = prepared else {
            return 0.0;
        };
        let Some(chunk_embedding) = chunk.embedding.as_deref() else {
            return 0.0;
        };
        match self.metric {
            SimilarityMetric::Cosine => cosine_with_norm(embedding, *norm, chunk_embedding),
            SimilarityMetric::Dot => dot_product(embedding, chunk_embedding),
            // Rejected in `new`.
            SimilarityMetric::L2 => 0.0,
        }
    }

    fn ensure_compatible(&self, prepared: &PreparedQuery, corpus: &Corpus) -> Result<(), CoreError> {
        let PreparedQuery::Vector { embedding, .. } = prepared else {
            return Ok(());
        };
        match corpus.dimension() {
            Some(expected) if expected != embedding.len() => Err(CoreError::EmbeddingDimensionMismatch {
                expected,
                found: embedding.len(),
            }),
            Some(_) => Ok(()),
            None => {
                warn!("Vector scorer selected but the corpus has no embeddings; every chunk will score 0");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::KeywordEmbedding;

    fn query(text: &str) -> Query {
        Query::parse(text, 1000).unwrap()
    }

    fn scorer(model: KeywordEmbedding, metric: SimilarityMetric) -> VectorScorer {
        VectorScorer::new(Arc::new(model), metric, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_dot_product() {
        assert_eq!(dot_product(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
        assert_eq!(dot_product(&[1.0], &[3.0, 4.0]), 0.0);
    }

    #[test]
    fn test_l2_rejected() {
        let model: Arc<dyn EmbeddingModel> = Arc::new(KeywordEmbedding::new(vec!["vat"]));
        let err = VectorScorer::new(model, SimilarityMetric::L2, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn test_scores_by_cosine() {
        let model = KeywordEmbedding::new(vec!["vat", "fuel", "tax"]);
        let vat = EvidenceChunk::new(0, "vat").with_embedding(model.vector_for("vat threshold"));
        let fuel = EvidenceChunk::new(1, "fuel").with_embedding(model.vector_for("fuel duty"));
        let bare = EvidenceChunk::new(2, "vat but not embedded");

        let scorer = scorer(model, SimilarityMetric::Cosine);
        let prepared = scorer.prepare(&query("VAT tax")).await.unwrap();
        let s_vat = scorer.score(&prepared, &vat);
        assert!((s_vat - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        assert_eq!(scorer.score(&prepared, &fuel), 0.0);
        assert_eq!(scorer.score(&prepared, &bare), 0.0);
    }

    #[tokio::test]
    async fn test_dot_metric_is_unnormalised() {
        let model = KeywordEmbedding::new(vec!["vat", "tax"]);
        let chunk = EvidenceChunk::new(0, "x").with_embedding(vec![2.0, 2.0]);
        let scorer = scorer(model, SimilarityMetric::Dot);
        let prepared = scorer.prepare(&query("vat tax")).await.unwrap();
        assert_eq!(scorer.score(&prepared, &chunk), 4.0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_scoring_unavailable() {
        let mut model = KeywordEmbedding::new(vec!["vat"]);
        model.fail = true;
        let err = scorer(model, SimilarityMetric::Cosine)
            .prepare(&query("vat"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ScoringUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedding_timeout_is_scoring_unavailable() {
        let mut model = KeywordEmbedding::new(vec!["vat"]);
        model.delay = Some(Duration::from_secs(60));
        let err = scorer(model, SimilarityMetric::Cosine)
            .prepare(&query("vat"))
            .await
            .unwrap_err();
        match err {
            CoreError::ScoringUnavailable { reason } => assert!(reason.contains("did not answer")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_detected() {
        let model = KeywordEmbedding::new(vec!["vat", "tax"]);
        let corpus = Corpus::new(
            "c.json",
            vec![EvidenceChunk::new(0, "x").with_embedding(vec![1.0, 0.0, 0.0])],
        )
        .unwrap();
        let scorer = scorer(model, SimilarityMetric::Cosine);
        let prepared = scorer.prepare(&query("vat")).await.unwrap();
        let err = scorer.ensure_compatible(&prepared, &corpus).unwrap_err();
        assert!(matches!(
            err,
            CoreError::EmbeddingDimensionMismatch {
                expected: 3,
                found: 2
            }
        ));
    }
}

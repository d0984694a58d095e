//! Offline corpus embedding for the vector scorer.

use std::time::Duration;

use tracing::debug;

use budgetq_model::{EmbeddingModel, ModelError};

use super::{Corpus, EvidenceChunk};
use crate::errors::CoreError;
use crate::model_adapter::from_model_error;

/// Compute an embedding for every chunk of `corpus`.
///
/// Chunks are sent in batches of `batch_size`, each batch under `timeout`.
/// `on_batch(done, total)` is called after every batch. Existing embeddings
/// are replaced so the whole corpus shares one model and dimension.
pub async fn embed_corpus<F>(
    corpus: &Corpus,
    model: &dyn EmbeddingModel,
    batch_size: usize,
    timeout: Duration,
    mut on_batch: F,
) -> Result<Vec<EvidenceChunk>, CoreError>
where
    F: FnMut(usize, usize),
{
    let total = corpus.len();
    let mut out = Vec::with_capacity(total);

    for batch in corpus.chunks().chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        let vectors = match tokio::time::timeout(timeout, model.embed(&texts)).await {
            Ok(result) => result.map_err(from_model_error)?,
            Err(_) => {
                return Err(from_model_error(ModelError::timeout(
                    model.model_id(),
                    timeout.as_secs(),
                )))
            }
        };

        if vectors.len() != batch.len() {
            return Err(from_model_error(ModelError::invalid_response(
                model.model_id(),
                format!("expected {} embeddings, got {}", batch.len(), vectors.len()),
            )));
        }

        out.extend(
            batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| chunk.clone().with_embedding(vector)),
        );
        debug!("Embedded {}/{} chunks", out.len(), total);
        on_batch(out.len(), total);
    }

    Ok(out)
}

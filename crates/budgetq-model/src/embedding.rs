//! OpenAI-compatible embedding backend.
//!
//! Calls `POST {base_url}/embeddings` and returns vectors in input order.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{ModelError, ModelResult};
use crate::{resolve_api_key, EmbeddingModel};

/// Embedding model served over the OpenAI embeddings API.
#[derive(Debug)]
pub struct OpenAiEmbeddingModel {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model_id: String,
    dimension: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl OpenAiEmbeddingModel {
    /// Create a new client from configuration.
    pub fn new(config: &EmbeddingConfig) -> ModelResult<Self> {
        let api_key = resolve_api_key(config.provider, &config.api_key_env)?;
        let client = Client::builder()
            .build()
            .map_err(|e| ModelError::request(&config.model_id, e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.effective_base_url()),
            api_key,
            model_id: config.model_id.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbeddingModel {
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.model_id,
            "input": texts,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model = %self.model_id, inputs = texts.len(), "Requesting embeddings");

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::request(&self.model_id, e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| ModelError::request(&self.model_id, e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Status {
                model_id: self.model_id.clone(),
                status: status.as_u16(),
                body: raw,
            });
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&raw)?;
        if parsed.data.len() != texts.len() {
            return Err(ModelError::invalid_response(
                &self.model_id,
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            ));
        }

        // The API may return items out of order; `index` is authoritative when present.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));

        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        if vectors.iter().any(|v| v.is_empty()) {
            return Err(ModelError::invalid_response(
                &self.model_id,
                "received an empty embedding vector",
            ));
        }

        Ok(vectors)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

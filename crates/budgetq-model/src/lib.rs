//! # budgetq-model
//!
//! Capability layer for budgetq - embeddings and grounded text generation.
//!
//! This crate owns every call that leaves the process. It provides:
//!
//! - **Embedding models**: turn text into dense vectors for similarity scoring
//! - **Generation models**: complete a grounded prompt into report prose
//! - **Unified config**: `EmbeddingConfig` / `GenerationConfig`, embedded in
//!   the core YAML configuration
//!
//! ## Design Principles
//!
//! 1. **Production-only**: No mock implementations. Test doubles live in consuming crates.
//! 2. **Opaque capabilities**: Traits expose text in, vectors/text out; wire
//!    formats stay inside this crate.
//! 3. **No timeouts here**: callers wrap calls in `tokio::time::timeout` so
//!    they decide what a timeout means (scoring outage vs generation failure).
//!
//! ## Features
//!
//! - `remote` (default): OpenAI-compatible HTTP backends (OpenAI, Ollama, vLLM, ...)
//!
//! ## Usage
//!
//! ```ignore
//! use budgetq_model::{create_generation_model, GenerationConfig, GenerationRequest};
//!
//! let model = create_generation_model(&GenerationConfig::default())?;
//! let text = model
//!     .complete(&GenerationRequest::new("Answer only from context.", "Context: ..."))
//!     .await?;
//! ```

pub mod config;
pub mod error;

#[cfg(feature = "remote")]
mod embedding;

#[cfg(feature = "remote")]
mod generation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Re-export error types
pub use error::{ModelError, ModelResult};

// Re-export config types (canonical source of truth)
pub use config::{
    EmbeddingConfig, GenerationConfig, ProviderKind, DEFAULT_API_KEY_ENV,
    DEFAULT_OLLAMA_BASE_URL, DEFAULT_OPENAI_BASE_URL,
};

#[cfg(feature = "remote")]
pub use embedding::OpenAiEmbeddingModel;
#[cfg(feature = "remote")]
pub use generation::OpenAiGenerationModel;

/// Default embedding model ID. Matches the model the budget corpus was embedded with.
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "text-embedding-3-small";

/// Default chat model ID used for report sections.
pub const DEFAULT_GENERATION_MODEL_ID: &str = "gpt-4o-mini";

// ============================================================================
// Embedding Model Trait
// ============================================================================

/// Trait for embedding models.
///
/// Generates dense vector embeddings from text inputs. Query and corpus must
/// be embedded by the same model, otherwise similarity scores are meaningless.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across tasks.
#[async_trait]
pub trait EmbeddingModel: Send + Sync + std::fmt::Debug {
    /// Generate embeddings for a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> ModelResult<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| ModelError::EmptyResponse {
            model_id: self.model_id().to_string(),
        })
    }

    /// Get the model ID.
    fn model_id(&self) -> &str;

    /// Embedding dimension, if known before the first call.
    fn dimension(&self) -> Option<usize>;
}

// ============================================================================
// Generation Model Trait
// ============================================================================

/// A single grounded completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// System instruction (grounding rules).
    pub system: String,
    /// User prompt (context plus the section task).
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on completion tokens.
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// Create a request with default sampling settings.
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.2,
            max_tokens: 700,
        }
    }

    /// Set sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Trait for text-generation models.
///
/// Implementations must honour the system instruction; budgetq uses it to
/// restrict answers to the supplied context.
#[async_trait]
pub trait GenerationModel: Send + Sync + std::fmt::Debug {
    /// Complete the request and return the generated text.
    async fn complete(&self, request: &GenerationRequest) -> ModelResult<String>;

    /// Get the model ID.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create an embedding model from configuration.
///
/// # Errors
///
/// Returns `ModelError::MissingApiKey` when the provider needs a key and the
/// configured environment variable is unset.
#[cfg(feature = "remote")]
pub fn create_embedding_model(config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    Ok(Box::new(OpenAiEmbeddingModel::new(config)?))
}

#[cfg(not(feature = "remote"))]
pub fn create_embedding_model(config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    Err(ModelError::ProviderNotAvailable {
        provider: config.provider.to_string(),
        reason: "No embedding providers available. Enable the 'remote' feature.".to_string(),
    })
}

/// Create a generation model from configuration.
///
/// # Errors
///
/// Returns `ModelError::MissingApiKey` when the provider needs a key and the
/// configured environment variable is unset.
#[cfg(feature = "remote")]
pub fn create_generation_model(
    config: &GenerationConfig,
) -> ModelResult<Box<dyn GenerationModel>> {
    Ok(Box::new(OpenAiGenerationModel::new(config)?))
}

#[cfg(not(feature = "remote"))]
pub fn create_generation_model(
    config: &GenerationConfig,
) -> ModelResult<Box<dyn GenerationModel>> {
    Err(ModelError::ProviderNotAvailable {
        provider: config.provider.to_string(),
        reason: "No generation providers available. Enable the 'remote' feature.".to_string(),
    })
}

/// Read an API key from `env_var`, enforcing presence when `provider` needs one.
pub fn resolve_api_key(provider: ProviderKind, env_var: &str) -> ModelResult<Option<String>> {
    let key = std::env::var(env_var)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());

    match key {
        Some(k) => Ok(Some(k)),
        None if provider.requires_api_key() => Err(ModelError::MissingApiKey {
            env_var: env_var.to_string(),
        }),
        None => Ok(None),
    }
}

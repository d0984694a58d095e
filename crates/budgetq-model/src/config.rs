//! Configuration types for budgetq-model.
//!
//! These are the canonical configuration types for the embedding and
//! generation capabilities. `budgetq-core` embeds them directly in its YAML
//! configuration rather than defining duplicates.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_EMBEDDING_MODEL_ID, DEFAULT_GENERATION_MODEL_ID};

/// Default base URL for the hosted OpenAI API.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default base URL for a local Ollama server (OpenAI-compatible endpoint).
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434/v1";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

// ============================================================================
// ProviderKind
// ============================================================================

/// Backend flavour for remote capabilities.
///
/// Both speak the OpenAI wire format; they differ in defaults and in whether
/// an API key is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted OpenAI (or any compatible gateway requiring a key).
    #[default]
    OpenAi,
    /// Local Ollama server; no key required.
    Ollama,
}

impl ProviderKind {
    /// Default base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
            Self::Ollama => DEFAULT_OLLAMA_BASE_URL,
        }
    }

    /// Whether requests must carry an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "openai-compatible" | "azure" => Ok(Self::OpenAi),
            "ollama" | "local" => Ok(Self::Ollama),
            _ => Err(format!(
                "Unknown provider: '{}'. Use 'openai' or 'ollama'.",
                s
            )),
        }
    }
}

// ============================================================================
// EmbeddingConfig
// ============================================================================

/// Configuration for the embedding capability.
///
/// The same model must embed the corpus offline and queries online; a
/// dimension mismatch is detected at query time.
///
/// # Example YAML
///
/// ```yaml
/// embedding:
///   provider: openai
///   modelId: text-embedding-3-small
///   timeoutSecs: 15
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Provider type.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model ID (e.g., "text-embedding-3-small").
    #[serde(default = "default_embedding_model_id")]
    pub model_id: String,

    /// Base URL override. Defaults to the provider's URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable that holds the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Expected embedding dimension, when known ahead of time.
    #[serde(default)]
    pub dimension: Option<usize>,

    /// Time budget for one embedding call, in seconds.
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,

    /// Texts per request when embedding the corpus offline.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model_id() -> String {
    DEFAULT_EMBEDDING_MODEL_ID.to_string()
}
fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    15
}
fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model_id: default_embedding_model_id(),
            base_url: None,
            api_key_env: default_api_key_env(),
            dimension: None,
            timeout_secs: default_embedding_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolved base URL (override or provider default), without a trailing slash.
    pub fn effective_base_url(&self) -> String {
        trim_base_url(self.base_url.as_deref(), self.provider)
    }
}

// ============================================================================
// GenerationConfig
// ============================================================================

/// Configuration for the grounded text-generation capability.
///
/// # Example YAML
///
/// ```yaml
/// generation:
///   enabled: true
///   provider: openai
///   modelId: gpt-4o-mini
///   timeoutSecs: 60
///   retries: 1
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// When false, sufficient evidence yields an extractive report instead.
    #[serde(default = "default_generation_enabled")]
    pub enabled: bool,

    /// Provider type.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Chat model ID (e.g., "gpt-4o-mini").
    #[serde(default = "default_generation_model_id")]
    pub model_id: String,

    /// Base URL override. Defaults to the provider's URL.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable that holds the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Time budget for one completion call, in seconds.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts per section after a failed or empty completion.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on completion tokens per section.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_generation_enabled() -> bool {
    true
}
fn default_generation_model_id() -> String {
    DEFAULT_GENERATION_MODEL_ID.to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_retries() -> u32 {
    1
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    700
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: default_generation_enabled(),
            provider: ProviderKind::default(),
            model_id: default_generation_model_id(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_generation_timeout_secs(),
            retries: default_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl GenerationConfig {
    /// Resolved base URL (override or provider default), without a trailing slash.
    pub fn effective_base_url(&self) -> String {
        trim_base_url(self.base_url.as_deref(), self.provider)
    }
}

fn trim_base_url(base_url: Option<&str>, provider: ProviderKind) -> String {
    base_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(provider.default_base_url())
        .trim_end_matches('/')
        .to_string()
}

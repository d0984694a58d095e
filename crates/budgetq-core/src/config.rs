//! Configuration types for budgetq.
//!
//! This module provides the configuration structures used by the engine:
//! - [`AppConfig`]: User-level configuration stored in `~/.budgetq/config.yaml`
//! - [`CorpusConfig`]: Where the evidence corpus lives
//! - [`RetrievalConfig`]: Scorer choice, threshold, top-K, and context cap
//! - [`ReportConfig`]: Report presentation
//!
//! Embedding and generation settings reuse the capability configs from
//! `budgetq-model` so the YAML maps 1:1 onto what the providers consume.
//!
//! Precedence is CLI flag > environment variable > config file > defaults;
//! the first two are applied by the CLI on top of the loaded [`AppConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use budgetq_model::{EmbeddingConfig, GenerationConfig, ProviderKind};

use crate::constants::{
    BUDGETQ_HOME_DIR, DEFAULT_CORPUS_FILENAME, DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MAX_QUERY_CHARS,
    DEFAULT_MIN_SCORE, DEFAULT_REPORT_TITLE, DEFAULT_TOP_K, DEFAULT_VECTOR_MIN_SCORE,
    GLOBAL_CONFIG_FILENAME,
};
use crate::errors::CoreError;
use crate::retrieval::RetrievalOptions;
use crate::scoring::{ScorerKind, SimilarityMetric};

// ============================================================================
// AppConfig
// ============================================================================

/// Top-level configuration.
///
/// Every field is defaulted, so an empty or missing file is valid.
///
/// # Example YAML
///
/// ```yaml
/// corpus:
///   path: data/budget_corpus.json
/// retrieval:
///   scorer: vector
///   metric: cosine
///   minScore: 0.3
///   topK: 5
/// embedding:
///   provider: openai
///   modelId: text-embedding-3-small
/// generation:
///   modelId: gpt-4o-mini
///   timeoutSecs: 60
///   retries: 1
/// report:
///   title: Autumn Budget Briefing
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Corpus location.
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Retrieval pipeline parameters.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Embedding capability (vector scorer and `corpus embed`).
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation capability (report sections).
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Report presentation.
    #[serde(default)]
    pub report: ReportConfig,
}

impl AppConfig {
    /// Load the configuration from the default location (`~/.budgetq/config.yaml`).
    ///
    /// If the file does not exist, returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigParse`] if the file exists but cannot be parsed,
    /// or [`CoreError::InvalidConfiguration`] if validation fails.
    pub fn load_default() -> Result<Self, CoreError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load from an explicit path if given, otherwise from the default location.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CoreError> {
        match explicit {
            Some(path) if !path.exists() => Err(CoreError::ConfigIo {
                path: path.to_path_buf(),
                message: "file not found".to_string(),
            }),
            Some(path) => Self::from_path(path),
            None => Self::load_default(),
        }
    }

    /// Load the configuration from a specific path.
    ///
    /// If the file does not exist, returns the defaults.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| CoreError::ConfigIo {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config = Self::from_yaml_str(&content).map_err(|e| match e {
            CoreError::Yaml(e) => CoreError::ConfigParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
            other => other,
        })?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML text.
    ///
    /// Fatal problems are returned as errors. Warnings are left to the
    /// caller, since flags may still change the effective configuration.
    pub fn from_yaml_str(content: &str) -> Result<Self, CoreError> {
        // An empty document deserializes to unit, not a map.
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Get the default config directory (`~/.budgetq`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(BUDGETQ_HOME_DIR))
    }

    /// Get the default config file path (`~/.budgetq/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(GLOBAL_CONFIG_FILENAME))
    }

    /// Validates the entire configuration, returning collected warnings.
    ///
    /// # Errors
    ///
    /// Fatal problems (zero limits, unsupported metric, zero timeouts) are
    /// returned as [`CoreError::InvalidConfiguration`].
    pub fn validate(&self) -> Result<Vec<String>, CoreError> {
        let mut warnings = Vec::new();
        warnings.extend(self.retrieval.validate()?);
        warnings.extend(validate_embedding(&self.embedding)?);
        warnings.extend(validate_generation(&self.generation)?);
        warnings.extend(self.report.validate()?);

        let needs_embedding_key =
            self.retrieval.scorer == ScorerKind::Vector && self.embedding.provider.requires_api_key();
        if needs_embedding_key && std::env::var(&self.embedding.api_key_env).is_err() {
            warnings.push(format!(
                "retrieval.scorer is vector but ${} is not set; the vector scorer cannot be built",
                self.embedding.api_key_env
            ));
        }

        let needs_generation_key = self.generation.enabled && self.generation.provider.requires_api_key();
        if needs_generation_key && std::env::var(&self.generation.api_key_env).is_err() {
            warnings.push(format!(
                "generation is enabled but ${} is not set; reports will fall back to the template",
                self.generation.api_key_env
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// CorpusConfig
// ============================================================================

/// Corpus location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusConfig {
    /// Path to the JSON or JSONL corpus. Defaults to `budget_corpus.json`
    /// in the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CorpusConfig {
    /// Resolved corpus path.
    pub fn effective_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CORPUS_FILENAME))
    }
}

// ============================================================================
// RetrievalConfig
// ============================================================================

/// Retrieval pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Relevance strategy.
    #[serde(default)]
    pub scorer: ScorerKind,

    /// Similarity metric for the vector scorer.
    #[serde(default)]
    pub metric: SimilarityMetric,

    /// Minimum score a chunk needs to survive. Scores equal to it are kept.
    ///
    /// When unset, the default depends on the scorer: 1.0 for lexical (one
    /// matching word), 0.25 for vector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,

    /// Number of chunks retained after ranking.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Context length cap, in characters.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Queries longer than this many characters are rejected.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_max_context_chars() -> usize {
    DEFAULT_MAX_CONTEXT_CHARS
}

fn default_max_query_chars() -> usize {
    DEFAULT_MAX_QUERY_CHARS
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerKind::default(),
            metric: SimilarityMetric::default(),
            min_score: None,
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

impl RetrievalConfig {
    /// Threshold in effect for the configured scorer.
    pub fn effective_min_score(&self) -> f32 {
        self.min_score.unwrap_or(match self.scorer {
            ScorerKind::Lexical => DEFAULT_MIN_SCORE,
            ScorerKind::Vector => DEFAULT_VECTOR_MIN_SCORE,
        })
    }

    /// Pipeline options derived from this config.
    pub fn to_options(&self) -> RetrievalOptions {
        RetrievalOptions {
            min_score: self.effective_min_score(),
            top_k: self.top_k,
            max_context_chars: self.max_context_chars,
        }
    }

    /// Validate the retrieval configuration.
    ///
    /// Returns a list of warnings for non-fatal issues.
    pub fn validate(&self) -> Result<Vec<String>, CoreError> {
        let mut warnings = Vec::new();

        if self.top_k == 0 {
            return Err(CoreError::InvalidConfiguration {
                message: "retrieval.topK cannot be 0".to_string(),
                hint: "Set topK to at least 1 (recommended: 3-10)".to_string(),
            });
        }

        if self.max_context_chars == 0 {
            return Err(CoreError::InvalidConfiguration {
                message: "retrieval.maxContextChars cannot be 0".to_string(),
                hint: "Set maxContextChars to a positive value (default: 5000)".to_string(),
            });
        }

        if self.max_query_chars == 0 {
            return Err(CoreError::InvalidConfiguration {
                message: "retrieval.maxQueryChars cannot be 0".to_string(),
                hint: "Set maxQueryChars to a positive value (default: 2000)".to_string(),
            });
        }

        if self.metric == SimilarityMetric::L2 {
            return Err(CoreError::InvalidConfiguration {
                message: "retrieval.metric 'l2' is not supported".to_string(),
                hint: "Use 'cosine' (default) or 'dot' for unit-normalised embeddings; relevance must grow with the score".to_string(),
            });
        }

        if let Some(min_score) = self.min_score {
            if !min_score.is_finite() {
                return Err(CoreError::InvalidConfiguration {
                    message: "retrieval.minScore must be a finite number".to_string(),
                    hint: "Use e.g. 1.0 for lexical or 0.25 for vector scoring".to_string(),
                });
            }
            if self.scorer == ScorerKind::Vector && min_score > 1.0 {
                warnings.push(format!(
                    "retrieval.minScore ({}) exceeds the maximum similarity of 1.0; every query will be INSUFFICIENT",
                    min_score
                ));
            }
            if min_score <= 0.0 {
                warnings.push(format!(
                    "retrieval.minScore ({}) admits chunks with no relevance at all",
                    min_score
                ));
            }
        }

        if self.scorer == ScorerKind::Lexical && self.metric != SimilarityMetric::Cosine {
            warnings.push("retrieval.metric is ignored by the lexical scorer".to_string());
        }

        if self.top_k > 50 {
            warnings.push(format!(
                "retrieval.topK ({}) is large; most chunks will be cut by maxContextChars",
                self.top_k
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// ReportConfig
// ============================================================================

/// Report presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    /// Document title.
    #[serde(default = "default_report_title")]
    pub title: String,
}

fn default_report_title() -> String {
    DEFAULT_REPORT_TITLE.to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_report_title(),
        }
    }
}

impl ReportConfig {
    fn validate(&self) -> Result<Vec<String>, CoreError> {
        let mut warnings = Vec::new();
        if self.title.trim().is_empty() {
            warnings.push(format!(
                "report.title is empty; using \"{}\"",
                DEFAULT_REPORT_TITLE
            ));
        }
        Ok(warnings)
    }

    /// Title to print, falling back to the default when blank.
    pub fn effective_title(&self) -> &str {
        if self.title.trim().is_empty() {
            DEFAULT_REPORT_TITLE
        } else {
            self.title.trim()
        }
    }
}

// ============================================================================
// Capability config validation
// ============================================================================

fn validate_embedding(config: &EmbeddingConfig) -> Result<Vec<String>, CoreError> {
    let mut warnings = Vec::new();

    if config.timeout_secs == 0 {
        return Err(CoreError::InvalidConfiguration {
            message: "embedding.timeoutSecs cannot be 0".to_string(),
            hint: "Every embedding call needs a bounded timeout (default: 15)".to_string(),
        });
    }

    if config.batch_size == 0 {
        return Err(CoreError::InvalidConfiguration {
            message: "embedding.batchSize cannot be 0".to_string(),
            hint: "Set batchSize to at least 1 (default: 64)".to_string(),
        });
    }

    if config.dimension == Some(0) {
        return Err(CoreError::InvalidConfiguration {
            message: "embedding.dimension cannot be 0".to_string(),
            hint: "Remove the field to accept the model's native dimension".to_string(),
        });
    }

    if config.model_id.trim().is_empty() {
        return Err(CoreError::InvalidConfiguration {
            message: "embedding.modelId cannot be empty".to_string(),
            hint: "e.g. text-embedding-3-small".to_string(),
        });
    }

    if config.timeout_secs > 120 {
        warnings.push(format!(
            "embedding.timeoutSecs ({}) is very long for a single query embedding",
            config.timeout_secs
        ));
    }

    Ok(warnings)
}

fn validate_generation(config: &GenerationConfig) -> Result<Vec<String>, CoreError> {
    let mut warnings = Vec::new();

    if config.timeout_secs == 0 {
        return Err(CoreError::InvalidConfiguration {
            message: "generation.timeoutSecs cannot be 0".to_string(),
            hint: "Every generation call needs a bounded timeout (default: 60)".to_string(),
        });
    }

    if config.max_tokens == 0 {
        return Err(CoreError::InvalidConfiguration {
            message: "generation.maxTokens cannot be 0".to_string(),
            hint: "Set maxTokens to a positive value (default: 700)".to_string(),
        });
    }

    if config.model_id.trim().is_empty() {
        return Err(CoreError::InvalidConfiguration {
            message: "generation.modelId cannot be empty".to_string(),
            hint: "e.g. gpt-4o-mini".to_string(),
        });
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        warnings.push(format!(
            "generation.temperature ({}) is outside 0.0-2.0; providers may reject it",
            config.temperature
        ));
    }

    if config.retries > 3 {
        warnings.push(format!(
            "generation.retries ({}) multiplies worst-case latency by {}",
            config.retries,
            config.retries + 1
        ));
    }

    Ok(warnings)
}

//! Error types for budgetq-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to load the static evidence corpus.
///
/// Fatal at startup: the index never becomes ready.
#[derive(Error, Debug)]
pub enum CorpusLoadError {
    /// The corpus file does not exist.
    #[error("Corpus not found at `{path}`")]
    Missing {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The corpus file exists but could not be read.
    #[error("Corpus I/O error at `{path}`: {message}")]
    Io {
        /// Path to the corpus file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// The corpus is not valid structured data, or a record lacks `text`.
    #[error("Corpus malformed at `{path}`: {message}")]
    Malformed {
        /// Path to the corpus file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Two records share the same chunk id.
    #[error("Corpus at `{path}` contains duplicate chunk id {id}")]
    DuplicateId {
        /// Path to the corpus file.
        path: PathBuf,
        /// The repeated id.
        id: u64,
    },

    /// Embedded records disagree on vector length.
    #[error("Corpus at `{path}`: chunk {id} has a {found}-dimensional embedding, expected {expected}")]
    InconsistentDimension {
        /// Path to the corpus file.
        path: PathBuf,
        /// Offending chunk id.
        id: u64,
        /// Dimension of the first embedded chunk.
        expected: usize,
        /// Dimension found on this chunk.
        found: usize,
    },
}

/// Domain-specific errors for budgetq operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Corpus Errors
    // =========================================================================
    /// Loading the corpus failed.
    #[error(transparent)]
    CorpusLoad(#[from] CorpusLoadError),

    /// The corpus has not finished loading (or loading never started).
    #[error("Corpus index is not ready yet.")]
    IndexNotReady,

    /// A previous corpus load failed; the index will never become ready.
    #[error("Corpus index unavailable: {0}")]
    CorpusUnavailable(String),

    // =========================================================================
    // Request Errors
    // =========================================================================
    /// The query was rejected before any retrieval work.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The relevance scorer could not score this request.
    ///
    /// Raised by the vector strategy when the embedding call fails or times
    /// out. Callers decide whether to retry or degrade to lexical scoring.
    #[error("Relevance scoring unavailable: {reason}")]
    ScoringUnavailable {
        /// Why the scorer gave up.
        reason: String,
    },

    /// The query embedding does not match the corpus embedding dimension.
    #[error("Query embedding has {found} dimensions but the corpus uses {expected}. Embed the corpus and queries with the same model.")]
    EmbeddingDimensionMismatch {
        /// Dimension of the corpus embeddings.
        expected: usize,
        /// Dimension of the query embedding.
        found: usize,
    },

    /// The generation capability failed for a report section.
    ///
    /// The report assembler converts this into the template fallback; it only
    /// escapes when generation is invoked directly.
    #[error("Generation failed for section `{section}`: {reason}")]
    GenerationFailure {
        /// Heading of the section being generated.
        section: String,
        /// Description of the failure.
        reason: String,
    },

    /// A capability could not be constructed from configuration.
    #[error("Model capability error: {0}")]
    Model(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// Configuration file could not be read.
    #[error("Config I/O error at `{path}`: {message}")]
    ConfigIo {
        /// Path to the config file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// Configuration file could not be parsed.
    #[error("Config parse error at `{path}`: {message}")]
    ConfigParse {
        /// Path to the config file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Whether this error means "the index is not (yet) usable".
    ///
    /// Request handlers map these to a "not ready" response rather than a
    /// crash or an empty report.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            Self::IndexNotReady | Self::CorpusUnavailable(_) | Self::CorpusLoad(_)
        )
    }
}

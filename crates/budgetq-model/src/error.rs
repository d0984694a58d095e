//! Error types for budgetq-model.
//!
//! Errors say which model failed and why, so the core can decide whether a
//! failure is a scoring outage or a generation failure.

use thiserror::Error;

/// Result type alias for budgetq-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur when calling an external model capability.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Provider errors
    // ========================================================================
    /// Provider not compiled in or not usable with this configuration.
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable { provider: String, reason: String },

    /// The API key environment variable is unset or empty.
    #[error("{}", format_missing_api_key(.env_var))]
    MissingApiKey { env_var: String },

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// The HTTP request could not be sent or the body could not be read.
    #[error("Request to model '{model_id}' failed: {message}")]
    Request { model_id: String, message: String },

    /// The endpoint answered with a non-success status.
    #[error("Model '{model_id}' returned HTTP {status}: {body}")]
    Status {
        model_id: String,
        status: u16,
        body: String,
    },

    /// The call did not finish within its time budget.
    #[error("Model '{model_id}' timed out after {secs}s")]
    Timeout { model_id: String, secs: u64 },

    // ========================================================================
    // Response errors
    // ========================================================================
    /// The response parsed but did not have the expected shape.
    #[error("Invalid response from model '{model_id}': {message}")]
    InvalidResponse { model_id: String, message: String },

    /// The model answered with no usable content.
    #[error("Model '{model_id}' returned an empty response")]
    EmptyResponse { model_id: String },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_missing_api_key(env_var: &str) -> String {
    format!(
        "API key not found.\n\n\
        Set the `{env_var}` environment variable, or point `apiKeyEnv` in\n\
        ~/.budgetq/config.yaml at the variable that holds your key."
    )
}

// ============================================================================
// Error constructors
// ============================================================================

impl ModelError {
    /// Create a transport error.
    pub fn request(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-response error.
    pub fn invalid_response(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(model_id: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            model_id: model_id.into(),
            secs,
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Configuration problems (missing key, unavailable provider) never heal
    /// on retry; transport hiccups, timeouts, 5xx/429 and empty output might.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProviderNotAvailable { .. } | Self::MissingApiKey { .. } => false,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Request { .. }
            | Self::Timeout { .. }
            | Self::InvalidResponse { .. }
            | Self::EmptyResponse { .. }
            | Self::Json(_) => true,
        }
    }
}

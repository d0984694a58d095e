//! Adapter layer for budgetq-model capabilities.
//!
//! This module bridges budgetq-model errors with budgetq-core's domain errors.
//! The same `ModelError` means different things depending on where it
//! surfaces:
//!
//! ```text
//! capability construction ─► CoreError::Model
//! query embedding         ─► CoreError::ScoringUnavailable
//! section generation      ─► CoreError::GenerationFailure
//! ```

use budgetq_model::ModelError;

use crate::errors::CoreError;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a budgetq-model error raised while constructing a capability.
pub fn from_model_error(err: ModelError) -> CoreError {
    match err {
        ModelError::ProviderNotAvailable { provider, reason } => {
            CoreError::Model(format!("provider '{}' not available: {}", provider, reason))
        }
        ModelError::MissingApiKey { .. } => CoreError::Model(err.to_string()),
        ModelError::Json(json_err) => CoreError::Json(json_err),
        other => CoreError::Model(other.to_string()),
    }
}

/// Convert a failed query embedding into a scoring outage.
pub fn scoring_unavailable(err: &ModelError) -> CoreError {
    CoreError::ScoringUnavailable {
        reason: err.to_string(),
    }
}

/// Convert a failed section generation.
pub fn generation_failure(section: &str, err: &ModelError) -> CoreError {
    CoreError::GenerationFailure {
        section: section.to_string(),
        reason: err.to_string(),
    }
}

/// Extension trait to convert budgetq-model Result to Result<T, CoreError>.
pub trait IntoCoreResult<T> {
    /// Convert a budgetq-model result to a CoreError result.
    fn into_core_result(self) -> Result<T, CoreError>;
}

impl<T> IntoCoreResult<T> for Result<T, ModelError> {
    fn into_core_result(self) -> Result<T, CoreError> {
        self.map_err(from_model_error)
    }
}

//! Sufficiency gate: the single decision point between the templated
//! "no evidence" report and generated elaboration.

use serde::Serialize;

use crate::retrieval::RetrievalResult;

/// Gate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sufficiency {
    /// At least one non-blank chunk backs the answer.
    Sufficient,
    /// Nothing usable was retrieved.
    Insufficient,
}

/// Decides whether retrieval produced usable evidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct SufficiencyGate;

impl SufficiencyGate {
    /// `Insufficient` iff no chunk survived or the context is blank.
    pub fn evaluate(result: &RetrievalResult<'_>) -> Sufficiency {
        if result.evidence_count == 0 || result.context_text.trim().is_empty() {
            Sufficiency::Insufficient
        } else {
            Sufficiency::Sufficient
        }
    }
}

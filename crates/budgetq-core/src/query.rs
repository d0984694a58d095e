//! Query validation.

use serde::Serialize;

use crate::errors::CoreError;

/// A validated natural-language question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    text: String,
}

impl Query {
    /// Validate `raw` and normalise its whitespace.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidQuery`] if the query is empty, whitespace-only, or
    /// longer than `max_chars` characters after normalisation.
    pub fn parse(raw: &str, max_chars: usize) -> Result<Self, CoreError> {
        let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");

        if text.is_empty() {
            return Err(CoreError::InvalidQuery("query is empty".to_string()));
        }

        let len = text.chars().count();
        if len > max_chars {
            return Err(CoreError::InvalidQuery(format!(
                "query is {} characters long; the limit is {}",
                len, max_chars
            )));
        }

        Ok(Self { text })
    }

    /// The whitespace-normalised query text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

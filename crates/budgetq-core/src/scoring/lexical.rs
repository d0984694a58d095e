//! Keyword-overlap scoring.

use async_trait::async_trait;

use super::{PreparedQuery, RelevanceScorer, ScorerKind};
use crate::constants::LEXICAL_MIN_TOKEN_CHARS;
use crate::corpus::EvidenceChunk;
use crate::errors::CoreError;
use crate::query::Query;

/// Split `text` into distinct lowercase words longer than two characters.
///
/// Words are separated by any non-alphanumeric character. Order of first
/// occurrence is kept so logs read naturally.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() <= LEXICAL_MIN_TOKEN_CHARS {
            continue;
        }
        let word = word.to_lowercase();
        if !tokens.contains(&word) {
            tokens.push(word);
        }
    }
    tokens
}

/// Scores a chunk by how many distinct query words appear in its text.
///
/// Matching is case-insensitive substring containment, so "threshold" also
/// matches "thresholds". Deterministic; no external calls.
#[derive(Debug, Clone, Default)]
pub struct LexicalScorer;

impl LexicalScorer {
    /// Create a lexical scorer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelevanceScorer for LexicalScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::Lexical
    }

    async fn prepare(&self, query: &Query) -> Result<PreparedQuery, CoreError> {
        let tokens = tokenize(query.as_str());
        tracing::debug!("Lexical query tokens: {:?}", tokens);
        Ok(PreparedQuery::Lexical { tokens })
    }

    fn score(&self, prepared: &PreparedQuery, chunk: &EvidenceChunk) -> f32 {
        let PreparedQuery::Lexical { tokens } = prepared else {
            return 0.0;
        };
        if tokens.is_empty() {
            return 0.0;
        }
        let haystack = chunk.text.to_lowercase();
        tokens.iter().filter(|t| haystack.contains(t.as_str())).count() as f32
    }
}

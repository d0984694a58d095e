//! # budgetq-core
//!
//! **Budget question engine** – core library.
//!
//! This crate answers questions about a corpus of government budget
//! documents. It retrieves the chunks that support a question, refuses to
//! elaborate when nothing supports it, and otherwise assembles a fixed-layout
//! report with citations and an audit footer. It is consumed by the
//! `budgetq` CLI.
//!
//! ## Main Types
//!
//! - [`BudgetEngine`] – the main entry point for all operations
//! - [`Corpus`] / [`CorpusHandle`] – the loaded evidence and its shared handle
//! - [`RelevanceScorer`] – lexical or vector relevance scoring
//! - [`ReportDocument`] – the assembled report
//! - [`CoreError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`config`] – configuration (`~/.budgetq/config.yaml`)
//! - [`corpus`] – corpus model, loading, and offline embedding
//! - [`scoring`] – relevance scorers
//! - [`retrieval`] – threshold, rank, and context assembly
//! - [`gate`] – the sufficiency decision
//! - [`report`] – report template, generation, and audit footer
//! - [`engine`] – the [`BudgetEngine`] implementation
//!
//! ## Example
//!
//! ```ignore
//! use budgetq_core::{AppConfig, AskOptions, BudgetEngine};
//!
//! let engine = BudgetEngine::from_config(AppConfig::load_default()?)?;
//! engine.load_corpus().await?;
//!
//! let report = engine.ask("What is the VAT threshold?", &AskOptions::default()).await?;
//! println!("{}", report.to_markdown());
//! ```

// Modules
pub mod config;
pub mod constants;
pub mod corpus;
pub mod engine;
pub mod errors;
pub mod gate;
pub mod model_adapter;
pub mod query;
pub mod report;
pub mod retrieval;
pub mod scoring;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use config::{
    AppConfig, CorpusConfig, EmbeddingConfig, GenerationConfig, ProviderKind, ReportConfig,
    RetrievalConfig,
};
pub use constants::{
    BUDGETQ_HOME_DIR, DEFAULT_CORPUS_FILENAME, DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MIN_SCORE,
    DEFAULT_TOP_K, DEFAULT_VECTOR_MIN_SCORE, GLOBAL_CONFIG_FILENAME, NO_EVIDENCE_STATEMENT,
};
pub use corpus::{
    embed_corpus, load_corpus, parse_corpus, write_corpus, Corpus, CorpusFormat, CorpusHandle,
    CorpusState, CorpusStats, EvidenceChunk,
};
pub use engine::{AskOptions, BudgetEngine};
pub use errors::{CorpusLoadError, CoreError};
pub use gate::{Sufficiency, SufficiencyGate};
pub use query::Query;
pub use report::{
    AuditClock, AuditFooter, FixedClock, GenerationSettings, RegistrationId, ReportAssembler,
    ReportDocument, ReportPath, ReportSection, SectionBody, SystemClock, TemplateReason,
    REPORT_TEMPLATE,
};
pub use retrieval::{retrieve, RetrievalOptions, RetrievalResult, ScoredChunk};
pub use scoring::{
    create_scorer, LexicalScorer, PreparedQuery, RelevanceScorer, ScorerKind, SimilarityMetric,
    VectorScorer,
};

// budgetq-model adapter - for bridging the capability layer
pub use model_adapter::{from_model_error, IntoCoreResult};

//! Common constants used throughout budgetq-core.
//!
//! This module centralizes file names, fixed report wording, and retrieval
//! defaults so the template and the pipeline stay consistent.

// ============================================================================
// Directory and File Names
// ============================================================================

/// The name of the global budgetq configuration directory.
///
/// Located at `~/.budgetq/` on Unix-like systems.
pub const BUDGETQ_HOME_DIR: &str = ".budgetq";

/// Global configuration file name inside [`BUDGETQ_HOME_DIR`].
pub const GLOBAL_CONFIG_FILENAME: &str = "config.yaml";

/// Default corpus file, resolved relative to the working directory.
pub const DEFAULT_CORPUS_FILENAME: &str = "budget_corpus.json";

// ============================================================================
// Retrieval Defaults
// ============================================================================

/// Separator placed between retained chunks in the context text.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Default minimum relevance score. A chunk scoring exactly this is kept.
///
/// With the lexical scorer this means "at least one query word matched".
pub const DEFAULT_MIN_SCORE: f32 = 1.0;

/// Default minimum similarity when the vector scorer is selected.
pub const DEFAULT_VECTOR_MIN_SCORE: f32 = 0.25;

/// Default number of chunks retained after ranking.
pub const DEFAULT_TOP_K: usize = 5;

/// Default cap on context length, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 5000;

/// Minimum number of characters a lexical query token must exceed.
pub const LEXICAL_MIN_TOKEN_CHARS: usize = 2;

/// Default cap on accepted query length, in characters.
pub const DEFAULT_MAX_QUERY_CHARS: usize = 2000;

// ============================================================================
// Report Wording
// ============================================================================

/// Default report title.
pub const DEFAULT_REPORT_TITLE: &str = "Budget Briefing";

/// Body used for every non-question section when no evidence backs the report.
pub const NO_EVIDENCE_STATEMENT: &str =
    "No relevant information was found in the budget documents for this question.";

/// Citation label for chunks that carry no source label.
pub const UNKNOWN_SOURCE_LABEL: &str = "Unknown source";

/// Body of the audience section when reports are built without generation.
pub const EXTRACTIVE_AUDIENCE_STATEMENT: &str =
    "Text generation is disabled; see the quoted measures and the cited sources for the groups affected.";

/// Body of the figures section when the extractive path finds no numbers.
pub const NO_FIGURES_STATEMENT: &str = "No figures or dates appear in the retrieved evidence.";

//! Budget engine – the orchestrator for every budgetq operation.
//!
//! The [`BudgetEngine`] owns the configuration, the shared corpus handle,
//! the relevance scorer, and the report assembler. Each request borrows
//! the corpus through the handle and owns everything else it creates.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::constants::DEFAULT_MIN_SCORE;
use crate::corpus::{embed_corpus, write_corpus, Corpus, CorpusHandle, CorpusStats};
use crate::errors::CoreError;
use crate::model_adapter::IntoCoreResult;
use crate::query::Query;
use crate::report::{GenerationSettings, ReportAssembler, ReportDocument};
use crate::retrieval::{retrieve, RetrievalOptions, RetrievalResult};
use crate::scoring::{create_scorer, LexicalScorer, RelevanceScorer, ScorerKind};

// ============================================================================
// AskOptions
// ============================================================================

/// Per-request overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AskOptions {
    /// Override `retrieval.topK`.
    pub top_k: Option<usize>,
    /// Override the minimum score.
    pub min_score: Option<f32>,
    /// Retry with the lexical scorer when the vector scorer is unavailable.
    pub fallback_lexical: bool,
}

// ============================================================================
// BudgetEngine
// ============================================================================

/// The main engine for budgetq operations.
///
/// # Construction
///
/// Use [`BudgetEngine::from_config`] for typical usage, or
/// [`BudgetEngine::new`] to inject a custom scorer and assembler.
///
/// # Example
///
/// ```ignore
/// use budgetq_core::{AppConfig, AskOptions, BudgetEngine};
///
/// let engine = BudgetEngine::from_config(AppConfig::load_default()?)?;
/// engine.load_corpus().await?;
/// let report = engine.ask("What is the VAT threshold?", &AskOptions::default()).await?;
/// println!("{}", report.to_markdown());
/// ```
#[derive(Debug, Clone)]
pub struct BudgetEngine {
    config: AppConfig,
    corpus: CorpusHandle,
    scorer: Arc<dyn RelevanceScorer>,
    assembler: ReportAssembler,
}

impl BudgetEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build an engine from configuration.
    ///
    /// Validates the configuration, constructs the configured scorer, and,
    /// when `generation.enabled`, the generation capability. A generator
    /// that cannot be built (for example a missing API key) is logged and
    /// turns sufficient answers into the generation-failed template.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidConfiguration`] for invalid settings and
    /// [`CoreError::Model`] when the vector scorer cannot be constructed.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        for warning in config.validate()? {
            warn!("Config warning: {}", warning);
        }

        let scorer = create_scorer(&config, config.retrieval.scorer)?;

        let mut assembler = ReportAssembler::new(config.report.effective_title());
        if config.generation.enabled {
            match budgetq_model::create_generation_model(&config.generation).into_core_result() {
                Ok(generator) => {
                    assembler = assembler.with_generator(
                        Arc::from(generator),
                        GenerationSettings::from_config(&config.generation),
                    );
                }
                Err(e) => {
                    warn!("Generation model unavailable: {}", e);
                    assembler = assembler.with_generation_unavailable(e.to_string());
                }
            }
        }

        debug!(
            "Engine ready: scorer={}, generation={}",
            scorer.kind(),
            if assembler.has_generator() { "on" } else { "off" }
        );

        Ok(Self::new(config, scorer, assembler))
    }

    /// Build an engine from explicit parts.
    pub fn new(config: AppConfig, scorer: Arc<dyn RelevanceScorer>, assembler: ReportAssembler) -> Self {
        Self {
            config,
            corpus: CorpusHandle::new(),
            scorer,
            assembler,
        }
    }

    /// Share an existing corpus handle.
    pub fn with_corpus(mut self, corpus: CorpusHandle) -> Self {
        self.corpus = corpus;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The effective configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The shared corpus handle.
    pub fn corpus_handle(&self) -> &CorpusHandle {
        &self.corpus
    }

    /// The active scorer.
    pub fn scorer(&self) -> &dyn RelevanceScorer {
        self.scorer.as_ref()
    }

    /// The loaded corpus, without waiting.
    pub fn corpus(&self) -> Result<Arc<Corpus>, CoreError> {
        self.corpus.get()
    }

    // -------------------------------------------------------------------------
    // Corpus
    // -------------------------------------------------------------------------

    /// Load the corpus configured in `corpus.path` into the handle.
    pub async fn load_corpus(&self) -> Result<Arc<Corpus>, CoreError> {
        let path = self.config.corpus.effective_path();
        self.corpus.load_from(&path).await
    }

    /// Statistics for the loaded corpus.
    pub fn stats(&self) -> Result<CorpusStats, CoreError> {
        Ok(self.corpus.get()?.stats())
    }

    /// Embed every chunk of the loaded corpus and write the result to `output`.
    ///
    /// Returns the number of chunks written.
    pub async fn embed_corpus<F>(&self, output: &Path, on_batch: F) -> Result<usize, CoreError>
    where
        F: FnMut(usize, usize),
    {
        let corpus = self.corpus.get()?;
        let model = budgetq_model::create_embedding_model(&self.config.embedding).into_core_result()?;
        let timeout = Duration::from_secs(self.config.embedding.timeout_secs);

        info!(
            "Embedding {} chunks with {}",
            corpus.len(),
            model.model_id()
        );
        let chunks = embed_corpus(
            &corpus,
            model.as_ref(),
            self.config.embedding.batch_size,
            timeout,
            on_batch,
        )
        .await?;

        write_corpus(output, &chunks).await?;
        Ok(chunks.len())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Validate a raw query against the configured length limit.
    pub fn parse_query(&self, raw: &str) -> Result<Query, CoreError> {
        Query::parse(raw, self.config.retrieval.max_query_chars)
    }

    /// Pipeline options for this request.
    pub fn retrieval_options(&self, options: &AskOptions) -> RetrievalOptions {
        self.config
            .retrieval
            .to_options()
            .with_top_k(options.top_k)
            .with_min_score(options.min_score)
    }

    /// Run retrieval only.
    ///
    /// With `fallback_lexical`, a [`CoreError::ScoringUnavailable`] from the
    /// vector scorer is retried once with the lexical scorer.
    pub async fn retrieve<'a>(
        &self,
        corpus: &'a Corpus,
        query: &Query,
        options: &AskOptions,
    ) -> Result<RetrievalResult<'a>, CoreError> {
        let retrieval_options = self.retrieval_options(options);

        match retrieve(corpus, self.scorer.as_ref(), query, &retrieval_options).await {
            Err(CoreError::ScoringUnavailable { reason })
                if options.fallback_lexical && self.scorer.kind() == ScorerKind::Vector =>
            {
                warn!("Vector scoring unavailable ({}); falling back to lexical scoring", reason);
                let lexical_options = RetrievalOptions {
                    min_score: options.min_score.unwrap_or(DEFAULT_MIN_SCORE),
                    ..retrieval_options
                };
                retrieve(corpus, &LexicalScorer::new(), query, &lexical_options).await
            }
            other => other,
        }
    }

    /// Answer `raw_query` with a full report.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidQuery`] before any retrieval work
    /// - [`CoreError::IndexNotReady`] / [`CoreError::CorpusUnavailable`]
    ///   when the corpus is not loaded
    /// - scorer errors from retrieval
    ///
    /// Generation problems never surface here; they degrade the report to
    /// the template instead.
    pub async fn ask(&self, raw_query: &str, options: &AskOptions) -> Result<ReportDocument, CoreError> {
        let started = Instant::now();
        let query = self.parse_query(raw_query)?;
        let corpus = self.corpus.get()?;

        let retrieval = self.retrieve(&corpus, &query, options).await?;
        let report = self.assembler.assemble(&query, &retrieval).await;

        info!(
            "Answered in {}ms: {} evidence chunks, registration {}",
            started.elapsed().as_millis(),
            report.footer.evidence_count,
            report.footer.registration_id
        );
        Ok(report)
    }
}

//! CLI definition and command dispatch for budgetq.
//!
//! This module defines the command-line interface using `clap` and provides
//! the `run()` function that dispatches commands to the engine.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (e.g., `--corpus`, `--top-k`, `--scorer`)
//! 2. Environment variables (`BUDGETQ_CONFIG`, `BUDGETQ_CORPUS`, `BUDGETQ_VERBOSE`)
//! 3. Config file (`~/.budgetq/config.yaml` or path from `--config`)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use crate::ui::{color, format, table, ColorMode, MessageType, Progress, ProgressMode, Style};

use budgetq_core::constants::UNKNOWN_SOURCE_LABEL;
use budgetq_core::{
    AppConfig, AskOptions, BudgetEngine, CoreError, CorpusLoadError, ReportDocument, ReportPath,
    ScorerKind, SectionBody, TemplateReason,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// budgetq – evidence-gated answers from budget documents
#[derive(Parser, Debug)]
#[command(name = "budgetq")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "BUDGETQ_VERBOSE")]
    pub verbose: bool,

    /// Suppress progress and informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file (default: ~/.budgetq/config.yaml)
    #[arg(long, global = true, env = "BUDGETQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the corpus file (overrides corpus.path)
    #[arg(long, global = true, env = "BUDGETQ_CORPUS")]
    pub corpus: Option<PathBuf>,

    /// Color output mode
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

/// Retrieval flags shared by `ask` and `retrieve`.
#[derive(Args, Debug, Clone)]
pub struct RetrievalArgs {
    /// Maximum number of evidence chunks to keep
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Minimum relevance score (inclusive)
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Relevance scorer: lexical or vector
    #[arg(long)]
    pub scorer: Option<ScorerKind>,

    /// Fall back to lexical scoring if the embedding service is unavailable
    #[arg(long)]
    pub fallback_lexical: bool,
}

impl RetrievalArgs {
    fn options(&self) -> AskOptions {
        AskOptions {
            top_k: self.top_k,
            min_score: self.min_score,
            fallback_lexical: self.fallback_lexical,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a question with an evidence-backed report
    #[command(after_help = r#"EXAMPLES:
    # Ask a question (plain text report)
    budgetq ask "What is the VAT registration threshold?"

    # Markdown report saved to a file
    budgetq ask "What happens to fuel duty?" --markdown > fuel-duty.md

    # JSON for scripting
    budgetq ask "What is the VAT threshold?" --json | jq '.footer'

    # Quote the evidence without calling the generation service
    budgetq ask "What is the VAT threshold?" --no-generate

    # Use embeddings, falling back to keywords if the service is down
    budgetq ask "support for first-time buyers" --scorer vector --fallback-lexical
"#)]
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Quote the evidence instead of generating prose
        #[arg(long)]
        no_generate: bool,

        /// Output in JSON format
        #[arg(long, conflicts_with = "markdown")]
        json: bool,

        /// Output as Markdown
        #[arg(long)]
        markdown: bool,
    },

    /// Show the ranked evidence for a question (no report)
    #[command(after_help = r#"EXAMPLES:
    # Show the chunks that would back an answer
    budgetq retrieve "VAT threshold"

    # Inspect the scores with a lower threshold
    budgetq retrieve "VAT threshold" --min-score 0 --top-k 10 --json
"#)]
    Retrieve {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Inspect or prepare the corpus
    #[command(after_help = r#"EXAMPLES:
    # Show corpus statistics
    budgetq corpus stats

    # Precompute embeddings for the vector scorer
    budgetq corpus embed --output budget_corpus.embedded.json
"#)]
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Validate or show the configuration
    #[command(after_help = r#"EXAMPLES:
    # Validate the config file
    budgetq config check

    # Show the resolved configuration as JSON
    budgetq config show --json
"#)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Corpus subcommands
#[derive(Subcommand, Debug)]
pub enum CorpusAction {
    /// Load the corpus and print statistics
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Compute embeddings for every chunk and write a new corpus file
    Embed {
        /// Output path (.json or .jsonl)
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration and report warnings
    Check {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration (file, env, and flags merged)
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Run function
// ============================================================================

/// Run the CLI application.
///
/// Parses command-line arguments, starts the tokio runtime, and dispatches
/// to the appropriate command handler. Ctrl-C cancels the running command.
///
/// # Returns
///
/// Returns `ExitCode::SUCCESS` on success, or `ExitCode::FAILURE` on error.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always; debug only with --verbose. Logs go to stderr.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "budgetq_core={lvl},budgetq_model={lvl},budgetq_cli={lvl}",
        lvl = log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let style = Style::new(cli.color);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!(
                "{}",
                style.error_with_context("Failed to start async runtime", Some(&e.to_string()), None)
            );
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        tokio::select! {
            result = dispatch(&cli, &style) => result,
            _ = tokio::signal::ctrl_c() => Err(CoreError::Other(anyhow::anyhow!("Interrupted"))),
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&style, &cli, &e));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: &Cli, style: &Style) -> Result<(), CoreError> {
    match &cli.command {
        Command::Ask {
            question,
            retrieval,
            no_generate,
            json,
            markdown,
        } => handle_ask(cli, style, question, retrieval, *no_generate, *json, *markdown).await,
        Command::Retrieve {
            question,
            retrieval,
            json,
        } => handle_retrieve(cli, style, question, retrieval, *json).await,
        Command::Corpus { action } => match action {
            CorpusAction::Stats { json } => handle_corpus_stats(cli, style, *json).await,
            CorpusAction::Embed { output } => handle_corpus_embed(cli, style, output).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Check { json } => handle_config_check(cli, style, *json),
            ConfigAction::Show { json } => handle_config_show(cli, *json),
        },
    }
}

/// Load the config file and apply the global flag overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig, CoreError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(corpus) = &cli.corpus {
        config.corpus.path = Some(corpus.clone());
    }
    Ok(config)
}

/// Build the engine and load the corpus, with a spinner.
async fn open_engine(config: AppConfig, mode: ProgressMode) -> Result<BudgetEngine, CoreError> {
    let engine = BudgetEngine::from_config(config)?;
    let progress = Progress::spinner("Loading corpus...", mode);
    let loaded = engine.load_corpus().await;
    progress.finish_clear();
    loaded?;
    Ok(engine)
}

fn render_error(style: &Style, cli: &Cli, error: &CoreError) -> String {
    let config_hint = match &cli.config {
        Some(path) => format!("Check your config at {}", path.display()),
        None => "Check your config at ~/.budgetq/config.yaml".to_string(),
    };

    match error {
        CoreError::InvalidConfiguration { message, hint } => {
            style.error_with_context("Invalid configuration", Some(message), Some(hint))
        }
        CoreError::ConfigIo { .. } | CoreError::ConfigParse { .. } => {
            style.error_with_context(&error.to_string(), None, Some(&config_hint))
        }
        CoreError::CorpusLoad(CorpusLoadError::Missing { .. }) => style.error_with_context(
            "Failed to load corpus",
            Some(&error.to_string()),
            Some("Set corpus.path in the config file or pass --corpus <PATH>"),
        ),
        CoreError::CorpusLoad(_) => {
            style.error_with_context("Failed to load corpus", Some(&error.to_string()), None)
        }
        CoreError::ScoringUnavailable { .. } => style.error_with_context(
            &error.to_string(),
            None,
            Some("Retry with --fallback-lexical or --scorer lexical"),
        ),
        CoreError::EmbeddingDimensionMismatch { .. } => style.error_with_context(
            &error.to_string(),
            None,
            Some("Re-run `budgetq corpus embed` with the configured embedding model"),
        ),
        CoreError::Model(_) => style.error_with_context(
            "Model service is not usable",
            Some(&error.to_string()),
            Some(&format!("{}, or pass --no-generate", config_hint)),
        ),
        _ => style.message(MessageType::Err, &error.to_string()),
    }
}

fn join_question(words: &[String]) -> String {
    words.join(" ")
}

// ============================================================================
// Command handlers
// ============================================================================

async fn handle_ask(
    cli: &Cli,
    style: &Style,
    question: &[String],
    retrieval: &RetrievalArgs,
    no_generate: bool,
    json: bool,
    markdown: bool,
) -> Result<(), CoreError> {
    let mut config = resolve_config(cli)?;
    if let Some(scorer) = retrieval.scorer {
        config.retrieval.scorer = scorer;
    }
    if no_generate {
        config.generation.enabled = false;
    }

    let mode = ProgressMode::detect(cli.quiet, json);
    let engine = open_engine(config, mode).await?;

    let progress = Progress::spinner("Drafting report...", mode);
    let report = engine.ask(&join_question(question), &retrieval.options()).await;
    progress.finish_clear();
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if markdown {
        print!("{}", report.to_markdown());
    } else {
        print_report(style, &report);
    }

    if !cli.quiet && !json {
        match report.path {
            ReportPath::Template {
                reason: TemplateReason::NoEvidence,
            } => eprintln!(
                "{}",
                style.message(
                    MessageType::Hint,
                    "No chunk passed the relevance threshold; try `budgetq retrieve` with a lower --min-score"
                )
            ),
            ReportPath::Template {
                reason: TemplateReason::GenerationFailed,
            } => eprintln!(
                "{}",
                style.message(
                    MessageType::Warn,
                    "Report generation failed; showing the fallback report (use --verbose for details)"
                )
            ),
            _ => {}
        }
    }
    Ok(())
}

fn print_report(style: &Style, report: &ReportDocument) {
    println!("{}", style.section(&report.title));
    println!();
    for section in &report.sections {
        println!("{}", style.report_heading(section.number, &section.heading));
        match &section.body {
            SectionBody::Text(text) => {
                for line in text.lines() {
                    println!("   {}", line);
                }
            }
            SectionBody::List(items) => {
                for item in items {
                    println!("{}", style.list_item(item));
                }
            }
        }
        println!();
    }
    println!(
        "{}",
        style.report_heading(budgetq_core::report::AUDIT_SECTION_NUMBER, budgetq_core::report::AUDIT_HEADING)
    );
    println!("   {}", style.key_value("Generated", &report.footer.timestamp_iso));
    println!(
        "   {}",
        style.key_value("Registration", &style.registration(report.footer.registration_id.as_str()))
    );
    println!(
        "   {}",
        style.key_value("Evidence chunks", &report.footer.evidence_count.to_string())
    );
}

async fn handle_retrieve(
    cli: &Cli,
    style: &Style,
    question: &[String],
    retrieval: &RetrievalArgs,
    json: bool,
) -> Result<(), CoreError> {
    let mut config = resolve_config(cli)?;
    if let Some(scorer) = retrieval.scorer {
        config.retrieval.scorer = scorer;
    }
    config.generation.enabled = false;

    let mode = ProgressMode::detect(cli.quiet, json);
    let engine = open_engine(config, mode).await?;

    let query = engine.parse_query(&join_question(question))?;
    let corpus = engine.corpus()?;
    let result = engine.retrieve(&corpus, &query, &retrieval.options()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", style.section("EVIDENCE"));
    println!();
    println!("  {}", style.key_value("Query", query.as_str()));
    println!("  {}", style.key_value("Scorer", &engine.scorer().kind().to_string()));
    println!(
        "  {}",
        style.key_value(
            "Matched",
            &format!("{} of {} chunks, kept {}", result.matched, corpus.len(), result.evidence_count)
        )
    );
    println!();

    if result.is_empty() {
        println!(
            "{}",
            style.message(MessageType::Info, "No chunk passed the relevance threshold.")
        );
        return Ok(());
    }

    let rows: Vec<table::EvidenceRow> = result
        .chunks
        .iter()
        .enumerate()
        .map(|(i, scored)| table::EvidenceRow {
            rank: i + 1,
            id: scored.chunk.id,
            score: style.score(scored.score),
            source: scored
                .chunk
                .source_label
                .clone()
                .unwrap_or_else(|| UNKNOWN_SOURCE_LABEL.to_string()),
            text: scored.chunk.text.clone(),
        })
        .collect();
    println!("{}", table::render_evidence_table(&rows, color::terminal_width()));

    if result.truncated {
        println!();
        println!(
            "{}",
            style.message(
                MessageType::Warn,
                "Context was cut at retrieval.maxContextChars"
            )
        );
    }
    Ok(())
}

async fn handle_corpus_stats(cli: &Cli, style: &Style, json: bool) -> Result<(), CoreError> {
    let mut config = resolve_config(cli)?;
    config.generation.enabled = false;
    config.retrieval.scorer = ScorerKind::Lexical;

    let engine = open_engine(config, ProgressMode::detect(cli.quiet, json)).await?;
    let stats = engine.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", style.section("CORPUS"));
    println!();
    println!("  {}", style.key_value("Source", &stats.source));
    println!("  {}", style.key_value("Loaded", &format::format_timestamp(stats.loaded_at)));
    println!();

    let metrics = [
        ("Chunks", format::format_thousands(stats.chunks as u64)),
        ("Embedded chunks", format::format_thousands(stats.embedded_chunks as u64)),
        (
            "Dimension",
            stats
                .dimension
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Source labels", stats.source_labels.len().to_string()),
        ("Characters", format::format_thousands(stats.total_chars as u64)),
    ];
    println!("{}", table::render_metrics_table(&metrics));

    if !stats.source_labels.is_empty() {
        println!();
        println!("{}", style.section("SOURCES"));
        for label in &stats.source_labels {
            println!("{}", style.list_item(&style.source_label(label)));
        }
    }
    Ok(())
}

async fn handle_corpus_embed(cli: &Cli, style: &Style, output: &Path) -> Result<(), CoreError> {
    let mut config = resolve_config(cli)?;
    config.generation.enabled = false;
    config.retrieval.scorer = ScorerKind::Lexical;

    let mode = ProgressMode::detect(cli.quiet, false);
    let engine = open_engine(config, mode).await?;
    let total = engine.corpus()?.len();

    let progress = Progress::bar(total as u64, "Embedding chunks", mode);
    let written = engine
        .embed_corpus(output, |done, _| progress.set_position(done as u64))
        .await;
    progress.finish_clear();
    let written = written?;

    if !cli.quiet {
        println!(
            "{}",
            style.message(
                MessageType::Ok,
                &format!(
                    "Embedded {} chunks in {:.1}s",
                    format::format_thousands(written as u64),
                    progress.elapsed().as_secs_f32()
                )
            )
        );
        println!("{}", style.key_value("     Written to", &output.display().to_string()));
        println!(
            "{}",
            style.message(
                MessageType::Hint,
                "Point corpus.path at this file and set retrieval.scorer: vector"
            )
        );
    }
    Ok(())
}

/// Validate the configuration and report warnings.
fn handle_config_check(cli: &Cli, style: &Style, json: bool) -> Result<(), CoreError> {
    let path = cli.config.clone().or_else(AppConfig::default_path);
    let exists = path.as_deref().is_some_and(Path::exists);
    let config = resolve_config(cli)?;
    let warnings = config.validate()?;

    if json {
        let report = serde_json::json!({
            "path": path,
            "exists": exists,
            "valid": true,
            "warnings": warnings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &path {
        Some(p) if exists => println!(
            "{}",
            style.message(MessageType::Info, &format!("Checked {}", p.display()))
        ),
        Some(p) => println!(
            "{}",
            style.message(
                MessageType::Info,
                &format!("No config file at {}; using defaults", p.display())
            )
        ),
        None => println!(
            "{}",
            style.message(MessageType::Info, "No home directory; using defaults")
        ),
    }

    if warnings.is_empty() {
        println!("{}", style.message(MessageType::Ok, "Configuration is valid"));
    } else {
        println!(
            "{}",
            style.message(MessageType::Warn, &format!("{} warning(s):", warnings.len()))
        );
        for warning in &warnings {
            println!("  • {}", warning);
        }
        println!("{}", style.message(MessageType::Ok, "Configuration is valid with warnings"));
    }
    Ok(())
}

/// Show the resolved configuration.
fn handle_config_show(cli: &Cli, json: bool) -> Result<(), CoreError> {
    let config = resolve_config(cli)?;
    let rendered = serde_json::to_string_pretty(&config)?;
    if json {
        println!("{}", rendered);
    } else {
        println!("# Resolved configuration");
        println!("{}", rendered);
    }
    Ok(())
}

//! End-to-end tests for the ask pipeline: corpus file on disk, engine,
//! scorer, gate, and report assembly.
//!
//! Capabilities are replaced with in-process doubles so the tests never
//! touch the network.

use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use budgetq_core::{
    AppConfig, AskOptions, BudgetEngine, CoreError, CorpusLoadError, CorpusState, FixedClock,
    GenerationSettings, LexicalScorer, ReportAssembler, ReportPath, SectionBody, SimilarityMetric,
    TemplateReason, VectorScorer, NO_EVIDENCE_STATEMENT,
};
use budgetq_model::{EmbeddingModel, GenerationModel, GenerationRequest, ModelError, ModelResult};

const CORPUS_JSON: &str = r#"[
  {"id": 10, "text": "The VAT registration threshold will remain at £90,000 until March 2026.", "source": "Budget Red Book, p.12"},
  {"id": 11, "text": "Fuel duty is frozen for twelve months.", "sourceLabel": "Budget Red Book, p.30"},
  {"id": 12, "text": "Corporation tax stays at 25 per cent for large companies.", "label": "  "}
]"#;

// ----------------------------------------------------------------------------
// Doubles
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum Reply {
    Text(&'static str),
    Transient,
    Hang,
}

#[derive(Debug)]
struct FakeGenerator {
    script: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationModel for FakeGenerator {
    async fn complete(&self, _request: &GenerationRequest) -> ModelResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next.unwrap_or(Reply::Text("- Grounded point.")) {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Transient => Err(ModelError::request("fake", "connection reset by peer")),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".to_string())
            }
        }
    }

    fn model_id(&self) -> &str {
        "fake"
    }
}

#[derive(Debug)]
struct FixedEmbedding(Vec<f32>);

#[async_trait]
impl EmbeddingModel for FixedEmbedding {
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.0.clone()).collect())
    }

    fn model_id(&self) -> &str {
        "fixed"
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.0.len())
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn write_corpus_file(dir: &TempDir, name: &str, content: &str) -> AppConfig {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write corpus");
    let mut config = AppConfig::default();
    config.corpus.path = Some(path);
    config
}

fn assembler(generator: Option<Arc<FakeGenerator>>, settings: GenerationSettings) -> ReportAssembler {
    let clock = FixedClock {
        at: Utc.with_ymd_and_hms(2025, 11, 26, 12, 30, 0).unwrap(),
        nonce: 0xBEEF,
    };
    let assembler = ReportAssembler::new("Budget Briefing").with_clock(Arc::new(clock));
    match generator {
        Some(g) => assembler.with_generator(g, settings),
        None => assembler,
    }
}

async fn lexical_engine(generator: Option<Arc<FakeGenerator>>, settings: GenerationSettings) -> (TempDir, BudgetEngine) {
    let dir = TempDir::new().expect("temp dir");
    let config = write_corpus_file(&dir, "budget.json", CORPUS_JSON);
    let engine = BudgetEngine::new(config, Arc::new(LexicalScorer::new()), assembler(generator, settings));
    engine.load_corpus().await.expect("load corpus");
    (dir, engine)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn vat_question_produces_generated_report() {
    let generator = FakeGenerator::new(vec![]);
    let (_dir, engine) = lexical_engine(Some(generator.clone()), GenerationSettings::default()).await;

    let report = engine
        .ask("  What is the   VAT threshold? ", &AskOptions::default())
        .await
        .unwrap();

    assert_eq!(report.path, ReportPath::Generated);
    assert_eq!(report.query, "What is the VAT threshold?");
    assert_eq!(report.sections.len(), 6);
    assert_eq!(report.citations(), &["[1] Budget Red Book, p.12".to_string()]);
    assert_eq!(report.footer.evidence_count, 1);
    assert_eq!(report.footer.registration_id.as_str(), "251126-BEEF-E01");
    assert_eq!(report.footer.timestamp_iso, "2025-11-26T12:30:00Z");
    assert_eq!(generator.calls(), 4);

    let markdown = report.to_markdown();
    assert!(markdown.starts_with("# Budget Briefing"));
    assert!(markdown.contains("## 6. Sources"));
    assert!(markdown.contains("## 7. Audit"));
}

#[tokio::test]
async fn unsupported_question_uses_template_without_generation() {
    let generator = FakeGenerator::new(vec![]);
    let (_dir, engine) = lexical_engine(Some(generator.clone()), GenerationSettings::default()).await;

    let report = engine
        .ask("What changes to inheritance duties?", &AskOptions::default())
        .await
        .unwrap();

    assert_eq!(
        report.path,
        ReportPath::Template {
            reason: TemplateReason::NoEvidence
        }
    );
    assert_eq!(generator.calls(), 0);
    assert!(report.citations().is_empty());
    assert_eq!(report.footer.registration_id.as_str(), "251126-BEEF-E00");
    for section in &report.sections[1..] {
        assert_eq!(section.body, SectionBody::Text(NO_EVIDENCE_STATEMENT.to_string()));
    }
}

/// Three one-line chunks with positional ids 0, 1, 2.
const SHORT_CORPUS_JSON: &str = r#"[
  {"text": "VAT threshold raised to £95,000"},
  {"text": "Fuel duty frozen"},
  {"text": "Corporation tax unchanged"}
]"#;

async fn short_corpus_engine(generator: Arc<FakeGenerator>) -> (TempDir, BudgetEngine) {
    let dir = TempDir::new().expect("temp dir");
    let config = write_corpus_file(&dir, "short.json", SHORT_CORPUS_JSON);
    let engine = BudgetEngine::new(
        config,
        Arc::new(LexicalScorer::new()),
        assembler(Some(generator), GenerationSettings::default()),
    );
    engine.load_corpus().await.expect("load corpus");
    (dir, engine)
}

async fn retained_ids(engine: &BudgetEngine, question: &str, options: &AskOptions) -> Vec<u64> {
    let corpus = engine.corpus().unwrap();
    let query = engine.parse_query(question).unwrap();
    let result = engine.retrieve(&corpus, &query, options).await.unwrap();
    assert_eq!(result.evidence_count, result.chunks.len());
    result.chunks.iter().map(|s| s.chunk.id).collect()
}

#[tokio::test]
async fn short_corpus_vat_threshold_keeps_only_first_chunk() {
    let generator = FakeGenerator::new(vec![]);
    let (_dir, engine) = short_corpus_engine(generator.clone()).await;

    assert_eq!(retained_ids(&engine, "VAT threshold", &AskOptions::default()).await, vec![0]);

    let report = engine.ask("VAT threshold", &AskOptions::default()).await.unwrap();
    assert_eq!(report.path, ReportPath::Generated);
    assert_eq!(report.footer.evidence_count, 1);
    assert_eq!(generator.calls(), 4);
}

#[tokio::test]
async fn short_corpus_inheritance_tax_matches_on_shared_word() {
    let generator = FakeGenerator::new(vec![]);
    let (_dir, engine) = short_corpus_engine(generator.clone()).await;

    // "tax" also occurs in "Corporation tax unchanged", so one word overlaps
    // and the default threshold of one word keeps that chunk.
    assert_eq!(retained_ids(&engine, "inheritance tax", &AskOptions::default()).await, vec![2]);

    // Requiring both words leaves nothing and the template is returned
    // without any generation call.
    let strict = AskOptions {
        min_score: Some(2.0),
        ..AskOptions::default()
    };
    assert!(retained_ids(&engine, "inheritance tax", &strict).await.is_empty());

    let report = engine.ask("inheritance tax", &strict).await.unwrap();
    assert_eq!(
        report.path,
        ReportPath::Template {
            reason: TemplateReason::NoEvidence
        }
    );
    assert_eq!(report.footer.evidence_count, 0);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn missing_generation_key_degrades_to_template() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = write_corpus_file(&dir, "budget.json", CORPUS_JSON);
    config.generation.enabled = true;
    config.generation.api_key_env = "BUDGETQ_TEST_KEY_THAT_IS_NEVER_SET".to_string();

    let engine = BudgetEngine::from_config(config).expect("engine builds without a key");
    engine.load_corpus().await.expect("load corpus");

    let report = engine
        .ask("What is the VAT threshold?", &AskOptions::default())
        .await
        .unwrap();
    assert_eq!(
        report.path,
        ReportPath::Template {
            reason: TemplateReason::GenerationFailed
        }
    );
    assert_eq!(report.footer.evidence_count, 1);

    let unmatched = engine
        .ask("What changes to inheritance duties?", &AskOptions::default())
        .await
        .unwrap();
    assert_eq!(
        unmatched.path,
        ReportPath::Template {
            reason: TemplateReason::NoEvidence
        }
    );
}

#[tokio::test]
async fn blank_source_label_cites_unknown_source() {
    let (_dir, engine) = lexical_engine(None, GenerationSettings::default()).await;

    let report = engine
        .ask("corporation tax large companies", &AskOptions::default())
        .await
        .unwrap();

    assert_eq!(report.path, ReportPath::Extractive);
    assert_eq!(report.citations(), &["[1] Unknown source".to_string()]);
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let generator = FakeGenerator::new(vec![Reply::Transient]);
    let (_dir, engine) = lexical_engine(Some(generator.clone()), GenerationSettings::default()).await;

    let report = engine
        .ask("What is the VAT threshold?", &AskOptions::default())
        .await
        .unwrap();

    assert_eq!(report.path, ReportPath::Generated);
    assert_eq!(generator.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn hanging_generator_falls_back_to_template() {
    let generator = FakeGenerator::new(vec![Reply::Text("Summary."), Reply::Hang, Reply::Hang]);
    let settings = GenerationSettings {
        timeout: Duration::from_secs(5),
        retries: 1,
        ..GenerationSettings::default()
    };
    let (_dir, engine) = lexical_engine(Some(generator.clone()), settings).await;

    let report = engine
        .ask("What is the VAT threshold?", &AskOptions::default())
        .await
        .unwrap();

    assert_eq!(
        report.path,
        ReportPath::Template {
            reason: TemplateReason::GenerationFailed
        }
    );
    // Evidence existed even though elaboration failed.
    assert_eq!(report.footer.evidence_count, 1);
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn ask_before_load_is_not_ready() {
    let engine = BudgetEngine::new(
        AppConfig::default(),
        Arc::new(LexicalScorer::new()),
        assembler(None, GenerationSettings::default()),
    );

    let err = engine
        .ask("What is the VAT threshold?", &AskOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_ready());
}

#[tokio::test]
async fn malformed_corpus_is_sticky_failure() {
    let dir = TempDir::new().unwrap();
    let config = write_corpus_file(&dir, "broken.json", r#"[{"id": 1}]"#);
    let engine = BudgetEngine::new(
        config,
        Arc::new(LexicalScorer::new()),
        assembler(None, GenerationSettings::default()),
    );

    let err = engine.load_corpus().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::CorpusLoad(CorpusLoadError::Malformed { .. })
    ));
    assert!(matches!(engine.corpus_handle().state(), CorpusState::Failed(_)));

    let err = engine
        .ask("What is the VAT threshold?", &AskOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CorpusUnavailable(_)));
}

#[tokio::test]
async fn missing_corpus_file_fails_load() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.corpus.path = Some(dir.path().join("absent.json"));
    let engine = BudgetEngine::new(
        config,
        Arc::new(LexicalScorer::new()),
        assembler(None, GenerationSettings::default()),
    );

    let err = engine.load_corpus().await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::CorpusLoad(CorpusLoadError::Missing { .. })
    ));
}

#[tokio::test]
async fn jsonl_corpus_loads_with_positional_ids() {
    let dir = TempDir::new().unwrap();
    let config = write_corpus_file(
        &dir,
        "budget.jsonl",
        "{\"text\": \"Fuel duty is frozen.\"}\n\n{\"text\": \"The VAT threshold is unchanged.\"}\n",
    );
    let engine = BudgetEngine::new(
        config,
        Arc::new(LexicalScorer::new()),
        assembler(None, GenerationSettings::default()),
    );

    let corpus = engine.load_corpus().await.unwrap();
    assert_eq!(corpus.len(), 2);
    assert!(corpus.get(1).is_some());
    assert_eq!(engine.stats().unwrap().chunks, 2);
}

#[tokio::test]
async fn vector_scorer_rejects_dimension_mismatch() {
    let dir = TempDir::new().unwrap();
    let config = write_corpus_file(
        &dir,
        "embedded.json",
        r#"[{"id": 0, "text": "VAT", "embedding": [1.0, 0.0, 0.0]}]"#,
    );
    let scorer = VectorScorer::new(
        Arc::new(FixedEmbedding(vec![1.0, 0.0])),
        SimilarityMetric::Cosine,
        Duration::from_secs(5),
    )
    .unwrap();
    let engine = BudgetEngine::new(config, Arc::new(scorer), assembler(None, GenerationSettings::default()));
    engine.load_corpus().await.unwrap();

    let err = engine.ask("VAT", &AskOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::EmbeddingDimensionMismatch {
            expected: 3,
            found: 2
        }
    ));
}

#[tokio::test]
async fn vector_scorer_ranks_by_cosine() {
    let dir = TempDir::new().unwrap();
    let config = write_corpus_file(
        &dir,
        "embedded.json",
        r#"[
          {"id": 0, "text": "Fuel duty is frozen.", "embedding": [0.0, 1.0]},
          {"id": 1, "text": "The VAT threshold is unchanged.", "embedding": [1.0, 0.1], "source": "Red Book"}
        ]"#,
    );
    let scorer = VectorScorer::new(
        Arc::new(FixedEmbedding(vec![1.0, 0.0])),
        SimilarityMetric::Cosine,
        Duration::from_secs(5),
    )
    .unwrap();
    let engine = BudgetEngine::new(config, Arc::new(scorer), assembler(None, GenerationSettings::default()));
    engine.load_corpus().await.unwrap();

    let options = AskOptions {
        min_score: Some(0.5),
        ..AskOptions::default()
    };
    let report = engine.ask("VAT threshold", &options).await.unwrap();
    assert_eq!(report.citations(), &["[1] Red Book".to_string()]);
}

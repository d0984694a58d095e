//! Report assembly behind the sufficiency gate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use budgetq_model::{GenerationConfig, GenerationModel, GenerationRequest};

use super::audit::{AuditClock, AuditFooter, SystemClock};
use super::prompts::{section_prompt, GROUNDING_SYSTEM_PROMPT};
use super::template::{format_citations, no_evidence_sections, section, SectionKind, SectionSpec, REPORT_TEMPLATE};
use super::{ReportDocument, ReportPath, ReportSection, SectionBody, TemplateReason};
use crate::constants::{CONTEXT_SEPARATOR, EXTRACTIVE_AUDIENCE_STATEMENT, NO_FIGURES_STATEMENT};
use crate::errors::CoreError;
use crate::gate::{Sufficiency, SufficiencyGate};
use crate::model_adapter::generation_failure;
use crate::query::Query;
use crate::retrieval::RetrievalResult;

// ============================================================================
// GenerationSettings
// ============================================================================

/// Per-call limits for section generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    /// Timeout for a single section call.
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: u32,
}

impl GenerationSettings {
    /// Derive settings from the generation config.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            retries: config.retries,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

// ============================================================================
// ReportAssembler
// ============================================================================

/// How the narrative sections are produced.
#[derive(Debug, Clone)]
enum Generation {
    /// Extractive report from the evidence.
    Disabled,
    Ready(Arc<dyn GenerationModel>),
    /// Generation was requested but the model could not be built.
    Unavailable(String),
}

/// Builds a [`ReportDocument`] from a retrieval result.
///
/// Assembly never fails: generation problems degrade to the template, and a
/// partially generated report is never returned.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    title: String,
    generation: Generation,
    settings: GenerationSettings,
    clock: Arc<dyn AuditClock>,
}

impl ReportAssembler {
    /// Create an assembler without a generator (extractive when evidence exists).
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            generation: Generation::Disabled,
            settings: GenerationSettings::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `generator` for the narrative sections.
    pub fn with_generator(mut self, generator: Arc<dyn GenerationModel>, settings: GenerationSettings) -> Self {
        self.generation = Generation::Ready(generator);
        self.settings = settings;
        self
    }

    /// Mark generation as requested but unusable; sufficient evidence then
    /// yields the template with [`TemplateReason::GenerationFailed`].
    pub fn with_generation_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.generation = Generation::Unavailable(reason.into());
        self
    }

    /// Replace the audit clock.
    pub fn with_clock(mut self, clock: Arc<dyn AuditClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether a generator is configured.
    pub fn has_generator(&self) -> bool {
        matches!(self.generation, Generation::Ready(_))
    }

    /// Produce the report for `query` from `retrieval`.
    pub async fn assemble(&self, query: &Query, retrieval: &RetrievalResult<'_>) -> ReportDocument {
        let evidence_count = retrieval.evidence_count;

        if SufficiencyGate::evaluate(retrieval) == Sufficiency::Insufficient {
            info!("No usable evidence for query; using the template");
            return self.template_report(query, evidence_count, TemplateReason::NoEvidence);
        }

        let generator = match &self.generation {
            Generation::Ready(generator) => generator,
            Generation::Disabled => {
                info!("Generation disabled; building an extractive report from {} chunks", evidence_count);
                return self.extractive_report(query, retrieval);
            }
            Generation::Unavailable(reason) => {
                warn!("Generation unavailable ({}); falling back to the template", reason);
                return self.template_report(query, evidence_count, TemplateReason::GenerationFailed);
            }
        };

        let started = Instant::now();
        match self.generated_sections(generator.as_ref(), query, retrieval).await {
            Ok(sections) => {
                info!(
                    "Generated report from {} chunks in {}ms",
                    evidence_count,
                    started.elapsed().as_millis()
                );
                self.document(query, sections, evidence_count, ReportPath::Generated)
            }
            Err(e) => {
                warn!("{}; falling back to the template", e);
                self.template_report(query, evidence_count, TemplateReason::GenerationFailed)
            }
        }
    }

    fn document(
        &self,
        query: &Query,
        sections: Vec<ReportSection>,
        evidence_count: usize,
        path: ReportPath,
    ) -> ReportDocument {
        ReportDocument {
            title: self.title.clone(),
            query: query.as_str().to_string(),
            sections,
            footer: AuditFooter::stamp(self.clock.as_ref(), evidence_count),
            path,
        }
    }

    fn template_report(&self, query: &Query, evidence_count: usize, reason: TemplateReason) -> ReportDocument {
        self.document(
            query,
            no_evidence_sections(query),
            evidence_count,
            ReportPath::Template { reason },
        )
    }

    fn extractive_report(&self, query: &Query, retrieval: &RetrievalResult<'_>) -> ReportDocument {
        let texts: Vec<&str> = retrieval
            .chunks
            .iter()
            .map(|s| s.chunk.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        // Lead paragraph of the capped context; the gate guarantees one exists.
        let summary = retrieval
            .context_text
            .split(CONTEXT_SEPARATOR)
            .map(str::trim)
            .find(|p| !p.is_empty())
            .unwrap_or_default();

        let sections = REPORT_TEMPLATE
            .iter()
            .map(|spec| {
                let body = match (spec.number, spec.kind) {
                    (_, SectionKind::Question) => SectionBody::Text(query.as_str().to_string()),
                    (_, SectionKind::Citations) => SectionBody::List(format_citations(&retrieval.chunks)),
                    (2, _) => SectionBody::Text(summary.to_string()),
                    (3, _) => SectionBody::List(
                        texts
                            .iter()
                            .filter_map(|t| sentences(t).into_iter().next())
                            .map(str::to_string)
                            .collect(),
                    ),
                    (5, _) => {
                        let figures = figure_sentences(&texts);
                        if figures.is_empty() {
                            SectionBody::Text(NO_FIGURES_STATEMENT.to_string())
                        } else {
                            SectionBody::List(figures)
                        }
                    }
                    _ => SectionBody::Text(EXTRACTIVE_AUDIENCE_STATEMENT.to_string()),
                };
                section(spec, body)
            })
            .collect();

        self.document(query, sections, retrieval.evidence_count, ReportPath::Extractive)
    }

    async fn generated_sections(
        &self,
        generator: &dyn GenerationModel,
        query: &Query,
        retrieval: &RetrievalResult<'_>,
    ) -> Result<Vec<ReportSection>, CoreError> {
        let mut sections = Vec::with_capacity(REPORT_TEMPLATE.len());

        // Sequential: each section is its own bounded call.
        for spec in REPORT_TEMPLATE {
            let body = match spec.kind {
                SectionKind::Question => SectionBody::Text(query.as_str().to_string()),
                SectionKind::Citations => SectionBody::List(format_citations(&retrieval.chunks)),
                SectionKind::Generated { instruction, list } => {
                    let prompt = section_prompt(query.as_str(), spec.heading, instruction, list, &retrieval.context_text);
                    self.generate_section(generator, spec, prompt, list).await?
                }
            };
            sections.push(section(spec, body));
        }

        Ok(sections)
    }

    async fn generate_section(
        &self,
        generator: &dyn GenerationModel,
        spec: &SectionSpec,
        prompt: String,
        list: bool,
    ) -> Result<SectionBody, CoreError> {
        let request = GenerationRequest::new(GROUNDING_SYSTEM_PROMPT, prompt)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);
        let attempts = self.settings.retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let started = Instant::now();
            match tokio::time::timeout(self.settings.timeout, generator.complete(&request)).await {
                Ok(Ok(text)) => match parse_section_body(&text, list) {
                    Some(body) => {
                        debug!(
                            "Section '{}' generated on attempt {} in {}ms",
                            spec.heading,
                            attempt,
                            started.elapsed().as_millis()
                        );
                        return Ok(body);
                    }
                    None => last_error = "model returned empty output".to_string(),
                },
                Ok(Err(e)) if !e.is_transient() => return Err(generation_failure(spec.heading, &e)),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!(
                        "no answer within {}s",
                        self.settings.timeout.as_secs_f32()
                    )
                }
            }
            warn!(
                "Section '{}' attempt {}/{} failed: {}",
                spec.heading, attempt, attempts, last_error
            );
        }

        Err(CoreError::GenerationFailure {
            section: spec.heading.to_string(),
            reason: last_error,
        })
    }
}

// ============================================================================
// Body parsing
// ============================================================================

/// Turn model output into a section body; `None` when nothing usable remains.
pub(crate) fn parse_section_body(text: &str, list: bool) -> Option<SectionBody> {
    if list {
        let items: Vec<String> = text
            .lines()
            .map(strip_list_marker)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        (!items.is_empty()).then_some(SectionBody::List(items))
    } else {
        let text = text.trim();
        (!text.is_empty()).then(|| SectionBody::Text(text.to_string()))
    }
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim();
        }
    }
    if matches!(line, "-" | "*" | "•" | "+") {
        return "";
    }

    // "3. item" or "3) item"
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(item) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return item.trim();
        }
    }
    line
}

/// Split text into sentences, breaking after `.`, `!`, or `?` followed by
/// whitespace, and at newlines. Decimal points stay intact.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for line in text.lines() {
        let mut start = 0;
        let mut chars = line.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let at_break = matches!(c, '.' | '!' | '?')
                && chars.peek().map(|(_, next)| next.is_whitespace()).unwrap_or(false);
            if at_break {
                let end = i + c.len_utf8();
                let sentence = line[start..end].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = end;
            }
        }
        let tail = line[start..].trim();
        if !tail.is_empty() {
            out.push(tail);
        }
    }
    out
}

/// Sentences that mention a number, deduplicated, in evidence order.
fn figure_sentences(texts: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for text in texts {
        for sentence in sentences(text) {
            if sentence.chars().any(|c| c.is_ascii_digit()) && !out.iter().any(|s| s == sentence) {
                out.push(sentence.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NO_EVIDENCE_STATEMENT;
    use crate::corpus::{Corpus, EvidenceChunk};
    use crate::report::FixedClock;
    use crate::retrieval::ScoredChunk;
    use crate::test_support::{ScriptedGenerator, Step};
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<dyn AuditClock> {
        Arc::new(FixedClock {
            at: Utc.with_ymd_and_hms(2025, 11, 26, 10, 0, 0).unwrap(),
            nonce: 0xbeef,
        })
    }

    fn settings(retries: u32) -> GenerationSettings {
        GenerationSettings {
            timeout: Duration::from_secs(30),
            retries,
            temperature: 0.2,
            max_tokens: 300,
        }
    }

    fn query(text: &str) -> Query {
        Query::parse(text, 1000).unwrap()
    }

    fn vat_corpus() -> Corpus {
        Corpus::new(
            "c.json",
            vec![
                EvidenceChunk::new(0, "The VAT registration threshold will remain at £90,000 until 2026. Small firms benefit.")
                    .with_source_label("Budget Red Book, p.12"),
                EvidenceChunk::new(1, "Fuel duty is frozen."),
            ],
        )
        .unwrap()
    }

    fn retained<'a>(corpus: &'a Corpus, ids: &[u64]) -> RetrievalResult<'a> {
        let chunks: Vec<ScoredChunk<'a>> = ids
            .iter()
            .filter_map(|id| corpus.get(*id))
            .map(|chunk| ScoredChunk { chunk, score: 1.0 })
            .collect();
        let context_text = chunks
            .iter()
            .map(|s| s.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        RetrievalResult {
            evidence_count: chunks.len(),
            matched: chunks.len(),
            chunks,
            context_text,
            truncated: false,
        }
    }

    fn assembler(generator: &Arc<ScriptedGenerator>, retries: u32) -> ReportAssembler {
        ReportAssembler::new("Budget Briefing")
            .with_generator(generator.clone(), settings(retries))
            .with_clock(clock())
    }

    #[tokio::test]
    async fn test_insufficient_uses_template_without_generation() {
        let generator = Arc::new(ScriptedGenerator::always("should not be used"));
        let q = query("What changes to inheritance tax?");
        let report = assembler(&generator, 1)
            .assemble(&q, &RetrievalResult::empty())
            .await;

        assert_eq!(generator.call_count(), 0);
        assert_eq!(
            report.path,
            ReportPath::Template {
                reason: TemplateReason::NoEvidence
            }
        );
        assert_eq!(report.sections.len(), REPORT_TEMPLATE.len());
        assert_eq!(
            report.sections[0].body,
            SectionBody::Text("What changes to inheritance tax?".to_string())
        );
        for s in &report.sections[1..] {
            assert_eq!(s.body, SectionBody::Text(NO_EVIDENCE_STATEMENT.to_string()));
        }
        assert_eq!(report.footer.evidence_count, 0);
        assert_eq!(report.footer.registration_id.as_str(), "251126-BEEF-E00");
    }

    #[tokio::test]
    async fn test_insufficient_is_deterministic() {
        let generator = Arc::new(ScriptedGenerator::always("unused"));
        let a = assembler(&generator, 1);
        let q = query("inheritance tax");
        let first = a.assemble(&q, &RetrievalResult::empty()).await;
        let second = a.assemble(&q, &RetrievalResult::empty()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_sufficient_generates_every_narrative_section() {
        let corpus = vat_corpus();
        let retrieval = retained(&corpus, &[0]);
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Step::Reply("The threshold stays at £90,000."),
            Step::Reply("- Threshold frozen\n- Applies until 2026"),
            Step::Reply("Small firms."),
            Step::Reply("1. £90,000\n2) 2026"),
        ]));
        let report = assembler(&generator, 1)
            .assemble(&query("What is the VAT threshold?"), &retrieval)
            .await;

        assert_eq!(report.path, ReportPath::Generated);
        assert_eq!(generator.call_count(), 4);
        assert_eq!(
            report.section(3).unwrap().body,
            SectionBody::List(vec!["Threshold frozen".to_string(), "Applies until 2026".to_string()])
        );
        assert_eq!(
            report.section(5).unwrap().body,
            SectionBody::List(vec!["£90,000".to_string(), "2026".to_string()])
        );
        assert_eq!(report.citations(), &["[1] Budget Red Book, p.12".to_string()]);
        assert_eq!(report.footer.evidence_count, 1);

        let prompts = generator.prompts();
        assert!(prompts.iter().all(|p| p.contains("£90,000 until 2026")));
        assert!(prompts[0].contains("\"Summary\""));
    }

    #[tokio::test]
    async fn test_retry_once_then_success() {
        let corpus = vat_corpus();
        let retrieval = retained(&corpus, &[0]);
        let generator = Arc::new(
            ScriptedGenerator::new(vec![Step::Fail, Step::Reply("Recovered summary.")]).with_fallback("ok"),
        );
        let report = assembler(&generator, 1)
            .assemble(&query("VAT threshold"), &retrieval)
            .await;

        assert_eq!(report.path, ReportPath::Generated);
        assert_eq!(
            report.section(2).unwrap().body,
            SectionBody::Text("Recovered summary.".to_string())
        );
        assert_eq!(generator.call_count(), 5);
    }

    #[tokio::test]
    async fn test_empty_output_counts_as_failure() {
        let corpus = vat_corpus();
        let retrieval = retained(&corpus, &[0]);
        let generator = Arc::new(ScriptedGenerator::new(vec![Step::Reply("  \n "), Step::Reply("   ")]));
        let report = assembler(&generator, 1)
            .assemble(&query("VAT threshold"), &retrieval)
            .await;

        assert_eq!(
            report.path,
            ReportPath::Template {
                reason: TemplateReason::GenerationFailed
            }
        );
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back_to_template_with_evidence_count() {
        let corpus = vat_corpus();
        let retrieval = retained(&corpus, &[0, 1]);
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Step::Delay(Duration::from_secs(600), "too late"),
            Step::Delay(Duration::from_secs(600), "too late"),
        ]));
        let report = assembler(&generator, 1)
            .assemble(&query("VAT threshold"), &retrieval)
            .await;

        assert!(report.is_template());
        assert_eq!(
            report.path,
            ReportPath::Template {
                reason: TemplateReason::GenerationFailed
            }
        );
        // No partial sections leak through.
        for s in &report.sections[1..] {
            assert_eq!(s.body, SectionBody::Text(NO_EVIDENCE_STATEMENT.to_string()));
        }
        assert_eq!(report.footer.evidence_count, 2);
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_late_section_failure_discards_earlier_sections() {
        let corpus = vat_corpus();
        let retrieval = retained(&corpus, &[0]);
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Step::Reply("Summary ok."),
            Step::Reply("- measure"),
            Step::Fail,
            Step::Fail,
        ]));
        let report = assembler(&generator, 1)
            .assemble(&query("VAT threshold"), &retrieval)
            .await;
        assert!(report.is_template());
        assert_eq!(
            report.section(2).unwrap().body,
            SectionBody::Text(NO_EVIDENCE_STATEMENT.to_string())
        );
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let corpus = vat_corpus();
        let retrieval = retained(&corpus, &[0]);
        let generator = Arc::new(ScriptedGenerator::new(vec![Step::Fatal]).with_fallback("unused"));
        let report = assembler(&generator, 3)
            .assemble(&query("VAT threshold"), &retrieval)
            .await;
        assert!(report.is_template());
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_extractive_report_without_generator() {
        let corpus = vat_corpus();
        let retrieval = retained(&corpus, &[0, 1]);
        let report = ReportAssembler::new("Budget Briefing")
            .with_clock(clock())
            .assemble(&query("VAT threshold"), &retrieval)
            .await;

        assert_eq!(report.path, ReportPath::Extractive);
        assert_eq!(
            report.section(3).unwrap().body,
            SectionBody::List(vec![
                "The VAT registration threshold will remain at £90,000 until 2026.".to_string(),
                "Fuel duty is frozen.".to_string(),
            ])
        );
        assert_eq!(
            report.section(5).unwrap().body,
            SectionBody::List(vec![
                "The VAT registration threshold will remain at £90,000 until 2026.".to_string()
            ])
        );
        assert_eq!(
            report.citations(),
            &["[1] Budget Red Book, p.12".to_string(), "[2] Unknown source".to_string()]
        );
        assert_eq!(report.footer.evidence_count, 2);
    }

    #[tokio::test]
    async fn test_unavailable_generation_falls_back_to_template() {
        let corpus = vat_corpus();
        let retrieval = retained(&corpus, &[0]);
        let assembler = ReportAssembler::new("Budget Briefing")
            .with_generation_unavailable("API key not found")
            .with_clock(clock());
        assert!(!assembler.has_generator());

        let report = assembler.assemble(&query("VAT threshold"), &retrieval).await;
        assert_eq!(
            report.path,
            ReportPath::Template {
                reason: TemplateReason::GenerationFailed
            }
        );
        assert_eq!(report.footer.evidence_count, 1);

        // The gate still decides first.
        let empty = assembler.assemble(&query("VAT threshold"), &RetrievalResult::empty()).await;
        assert_eq!(
            empty.path,
            ReportPath::Template {
                reason: TemplateReason::NoEvidence
            }
        );
    }

    #[tokio::test]
    async fn test_extractive_summary_uses_capped_context_and_skips_blank_chunks() {
        let corpus = Corpus::new(
            "c.json",
            vec![
                EvidenceChunk::new(0, "   "),
                EvidenceChunk::new(1, "Fuel duty is frozen for twelve months."),
            ],
        )
        .unwrap();
        let mut retrieval = retained(&corpus, &[0, 1]);
        let summary = ReportAssembler::new("Budget Briefing")
            .with_clock(clock())
            .assemble(&query("fuel duty"), &retrieval)
            .await;
        assert_eq!(
            summary.section(2).unwrap().body,
            SectionBody::Text("Fuel duty is frozen for twelve months.".to_string())
        );
        assert_eq!(
            summary.section(3).unwrap().body,
            SectionBody::List(vec!["Fuel duty is frozen for twelve months.".to_string()])
        );

        // A context cut at the character cap bounds the summary too.
        retrieval.context_text = "   \n\nFuel duty".to_string();
        retrieval.truncated = true;
        let capped = ReportAssembler::new("Budget Briefing")
            .with_clock(clock())
            .assemble(&query("fuel duty"), &retrieval)
            .await;
        assert_eq!(capped.section(2).unwrap().body, SectionBody::Text("Fuel duty".to_string()));
    }

    #[test]
    fn test_parse_section_body() {
        assert_eq!(parse_section_body("  hello \n", false), Some(SectionBody::Text("hello".to_string())));
        assert_eq!(parse_section_body(" \n ", false), None);
        assert_eq!(
            parse_section_body("• one\n\n* two\n+ three\n10. ten\nplain", true),
            Some(SectionBody::List(vec![
                "one".to_string(),
                "two".to_string(),
                "three".to_string(),
                "ten".to_string(),
                "plain".to_string(),
            ]))
        );
        assert_eq!(parse_section_body("-\n*\n", true), None);
    }

    #[test]
    fn test_sentences_keep_decimals() {
        assert_eq!(
            sentences("Spending rises by £1.5 billion. Borrowing falls! Why?\nNext line"),
            vec!["Spending rises by £1.5 billion.", "Borrowing falls!", "Why?", "Next line"]
        );
    }
}

//! Report document model, template, and assembly.
//!
//! This module provides:
//! - [`ReportDocument`] - the final multi-section report
//! - [`ReportAssembler`] - turns a retrieval result into a report
//! - [`AuditFooter`] / [`RegistrationId`] - the locally computed footer
//! - [`REPORT_TEMPLATE`] - the fixed section layout
//!
//! ## Paths
//!
//! | Gate          | Generator           | Path                             |
//! |---------------|---------------------|----------------------------------|
//! | Insufficient  | any                 | `template` (`no_evidence`)       |
//! | Sufficient    | none configured     | `extractive`                     |
//! | Sufficient    | could not be built  | `template` (`generation_failed`) |
//! | Sufficient    | all sections ok     | `generated`                      |
//! | Sufficient    | a section failed    | `template` (`generation_failed`) |

mod assembler;
mod audit;
mod prompts;
mod template;

use std::fmt::Write as _;

use serde::Serialize;

pub use assembler::{GenerationSettings, ReportAssembler};
pub use audit::{AuditClock, AuditFooter, FixedClock, RegistrationId, SystemClock};
pub use prompts::{section_prompt, GROUNDING_SYSTEM_PROMPT};
pub use template::{
    format_citations, no_evidence_sections, SectionKind, SectionSpec, AUDIT_HEADING,
    AUDIT_SECTION_NUMBER, REPORT_TEMPLATE,
};

// ============================================================================
// Document model
// ============================================================================

/// Body of a report section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SectionBody {
    /// Prose.
    Text(String),
    /// Bulleted items.
    List(Vec<String>),
}

/// One numbered report section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    /// 1-based position.
    pub number: usize,
    /// Heading text.
    pub heading: String,
    /// Body.
    pub body: SectionBody,
}

/// Why the template was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateReason {
    /// Retrieval produced no usable evidence.
    NoEvidence,
    /// Evidence existed but a generated section failed after retries.
    GenerationFailed,
}

/// Which gate path produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportPath {
    /// Every narrative section came from the generation capability.
    Generated,
    /// Generation is disabled; narrative sections quote the evidence.
    Extractive,
    /// Fixed "no evidence" wording.
    Template {
        /// Why the template was used.
        reason: TemplateReason,
    },
}

/// The final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    /// Report title.
    pub title: String,
    /// The normalised question.
    pub query: String,
    /// Content sections, numbered from 1.
    pub sections: Vec<ReportSection>,
    /// Audit footer, the final numbered part.
    pub footer: AuditFooter,
    /// Producing path.
    pub path: ReportPath,
}

impl ReportDocument {
    /// Section by number.
    pub fn section(&self, number: usize) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.number == number)
    }

    /// The citation entries, empty when the report carries no evidence.
    pub fn citations(&self) -> &[String] {
        self.sections
            .iter()
            .rev()
            .find_map(|s| match &s.body {
                SectionBody::List(items) if s.heading == template::CITATIONS_HEADING => {
                    Some(items.as_slice())
                }
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Whether the report was produced by the fixed template.
    pub fn is_template(&self) -> bool {
        matches!(self.path, ReportPath::Template { .. })
    }

    /// Render as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        for section in &self.sections {
            let _ = writeln!(out, "## {}. {}\n", section.number, section.heading);
            match &section.body {
                SectionBody::Text(text) => {
                    let _ = writeln!(out, "{}\n", text);
                }
                SectionBody::List(items) => {
                    for item in items {
                        let _ = writeln!(out, "- {}", item);
                    }
                    out.push('\n');
                }
            }
        }
        let _ = writeln!(out, "## {}. {}\n", AUDIT_SECTION_NUMBER, AUDIT_HEADING);
        let _ = writeln!(out, "- Generated: {}", self.footer.timestamp_iso);
        let _ = writeln!(out, "- Registration: {}", self.footer.registration_id);
        let _ = writeln!(out, "- Evidence chunks: {}", self.footer.evidence_count);
        out
    }

    /// Render as plain text.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}\n", "=".repeat(self.title.chars().count()));
        for section in &self.sections {
            let _ = writeln!(out, "{}. {}", section.number, section.heading);
            match &section.body {
                SectionBody::Text(text) => {
                    for line in text.lines() {
                        let _ = writeln!(out, "   {}", line);
                    }
                }
                SectionBody::List(items) => {
                    for item in items {
                        let _ = writeln!(out, "   * {}", item);
                    }
                }
            }
            out.push('\n');
        }
        let _ = writeln!(out, "{}. {}", AUDIT_SECTION_NUMBER, AUDIT_HEADING);
        let _ = writeln!(out, "   Generated:       {}", self.footer.timestamp_iso);
        let _ = writeln!(out, "   Registration:    {}", self.footer.registration_id);
        let _ = writeln!(out, "   Evidence chunks: {}", self.footer.evidence_count);
        out
    }
}

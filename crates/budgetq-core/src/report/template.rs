//! The fixed report template.
//!
//! Section order, numbering, and headings never vary between paths; only
//! the bodies differ.

use crate::constants::{NO_EVIDENCE_STATEMENT, UNKNOWN_SOURCE_LABEL};
use crate::query::Query;
use crate::retrieval::ScoredChunk;

use super::{ReportSection, SectionBody};

/// How a section's body is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Restated query.
    Question,
    /// Requested from the generation capability.
    Generated {
        /// What the section should contain.
        instruction: &'static str,
        /// Whether the body is a list.
        list: bool,
    },
    /// Source citations of the retained chunks.
    Citations,
}

/// One entry of the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    /// 1-based position in the report.
    pub number: usize,
    /// Section heading.
    pub heading: &'static str,
    /// Body source.
    pub kind: SectionKind,
}

impl SectionSpec {
    /// Whether the body is rendered as a list.
    pub fn is_list(&self) -> bool {
        matches!(
            self.kind,
            SectionKind::Generated { list: true, .. } | SectionKind::Citations
        )
    }
}

/// Heading of the citation section.
pub(crate) const CITATIONS_HEADING: &str = "Sources";

/// Content sections, in order. The audit footer follows as the final part.
pub const REPORT_TEMPLATE: &[SectionSpec] = &[
    SectionSpec {
        number: 1,
        heading: "Question",
        kind: SectionKind::Question,
    },
    SectionSpec {
        number: 2,
        heading: "Summary",
        kind: SectionKind::Generated {
            instruction: "Summarise what the budget documents say in answer to the question, in one or two short paragraphs.",
            list: false,
        },
    },
    SectionSpec {
        number: 3,
        heading: "Key Measures",
        kind: SectionKind::Generated {
            instruction: "List the specific policy measures relevant to the question, one measure per line.",
            list: true,
        },
    },
    SectionSpec {
        number: 4,
        heading: "Who Is Affected",
        kind: SectionKind::Generated {
            instruction: "Describe which households, businesses, or groups the relevant measures affect.",
            list: false,
        },
    },
    SectionSpec {
        number: 5,
        heading: "Figures and Dates",
        kind: SectionKind::Generated {
            instruction: "List the amounts, rates, thresholds, and effective dates relevant to the question, one per line, exactly as written in the context.",
            list: true,
        },
    },
    SectionSpec {
        number: 6,
        heading: CITATIONS_HEADING,
        kind: SectionKind::Citations,
    },
];

/// Number of the audit footer part.
pub const AUDIT_SECTION_NUMBER: usize = REPORT_TEMPLATE.len() + 1;

/// Heading of the audit footer part.
pub const AUDIT_HEADING: &str = "Audit";

/// Format the citation list, one entry per chunk in ranked order.
pub fn format_citations(chunks: &[ScoredChunk<'_>]) -> Vec<String> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let label = s
                .chunk
                .source_label
                .as_deref()
                .unwrap_or(UNKNOWN_SOURCE_LABEL);
            format!("[{}] {}", i + 1, label)
        })
        .collect()
}

/// Build a section from its template entry.
pub(crate) fn section(spec: &SectionSpec, body: SectionBody) -> ReportSection {
    ReportSection {
        number: spec.number,
        heading: spec.heading.to_string(),
        body,
    }
}

/// The "no evidence" sections: the query, then the fixed statement everywhere.
pub fn no_evidence_sections(query: &Query) -> Vec<ReportSection> {
    REPORT_TEMPLATE
        .iter()
        .map(|spec| {
            let body = match spec.kind {
                SectionKind::Question => SectionBody::Text(query.as_str().to_string()),
                _ => SectionBody::Text(NO_EVIDENCE_STATEMENT.to_string()),
            };
            section(spec, body)
        })
        .collect()
}

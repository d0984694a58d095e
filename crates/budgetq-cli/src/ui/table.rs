//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `budgetq retrieve` | `render_evidence_table()` |
//! | `budgetq corpus stats` | `render_metrics_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use super::format::{one_line, truncate_str};

/// One retained chunk for display.
#[derive(Debug, Clone)]
pub struct EvidenceRow {
    /// 1-based rank.
    pub rank: usize,
    /// Chunk id.
    pub id: u64,
    /// Formatted score.
    pub score: String,
    /// Source label, or the unknown-source placeholder.
    pub source: String,
    /// Chunk text.
    pub text: String,
}

/// Render ranked evidence for `budgetq retrieve`.
///
/// The TEXT column is cut so the table fits in `width` columns.
///
/// # Example Output
///
/// ```text
/// #   ID   SCORE   SOURCE                  TEXT
/// 1    0   2       Budget Red Book, p.12   The VAT registration threshold will...
/// ```
pub fn render_evidence_table(rows: &[EvidenceRow], width: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("ID").set_alignment(CellAlignment::Right),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("SOURCE"),
        Cell::new("TEXT"),
    ]);

    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(2)),  // #
        ColumnConstraint::LowerBoundary(Width::Fixed(4)),  // ID
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),  // SCORE
        ColumnConstraint::LowerBoundary(Width::Fixed(10)), // SOURCE
    ]);

    let text_width = width.saturating_sub(50).max(20);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.rank).set_alignment(CellAlignment::Right),
            Cell::new(row.id).set_alignment(CellAlignment::Right),
            Cell::new(&row.score).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(&row.source, 28)),
            Cell::new(truncate_str(&one_line(&row.text), text_width)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render a two-column key/value table.
pub fn render_metrics_table(metrics: &[(&str, String)]) -> String {
    if metrics.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("METRIC"),
        Cell::new("VALUE").set_alignment(CellAlignment::Right),
    ]);

    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(18)), // METRIC
        ColumnConstraint::LowerBoundary(Width::Fixed(12)), // VALUE
    ]);

    for (key, value) in metrics {
        table.add_row(vec![
            Cell::new(*key),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

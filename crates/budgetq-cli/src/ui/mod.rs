//! # CLI UI Module
//!
//! Styling and formatting layer for budgetq output.
//!
//! Reports and evidence go to stdout; errors and progress go to stderr so
//! `budgetq ask ... > report.md` captures only the report.
//!
//! ## Module Structure
//!
//! - `color`: Color mode detection and terminal capability checks
//! - `style`: Message types, prefixes, and styling functions
//! - `format`: Utility formatters (counts, time, truncation)
//! - `table`: Evidence and corpus tables with comfy-table
//! - `progress`: Spinners and bars for model calls

pub mod color;
pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use progress::{Progress, ProgressMode};
pub use style::{MessageType, Style};

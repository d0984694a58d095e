//! # budgetq CLI
//!
//! Command-line interface for the budget question engine.
//!
//! This binary provides human-friendly access to `budgetq-core` functionality.
//! Run `budgetq --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}

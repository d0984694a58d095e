//! Shared test utilities for budgetq-cli integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// A small corpus with one VAT chunk, one fuel duty chunk, and one unlabeled chunk.
pub const BUDGET_CORPUS: &str = r#"[
  {"id": 0, "text": "The VAT registration threshold will remain at £90,000 until March 2026.", "sourceLabel": "Budget Red Book, p.12"},
  {"id": 1, "text": "Fuel duty is frozen for twelve months.", "sourceLabel": "Budget Red Book, p.30"},
  {"id": 2, "text": "Corporation tax stays at 25 per cent for large companies."}
]"#;

/// Get a Command for the budgetq binary, isolated from the user's home and env.
///
/// # Panics
///
/// Panics if the budgetq binary cannot be found.
#[allow(deprecated)]
pub fn budgetq_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("budgetq").expect("budgetq binary should exist");
    cmd.env("HOME", home)
        .env_remove("BUDGETQ_CONFIG")
        .env_remove("BUDGETQ_CORPUS")
        .env_remove("BUDGETQ_VERBOSE")
        .env("NO_COLOR", "1");
    cmd
}

/// A temp dir holding the sample corpus and a config that disables generation.
pub struct Fixture {
    pub dir: TempDir,
    pub corpus: PathBuf,
    pub config: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config("generation:\n  enabled: false\n")
    }

    pub fn with_config(yaml: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let corpus = dir.path().join("budget_corpus.json");
        fs::write(&corpus, BUDGET_CORPUS).expect("write corpus");
        let config = dir.path().join("config.yaml");
        fs::write(&config, yaml).expect("write config");
        Self { dir, corpus, config }
    }

    /// Command with `--config` and `--corpus` pointing into the fixture.
    pub fn cmd(&self) -> Command {
        let mut cmd = budgetq_cmd(self.dir.path());
        cmd.arg("--config").arg(&self.config).arg("--corpus").arg(&self.corpus);
        cmd
    }
}

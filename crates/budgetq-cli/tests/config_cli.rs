//! `budgetq config` commands and global flag handling.

mod common;

use predicates::prelude::*;

use common::{budgetq_cmd, Fixture};

#[test]
fn config_check_defaults_without_file() {
    let home = tempfile::TempDir::new().unwrap();

    budgetq_cmd(home.path())
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn config_check_rejects_zero_top_k() {
    let fixture = Fixture::with_config("retrieval:\n  topK: 0\n");

    fixture
        .cmd()
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn config_check_rejects_unparsable_yaml() {
    let fixture = Fixture::with_config("retrieval: [unclosed\n");

    fixture
        .cmd()
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config parse error"));
}

#[test]
fn explicit_missing_config_is_an_error() {
    let home = tempfile::TempDir::new().unwrap();

    budgetq_cmd(home.path())
        .args(["--config", "/nonexistent/budgetq.yaml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn config_show_applies_corpus_flag() {
    let fixture = Fixture::with_config("retrieval:\n  topK: 3\n");

    let output = fixture
        .cmd()
        .args(["config", "show", "--json"])
        .output()
        .expect("run budgetq");
    assert!(output.status.success());

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(config["retrieval"]["topK"], 3);
    assert_eq!(
        config["corpus"]["path"].as_str(),
        fixture.corpus.to_str()
    );
}

#[test]
fn corpus_env_var_is_honoured() {
    let fixture = Fixture::new();

    budgetq_cmd(fixture.dir.path())
        .arg("--config")
        .arg(&fixture.config)
        .env("BUDGETQ_CORPUS", &fixture.corpus)
        .args(["corpus", "stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"chunks\": 3"));
}

#[test]
fn version_flag() {
    let home = tempfile::TempDir::new().unwrap();

    budgetq_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("budgetq"));
}

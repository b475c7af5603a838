// End-to-end tests for the `tally` binary: exit codes, the --json stdout
// contract, and the evidence bundle on disk.
//
// Run with: cargo test -p tally-cli --test cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

fn tally() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tally"))
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

/// Ledger (CSV) and bank (JSON, remapped field names). INV-3 is missing from
/// the bank; INV-2 matches only after bankers rounding of 250.005.
fn fixture(dir: &Path, extra_input: &str) {
    write(
        dir,
        "ledger.csv",
        "id,reference,amount,currency,timestamp\n\
         L1,INV-1,100.00,USD,2026-01-15\n\
         L2,INV-2,250.005,USD,2026-01-16 09:30:00\n\
         L3,INV-3,75.50,USD,2026-01-17\n",
    );
    write(
        dir,
        "bank.json",
        r#"{"records": [
  {"txn": "B1", "reference": "INV-1", "value": 100, "currency": "USD", "timestamp": "2026-01-15T10:00:00Z"},
  {"txn": "B2", "reference": "INV-2", "value": "250.00", "currency": "USD"}
]}"#,
    );
    write(
        dir,
        "ruleset.json",
        r#"{"sources": ["ledger", "bank"], "key_fields": ["reference"], "amount_field": "amount"}"#,
    );
    write(dir, "mapping.json", r#"{"sources": {"bank": {"id": "txn", "amount": "value"}}}"#);
    write(
        dir,
        "engine_input.json",
        &format!(
            r#"{{"input_files": ["ledger.csv", "bank.json"], "ruleset_path": "ruleset.json",
  "mapping_config_path": "mapping.json", "output_dir": "out", "mode": "ci"{extra_input}}}"#
        ),
    );
}

fn run(args: &[&str]) -> Output {
    tally().args(args).output().expect("run tally")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ===========================================================================
// tally run
// ===========================================================================

#[test]
fn run_writes_bundle_and_reports_missing_record() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(output.stdout.is_empty(), "no stdout without --json");

    let err = stderr(&output);
    assert!(err.contains("5 records normalized, 0 skipped, 0 warnings"), "stderr: {err}");
    assert!(err.contains("variances: 1 (0 amount mismatches, 1 missing records)"), "stderr: {err}");

    let out = dir.path().join("out");
    for rel in [
        "engine_output.json",
        "evidence/normalized.jsonl",
        "evidence/variances.jsonl",
        "evidence/logs/engine.log",
        "evidence/manifest.json",
    ] {
        assert!(out.join(rel).is_file(), "{rel} should exist");
    }

    let variances = std::fs::read_to_string(out.join("evidence/variances.jsonl")).unwrap();
    assert_eq!(
        variances,
        "{\"key\":\"reference=INV-3\",\"type\":\"missing_record\",\"currency\":\"USD\",\
         \"amounts_by_source\":[{\"source\":\"ledger\",\"amount_minor_units\":7550}],\
         \"missing_sources\":[\"bank\"]}\n"
    );
}

#[test]
fn run_json_prints_single_output_document() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let val: serde_json::Value = serde_json::from_str(stdout.trim()).expect("stdout is one JSON value");
    assert_eq!(val["schema_version"], "1.0.0");
    assert_eq!(val["normalization_summary"]["records_processed"], 5);
    assert_eq!(val["variance_summary"]["total"], 1);
    assert_eq!(val["variance_summary"]["counts_by_type"]["missing_record"], 1);
    assert_eq!(val["variance_summary"]["counts_by_type"]["amount_mismatch"], 0);
    assert_eq!(val["normalized_records_path"], "evidence/normalized.jsonl");
    assert_eq!(val["evidence_manifest"]["generated_at"], "1970-01-01T00:00:00Z");
    assert_eq!(val["evidence_manifest"]["files"].as_array().unwrap().len(), 3);

    // stdout matches the file written to disk
    let on_disk: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("out/engine_output.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(val, on_disk);
}

#[test]
fn fail_on_variance_exits_3_after_writing_evidence() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap(), "--fail-on-variance"]);
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("error: 1 variances found"));
    assert!(dir.path().join("out/evidence/manifest.json").is_file());
}

#[test]
fn half_up_turns_rounding_into_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), r#", "rounding_mode": "half_up""#);
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(val["variance_summary"]["counts_by_type"]["amount_mismatch"], 1);
    assert!(val["deterministic_statement"]
        .as_str()
        .unwrap()
        .contains("rounding mode half_up"));
}

#[test]
fn unsupported_rounding_is_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), r#", "rounding_mode": "floor""#);
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("error: unsupported rounding_mode: floor"));
    assert!(!dir.path().join("out").exists(), "nothing written on config errors");
}

#[test]
fn unreadable_input_file_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    std::fs::remove_file(dir.path().join("bank.json")).unwrap();
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("bank.json"));
}

#[test]
fn output_dir_that_is_a_file_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    write(dir.path(), "out", "not a directory\n");
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));
    let err = stderr(&output);
    assert!(err.contains(&dir.path().join("out").display().to_string()), "stderr: {err}");
    assert!(err.contains("hint:  check that output_dir is writable"), "stderr: {err}");
    assert_eq!(std::fs::read_to_string(dir.path().join("out")).unwrap(), "not a directory\n");
}

#[test]
fn output_dir_below_a_file_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    write(dir.path(), "blocker", "");
    write(
        dir.path(),
        "engine_input.json",
        r#"{"input_files": ["ledger.csv", "bank.json"], "ruleset_path": "ruleset.json",
  "mapping_config_path": "mapping.json", "output_dir": "blocker/out", "mode": "ci"}"#,
    );
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("blocker"), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("blocker/out/evidence/manifest.json").exists());
}

#[test]
fn unwritable_artifact_leaves_no_manifest() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    let input = dir.path().join("engine_input.json");
    assert!(run(&["run", input.to_str().unwrap()]).status.success());

    // A directory where the normalized records file belongs cannot be created as a file
    let out = dir.path().join("out");
    let normalized = out.join("evidence/normalized.jsonl");
    std::fs::remove_file(&normalized).unwrap();
    std::fs::create_dir(&normalized).unwrap();

    let output = run(&["run", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("normalized.jsonl"), "stderr: {}", stderr(&output));
    assert!(!out.join("evidence/manifest.json").exists(), "stale manifest removed");
}

#[test]
fn malformed_engine_input_is_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "engine_input.json", "{ not json");
    let input = dir.path().join("engine_input.json");

    let output = run(&["run", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).starts_with("error: config parse error: engine input"));
}

#[test]
fn missing_subcommand_is_usage_error() {
    let output = run(&[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unknown_flag_is_usage_error() {
    let output = run(&["run", "engine_input.json", "--no-such-flag"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--no-such-flag"));
}

#[test]
fn version_flag_exits_cleanly() {
    let output = run(&["--version"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("tally "));
}

// ===========================================================================
// tally validate
// ===========================================================================

#[test]
fn validate_reports_resolved_sources() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    let input = dir.path().join("engine_input.json");

    let output = run(&["validate", input.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let err = stderr(&output);
    assert!(err.contains("valid: 2 input file(s), sources: ledger, bank"), "stderr: {err}");
    assert!(err.contains("rounding bankers, timezone UTC, mode ci"), "stderr: {err}");
    assert!(!dir.path().join("out").exists(), "validate writes nothing");
}

#[test]
fn validate_rejects_empty_key_fields() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    write(dir.path(), "ruleset.json", r#"{"key_fields": [], "amount_field": "amount"}"#);
    let input = dir.path().join("engine_input.json");

    let output = run(&["validate", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("key_fields must not be empty"));
}

// ===========================================================================
// tally verify
// ===========================================================================

#[test]
fn verify_passes_then_detects_tampering() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path(), "");
    let input = dir.path().join("engine_input.json");
    assert!(run(&["run", input.to_str().unwrap()]).status.success());

    let out = dir.path().join("out");
    let output = run(&["verify", out.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("verified: 3 file(s) match the manifest"));

    let normalized = out.join("evidence/normalized.jsonl");
    let mut text = std::fs::read_to_string(&normalized).unwrap();
    text = text.replacen("10000", "10001", 1);
    std::fs::write(&normalized, text).unwrap();

    let output = run(&["verify", out.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(6));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ok"], false);
    assert_eq!(report["files_checked"], 3);
    assert_eq!(report["problems"][0]["problem"], "digest_mismatch");
    assert_eq!(report["problems"][0]["path"], "evidence/normalized.jsonl");
}

#[test]
fn verify_without_manifest_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&["verify", dir.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));
    assert!(stderr(&output).contains("hint:"));
}

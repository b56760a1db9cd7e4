//! CLI smoke tests for the offline analyses.

use assert_cmd::Command;
use predicates::prelude::*;

fn ivg() -> Command {
    Command::cargo_bin("ivg").expect("ivg binary")
}

#[test]
fn analyze_timings_flags_consistent_pattern() {
    let input = r#"[
        {"question_index": 0, "time_spent_ms": 500},
        {"question_index": 1, "time_spent_ms": 520},
        {"question_index": 2, "time_spent_ms": 510},
        {"question_index": 3, "time_spent_ms": 505},
        {"question_index": 4, "time_spent_ms": 515},
        {"question_index": 5, "time_spent_ms": 495}
    ]"#;

    ivg()
        .arg("analyze-timings")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("suspicious: yes"))
        .stdout(predicate::str::contains("consistent timing"));
}

#[test]
fn analyze_timings_passes_normal_spread() {
    let input = r#"[
        {"question_index": 0, "time_spent_ms": 30000},
        {"question_index": 1, "time_spent_ms": 45000},
        {"question_index": 2, "time_spent_ms": 61000}
    ]"#;

    ivg()
        .arg("analyze-timings")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("suspicious: no"));
}

#[test]
fn analyze_timings_rejects_malformed_input() {
    ivg()
        .arg("analyze-timings")
        .write_stdin("not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid timing input"));
}

#[test]
fn validate_env_reports_headless_browser() {
    let input = r#"{
        "user_agent": "Mozilla/5.0 (HeadlessChrome)",
        "plugins": [],
        "screen_resolution": "640x480",
        "timezone": "UTC",
        "fingerprint": "fp"
    }"#;

    ivg()
        .arg("validate-env")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid: no"))
        .stdout(predicate::str::contains("risk score: 50"))
        .stdout(predicate::str::contains("block_session_start"));
}

#[test]
fn validate_env_json_output_includes_risk_score() {
    let input = r#"{
        "user_agent": "Mozilla/5.0 (Macintosh) Safari/605.1.15",
        "plugins": [],
        "screen_resolution": "1920x1080",
        "timezone": "UTC",
        "fingerprint": "fp"
    }"#;

    ivg()
        .args(["--json", "validate-env"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"))
        .stdout(predicate::str::contains("\"risk_score\": 0"));
}

#[test]
fn lockdown_uses_defaults_without_config() {
    ivg()
        .arg("lockdown")
        .assert()
        .success()
        .stdout(predicate::str::contains("disable_copy_paste: true"))
        .stdout(predicate::str::contains("require_fullscreen: false"));
}

#[test]
fn lockdown_reads_toml_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anticheat.toml");
    std::fs::write(&path, "require_fullscreen = true\nshuffle_questions = true\n").unwrap();

    ivg()
        .args(["--json", "lockdown", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"require_fullscreen\": true"))
        .stdout(predicate::str::contains("\"shuffle_questions\": true"));
}

#[test]
fn lockdown_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anticheat.toml");
    std::fs::write(&path, "max_violations_allowed = 0\n").unwrap();

    ivg()
        .args(["lockdown", "--config"])
        .arg(&path)
        .assert()
        .failure();
}

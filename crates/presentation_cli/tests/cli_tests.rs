//! End-to-end tests of the audiobatch binary
//!
//! Only commands that never reach the speech service are exercised here;
//! conversion runs are covered by the infrastructure pipeline tests.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn audiobatch(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_audiobatch"))
        .current_dir(cwd)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("AUDIOBATCH_CONFIG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("in")).unwrap();
    std::fs::create_dir(dir.path().join("out")).unwrap();
    for id in ["1", "2"] {
        std::fs::write(dir.path().join("in").join(format!("{id}.txt")), "text").unwrap();
    }
    dir
}

#[test]
fn validate_passes_when_every_output_is_present() {
    let dir = workspace();
    for id in ["1", "2"] {
        std::fs::write(dir.path().join("out").join(format!("{id}.mp3")), vec![1u8; 2048])
            .unwrap();
    }

    let output = audiobatch(dir.path(), &["validate"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("All 2 outputs valid"));
}

#[test]
fn validate_reports_missing_and_truncated_outputs() {
    let dir = workspace();
    std::fs::write(dir.path().join("out").join("1.mp3"), vec![1u8; 10]).unwrap();
    let summary = dir.path().join("summary.json");

    let output = audiobatch(
        dir.path(),
        &["validate", "--summary-json", summary.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("2 of 2 outputs missing or invalid"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(summary).unwrap()).unwrap();
    assert_eq!(json["failed"].as_object().unwrap().len(), 2);
}

#[test]
fn missing_input_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();

    let output = audiobatch(dir.path(), &["validate", "--input", "nowhere"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nowhere"));
}

#[test]
fn status_without_checkpoint() {
    let dir = tempfile::tempdir().unwrap();

    let output = audiobatch(dir.path(), &["status"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("No unfinished run"));
}

#[test]
fn status_shows_an_unfinished_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".breakpointfile"),
        concat!(
            r#"{"entry":"run","run_id":"0190b6e4-2c4a-7000-8000-000000000001","started_at":"2026-01-05T10:00:00Z"}"#,
            "\n",
            r#"{"entry":"completed","id":"1"}"#,
            "\n",
        ),
    )
    .unwrap();

    let output = audiobatch(dir.path(), &["status"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("Unfinished run 0190b6e4-2c4a-7000-8000-000000000001"));
    assert!(text.contains("Completed items: 1"));
}

#[test]
fn invalid_batch_size_is_rejected() {
    let dir = workspace();

    let output = audiobatch(dir.path(), &["run", "--yes", "--batch-size", "0"]);

    assert_eq!(output.status.code(), Some(1));
}

use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use tempfile::tempdir;

fn schedassist() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_schedassist"));
    command.env("RUST_LOG", "warn");
    command
}

#[test]
fn config_validate_accepts_a_partial_file() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("schedassist.yaml");
    fs::write(&path, "retry:\n  max_attempts: 4\n")?;

    let output = schedassist()
        .arg("--config")
        .arg(&path)
        .args(["config", "validate"])
        .output()
        .context("failed to execute config validate")?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("is valid"));
    Ok(())
}

#[test]
fn config_validate_rejects_an_empty_allow_list() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("schedassist.yaml");
    fs::write(&path, "injection:\n  allow_prefixes: []\n")?;

    let output = schedassist()
        .arg("--config")
        .arg(&path)
        .args(["config", "validate"])
        .output()?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn replay_reports_deduplicated_injections() -> Result<()> {
    let tmp = tempdir()?;
    let config = tmp.path().join("schedassist.yaml");
    fs::write(&config, "retry:\n  max_attempts: 1\n")?;
    let script = tmp.path().join("transitions.json");
    fs::write(
        &script,
        r#"[
            {"context": 1, "phase": "navigating"},
            {"context": 1, "phase": "completed", "state": "https://miyabi381.github.io/Scheduler-test.html"},
            {"context": 1, "phase": "completed", "state": "https://miyabi381.github.io/Scheduler-test.html"},
            {"context": 1, "phase": "navigating"},
            {"context": 1, "phase": "completed", "state": "https://miyabi381.github.io/Scheduler-test.html"},
            {"context": 1, "phase": "removed"}
        ]"#,
    )?;

    let output = schedassist()
        .arg("--config")
        .arg(&config)
        .args(["--output", "json", "replay"])
        .arg(&script)
        .arg("--settle")
        .output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["steps"], 6);
    assert_eq!(report["injections"], 2);
    assert_eq!(report["ignored"], 1);
    Ok(())
}

#[test]
fn demo_prints_the_generated_controls() -> Result<()> {
    let tmp = tempdir()?;
    let config = tmp.path().join("schedassist.yaml");
    fs::write(&config, "demo:\n  groups: [\"Sales\", \"Ops\"]\n")?;

    let output = schedassist()
        .arg("--config")
        .arg(&config)
        .args(["--output", "json", "demo", "--toggle-resource"])
        .output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summary["injections"], 1);
    assert_eq!(summary["groups"].as_array().map(Vec::len), Some(2));
    assert_eq!(summary["groups"][0]["title"], "Sales");
    assert_eq!(summary["resource_active"], true);
    assert_eq!(summary["page"]["resource_commits"], 1);
    Ok(())
}

//! CLI smoke tests: build info and output modes.

use std::io;
use std::process::{Command, Output};

fn polychat(args: &[&str]) -> io::Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_polychat"))
        .args(args)
        .env_remove("POLYCHAT_LOG")
        .output()
}

#[test]
fn info_json_is_deterministic() -> io::Result<()> {
    let first = polychat(&["--json", "info"])?;
    let second = polychat(&["--json", "info"])?;
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout, "info output should be deterministic");

    let value: serde_json::Value =
        serde_json::from_slice(&first.stdout).map_err(io::Error::other)?;
    assert_eq!(value.get("status").and_then(|v| v.as_str()), Some("ok"));
    assert_eq!(
        value
            .get("build")
            .and_then(|build| build.get("name"))
            .and_then(|name| name.as_str()),
        Some("polychat-cli")
    );
    Ok(())
}

#[test]
fn agent_mode_emits_single_ndjson_summary() -> io::Result<()> {
    let output = polychat(&["--agent", "info"])?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(lines.first().copied().unwrap_or(""))
        .map_err(io::Error::other)?;
    assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("summary"));
    assert_eq!(value.get("kind").and_then(|v| v.as_str()), Some("info"));
    Ok(())
}

#[test]
fn unknown_subcommand_fails() -> io::Result<()> {
    let output = polychat(&["frobnicate"])?;
    assert!(!output.status.success());
    Ok(())
}

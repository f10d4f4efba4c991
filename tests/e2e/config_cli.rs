//! Config and settings command E2E tests.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::{fs, io};

fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_dir.to_path_buf())
}

fn bundled_path(file: &str) -> PathBuf {
    workspace_root()
        .join("crates")
        .join("config")
        .join("resources")
        .join(file)
}

fn polychat(args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_polychat"));
    command
        .args(args)
        .env_remove("POLYCHAT_CACHE_PROVIDER")
        .env_remove("POLYCHAT_CACHE_PATH");
    command
}

fn json_stdout(output: &Output) -> io::Result<serde_json::Value> {
    serde_json::from_slice(&output.stdout).map_err(io::Error::other)
}

#[test]
fn config_check_accepts_bundled_documents() -> io::Result<()> {
    for (domain, file) in [
        ("providers", "providers.json"),
        ("topics", "topics.json"),
        ("modes", "modes.json"),
    ] {
        let output = polychat(&["--json", "config", "check", "--domain", domain])
            .arg(bundled_path(file))
            .output()?;
        assert!(output.status.success(), "{domain} should validate");

        let value = json_stdout(&output)?;
        assert_eq!(value.get("status").and_then(|v| v.as_str()), Some("ok"));
    }
    Ok(())
}

#[test]
fn config_check_rejects_document_for_the_wrong_domain() -> io::Result<()> {
    let output = polychat(&["--json", "config", "check", "--domain", "providers"])
        .arg(bundled_path("topics.json"))
        .output()?;
    assert_eq!(output.status.code(), Some(2));

    let value = json_stdout(&output)?;
    assert_eq!(value.get("status").and_then(|v| v.as_str()), Some("invalid"));
    let diagnostics = value
        .get("check")
        .and_then(|check| check.get("diagnostics"))
        .and_then(|d| d.as_array())
        .ok_or_else(|| io::Error::other("missing diagnostics"))?;
    assert!(!diagnostics.is_empty());
    Ok(())
}

#[test]
fn config_check_reports_malformed_json_as_error() -> io::Result<()> {
    let path = std::env::temp_dir().join(format!("polychat-e2e-bad-{}.json", std::process::id()));
    fs::write(&path, "{ not json")?;
    let output = polychat(&["--json", "config", "check", "--domain", "topics"])
        .arg(&path)
        .output()?;
    let _ = fs::remove_file(&path);

    assert_eq!(output.status.code(), Some(2));
    let value = json_stdout(&output)?;
    assert_eq!(value.get("status").and_then(|v| v.as_str()), Some("error"));
    assert_eq!(
        value
            .get("error")
            .and_then(|error| error.get("code"))
            .and_then(|code| code.as_str()),
        Some("ERR_CONFIG_INVALID_DOCUMENT_JSON")
    );
    Ok(())
}

#[test]
fn config_show_summarizes_selected_document() -> io::Result<()> {
    let output = polychat(&["--json", "config", "show", "modes"]).output()?;
    assert!(output.status.success());

    let value = json_stdout(&output)?;
    let summary = value
        .get("summary")
        .ok_or_else(|| io::Error::other("missing summary"))?;
    assert_eq!(summary.get("domain").and_then(|v| v.as_str()), Some("modes"));
    assert_eq!(summary.get("source").and_then(|v| v.as_str()), Some("bundled"));
    Ok(())
}

#[test]
fn settings_show_applies_env_and_overrides() -> io::Result<()> {
    let output = polychat(&[
        "--json",
        "--overrides-json",
        r#"{"http":{"allowLoopback":true}}"#,
        "settings",
        "show",
    ])
    .env("POLYCHAT_TIMEOUT_MS", "4321")
    .output()?;
    assert!(output.status.success());

    let value = json_stdout(&output)?;
    let http = value
        .get("effectiveSettings")
        .and_then(|settings| settings.get("http"))
        .ok_or_else(|| io::Error::other("missing http settings"))?;
    assert_eq!(http.get("timeoutMs").and_then(|v| v.as_u64()), Some(4321));
    assert_eq!(http.get("allowLoopback").and_then(|v| v.as_bool()), Some(true));
    Ok(())
}

#[test]
fn settings_check_rejects_invalid_env() -> io::Result<()> {
    let output = polychat(&["settings", "check"])
        .env("POLYCHAT_TIMEOUT_MS", "not-a-number")
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).contains("status: error"));
    Ok(())
}

#[test]
fn chat_request_schema_lists_messages() -> io::Result<()> {
    let output = polychat(&["config", "schema", "--kind", "chat-request"]).output()?;
    assert!(output.status.success());

    let value = json_stdout(&output)?;
    let properties = value
        .get("properties")
        .ok_or_else(|| io::Error::other("missing properties"))?;
    assert!(properties.get("messages").is_some());
    assert!(properties.get("provider").is_some());
    Ok(())
}

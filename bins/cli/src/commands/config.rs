//! Config document command handlers.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, SchemaKind, SettingsArgs, async_runtime, format_error_output, load_settings, log_info};
use polychat_adapters::TracingLogger;
use polychat_config::{chat_send_request_schema, client_settings_schema};
use polychat_domain::ConfigDomain;
use polychat_infra::{ChatRuntime, DocumentSummary, check_document_file};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Run `config show`.
pub fn run_config_show(
    mode: OutputMode,
    settings: &SettingsArgs,
    domain: ConfigDomain,
    refresh: bool,
    document: bool,
) -> Result<CliOutput, CliError> {
    let settings = match load_settings(settings) {
        Ok(settings) => settings,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };
    let runtime = match ChatRuntime::build(settings, Arc::new(TracingLogger::new())) {
        Ok(runtime) => runtime,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let mut stderr = String::new();
    let refresh_outcome = if refresh {
        let outcome = async_runtime()?.block_on(runtime.refresh(domain));
        log_info(
            &mut stderr,
            &format!("{domain} refresh: {}", outcome.as_str()),
            mode.no_progress,
        );
        Some(outcome)
    } else {
        None
    };

    let summary = runtime.document_summary(domain);
    let mut payload = Map::new();
    payload.insert("summary".to_string(), serde_json::to_value(&summary)?);
    if let Some(outcome) = refresh_outcome.as_ref() {
        payload.insert("refresh".to_string(), Value::from(outcome.as_str()));
    }

    let document_json = if document {
        match runtime.document_json(domain) {
            Ok(json) => Some(json),
            Err(error) => return Ok(format_error_output(mode, &error)),
        }
    } else {
        None
    };
    if let Some(json) = document_json.as_deref() {
        payload.insert("document".to_string(), serde_json::from_str(json.trim())?);
    }

    let stdout = mode.render_ok("config", payload, || {
        let mut out = format_summary_text(&summary);
        if let Some(outcome) = refresh_outcome.as_ref() {
            out.push_str("refresh: ");
            out.push_str(outcome.as_str());
            out.push('\n');
        }
        if let Some(json) = document_json.as_deref() {
            out.push_str("document:\n");
            out.push_str(json);
        }
        out
    })?;
    Ok(CliOutput::ok(stdout, stderr))
}

/// Run `config check`.
pub fn run_config_check(
    mode: OutputMode,
    path: &Path,
    domain: ConfigDomain,
) -> Result<CliOutput, CliError> {
    let check = match check_document_file(domain, path) {
        Ok(check) => check,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "config check completed", mode.no_progress);

    let mut payload = Map::new();
    payload.insert(
        "path".to_string(),
        Value::from(path.to_string_lossy().to_string()),
    );
    payload.insert("check".to_string(), serde_json::to_value(&check)?);

    let status = if check.valid { "ok" } else { "invalid" };
    let stdout = mode.render(status, "config", payload, || {
        let mut out = format!(
            "status: {status}\ndomain: {}\npath: {}\n",
            check.domain,
            path.to_string_lossy()
        );
        if let Some(version) = check.version.as_deref() {
            out.push_str("version: ");
            out.push_str(version);
            out.push('\n');
        }
        if let Some(entries) = check.entries {
            out.push_str(&format!("entries: {entries}\n"));
        }
        if !check.diagnostics.is_empty() {
            out.push_str("diagnostics:\n");
            for diagnostic in &check.diagnostics {
                out.push_str("  - ");
                out.push_str(diagnostic);
                out.push('\n');
            }
        }
        out
    })?;

    Ok(CliOutput {
        stdout,
        stderr,
        exit_code: if check.valid {
            ExitCode::Ok
        } else {
            ExitCode::Usage
        },
    })
}

/// Run `config schema`.
pub fn run_config_schema(mode: OutputMode, kind: SchemaKind) -> Result<CliOutput, CliError> {
    let schema = match kind {
        SchemaKind::Settings => client_settings_schema(),
        SchemaKind::ChatRequest => chat_send_request_schema(),
    };
    let schema = serde_json::to_value(&schema)?;

    let stdout = if mode.is_json() || mode.is_ndjson() {
        let mut payload = Map::new();
        payload.insert("schema".to_string(), schema);
        mode.render_ok("schema", payload, String::new)?
    } else {
        let mut out = serde_json::to_string_pretty(&schema)?;
        out.push('\n');
        out
    };
    Ok(CliOutput::ok(stdout, String::new()))
}

fn format_summary_text(summary: &DocumentSummary) -> String {
    format!(
        "status: ok\ndomain: {}\nversion: {}\nsource: {}\nminAppVersion: {}\ncustomized: {}\nentries: {}\nids: {}\n",
        summary.domain,
        summary.version,
        summary.source,
        summary.min_app_version,
        summary.customized,
        summary.entries,
        summary.ids.join(","),
    )
}

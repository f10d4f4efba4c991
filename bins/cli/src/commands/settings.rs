//! Client settings command handlers.

use crate::error::CliError;
use crate::format::OutputMode;
use crate::{CliOutput, SettingsArgs, format_error_output, log_info};
use polychat_infra::load_effective_settings_json;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Run `settings show`.
pub fn run_settings_show(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    args: &SettingsArgs,
) -> Result<CliOutput, CliError> {
    let settings_json = match load_effective_settings_json(
        env,
        args.path.as_deref(),
        args.overrides_json.as_deref(),
    ) {
        Ok(settings) => settings,
        Err(error) => return Ok(format_error_output(mode, &error)),
    };

    let mut stderr = String::new();
    log_info(&mut stderr, "settings show completed", mode.no_progress);

    let mut payload = settings_payload(args);
    payload.insert(
        "effectiveSettings".to_string(),
        serde_json::from_str(settings_json.trim())?,
    );
    let stdout = mode.render_ok("settings", payload, || {
        let mut out = String::from("status: ok\nsettings:\n");
        out.push_str(&settings_json);
        out
    })?;
    Ok(CliOutput::ok(stdout, stderr))
}

/// Run `settings check`.
pub fn run_settings_check(
    mode: OutputMode,
    env: &BTreeMap<String, String>,
    args: &SettingsArgs,
) -> Result<CliOutput, CliError> {
    if let Err(error) =
        load_effective_settings_json(env, args.path.as_deref(), args.overrides_json.as_deref())
    {
        return Ok(format_error_output(mode, &error));
    }

    let mut stderr = String::new();
    log_info(&mut stderr, "settings check completed", mode.no_progress);

    let stdout = mode.render_ok("settings", settings_payload(args), || {
        args.path.as_ref().map_or_else(
            || "status: ok\nsettings: ok\n".to_string(),
            |path| format!("status: ok\nsettings: ok\npath: {}\n", path.to_string_lossy()),
        )
    })?;
    Ok(CliOutput::ok(stdout, stderr))
}

fn settings_payload(args: &SettingsArgs) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert(
        "settingsPath".to_string(),
        args.path
            .as_ref()
            .map_or(Value::Null, |path| Value::from(path.to_string_lossy().to_string())),
    );
    payload
}

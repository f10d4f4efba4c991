//! Settings loading helpers for CLI surfaces.

use crate::InfraResult;
use polychat_config::{
    SettingsEnv, ValidatedClientSettings, load_settings_from_path, to_pretty_json,
};
use polychat_shared::ErrorEnvelope;
use std::collections::BTreeMap;
use std::path::Path;

/// Load and validate the effective settings from a scoped env map, an optional
/// settings file, and optional JSON overrides.
pub fn load_effective_settings(
    env: &BTreeMap<String, String>,
    settings_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<ValidatedClientSettings> {
    let env = SettingsEnv::from_map(env).map_err(ErrorEnvelope::from)?;
    load_settings_from_path(settings_path, overrides_json, &env)
}

/// Load and validate the effective settings, returning deterministic pretty JSON.
pub fn load_effective_settings_json(
    env: &BTreeMap<String, String>,
    settings_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> InfraResult<String> {
    let settings = load_effective_settings(env, settings_path, overrides_json)?;
    to_pretty_json(settings.as_ref())
}

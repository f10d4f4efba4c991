//! Settings loading helpers (env + file + overrides).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::env::{SettingsEnv, apply_env_overrides};
use crate::settings::{CacheProvider, ClientSettings, ValidatedClientSettings};
use polychat_shared::{ErrorClass, ErrorCode, ErrorEnvelope};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// On-disk format of a settings or document file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json` (also used when there is no extension).
    Json,
    /// `.toml`.
    Toml,
}

/// Load settings from sources using a deterministic precedence order.
///
/// Precedence (highest wins):
/// - env overrides (`SettingsEnv`)
/// - overrides JSON (partial settings)
/// - settings JSON (file content)
/// - defaults (`ClientSettings::default()`)
pub fn load_settings_from_sources(
    settings_json: Option<&str>,
    overrides_json: Option<&str>,
    env: &SettingsEnv,
) -> Result<ValidatedClientSettings, ErrorEnvelope> {
    let mut settings = match settings_json {
        None => ClientSettings::default(),
        Some(input) => parse_settings_unvalidated(input, ConfigFormat::Json)?,
    };

    if let Some(input) = overrides_json {
        parse_overrides_json(input)?.apply(&mut settings);
    }

    apply_env_overrides(settings, env)
}

/// Load settings from an optional file path.
pub fn load_settings_from_path(
    settings_path: Option<&Path>,
    overrides_json: Option<&str>,
    env: &SettingsEnv,
) -> Result<ValidatedClientSettings, ErrorEnvelope> {
    let mut settings = match settings_path {
        None => ClientSettings::default(),
        Some(path) => {
            let text = read_config_file(path)?;
            let format = detect_config_format(path)?;
            parse_settings_unvalidated(&text, format)?
        },
    };

    if let Some(input) = overrides_json {
        parse_overrides_json(input)?.apply(&mut settings);
    }

    apply_env_overrides(settings, env)
}

/// Load settings from std env and an optional file path.
pub fn load_settings_std_env(
    settings_path: Option<&Path>,
    overrides_json: Option<&str>,
) -> Result<ValidatedClientSettings, ErrorEnvelope> {
    let env = SettingsEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_settings_from_path(settings_path, overrides_json, &env)
}

/// Serialize settings as deterministic pretty JSON (with trailing newline).
pub fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String, ErrorEnvelope> {
    let mut output = serde_json::to_string_pretty(value).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            format!("failed to serialize JSON: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Serialize settings as deterministic pretty TOML (with trailing newline).
pub fn to_pretty_toml<T: serde::Serialize>(value: &T) -> Result<String, ErrorEnvelope> {
    let mut output = toml::to_string_pretty(value).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("config", "serialize_toml"),
            format!("failed to serialize TOML: {error}"),
            ErrorClass::NonRetriable,
        )
    })?;
    output.push('\n');
    Ok(output)
}

/// Read a UTF-8 file, mapping I/O failures to `config` error codes.
pub fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path).map_err(|error| {
        let code = match error.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::new("config", "config_file_not_found"),
            std::io::ErrorKind::PermissionDenied => {
                ErrorCode::new("config", "config_file_permission_denied")
            },
            _ => ErrorCode::new("config", "config_file_io"),
        };

        ErrorEnvelope::expected(code, format!("failed to read config file: {error}"))
            .with_metadata("path", path.to_string_lossy().to_string())
    })
}

/// Detect the format from the file extension.
pub fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None | Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some(other) => Err(ErrorEnvelope::expected(
            ErrorCode::new("config", "unsupported_format"),
            "unsupported config format; use .json or .toml",
        )
        .with_metadata("extension", other.to_string())),
    }
}

fn parse_settings_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<ClientSettings, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_json"),
                format!("invalid settings JSON: {error}"),
            )
            .with_metadata("source", "settings")
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::new("config", "invalid_toml"),
                format!("invalid settings TOML: {error}"),
            )
            .with_metadata("source", "settings")
        }),
    }
}

fn parse_overrides_json(input: &str) -> Result<ClientSettingsOverrides, ErrorEnvelope> {
    serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid overrides JSON: {error}"),
        )
        .with_metadata("source", "overrides")
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct ClientSettingsOverrides {
    version: Option<u32>,
    app_version: Option<String>,
    http: HttpOverrides,
    cache: CacheOverrides,
    providers: BTreeMap<String, ProviderOverrideOverrides>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct HttpOverrides {
    timeout_ms: Option<u64>,
    allow_loopback: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct CacheOverrides {
    provider: Option<CacheProvider>,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct ProviderOverrideOverrides {
    endpoint: Option<String>,
    default_model: Option<String>,
}

impl ClientSettingsOverrides {
    fn apply(self, settings: &mut ClientSettings) {
        if let Some(version) = self.version {
            settings.version = version;
        }
        if let Some(app_version) = self.app_version {
            settings.app_version = app_version;
        }
        if let Some(timeout_ms) = self.http.timeout_ms {
            settings.http.timeout_ms = timeout_ms;
        }
        if let Some(allow_loopback) = self.http.allow_loopback {
            settings.http.allow_loopback = allow_loopback;
        }
        if let Some(provider) = self.cache.provider {
            settings.cache.provider = provider;
        }
        if let Some(path) = self.cache.path {
            settings.cache.path = Some(path);
        }
        for (id, patch) in self.providers {
            let entry = settings.providers.entry(id).or_default();
            if patch.endpoint.is_some() {
                entry.endpoint = patch.endpoint;
            }
            if patch.default_model.is_some() {
                entry.default_model = patch.default_model;
            }
        }
    }
}

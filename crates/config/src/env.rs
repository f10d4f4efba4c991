//! Environment variable parsing and env-to-settings merging.
//!
//! Env parsing is strict: a variable that is present but empty or malformed
//! fails fast instead of being ignored. Secret-looking values are redacted in
//! error metadata.

use crate::settings::{CacheProvider, ClientSettings, ValidatedClientSettings};
use polychat_shared::{ErrorCode, ErrorEnvelope, REDACTED_VALUE, is_secret_key};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Env var: per-request timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "POLYCHAT_TIMEOUT_MS";
/// Env var: permit loopback endpoints (true/false).
pub const ENV_ALLOW_LOOPBACK: &str = "POLYCHAT_ALLOW_LOOPBACK";
/// Env var: config cache backend (`memory` | `sqlite`).
pub const ENV_CACHE_PROVIDER: &str = "POLYCHAT_CACHE_PROVIDER";
/// Env var: config cache database path.
pub const ENV_CACHE_PATH: &str = "POLYCHAT_CACHE_PATH";
/// Env var: application version used for `minAppVersion` gating.
pub const ENV_APP_VERSION: &str = "POLYCHAT_APP_VERSION";

const ALL_VARS: [&str; 5] = [
    ENV_TIMEOUT_MS,
    ENV_ALLOW_LOOPBACK,
    ENV_CACHE_PROVIDER,
    ENV_CACHE_PATH,
    ENV_APP_VERSION,
];

/// Typed env-derived overrides for `ClientSettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsEnv {
    /// Override for `http.timeoutMs`.
    pub timeout_ms: Option<u64>,
    /// Override for `http.allowLoopback`.
    pub allow_loopback: Option<bool>,
    /// Override for `cache.provider`.
    pub cache_provider: Option<CacheProvider>,
    /// Override for `cache.path`.
    pub cache_path: Option<Box<str>>,
    /// Override for `appVersion`.
    pub app_version: Option<Box<str>>,
}

impl SettingsEnv {
    /// Parse env overrides from a key/value map (useful for tests and fixtures).
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            timeout_ms: parse_optional_u64(map, ENV_TIMEOUT_MS)?,
            allow_loopback: parse_optional_bool(map, ENV_ALLOW_LOOPBACK)?,
            cache_provider: parse_optional_cache_provider(map, ENV_CACHE_PROVIDER)?,
            cache_path: parse_optional_trimmed_string(map, ENV_CACHE_PATH)?,
            app_version: parse_optional_trimmed_string(map, ENV_APP_VERSION)?,
        })
    }

    /// Parse env overrides from the current process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let map: BTreeMap<String, String> = ALL_VARS
            .iter()
            .filter_map(|name| {
                std::env::var(name)
                    .ok()
                    .map(|value| ((*name).to_string(), value))
            })
            .collect();
        Self::from_map(&map)
    }

    /// Returns true when no override is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.timeout_ms.is_none()
            && self.allow_loopback.is_none()
            && self.cache_provider.is_none()
            && self.cache_path.is_none()
            && self.app_version.is_none()
    }
}

/// Apply env overrides to base settings (env wins over file/default values).
pub fn apply_env_overrides(
    base: ClientSettings,
    env: &SettingsEnv,
) -> Result<ValidatedClientSettings, ErrorEnvelope> {
    let mut settings = base;
    if let Some(timeout_ms) = env.timeout_ms {
        settings.http.timeout_ms = timeout_ms;
    }
    if let Some(allow_loopback) = env.allow_loopback {
        settings.http.allow_loopback = allow_loopback;
    }
    if let Some(provider) = env.cache_provider {
        settings.cache.provider = provider;
    }
    if let Some(path) = env.cache_path.as_deref() {
        settings.cache.path = Some(PathBuf::from(path));
    }
    if let Some(version) = env.app_version.as_deref() {
        settings.app_version = version.to_string();
    }

    settings.validate_and_normalize().map_err(Into::into)
}

/// Validation failures when parsing env variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Enum env var had an invalid value.
    InvalidEnum {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidBool { .. } => ErrorCode::new("config", "invalid_env_bool"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
            Self::InvalidEnum { .. } => ErrorCode::new("config", "invalid_env_enum"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidBool { var, .. } => write!(formatter, "{var} must be a boolean"),
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
            Self::InvalidEnum { var, .. } => write!(formatter, "{var} has an unsupported value"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => envelope.with_metadata("env_var", var),
            EnvParseError::InvalidBool { var, value }
            | EnvParseError::InvalidInt { var, value }
            | EnvParseError::InvalidEnum { var, value } => envelope
                .with_metadata("env_var", var)
                .with_metadata("value", redact_value(var, &value)),
        }
    }
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }

    Ok(Some(trimmed.to_owned().into_boxed_str()))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.into_string(),
        })
}

fn parse_optional_bool(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<bool>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: trimmed.into_string(),
        }),
    }
}

fn parse_optional_cache_provider(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<CacheProvider>, EnvParseError> {
    let Some(trimmed) = parse_optional_trimmed_string(map, var)? else {
        return Ok(None);
    };

    CacheProvider::parse(&trimmed)
        .map(Some)
        .ok_or_else(|| EnvParseError::InvalidEnum {
            var,
            value: trimmed.into_string(),
        })
}

fn redact_value(var: &str, value: &str) -> String {
    if is_secret_key(var) {
        REDACTED_VALUE.to_string()
    } else {
        value.to_string()
    }
}

//! Client settings schema, defaults, validation, and normalization.
//!
//! Settings are local to one installation and never fetched remotely:
//! - Deserialization uses `serde` (JSON or TOML).
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.
//! - Provider override keys are normalized to lowercase provider ids.

use polychat_domain::{ProviderId, validate_endpoint};
use polychat_shared::{ErrorCode, ErrorEnvelope};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Strips credentials from a URL before it is echoed in an error.
pub(crate) fn sanitize_url_for_error(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() || !parsed.username().is_empty() {
                if parsed.set_username("").is_err() {
                    return "[invalid url: invalid username]".to_string();
                }
                if parsed.set_password(None).is_err() {
                    return "[invalid url: invalid password]".to_string();
                }
            }
            polychat_shared::redact_url(parsed.as_str())
        },
        Err(error) => format!("[invalid url: {error}]"),
    }
}

/// Current supported settings schema version.
pub const CURRENT_SETTINGS_VERSION: u32 = 1;

/// Default per-request timeout for provider and config calls.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

const TIMEOUT_MIN_MS: u64 = 1;
const TIMEOUT_MAX_MS: u64 = 600_000;
const PROVIDER_OVERRIDES_MAX: usize = 64;

/// Top-level client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ClientSettings {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Application version compared against `minAppVersion` gates.
    pub app_version: String,
    /// Outbound HTTP settings.
    pub http: HttpSettings,
    /// Config cache settings.
    pub cache: CacheSettings,
    /// Per-provider endpoint/model overrides keyed by provider id.
    pub providers: BTreeMap<String, ProviderOverride>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            version: CURRENT_SETTINGS_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            http: HttpSettings::default(),
            cache: CacheSettings::default(),
            providers: BTreeMap::new(),
        }
    }
}

impl ClientSettings {
    /// Validate and normalize the settings.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedClientSettings, SettingsError> {
        if self.version != CURRENT_SETTINGS_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_SETTINGS_VERSION,
            });
        }

        self.app_version = self.app_version.trim().to_string();
        if self.app_version.is_empty() {
            return Err(SettingsError::InvalidField {
                section: "root",
                field: "appVersion",
                reason: "must be non-empty".to_string(),
            });
        }

        self.http.validate()?;
        self.cache.normalize_and_validate()?;
        self.providers = normalize_provider_overrides(self.providers, self.http.allow_loopback)?;

        Ok(ValidatedClientSettings { raw: self })
    }
}

/// Validated settings wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClientSettings {
    raw: ClientSettings,
}

impl ValidatedClientSettings {
    /// Borrow the raw settings.
    #[must_use]
    pub const fn as_ref(&self) -> &ClientSettings {
        &self.raw
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.raw.http.timeout_ms)
    }

    /// Override for `provider`, if configured.
    #[must_use]
    pub fn provider_override(&self, provider: &ProviderId) -> Option<&ProviderOverride> {
        self.raw.providers.get(provider.as_str())
    }
}

impl AsRef<ClientSettings> for ValidatedClientSettings {
    fn as_ref(&self) -> &ClientSettings {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedClientSettings {
    type Target = ClientSettings;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct HttpSettings {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Permit loopback endpoints (local development servers only).
    pub allow_loopback: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            allow_loopback: false,
        }
    }
}

impl HttpSettings {
    const fn validate(&self) -> Result<(), SettingsError> {
        if self.timeout_ms < TIMEOUT_MIN_MS || self.timeout_ms > TIMEOUT_MAX_MS {
            return Err(SettingsError::TimeoutOutOfRange {
                value_ms: self.timeout_ms,
                min_ms: TIMEOUT_MIN_MS,
                max_ms: TIMEOUT_MAX_MS,
            });
        }
        Ok(())
    }
}

/// Config cache backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CacheProvider {
    /// Process-local map; nothing survives a restart.
    #[default]
    Memory,
    /// `SQLite` key-value file.
    Sqlite,
}

impl CacheProvider {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parse a label, accepting common aliases.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" | "in-memory" => Some(Self::Memory),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

impl fmt::Display for CacheProvider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Config cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CacheSettings {
    /// Backend selection.
    pub provider: CacheProvider,
    /// Database file; required for `sqlite`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CacheSettings {
    fn normalize_and_validate(&mut self) -> Result<(), SettingsError> {
        if self
            .path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            self.path = None;
        }

        if self.provider == CacheProvider::Sqlite && self.path.is_none() {
            return Err(SettingsError::InvalidField {
                section: "cache",
                field: "path",
                reason: "required when provider is sqlite".to_string(),
            });
        }
        Ok(())
    }
}

/// Endpoint/model override for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ProviderOverride {
    /// Replacement endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Replacement default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

fn normalize_provider_overrides(
    raw: BTreeMap<String, ProviderOverride>,
    allow_loopback: bool,
) -> Result<BTreeMap<String, ProviderOverride>, SettingsError> {
    if raw.len() > PROVIDER_OVERRIDES_MAX {
        return Err(SettingsError::InvalidField {
            section: "providers",
            field: "providers",
            reason: format!("at most {PROVIDER_OVERRIDES_MAX} overrides are allowed"),
        });
    }

    let mut normalized = BTreeMap::new();
    for (key, mut value) in raw {
        let id = ProviderId::parse(&key).map_err(|error| SettingsError::InvalidField {
            section: "providers",
            field: "id",
            reason: error.to_string(),
        })?;

        value.endpoint = trimmed_or_none(value.endpoint);
        value.default_model = trimmed_or_none(value.default_model);
        if let Some(endpoint) = value.endpoint.as_deref() {
            validate_endpoint(endpoint, allow_loopback).map_err(|error| {
                SettingsError::InvalidUrl {
                    section: "providers",
                    field: "endpoint",
                    url: endpoint.to_string(),
                    reason: error.to_string(),
                }
            })?;
        }

        if normalized.insert(id.to_string(), value).is_some() {
            return Err(SettingsError::InvalidField {
                section: "providers",
                field: "id",
                reason: format!("duplicate override for `{id}`"),
            });
        }
    }
    Ok(normalized)
}

fn trimmed_or_none(value: Option<String>) -> Option<String> {
    value
        .map(|inner| inner.trim().to_string())
        .filter(|inner| !inner.is_empty())
}

/// Parse settings from a JSON string, applying validation and normalization.
pub fn parse_client_settings_json(input: &str) -> Result<ValidatedClientSettings, ErrorEnvelope> {
    let settings: ClientSettings = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid settings JSON: {error}"),
        )
    })?;

    settings.validate_and_normalize().map_err(Into::into)
}

/// Parse settings from a TOML string, applying validation and normalization.
pub fn parse_client_settings_toml(input: &str) -> Result<ValidatedClientSettings, ErrorEnvelope> {
    let settings: ClientSettings = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid settings TOML: {error}"),
        )
    })?;

    settings.validate_and_normalize().map_err(Into::into)
}

/// Typed validation errors for client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The settings version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the settings.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// `http.timeoutMs` is out of bounds.
    TimeoutOutOfRange {
        /// Value provided (ms).
        value_ms: u64,
        /// Minimum allowed value (ms).
        min_ms: u64,
        /// Maximum allowed value (ms).
        max_ms: u64,
    },
    /// A URL entry is invalid.
    InvalidUrl {
        /// Settings section.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Invalid URL value.
        url: String,
        /// Human readable reason.
        reason: String,
    },
    /// Any other invalid field.
    InvalidField {
        /// Settings section.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },
}

impl SettingsError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::TimeoutOutOfRange { .. } => ErrorCode::new("config", "invalid_timeout"),
            Self::InvalidUrl { .. } => ErrorCode::new("config", "invalid_url"),
            Self::InvalidField { .. } => ErrorCode::new("config", "invalid_field"),
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => write!(
                formatter,
                "unsupported settings version: {found} (supported: {supported})"
            ),
            Self::TimeoutOutOfRange {
                value_ms,
                min_ms,
                max_ms,
            } => write!(
                formatter,
                "http.timeoutMs must be within [{min_ms}, {max_ms}] ms (got {value_ms})"
            ),
            Self::InvalidUrl {
                section,
                field,
                reason,
                ..
            } => write!(formatter, "invalid URL for {section}.{field}: {reason}"),
            Self::InvalidField {
                section,
                field,
                reason,
            } => write!(formatter, "invalid {section}.{field}: {reason}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<SettingsError> for ErrorEnvelope {
    fn from(error: SettingsError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            SettingsError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            SettingsError::TimeoutOutOfRange {
                value_ms,
                min_ms,
                max_ms,
            } => {
                envelope = envelope
                    .with_metadata("section", "http")
                    .with_metadata("field", "timeoutMs")
                    .with_metadata("value_ms", value_ms.to_string())
                    .with_metadata("min_ms", min_ms.to_string())
                    .with_metadata("max_ms", max_ms.to_string());
            },
            SettingsError::InvalidUrl {
                section,
                field,
                url,
                ..
            } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field)
                    .with_metadata("url", sanitize_url_for_error(&url));
            },
            SettingsError::InvalidField { section, field, .. } => {
                envelope = envelope
                    .with_metadata("section", section)
                    .with_metadata("field", field);
            },
        }

        envelope
    }
}

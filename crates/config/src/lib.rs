//! # polychat-config
//!
//! Configuration documents, their validation, the bundled baselines, and the
//! local client settings for polychat. This crate depends on `domain` and
//! `shared` only.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

/// Documents compiled into the binary and emergency fallbacks.
pub mod bundled;
/// Versioned configuration documents.
pub mod document;
/// Environment variable parsing and merging.
pub mod env;
/// Settings loading helpers (env + file + overrides).
pub mod load;
/// Request DTOs and validation.
pub mod requests;
/// JSON Schema exports.
pub mod schema_export;
/// Client settings schema types and helpers.
pub mod settings;
/// Structural validation of configuration documents.
pub mod validate;

pub use bundled::{EMERGENCY_VERSION, bundled_json};
pub use document::{
    ConfigDocument, ConfigDomainSpec, ModesDomain, ProviderCatalog, ProvidersDomain,
    TaxonomyDocument, TopicsDomain,
};
pub use env::{EnvParseError, SettingsEnv, apply_env_overrides};
pub use load::{
    ConfigFormat, detect_config_format, load_settings_from_path, load_settings_from_sources,
    load_settings_std_env, read_config_file, to_pretty_json, to_pretty_toml,
};
pub use requests::{
    ChatMessageDto, ChatSendRequestDto, RequestValidationError, parse_chat_send_request_json,
    validate_chat_request,
};
pub use schema_export::{chat_send_request_schema, client_settings_schema};
pub use settings::{
    CURRENT_SETTINGS_VERSION, CacheProvider, CacheSettings, ClientSettings, DEFAULT_TIMEOUT_MS,
    HttpSettings, ProviderOverride, SettingsError, ValidatedClientSettings,
    parse_client_settings_json, parse_client_settings_toml,
};
pub use validate::{
    Diagnostic, DocumentError, ValidationReport, parse_document, parse_document_value,
    validate_document,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

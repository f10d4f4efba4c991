//! Provider catalog entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned when a provider identifier is blank or malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidProviderId {
    /// Raw input that failed validation.
    pub input: String,
}

impl fmt::Display for InvalidProviderId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "provider id `{}` must be non-empty and use [a-z0-9_-]",
            self.input
        )
    }
}

impl std::error::Error for InvalidProviderId {}

/// Identifier for a chat provider (`openai`, `anthropic`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(Box<str>);

impl ProviderId {
    /// Parse a provider id. Input is trimmed and lowercased.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, InvalidProviderId> {
        let raw = input.as_ref();
        let normalized = raw.trim().to_ascii_lowercase();
        let valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(InvalidProviderId {
                input: raw.to_string(),
            });
        }
        Ok(Self(normalized.into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProviderId {
    type Error = InvalidProviderId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.0.into_string()
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Wire protocol family spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolFamily {
    /// Bearer auth, `messages` list with inline system role.
    OpenAi,
    /// Custom auth header, top-level `system` field.
    Anthropic,
    /// Credential in the query string, `contents` with `user`/`model` roles.
    Gemini,
    /// Arbitrary OpenAI-compatible endpoint with a tolerant parser.
    Custom,
}

impl ProtocolFamily {
    /// Every supported family.
    pub const ALL: [Self; 4] = [Self::OpenAi, Self::Anthropic, Self::Gemini, Self::Custom];

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Custom => "custom",
        }
    }
}

/// How the credential is presented to the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <credential>`.
    #[default]
    Bearer,
    /// Credential in a named header.
    Header {
        /// Header name.
        name: String,
    },
    /// Credential in a named query parameter.
    Query {
        /// Query parameter name.
        name: String,
    },
}

/// Capability flags advertised for a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderCapabilities {
    /// Accepts image input.
    pub multimodal: bool,
    /// Supports retrieval/grounding.
    pub retrieval: bool,
    /// Honors the `temperature` parameter.
    pub temperature: bool,
}

/// One model offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Model identifier sent on the wire.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// A provider catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    /// Provider identifier.
    pub id: ProviderId,
    /// Display name.
    pub name: String,
    /// Default chat-completion endpoint.
    pub endpoint: String,
    /// Model used when a request names none.
    pub default_model: String,
    /// Model catalog.
    pub models: Vec<ModelDescriptor>,
    /// Capability flags.
    #[serde(default)]
    pub capabilities: ProviderCapabilities,
    /// Credential presentation.
    #[serde(default)]
    pub auth: AuthScheme,
    /// Wire protocol family.
    pub protocol: ProtocolFamily,
}

impl ProviderDescriptor {
    /// Returns true when `model` is listed in the catalog.
    #[must_use]
    pub fn offers_model(&self, model: &str) -> bool {
        self.models.iter().any(|candidate| candidate.id == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_is_normalized() {
        let id = ProviderId::parse("  OpenAI ");
        assert!(matches!(id, Ok(ref parsed) if parsed.as_str() == "openai"));
        assert!(ProviderId::parse("").is_err());
        assert!(ProviderId::parse("open ai").is_err());
    }

    #[test]
    fn descriptor_deserializes_from_catalog_json() -> Result<(), serde_json::Error> {
        let descriptor: ProviderDescriptor = serde_json::from_value(serde_json::json!({
            "id": "gemini",
            "name": "Google Gemini",
            "endpoint": "https://generativelanguage.googleapis.com/v1beta/models",
            "defaultModel": "gemini-2.0-flash",
            "models": [{ "id": "gemini-2.0-flash", "name": "Gemini 2.0 Flash" }],
            "capabilities": { "multimodal": true, "temperature": true },
            "auth": { "scheme": "query", "name": "key" },
            "protocol": "gemini"
        }))?;

        assert_eq!(descriptor.protocol, ProtocolFamily::Gemini);
        assert_eq!(
            descriptor.auth,
            AuthScheme::Query {
                name: "key".to_string()
            }
        );
        assert!(descriptor.capabilities.multimodal);
        assert!(!descriptor.capabilities.retrieval);
        assert!(descriptor.offers_model("gemini-2.0-flash"));
        Ok(())
    }

    #[test]
    fn descriptor_rejects_blank_id() {
        let parsed: Result<ProviderDescriptor, _> = serde_json::from_value(serde_json::json!({
            "id": " ",
            "name": "x",
            "endpoint": "https://x",
            "defaultModel": "m",
            "models": [],
            "protocol": "openai"
        }));
        assert!(parsed.is_err());
    }
}

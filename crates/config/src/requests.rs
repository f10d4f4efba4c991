//! Request DTOs and validation helpers.
//!
//! Requests are boundary inputs (CLI/API) and must be validated before being
//! passed into use-cases. Validation here is limited to:
//! - shape (required fields, trimming)
//! - bounds (temperature, maxTokens)
//!
//! Provider support is decided by the dispatcher, not here: a well-formed
//! but unknown provider id passes validation.

use polychat_domain::{ChatMessage, ChatRequest, ChatRole, ProviderId};
use polychat_shared::{ErrorCode, ErrorEnvelope, SecretString};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

const TEMPERATURE_MIN: f32 = 0.0;
const TEMPERATURE_MAX: f32 = 2.0;
const MAX_TOKENS_MIN: u32 = 1;
const MAX_TOKENS_MAX: u32 = 1_000_000;
const MESSAGES_MAX: usize = 1_000;

/// One message in a chat request (boundary DTO).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChatMessageDto {
    /// `user`, `assistant`, or `system`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Chat send request payload (boundary DTO).
///
/// The credential is supplied out of band and never part of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChatSendRequestDto {
    /// Provider id from the catalog.
    pub provider: String,
    /// Model override; the catalog default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Endpoint override; the catalog endpoint is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Conversation turns, oldest first.
    pub messages: Vec<ChatMessageDto>,
    /// System prompt applied ahead of the conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Request validation errors mapped to `ErrorEnvelope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    /// A required string field is empty after trimming.
    EmptyField {
        /// Field name that failed validation.
        field: &'static str,
    },
    /// A field contains invalid content.
    InvalidField {
        /// Field name that failed validation.
        field: &'static str,
        /// Short reason describing why validation failed.
        reason: String,
    },
    /// A numeric field is out of bounds.
    OutOfRange {
        /// Field name that failed validation.
        field: &'static str,
        /// Value provided (stringified).
        value: String,
        /// Inclusive minimum bound (stringified).
        min: String,
        /// Inclusive maximum bound (stringified).
        max: String,
    },
}

impl RequestValidationError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyField { .. } => ErrorCode::new("config", "empty_field"),
            Self::InvalidField { .. } => ErrorCode::new("config", "invalid_field"),
            Self::OutOfRange { .. } => ErrorCode::new("config", "out_of_range"),
        }
    }
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyField { field } => write!(formatter, "{field} must be non-empty"),
            Self::InvalidField { field, reason } => {
                write!(formatter, "{field} is invalid: {reason}")
            },
            Self::OutOfRange {
                field, min, max, ..
            } => write!(formatter, "{field} must be between {min} and {max}"),
        }
    }
}

impl std::error::Error for RequestValidationError {}

impl From<RequestValidationError> for ErrorEnvelope {
    fn from(error: RequestValidationError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            RequestValidationError::EmptyField { field } => envelope.with_metadata("field", field),
            RequestValidationError::InvalidField { field, reason } => envelope
                .with_metadata("field", field)
                .with_metadata("reason", reason),
            RequestValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            } => envelope
                .with_metadata("field", field)
                .with_metadata("value", value)
                .with_metadata("min", min)
                .with_metadata("max", max),
        }
    }
}

/// Validate a chat request and bind it to `credential`.
pub fn validate_chat_request(
    dto: &ChatSendRequestDto,
    credential: impl Into<SecretString>,
) -> Result<ChatRequest, ErrorEnvelope> {
    let provider = ProviderId::parse(&dto.provider).map_err(|error| {
        ErrorEnvelope::from(RequestValidationError::InvalidField {
            field: "provider",
            reason: error.to_string(),
        })
    })?;

    let messages = validate_messages(&dto.messages)?;
    let mut request = ChatRequest::new(provider, credential, messages);

    if let Some(model) = optional_trimmed(dto.model.as_deref()) {
        request = request.with_model(model);
    }
    if let Some(endpoint) = optional_trimmed(dto.endpoint.as_deref()) {
        request = request.with_endpoint(endpoint);
    }
    if let Some(prompt) = optional_trimmed(dto.system_prompt.as_deref()) {
        request = request.with_system_prompt(prompt);
    }
    if let Some(temperature) = dto.temperature {
        if !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&temperature) {
            return Err(RequestValidationError::OutOfRange {
                field: "temperature",
                value: temperature.to_string(),
                min: TEMPERATURE_MIN.to_string(),
                max: TEMPERATURE_MAX.to_string(),
            }
            .into());
        }
        request = request.with_temperature(temperature);
    }
    if let Some(max_tokens) = dto.max_tokens {
        if !(MAX_TOKENS_MIN..=MAX_TOKENS_MAX).contains(&max_tokens) {
            return Err(RequestValidationError::OutOfRange {
                field: "maxTokens",
                value: max_tokens.to_string(),
                min: MAX_TOKENS_MIN.to_string(),
                max: MAX_TOKENS_MAX.to_string(),
            }
            .into());
        }
        request = request.with_max_tokens(max_tokens);
    }

    Ok(request)
}

/// Parse and validate a chat request from JSON.
pub fn parse_chat_send_request_json(
    input: &str,
    credential: impl Into<SecretString>,
) -> Result<ChatRequest, ErrorEnvelope> {
    let dto: ChatSendRequestDto = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid chat request JSON: {error}"),
        )
        .with_metadata("request_kind", "chatSend")
    })?;
    validate_chat_request(&dto, credential)
}

fn validate_messages(raw: &[ChatMessageDto]) -> Result<Vec<ChatMessage>, ErrorEnvelope> {
    if raw.is_empty() {
        return Err(RequestValidationError::EmptyField { field: "messages" }.into());
    }
    if raw.len() > MESSAGES_MAX {
        return Err(RequestValidationError::OutOfRange {
            field: "messages",
            value: raw.len().to_string(),
            min: "1".to_string(),
            max: MESSAGES_MAX.to_string(),
        }
        .into());
    }

    raw.iter()
        .map(|message| {
            let role = parse_role(&message.role)?;
            if message.content.trim().is_empty() {
                return Err(RequestValidationError::EmptyField { field: "content" }.into());
            }
            Ok(ChatMessage {
                role,
                content: message.content.clone(),
            })
        })
        .collect()
}

fn parse_role(raw: &str) -> Result<ChatRole, ErrorEnvelope> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "user" => Ok(ChatRole::User),
        "assistant" => Ok(ChatRole::Assistant),
        "system" => Ok(ChatRole::System),
        other => Err(RequestValidationError::InvalidField {
            field: "role",
            reason: format!("unknown role `{other}`"),
        }
        .into()),
    }
}

fn optional_trimmed(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn dto() -> ChatSendRequestDto {
        ChatSendRequestDto {
            provider: "OpenAI".to_string(),
            model: Some("  ".to_string()),
            endpoint: None,
            messages: vec![ChatMessageDto {
                role: "User".to_string(),
                content: "hello".to_string(),
            }],
            system_prompt: Some(" be brief ".to_string()),
            temperature: Some(0.7),
            max_tokens: Some(256),
        }
    }

    #[test]
    fn valid_request_is_normalized() -> Result<(), Box<dyn Error>> {
        let request = validate_chat_request(&dto(), "sk-test")?; // pragma: allowlist secret
        assert_eq!(request.provider.as_str(), "openai");
        assert_eq!(request.model, None);
        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.messages[0].role, ChatRole::User);
        assert_eq!(request.max_tokens, Some(256));
        Ok(())
    }

    #[test]
    fn empty_messages_are_rejected() -> Result<(), Box<dyn Error>> {
        let mut input = dto();
        input.messages.clear();
        let error = validate_chat_request(&input, "k")
            .err()
            .ok_or_else(|| std::io::Error::other("expected error"))?;
        assert_eq!(error.code, ErrorCode::new("config", "empty_field"));
        assert_eq!(error.metadata_value("field"), Some("messages"));
        Ok(())
    }

    #[test]
    fn temperature_bounds_are_enforced() -> Result<(), Box<dyn Error>> {
        let mut input = dto();
        input.temperature = Some(2.5);
        let error = validate_chat_request(&input, "k")
            .err()
            .ok_or_else(|| std::io::Error::other("expected error"))?;
        assert_eq!(error.code, ErrorCode::new("config", "out_of_range"));
        assert_eq!(error.metadata_value("field"), Some("temperature"));
        Ok(())
    }

    #[test]
    fn unknown_roles_and_bad_provider_ids_are_rejected() {
        let mut bad_role = dto();
        bad_role.messages[0].role = "tool".to_string();
        assert!(validate_chat_request(&bad_role, "k").is_err());

        let mut bad_provider = dto();
        bad_provider.provider = "open ai".to_string();
        let error = validate_chat_request(&bad_provider, "k").err();
        assert!(matches!(
            error,
            Some(ref envelope) if envelope.metadata_value("field") == Some("provider")
        ));
    }

    #[test]
    fn unknown_but_well_formed_provider_passes() -> Result<(), Box<dyn Error>> {
        let mut input = dto();
        input.provider = "acme".to_string();
        let request = validate_chat_request(&input, "k")?;
        assert_eq!(request.provider.as_str(), "acme");
        Ok(())
    }

    #[test]
    fn json_payload_rejects_unknown_fields() {
        let error = parse_chat_send_request_json(
            r#"{"provider":"openai","messages":[],"apiKey":"x"}"#, // pragma: allowlist secret
            "k",
        )
        .err();
        assert!(matches!(
            error,
            Some(ref envelope) if envelope.code == ErrorCode::new("config", "invalid_json")
        ));
    }
}

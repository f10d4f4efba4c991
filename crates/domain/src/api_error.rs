//! Typed failures surfaced by provider chat calls.
//!
//! Each code maps onto the `provider` namespace of [`ErrorCode`] so the
//! envelope stays the single error currency of the workspace, while callers
//! can still recover the tag with [`ApiError::from_envelope`].

use crate::endpoint::EndpointError;
use crate::provider::ProviderId;
use polychat_shared::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error namespace for provider failures.
pub const PROVIDER_ERROR_NAMESPACE: &str = "provider";

/// Stable tag of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    /// Provider answered with a non-2xx status.
    ApiError,
    /// Call exceeded its time budget; the connection was dropped.
    RequestTimeout,
    /// 2xx body violates the provider's documented shape.
    InvalidResponse,
    /// 2xx body is well formed but holds no completion.
    EmptyResponse,
    /// Endpoint refused before any network attempt.
    InvalidEndpoint,
    /// No adapter is registered for the requested provider.
    UnsupportedProvider,
    /// Transport failed before a status was received.
    NetworkFailure,
}

impl ApiErrorCode {
    /// All codes, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::ApiError,
        Self::RequestTimeout,
        Self::InvalidResponse,
        Self::EmptyResponse,
        Self::InvalidEndpoint,
        Self::UnsupportedProvider,
        Self::NetworkFailure,
    ];

    /// Uppercase tag (`API_ERROR`, ...).
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ApiError => "API_ERROR",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::InvalidEndpoint => "INVALID_ENDPOINT",
            Self::UnsupportedProvider => "UNSUPPORTED_PROVIDER",
            Self::NetworkFailure => "NETWORK_FAILURE",
        }
    }

    const fn slug(self) -> &'static str {
        match self {
            Self::ApiError => "api_error",
            Self::RequestTimeout => "request_timeout",
            Self::InvalidResponse => "invalid_response",
            Self::EmptyResponse => "empty_response",
            Self::InvalidEndpoint => "invalid_endpoint",
            Self::UnsupportedProvider => "unsupported_provider",
            Self::NetworkFailure => "network_failure",
        }
    }

    /// Envelope code for this tag.
    #[must_use]
    pub fn error_code(self) -> ErrorCode {
        ErrorCode::new(PROVIDER_ERROR_NAMESPACE, self.slug())
    }

    /// Recover the tag from an envelope code.
    #[must_use]
    pub fn from_error_code(code: &ErrorCode) -> Option<Self> {
        if code.namespace() != PROVIDER_ERROR_NAMESPACE {
            return None;
        }
        Self::ALL.into_iter().find(|candidate| candidate.slug() == code.code())
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.tag())
    }
}

/// A provider failure with diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Failure tag.
    pub code: ApiErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Diagnostics such as `status` and `provider`.
    #[serde(default, skip_serializing_if = "ErrorMetadata::is_empty")]
    pub details: ErrorMetadata,
}

impl ApiError {
    /// Build an error with no details.
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: ErrorMetadata::new(),
        }
    }

    /// Attach a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Non-2xx answer from `provider`.
    pub fn http_status(provider: &ProviderId, status: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ApiError, message)
            .with_detail("provider", provider.as_str())
            .with_detail("status", status.to_string())
    }

    /// Call to `provider` exceeded `timeout_ms`.
    pub fn timeout(provider: &ProviderId, timeout_ms: u128) -> Self {
        Self::new(
            ApiErrorCode::RequestTimeout,
            format!("{provider} did not answer within {timeout_ms}ms"),
        )
        .with_detail("provider", provider.as_str())
        .with_detail("timeoutMs", timeout_ms.to_string())
    }

    /// Body from `provider` violates its contract.
    pub fn invalid_response(provider: &ProviderId, reason: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidResponse, reason).with_detail("provider", provider.as_str())
    }

    /// Body from `provider` held no completion.
    pub fn empty_response(provider: &ProviderId) -> Self {
        Self::new(
            ApiErrorCode::EmptyResponse,
            format!("{provider} returned an empty completion"),
        )
        .with_detail("provider", provider.as_str())
    }

    /// No adapter for `provider`.
    pub fn unsupported_provider(provider: &str) -> Self {
        Self::new(
            ApiErrorCode::UnsupportedProvider,
            format!("provider `{provider}` is not supported"),
        )
        .with_detail("provider", provider)
    }

    /// Transport failure talking to `provider`.
    pub fn network(provider: &ProviderId, message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NetworkFailure, message).with_detail("provider", provider.as_str())
    }

    /// HTTP status carried in the details, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.details.get("status").and_then(|raw| raw.parse().ok())
    }

    /// Recover a provider failure from an envelope.
    #[must_use]
    pub fn from_envelope(envelope: &ErrorEnvelope) -> Option<Self> {
        let code = ApiErrorCode::from_error_code(&envelope.code)?;
        Some(Self {
            code,
            message: envelope.message.clone(),
            details: envelope.metadata.clone(),
        })
    }

    fn kind_and_class(&self) -> (ErrorKind, ErrorClass) {
        match self.code {
            ApiErrorCode::RequestTimeout | ApiErrorCode::NetworkFailure => {
                (ErrorKind::Unexpected, ErrorClass::Retriable)
            },
            ApiErrorCode::ApiError => {
                let retriable = self
                    .status()
                    .is_some_and(|status| status == 408 || status == 429 || status >= 500);
                let class = if retriable {
                    ErrorClass::Retriable
                } else {
                    ErrorClass::NonRetriable
                };
                (ErrorKind::Unexpected, class)
            },
            ApiErrorCode::InvalidResponse => (ErrorKind::Unexpected, ErrorClass::NonRetriable),
            ApiErrorCode::EmptyResponse
            | ApiErrorCode::InvalidEndpoint
            | ApiErrorCode::UnsupportedProvider => (ErrorKind::Expected, ErrorClass::NonRetriable),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<ApiError> for ErrorEnvelope {
    fn from(error: ApiError) -> Self {
        let (kind, class) = error.kind_and_class();
        let code = error.code.error_code();
        let mut envelope = match kind {
            ErrorKind::Expected => Self::expected_with_class(code, error.message, class),
            ErrorKind::Invariant => Self::invariant(code, error.message),
            ErrorKind::Unexpected => Self::unexpected(code, error.message, class),
        };
        envelope.metadata.extend(error.details);
        envelope
    }
}

impl From<EndpointError> for ApiError {
    fn from(error: EndpointError) -> Self {
        let envelope = ErrorEnvelope::from(error);
        Self {
            code: ApiErrorCode::InvalidEndpoint,
            message: envelope.message,
            details: envelope.metadata,
        }
    }
}

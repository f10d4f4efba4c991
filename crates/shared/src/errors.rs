//! The workspace-wide error envelope.
//!
//! Every fallible operation returns [`ErrorEnvelope`]. Callers branch on the
//! `kind`/`class` pair; the `code` is for humans, logs, and the CLI's stable
//! `ERR_*` rendering.

use crate::redaction::is_secret_key;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::{fmt, io};

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Key/value diagnostics carried by an error.
pub type ErrorMetadata = BTreeMap<String, String>;

/// Placeholder written in place of secret metadata values.
pub const REDACTED_VALUE: &str = "<redacted>";

const CORE_NAMESPACE: &str = "core";

/// Who is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The caller or an upstream service broke a contract: bad input, bad
    /// document, refused endpoint.
    Expected,
    /// This workspace broke one of its own invariants.
    Invariant,
    /// The environment failed: network, disk, timeouts.
    Unexpected,
}

impl ErrorKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Expected => "expected",
            Self::Invariant => "invariant",
            Self::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

/// Whether repeating the failed call could succeed.
///
/// Nothing in this workspace retries on its own; the class is advice for
/// callers deciding whether to offer the user another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// A later attempt may succeed (timeouts, dropped connections).
    Retriable,
    /// Repeating the call unchanged will fail the same way.
    NonRetriable,
}

impl ErrorClass {
    /// `true` for [`ErrorClass::Retriable`].
    #[must_use]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Retriable)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(if self.is_retriable() {
            "retriable"
        } else {
            "non-retriable"
        })
    }
}

/// `namespace:code` pair, e.g. `config:invalid_timeout` or `provider:api_error`.
///
/// Codes are declared statically at the failure site; deserialized codes are
/// owned copies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    namespace: Cow<'static, str>,
    code: Cow<'static, str>,
}

impl ErrorCode {
    /// Code from a static namespace and name.
    #[must_use]
    pub const fn new(namespace: &'static str, code: &'static str) -> Self {
        Self {
            namespace: Cow::Borrowed(namespace),
            code: Cow::Borrowed(code),
        }
    }

    /// The operation was cancelled through its request context.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new(CORE_NAMESPACE, "cancelled")
    }

    /// Caller-supplied input failed validation.
    #[must_use]
    pub const fn invalid_input() -> Self {
        Self::new(CORE_NAMESPACE, "invalid_input")
    }

    /// A requested file or record does not exist.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::new(CORE_NAMESPACE, "not_found")
    }

    /// A deadline elapsed.
    #[must_use]
    pub const fn timeout() -> Self {
        Self::new(CORE_NAMESPACE, "timeout")
    }

    /// Disk or socket failure.
    #[must_use]
    pub const fn io() -> Self {
        Self::new(CORE_NAMESPACE, "io")
    }

    /// Internal invariant broken.
    #[must_use]
    pub const fn internal() -> Self {
        Self::new(CORE_NAMESPACE, "internal")
    }

    /// Namespace half, e.g. `config`.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Code half, e.g. `invalid_timeout`.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Upper-case rendering used on CLI surfaces: `ERR_CONFIG_INVALID_TIMEOUT`.
    #[must_use]
    pub fn screaming_tag(&self) -> String {
        format!(
            "ERR_{}_{}",
            self.namespace.to_ascii_uppercase(),
            self.code.to_ascii_uppercase()
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.namespace, self.code)
    }
}

/// Structured error shared across crates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Who is at fault.
    pub kind: ErrorKind,
    /// Retry advice.
    pub class: ErrorClass,
    /// Stable identifier.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Extra diagnostics; secrets are masked on output.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: ErrorMetadata,
}

impl ErrorEnvelope {
    /// Caller-side failure that will not fix itself.
    pub fn expected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::expected_with_class(code, message, ErrorClass::NonRetriable)
    }

    /// Caller-side failure with an explicit retry hint (rate limits, for one).
    pub fn expected_with_class(
        code: ErrorCode,
        message: impl Into<String>,
        class: ErrorClass,
    ) -> Self {
        Self::assemble(ErrorKind::Expected, class, code, message.into())
    }

    /// Broken internal invariant. Never retriable.
    pub fn invariant(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::assemble(
            ErrorKind::Invariant,
            ErrorClass::NonRetriable,
            code,
            message.into(),
        )
    }

    /// Environmental failure.
    pub fn unexpected(code: ErrorCode, message: impl Into<String>, class: ErrorClass) -> Self {
        Self::assemble(ErrorKind::Unexpected, class, code, message.into())
    }

    /// The caller cancelled the operation.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::expected(ErrorCode::cancelled(), message)
    }

    const fn assemble(kind: ErrorKind, class: ErrorClass, code: ErrorCode, message: String) -> Self {
        Self {
            kind,
            class,
            code,
            message,
            metadata: BTreeMap::new(),
        }
    }

    /// Whether this error records a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::cancelled()
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Metadata lookup.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Copy of the metadata with credential-looking entries masked.
    #[must_use]
    pub fn redacted_metadata(&self) -> ErrorMetadata {
        self.metadata
            .iter()
            .map(|(key, value)| {
                let value = if is_secret_key(key) {
                    REDACTED_VALUE.to_string()
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "[{}] {} ({}, {})",
            self.code, self.message, self.kind, self.class
        )
    }
}

impl std::error::Error for ErrorEnvelope {}

impl From<io::Error> for ErrorEnvelope {
    fn from(error: io::Error) -> Self {
        let (code, class) = match error.kind() {
            io::ErrorKind::NotFound => (ErrorCode::not_found(), ErrorClass::NonRetriable),
            io::ErrorKind::TimedOut => (ErrorCode::timeout(), ErrorClass::Retriable),
            io::ErrorKind::Interrupted => (ErrorCode::cancelled(), ErrorClass::Retriable),
            io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => (ErrorCode::io(), ErrorClass::Retriable),
            _ => (ErrorCode::io(), ErrorClass::NonRetriable),
        };
        Self::unexpected(code, error.to_string(), class)
    }
}

//! Stable error DTO rendered by CLI surfaces.

use polychat_domain::ApiError;
use polychat_shared::{ErrorClass, ErrorEnvelope};
use serde::Serialize;
use std::collections::BTreeMap;

/// Error payload safe to print or serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Stable code: the provider tag (`REQUEST_TIMEOUT`) or `ERR_{NAMESPACE}_{CODE}`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Error kind label.
    pub kind: String,
    /// Whether retrying the same call may succeed.
    pub retriable: bool,
    /// Metadata with secret-looking keys redacted.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl ErrorReport {
    /// Build a report from an error envelope.
    #[must_use]
    pub fn from_envelope(error: &ErrorEnvelope) -> Self {
        let code = ApiError::from_envelope(error).map_or_else(
            || error.code.screaming_tag(),
            |api| api.code.tag().to_string(),
        );
        Self {
            code,
            message: error.message.clone(),
            kind: error.kind.to_string(),
            retriable: error.class == ErrorClass::Retriable,
            meta: error.redacted_metadata(),
        }
    }
}

impl From<&ErrorEnvelope> for ErrorReport {
    fn from(error: &ErrorEnvelope) -> Self {
        Self::from_envelope(error)
    }
}

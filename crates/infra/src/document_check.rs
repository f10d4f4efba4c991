//! Offline validation of config documents for CLI surfaces.

use crate::InfraResult;
use polychat_config::{
    ConfigDomainSpec, ModesDomain, ProvidersDomain, TopicsDomain, parse_document_value,
    read_config_file, validate_document,
};
use polychat_domain::ConfigDomain;
use polychat_shared::{ErrorCode, ErrorEnvelope};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Result of checking one document against its domain schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCheck {
    /// Domain the document was checked against.
    pub domain: ConfigDomain,
    /// True when the document is structurally valid and fits the typed model.
    pub valid: bool,
    /// Declared version, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Number of entries, when the document parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    /// Human-readable findings, empty when valid.
    pub diagnostics: Vec<String>,
}

/// Check document text for `domain`.
///
/// Malformed JSON is an error; schema findings are reported in the result.
pub fn check_document_text(domain: ConfigDomain, text: &str) -> InfraResult<DocumentCheck> {
    let value: Value = serde_json::from_str(text).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_document_json"),
            format!("{domain} document is not valid JSON: {error}"),
        )
        .with_metadata("domain", domain.as_str())
    })?;

    let version = value
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);
    let report = validate_document(domain, &value);
    if !report.is_valid() {
        return Ok(DocumentCheck {
            domain,
            valid: false,
            version,
            entries: None,
            diagnostics: report.diagnostics().iter().map(ToString::to_string).collect(),
        });
    }

    let typed = match domain {
        ConfigDomain::Providers => entry_count::<ProvidersDomain>(value),
        ConfigDomain::Topics => entry_count::<TopicsDomain>(value),
        ConfigDomain::Modes => entry_count::<ModesDomain>(value),
    };
    Ok(match typed {
        Ok(entries) => DocumentCheck {
            domain,
            valid: true,
            version,
            entries: Some(entries),
            diagnostics: Vec::new(),
        },
        Err(reason) => DocumentCheck {
            domain,
            valid: false,
            version,
            entries: None,
            diagnostics: vec![reason],
        },
    })
}

/// Read and check a document file for `domain`.
pub fn check_document_file(domain: ConfigDomain, path: &Path) -> InfraResult<DocumentCheck> {
    let text = read_config_file(path)?;
    check_document_text(domain, &text)
}

fn entry_count<D: ConfigDomainSpec>(value: Value) -> Result<usize, String> {
    parse_document_value::<D>(value)
        .map(|document| document.entries.len())
        .map_err(|error| error.to_string())
}

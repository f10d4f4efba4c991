//! Structural validation of configuration documents.
//!
//! The validator works on raw JSON so that documents from untrusted sources
//! are checked before any typed deserialization. It never fails: callers get
//! a [`ValidationReport`] and decide what to do with an invalid document.

use crate::document::{ConfigDocument, ConfigDomainSpec};
use polychat_domain::{ConfigDomain, is_hex_color};
use polychat_shared::{ErrorCode, ErrorEnvelope};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

const REQUIRED_HEADER_FIELDS: [&str; 3] = ["version", "minAppVersion", "lastUpdated"];
const TAXONOMY_TEXT_FIELDS: [&str; 3] = ["id", "name", "description"];
const PROVIDER_TEXT_FIELDS: [&str; 4] = ["id", "name", "endpoint", "defaultModel"];
const KNOWN_PROTOCOLS: [&str; 4] = ["openai", "anthropic", "gemini", "custom"];

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// JSON path of the offending value (`entries[2].color`).
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.path, self.message)
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    /// Returns true when no diagnostics were recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Recorded diagnostics, in document order.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate a raw document for `domain`.
#[must_use]
pub fn validate_document(domain: ConfigDomain, document: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(root) = document.as_object() else {
        report.push("$", "document must be a JSON object");
        return report;
    };

    for field in REQUIRED_HEADER_FIELDS {
        require_text(root, field, field, &mut report);
    }
    if let Some(value) = root.get("updateUrl")
        && !value.is_string()
        && !value.is_null()
    {
        report.push("updateUrl", "must be a string");
    }
    if let Some(value) = root.get("customized")
        && !value.is_boolean()
    {
        report.push("customized", "must be a boolean");
    }

    match root.get("entries") {
        None => report.push("entries", "is required"),
        Some(Value::Array(entries)) => validate_entries(domain, entries, &mut report),
        Some(_) => report.push("entries", "must be an array"),
    }

    report
}

fn validate_entries(domain: ConfigDomain, entries: &[Value], report: &mut ValidationReport) {
    let mut seen_ids = BTreeSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let base = format!("entries[{index}]");
        let Some(object) = entry.as_object() else {
            report.push(base, "must be an object");
            continue;
        };

        if domain.is_taxonomy() {
            validate_taxonomy_entry(object, &base, report);
        } else {
            validate_provider_entry(object, &base, report);
        }

        if let Some(id) = object.get("id").and_then(Value::as_str)
            && !id.trim().is_empty()
            && !seen_ids.insert(id.trim().to_string())
        {
            report.push(format!("{base}.id"), format!("duplicate id `{id}`"));
        }
    }
}

fn validate_taxonomy_entry(entry: &Map<String, Value>, base: &str, report: &mut ValidationReport) {
    for field in TAXONOMY_TEXT_FIELDS {
        require_text(entry, field, &format!("{base}.{field}"), report);
    }

    match entry.get("color") {
        None => report.push(format!("{base}.color"), "is required"),
        Some(Value::String(color)) if is_hex_color(color) => {},
        Some(_) => report.push(
            format!("{base}.color"),
            "must be `#` followed by exactly 6 hex digits",
        ),
    }

    require_string_list(entry, "keywords", &format!("{base}.keywords"), report);

    if let Some(value) = entry.get("systemPrompt")
        && !value.is_string()
    {
        report.push(format!("{base}.systemPrompt"), "must be a string");
    }
}

fn validate_provider_entry(entry: &Map<String, Value>, base: &str, report: &mut ValidationReport) {
    for field in PROVIDER_TEXT_FIELDS {
        require_text(entry, field, &format!("{base}.{field}"), report);
    }

    match entry.get("models") {
        None => report.push(format!("{base}.models"), "is required"),
        Some(Value::Array(models)) => {
            for (index, model) in models.iter().enumerate() {
                let path = format!("{base}.models[{index}].id");
                match model.as_object() {
                    Some(object) => require_text(object, "id", &path, report),
                    None => report.push(format!("{base}.models[{index}]"), "must be an object"),
                }
            }
        },
        Some(_) => report.push(format!("{base}.models"), "must be an array"),
    }

    match entry.get("protocol").and_then(Value::as_str) {
        Some(protocol) if KNOWN_PROTOCOLS.contains(&protocol) => {},
        Some(protocol) => report.push(
            format!("{base}.protocol"),
            format!("unknown protocol `{protocol}`"),
        ),
        None => report.push(format!("{base}.protocol"), "is required"),
    }
}

fn require_text(
    object: &Map<String, Value>,
    field: &str,
    path: &str,
    report: &mut ValidationReport,
) {
    match object.get(field) {
        None => report.push(path, "is required"),
        Some(Value::String(text)) if !text.trim().is_empty() => {},
        Some(Value::String(_)) => report.push(path, "must be non-empty"),
        Some(_) => report.push(path, "must be a string"),
    }
}

fn require_string_list(
    object: &Map<String, Value>,
    field: &str,
    path: &str,
    report: &mut ValidationReport,
) {
    match object.get(field) {
        None => report.push(path, "is required"),
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                if !item.is_string() {
                    report.push(format!("{path}[{index}]"), "must be a string");
                }
            }
        },
        Some(_) => report.push(path, "must be an array of strings"),
    }
}

/// Why a document could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Text is not JSON.
    InvalidJson {
        /// Domain being parsed.
        domain: ConfigDomain,
        /// Parser diagnostic.
        reason: String,
    },
    /// JSON failed structural validation.
    SchemaViolation {
        /// Domain being parsed.
        domain: ConfigDomain,
        /// Validation findings.
        diagnostics: Vec<Diagnostic>,
    },
    /// Structurally valid JSON that still does not fit the typed model.
    TypeMismatch {
        /// Domain being parsed.
        domain: ConfigDomain,
        /// Deserializer diagnostic.
        reason: String,
    },
}

impl DocumentError {
    /// Domain the error refers to.
    #[must_use]
    pub const fn domain(&self) -> ConfigDomain {
        match self {
            Self::InvalidJson { domain, .. }
            | Self::SchemaViolation { domain, .. }
            | Self::TypeMismatch { domain, .. } => *domain,
        }
    }

    fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidJson { .. } => ErrorCode::new("config", "invalid_document_json"),
            Self::SchemaViolation { .. } | Self::TypeMismatch { .. } => {
                ErrorCode::new("config", "invalid_document")
            },
        }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson { domain, reason } => {
                write!(formatter, "{domain} document is not valid JSON: {reason}")
            },
            Self::SchemaViolation {
                domain,
                diagnostics,
            } => {
                write!(formatter, "{domain} document failed validation")?;
                if let Some(first) = diagnostics.first() {
                    write!(formatter, " ({first}")?;
                    if diagnostics.len() > 1 {
                        write!(formatter, " and {} more", diagnostics.len() - 1)?;
                    }
                    formatter.write_str(")")?;
                }
                Ok(())
            },
            Self::TypeMismatch { domain, reason } => {
                write!(formatter, "{domain} document has unexpected shape: {reason}")
            },
        }
    }
}

impl std::error::Error for DocumentError {}

impl From<DocumentError> for ErrorEnvelope {
    fn from(error: DocumentError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string())
            .with_metadata("domain", error.domain().as_str());
        match error {
            DocumentError::SchemaViolation { diagnostics, .. } => {
                let paths: Vec<&str> = diagnostics.iter().map(|item| item.path.as_str()).collect();
                envelope
                    .with_metadata("diagnostics", diagnostics.len().to_string())
                    .with_metadata("paths", paths.join(","))
            },
            DocumentError::InvalidJson { .. } | DocumentError::TypeMismatch { .. } => envelope,
        }
    }
}

/// Parse and validate a document for the domain bound by `D`.
pub fn parse_document<D: ConfigDomainSpec>(
    raw: &str,
) -> Result<ConfigDocument<D::Entry>, DocumentError> {
    let value: Value = serde_json::from_str(raw).map_err(|error| DocumentError::InvalidJson {
        domain: D::DOMAIN,
        reason: error.to_string(),
    })?;
    parse_document_value::<D>(value)
}

/// Validate and deserialize an already-parsed document.
pub fn parse_document_value<D: ConfigDomainSpec>(
    value: Value,
) -> Result<ConfigDocument<D::Entry>, DocumentError> {
    let report = validate_document(D::DOMAIN, &value);
    if !report.is_valid() {
        return Err(DocumentError::SchemaViolation {
            domain: D::DOMAIN,
            diagnostics: report.diagnostics,
        });
    }

    serde_json::from_value(value).map_err(|error| DocumentError::TypeMismatch {
        domain: D::DOMAIN,
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn taxonomy_document() -> Value {
        json!({
            "version": "1.0.0",
            "minAppVersion": "1.0.0",
            "lastUpdated": "2025-03-01T00:00:00Z",
            "entries": [{
                "id": "general",
                "name": "General",
                "description": "Anything goes",
                "color": "#A1B2C3",
                "keywords": ["misc"],
                "systemPrompt": "Be helpful."
            }]
        })
    }

    fn paths(report: &ValidationReport) -> Vec<&str> {
        report
            .diagnostics()
            .iter()
            .map(|item| item.path.as_str())
            .collect()
    }

    #[test]
    fn accepts_complete_taxonomy_document() {
        let report = validate_document(ConfigDomain::Topics, &taxonomy_document());
        assert!(report.is_valid(), "{:?}", report.diagnostics());
    }

    #[test]
    fn rejects_each_missing_header_field() {
        for field in REQUIRED_HEADER_FIELDS {
            let mut document = taxonomy_document();
            if let Some(root) = document.as_object_mut() {
                root.remove(field);
            }
            let report = validate_document(ConfigDomain::Topics, &document);
            assert!(!report.is_valid());
            assert_eq!(paths(&report), vec![field]);
        }
    }

    #[test]
    fn rejects_non_object_root() {
        let report = validate_document(ConfigDomain::Modes, &json!([1, 2]));
        assert_eq!(paths(&report), vec!["$"]);
    }

    #[test]
    fn rejects_bad_colors_with_entry_path() {
        for color in ["A1B2C3", "#A1B2C", "#A1B2C3D", "#GGGGGG", "red"] {
            let mut document = taxonomy_document();
            document["entries"][0]["color"] = json!(color);
            let report = validate_document(ConfigDomain::Topics, &document);
            assert_eq!(paths(&report), vec!["entries[0].color"], "color {color}");
        }
    }

    #[test]
    fn rejects_duplicate_ids_and_bad_keywords() {
        let mut document = taxonomy_document();
        let entry = document["entries"][0].clone();
        let mut second = entry.clone();
        second["keywords"] = json!(["ok", 3]);
        document["entries"] = json!([entry, second]);

        let report = validate_document(ConfigDomain::Topics, &document);
        assert_eq!(
            paths(&report),
            vec!["entries[1].keywords[1]", "entries[1].id"]
        );
    }

    #[test]
    fn provider_entries_need_endpoint_models_and_protocol() {
        let document = json!({
            "version": "1.0.0",
            "minAppVersion": "1.0.0",
            "lastUpdated": "2025-03-01T00:00:00Z",
            "entries": [{
                "id": "acme",
                "name": "Acme",
                "endpoint": "",
                "defaultModel": "acme-1",
                "models": [{ "name": "missing id" }],
                "protocol": "smoke-signals"
            }]
        });

        let report = validate_document(ConfigDomain::Providers, &document);
        assert_eq!(
            paths(&report),
            vec![
                "entries[0].endpoint",
                "entries[0].models[0].id",
                "entries[0].protocol"
            ]
        );
    }

    #[test]
    fn schema_violation_maps_to_envelope() {
        let error = DocumentError::SchemaViolation {
            domain: ConfigDomain::Modes,
            diagnostics: vec![Diagnostic {
                path: "version".to_string(),
                message: "is required".to_string(),
            }],
        };
        let envelope = ErrorEnvelope::from(error);
        assert_eq!(envelope.code, ErrorCode::new("config", "invalid_document"));
        assert_eq!(envelope.metadata_value("domain"), Some("modes"));
        assert_eq!(envelope.metadata_value("paths"), Some("version"));
    }

    proptest! {
        #[test]
        fn any_valid_hex_color_is_accepted(digits in "[0-9a-fA-F]{6}") {
            let mut document = taxonomy_document();
            document["entries"][0]["color"] = json!(format!("#{digits}"));
            prop_assert!(validate_document(ConfigDomain::Modes, &document).is_valid());
        }

        #[test]
        fn wrong_length_colors_are_rejected(digits in "[0-9a-f]{0,5}|[0-9a-f]{7,9}") {
            let mut document = taxonomy_document();
            document["entries"][0]["color"] = json!(format!("#{digits}"));
            prop_assert!(!validate_document(ConfigDomain::Modes, &document).is_valid());
        }
    }
}

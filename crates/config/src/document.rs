//! Versioned configuration documents and their per-domain bindings.

use polychat_domain::{ConfigDomain, ProviderDescriptor, TaxonomyEntry, Version};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A versioned configuration document.
///
/// Documents are replaced wholesale and never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument<E> {
    /// Document version (`major.minor.patch`).
    pub version: String,
    /// Oldest application version able to use this document.
    pub min_app_version: String,
    /// Timestamp of the last edit, as written by the publisher.
    pub last_updated: String,
    /// Where newer revisions are published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    /// User-edited documents are exempt from automatic refresh.
    #[serde(default)]
    pub customized: bool,
    /// Domain entries, in display order.
    pub entries: Vec<E>,
}

impl<E> ConfigDocument<E> {
    /// Parsed document version.
    #[must_use]
    pub fn parsed_version(&self) -> Version {
        Version::parse_lenient(&self.version)
    }

    /// Returns true when an app at `running` may adopt this document.
    #[must_use]
    pub fn supports_app(&self, running: &str) -> bool {
        polychat_domain::is_compatible(running, &self.min_app_version)
    }

    /// Update URL, ignoring blank values.
    #[must_use]
    pub fn refresh_url(&self) -> Option<&str> {
        self.update_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Binding between a [`ConfigDomain`] and its entry type and bundled data.
pub trait ConfigDomainSpec: Send + Sync + 'static {
    /// Entry type carried in `entries`.
    type Entry: Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    /// Domain label.
    const DOMAIN: ConfigDomain;

    /// Bundled document text shipped with the binary.
    fn bundled_json() -> &'static str;

    /// Minimal single-entry document used when the bundled one is unusable.
    fn emergency_fallback() -> ConfigDocument<Self::Entry>;
}

/// Provider catalog binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvidersDomain;

/// Topic taxonomy binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicsDomain;

/// Mode taxonomy binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModesDomain;

/// Provider catalog document.
pub type ProviderCatalog = ConfigDocument<ProviderDescriptor>;

/// Taxonomy document (topics or modes).
pub type TaxonomyDocument = ConfigDocument<TaxonomyEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn document(update_url: Option<&str>) -> ConfigDocument<String> {
        ConfigDocument {
            version: "1.2.0".to_string(),
            min_app_version: "1.1.0".to_string(),
            last_updated: "2025-01-01T00:00:00Z".to_string(),
            update_url: update_url.map(str::to_string),
            customized: false,
            entries: vec![],
        }
    }

    #[test]
    fn refresh_url_ignores_blank() {
        assert_eq!(document(Some("  ")).refresh_url(), None);
        assert_eq!(document(None).refresh_url(), None);
        assert_eq!(
            document(Some("https://host/x.json")).refresh_url(),
            Some("https://host/x.json")
        );
    }

    #[test]
    fn app_support_uses_min_app_version() {
        let doc = document(None);
        assert!(doc.supports_app("1.1.0"));
        assert!(doc.supports_app("1.10.0"));
        assert!(!doc.supports_app("1.0.9"));
        assert_eq!(doc.parsed_version(), Version::new(1, 2, 0));
    }

    #[test]
    fn customized_defaults_to_false() -> Result<(), serde_json::Error> {
        let doc: ConfigDocument<String> = serde_json::from_str(
            r#"{"version":"1.0.0","minAppVersion":"1.0.0","lastUpdated":"x","entries":["a"]}"#,
        )?;
        assert!(!doc.customized);
        assert_eq!(doc.entries, vec!["a".to_string()]);
        Ok(())
    }
}

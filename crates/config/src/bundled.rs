//! Documents compiled into the binary.
//!
//! Bundled documents are the baseline the loader falls back to. The emergency
//! fallbacks are built in code so that they stay usable even if a bundled
//! file is broken by a bad edit.

use crate::document::{
    ConfigDocument, ConfigDomainSpec, ModesDomain, ProviderCatalog, ProvidersDomain,
    TaxonomyDocument, TopicsDomain,
};
use polychat_domain::{
    AuthScheme, ConfigDomain, HexColor, ModelDescriptor, ProtocolFamily, ProviderCapabilities,
    ProviderDescriptor, ProviderId, TaxonomyEntry,
};

const BUNDLED_PROVIDERS: &str = include_str!("../resources/providers.json");
const BUNDLED_TOPICS: &str = include_str!("../resources/topics.json");
const BUNDLED_MODES: &str = include_str!("../resources/modes.json");

/// Version carried by every emergency fallback document.
pub const EMERGENCY_VERSION: &str = "0.0.0";

const EMERGENCY_TIMESTAMP: &str = "1970-01-01T00:00:00Z";
const NEUTRAL_COLOR: &str = "#6B7280";

/// Bundled document text for `domain`.
#[must_use]
pub const fn bundled_json(domain: ConfigDomain) -> &'static str {
    match domain {
        ConfigDomain::Providers => BUNDLED_PROVIDERS,
        ConfigDomain::Topics => BUNDLED_TOPICS,
        ConfigDomain::Modes => BUNDLED_MODES,
    }
}

fn emergency_document<E>(entries: Vec<E>) -> ConfigDocument<E> {
    ConfigDocument {
        version: EMERGENCY_VERSION.to_string(),
        min_app_version: EMERGENCY_VERSION.to_string(),
        last_updated: EMERGENCY_TIMESTAMP.to_string(),
        update_url: None,
        customized: false,
        entries,
    }
}

fn emergency_taxonomy(id: &str, name: &str, system_prompt: &str) -> TaxonomyDocument {
    let entries = HexColor::parse(NEUTRAL_COLOR)
        .map(|color| TaxonomyEntry {
            id: id.to_string(),
            name: name.to_string(),
            description: name.to_string(),
            color,
            keywords: Vec::new(),
            system_prompt: system_prompt.to_string(),
        })
        .into_iter()
        .collect();
    emergency_document(entries)
}

fn emergency_providers() -> ProviderCatalog {
    let entries = ProviderId::parse("openai")
        .map(|id| ProviderDescriptor {
            id,
            name: "OpenAI".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            default_model: "gpt-4o-mini".to_string(),
            models: vec![ModelDescriptor {
                id: "gpt-4o-mini".to_string(),
                name: "GPT-4o mini".to_string(),
            }],
            capabilities: ProviderCapabilities {
                multimodal: false,
                retrieval: false,
                temperature: true,
            },
            auth: AuthScheme::Bearer,
            protocol: ProtocolFamily::OpenAi,
        })
        .into_iter()
        .collect();
    emergency_document(entries)
}

impl ConfigDomainSpec for ProvidersDomain {
    type Entry = ProviderDescriptor;

    const DOMAIN: ConfigDomain = ConfigDomain::Providers;

    fn bundled_json() -> &'static str {
        BUNDLED_PROVIDERS
    }

    fn emergency_fallback() -> ConfigDocument<Self::Entry> {
        emergency_providers()
    }
}

impl ConfigDomainSpec for TopicsDomain {
    type Entry = TaxonomyEntry;

    const DOMAIN: ConfigDomain = ConfigDomain::Topics;

    fn bundled_json() -> &'static str {
        BUNDLED_TOPICS
    }

    fn emergency_fallback() -> ConfigDocument<Self::Entry> {
        emergency_taxonomy("general", "General", "")
    }
}

impl ConfigDomainSpec for ModesDomain {
    type Entry = TaxonomyEntry;

    const DOMAIN: ConfigDomain = ConfigDomain::Modes;

    fn bundled_json() -> &'static str {
        BUNDLED_MODES
    }

    fn emergency_fallback() -> ConfigDocument<Self::Entry> {
        emergency_taxonomy("chat", "Chat", "You are a helpful assistant.")
    }
}

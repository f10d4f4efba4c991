//! Runtime composition: settings, config loaders, and the chat dispatcher.

use crate::InfraResult;
use crate::cache_factory::build_config_cache;
use crate::dispatcher_factory::build_dispatcher;
use polychat_adapters::{BroadcastEventBus, HttpConfigFetcher, TimedHttpClient};
use polychat_app::{ChatDispatcher, ConfigLoader, ConfigLoaderDeps, LoadedDocument, RefreshOutcome};
use polychat_config::{
    ModesDomain, ProvidersDomain, TopicsDomain, ValidatedClientSettings, to_pretty_json,
};
use polychat_domain::{ChatRequest, ChatResponse, ConfigDomain, EndpointValidator};
use polychat_ports::{ConfigCachePort, ConfigEventPort, ConfigUpdated, LoggerPort};
use polychat_shared::{RequestContext, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Provenance and shape of the document currently selected for a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    /// Domain label.
    pub domain: ConfigDomain,
    /// Selected document version.
    pub version: String,
    /// Tier the document came from (`bundled`, `cached`, or `fallback`).
    pub source: String,
    /// Oldest application version the document supports.
    pub min_app_version: String,
    /// Whether the document is user-edited.
    pub customized: bool,
    /// Number of entries.
    pub entries: usize,
    /// Entry identifiers, in display order.
    pub ids: Vec<String>,
}

/// Assembled client runtime.
pub struct ChatRuntime {
    settings: ValidatedClientSettings,
    providers: ConfigLoader<ProvidersDomain>,
    topics: ConfigLoader<TopicsDomain>,
    modes: ConfigLoader<ModesDomain>,
    dispatcher: ChatDispatcher,
    events: Arc<BroadcastEventBus>,
    http: Arc<TimedHttpClient>,
    logger: Arc<dyn LoggerPort>,
}

impl ChatRuntime {
    /// Build a runtime with the cache selected by `settings`.
    pub fn build(settings: ValidatedClientSettings, logger: Arc<dyn LoggerPort>) -> InfraResult<Self> {
        let cache = build_config_cache(&settings)?;
        Self::build_with_cache(settings, cache, logger)
    }

    /// Build a runtime over an explicit cache.
    pub fn build_with_cache(
        settings: ValidatedClientSettings,
        cache: Arc<dyn ConfigCachePort>,
        logger: Arc<dyn LoggerPort>,
    ) -> InfraResult<Self> {
        let http = Arc::new(TimedHttpClient::new(settings.timeout())?);
        let endpoints = EndpointValidator::new(settings.http.allow_loopback);
        let events = Arc::new(BroadcastEventBus::new());
        let deps = ConfigLoaderDeps {
            cache,
            fetch: Arc::new(HttpConfigFetcher::new(Arc::clone(&http), endpoints)),
            events: Arc::clone(&events) as Arc<dyn ConfigEventPort>,
            logger: Some(Arc::clone(&logger)),
        };

        let app_version: Arc<str> = Arc::from(settings.app_version.as_str());
        let providers = ConfigLoader::new(deps.clone(), Arc::clone(&app_version));
        let topics = ConfigLoader::new(deps.clone(), Arc::clone(&app_version));
        let modes = ConfigLoader::new(deps, app_version);

        let catalog = providers.load_document().document;
        let dispatcher = build_dispatcher(&catalog, &settings, &http, Some(Arc::clone(&logger)));
        tracing::debug!(
            providers = catalog.entries.len(),
            catalog_version = %catalog.version,
            "chat runtime assembled"
        );

        Ok(Self {
            settings,
            providers,
            topics,
            modes,
            dispatcher,
            events,
            http,
            logger,
        })
    }

    /// Effective settings.
    #[must_use]
    pub const fn settings(&self) -> &ValidatedClientSettings {
        &self.settings
    }

    /// Provider catalog loader.
    #[must_use]
    pub const fn providers(&self) -> &ConfigLoader<ProvidersDomain> {
        &self.providers
    }

    /// Topic taxonomy loader.
    #[must_use]
    pub const fn topics(&self) -> &ConfigLoader<TopicsDomain> {
        &self.topics
    }

    /// Mode taxonomy loader.
    #[must_use]
    pub const fn modes(&self) -> &ConfigLoader<ModesDomain> {
        &self.modes
    }

    /// Chat dispatcher built from the provider catalog.
    #[must_use]
    pub const fn dispatcher(&self) -> &ChatDispatcher {
        &self.dispatcher
    }

    /// Subscribe to config change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigUpdated> {
        self.events.subscribe()
    }

    /// Send one chat request through the dispatcher.
    pub async fn send_chat(&self, ctx: &RequestContext, request: ChatRequest) -> Result<ChatResponse> {
        self.dispatcher.send(ctx, request).await
    }

    /// Run one remote refresh for `domain` and wait for it.
    pub async fn refresh(&self, domain: ConfigDomain) -> RefreshOutcome {
        match domain {
            ConfigDomain::Providers => self.providers.refresh().await,
            ConfigDomain::Topics => self.topics.refresh().await,
            ConfigDomain::Modes => self.modes.refresh().await,
        }
    }

    /// Start background refreshes for every domain.
    ///
    /// Returns no handles outside a tokio runtime.
    pub fn spawn_refreshes(&self) -> Vec<JoinHandle<RefreshOutcome>> {
        let mut handles = Vec::with_capacity(ConfigDomain::ALL.len());
        handles.extend(self.providers.load_and_spawn_refresh().1);
        handles.extend(self.topics.load_and_spawn_refresh().1);
        handles.extend(self.modes.load_and_spawn_refresh().1);
        handles
    }

    /// Rebuild the dispatcher from the currently selected provider catalog.
    pub fn reload_providers(&mut self) {
        let catalog = self.providers.load_document().document;
        self.dispatcher = build_dispatcher(
            &catalog,
            &self.settings,
            &self.http,
            Some(Arc::clone(&self.logger)),
        );
    }

    /// Summary of the document currently selected for `domain`.
    #[must_use]
    pub fn document_summary(&self, domain: ConfigDomain) -> DocumentSummary {
        match domain {
            ConfigDomain::Providers => {
                summarize(domain, &self.providers.load_document(), |entry| entry.id.to_string())
            },
            ConfigDomain::Topics => {
                summarize(domain, &self.topics.load_document(), |entry| entry.id.clone())
            },
            ConfigDomain::Modes => {
                summarize(domain, &self.modes.load_document(), |entry| entry.id.clone())
            },
        }
    }

    /// Selected document for `domain` as JSON.
    pub fn document_json(&self, domain: ConfigDomain) -> InfraResult<String> {
        match domain {
            ConfigDomain::Providers => to_pretty_json(&self.providers.load_document().document),
            ConfigDomain::Topics => to_pretty_json(&self.topics.load_document().document),
            ConfigDomain::Modes => to_pretty_json(&self.modes.load_document().document),
        }
    }
}

impl std::fmt::Debug for ChatRuntime {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChatRuntime")
            .field("settings", &self.settings)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

fn summarize<E>(
    domain: ConfigDomain,
    loaded: &LoadedDocument<E>,
    id: impl Fn(&E) -> String,
) -> DocumentSummary {
    let document = &loaded.document;
    DocumentSummary {
        domain,
        version: document.version.clone(),
        source: loaded.source.as_str().to_string(),
        min_app_version: document.min_app_version.clone(),
        customized: document.customized,
        entries: document.entries.len(),
        ids: document.entries.iter().map(id).collect(),
    }
}

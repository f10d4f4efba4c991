//! Best-available configuration for one domain.
//!
//! Loading never fails: the embedded document (or its emergency fallback) is
//! always available, a validated cached document replaces it only when
//! strictly newer, and a detached refresh may populate the cache for the
//! next load.

use polychat_config::{ConfigDocument, ConfigDomainSpec, parse_document};
use polychat_domain::{ConfigDomain, compare_versions, is_newer};
use polychat_ports::{
    ConfigCachePort, ConfigEventPort, ConfigFetchPort, ConfigUpdated, LogFields, LoggerPort,
    log_fields,
};
use polychat_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result, redact_url};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle, spawn_blocking};

/// Where the selected document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource {
    /// Document compiled into the binary.
    Bundled,
    /// Emergency document used because the bundled one was unusable.
    Fallback,
    /// Document adopted by an earlier refresh.
    Cached,
}

impl DocumentSource {
    /// Stable label for logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bundled => "bundled",
            Self::Fallback => "fallback",
            Self::Cached => "cached",
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Selected document with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument<E> {
    /// The document callers should use.
    pub document: ConfigDocument<E>,
    /// Tier it was selected from.
    pub source: DocumentSource,
}

/// Result of one remote refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Remote document cached and announced.
    Updated {
        /// Adopted version.
        version: String,
    },
    /// A customized document is in effect.
    SkippedCustomized,
    /// The selected document names no update URL.
    SkippedNoUrl,
    /// Remote document is not strictly newer.
    NotNewer {
        /// Remote version.
        remote: String,
        /// Version already in effect.
        current: String,
    },
    /// Remote document requires a newer application.
    Incompatible {
        /// Remote version.
        remote: String,
        /// Application version it requires.
        min_app_version: String,
    },
    /// Fetch, validation, or cache write failed.
    Failed(ErrorEnvelope),
}

impl RefreshOutcome {
    /// Stable label for logs and CLI output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "updated",
            Self::SkippedCustomized => "skipped_customized",
            Self::SkippedNoUrl => "skipped_no_url",
            Self::NotNewer { .. } => "not_newer",
            Self::Incompatible { .. } => "incompatible",
            Self::Failed(_) => "failed",
        }
    }

    /// Returns true when the cache now holds a newer document.
    #[must_use]
    pub const fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Dependencies shared by the loaders of every domain.
#[derive(Clone)]
pub struct ConfigLoaderDeps {
    /// Persisted document store.
    pub cache: Arc<dyn ConfigCachePort>,
    /// Remote document retrieval.
    pub fetch: Arc<dyn ConfigFetchPort>,
    /// Change notifications.
    pub events: Arc<dyn ConfigEventPort>,
    /// Optional logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
}

struct Selection<E> {
    loaded: LoadedDocument<E>,
    cache_customized: bool,
}

/// Loader for the domain bound by `D`.
pub struct ConfigLoader<D: ConfigDomainSpec> {
    deps: ConfigLoaderDeps,
    app_version: Arc<str>,
    bundled: Option<Arc<str>>,
    _domain: PhantomData<fn() -> D>,
}

impl<D: ConfigDomainSpec> Clone for ConfigLoader<D> {
    fn clone(&self) -> Self {
        Self {
            deps: self.deps.clone(),
            app_version: Arc::clone(&self.app_version),
            bundled: self.bundled.clone(),
            _domain: PhantomData,
        }
    }
}

impl<D: ConfigDomainSpec> fmt::Debug for ConfigLoader<D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConfigLoader")
            .field("domain", &D::DOMAIN)
            .field("app_version", &self.app_version)
            .finish_non_exhaustive()
    }
}

impl<D: ConfigDomainSpec> ConfigLoader<D> {
    /// Create a loader for an application running at `app_version`.
    pub fn new(deps: ConfigLoaderDeps, app_version: impl Into<Arc<str>>) -> Self {
        Self {
            deps,
            app_version: app_version.into(),
            bundled: None,
            _domain: PhantomData,
        }
    }

    /// Replace the embedded baseline document text.
    #[must_use]
    pub fn with_bundled_json(mut self, raw: impl Into<Arc<str>>) -> Self {
        self.bundled = Some(raw.into());
        self
    }

    /// Domain served by this loader.
    #[must_use]
    pub const fn domain(&self) -> ConfigDomain {
        D::DOMAIN
    }

    /// Application version used for compatibility gating.
    #[must_use]
    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    /// Return the best available document and start a background refresh.
    ///
    /// The refresh only affects later loads.
    pub fn load_config(&self) -> ConfigDocument<D::Entry> {
        let (loaded, _refresh) = self.load_and_spawn_refresh();
        loaded.document
    }

    /// Like [`Self::load_config`], also returning the provenance and the
    /// refresh task handle. No task is spawned outside a tokio runtime.
    pub fn load_and_spawn_refresh(
        &self,
    ) -> (LoadedDocument<D::Entry>, Option<JoinHandle<RefreshOutcome>>) {
        let selection = self.select();
        let loaded = selection.loaded.clone();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let loader = self.clone();
                Some(runtime.spawn(async move { loader.refresh_from(&selection).await }))
            },
            Err(_) => {
                self.log_info(
                    "config.refresh.skipped",
                    "no async runtime; remote refresh skipped",
                    [("reason", json!("no_runtime"))],
                );
                None
            },
        };

        (loaded, handle)
    }

    /// Select the best available document without refreshing.
    pub fn load_document(&self) -> LoadedDocument<D::Entry> {
        self.select().loaded
    }

    /// Run one refresh against the currently selected document.
    ///
    /// Cache access runs on the blocking pool.
    #[tracing::instrument(skip_all, fields(domain = D::DOMAIN.as_str()))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let loader = self.clone();
        match spawn_blocking(move || loader.select()).await {
            Ok(selection) => self.refresh_from(&selection).await,
            Err(error) => {
                let outcome = RefreshOutcome::Failed(cache_task_failed(&error));
                self.log_outcome(&outcome);
                outcome
            },
        }
    }

    fn select(&self) -> Selection<D::Entry> {
        let baseline = self.load_baseline();
        let cached = self.load_cached();
        let cache_customized = cached.as_ref().is_some_and(|document| document.customized);

        let loaded = match cached {
            Some(document)
                if compare_versions(&document.version, &baseline.document.version)
                    == Ordering::Greater =>
            {
                LoadedDocument {
                    document,
                    source: DocumentSource::Cached,
                }
            },
            _ => baseline,
        };

        self.log_info(
            "config.load.selected",
            "configuration selected",
            [
                ("source", json!(loaded.source.as_str())),
                ("version", json!(loaded.document.version)),
                ("entries", json!(loaded.document.entries.len())),
            ],
        );

        Selection {
            loaded,
            cache_customized,
        }
    }

    fn load_baseline(&self) -> LoadedDocument<D::Entry> {
        let raw = match &self.bundled {
            Some(raw) => raw.as_ref(),
            None => D::bundled_json(),
        };

        match parse_document::<D>(raw) {
            Ok(document) => LoadedDocument {
                document,
                source: DocumentSource::Bundled,
            },
            Err(error) => {
                self.log_envelope(
                    "config.load.bundled_invalid",
                    &ErrorEnvelope::from(error),
                );
                LoadedDocument {
                    document: D::emergency_fallback(),
                    source: DocumentSource::Fallback,
                }
            },
        }
    }

    fn load_cached(&self) -> Option<ConfigDocument<D::Entry>> {
        let raw = match self.deps.cache.read(&D::DOMAIN.document_cache_key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.log_debug("config.load.cache_miss", "no cached document", []);
                return None;
            },
            Err(error) => {
                self.log_envelope("config.cache.read_failed", &error);
                return None;
            },
        };

        let document = match parse_document::<D>(&raw) {
            Ok(document) => document,
            Err(error) => {
                self.purge_cache("invalid", &error.to_string());
                return None;
            },
        };

        let stored_version = match self.deps.cache.read(&D::DOMAIN.version_cache_key()) {
            Ok(stored) => stored,
            Err(error) => {
                self.log_envelope("config.cache.read_failed", &error);
                None
            },
        };
        if stored_version.as_deref().map(str::trim) != Some(document.version.as_str()) {
            self.purge_cache(
                "version_mismatch",
                &format!(
                    "stored version {} does not match document version {}",
                    stored_version.as_deref().unwrap_or("<none>"),
                    document.version
                ),
            );
            return None;
        }

        if !document.supports_app(&self.app_version) {
            self.purge_cache(
                "incompatible",
                &format!(
                    "document requires app {} (running {})",
                    document.min_app_version, self.app_version
                ),
            );
            return None;
        }

        Some(document)
    }

    fn purge_cache(&self, reason: &str, detail: &str) {
        for key in [
            D::DOMAIN.document_cache_key(),
            D::DOMAIN.version_cache_key(),
        ] {
            if let Err(error) = self.deps.cache.remove(&key) {
                self.log_envelope("config.cache.purge_failed", &error);
            }
        }
        if let Some(logger) = self.deps.logger.as_ref() {
            logger.warn(
                "config.cache.purged",
                detail,
                Some(self.fields([("reason", json!(reason))])),
            );
        }
    }

    async fn refresh_from(&self, selection: &Selection<D::Entry>) -> RefreshOutcome {
        let outcome = self.run_refresh(selection).await;
        self.log_outcome(&outcome);
        outcome
    }

    async fn run_refresh(&self, selection: &Selection<D::Entry>) -> RefreshOutcome {
        let current = &selection.loaded.document;
        if current.customized || selection.cache_customized {
            return RefreshOutcome::SkippedCustomized;
        }
        let Some(url) = current.refresh_url() else {
            return RefreshOutcome::SkippedNoUrl;
        };

        self.log_debug(
            "config.refresh.start",
            "fetching remote configuration",
            [("url", json!(redact_url(url)))],
        );

        let ctx = RequestContext::new_refresh();
        let raw = match self.deps.fetch.fetch(&ctx, url).await {
            Ok(raw) => raw,
            Err(error) => return RefreshOutcome::Failed(error),
        };
        let remote = match parse_document::<D>(&raw) {
            Ok(document) => document,
            Err(error) => return RefreshOutcome::Failed(error.into()),
        };

        if !remote.supports_app(&self.app_version) {
            return RefreshOutcome::Incompatible {
                remote: remote.version,
                min_app_version: remote.min_app_version,
            };
        }
        if !is_newer(&remote.version, &current.version) {
            return RefreshOutcome::NotNewer {
                remote: remote.version,
                current: current.version.clone(),
            };
        }

        if let Err(error) = self.persist(raw, remote.version.clone()).await {
            return RefreshOutcome::Failed(error);
        }
        self.deps.events.publish(ConfigUpdated {
            domain: D::DOMAIN,
            version: remote.version.as_str().into(),
        });

        RefreshOutcome::Updated {
            version: remote.version,
        }
    }

    async fn persist(&self, raw: String, version: String) -> Result<()> {
        let cache = Arc::clone(&self.deps.cache);
        let document_key = D::DOMAIN.document_cache_key();
        let version_key = D::DOMAIN.version_cache_key();
        spawn_blocking(move || {
            cache.write(&document_key, &raw)?;
            cache.write(&version_key, &version)
        })
        .await
        .map_err(|error| cache_task_failed(&error))?
    }

    fn log_outcome(&self, outcome: &RefreshOutcome) {
        let Some(logger) = self.deps.logger.as_ref() else {
            return;
        };
        let outcome_field = ("outcome", json!(outcome.as_str()));
        match outcome {
            RefreshOutcome::Updated { version } => logger.info(
                "config.refresh.updated",
                "newer configuration cached",
                Some(self.fields([outcome_field, ("version", json!(version))])),
            ),
            RefreshOutcome::SkippedCustomized | RefreshOutcome::SkippedNoUrl => logger.debug(
                "config.refresh.skipped",
                "remote refresh skipped",
                Some(self.fields([outcome_field])),
            ),
            RefreshOutcome::NotNewer { remote, current } => logger.debug(
                "config.refresh.not_newer",
                "remote configuration is not newer",
                Some(self.fields([
                    outcome_field,
                    ("remote", json!(remote)),
                    ("current", json!(current)),
                ])),
            ),
            RefreshOutcome::Incompatible {
                remote,
                min_app_version,
            } => logger.warn(
                "config.refresh.incompatible",
                "remote configuration requires a newer application",
                Some(self.fields([
                    outcome_field,
                    ("remote", json!(remote)),
                    ("minAppVersion", json!(min_app_version)),
                    ("appVersion", json!(self.app_version.as_ref())),
                ])),
            ),
            RefreshOutcome::Failed(error) => logger.warn_error(
                "config.refresh.failed",
                error,
                Some(self.fields([outcome_field])),
            ),
        }
    }

    fn fields<const N: usize>(&self, pairs: [(&str, Value); N]) -> LogFields {
        let mut fields = log_fields(pairs);
        fields.insert("domain".into(), json!(D::DOMAIN.as_str()));
        fields
    }

    fn log_debug<const N: usize>(&self, event: &str, message: &str, pairs: [(&str, Value); N]) {
        if let Some(logger) = self.deps.logger.as_ref() {
            logger.debug(event, message, Some(self.fields(pairs)));
        }
    }

    fn log_info<const N: usize>(&self, event: &str, message: &str, pairs: [(&str, Value); N]) {
        if let Some(logger) = self.deps.logger.as_ref() {
            logger.info(event, message, Some(self.fields(pairs)));
        }
    }

    fn log_envelope(&self, event: &str, error: &ErrorEnvelope) {
        if let Some(logger) = self.deps.logger.as_ref() {
            logger.warn_error(event, error, Some(self.fields([])));
        }
    }
}

fn cache_task_failed(error: &JoinError) -> ErrorEnvelope {
    ErrorEnvelope::invariant(
        ErrorCode::internal(),
        format!("config cache task failed: {error}"),
    )
}

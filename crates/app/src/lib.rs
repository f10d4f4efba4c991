//! # polychat-app
//!
//! Application use cases: per-domain configuration loading with background
//! refresh, and chat dispatch to provider adapters.
//! This crate depends on `ports`, `domain`, `config`, and `shared`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod chat_dispatch;
pub mod config_loader;

pub use chat_dispatch::{ChatDispatcher, ProviderRoute};
pub use config_loader::{
    ConfigLoader, ConfigLoaderDeps, DocumentSource, LoadedDocument, RefreshOutcome,
};

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use polychat_config::config_crate_version;
    use polychat_domain::domain_crate_version;
    use polychat_ports::ports_crate_version;
    use polychat_shared::shared_crate_version;

    #[test]
    fn app_crate_compiles() {
        let version = app_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn app_can_use_ports_domain_config_shared() {
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!config_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }
}

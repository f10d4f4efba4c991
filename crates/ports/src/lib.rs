//! # polychat-ports
//!
//! Port traits for the polychat hexagonal architecture.
//!
//! This crate defines the interfaces between the domain and infrastructure
//! layers. It depends only on `domain` and `shared`.

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod cache;
pub mod chat;
pub mod events;
pub mod fetch;
pub mod logger;

pub use cache::*;
pub use chat::*;
pub use events::*;
pub use fetch::*;
pub use logger::*;

// Re-export selected domain types used in port signatures, so adapter crates
// can implement ports without directly depending on `polychat-domain`.
pub use polychat_domain::{
    AuthScheme, ChatRequest, ChatResponse, ConfigDomain, ProtocolFamily, ProviderId,
};

#[cfg(test)]
mod tests {
    use super::*;
    use polychat_domain::domain_crate_version;
    use polychat_shared::shared_crate_version;

    fn workspace_deps() -> Vec<String> {
        let cargo_toml = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
        let mut deps = Vec::new();
        let mut in_deps = false;

        for raw_line in cargo_toml.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('[') {
                in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
                continue;
            }
            if in_deps && line.starts_with("polychat-") {
                let key = line.split('=').next().unwrap_or("").trim();
                let name = key.split('.').next().unwrap_or("").trim();
                deps.push(name.to_string());
            }
        }

        deps
    }

    #[test]
    fn ports_depends_only_on_domain_and_shared() {
        let deps = workspace_deps();
        let allowed = ["polychat-domain", "polychat-shared"];

        for dep in &deps {
            assert!(
                allowed.contains(&dep.as_str()),
                "unexpected dependency found: {dep}"
            );
        }

        for expected in allowed {
            assert!(
                deps.iter().any(|dep| dep == expected),
                "missing dependency: {expected}"
            );
        }
    }

    #[test]
    fn ports_can_use_domain_and_shared() {
        assert!(!ports_crate_version().is_empty());
        assert!(!domain_crate_version().is_empty());
        assert!(!shared_crate_version().is_empty());
    }

    #[test]
    fn log_fields_builds_ordered_map() {
        let fields = log_fields([
            ("domain", serde_json::json!("topics")),
            ("version", serde_json::json!("1.2.0")),
        ]);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("domain"), Some(&serde_json::json!("topics")));
    }

    #[test]
    fn log_event_serializes_error_envelope() {
        let error = polychat_shared::ErrorEnvelope::expected(
            polychat_shared::ErrorCode::not_found(),
            "missing",
        );
        let event = LogEvent::new(LogLevel::Warn, "config.cache.read", "x").with_error(&error);
        assert!(matches!(
            event.error,
            Some(ref value) if value["code"]["code"] == "not_found"
        ));
    }
}

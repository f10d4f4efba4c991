//! # polychat-infra
//!
//! Infrastructure wiring and runtime composition.
//! This crate depends on `app`, `adapters`, `config`, and `shared`.

/// Config cache selection helpers.
mod cache_factory;
/// Settings loading helpers used by CLI surfaces.
pub mod config_check;
/// Chat dispatcher assembly.
mod dispatcher_factory;
/// Offline document validation used by CLI surfaces.
pub mod document_check;
/// Environment validation helpers used by CLI surfaces.
pub mod env_check;
/// Stable error DTO for CLI output.
pub mod error_report;
/// Client runtime composition.
pub mod runtime;

pub use cache_factory::build_config_cache;
pub use config_check::{load_effective_settings, load_effective_settings_json};
pub use dispatcher_factory::build_dispatcher;
pub use document_check::{DocumentCheck, check_document_file, check_document_text};
pub use env_check::{InfraError, InfraResult, validate_env_parsing};
pub use error_report::ErrorReport;
pub use runtime::{ChatRuntime, DocumentSummary};

/// Returns the infra crate version.
#[must_use]
pub const fn infra_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

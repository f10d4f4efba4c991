//! # polychat-domain
//!
//! Domain model for configuration resilience and multi-provider chat.
//!
//! This crate contains the core domain model with no infrastructure dependencies:
//!
//! - **Version** - numeric dotted-triple ordering and compatibility gating
//! - **Endpoint** - outbound URL safety gate
//! - **Chat** - `ChatRequest`, `ChatMessage`, `ChatResponse`, `TokenUsage`
//! - **Provider** - `ProviderId`, `ProviderDescriptor`, `ProtocolFamily`
//! - **Taxonomy** - `TaxonomyEntry`, `HexColor`
//! - **Errors** - `ApiError` tags for provider calls
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use polychat_shared::shared_crate_version;

// =============================================================================
// DOMAIN MODULES
// =============================================================================

pub mod api_error;
pub mod chat;
pub mod config_domain;
pub mod endpoint;
pub mod provider;
pub mod taxonomy;
pub mod version;

pub use api_error::{ApiError, ApiErrorCode, PROVIDER_ERROR_NAMESPACE};
pub use chat::{ChatMessage, ChatRequest, ChatResponse, ChatRole, TokenUsage};
pub use config_domain::{ConfigDomain, UnknownConfigDomain};
pub use endpoint::{EndpointError, EndpointValidator, is_restricted_ip, validate_endpoint};
pub use provider::{
    AuthScheme, InvalidProviderId, ModelDescriptor, ProtocolFamily, ProviderCapabilities,
    ProviderDescriptor, ProviderId,
};
pub use taxonomy::{HexColor, InvalidHexColor, TaxonomyEntry, is_hex_color};
pub use version::{Version, compare_versions, is_compatible, is_newer};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================

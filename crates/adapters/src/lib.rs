//! # polychat-adapters
//!
//! Adapter implementations for ports (provider chat protocols, remote config
//! fetch, config cache stores, event bus, logging).
//! This crate depends on `ports`, `domain`, and `shared`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

/// Chat-completion protocol adapters.
pub mod chat;
/// Config cache stores.
pub mod config_cache;
/// Remote config fetch.
pub mod config_fetch;
/// Config change broadcast.
pub mod events;
/// Timed HTTP client.
pub mod http;
pub mod log_sink;
pub mod logger;
pub mod tracing_logger;

pub use chat::{
    AnthropicProtocol, ChatProtocol, CustomProtocol, GeminiProtocol, OpenAiProtocol,
    ProtocolAdapter, adapter_for,
};
pub use config_cache::MemoryConfigCache;
#[cfg(feature = "cache-sqlite")]
pub use config_cache::SqliteConfigCache;
pub use config_fetch::HttpConfigFetcher;
pub use events::BroadcastEventBus;
pub use http::{DEFAULT_TIMEOUT, HttpReply, TimedHttpClient, TransportError};
pub use log_sink::{LogSink, MemoryLogSink, StderrLogSink};
pub use logger::JsonLogger;
pub use tracing_logger::TracingLogger;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

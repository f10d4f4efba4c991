//! Config cache stores implementing `ConfigCachePort`.

mod memory;
#[cfg(feature = "cache-sqlite")]
mod sqlite;

pub use memory::MemoryConfigCache;
#[cfg(feature = "cache-sqlite")]
pub use sqlite::SqliteConfigCache;

use polychat_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

pub(crate) fn cache_error(message: &str) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::new("cache", "store_failed"),
        message.to_string(),
        ErrorClass::NonRetriable,
    )
}

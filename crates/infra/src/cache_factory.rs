//! Config cache selection and initialization.

use crate::InfraResult;
use polychat_adapters::{MemoryConfigCache, SqliteConfigCache};
use polychat_config::{CacheProvider, ValidatedClientSettings};
use polychat_ports::ConfigCachePort;
use polychat_shared::{ErrorCode, ErrorEnvelope};
use std::sync::Arc;

/// Build the config cache selected by `settings.cache`.
pub fn build_config_cache(settings: &ValidatedClientSettings) -> InfraResult<Arc<dyn ConfigCachePort>> {
    match settings.cache.provider {
        CacheProvider::Memory => Ok(Arc::new(MemoryConfigCache::new())),
        CacheProvider::Sqlite => {
            let path = settings.cache.path.as_ref().ok_or_else(|| {
                ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    "sqlite cache requires cache.path",
                )
                .with_metadata("provider", CacheProvider::Sqlite.as_str())
            })?;
            tracing::debug!(path = %path.display(), "opening sqlite config cache");
            Ok(Arc::new(SqliteConfigCache::open(path.clone())?))
        },
    }
}

//! Configuration change notifications.

use polychat_domain::ConfigDomain;
use serde::Serialize;

/// Fired when a background refresh adopts a newer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdated {
    /// Domain whose cached document changed.
    pub domain: ConfigDomain,
    /// Version of the adopted document.
    pub version: Box<str>,
}

/// Process-wide broadcast of configuration changes.
pub trait ConfigEventPort: Send + Sync {
    /// Publish an event. Having no subscribers is not an error.
    fn publish(&self, event: ConfigUpdated);
}

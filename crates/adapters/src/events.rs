//! Process-wide broadcast of configuration changes.

use polychat_ports::{ConfigEventPort, ConfigUpdated};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 32;

/// `ConfigEventPort` backed by a `tokio` broadcast channel.
///
/// Slow subscribers observe `RecvError::Lagged` rather than blocking
/// publishers.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<ConfigUpdated>,
}

impl BroadcastEventBus {
    /// Bus with the default buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Bus buffering up to `capacity` events per subscriber (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigUpdated> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigEventPort for BroadcastEventBus {
    fn publish(&self, event: ConfigUpdated) {
        let domain = event.domain;
        match self.sender.send(event) {
            Ok(delivered) => {
                tracing::debug!(%domain, delivered, "config update published");
            },
            Err(_) => {
                tracing::debug!(%domain, "config update published with no subscribers");
            },
        }
    }
}

//! Registry of configured notification channels

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{ChannelConfig, ChannelId};

use super::notifier::{self, NotificationChannel};

/// Persistent source of channel configuration
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Every stored channel, in display order
    async fn load_all(&self) -> Result<Vec<ChannelConfig>>;
}

/// A channel that failed to deliver a broadcast
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    /// Channel identifier
    pub channel_id: ChannelId,
    /// Channel name
    pub channel_name: String,
    /// Error reported by the channel
    pub error: String,
}

/// Outcome of a broadcast
#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    /// Channels that accepted the message
    pub delivered: usize,
    /// Channels that failed
    pub failures: Vec<DeliveryFailure>,
}

impl BroadcastReport {
    /// Whether every channel accepted the message
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered set of notification channels, unique by ID.
///
/// Broadcasts share a read lock; `load`, `upsert` and `remove` take the write
/// lock and wait for in-flight broadcasts.
pub struct NotificationRegistry {
    client: Client,
    channels: RwLock<Vec<Arc<dyn NotificationChannel>>>,
}

impl NotificationRegistry {
    /// Create an empty registry
    pub fn new(client: Client) -> Self {
        Self {
            client,
            channels: RwLock::new(Vec::new()),
        }
    }

    /// Replace the channel set with the enabled channels from `store`.
    ///
    /// An error leaves the registry untouched; callers treat it as fatal.
    pub async fn load(&self, store: &dyn ChannelStore) -> Result<usize> {
        let configs = store
            .load_all()
            .await
            .map_err(|e| Error::ChannelLoad(e.to_string()))?;

        let mut loaded: Vec<Arc<dyn NotificationChannel>> = Vec::with_capacity(configs.len());
        for config in configs {
            if !config.enabled {
                debug!(channel_id = config.id, "Skipping disabled channel");
                continue;
            }
            let channel = notifier::build_channel(&self.client, config);
            match loaded.iter_mut().find(|c| c.id() == channel.id()) {
                Some(existing) => *existing = channel,
                None => loaded.push(channel),
            }
        }

        let count = loaded.len();
        *self.channels.write().await = loaded;

        info!(count, "Loaded notification channels");
        Ok(count)
    }

    /// Replace the channel with the same ID, or append it
    pub async fn upsert(&self, channel: Arc<dyn NotificationChannel>) {
        let mut channels = self.channels.write().await;
        let id = channel.id();
        let mut replaced = false;
        for existing in channels.iter_mut().filter(|c| c.id() == id) {
            *existing = channel.clone();
            replaced = true;
        }
        if !replaced {
            channels.push(channel);
        }

        debug!(channel_id = id, replaced, "Upserted notification channel");
    }

    /// Build and upsert a channel from its configuration; disabled configs are removed
    pub async fn upsert_config(&self, config: ChannelConfig) {
        if !config.enabled {
            self.remove(config.id).await;
            return;
        }
        let channel = notifier::build_channel(&self.client, config);
        self.upsert(channel).await;
    }

    /// Remove every channel with `id`. Returns how many were removed.
    pub async fn remove(&self, id: ChannelId) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|c| c.id() != id);
        let removed = before - channels.len();

        debug!(channel_id = id, removed, "Removed notification channel");
        removed
    }

    /// Send `message` to every channel.
    ///
    /// Failures are logged and collected; they never stop delivery to the
    /// remaining channels.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let channels = self.channels.read().await;

        let results = join_all(channels.iter().map(|channel| async move {
            (channel, channel.send(message).await)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (channel, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        channel_id = channel.id(),
                        channel = channel.name(),
                        error = %e,
                        "Failed to send notification"
                    );
                    report.failures.push(DeliveryFailure {
                        channel_id: channel.id(),
                        channel_name: channel.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// IDs of the registered channels, in order
    pub async fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.read().await.iter().map(|c| c.id()).collect()
    }

    /// Number of registered channels
    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Whether no channel is registered
    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::alerting::notifier::NotificationError;
    use crate::models::ChannelKind;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// In-memory channel recording what it was asked to send
    pub(crate) struct RecordingChannel {
        pub id: ChannelId,
        pub name: String,
        pub fail: bool,
        pub sent: Mutex<Vec<String>>,
    }

    impl RecordingChannel {
        pub(crate) fn new(id: ChannelId, name: &str) -> Arc<Self> {
            Arc::new(Self {
                id,
                name: name.to_string(),
                fail: false,
                sent: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing(id: ChannelId, name: &str) -> Arc<Self> {
            Arc::new(Self {
                id,
                name: name.to_string(),
                fail: true,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn id(&self) -> ChannelId {
            self.id
        }

        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, text: &str) -> std::result::Result<(), NotificationError> {
            self.sent.lock().push(text.to_string());
            if self.fail {
                return Err(NotificationError::HttpError("connection refused".to_string()));
            }
            Ok(())
        }
    }

    struct StaticStore(Vec<ChannelConfig>);

    #[async_trait]
    impl ChannelStore for StaticStore {
        async fn load_all(&self) -> Result<Vec<ChannelConfig>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ChannelStore for BrokenStore {
        async fn load_all(&self) -> Result<Vec<ChannelConfig>> {
            Err(Error::config("database unreachable"))
        }
    }

    fn registry() -> NotificationRegistry {
        NotificationRegistry::new(Client::new())
    }

    fn webhook(id: ChannelId, enabled: bool) -> ChannelConfig {
        ChannelConfig {
            id,
            name: format!("hook-{id}"),
            enabled,
            kind: ChannelKind::Webhook {
                url: "http://127.0.0.1:9/hook".to_string(),
                headers: None,
            },
        }
    }

    #[tokio::test]
    async fn test_load_skips_disabled() {
        let registry = registry();
        let store = StaticStore(vec![webhook(1, true), webhook(2, false), webhook(3, true)]);

        assert_eq!(registry.load(&store).await.unwrap(), 2);
        assert_eq!(registry.channel_ids().await, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_existing() {
        let registry = registry();
        registry.upsert(RecordingChannel::new(1, "a")).await;

        let err = registry.load(&BrokenStore).await.unwrap_err();
        assert!(matches!(err, Error::ChannelLoad(_)));
        assert_eq!(registry.channel_ids().await, vec![1]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let registry = registry();
        registry.upsert(RecordingChannel::new(1, "a")).await;
        registry.upsert(RecordingChannel::new(2, "b")).await;

        let replacement = RecordingChannel::new(1, "a2");
        registry.upsert(replacement.clone()).await;
        assert_eq!(registry.channel_ids().await, vec![1, 2]);

        registry.broadcast("ping").await;
        assert_eq!(replacement.sent.lock().as_slice(), &["ping".to_string()]);
    }

    #[tokio::test]
    async fn test_upsert_disabled_config_removes() {
        let registry = registry();
        registry.upsert_config(webhook(5, true)).await;
        assert_eq!(registry.len().await, 1);

        registry.upsert_config(webhook(5, false)).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = registry();
        registry.upsert(RecordingChannel::new(1, "a")).await;
        registry.upsert(RecordingChannel::new(2, "b")).await;

        assert_eq!(registry.remove(1).await, 1);
        assert_eq!(registry.remove(1).await, 0);
        assert_eq!(registry.channel_ids().await, vec![2]);
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failures() {
        let registry = registry();
        let first = RecordingChannel::new(1, "first");
        let broken = RecordingChannel::failing(2, "broken");
        let last = RecordingChannel::new(3, "last");
        registry.upsert(first.clone()).await;
        registry.upsert(broken.clone()).await;
        registry.upsert(last.clone()).await;

        let report = registry.broadcast("raid degraded").await;

        assert_eq!(report.delivered, 2);
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].channel_id, 2);
        assert_eq!(report.failures[0].channel_name, "broken");
        assert_eq!(first.sent.lock().len(), 1);
        assert_eq!(broken.sent.lock().len(), 1);
        assert_eq!(last.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_empty_registry() {
        let report = registry().broadcast("nobody listens").await;
        assert_eq!(report.delivered, 0);
        assert!(report.is_success());
    }
}

//! Throttled alert delivery

use std::sync::Arc;

use super::registry::{BroadcastReport, NotificationRegistry};
use super::throttle::NotificationThrottle;

/// Sends alert descriptions through the registry, muting repeats
#[derive(Clone)]
pub struct AlertDispatcher {
    throttle: Arc<NotificationThrottle>,
    registry: Arc<NotificationRegistry>,
}

impl AlertDispatcher {
    /// Create a dispatcher over a throttle and registry
    pub fn new(throttle: Arc<NotificationThrottle>, registry: Arc<NotificationRegistry>) -> Self {
        Self { throttle, registry }
    }

    /// Deliver `description` unless the throttle mutes it.
    ///
    /// Returns `None` when muted.
    pub async fn send(&self, description: &str, muteable: bool) -> Option<BroadcastReport> {
        if !self.throttle.admit(description, muteable) {
            return None;
        }

        Some(self.registry.broadcast(description).await)
    }

    /// The underlying throttle
    pub fn throttle(&self) -> &NotificationThrottle {
        &self.throttle
    }

    /// The underlying registry
    pub fn registry(&self) -> &NotificationRegistry {
        &self.registry
    }
}

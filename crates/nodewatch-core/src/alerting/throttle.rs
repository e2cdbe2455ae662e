//! Exponential backoff for repeated notifications
//!
//! Every distinct message text gets its own mute window. The first delivery
//! mutes identical text for `initial_delay`; each later delivery doubles the
//! window up to `max_delay`, so a condition that never recovers settles at one
//! notification per day.
//!
//! Records live for their mute window plus a retention grace. Expired records
//! are swept by `admit` itself, at most once per grace period.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::ThrottleConfig;

/// Mute state of one message fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationHistory {
    /// Current mute window
    pub duration: Duration,
    /// Instant after which the message may be delivered again
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct ThrottleEntry {
    history: NotificationHistory,
    expires_at: DateTime<Utc>,
}

/// Decides whether a notification may be delivered now
pub struct NotificationThrottle {
    initial_delay: Duration,
    max_delay: Duration,
    retention_grace: Duration,
    entries: DashMap<String, ThrottleEntry>,
    /// Millisecond timestamp at which the next sweep is due
    next_sweep: AtomicI64,
}

/// Deduplication fingerprint of a message
pub fn fingerprint(message: &str) -> String {
    hex::encode(Sha256::digest(message.as_bytes()))
}

fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::weeks(52 * 100))
}

impl NotificationThrottle {
    /// Create a throttle with the default 15 minute to 24 hour backoff
    pub fn new() -> Self {
        Self::from_config(&ThrottleConfig::default())
    }

    /// Create a throttle from configuration
    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self {
            initial_delay: to_chrono(config.initial_delay),
            max_delay: to_chrono(config.max_delay),
            retention_grace: to_chrono(config.retention_grace),
            entries: DashMap::new(),
            next_sweep: AtomicI64::new(i64::MIN),
        }
    }

    /// Whether `message` may be delivered now
    pub fn admit(&self, message: &str, muteable: bool) -> bool {
        self.admit_at(message, muteable, Utc::now())
    }

    /// Whether `message` may be delivered at `now`.
    ///
    /// Messages that are not muteable always pass and leave no history.
    pub fn admit_at(&self, message: &str, muteable: bool, now: DateTime<Utc>) -> bool {
        if !muteable {
            return true;
        }

        self.sweep_if_due(now);

        let key = fingerprint(message);

        // The entry guard holds the shard lock for the whole read-modify-write.
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let current = *occupied.get();
                if now >= current.expires_at {
                    occupied.insert(self.fresh_entry(now));
                    return true;
                }
                if now < current.history.until {
                    debug!(
                        fingerprint = %occupied.key(),
                        until = %current.history.until,
                        "Muted repeated notification"
                    );
                    return false;
                }

                let duration = (current.history.duration * 2).min(self.max_delay);
                let until = now + duration;
                occupied.insert(ThrottleEntry {
                    history: NotificationHistory { duration, until },
                    expires_at: until + self.retention_grace,
                });
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.fresh_entry(now));
                true
            }
        }
    }

    fn sweep_if_due(&self, now: DateTime<Utc>) {
        let due = self.next_sweep.load(Ordering::Acquire);
        if now.timestamp_millis() < due {
            return;
        }

        let next = (now + self.retention_grace).timestamp_millis();
        // One caller wins the sweep; the others go straight to their lookup.
        if self
            .next_sweep
            .compare_exchange(due, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let purged = self.purge_expired(now);
            if purged > 0 {
                debug!(purged, remaining = self.entries.len(), "Swept expired notification history");
            }
        }
    }

    fn fresh_entry(&self, now: DateTime<Utc>) -> ThrottleEntry {
        let until = now + self.initial_delay;
        ThrottleEntry {
            history: NotificationHistory {
                duration: self.initial_delay,
                until,
            },
            expires_at: until + self.retention_grace,
        }
    }

    /// Current mute state of `message`, if any
    pub fn history(&self, message: &str) -> Option<NotificationHistory> {
        self.entries
            .get(&fingerprint(message))
            .map(|entry| entry.history)
    }

    /// Drop history records whose retention elapsed. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked fingerprints
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no fingerprint is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new()
    }
}

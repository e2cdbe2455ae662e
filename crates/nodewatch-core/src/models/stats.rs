//! Billing cycle transfer statistics

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::host::HostId;

/// Live per-rule cycle usage, written by evaluations and read by reporting.
///
/// Every field is keyed by host independently, so readers may observe one
/// host's usage from a newer evaluation than its next update time.
#[derive(Debug, Default)]
pub struct CycleTransferStats {
    window: RwLock<Option<(DateTime<Utc>, DateTime<Utc>)>>,
    server_names: DashMap<HostId, String>,
    transfer: DashMap<HostId, u64>,
    next_update: DashMap<HostId, DateTime<Utc>>,
}

/// Owned copy of [`CycleTransferStats`] for reporting layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleTransferReport {
    /// Start of the active cycle
    pub from: Option<DateTime<Utc>>,
    /// End of the active cycle (exclusive)
    pub to: Option<DateTime<Utc>>,
    /// Host display names
    pub server_names: BTreeMap<HostId, String>,
    /// Bytes used in the cycle so far
    pub transfer: BTreeMap<HostId, u64>,
    /// Next time each host is re-sampled
    pub next_update: BTreeMap<HostId, DateTime<Utc>>,
}

impl CycleTransferStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of one host sample
    pub(crate) fn record(
        &self,
        host_id: HostId,
        name: &str,
        usage: u64,
        next_update: DateTime<Utc>,
        window: (DateTime<Utc>, DateTime<Utc>),
    ) {
        let stale_name = self
            .server_names
            .get(&host_id)
            .map_or(true, |current| current.as_str() != name);
        if stale_name {
            self.server_names.insert(host_id, name.to_string());
        }

        self.transfer.insert(host_id, usage);
        self.next_update.insert(host_id, next_update);
        *self.window.write() = Some(window);
    }

    /// Active `[from, to)` window, once any host has been sampled
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        *self.window.read()
    }

    /// Cycle usage of a host
    pub fn transfer(&self, host_id: HostId) -> Option<u64> {
        self.transfer.get(&host_id).map(|v| *v)
    }

    /// Next re-sample time of a host
    pub fn next_update(&self, host_id: HostId) -> Option<DateTime<Utc>> {
        self.next_update.get(&host_id).map(|v| *v)
    }

    /// Display name of a host
    pub fn server_name(&self, host_id: HostId) -> Option<String> {
        self.server_names.get(&host_id).map(|v| v.clone())
    }

    /// Copy the current state out for serialization
    pub fn snapshot(&self) -> CycleTransferReport {
        let (from, to) = self.window().unzip();

        CycleTransferReport {
            from,
            to,
            server_names: self
                .server_names
                .iter()
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect(),
            transfer: self
                .transfer
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
            next_update: self
                .next_update
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_overwrites_per_host() {
        let stats = CycleTransferStats::new();
        let from = Utc::now();
        let to = from + Duration::hours(1);

        stats.record(1, "web-1", 10, to, (from, to));
        stats.record(1, "web-1-renamed", 20, to, (from, to));
        stats.record(2, "db-1", 5, to, (from, to));

        assert_eq!(stats.transfer(1), Some(20));
        assert_eq!(stats.server_name(1).as_deref(), Some("web-1-renamed"));
        assert_eq!(stats.transfer(2), Some(5));
        assert_eq!(stats.window(), Some((from, to)));
    }

    #[test]
    fn test_snapshot() {
        let stats = CycleTransferStats::new();
        assert_eq!(stats.snapshot(), CycleTransferReport::default());

        let from = Utc::now();
        let to = from + Duration::hours(24);
        stats.record(3, "edge", 42, from, (from, to));

        let report = stats.snapshot();
        assert_eq!(report.from, Some(from));
        assert_eq!(report.to, Some(to));
        assert_eq!(report.transfer.get(&3), Some(&42));
        assert_eq!(report.server_names.get(&3).map(String::as_str), Some("edge"));
    }
}

//! Host snapshot data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a monitored host
pub type HostId = u64;

/// Read-only view of a monitored host at evaluation time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSnapshot {
    /// Host identifier
    pub id: HostId,

    /// Display name
    pub name: String,

    /// CPU usage in percent
    pub cpu: f64,

    // Capacity
    /// Memory in use, bytes
    pub mem_used: u64,
    /// Total memory, bytes
    pub mem_total: u64,
    /// Swap in use, bytes
    pub swap_used: u64,
    /// Total swap, bytes
    pub swap_total: u64,
    /// Disk in use, bytes
    pub disk_used: u64,
    /// Total disk, bytes
    pub disk_total: u64,

    // Network
    /// Inbound speed, bytes per second
    pub net_in_speed: u64,
    /// Outbound speed, bytes per second
    pub net_out_speed: u64,
    /// Lifetime inbound transfer, bytes
    pub net_in_transfer: u64,
    /// Lifetime outbound transfer, bytes
    pub net_out_transfer: u64,

    /// Inbound counter at the start of the current accounting hour
    pub transfer_in_at_cycle_anchor: u64,
    /// Outbound counter at the start of the current accounting hour
    pub transfer_out_at_cycle_anchor: u64,

    // Load
    /// 1 minute load average
    pub load1: f64,
    /// 5 minute load average
    pub load5: f64,
    /// 15 minute load average
    pub load15: f64,

    // Counts
    /// Open TCP connections
    pub tcp_conn_count: u64,
    /// Open UDP connections
    pub udp_conn_count: u64,
    /// Running processes
    pub process_count: u64,

    /// Last time the host reported, `None` if it never did
    pub last_active: Option<DateTime<Utc>>,
}

impl HostSnapshot {
    /// Inbound bytes since the cycle anchor baseline
    pub fn transfer_in_since_anchor(&self) -> u64 {
        self.net_in_transfer
            .saturating_sub(self.transfer_in_at_cycle_anchor)
    }

    /// Outbound bytes since the cycle anchor baseline
    pub fn transfer_out_since_anchor(&self) -> u64 {
        self.net_out_transfer
            .saturating_sub(self.transfer_out_at_cycle_anchor)
    }
}

//! Alert rule data models

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::alerting::cycle::MAX_CYCLE_INTERVAL_HOURS;
use crate::error::Error;

use super::host::HostId;

/// Metric a rule watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum MetricKind {
    /// CPU usage percent
    Cpu,
    /// Memory usage percent
    Memory,
    /// Swap usage percent
    Swap,
    /// Disk usage percent
    Disk,
    /// Inbound speed
    NetInSpeed,
    /// Outbound speed
    NetOutSpeed,
    /// Combined speed
    NetAllSpeed,
    /// Lifetime inbound transfer
    TransferIn,
    /// Lifetime outbound transfer
    TransferOut,
    /// Lifetime combined transfer
    TransferAll,
    /// Unix timestamp of the host's last report, breached after a short silence
    Offline,
    /// Inbound transfer within the billing cycle
    TransferInCycle,
    /// Outbound transfer within the billing cycle
    TransferOutCycle,
    /// Combined transfer within the billing cycle
    TransferAllCycle,
    /// 1 minute load average
    Load1,
    /// 5 minute load average
    Load5,
    /// 15 minute load average
    Load15,
    /// Open TCP connections
    TcpConnCount,
    /// Open UDP connections
    UdpConnCount,
    /// Running processes
    ProcessCount,
}

impl MetricKind {
    /// Every supported kind, in declaration order
    pub const ALL: [MetricKind; 20] = [
        Self::Cpu,
        Self::Memory,
        Self::Swap,
        Self::Disk,
        Self::NetInSpeed,
        Self::NetOutSpeed,
        Self::NetAllSpeed,
        Self::TransferIn,
        Self::TransferOut,
        Self::TransferAll,
        Self::Offline,
        Self::TransferInCycle,
        Self::TransferOutCycle,
        Self::TransferAllCycle,
        Self::Load1,
        Self::Load5,
        Self::Load15,
        Self::TcpConnCount,
        Self::UdpConnCount,
        Self::ProcessCount,
    ];

    /// Wire name of the kind
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Swap => "swap",
            Self::Disk => "disk",
            Self::NetInSpeed => "net_in_speed",
            Self::NetOutSpeed => "net_out_speed",
            Self::NetAllSpeed => "net_all_speed",
            Self::TransferIn => "transfer_in",
            Self::TransferOut => "transfer_out",
            Self::TransferAll => "transfer_all",
            Self::Offline => "offline",
            Self::TransferInCycle => "transfer_in_cycle",
            Self::TransferOutCycle => "transfer_out_cycle",
            Self::TransferAllCycle => "transfer_all_cycle",
            Self::Load1 => "load1",
            Self::Load5 => "load5",
            Self::Load15 => "load15",
            Self::TcpConnCount => "tcp_conn_count",
            Self::UdpConnCount => "udp_conn_count",
            Self::ProcessCount => "process_count",
        }
    }

    /// Whether the value resets on every billing cycle
    pub fn is_cyclic(self) -> bool {
        self.as_str().ends_with("_cycle")
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownMetricKind(s.to_string()))
    }
}

impl TryFrom<String> for MetricKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which hosts a rule applies to by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    /// Every host except the listed exclusions
    #[default]
    All,
    /// No host except the listed exclusions
    None,
}

/// Cached outcome of the last real evaluation of a cyclic rule for one host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CheckState {
    /// Earliest instant the host is sampled again
    pub next_check_at: DateTime<Utc>,
    /// Breach status computed at the last sample
    pub breached: bool,
}

/// An alert rule definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Metric to monitor
    pub kind: MetricKind,

    /// Lower bound, 0 disables the check
    #[serde(default)]
    pub min: f64,

    /// Upper bound, 0 disables the check
    #[serde(default)]
    pub max: f64,

    /// Anchor instant of the billing cycle
    #[serde(default)]
    pub cycle_start: DateTime<Utc>,

    /// Billing cycle length in hours
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_hours: u64,

    /// Sustained breach duration in seconds (reserved)
    #[serde(default)]
    pub duration_seconds: u64,

    /// Default coverage
    #[serde(default)]
    pub coverage: Coverage,

    /// Hosts that flip the default coverage
    #[serde(default)]
    pub exclusions: HashSet<HostId>,

    /// Per-host debounce state for cyclic kinds
    #[serde(skip)]
    pub(crate) checks: DashMap<HostId, CheckState>,
}

fn default_cycle_interval() -> u64 {
    1
}

impl AlertRule {
    /// Create a rule covering every host with no thresholds set
    pub fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            min: 0.0,
            max: 0.0,
            cycle_start: DateTime::<Utc>::default(),
            cycle_interval_hours: default_cycle_interval(),
            duration_seconds: 0,
            coverage: Coverage::All,
            exclusions: HashSet::new(),
            checks: DashMap::new(),
        }
    }

    /// Whether the rule watches a billing-cycle metric
    pub fn is_cyclic(&self) -> bool {
        self.kind.is_cyclic()
    }

    /// Whether the rule applies to a host under its coverage settings
    pub fn applies_to(&self, host_id: HostId) -> bool {
        let listed = self.exclusions.contains(&host_id);
        match self.coverage {
            Coverage::All => !listed,
            Coverage::None => listed,
        }
    }

    /// Threshold comparison shared by every kind but `offline`
    pub fn is_breached_by(&self, value: f64) -> bool {
        (self.max > 0.0 && value > self.max) || (self.min > 0.0 && value < self.min)
    }

    /// Reject definitions that cannot be evaluated
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.min < 0.0 || self.max < 0.0 {
            return Err(Error::validation(format!(
                "{} rule has a negative bound (min {}, max {})",
                self.kind, self.min, self.max
            )));
        }
        if self.is_cyclic()
            && !(1..=MAX_CYCLE_INTERVAL_HOURS).contains(&self.cycle_interval_hours)
        {
            return Err(Error::validation(format!(
                "{} rule needs a cycle interval between 1 and {} hours, got {}",
                self.kind, MAX_CYCLE_INTERVAL_HOURS, self.cycle_interval_hours
            )));
        }
        Ok(())
    }

    /// Cached breach status for a host, if it was ever sampled
    pub(crate) fn cached_status(&self, host_id: HostId) -> Option<bool> {
        self.checks.get(&host_id).map(|state| state.breached)
    }
}

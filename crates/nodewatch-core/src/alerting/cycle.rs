//! Billing cycle accounting
//!
//! Cycle usage is the live counter delta since the last hourly baseline plus,
//! for cycles longer than an hour, the ledger total recorded since the cycle
//! started.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::Result;
use crate::models::{HostId, HostSnapshot, MetricKind};

/// Direction of a ledger sum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Inbound bytes
    In,
    /// Outbound bytes
    Out,
    /// Inbound plus outbound bytes
    Both,
}

impl TransferDirection {
    /// Direction summed for a cyclic kind, `None` for the others
    pub fn for_kind(kind: MetricKind) -> Option<Self> {
        match kind {
            MetricKind::TransferInCycle => Some(Self::In),
            MetricKind::TransferOutCycle => Some(Self::Out),
            MetricKind::TransferAllCycle => Some(Self::Both),
            _ => None,
        }
    }
}

/// Durable history of per-host transfer counters
#[async_trait]
pub trait TransferLedger: Send + Sync {
    /// Total bytes recorded for `host_id` strictly after `since`
    async fn sum_transfer(
        &self,
        host_id: HostId,
        since: DateTime<Utc>,
        direction: TransferDirection,
    ) -> Result<u64>;
}

/// Longest supported billing cycle, ten years
pub const MAX_CYCLE_INTERVAL_HOURS: u64 = 24 * 366 * 10;

fn interval_seconds(interval_hours: u64) -> i64 {
    interval_hours.clamp(1, MAX_CYCLE_INTERVAL_HOURS) as i64 * 3600
}

/// Start of the anchor-aligned cycle window containing `now`
pub fn cycle_window_start(
    anchor: DateTime<Utc>,
    interval_hours: u64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let interval = interval_seconds(interval_hours);
    let elapsed = now.timestamp() - anchor.timestamp();

    anchor + Duration::seconds(elapsed.div_euclid(interval) * interval)
}

/// `[from, to)` of the cycle containing `now`
pub fn cycle_window(
    anchor: DateTime<Utc>,
    interval_hours: u64,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = cycle_window_start(anchor, interval_hours, now);
    (from, from + Duration::seconds(interval_seconds(interval_hours)))
}

/// Bytes used by `host` in the cycle starting at `window_start`.
///
/// Non-cyclic kinds have no cycle usage and return 0.
pub async fn cumulative_cycle_usage(
    ledger: &dyn TransferLedger,
    kind: MetricKind,
    host: &HostSnapshot,
    window_start: DateTime<Utc>,
    interval_hours: u64,
) -> Result<u64> {
    let Some(direction) = TransferDirection::for_kind(kind) else {
        return Ok(0);
    };

    let live = match direction {
        TransferDirection::In => host.transfer_in_since_anchor(),
        TransferDirection::Out => host.transfer_out_since_anchor(),
        TransferDirection::Both => host
            .transfer_in_since_anchor()
            .saturating_add(host.transfer_out_since_anchor()),
    };
    if interval_hours <= 1 {
        return Ok(live);
    }

    let recorded = ledger.sum_transfer(host.id, window_start, direction).await?;

    debug!(
        host_id = host.id,
        kind = %kind,
        live,
        recorded,
        since = %window_start,
        "Computed cycle usage"
    );

    Ok(live.saturating_add(recorded))
}

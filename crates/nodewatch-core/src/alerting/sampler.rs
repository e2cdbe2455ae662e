//! Metric extraction from host snapshots

use crate::models::{HostSnapshot, MetricKind};

fn percentage(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 * 100.0 / total as f64
}

/// Extract the value a rule of `kind` compares against its thresholds.
///
/// Cyclic kinds yield only the live part since the cycle anchor baseline;
/// the ledger contribution is added by the cycle accountant.
pub fn sample(kind: MetricKind, host: &HostSnapshot) -> f64 {
    match kind {
        MetricKind::Cpu => host.cpu,
        MetricKind::Memory => percentage(host.mem_used, host.mem_total),
        MetricKind::Swap => percentage(host.swap_used, host.swap_total),
        MetricKind::Disk => percentage(host.disk_used, host.disk_total),
        MetricKind::NetInSpeed => host.net_in_speed as f64,
        MetricKind::NetOutSpeed => host.net_out_speed as f64,
        MetricKind::NetAllSpeed => host.net_in_speed.saturating_add(host.net_out_speed) as f64,
        MetricKind::TransferIn => host.net_in_transfer as f64,
        MetricKind::TransferOut => host.net_out_transfer as f64,
        MetricKind::TransferAll => host.net_in_transfer.saturating_add(host.net_out_transfer) as f64,
        MetricKind::Offline => host.last_active.map_or(0.0, |at| at.timestamp() as f64),
        MetricKind::TransferInCycle => host.transfer_in_since_anchor() as f64,
        MetricKind::TransferOutCycle => host.transfer_out_since_anchor() as f64,
        MetricKind::TransferAllCycle => host
            .transfer_in_since_anchor()
            .saturating_add(host.transfer_out_since_anchor()) as f64,
        MetricKind::Load1 => host.load1,
        MetricKind::Load5 => host.load5,
        MetricKind::Load15 => host.load15,
        MetricKind::TcpConnCount => host.tcp_conn_count as f64,
        MetricKind::UdpConnCount => host.udp_conn_count as f64,
        MetricKind::ProcessCount => host.process_count as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn host() -> HostSnapshot {
        HostSnapshot {
            id: 1,
            name: "web-1".to_string(),
            cpu: 42.5,
            mem_used: 512,
            mem_total: 2048,
            swap_used: 10,
            swap_total: 0,
            disk_used: 90,
            disk_total: 100,
            net_in_speed: 300,
            net_out_speed: 200,
            net_in_transfer: 5_000,
            net_out_transfer: 7_000,
            transfer_in_at_cycle_anchor: 1_000,
            transfer_out_at_cycle_anchor: 2_000,
            load1: 0.5,
            load5: 0.75,
            load15: 1.25,
            tcp_conn_count: 12,
            udp_conn_count: 3,
            process_count: 180,
            last_active: None,
        }
    }

    #[rstest]
    #[case(MetricKind::Cpu, 42.5)]
    #[case(MetricKind::Memory, 25.0)]
    #[case(MetricKind::Disk, 90.0)]
    #[case(MetricKind::NetInSpeed, 300.0)]
    #[case(MetricKind::NetOutSpeed, 200.0)]
    #[case(MetricKind::NetAllSpeed, 500.0)]
    #[case(MetricKind::TransferIn, 5_000.0)]
    #[case(MetricKind::TransferOut, 7_000.0)]
    #[case(MetricKind::TransferAll, 12_000.0)]
    #[case(MetricKind::TransferInCycle, 4_000.0)]
    #[case(MetricKind::TransferOutCycle, 5_000.0)]
    #[case(MetricKind::TransferAllCycle, 9_000.0)]
    #[case(MetricKind::Load1, 0.5)]
    #[case(MetricKind::Load5, 0.75)]
    #[case(MetricKind::Load15, 1.25)]
    #[case(MetricKind::TcpConnCount, 12.0)]
    #[case(MetricKind::UdpConnCount, 3.0)]
    #[case(MetricKind::ProcessCount, 180.0)]
    fn test_sample(#[case] kind: MetricKind, #[case] expected: f64) {
        assert!((sample(kind, &host()) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentage_with_zero_total() {
        assert_eq!(sample(MetricKind::Swap, &host()), 0.0);

        let empty = HostSnapshot::default();
        assert_eq!(sample(MetricKind::Memory, &empty), 0.0);
        assert_eq!(sample(MetricKind::Disk, &empty), 0.0);
    }

    #[test]
    fn test_offline_timestamp() {
        assert_eq!(sample(MetricKind::Offline, &host()), 0.0);

        let mut seen = host();
        seen.last_active = Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(sample(MetricKind::Offline, &seen), 1_700_000_000.0);
    }

    #[test]
    fn test_cycle_counter_below_baseline_saturates() {
        let mut rebooted = host();
        rebooted.net_in_transfer = 10;

        assert_eq!(sample(MetricKind::TransferInCycle, &rebooted), 0.0);
    }
}

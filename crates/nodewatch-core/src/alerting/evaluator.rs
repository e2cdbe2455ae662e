//! Alert rule evaluation engine

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::AlertingConfig;
use crate::models::rule::CheckState;
use crate::models::{AlertRule, CycleTransferStats, HostSnapshot, MetricKind};

use super::cycle::{self, TransferLedger};
use super::sampler;

/// Shortest delay before a cyclic rule re-samples a host
pub const MIN_RECHECK_SECS: f64 = 180.0;

/// Longest delay before a cyclic rule re-samples a host
pub const MAX_RECHECK_SECS: f64 = 1800.0;

/// Silence after which a host counts as offline
pub const OFFLINE_GRACE_SECS: f64 = 6.0;

/// Delay before the next sample of a cyclic rule.
///
/// Shrinks linearly as `value` approaches `max`; without an upper bound the
/// longest delay applies.
pub fn recheck_delay(max: f64, value: f64) -> Duration {
    let secs = if max > 0.0 {
        (MAX_RECHECK_SECS * (max - value) / max).clamp(MIN_RECHECK_SECS, MAX_RECHECK_SECS)
    } else {
        MAX_RECHECK_SECS
    };

    Duration::seconds(secs as i64)
}

/// Decide whether a sampled value breaches the rule at `now`
pub fn threshold_breached(rule: &AlertRule, value: f64, now: DateTime<Utc>) -> bool {
    match rule.kind {
        MetricKind::Offline => now.timestamp() as f64 - value > OFFLINE_GRACE_SECS,
        _ => rule.is_breached_by(value),
    }
}

/// Evaluates rules against host snapshots
pub struct RuleEvaluator {
    /// Ledger backing multi-hour cycle usage
    ledger: Arc<dyn TransferLedger>,
    /// Upper bound on one ledger query
    ledger_timeout: StdDuration,
}

impl RuleEvaluator {
    /// Create a new evaluator with the default ledger timeout
    pub fn new(ledger: Arc<dyn TransferLedger>) -> Self {
        Self::from_config(ledger, &AlertingConfig::default())
    }

    /// Create a new evaluator from alerting configuration
    pub fn from_config(ledger: Arc<dyn TransferLedger>, config: &AlertingConfig) -> Self {
        Self {
            ledger,
            ledger_timeout: config.ledger_timeout,
        }
    }

    /// Evaluate a rule for a host now. Returns whether the rule is breached.
    pub async fn evaluate(
        &self,
        rule: &AlertRule,
        host: &HostSnapshot,
        stats: &CycleTransferStats,
    ) -> bool {
        self.evaluate_at(rule, host, stats, Utc::now()).await
    }

    /// Evaluate a rule for a host as of `now`.
    ///
    /// Hosts outside the rule's coverage never touch the debounce cache or the
    /// ledger; cyclic rules report their last cached status for them. A cyclic
    /// rule is only re-sampled once the host's debounce deadline has passed.
    pub async fn evaluate_at(
        &self,
        rule: &AlertRule,
        host: &HostSnapshot,
        stats: &CycleTransferStats,
        now: DateTime<Utc>,
    ) -> bool {
        if !rule.applies_to(host.id) {
            return rule.is_cyclic() && rule.cached_status(host.id).unwrap_or(false);
        }

        if !rule.is_cyclic() {
            let value = sampler::sample(rule.kind, host);
            let breached = threshold_breached(rule, value, now);
            trace!(host_id = host.id, kind = %rule.kind, value, breached, "Evaluated rule");
            return breached;
        }

        let cached = rule.checks.get(&host.id).map(|state| *state);
        if let Some(state) = cached {
            if state.next_check_at > now {
                trace!(
                    host_id = host.id,
                    kind = %rule.kind,
                    next_check_at = %state.next_check_at,
                    "Cycle check debounced"
                );
                return state.breached;
            }
        }

        self.sample_cycle(rule, host, stats, now)
            .await
            .unwrap_or_else(|| cached.map_or(false, |state| state.breached))
    }

    /// Sample cycle usage, re-arm the debounce and publish stats.
    ///
    /// Returns `None` when the ledger could not be read; nothing is updated in
    /// that case so the next tick samples again.
    async fn sample_cycle(
        &self,
        rule: &AlertRule,
        host: &HostSnapshot,
        stats: &CycleTransferStats,
        now: DateTime<Utc>,
    ) -> Option<bool> {
        let (from, to) = cycle::cycle_window(rule.cycle_start, rule.cycle_interval_hours, now);

        let query = cycle::cumulative_cycle_usage(
            self.ledger.as_ref(),
            rule.kind,
            host,
            from,
            rule.cycle_interval_hours,
        );

        let usage = match timeout(self.ledger_timeout, query).await {
            Ok(Ok(usage)) => usage,
            Ok(Err(e)) => {
                warn!(host_id = host.id, kind = %rule.kind, error = %e, "Skipping cycle check");
                return None;
            }
            Err(_) => {
                warn!(
                    host_id = host.id,
                    kind = %rule.kind,
                    timeout = ?self.ledger_timeout,
                    "Skipping cycle check, ledger query timed out"
                );
                return None;
            }
        };

        let value = usage as f64;
        let breached = threshold_breached(rule, value, now);
        let next_check_at = now + recheck_delay(rule.max, value);

        rule.checks.insert(
            host.id,
            CheckState {
                next_check_at,
                breached,
            },
        );
        stats.record(host.id, &host.name, usage, next_check_at, (from, to));

        debug!(
            host_id = host.id,
            kind = %rule.kind,
            usage,
            max = rule.max,
            breached,
            next_check_at = %next_check_at,
            "Sampled cycle usage"
        );

        Some(breached)
    }
}

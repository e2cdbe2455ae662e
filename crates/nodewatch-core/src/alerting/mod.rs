//! Alerting system for Nodewatch
//!
//! Evaluates rules against host snapshots, accounts billing-cycle transfer,
//! and delivers throttled notifications.

pub mod cycle;
mod dispatch;
mod evaluator;
mod notifier;
mod registry;
pub mod sampler;
mod throttle;

pub use cycle::{TransferDirection, TransferLedger};
pub use dispatch::AlertDispatcher;
pub use evaluator::{recheck_delay, RuleEvaluator};
pub use notifier::{build_channel, http_client, NotificationChannel, NotificationError};
pub use registry::{BroadcastReport, ChannelStore, DeliveryFailure, NotificationRegistry};
pub use throttle::{fingerprint, NotificationHistory, NotificationThrottle};

//! Data models for Nodewatch

pub mod channel;
pub mod host;
pub mod rule;
pub mod stats;

pub use channel::*;
pub use host::*;
pub use rule::{AlertRule, Coverage, MetricKind};
pub use stats::*;

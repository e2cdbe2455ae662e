//! # Nodewatch
//!
//! Alert rule evaluation engine for server fleet monitoring.
//!
//! Nodewatch decides, for each configured rule and each reporting host,
//! whether the host currently breaches the rule, and fans resulting alerts out
//! to notification channels without flooding them.
//!
//! ## Architecture
//!
//! - **Alerting**: metric sampling, billing-cycle transfer accounting, the
//!   debounced rule evaluator, notification backoff and the channel registry
//! - **Storage**: PostgreSQL for the transfer ledger and channel configuration
//! - **CLI**: one-shot evaluation of rules against host snapshots
//!
//! ## Quick Start
//!
//! ```bash
//! # Apply the schema
//! nodewatch migrate
//!
//! # Evaluate rules once and dispatch alerts
//! nodewatch check --rules rules.json --snapshots hosts.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod alerting;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertDispatcher, NotificationRegistry, NotificationThrottle, RuleEvaluator};
    pub use crate::config::Config;
    pub use crate::db::Database;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}

//! Error types for Nodewatch

use thiserror::Error;

/// Result type alias using Nodewatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Nodewatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Metric kind name outside the supported set
    #[error("Unknown metric kind: {0}")]
    UnknownMetricKind(String),

    /// Transfer ledger query failed or timed out
    #[error("Transfer ledger error: {0}")]
    Ledger(String),

    /// Notification channels could not be loaded
    #[error("Failed to load notification channels: {0}")]
    ChannelLoad(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a ledger error
    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

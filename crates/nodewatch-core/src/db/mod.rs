//! Database layer for Nodewatch
//!
//! PostgreSQL backs the transfer ledger and the notification channel store.

mod postgres;

pub use postgres::{PgChannelStore, PgTransferLedger, PostgresPool};

use crate::config::Config;
use crate::error::Result;

/// Database adapters sharing one pool
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool
    pub postgres: PostgresPool,
}

impl Database {
    /// Connect to the configured database
    pub async fn new(config: &Config) -> Result<Self> {
        let postgres = PostgresPool::new(&config.database).await?;
        Ok(Self { postgres })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.postgres.migrate().await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        self.postgres.health_check().await
    }

    /// Transfer ledger backed by this database
    pub fn transfer_ledger(&self) -> PgTransferLedger {
        PgTransferLedger::new(&self.postgres)
    }

    /// Channel store backed by this database
    pub fn channel_store(&self) -> PgChannelStore {
        PgChannelStore::new(&self.postgres)
    }
}

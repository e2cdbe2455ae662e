//! PostgreSQL connection, transfer ledger and channel store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::alerting::{ChannelStore, TransferDirection, TransferLedger};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{ChannelConfig, ChannelKind, HostId};

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_db_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| Error::validation(format!("id {id} exceeds BIGINT range")))
}

fn from_db_id(id: i64) -> Result<u64> {
    u64::try_from(id).map_err(|_| Error::validation(format!("negative id {id} in database")))
}

/// Historical transfer samples stored in the `transfers` table
#[derive(Clone)]
pub struct PgTransferLedger {
    pool: PgPool,
}

impl PgTransferLedger {
    /// Create a ledger over an existing pool
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }
}

#[async_trait]
impl TransferLedger for PgTransferLedger {
    async fn sum_transfer(
        &self,
        host_id: HostId,
        since: DateTime<Utc>,
        direction: TransferDirection,
    ) -> Result<u64> {
        let column = match direction {
            TransferDirection::In => "inbound",
            TransferDirection::Out => "outbound",
            TransferDirection::Both => "inbound + outbound",
        };

        let sql = format!(
            "SELECT COALESCE(SUM({column}), 0)::BIGINT AS total \
             FROM transfers WHERE server_id = $1 AND created_at > $2"
        );

        let total: i64 = sqlx::query_scalar(&sql)
            .bind(to_db_id(host_id)?)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::ledger(e.to_string()))?;

        Ok(u64::try_from(total).unwrap_or(0))
    }
}

/// Notification channel configuration stored in `notification_channels`
#[derive(Clone)]
pub struct PgChannelStore {
    pool: PgPool,
}

impl PgChannelStore {
    /// Create a store over an existing pool
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }
}

#[async_trait]
impl ChannelStore for PgChannelStore {
    async fn load_all(&self) -> Result<Vec<ChannelConfig>> {
        let rows = sqlx::query("SELECT id, name, enabled, kind FROM notification_channels ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_channel).collect()
    }
}

fn row_to_channel(row: &PgRow) -> Result<ChannelConfig> {
    let kind: serde_json::Value = row.try_get("kind")?;
    let kind: ChannelKind = serde_json::from_value(kind)?;

    Ok(ChannelConfig {
        id: from_db_id(row.try_get("id")?)?,
        name: row.try_get("name")?,
        enabled: row.try_get("enabled")?,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_conversion() {
        assert_eq!(to_db_id(42).unwrap(), 42);
        assert!(to_db_id(u64::MAX).is_err());
        assert_eq!(from_db_id(7).unwrap(), 7);
        assert!(from_db_id(-1).is_err());
    }
}

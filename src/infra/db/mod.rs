//! Database connection pool.
//!
//! No schema is managed here; the pool exists for health checks and metrics.

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseConnection, DbErr, Statement,
};

use super::health::{DependencyHealth, HealthProbe};
use crate::config::{
    Config, DATABASE_CONNECT_TIMEOUT_SECONDS, DATABASE_MAX_CONNECTIONS,
    DATABASE_MAX_LIFETIME_SECONDS,
};
use crate::errors::{AppError, AppResult};

/// Database wrapper for connection management
#[derive(Clone)]
pub struct Database {
    connection: DatabaseConnection,
}

impl Database {
    /// Build the pool. Connections are opened lazily on first use.
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let mut options = ConnectOptions::new(config.database_url());
        options
            .max_connections(DATABASE_MAX_CONNECTIONS)
            .connect_timeout(Duration::from_secs(DATABASE_CONNECT_TIMEOUT_SECONDS))
            .max_lifetime(Duration::from_secs(DATABASE_MAX_LIFETIME_SECONDS))
            .sqlx_logging(config.debug)
            .connect_lazy(true);

        let connection = SeaDatabase::connect(options)
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;

        Ok(Self { connection })
    }

    /// Get a reference to the database connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Check database connectivity by executing a simple query.
    pub async fn ping(&self) -> Result<(), DbErr> {
        self.connection
            .execute(Statement::from_string(
                self.connection.get_database_backend(),
                "SELECT 1".to_string(),
            ))
            .await?;
        Ok(())
    }

    /// Number of server connections reported by `pg_stat_activity`.
    pub async fn active_connections(&self) -> AppResult<i64> {
        let row = self
            .connection
            .query_one(Statement::from_string(
                self.connection.get_database_backend(),
                "SELECT count(*)::bigint AS active FROM pg_stat_activity".to_string(),
            ))
            .await?
            .ok_or_else(|| AppError::DatabaseOperation("pg_stat_activity returned no rows".into()))?;

        Ok(row.try_get::<i64>("", "active")?)
    }

    pub async fn close(self) -> AppResult<()> {
        self.connection.close().await?;
        tracing::info!("Database pool closed");
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for Database {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> DependencyHealth {
        match self.ping().await {
            Ok(()) => DependencyHealth::healthy("database"),
            Err(e) => DependencyHealth::unhealthy("database", e),
        }
    }
}

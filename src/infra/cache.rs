//! Redis cache implementation.
//!
//! The same Redis instance is the cache, the rate-limit store and the job
//! broker, so this wrapper is shared by the API, the worker and the scheduler.

use async_trait::async_trait;
use std::sync::Arc;

use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout, Duration};

use super::health::{DependencyHealth, HealthProbe};
use crate::config::{
    Config, BROKER_CONNECTION_MAX_RETRIES, BROKER_CONNECTION_RETRY_DELAY_MS,
    CACHE_PREFIX_RATE_LIMIT,
};
use crate::errors::{AppError, AppResult};

/// Redis cache wrapper with a multiplexed connection.
///
/// At most `REDIS_MAX_CONNECTIONS` commands are in flight per process.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
    permits: Arc<Semaphore>,
}

/// Counters parsed from `INFO`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisServerInfo {
    pub redis_version: Option<String>,
    pub connected_clients: Option<u64>,
    pub used_memory: Option<u64>,
    pub used_memory_human: Option<String>,
    pub total_commands_processed: Option<u64>,
}

/// State of one fixed rate-limit window after counting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests counted in this window, including the current one
    pub count: u64,
    /// Seconds until the window resets
    pub ttl_seconds: u64,
}

impl Cache {
    /// Connect to Redis, retrying with a linear backoff.
    pub async fn connect_with_retry(config: &Config) -> AppResult<Self> {
        let mut last_error = None;

        for attempt in 1..=BROKER_CONNECTION_MAX_RETRIES {
            match Self::try_connect(config).await {
                Ok(cache) => {
                    tracing::info!(attempt, "Redis connected");
                    return Ok(cache);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = BROKER_CONNECTION_MAX_RETRIES,
                        error = %e,
                        "Redis connection failed"
                    );
                    last_error = Some(e);
                    if attempt < BROKER_CONNECTION_MAX_RETRIES {
                        sleep(Duration::from_millis(
                            BROKER_CONNECTION_RETRY_DELAY_MS * u64::from(attempt),
                        ))
                        .await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::internal("Redis connection failed")))
    }

    /// Single connection attempt bounded by `REDIS_CONNECTION_TIMEOUT`.
    pub async fn try_connect(config: &Config) -> AppResult<Self> {
        let redis = config.redis_config();
        let client = Client::open(redis.url.as_str()).map_err(cache_error)?;
        let connect_timeout = Duration::from_secs(redis.connection_timeout);

        let connection = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                AppError::internal(format!(
                    "Redis connection timed out after {}s",
                    connect_timeout.as_secs()
                ))
            })?
            .map_err(cache_error)?;

        Ok(Self {
            connection,
            permits: Arc::new(Semaphore::new(redis.max_connections.max(1) as usize)),
        })
    }

    /// Get the connection manager for direct Redis operations.
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    /// Wait for a command slot. The permit must be held until the reply arrives.
    async fn checkout(&self) -> AppResult<(OwnedSemaphorePermit, ConnectionManager)> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::internal("Redis command slots closed"))?;
        Ok((permit, self.connection.clone()))
    }

    pub async fn ping(&self) -> AppResult<()> {
        let (_permit, mut conn) = self.checkout().await?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    // =========================================================================
    // Generic Cache Operations
    // =========================================================================

    /// Get a JSON value from cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let (_permit, mut conn) = self.checkout().await?;
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| {
                    AppError::internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a value in cache with custom TTL (in seconds).
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let (_permit, mut conn) = self.checkout().await?;
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, ttl_seconds)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let (_permit, mut conn) = self.checkout().await?;
        let _: () = conn.del(key).await.map_err(cache_error)?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> AppResult<bool> {
        let (_permit, mut conn) = self.checkout().await?;
        let exists: bool = conn.exists(key).await.map_err(cache_error)?;
        Ok(exists)
    }

    // =========================================================================
    // Server Introspection
    // =========================================================================

    /// Selected `INFO` counters.
    pub async fn server_info(&self) -> AppResult<RedisServerInfo> {
        let (_permit, mut conn) = self.checkout().await?;
        let raw: String = redis::cmd("INFO")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(parse_info(&raw))
    }

    /// Configured `maxmemory-policy`, if the server exposes `CONFIG GET`.
    pub async fn eviction_policy(&self) -> AppResult<Option<String>> {
        let (_permit, mut conn) = self.checkout().await?;
        let reply: Vec<String> = redis::cmd("CONFIG")
            .arg("GET")
            .arg("maxmemory-policy")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(reply.into_iter().nth(1))
    }

    // =========================================================================
    // Rate Limiting Operations
    // =========================================================================

    /// Count a request in the fixed window for `identifier`.
    ///
    /// The window key is created with its expiry and incremented in one
    /// MULTI block, so concurrent replicas never lose the TTL.
    pub async fn count_in_window(
        &self,
        identifier: &str,
        window_seconds: u64,
    ) -> AppResult<WindowCount> {
        let key = rate_limit_key(identifier);
        let (_permit, mut conn) = self.checkout().await?;

        let (count, ttl): (u64, i64) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("EX")
            .arg(window_seconds)
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(&key)
            .cmd("TTL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;

        Ok(WindowCount {
            count,
            ttl_seconds: if ttl > 0 { ttl as u64 } else { window_seconds },
        })
    }
}

#[async_trait]
impl HealthProbe for Cache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> DependencyHealth {
        if let Err(e) = self.ping().await {
            return DependencyHealth::unhealthy("redis", e);
        }

        match self.server_info().await {
            Ok(info) => DependencyHealth::healthy("redis").with_details(serde_json::json!({
                "connected_clients": info.connected_clients,
                "used_memory_human": info.used_memory_human,
                "redis_version": info.redis_version,
            })),
            Err(_) => DependencyHealth::healthy("redis"),
        }
    }
}

pub fn rate_limit_key(identifier: &str) -> String {
    format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier)
}

/// Parse the `key:value` lines of an `INFO` reply.
pub fn parse_info(raw: &str) -> RedisServerInfo {
    let mut info = RedisServerInfo::default();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        match key {
            "redis_version" => info.redis_version = Some(value.to_string()),
            "connected_clients" => info.connected_clients = value.parse().ok(),
            "used_memory" => info.used_memory = value.parse().ok(),
            "used_memory_human" => info.used_memory_human = Some(value.to_string()),
            "total_commands_processed" => info.total_commands_processed = value.parse().ok(),
            _ => {}
        }
    }

    info
}

/// Convert Redis error to AppError.
fn cache_error(e: RedisError) -> AppError {
    tracing::error!(error = %e, "Redis error");
    AppError::Cache(e)
}

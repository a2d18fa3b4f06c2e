//! System health tasks: dependency liveness, provider reachability and
//! metrics collection.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::{ProviderKeys, PROVIDER_PROBE_TIMEOUT_SECONDS};
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, Database, DependencyHealth, HealthProbe};
use crate::jobs::queue::queue_depths;

// =============================================================================
// Health check
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckReport {
    pub task_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub environment: String,
    pub worker: String,
    pub dependencies: BTreeMap<String, DependencyHealth>,
}

/// Ping the broker and the database.
pub async fn health_check(
    task_id: Uuid,
    environment: &str,
    probes: &[Arc<dyn HealthProbe>],
) -> HealthCheckReport {
    let mut dependencies = BTreeMap::new();
    for probe in probes {
        let health = probe.check().await;
        if !health.is_healthy() {
            tracing::warn!(dependency = probe.name(), error = ?health.error, "Health check dependency failed");
        }
        dependencies.insert(probe.name().to_string(), health);
    }

    let healthy = dependencies.values().all(DependencyHealth::is_healthy);
    let report = HealthCheckReport {
        task_id,
        timestamp: Utc::now(),
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        environment: environment.to_string(),
        worker: "operational".to_string(),
        dependencies,
    };

    tracing::info!(task_id = %task_id, status = %report.status, "Health check completed");
    report
}

// =============================================================================
// External APIs
// =============================================================================

/// Provider groups and their base URLs
pub const PLANT_APIS: &[(&str, &str)] = &[
    ("plantnet", "https://my-api.plantnet.org"),
    ("plant_id", "https://api.plant.id"),
    ("trefle", "https://trefle.io"),
    ("kindwise", "https://plant.id"),
];

pub const WEATHER_APIS: &[(&str, &str)] = &[
    ("openweather", "https://api.openweathermap.org"),
    ("tomorrow_io", "https://api.tomorrow.io"),
    ("weatherstack", "https://api.weatherstack.com"),
    ("visual_crossing", "https://weather.visualcrossing.com"),
];

pub const AI_APIS: &[(&str, &str)] = &[
    ("openai", "https://api.openai.com"),
    ("gemini", "https://generativelanguage.googleapis.com"),
    ("claude", "https://api.anthropic.com"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Healthy,
    Unhealthy,
    /// No credentials; not checked
    Unconfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Healthy,
    Partial,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalApiReport {
    pub task_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: AggregateStatus,
    pub apis: BTreeMap<String, ApiStatus>,
}

/// Whether a URL answers at all.
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn reachable(&self, url: &str) -> Result<(), String>;
}

/// Reachability over HTTP. Any response counts, including 4xx.
pub struct HttpReachability {
    client: reqwest::Client,
}

impl HttpReachability {
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_PROBE_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Reachability for HttpReachability {
    async fn reachable(&self, url: &str) -> Result<(), String> {
        self.client
            .get(url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn provider_key<'a>(keys: &'a ProviderKeys, name: &str) -> Option<&'a String> {
    match name {
        "plantnet" => keys.plantnet.as_ref(),
        "plant_id" => keys.plant_id.as_ref(),
        "trefle" => keys.trefle.as_ref(),
        "kindwise" => keys.kindwise.as_ref(),
        "openweather" => keys.openweather.as_ref(),
        "tomorrow_io" => keys.tomorrow_io.as_ref(),
        "weatherstack" => keys.weatherstack.as_ref(),
        "visual_crossing" => keys.visual_crossing.as_ref(),
        "openai" => keys.openai.as_ref(),
        "gemini" => keys.gemini.as_ref(),
        "claude" => keys.claude.as_ref(),
        _ => None,
    }
}

/// `degraded` when more than half of the checked providers are down,
/// `partial` when any are. Unconfigured providers are not counted.
pub fn aggregate_status(apis: &BTreeMap<String, ApiStatus>) -> AggregateStatus {
    let checked = apis
        .values()
        .filter(|s| **s != ApiStatus::Unconfigured)
        .count();
    let unhealthy = apis
        .values()
        .filter(|s| **s == ApiStatus::Unhealthy)
        .count();

    if unhealthy > checked / 2 {
        AggregateStatus::Degraded
    } else if unhealthy > 0 {
        AggregateStatus::Partial
    } else {
        AggregateStatus::Healthy
    }
}

/// Check every configured provider.
pub async fn check_external_apis<R>(task_id: Uuid, keys: &ProviderKeys, reach: &R) -> ExternalApiReport
where
    R: Reachability + ?Sized,
{
    let mut apis = BTreeMap::new();

    for (name, url) in PLANT_APIS.iter().chain(WEATHER_APIS).chain(AI_APIS) {
        let status = if provider_key(keys, name).is_none() {
            ApiStatus::Unconfigured
        } else {
            match reach.reachable(url).await {
                Ok(()) => ApiStatus::Healthy,
                Err(e) => {
                    tracing::warn!(api = %name, error = %e, "External API health check failed");
                    ApiStatus::Unhealthy
                }
            }
        };
        apis.insert(name.to_string(), status);
    }

    let status = aggregate_status(&apis);
    tracing::info!(task_id = %task_id, status = ?status, "External API health check completed");

    ExternalApiReport {
        task_id,
        timestamp: Utc::now(),
        status,
        apis,
    }
}

// =============================================================================
// Metrics
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub task_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub metrics: BTreeMap<String, Value>,
}

/// A metrics section, or `{"error": ...}` if it could not be gathered.
fn section<T: Serialize>(name: &str, result: AppResult<T>) -> Value {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or_else(|e| json!({ "error": e.to_string() })),
        Err(e) => {
            tracing::warn!(section = name, error = %e, "Failed to collect metrics");
            json!({ "error": e.to_string() })
        }
    }
}

/// Redis counters, queue depths and database connections.
pub async fn collect_system_metrics(task_id: Uuid, cache: &Cache, database: &Database) -> MetricsReport {
    let redis = cache.server_info().await.map(|info| {
        json!({
            "connected_clients": info.connected_clients,
            "used_memory": info.used_memory,
            "total_commands_processed": info.total_commands_processed,
        })
    });

    let queues = queue_depths(cache).await.map(|depths| {
        depths
            .into_iter()
            .map(|(queue, depth)| (queue.name().to_string(), depth))
            .collect::<BTreeMap<_, _>>()
    });

    let db = database
        .active_connections()
        .await
        .map(|active| json!({ "active_connections": active }));

    let metrics = BTreeMap::from([
        ("redis".to_string(), section("redis", redis)),
        ("queues".to_string(), section("queues", queues)),
        ("database".to_string(), section("database", db)),
    ]);

    tracing::info!(task_id = %task_id, "System metrics collection completed");
    MetricsReport {
        task_id,
        timestamp: Utc::now(),
        status: "collected".to_string(),
        metrics,
    }
}

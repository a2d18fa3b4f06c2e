//! Health check handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::config::{APP_VERSION, SERVICE_NAME};
use crate::infra::{DependencyHealth, HealthProbe};

/// Liveness response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: &'static str,
    #[schema(example = "plant-care-api")]
    pub service: &'static str,
    #[schema(example = "1.0.0")]
    pub version: &'static str,
}

/// Dependency health report
#[derive(Debug, Serialize, ToSchema)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub dependencies: BTreeMap<String, DependencyHealth>,
    pub timestamp: DateTime<Utc>,
}

/// Supabase health for the v1 API
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub api_version: &'static str,
    pub dependencies: BTreeMap<String, DependencyHealth>,
}

/// Run every probe concurrently.
pub async fn check_all(probes: &[Arc<dyn HealthProbe>]) -> BTreeMap<String, DependencyHealth> {
    let results = join_all(probes.iter().map(|probe| async move {
        (probe.name().to_string(), probe.check().await)
    }))
    .await;

    results.into_iter().collect()
}

fn status_label(healthy: bool) -> (&'static str, StatusCode) {
    if healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Liveness probe. Touches no dependency.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: APP_VERSION,
    })
}

/// Probe database, redis and supabase
#[utoipa::path(
    get,
    path = "/health/detailed",
    tag = "Health",
    responses(
        (status = 200, description = "All dependencies healthy", body = DetailedHealthResponse),
        (status = 503, description = "At least one dependency unhealthy", body = DetailedHealthResponse)
    )
)]
pub async fn detailed_health(State(state): State<AppState>) -> Response {
    let dependencies = check_all(&state.probes).await;
    let all_healthy = dependencies.values().all(DependencyHealth::is_healthy);

    for (name, health) in dependencies.iter().filter(|(_, h)| !h.is_healthy()) {
        tracing::warn!(dependency = %name, error = ?health.error, "Dependency unhealthy");
    }

    let (status, code) = status_label(all_healthy);
    let body = DetailedHealthResponse {
        status,
        service: SERVICE_NAME,
        version: APP_VERSION,
        dependencies,
        timestamp: Utc::now(),
    };

    (code, Json(body)).into_response()
}

/// Supabase health for API clients
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Supabase reachable", body = ApiHealthResponse),
        (status = 503, description = "Supabase unreachable", body = ApiHealthResponse)
    )
)]
pub async fn api_health(State(state): State<AppState>) -> Response {
    let supabase = state.supabase.check().await;
    let (status, code) = status_label(supabase.is_healthy());

    let body = ApiHealthResponse {
        status,
        version: APP_VERSION,
        api_version: "v1",
        dependencies: BTreeMap::from([(state.supabase.name().to_string(), supabase)]),
    };

    (code, Json(body)).into_response()
}

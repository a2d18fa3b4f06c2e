//! Root, discovery and fallback handlers.

use std::collections::BTreeMap;

use axum::{extract::State, http::Uri, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::config::{API_V1_PREFIX, APP_VERSION};
use crate::errors::AppError;

/// Feature areas the v1 API is organised around, keyed by name.
const V1_ENDPOINTS: &[(&str, &str)] = &[
    ("authentication", "/api/v1/auth"),
    ("users", "/api/v1/users"),
    ("plants", "/api/v1/plants"),
    ("care", "/api/v1/care"),
    ("health", "/api/v1/plant-health"),
    ("growth", "/api/v1/growth"),
    ("community", "/api/v1/community"),
    ("ai", "/api/v1/ai"),
    ("weather", "/api/v1/weather"),
    ("analytics", "/api/v1/analytics"),
    ("notifications", "/api/v1/notifications"),
    ("payments", "/api/v1/payments"),
    ("content", "/api/v1/content"),
    ("admin", "/api/v1/admin"),
];

const V1_FEATURES: &[&str] = &[
    "Supabase Authentication",
    "Plant Management",
    "Care Scheduling",
    "Health Monitoring",
    "Growth Tracking",
    "Community Features",
    "AI Recommendations",
    "Weather Integration",
    "Analytics & Insights",
    "Notifications",
    "Payment Processing",
    "Multilingual Support",
    "Admin Management",
];

/// A route served under `/api/v1`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteInfo {
    pub path: &'static str,
    pub methods: Vec<&'static str>,
    pub name: &'static str,
    pub tags: Vec<&'static str>,
}

/// Routes registered under `/api/v1`. Keep in sync with `routes::v1_routes`.
pub fn v1_route_table(debug: bool) -> Vec<RouteInfo> {
    let mut routes = vec![
        RouteInfo {
            path: "/api/v1",
            methods: vec!["GET"],
            name: "api_v1_root",
            tags: vec!["Root"],
        },
        RouteInfo {
            path: "/api/v1/health",
            methods: vec!["GET"],
            name: "api_health",
            tags: vec!["Health"],
        },
    ];
    if debug {
        routes.push(RouteInfo {
            path: "/api/v1/debug/routes",
            methods: vec!["GET"],
            name: "list_routes",
            tags: vec!["Development"],
        });
    }
    routes
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<&'static str>,
    pub health: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiV1Response {
    pub message: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<&'static str>,
    pub health: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
    pub features: Vec<&'static str>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub total_routes: usize,
    pub routes: Vec<RouteInfo>,
}

fn docs_path(state: &AppState) -> Option<&'static str> {
    state.config.debug.then_some("/docs")
}

/// API information
#[utoipa::path(
    get,
    path = "/",
    tag = "Root",
    responses((status = 200, description = "API information", body = RootResponse))
)]
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Welcome to Plant Care API",
        version: APP_VERSION,
        docs: docs_path(&state),
        health: "/health",
    })
}

/// v1 endpoint map
#[utoipa::path(
    get,
    path = "/api/v1",
    tag = "Root",
    responses((status = 200, description = "Available v1 endpoints", body = ApiV1Response))
)]
pub async fn api_v1_root(State(state): State<AppState>) -> Json<ApiV1Response> {
    Json(ApiV1Response {
        message: "Plant Care API v1",
        version: APP_VERSION,
        documentation: docs_path(&state),
        health: "/api/v1/health",
        endpoints: V1_ENDPOINTS.iter().copied().collect(),
        features: V1_FEATURES.to_vec(),
    })
}

/// Registered v1 routes (development only)
#[utoipa::path(
    get,
    path = "/api/v1/debug/routes",
    tag = "Development",
    responses((status = 200, description = "Registered routes", body = RouteListResponse))
)]
pub async fn list_routes(State(state): State<AppState>) -> Json<RouteListResponse> {
    let routes = v1_route_table(state.config.debug);
    Json(RouteListResponse {
        total_routes: routes.len(),
        routes,
    })
}

/// Unknown path
pub async fn not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Path {} not found", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_hides_debug_routes() {
        assert_eq!(v1_route_table(false).len(), 2);

        let debug = v1_route_table(true);
        assert_eq!(debug.len(), 3);
        assert!(debug.iter().all(|r| r.path.starts_with(API_V1_PREFIX)));
    }

    #[test]
    fn test_endpoint_map_is_complete() {
        let endpoints: BTreeMap<_, _> = V1_ENDPOINTS.iter().copied().collect();
        assert_eq!(endpoints.len(), 14);
        assert_eq!(endpoints["plants"], "/api/v1/plants");
    }
}

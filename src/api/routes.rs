//! Application route configuration.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    api_health, api_v1_root, detailed_health, health, list_routes, not_found, root,
};
use super::middleware::{
    cors_layer, panic_response, rate_limit_middleware, request_context_middleware,
    security_headers_middleware, trusted_host_middleware,
};
use super::openapi::ApiDoc;
use super::AppState;
use crate::config::API_V1_PREFIX;

/// Routes nested under `/api/v1`.
fn v1_routes(debug: bool) -> Router<AppState> {
    let router = Router::new().route("/health", get(api_health));

    if debug {
        router.route("/debug/routes", get(list_routes))
    } else {
        router
    }
}

/// Create the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .route("/", get(root))
        // Liveness and dependency probes
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
        .route(API_V1_PREFIX, get(api_v1_root))
        .nest(API_V1_PREFIX, v1_routes(config.debug))
        .fallback(not_found);

    if config.debug {
        router = router.merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()));
    }

    with_middleware(router, state)
}

/// Wrap `router` in the full middleware stack and bind the state.
pub fn with_middleware(router: Router<AppState>, state: AppState) -> Router {
    let config = state.config.clone();

    // Innermost first
    let mut router = router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(DefaultBodyLimit::max(config.files.max_body_bytes()))
        .layer(cors_layer(&config.allowed_hosts));

    if !config.debug {
        router = router.layer(middleware::from_fn_with_state(
            state.clone(),
            trusted_host_middleware,
        ));
    }

    router
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! OpenAPI documentation, served at `/docs` in debug mode.

use utoipa::OpenApi;

use crate::api::handlers::{health_handler, root_handler};
use crate::infra::{DependencyHealth, HealthStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Plant Care API",
        version = "1.0.0",
        description = "Plant care management platform: collection, care scheduling, health monitoring and growth tracking",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        health_handler::health,
        health_handler::detailed_health,
        health_handler::api_health,
        root_handler::root,
        root_handler::api_v1_root,
        root_handler::list_routes,
    ),
    components(
        schemas(
            HealthStatus,
            DependencyHealth,
            health_handler::HealthResponse,
            health_handler::DetailedHealthResponse,
            health_handler::ApiHealthResponse,
            root_handler::RootResponse,
            root_handler::ApiV1Response,
            root_handler::RouteInfo,
            root_handler::RouteListResponse,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and dependency checks"),
        (name = "Root", description = "API discovery"),
        (name = "Development", description = "Debug-only endpoints")
    )
)]
pub struct ApiDoc;

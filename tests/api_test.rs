//! Integration tests for the HTTP surface.
//!
//! Dependencies are replaced with stub probes and an in-memory limiter, so
//! no database, Redis or Supabase is needed.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use plantcare_api::api::{create_router, with_middleware, AppState};
use plantcare_api::config::Config;
use plantcare_api::errors::{AppResult, GENERIC_ERROR_MESSAGE};
use plantcare_api::infra::{
    DependencyHealth, HealthProbe, InMemoryRateLimiter, RateDecision, RateLimiter,
};

// =============================================================================
// Stubs
// =============================================================================

struct StubProbe {
    name: &'static str,
    healthy: bool,
}

#[async_trait]
impl HealthProbe for StubProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn check(&self) -> DependencyHealth {
        if self.healthy {
            DependencyHealth::healthy(self.name)
        } else {
            DependencyHealth::unhealthy(self.name, "connection refused")
        }
    }
}

/// Limiter whose backend is down
struct BrokenLimiter;

#[async_trait]
impl RateLimiter for BrokenLimiter {
    fn limit(&self) -> u64 {
        100
    }

    fn window_seconds(&self) -> u64 {
        60
    }

    async fn check(&self, _client: &str) -> AppResult<RateDecision> {
        Err(plantcare_api::AppError::internal("redis down"))
    }
}

fn config(extra: &[(&str, &str)]) -> Arc<Config> {
    let mut vars: Vec<(String, String)> = vec![
        ("SUPABASE_URL", "https://abcd1234.supabase.co"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ("JWT_SECRET_KEY", "0123456789abcdef0123456789abcdef"),
        ("ADMIN_SECRET_KEY", "0123456789abcdef0123456789abcdef"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    let config = Config::from_lookup(|key| {
        vars.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .expect("test config loads");
    Arc::new(config)
}

struct TestApp {
    config: Arc<Config>,
    database: bool,
    redis: bool,
    supabase: bool,
    limiter: Arc<dyn RateLimiter>,
}

impl TestApp {
    fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            database: true,
            redis: true,
            supabase: true,
            limiter: Arc::new(InMemoryRateLimiter::new(100, 60)),
        }
    }

    fn router(self) -> Router {
        create_router(self.state())
    }

    fn state(self) -> AppState {
        let supabase: Arc<dyn HealthProbe> = Arc::new(StubProbe {
            name: "supabase",
            healthy: self.supabase,
        });
        let probes: Vec<Arc<dyn HealthProbe>> = vec![
            Arc::new(StubProbe {
                name: "database",
                healthy: self.database,
            }),
            Arc::new(StubProbe {
                name: "redis",
                healthy: self.redis,
            }),
            supabase.clone(),
        ];
        AppState::new(self.config, probes, supabase, self.limiter)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, "localhost")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_is_static() {
    let mut app = TestApp::new(config(&[]));
    app.database = false;
    app.redis = false;

    let response = app.router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "plant-care-api");
    assert_eq!(json["version"], "1.0.0");
}

#[tokio::test]
async fn test_detailed_health_all_up() {
    let app = TestApp::new(config(&[])).router();

    let response = app.oneshot(get("/health/detailed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    for name in ["database", "redis", "supabase"] {
        assert_eq!(json["dependencies"][name]["status"], "healthy", "{}", name);
    }
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_detailed_health_reports_failure_as_503() {
    let mut app = TestApp::new(config(&[]));
    app.redis = false;

    let response = app.router().oneshot(get("/health/detailed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_json(response).await;
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["dependencies"]["redis"]["status"], "unhealthy");
    assert_eq!(json["dependencies"]["redis"]["error"], "connection refused");
    assert_eq!(json["dependencies"]["database"]["status"], "healthy");
}

#[tokio::test]
async fn test_api_health_tracks_supabase() {
    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(get("/api/v1/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["api_version"], "v1");
    assert_eq!(json["dependencies"]["supabase"]["status"], "healthy");

    let mut app = TestApp::new(config(&[]));
    app.supabase = false;
    let response = app.router().oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Root and discovery
// =============================================================================

#[tokio::test]
async fn test_root_advertises_docs_only_in_debug() {
    let response = TestApp::new(config(&[])).router().oneshot(get("/")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["message"], "Welcome to Plant Care API");
    assert_eq!(json["docs"], "/docs");

    let response = TestApp::new(config(&[("DEBUG", "false")]))
        .router()
        .oneshot(get("/"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert!(json.get("docs").is_none());
    assert_eq!(json["health"], "/health");
}

#[tokio::test]
async fn test_api_v1_lists_feature_areas() {
    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(get("/api/v1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["endpoints"]["plants"], "/api/v1/plants");
    assert_eq!(json["endpoints"].as_object().unwrap().len(), 14);
}

#[tokio::test]
async fn test_debug_routes_only_in_debug() {
    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(get("/api/v1/debug/routes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total_routes"], 3);

    let response = TestApp::new(config(&[("DEBUG", "false")]))
        .router()
        .oneshot(get("/api/v1/debug/routes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_docs_mounted_only_in_debug() {
    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(get("/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/health/detailed"].is_object());

    let response = TestApp::new(config(&[("DEBUG", "false")]))
        .router()
        .oneshot(get("/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Errors and middleware
// =============================================================================

#[tokio::test]
async fn test_unknown_path_returns_error_envelope() {
    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(get("/nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("request id header");

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
    assert_eq!(json["error"]["message"], "Path /nope not found");
    assert_eq!(json["error"]["status_code"], 404);
    assert_eq!(json["error"]["request_id"], request_id.as_str());
}

#[tokio::test]
async fn test_every_response_carries_security_headers() {
    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(get("/health"))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));
    assert!(headers.contains_key("content-security-policy"));
}

#[tokio::test]
async fn test_untrusted_host_rejected_outside_debug() {
    let config = config(&[("DEBUG", "false"), ("ALLOWED_HOSTS", "api.plantcare.app")]);
    let request = Request::builder()
        .uri("/api/v1")
        .header(header::HOST, "evil.example.com")
        .body(Body::empty())
        .unwrap();

    let response = TestApp::new(config.clone()).router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_HOST");

    let request = Request::builder()
        .uri("/api/v1")
        .header(header::HOST, "api.plantcare.app:443")
        .body(Body::empty())
        .unwrap();
    let response = TestApp::new(config).router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_blocks_after_limit() {
    let mut app = TestApp::new(config(&[]));
    app.limiter = Arc::new(InMemoryRateLimiter::new(2, 60));
    let router = app.router();

    for remaining in ["1", "0"] {
        let response = router.clone().oneshot(get("/api/v1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let response = router.clone().oneshot(get("/api/v1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert!(response.headers().contains_key("x-ratelimit-reset"));

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert!(json["error"]["request_id"].is_string());

    // Health probes stay reachable for a throttled client.
    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let mut app = TestApp::new(config(&[]));
    app.limiter = Arc::new(InMemoryRateLimiter::new(1, 60));
    let router = app.router();

    let from = |ip: &str| {
        Request::builder()
            .uri("/api/v1")
            .header(header::HOST, "localhost")
            .header("X-Forwarded-For", ip)
            .body(Body::empty())
            .unwrap()
    };

    let response = router.clone().oneshot(from("203.0.113.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = router.clone().oneshot(from("203.0.113.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let response = router.oneshot(from("203.0.113.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_limiter_failure_denies_request() {
    let mut app = TestApp::new(config(&[]));
    app.limiter = Arc::new(BrokenLimiter);

    let response = app.router().oneshot(get("/api/v1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_health_exempt_from_trusted_host() {
    let config = config(&[("DEBUG", "false"), ("ALLOWED_HOSTS", "api.plantcare.app")]);

    for path in ["/health", "/health/detailed"] {
        let response = TestApp::new(config.clone())
            .router()
            .oneshot(get(path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", path);
    }

    let response = TestApp::new(config).router().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hsts_only_over_https() {
    let request = Request::builder()
        .uri("/health")
        .header(header::HOST, "localhost")
        .header("X-Forwarded-Proto", "https")
        .body(Body::empty())
        .unwrap();
    let response = TestApp::new(config(&[])).router().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::STRICT_TRANSPORT_SECURITY],
        "max-age=31536000; includeSubDomains"
    );

    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(get("/health"))
        .await
        .unwrap();
    assert!(!response
        .headers()
        .contains_key(header::STRICT_TRANSPORT_SECURITY));
}

async fn explode() -> StatusCode {
    panic!("handler exploded")
}

#[tokio::test]
async fn test_handler_panic_becomes_error_envelope() {
    let state = TestApp::new(config(&[])).state();
    let router = with_middleware(Router::new().route("/boom", axum::routing::get(explode)), state);

    let response = router.oneshot(get("/boom")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let request_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(json["error"]["message"], GENERIC_ERROR_MESSAGE);
    assert_eq!(json["error"]["request_id"], request_id.as_str());
    assert!(!json.to_string().contains("handler exploded"));
}

// =============================================================================
// CORS
// =============================================================================

fn from_origin(method: &str, origin: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/api/v1")
        .header(header::HOST, "localhost")
        .header(header::ORIGIN, origin)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_allows_listed_origin_with_credentials() {
    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(from_origin("GET", "http://localhost:3000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let exposed = headers[header::ACCESS_CONTROL_EXPOSE_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("x-total-count"));
    assert!(exposed.contains("x-request-id"));
}

#[tokio::test]
async fn test_cors_ignores_unlisted_origin() {
    let response = TestApp::new(config(&[]))
        .router()
        .oneshot(from_origin("GET", "https://evil.example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_cors_preflight_lists_methods_and_mirrors_headers() {
    let mut request = from_origin("OPTIONS", "http://127.0.0.1:5173");
    let headers = request.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_REQUEST_METHOD,
        "DELETE".parse().unwrap(),
    );
    headers.insert(
        header::ACCESS_CONTROL_REQUEST_HEADERS,
        "authorization".parse().unwrap(),
    );

    let response = TestApp::new(config(&[])).router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://127.0.0.1:5173"
    );
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    for method in ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"] {
        assert!(methods.contains(method), "{} missing from {}", method, methods);
    }
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "authorization");
}

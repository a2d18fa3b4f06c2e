//! Rate limiting middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::net::SocketAddr;

use crate::api::AppState;
use crate::config::RATE_LIMIT_EXEMPT_PATHS;
use crate::errors::AppError;
use crate::infra::RateDecision;

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Extract client identifier for rate limiting.
/// Uses X-Forwarded-For header if behind proxy, otherwise uses connection IP.
pub(crate) fn client_identifier(request: &Request) -> String {
    // First hop of the proxy chain is the original client
    if let Some(ip) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

/// Fixed-window rate limiting per client.
///
/// Health probes are exempt. Limiter failures deny the request.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if RATE_LIMIT_EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let limiter = &state.rate_limiter;
    let client = client_identifier(&request);

    let decision = match limiter.check(&client).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(client = %client, error = %e, "Rate limit check failed - denying request");
            let window = limiter.window_seconds();
            let denied = RateDecision {
                allowed: false,
                limit: limiter.limit(),
                remaining: 0,
                reset_at: Utc::now().timestamp().max(0) as u64 + window,
                retry_after: window,
            };
            return rejection(&denied, window);
        }
    };

    if !decision.allowed {
        tracing::warn!(client = %client, limit = decision.limit, "Rate limit exceeded");
        return rejection(&decision, limiter.window_seconds());
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &decision);
    response
}

fn rejection(decision: &RateDecision, window_seconds: u64) -> Response {
    let mut response = AppError::RateLimitExceeded {
        limit: decision.limit,
        window_seconds,
        retry_after: decision.retry_after,
    }
    .into_response();

    apply_headers(response.headers_mut(), decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(
        X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(X_RATELIMIT_RESET.clone(), HeaderValue::from(decision.reset_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::infra::{HealthProbe, MockHealthProbe, MockRateLimiter};

    fn request_with(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_client_identifier_precedence() {
        let request = request_with(&[
            ("X-Forwarded-For", "203.0.113.7, 10.0.0.1"),
            ("X-Real-IP", "198.51.100.2"),
        ]);
        assert_eq!(client_identifier(&request), "203.0.113.7");

        let request = request_with(&[("X-Real-IP", "198.51.100.2")]);
        assert_eq!(client_identifier(&request), "198.51.100.2");

        let mut request = request_with(&[]);
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_identifier(&request), "192.0.2.1");

        assert_eq!(client_identifier(&request_with(&[])), "unknown");
    }

    #[test]
    fn test_rejection_headers() {
        let decision = RateDecision {
            allowed: false,
            limit: 100,
            remaining: 0,
            reset_at: 1_700_000_060,
            retry_after: 42,
        };
        let response = rejection(&decision, 60);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "42");
        assert_eq!(response.headers()["x-ratelimit-limit"], "100");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1700000060");
    }

    fn app(limiter: MockRateLimiter) -> Router {
        let config = Config::from_lookup(|key| {
            let value = match key {
                "SUPABASE_URL" => "https://abcd1234.supabase.co",
                "SUPABASE_ANON_KEY" | "SUPABASE_SERVICE_ROLE_KEY" => "key",
                "JWT_SECRET_KEY" | "ADMIN_SECRET_KEY" => "0123456789abcdef0123456789abcdef",
                _ => return None,
            };
            Some(value.to_string())
        })
        .unwrap();
        let supabase: Arc<dyn HealthProbe> = Arc::new(MockHealthProbe::new());
        let state = AppState::new(Arc::new(config), vec![], supabase, Arc::new(limiter));

        Router::new()
            .route("/limited", get(|| async { "ok" }))
            .route("/health", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_allowed_request_gets_headers() {
        let mut limiter = MockRateLimiter::new();
        limiter
            .expect_check()
            .withf(|client| client == "203.0.113.9")
            .times(1)
            .returning(|_| {
                Ok(RateDecision {
                    allowed: true,
                    limit: 10,
                    remaining: 9,
                    reset_at: 1_700_000_060,
                    retry_after: 60,
                })
            });

        let request = Request::builder()
            .uri("/limited")
            .header("X-Forwarded-For", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let response = app(limiter).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "9");
    }

    #[tokio::test]
    async fn test_limiter_error_fails_closed() {
        let mut limiter = MockRateLimiter::new();
        limiter.expect_limit().return_const(10u64);
        limiter.expect_window_seconds().return_const(60u64);
        limiter
            .expect_check()
            .returning(|_| Err(AppError::internal("redis unavailable")));

        let request = Request::builder().uri("/limited").body(Body::empty()).unwrap();
        let response = app(limiter).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        assert_eq!(response.headers()["retry-after"], "60");
    }

    #[tokio::test]
    async fn test_exempt_path_skips_limiter() {
        let limiter = MockRateLimiter::new();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app(limiter).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

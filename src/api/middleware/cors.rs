//! CORS policy derived from `ALLOWED_HOSTS`.

use std::sync::Arc;

use axum::http::{request::Parts, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use super::trusted_host::{host_allowed, strip_port};

/// Host part of an `Origin` header value.
fn origin_host(origin: &str) -> Option<&str> {
    let (_, rest) = origin.split_once("://")?;
    let authority = rest.split('/').next()?;
    Some(strip_port(authority))
}

/// Allow origins whose host is in the allow-list, with credentials.
///
/// Request headers are mirrored since a wildcard cannot be combined
/// with credentials.
pub fn cors_layer(allowed_hosts: &[String]) -> CorsLayer {
    let hosts = Arc::new(allowed_hosts.to_vec());

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .ok()
                    .and_then(origin_host)
                    .map(|host| host_allowed(host, &hosts))
                    .unwrap_or(false)
            },
        ))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([
            HeaderName::from_static("x-total-count"),
            HeaderName::from_static("x-request-id"),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_host() {
        assert_eq!(origin_host("http://localhost:3000"), Some("localhost"));
        assert_eq!(origin_host("https://app.plantcare.app"), Some("app.plantcare.app"));
        assert_eq!(origin_host("null"), None);
    }
}

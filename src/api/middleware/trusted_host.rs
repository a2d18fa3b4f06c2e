//! Host header allow-list.

use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::config::TRUSTED_HOST_EXEMPT_PATHS;
use crate::errors::AppError;

/// Strip an optional port, keeping bracketed IPv6 literals intact.
pub(crate) fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Match a host against the allow-list. `*` allows everything and
/// `*.example.com` allows any subdomain.
pub(crate) fn host_allowed(host: &str, allowed: &[String]) -> bool {
    let host = host.to_ascii_lowercase();

    allowed.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if pattern == "*" {
            return true;
        }
        match pattern.strip_prefix("*.") {
            Some(suffix) => host.ends_with(&format!(".{}", suffix)),
            None => host == pattern,
        }
    })
}

/// Reject requests addressed to a host outside `ALLOWED_HOSTS`.
pub async fn trusted_host_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if TRUSTED_HOST_EXEMPT_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let host = request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().host().map(str::to_string))
        .unwrap_or_default();

    if !host_allowed(strip_port(&host), &state.config.allowed_hosts) {
        tracing::warn!(host = %host, "Rejected request for untrusted host");
        return Err(AppError::InvalidHost);
    }

    Ok(next.run(request).await)
}

//! Request id, access logging and error envelope stamping.

use std::any::Any;
use std::time::Instant;

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use super::rate_limit::client_identifier;
use crate::errors::{AppError, ErrorBody, ErrorEnvelope};

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Assign a request id, log start and completion, and stamp the id into
/// error envelopes produced further down the stack.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_identifier(&request);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client = %client,
        "Request started"
    );

    let response = next.run(request).await;
    let mut response = stamp_error_body(response, &request_id);

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration = %format!("{:.3}s", started.elapsed().as_secs_f64()),
        "Request completed"
    );

    response
}

/// Rewrite an error envelope with the request id filled in.
fn stamp_error_body(response: Response, request_id: &str) -> Response {
    let Some(mut body) = response.extensions().get::<ErrorBody>().cloned() else {
        return response;
    };
    body.request_id = Some(request_id.to_string());

    let Ok(bytes) = serde_json::to_vec(&ErrorEnvelope { error: body }) else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}

/// Turn a handler panic into a 500 envelope.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    AppError::internal(format!("Handler panicked: {}", detail)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_stamp_error_body_sets_request_id() {
        let response = AppError::not_found("Path /x not found").into_response();
        let response = stamp_error_body(response, "abc-123");

        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["request_id"], "abc-123");
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_non_error_response_untouched() {
        let response = Response::new(Body::from("ok"));
        let response = stamp_error_body(response, "abc");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[test]
    fn test_panic_response_is_generic_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.extensions().get::<ErrorBody>().unwrap();
        assert_eq!(body.code, "INTERNAL_SERVER_ERROR");
        assert_eq!(body.message, crate::errors::GENERIC_ERROR_MESSAGE);
    }
}

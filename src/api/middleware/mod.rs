//! API middleware.

mod cors;
mod rate_limit;
mod request_context;
mod security_headers;
mod trusted_host;

pub use cors::cors_layer;
pub use rate_limit::rate_limit_middleware;
pub use request_context::{panic_response, request_context_middleware, X_REQUEST_ID};
pub use security_headers::security_headers_middleware;
pub use trusted_host::trusted_host_middleware;

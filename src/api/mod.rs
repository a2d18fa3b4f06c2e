//! API layer - HTTP handlers and middleware
//!
//! - Request handlers
//! - Middleware (request context, rate limiting, security headers, trusted host, CORS)
//! - Route definitions and OpenAPI docs

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use routes::{create_router, with_middleware};
pub use state::AppState;

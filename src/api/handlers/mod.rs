//! HTTP request handlers.

pub mod health_handler;
pub mod root_handler;

pub use health_handler::{api_health, detailed_health, health};
pub use root_handler::{api_v1_root, list_routes, not_found, root};

//! Plant Care API - backend service skeleton
//!
//! HTTP API, background job worker and periodic scheduler sharing one
//! configuration and one Redis broker.
//!
//! # Layers
//!
//! - **cli** / **commands**: command-line interface and its implementations
//! - **config**: environment-driven settings and constants
//! - **infra**: Redis, Postgres, Supabase, rate limiting and health probes
//! - **api**: handlers, middleware and routes
//! - **jobs**: queues, worker tasks and the beat scheduler
//! - **errors**: centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! plantcare serve
//! plantcare jobs work --concurrency 2
//! plantcare jobs beat
//! plantcare config check
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod shutdown;

pub use api::AppState;
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use infra::Cache;

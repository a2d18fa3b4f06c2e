//! Infrastructure layer - External systems integration
//!
//! - Redis (cache, rate-limit store, job broker)
//! - Postgres connection pool
//! - Supabase REST client
//! - Fixed-window rate limiter backends
//! - Health probes shared by the API and the worker

pub mod cache;
pub mod db;
pub mod health;
pub mod rate_limiter;
pub mod supabase;

pub use cache::{Cache, RedisServerInfo, WindowCount};
pub use db::Database;
pub use health::{DependencyHealth, HealthProbe, HealthStatus};
pub use rate_limiter::{InMemoryRateLimiter, RateDecision, RateLimiter, RedisRateLimiter};
pub use supabase::SupabaseClient;

#[cfg(any(test, feature = "test-utils"))]
pub use health::MockHealthProbe;
#[cfg(any(test, feature = "test-utils"))]
pub use rate_limiter::MockRateLimiter;

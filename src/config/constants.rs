//! Application-wide constants
//!
//! Centralized location for defaults and magic values.

// =============================================================================
// Service identity
// =============================================================================

/// Service name reported by health endpoints
pub const SERVICE_NAME: &str = "plant-care-api";

/// Crate version, reported by health and root endpoints
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix for versioned API routes
pub const API_V1_PREFIX: &str = "/api/v1";

// =============================================================================
// Application
// =============================================================================

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_DEBUG: bool = true;
pub const DEFAULT_APP_HOST: &str = "0.0.0.0";
pub const DEFAULT_APP_PORT: u16 = 8000;
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

// =============================================================================
// Security
// =============================================================================

pub const DEFAULT_JWT_ALGORITHM: &str = "HS256";
pub const DEFAULT_JWT_ACCESS_TOKEN_EXPIRE_MINUTES: u64 = 30;
pub const DEFAULT_JWT_REFRESH_TOKEN_EXPIRE_DAYS: u64 = 30;

/// Minimum length for JWT and admin secrets
pub const MIN_SECRET_LENGTH: usize = 32;

/// Required scheme for the Supabase project URL
pub const SUPABASE_URL_SCHEME: &str = "https://";

/// Required host suffix for the Supabase project URL
pub const SUPABASE_HOST_SUFFIX: &str = ".supabase.co";

// =============================================================================
// Cache (Redis)
// =============================================================================

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";
pub const DEFAULT_REDIS_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_REDIS_CONNECTION_TIMEOUT_SECONDS: u64 = 30;

/// Connection attempts before giving up on the broker at startup
pub const BROKER_CONNECTION_MAX_RETRIES: u32 = 10;

/// Base delay between broker connection attempts (multiplied by attempt number)
pub const BROKER_CONNECTION_RETRY_DELAY_MS: u64 = 500;

pub const DEFAULT_CACHE_TTL_PLANT_LIBRARY: u64 = 86_400;
pub const DEFAULT_CACHE_TTL_WEATHER_DATA: u64 = 3_600;
pub const DEFAULT_CACHE_TTL_API_RESPONSES: u64 = 300;

/// Cache key prefix for rate limiting windows
pub const CACHE_PREFIX_RATE_LIMIT: &str = "rate_limit:";

/// Cache key prefix for stored job results
pub const CACHE_PREFIX_JOB_RESULT: &str = "job_result:";

// =============================================================================
// Database
// =============================================================================

pub const DATABASE_MAX_CONNECTIONS: u32 = 20;
pub const DATABASE_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Connections older than this are recycled
pub const DATABASE_MAX_LIFETIME_SECONDS: u64 = 3_600;

// =============================================================================
// Rate Limiting
// =============================================================================

pub const DEFAULT_RATE_LIMIT_PER_HOUR: u64 = 1_000;
pub const DEFAULT_RATE_LIMIT_BURST: u64 = 10;

/// Requests allowed per client per window
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Fixed window length in seconds
pub const RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

/// Paths that bypass rate limiting (orchestrator probes)
pub const RATE_LIMIT_EXEMPT_PATHS: &[&str] = &["/health", "/health/detailed"];

/// Container healthchecks reach these through `localhost`
pub const TRUSTED_HOST_EXEMPT_PATHS: &[&str] = RATE_LIMIT_EXEMPT_PATHS;

// =============================================================================
// File storage
// =============================================================================

pub const DEFAULT_MAX_IMAGE_SIZE_MB: u64 = 10;
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;
pub const DEFAULT_ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
pub const DEFAULT_ALLOWED_FILE_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

// =============================================================================
// Notifications
// =============================================================================

pub const DEFAULT_SENDGRID_FROM_NAME: &str = "Plant Care App";

// =============================================================================
// Outbound HTTP
// =============================================================================

pub const SUPABASE_CLIENT_INFO: &str = "plant-care-backend";
pub const SUPABASE_TIMEOUT_SECONDS: u64 = 10;

/// Reachability timeout for third-party provider checks
pub const PROVIDER_PROBE_TIMEOUT_SECONDS: u64 = 5;

// =============================================================================
// Background Jobs
// =============================================================================

pub const DEFAULT_WORKER_CONCURRENCY: usize = 2;

/// Job results expire after one hour
pub const JOB_RESULT_TTL_SECONDS: u64 = 3_600;

/// Exceeding the soft limit logs a warning
pub const TASK_SOFT_TIME_LIMIT_SECONDS: u64 = 300;

/// Exceeding the hard limit fails the job
pub const TASK_HARD_TIME_LIMIT_SECONDS: u64 = 600;

/// How long a stopping worker waits for in-flight jobs
pub const WORKER_SHUTDOWN_TIMEOUT_SECONDS: u64 = TASK_HARD_TIME_LIMIT_SECONDS + 10;

/// Broker namespace prefix for job queues
pub const QUEUE_NAMESPACE_PREFIX: &str = "plantcare";

pub const DEFAULT_BEAT_STATE_DIR: &str = "/var/lib/plantcare/beat";

/// File written inside the beat state directory
pub const BEAT_STATE_FILE: &str = "schedule.json";

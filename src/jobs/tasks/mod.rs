//! Background task implementations.

pub mod system_health;

pub use system_health::{
    aggregate_status, check_external_apis, collect_system_metrics, health_check,
    AggregateStatus, ApiStatus, ExternalApiReport, HealthCheckReport, HttpReachability,
    MetricsReport, Reachability,
};

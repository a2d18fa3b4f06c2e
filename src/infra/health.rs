//! Dependency health probes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Probe outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of checking a single dependency.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DependencyHealth {
    pub status: HealthStatus,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl DependencyHealth {
    pub fn healthy(service: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            service: service.into(),
            error: None,
            details: None,
        }
    }

    pub fn unhealthy(service: impl Into<String>, error: impl ToString) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            service: service.into(),
            error: Some(error.to_string()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// A dependency that can report its own health.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Key used in the `dependencies` map
    fn name(&self) -> &'static str;

    /// Check the dependency. Never fails; failures are reported as unhealthy.
    async fn check(&self) -> DependencyHealth;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_serializes_error() {
        let health = DependencyHealth::unhealthy("redis", "connection refused");
        let json = serde_json::to_value(&health).unwrap();

        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["service"], "redis");
        assert_eq!(json["error"], "connection refused");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_healthy_omits_error() {
        let health = DependencyHealth::healthy("database")
            .with_details(serde_json::json!({ "active_connections": 3 }));
        let json = serde_json::to_value(&health).unwrap();

        assert_eq!(json["status"], "healthy");
        assert!(json.get("error").is_none());
        assert_eq!(json["details"]["active_connections"], 3);
    }
}

//! Supabase REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
};

use super::health::{DependencyHealth, HealthProbe};
use crate::config::{Config, APP_VERSION, SUPABASE_CLIENT_INFO, SUPABASE_TIMEOUT_SECONDS};
use crate::errors::{AppError, AppResult};

/// HTTP client authenticated with the service-role key.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let key = config.supabase.service_role_key();

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", key))?);
        headers.insert("X-Client-Info", HeaderValue::from_static(SUPABASE_CLIENT_INFO));

        let client = Client::builder()
            .timeout(Duration::from_secs(SUPABASE_TIMEOUT_SECONDS))
            .user_agent(user_agent())
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.supabase.url.clone(),
        })
    }

    /// PostgREST root, which answers any authenticated GET.
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1/", self.base_url)
    }

    /// Succeeds when the REST endpoint answers with a 2xx status.
    pub async fn ping(&self) -> AppResult<()> {
        let response = self
            .client
            .get(self.rest_url())
            .send()
            .await
            .map_err(|e| AppError::external("Supabase", e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AppError::external(
                "Supabase",
                format!("REST endpoint returned {}", status),
            ))
        }
    }
}

#[async_trait]
impl HealthProbe for SupabaseClient {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn check(&self) -> DependencyHealth {
        let url = serde_json::json!({ "url": self.base_url });
        match self.ping().await {
            Ok(()) => DependencyHealth::healthy("supabase").with_details(url),
            Err(e) => DependencyHealth::unhealthy("supabase", e).with_details(url),
        }
    }
}

fn user_agent() -> String {
    format!("PlantCare-API/{}", APP_VERSION)
}

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AppError::configuration("Supabase key contains invalid header characters"))
}

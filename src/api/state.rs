//! Application state shared by handlers and middleware.

use std::sync::Arc;

use crate::config::{Config, RateLimitBackend};
use crate::infra::{
    Cache, Database, HealthProbe, InMemoryRateLimiter, RateLimiter, RedisRateLimiter,
    SupabaseClient,
};

/// Application state.
///
/// Dependencies sit behind traits so tests can inject stubs.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Probes reported by `/health/detailed`, in report order
    pub probes: Arc<Vec<Arc<dyn HealthProbe>>>,
    /// Probe reported by `/api/v1/health`
    pub supabase: Arc<dyn HealthProbe>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    /// Create new application state with manually injected dependencies.
    pub fn new(
        config: Arc<Config>,
        probes: Vec<Arc<dyn HealthProbe>>,
        supabase: Arc<dyn HealthProbe>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            config,
            probes: Arc::new(probes),
            supabase,
            rate_limiter,
        }
    }

    /// Wire the real infrastructure clients.
    pub fn from_infra(
        config: Arc<Config>,
        cache: Cache,
        database: Database,
        supabase: SupabaseClient,
    ) -> Self {
        let settings = &config.rate_limit;
        let rate_limiter: Arc<dyn RateLimiter> = match settings.backend {
            RateLimitBackend::Redis => Arc::new(RedisRateLimiter::new(
                cache.clone(),
                settings.requests,
                settings.window_seconds,
            )),
            RateLimitBackend::Memory => Arc::new(InMemoryRateLimiter::new(
                settings.requests,
                settings.window_seconds,
            )),
        };

        let supabase: Arc<dyn HealthProbe> = Arc::new(supabase);
        let probes: Vec<Arc<dyn HealthProbe>> =
            vec![Arc::new(database), Arc::new(cache), supabase.clone()];

        Self::new(config, probes, supabase, rate_limiter)
    }
}

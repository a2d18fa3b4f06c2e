//! Fixed-window request counters.
//!
//! Two backends: a per-process map and a Redis counter shared by replicas.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::cache::Cache;
use crate::errors::AppResult;

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp (seconds) at which the window resets
    pub reset_at: u64,
    /// Seconds until the client may retry
    pub retry_after: u64,
}

/// Per-client request throttle.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Requests allowed per window
    fn limit(&self) -> u64;

    /// Window length in seconds
    fn window_seconds(&self) -> u64;

    /// Count a request from `client` and decide whether it may proceed.
    async fn check(&self, client: &str) -> AppResult<RateDecision>;
}

fn now_unix() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: u64,
    count: u64,
}

/// Process-local limiter. Each replica counts independently.
pub struct InMemoryRateLimiter {
    limit: u64,
    window_seconds: u64,
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimiter {
    pub fn new(limit: u64, window_seconds: u64) -> Self {
        Self {
            limit,
            window_seconds,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request at an explicit time.
    pub fn check_at(&self, client: &str, now: u64) -> RateDecision {
        let mut windows = self.windows.lock().unwrap_or_else(|p| p.into_inner());

        windows.retain(|_, w| now.saturating_sub(w.started_at) < self.window_seconds);

        let window = windows.entry(client.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        let reset_at = window.started_at + self.window_seconds;
        let retry_after = reset_at.saturating_sub(now).max(1);

        if window.count >= self.limit {
            return RateDecision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                reset_at,
                retry_after,
            };
        }

        window.count += 1;
        RateDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - window.count,
            reset_at,
            retry_after,
        }
    }

    /// Number of clients with a live window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    fn limit(&self) -> u64 {
        self.limit
    }

    fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    async fn check(&self, client: &str) -> AppResult<RateDecision> {
        Ok(self.check_at(client, now_unix()))
    }
}

// =============================================================================
// Redis backend
// =============================================================================

/// Limiter backed by an atomic Redis counter, shared across replicas.
pub struct RedisRateLimiter {
    cache: Cache,
    limit: u64,
    window_seconds: u64,
}

impl RedisRateLimiter {
    pub fn new(cache: Cache, limit: u64, window_seconds: u64) -> Self {
        Self {
            cache,
            limit,
            window_seconds,
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    fn limit(&self) -> u64 {
        self.limit
    }

    fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    async fn check(&self, client: &str) -> AppResult<RateDecision> {
        let window = self.cache.count_in_window(client, self.window_seconds).await?;
        Ok(decide(self.limit, window.count, window.ttl_seconds, now_unix()))
    }
}

/// Decision for a counter that already includes the current request.
fn decide(limit: u64, count: u64, ttl_seconds: u64, now: u64) -> RateDecision {
    let allowed = count <= limit;
    RateDecision {
        allowed,
        limit,
        remaining: if allowed { limit - count } else { 0 },
        reset_at: now + ttl_seconds,
        retry_after: ttl_seconds.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_exactly_limit_requests() {
        let limiter = InMemoryRateLimiter::new(3, 60);

        let decisions: Vec<_> = (0..4).map(|_| limiter.check_at("1.2.3.4", 1_000)).collect();

        assert!(decisions[..3].iter().all(|d| d.allowed));
        assert_eq!(decisions[0].remaining, 2);
        assert_eq!(decisions[2].remaining, 0);
        assert!(!decisions[3].allowed);
        assert_eq!(decisions[3].reset_at, 1_060);
    }

    #[test]
    fn test_window_resets() {
        let limiter = InMemoryRateLimiter::new(1, 60);

        assert!(limiter.check_at("c", 1_000).allowed);
        let blocked = limiter.check_at("c", 1_045);
        assert!(!blocked.allowed);
        assert_eq!(blocked.retry_after, 15);

        assert!(limiter.check_at("c", 1_060).allowed);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = InMemoryRateLimiter::new(1, 60);

        assert!(limiter.check_at("a", 0).allowed);
        assert!(limiter.check_at("b", 0).allowed);
        assert!(!limiter.check_at("a", 1).allowed);
    }

    #[test]
    fn test_stale_windows_pruned() {
        let limiter = InMemoryRateLimiter::new(5, 10);

        limiter.check_at("a", 0);
        limiter.check_at("b", 0);
        assert_eq!(limiter.tracked_clients(), 2);

        limiter.check_at("c", 20);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_redis_decision() {
        let allowed = decide(100, 100, 30, 1_000);
        assert!(allowed.allowed);
        assert_eq!(allowed.remaining, 0);
        assert_eq!(allowed.reset_at, 1_030);

        let rejected = decide(100, 101, 30, 1_000);
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after, 30);
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let limiter: Box<dyn RateLimiter> = Box::new(InMemoryRateLimiter::new(2, 60));
        assert_eq!(limiter.limit(), 2);
        assert!(limiter.check("x").await.unwrap().allowed);
    }
}

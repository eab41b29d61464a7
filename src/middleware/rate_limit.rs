//! Sliding-window in-memory rate limiter for the open endpoints.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<RwLock<HashMap<String, VecDeque<Instant>>>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: usize, window_secs: u64) -> Self {
        Self {
            hits: Arc::new(RwLock::new(HashMap::new())),
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Record an attempt for `key` and report whether it is within the limit.
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.write().await;
        let bucket = hits.entry(key.to_string()).or_default();

        while bucket
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            bucket.pop_front();
        }

        if bucket.len() < self.limit {
            bucket.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drop keys whose whole window has lapsed.
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut hits = self.hits.write().await;
        hits.retain(|_, bucket| {
            while bucket
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.window)
            {
                bucket.pop_front();
            }
            !bucket.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_the_limit_per_key() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.allow("a").await);
        assert!(limiter.allow("a").await);
        assert!(!limiter.allow("a").await);
        // Other keys are unaffected.
        assert!(limiter.allow("b").await);
    }

    #[tokio::test]
    async fn window_expiry_frees_the_key() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.allow("a").await);
        assert!(!limiter.allow("a").await);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.allow("a").await);
    }

    #[tokio::test]
    async fn sweep_drops_lapsed_keys() {
        let limiter = RateLimiter::new(5, 1);
        limiter.allow("a").await;
        limiter.allow("b").await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        limiter.sweep().await;
        assert!(limiter.hits.read().await.is_empty());
    }
}

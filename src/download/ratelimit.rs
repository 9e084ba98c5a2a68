//! Per-identity sliding-window admission.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Sliding-window rate limiter keyed by requester identity.
///
/// Windows are pruned lazily on each check. A rejected attempt keeps the
/// pruned window but adds nothing to it, so hammering the bot never
/// extends a lockout.
pub struct RateLimiter {
    quota: usize,
    window: Duration,
    windows: Mutex<HashMap<i64, Vec<Instant>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(quota: usize, window: Duration) -> Self {
        Self {
            quota,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request from `user_id`.
    pub async fn admit(&self, user_id: i64) -> bool {
        self.admit_at(user_id, Instant::now()).await
    }

    async fn admit_at(&self, user_id: i64, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(user_id).or_default();
        window.retain(|stamp| now.duration_since(*stamp) < self.window);
        if window.len() >= self.quota {
            return false;
        }
        window.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_quota_one_rejects_second_call() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.admit_at(7, now).await);
        assert!(!limiter.admit_at(7, now + Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_admitted_again_after_window_elapses() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.admit_at(7, now).await);
        assert!(limiter.admit_at(7, now + Duration::from_secs(31)).await);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.admit_at(1, now).await);
        assert!(limiter.admit_at(2, now).await);
        assert!(!limiter.admit_at(1, now + Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_quota_counts_within_window() {
        let limiter = RateLimiter::new(3, WINDOW);
        let now = Instant::now();

        for i in 0..3 {
            assert!(limiter.admit_at(9, now + Duration::from_secs(i)).await);
        }
        assert!(!limiter.admit_at(9, now + Duration::from_secs(3)).await);
        // Once the first stamp ages out, one slot frees up.
        assert!(limiter.admit_at(9, now + Duration::from_secs(30)).await);
    }

    #[tokio::test]
    async fn test_rejected_attempt_does_not_extend_the_window() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.admit_at(4, now).await);
        assert!(!limiter.admit_at(4, now + Duration::from_secs(10)).await);
        // Had the rejection been recorded, this would still be blocked.
        assert!(limiter.admit_at(4, now + Duration::from_secs(31)).await);
    }
}

//! Key-based access control with flood-safe denials.
//!
//! When a shared key is configured, users present it once via `/key`
//! and stay unlocked for the session TTL. Denied users are told at
//! most once per cooldown period, so a stranger spamming links cannot
//! make the bot flood Telegram with refusals and get itself limited.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on tracked users; an evicted user is simply asked for
/// the key again.
const MAX_TRACKED_USERS: u64 = 10_000;

/// Gate consulted before any link is accepted.
#[derive(Clone)]
pub struct AccessGate {
    /// Shared secret; `None` means the bot is public.
    key: Option<String>,
    /// Users who presented the key; the TTL bounds the session.
    unlocked: Cache<i64, ()>,
    /// Users already told "key required" within the cooldown.
    denied_recently: Cache<i64, ()>,
    /// Denials suppressed by the cooldown, for throttled logging.
    silenced_count: Arc<AtomicU64>,
}

impl AccessGate {
    #[must_use]
    pub fn new(key: Option<String>, session_ttl_secs: u64, denial_cooldown_secs: u64) -> Self {
        let key = key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let unlocked = Cache::builder()
            .max_capacity(MAX_TRACKED_USERS)
            .time_to_live(Duration::from_secs(session_ttl_secs))
            .build();
        let denied_recently = Cache::builder()
            .max_capacity(MAX_TRACKED_USERS)
            .time_to_live(Duration::from_secs(denial_cooldown_secs))
            .build();

        Self {
            key,
            unlocked,
            denied_recently,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a key is required at all.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Whether this user may submit links right now.
    pub async fn permits(&self, user_id: i64) -> bool {
        !self.enabled() || self.unlocked.get(&user_id).await.is_some()
    }

    /// Try to unlock a session with a submitted key. Surrounding
    /// whitespace is forgiven; the key itself is compared verbatim.
    pub async fn unlock(&self, user_id: i64, submitted: &str) -> bool {
        let Some(expected) = self.key.as_deref() else {
            return true;
        };
        if submitted.trim() == expected {
            self.unlocked.insert(user_id, ()).await;
            info!("User {} unlocked a session", user_id);
            return true;
        }
        false
    }

    /// Whether a "key required" reply should go out, or the user was
    /// already told within the cooldown. Silenced attempts are still
    /// counted, and every 100th one is logged.
    pub async fn should_notify_denial(&self, user_id: i64) -> bool {
        if self.denied_recently.get(&user_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(100) {
            debug!("Silenced {} keyless attempts (recent: user {})", count, user_id);
        }
        false
    }

    /// Start the denial cooldown once the reply actually went out.
    pub async fn mark_denial_notified(&self, user_id: i64) {
        self.denied_recently.insert(user_id, ()).await;
    }

    /// Total denials suppressed so far.
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_key_means_public() {
        let gate = AccessGate::new(None, 60, 60);
        assert!(!gate.enabled());
        assert!(gate.permits(1).await);
    }

    #[tokio::test]
    async fn test_blank_key_means_public() {
        let gate = AccessGate::new(Some("   ".to_string()), 60, 60);
        assert!(!gate.enabled());
        assert!(gate.permits(1).await);
    }

    #[tokio::test]
    async fn test_locked_until_the_right_key_arrives() {
        let gate = AccessGate::new(Some("s3cret".to_string()), 60, 60);

        assert!(!gate.permits(42).await);
        assert!(!gate.unlock(42, "wrong").await);
        assert!(!gate.permits(42).await);

        assert!(gate.unlock(42, " s3cret ").await);
        assert!(gate.permits(42).await);
    }

    #[tokio::test]
    async fn test_configured_key_is_trimmed() {
        let gate = AccessGate::new(Some("  s3cret\n".to_string()), 60, 60);
        assert!(gate.enabled());
        assert!(gate.unlock(9, "s3cret").await);
    }

    #[tokio::test]
    async fn test_unlock_is_per_user() {
        let gate = AccessGate::new(Some("s3cret".to_string()), 60, 60);

        assert!(gate.unlock(1, "s3cret").await);
        assert!(gate.permits(1).await);
        assert!(!gate.permits(2).await);
    }

    #[tokio::test]
    async fn test_session_expires_after_ttl() {
        let gate = AccessGate::new(Some("s3cret".to_string()), 1, 60);

        assert!(gate.unlock(7, "s3cret").await);
        assert!(gate.permits(7).await);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!gate.permits(7).await);
    }

    #[tokio::test]
    async fn test_denial_cooldown_silences_repeats() {
        let gate = AccessGate::new(Some("s3cret".to_string()), 60, 60);

        assert!(gate.should_notify_denial(9).await);
        gate.mark_denial_notified(9).await;

        assert!(!gate.should_notify_denial(9).await);
        assert!(!gate.should_notify_denial(9).await);
        assert_eq!(gate.silenced_count(), 2);

        // A different user is still told normally.
        assert!(gate.should_notify_denial(10).await);
    }
}

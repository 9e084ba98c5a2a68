//! Global cap on simultaneous fetch executions.

use tokio::sync::{Semaphore, SemaphorePermit};

/// Counting semaphore held for the full duration of a fetch.
///
/// Requests past the cap wait; nothing is ever rejected here.
pub struct FetchGate {
    slots: Semaphore,
}

impl FetchGate {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            slots: Semaphore::new(max_concurrent),
        }
    }

    /// Wait for a free slot. Dropping the permit returns it.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        // The semaphore is private and never closed.
        self.slots
            .acquire()
            .await
            .expect("fetch gate semaphore closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_acquire_past_cap_suspends_until_release() {
        let gate = FetchGate::new(2);

        let first = gate.acquire().await;
        let _second = gate.acquire().await;

        // Third holder must wait.
        assert!(timeout(Duration::from_millis(50), gate.acquire())
            .await
            .is_err());

        drop(first);
        assert!(timeout(Duration::from_millis(50), gate.acquire())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_holders_never_exceed_cap() {
        let gate = Arc::new(FetchGate::new(2));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let _slot = gate.acquire().await;
                let holders = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(holders, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.expect("gate task panicked");
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}

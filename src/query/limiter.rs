//! Summary Query Limiter
//!
//! Caps the number of summary sub-queries one load call may start. Requests
//! beyond the limit are dropped: they resolve immediately to `None`, they are
//! never queued and never fail. One limiter lives for exactly one call.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of summary queries per call
pub const DEFAULT_SUMMARY_QUERY_LIMIT: usize = 100;

/// Bounded gate for summary sub-queries
#[derive(Debug)]
pub struct SummaryQueryLimiter {
    limit: usize,
    started: AtomicUsize,
}

impl SummaryQueryLimiter {
    /// Create a limiter admitting at most `limit` tasks
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            started: AtomicUsize::new(0),
        }
    }

    /// Claim a slot; `false` once the limit is reached
    pub fn try_acquire(&self) -> bool {
        self.started
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }

    /// Run the task if a slot is free, otherwise resolve to `None` without running it
    pub async fn run<F, Fut, T>(&self, task: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.try_acquire() {
            tracing::debug!(limit = self.limit, "Summary query limit reached, skipping");
            return None;
        }
        Some(task().await)
    }

    /// Number of tasks admitted so far
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for SummaryQueryLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_QUERY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_excess_tasks_are_noops() {
        let limiter = SummaryQueryLimiter::new(3);
        let counter = AtomicUsize::new(0);
        let executed = &counter;

        let results = join_all((0..10).map(|i| {
            limiter.run(move || {
                let executed = executed;
                async move {
                    executed.fetch_add(1, Ordering::SeqCst);
                    i
                }
            })
        }))
        .await;

        assert_eq!(results.len(), 10);
        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 3);
        assert_eq!(executed.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.started(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_never_exceeds_limit() {
        let limiter = Arc::new(SummaryQueryLimiter::new(50));
        let handles: Vec<_> = (0..200)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.try_acquire() })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 50);
        assert_eq!(limiter.started(), 50);
    }

    #[test]
    fn test_zero_limit() {
        let limiter = SummaryQueryLimiter::new(0);
        assert!(!limiter.try_acquire());
        assert_eq!(SummaryQueryLimiter::default().limit(), 100);
    }
}

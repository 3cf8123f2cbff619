//! In-flight job tracking for graceful shutdown.
//!
//! # Responsibilities
//! - Count jobs from the moment they are scheduled until they finish
//! - Let shutdown wait, with a deadline, for the count to reach zero

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Tracks detached jobs.
///
/// The count lives in a watch channel so draining waits for a change
/// instead of polling.
#[derive(Debug, Clone)]
pub struct JobTracker {
    count: Arc<watch::Sender<usize>>,
}

impl JobTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            count: Arc::new(tx),
        }
    }

    /// Record a new job. Returns a guard that decrements on drop.
    pub fn track(&self) -> JobGuard {
        self.count.send_modify(|n| *n += 1);
        JobGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Jobs scheduled and not yet finished.
    pub fn in_flight(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until no job is in flight. Returns `false` if `timeout` elapsed
    /// first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let mut rx = self.count.subscribe();
        let idle = tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0)).await;
        matches!(idle, Ok(Ok(_)))
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a job's lifetime.
#[derive(Debug)]
pub struct JobGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n -= 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts() {
        let tracker = JobTracker::new();
        assert_eq!(tracker.in_flight(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_eq!(tracker.in_flight(), 2);

        drop(guard1);
        assert_eq!(tracker.in_flight(), 1);
        drop(guard2);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_idle_resolves_when_last_job_ends() {
        let tracker = JobTracker::new();
        let guard = tracker.track();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(guard);
        });

        assert!(tracker.wait_idle(Duration::from_secs(1)).await);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_idle_gives_up_at_deadline() {
        let tracker = JobTracker::new();
        let _guard = tracker.track();
        assert!(!tracker.wait_idle(Duration::from_millis(50)).await);
    }
}

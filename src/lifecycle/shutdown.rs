//! Shutdown coordination.

use crate::resilience::{CancellationSignal, Subscription};

/// Coordinator for graceful shutdown.
///
/// Wraps a [`CancellationSignal`] that long-running tasks and in-flight
/// races can subscribe to. Triggering is idempotent.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    signal: CancellationSignal,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying signal, for racing operations against shutdown.
    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> Subscription {
        self.signal.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        if self.signal.fire() {
            tracing::info!("Shutdown triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.signal.is_fired()
    }

    /// Get the number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.signal.listener_count()
    }

    /// Wait until shutdown is triggered.
    pub async fn wait(&self) {
        self.signal.fired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_subscribers() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let task = tokio::spawn(async move { waiter.wait().await });
        tokio::task::yield_now().await;

        shutdown.trigger();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("subscriber not woken")
            .unwrap();
        assert!(shutdown.is_triggered());
        assert_eq!(shutdown.receiver_count(), 0);
    }
}

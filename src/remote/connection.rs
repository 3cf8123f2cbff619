//! Simulated remote connection and its lazily connected wrapper.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::RemoteConfig;
use crate::remote::RemoteError;

/// An established connection to the pub/sub endpoint.
#[derive(Debug)]
pub struct RemoteConnection {
    endpoint: String,
    publish_latency: Duration,
    jitter_ms: u64,
    published: AtomicU64,
    closed: AtomicBool,
}

impl RemoteConnection {
    /// Connect to the configured endpoint.
    pub async fn connect(config: &RemoteConfig) -> Result<Self, RemoteError> {
        if !config.endpoint.contains("://") {
            return Err(RemoteError::Connect {
                endpoint: config.endpoint.clone(),
                reason: "endpoint must be a URL".to_string(),
            });
        }

        tokio::time::sleep(Duration::from_millis(config.connect_latency_ms)).await;
        tracing::info!(endpoint = %config.endpoint, "Remote connection established");

        Ok(Self {
            endpoint: config.endpoint.clone(),
            publish_latency: Duration::from_millis(config.publish_latency_ms),
            jitter_ms: config.jitter_ms,
            published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Publish `message` to `group`.
    pub async fn publish(&self, group: &str, message: &str) -> Result<(), RemoteError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::Closed);
        }

        let jitter = if self.jitter_ms > 0 {
            Duration::from_millis(fastrand::u64(0..=self.jitter_ms))
        } else {
            Duration::ZERO
        };
        tokio::time::sleep(self.publish_latency + jitter).await;

        self.published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            endpoint = %self.endpoint,
            group,
            bytes = message.len(),
            "Message published"
        );
        Ok(())
    }

    /// Messages published over this connection.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(endpoint = %self.endpoint, "Remote connection closed");
        }
    }
}

/// A remote connection established on first use.
#[derive(Debug)]
pub struct LazyRemoteConnection {
    config: RemoteConfig,
    cell: OnceCell<RemoteConnection>,
    connect_attempts: AtomicU64,
    rejecting: AtomicBool,
}

impl LazyRemoteConnection {
    /// Create the wrapper. No connection is made yet.
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
            connect_attempts: AtomicU64::new(0),
            rejecting: AtomicBool::new(false),
        }
    }

    async fn connection(&self) -> Result<&RemoteConnection, RemoteError> {
        self.cell
            .get_or_try_init(|| async {
                self.connect_attempts.fetch_add(1, Ordering::SeqCst);
                RemoteConnection::connect(&self.config).await
            })
            .await
    }

    /// Publish `message` to `group`, connecting first if needed.
    pub async fn publish(&self, group: &str, message: &str) -> Result<(), RemoteError> {
        let connection = self.connection().await?;
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(RemoteError::Publish {
                group: group.to_string(),
                reason: "broker rejected message".to_string(),
            });
        }
        connection.publish(group, message).await
    }

    /// Make the broker reject publishes (`true`) or accept them again.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Messages published so far; zero before the first connect.
    pub fn published(&self) -> u64 {
        self.cell.get().map(RemoteConnection::published).unwrap_or(0)
    }

    /// Close the underlying connection if one was made.
    pub fn close(&self) {
        if let Some(connection) = self.cell.get() {
            connection.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn config() -> RemoteConfig {
        RemoteConfig {
            endpoint: "pubsub://test".to_string(),
            connect_latency_ms: 100,
            publish_latency_ms: 10,
            jitter_ms: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connects_once_on_first_use() {
        let remote = Arc::new(LazyRemoteConnection::new(config()));
        assert!(!remote.is_connected());

        let mut tasks = Vec::new();
        for i in 0..5 {
            let remote = Arc::clone(&remote);
            tasks.push(tokio::spawn(async move {
                remote.publish("group", &format!("hello {i}")).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(remote.is_connected());
        assert_eq!(remote.connect_attempts(), 1);
        assert_eq!(remote.published(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_is_retried() {
        let mut bad = config();
        bad.endpoint = "no-scheme".to_string();
        let remote = LazyRemoteConnection::new(bad);

        assert!(matches!(
            remote.publish("group", "x").await,
            Err(RemoteError::Connect { .. })
        ));
        assert!(remote.publish("group", "x").await.is_err());
        assert_eq!(remote.connect_attempts(), 2);
        assert!(!remote.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn rejecting_and_closed() {
        let remote = LazyRemoteConnection::new(config());
        remote.set_rejecting(true);
        assert!(matches!(
            remote.publish("g", "x").await,
            Err(RemoteError::Publish { .. })
        ));
        remote.set_rejecting(false);
        remote.publish("g", "x").await.unwrap();

        remote.close();
        assert_eq!(remote.publish("g", "x").await, Err(RemoteError::Closed));
    }
}

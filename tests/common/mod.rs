//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use async_scenarios::config::ScenarioConfig;
use async_scenarios::http::{AppState, HttpServer};
use async_scenarios::lifecycle::Shutdown;

pub const ADMIN_KEY: &str = "test-admin-key";

/// A running server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    /// Feeds the server's config update loop, as the file watcher does.
    pub config_updates: mpsc::UnboundedSender<ScenarioConfig>,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to finish draining.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

/// Defaults with latencies shrunk so tests run quickly.
pub fn fast_config() -> ScenarioConfig {
    let mut config = ScenarioConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.background.start_delay_ms = 50;
    config.background.drain_timeout_secs = 5;
    config.remote.connect_latency_ms = 10;
    config.remote.publish_latency_ms = 10;
    config.remote.jitter_ms = 0;
    config.storage.write_latency_ms = 5;
    config.observability.metrics_enabled = false;
    config.admin.api_key = ADMIN_KEY.to_string();
    config
}

pub async fn start_server(config: ScenarioConfig) -> TestServer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone());
    let state = server.state().clone();

    let (tx, config_updates) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, config_updates));

    TestServer {
        addr,
        state,
        shutdown,
        config_updates: tx,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `check` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

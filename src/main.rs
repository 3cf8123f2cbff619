//! Async scenarios server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ handlers ─┬─▶ DeadlineRacer ──▶ remote publish
//!                                               │     (timeout | shutdown signal)
//!                                               │
//!                                               └─▶ BackgroundRunner ──▶ fresh scope ──▶ storage
//!                                                     (detached)           │
//!                                                                          └─▶ failure sink
//!
//!     Cross-cutting: config (+ hot reload), observability, lifecycle
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use async_scenarios::config::{load_config, ConfigWatcher, ScenarioConfig};
use async_scenarios::lifecycle::signals::trigger_on_signal;
use async_scenarios::observability::{logging, metrics};
use async_scenarios::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "async-scenarios")]
#[command(about = "Deadline racing and detached work demo server", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ScenarioConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("async-scenarios v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        publish_timeout_ms = config.timeouts.publish_ms,
        background_delay_ms = config.background.start_delay_ms,
        remote = %config.remote.endpoint,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Keep the watcher alive for the life of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            match watcher.run() {
                Ok(w) => (Some(w), updates),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    (None, updates)
                }
            }
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    tokio::spawn(trigger_on_signal(shutdown.clone()));

    HttpServer::new(config, shutdown).run(listener, config_updates).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

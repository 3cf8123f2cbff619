//! OS signal handling.
//!
//! # Responsibilities
//! - Translate Ctrl-C / SIGTERM into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be installed is logged, not fatal

use crate::lifecycle::Shutdown;

/// Wait for Ctrl-C (or SIGTERM on unix), then trigger `shutdown`.
pub async fn trigger_on_signal(shutdown: Shutdown) {
    tokio::select! {
        _ = ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
        _ = shutdown.wait() => {}
    }
}

async fn ctrl_c() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(e) = res {
                            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                            std::future::pending::<()>().await;
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

//! Remote pub/sub dependency.
//!
//! # Data Flow
//! ```text
//! Handler
//!     → LazyRemoteConnection::publish (connects on first use, async)
//!     → RemoteConnection::publish (simulated network latency)
//! ```
//!
//! # Design Decisions
//! - Construction never performs I/O; the connect happens on first use
//!   through `tokio::sync::OnceCell`, so nothing blocks on it synchronously
//! - Concurrent first users share one connect attempt; a failed attempt
//!   leaves the cell empty for the next caller to retry
//! - Callers put a deadline on publishes with the deadline racer

pub mod connection;

pub use connection::{LazyRemoteConnection, RemoteConnection};

use thiserror::Error;

/// Errors raised by the remote dependency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("publish to group '{group}' failed: {reason}")]
    Publish { group: String, reason: String },

    #[error("connection closed")]
    Closed,
}

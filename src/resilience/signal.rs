//! Broadcastable, idempotent cancellation signal.
//!
//! # Responsibilities
//! - Let any number of races subscribe to a single "stop" notification
//! - Make firing idempotent (firing twice == firing once)
//! - Make unsubscription safe before and after the signal fired
//!
//! # Design Decisions
//! - Built on `tokio::sync::watch`: the fired state is level-triggered, so a
//!   subscription created after the signal fired observes it immediately
//! - A subscription is a `watch::Receiver`; dropping it unsubscribes
//! - `listener_count()` exposes live subscriptions for leak checks

use std::sync::Arc;
use tokio::sync::watch;

/// A cooperative "stop" notification shared between its owner and any number
/// of listeners.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationSignal {
    /// Create a new, unfired signal with no listeners.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Returns `true` only for the call that actually
    /// transitioned it; later calls are no-ops.
    pub fn fire(&self) -> bool {
        let fired = self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        });
        if fired {
            tracing::debug!(listeners = self.listener_count(), "Cancellation signal fired");
        }
        fired
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to the signal.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait until the signal fires.
    pub async fn fired(&self) {
        self.subscribe().fired().await
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A live listener registration on a [`CancellationSignal`].
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<bool>,
}

impl Subscription {
    /// Resolve once the signal has fired. Resolves immediately if it already
    /// had. If every clone of the signal is dropped without firing, this
    /// never resolves.
    pub async fn fired(&mut self) {
        if self.rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Whether the signal has fired, without waiting.
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Fires the wrapped signal when dropped.
///
/// Ties a signal to the lifetime of a scope (a request, a server run).
#[derive(Debug)]
pub struct FireOnDrop(pub CancellationSignal);

impl Drop for FireOnDrop {
    fn drop(&mut self) {
        self.0.fire();
    }
}

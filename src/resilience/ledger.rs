//! Per-racer accounting of secondary waiters and outcomes.
//!
//! The ledger makes the leak invariant observable: once every race owned by a
//! racer has returned, `pending_timers` and `live_subscriptions` are zero.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Which side ended a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation resolved with a value.
    Completed,
    /// The operation resolved with its own error.
    Failed,
    /// The cancellation signal fired first.
    Cancelled,
    /// The deadline elapsed first.
    TimedOut,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Failed => "failed",
            Outcome::Cancelled => "cancelled",
            Outcome::TimedOut => "timed_out",
        }
    }
}

/// Counters shared by every race a [`DeadlineRacer`](super::race::DeadlineRacer) runs.
#[derive(Debug, Default)]
pub struct RaceLedger {
    pending_timers: AtomicUsize,
    live_subscriptions: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    timed_out: AtomicU64,
}

/// Point-in-time copy of a [`RaceLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub pending_timers: usize,
    pub live_subscriptions: usize,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub timed_out: u64,
}

impl LedgerSnapshot {
    /// Total number of races that produced an outcome.
    pub fn total(&self) -> u64 {
        self.completed + self.failed + self.cancelled + self.timed_out
    }
}

impl RaceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers created and not yet fired-and-observed or cancelled.
    pub fn pending_timers(&self) -> usize {
        self.pending_timers.load(Ordering::SeqCst)
    }

    /// Signal subscriptions not yet released.
    pub fn live_subscriptions(&self) -> usize {
        self.live_subscriptions.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            pending_timers: self.pending_timers(),
            live_subscriptions: self.live_subscriptions(),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn timer_armed(&self) -> usize {
        self.pending_timers.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn timer_disarmed(&self) -> usize {
        self.pending_timers.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub(crate) fn subscribed(&self) {
        self.live_subscriptions.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn unsubscribed(&self) {
        self.live_subscriptions.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Completed => &self.completed,
            Outcome::Failed => &self.failed,
            Outcome::Cancelled => &self.cancelled,
            Outcome::TimedOut => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

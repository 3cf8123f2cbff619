//! Deadline racer: attach a timeout or cancellation signal to an in-flight
//! operation.
//!
//! # Responsibilities
//! - Race an operation against exactly one secondary waiter
//! - Produce exactly one outcome per race
//! - Release the timer or signal subscription on every exit path
//! - Leave the raced operation running when it loses
//!
//! # Design Decisions
//! - One primitive (`race`) parameterized by [`RaceCondition`]; timeouts and
//!   signals share the same cleanup path
//! - The operation is a spawned task; losing the race drops the `JoinHandle`,
//!   which detaches the task instead of aborting it
//! - `select!` is biased toward the operation so a simultaneous completion
//!   keeps the already-available result
//! - Timeout and cancellation are distinct errors

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

use crate::observability::metrics;
use crate::resilience::ledger::{LedgerSnapshot, Outcome, RaceLedger};
use crate::resilience::signal::CancellationSignal;
use crate::resilience::timer::Waiter;

/// What an operation is raced against.
#[derive(Debug, Clone)]
pub enum RaceCondition {
    /// Give up after a fixed duration.
    Timeout(Duration),
    /// Give up when the signal fires.
    Signal(CancellationSignal),
}

impl RaceCondition {
    pub fn label(&self) -> &'static str {
        match self {
            RaceCondition::Timeout(_) => "timeout",
            RaceCondition::Signal(_) => "signal",
        }
    }
}

impl From<Duration> for RaceCondition {
    fn from(duration: Duration) -> Self {
        RaceCondition::Timeout(duration)
    }
}

impl From<CancellationSignal> for RaceCondition {
    fn from(signal: CancellationSignal) -> Self {
        RaceCondition::Signal(signal)
    }
}

impl From<&CancellationSignal> for RaceCondition {
    fn from(signal: &CancellationSignal) -> Self {
        RaceCondition::Signal(signal.clone())
    }
}

/// Errors a race can end with.
#[derive(Debug, Error)]
pub enum RaceError<E> {
    /// The cancellation signal fired before the operation resolved.
    #[error("operation cancelled")]
    Cancelled,

    /// The deadline elapsed before the operation resolved.
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The operation resolved with its own error.
    #[error("operation failed: {0}")]
    OperationFailed(E),

    /// The operation task panicked or was aborted by its owner.
    #[error("operation task aborted: {0}")]
    Aborted(JoinError),
}

impl<E> RaceError<E> {
    pub fn outcome(&self) -> Outcome {
        match self {
            RaceError::Cancelled => Outcome::Cancelled,
            RaceError::TimedOut(_) => Outcome::TimedOut,
            RaceError::OperationFailed(_) | RaceError::Aborted(_) => Outcome::Failed,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RaceError::TimedOut(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RaceError::Cancelled)
    }
}

/// An in-flight operation producing `Result<T, E>`.
///
/// Owned by whoever spawned it; the racer only observes it.
#[derive(Debug)]
pub struct OperationHandle<T, E> {
    task: JoinHandle<Result<T, E>>,
}

impl<T, E> OperationHandle<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start `operation` on the runtime and return a handle to it.
    pub fn spawn<F>(operation: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            task: tokio::spawn(operation),
        }
    }
}

impl<T, E> OperationHandle<T, E> {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T, E> From<JoinHandle<Result<T, E>>> for OperationHandle<T, E> {
    fn from(task: JoinHandle<Result<T, E>>) -> Self {
        Self { task }
    }
}

/// Races operations against deadlines and cancellation signals.
///
/// Cloning shares the ledger.
#[derive(Debug, Clone, Default)]
pub struct DeadlineRacer {
    ledger: Arc<RaceLedger>,
}

impl DeadlineRacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> &RaceLedger {
        &self.ledger
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    /// Race `operation` against `condition`.
    ///
    /// Returns the operation's value, its error as
    /// [`RaceError::OperationFailed`], or the interruption that came first.
    /// The secondary waiter is released before this returns. A losing
    /// operation keeps running; its result is discarded.
    pub async fn race<T, E>(
        &self,
        operation: OperationHandle<T, E>,
        condition: impl Into<RaceCondition>,
    ) -> Result<T, RaceError<E>> {
        let condition = condition.into();
        let start = Instant::now();
        let mut task = operation.task;

        let result = {
            let mut waiter = Waiter::arm(&condition, &self.ledger);
            tokio::select! {
                biased;
                joined = &mut task => match joined {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(RaceError::OperationFailed(e)),
                    Err(e) => Err(RaceError::Aborted(e)),
                },
                interrupted = waiter.wait() => Err(interrupted),
            }
        };

        // Detach, never abort: cancellation is the operation's own concern.
        drop(task);

        let outcome = match &result {
            Ok(_) => Outcome::Completed,
            Err(e) => e.outcome(),
        };
        self.ledger.record(outcome);
        metrics::record_race(condition.label(), outcome.as_str(), start);
        tracing::debug!(
            condition = condition.label(),
            outcome = outcome.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Race resolved"
        );

        result
    }

    /// Race `operation` against a fixed timeout.
    pub async fn timeout_after<T, E>(
        &self,
        operation: OperationHandle<T, E>,
        timeout: Duration,
    ) -> Result<T, RaceError<E>> {
        self.race(operation, RaceCondition::Timeout(timeout)).await
    }

    /// Race `operation` against a cancellation signal the caller shares with
    /// other listeners.
    pub async fn with_cancellation<T, E>(
        &self,
        operation: OperationHandle<T, E>,
        signal: &CancellationSignal,
    ) -> Result<T, RaceError<E>> {
        self.race(operation, signal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::timer::TimerGuard;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::sleep;

    fn resolves_after<T: Send + 'static>(delay: Duration, value: T) -> OperationHandle<T, String> {
        OperationHandle::spawn(async move {
            sleep(delay).await;
            Ok(value)
        })
    }

    fn never_resolves() -> OperationHandle<u32, String> {
        OperationHandle::spawn(std::future::pending())
    }

    #[tokio::test(start_paused = true)]
    async fn completes_before_deadline() {
        let racer = DeadlineRacer::new();
        let op = resolves_after(Duration::from_millis(50), 42);

        let result = racer.timeout_after(op, Duration::from_millis(500)).await;

        assert_eq!(result.unwrap(), 42);
        let snap = racer.snapshot();
        assert_eq!(snap.pending_timers, 0);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_promptly() {
        let racer = DeadlineRacer::new();
        let start = tokio::time::Instant::now();

        let result = racer.timeout_after(never_resolves(), Duration::from_millis(100)).await;

        assert!(matches!(result, Err(RaceError::TimedOut(d)) if d == Duration::from_millis(100)));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(120));
        assert_eq!(racer.ledger().pending_timers(), 0);
        assert_eq!(racer.snapshot().timed_out, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn losing_operation_keeps_running() {
        let racer = DeadlineRacer::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let op = OperationHandle::<(), String>::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        let result = racer.timeout_after(op, Duration::from_millis(50)).await;
        assert!(result.unwrap_err().is_timeout());
        assert!(!finished.load(Ordering::SeqCst));

        sleep(Duration::from_millis(200)).await;
        assert!(finished.load(Ordering::SeqCst), "operation was torn down");
        assert_eq!(racer.ledger().pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn operation_error_propagates_unchanged() {
        let racer = DeadlineRacer::new();
        let op = OperationHandle::<u32, String>::spawn(async { Err("boom".to_string()) });

        match racer.timeout_after(op, Duration::from_secs(5)).await {
            Err(RaceError::OperationFailed(e)) => assert_eq!(e, "boom"),
            other => panic!("unexpected result: {:?}", other),
        }
        let snap = racer.snapshot();
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.pending_timers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_operation_reports_aborted() {
        let racer = DeadlineRacer::new();
        let op = OperationHandle::<u32, String>::spawn(async {
            let fail = true;
            if fail {
                panic!("operation panicked");
            }
            Ok(0)
        });

        let result = racer.timeout_after(op, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(RaceError::Aborted(ref e)) if e.is_panic()));
        assert_eq!(racer.ledger().pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_by_signal() {
        let racer = DeadlineRacer::new();
        let signal = CancellationSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            trigger.fire();
        });
        let start = tokio::time::Instant::now();

        let result = racer
            .with_cancellation(resolves_after(Duration::from_millis(200), 7), &signal)
            .await;

        assert!(result.unwrap_err().is_cancelled());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(30));
        assert!(elapsed < Duration::from_millis(50));
        assert_eq!(signal.listener_count(), 0);
        assert_eq!(racer.ledger().live_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn firing_after_resolution_has_no_effect() {
        let racer = DeadlineRacer::new();
        let signal = CancellationSignal::new();

        let result = racer
            .with_cancellation(resolves_after(Duration::from_millis(10), 1), &signal)
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(signal.listener_count(), 0);

        assert!(signal.fire());
        assert!(!signal.fire());
        let snap = racer.snapshot();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.cancelled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_fire_cancels_every_current_race() {
        let racer = DeadlineRacer::new();
        let signal = CancellationSignal::new();

        let mut races = Vec::new();
        for _ in 0..3 {
            let racer = racer.clone();
            let signal = signal.clone();
            races.push(tokio::spawn(async move {
                racer.with_cancellation(never_resolves(), &signal).await
            }));
        }
        while signal.listener_count() < 3 {
            tokio::task::yield_now().await;
        }

        signal.fire();
        for race in races {
            assert!(race.await.unwrap().unwrap_err().is_cancelled());
        }

        // A race started after the signal fired resolves at once.
        let late = racer.with_cancellation(never_resolves(), &signal).await;
        assert!(late.unwrap_err().is_cancelled());

        let snap = racer.snapshot();
        assert_eq!(snap.cancelled, 4);
        assert_eq!(snap.live_subscriptions, 0);
        assert_eq!(signal.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn simultaneous_completion_prefers_operation() {
        let racer = DeadlineRacer::new();
        let op = OperationHandle::<&str, String>::spawn(async { Ok("ready") });
        // Let the operation finish before the race starts polling.
        while !op.is_finished() {
            tokio::task::yield_now().await;
        }

        let result = racer.timeout_after(op, Duration::ZERO).await;
        assert_eq!(result.unwrap(), "ready");
    }

    #[tokio::test(start_paused = true)]
    async fn no_pending_timers_under_load() {
        let racer = DeadlineRacer::new();
        let mut races = Vec::new();
        for i in 0..200u64 {
            let racer = racer.clone();
            races.push(tokio::spawn(async move {
                let op = resolves_after(Duration::from_millis(i % 7), i);
                racer.timeout_after(op, Duration::from_secs(3600)).await
            }));
        }
        for race in races {
            race.await.unwrap().unwrap();
        }
        let snap = racer.snapshot();
        assert_eq!(snap.completed, 200);
        assert_eq!(snap.pending_timers, 0);
    }

    /// The leaking shape: the timer is detached rather than cancelled when the
    /// operation wins, so it stays pending for its full duration.
    #[tokio::test(start_paused = true)]
    async fn detached_timer_stays_pending_after_success() {
        let ledger = Arc::new(RaceLedger::new());
        let mut timer = TimerGuard::arm(Duration::from_secs(3600), Arc::clone(&ledger));
        let op = resolves_after(Duration::from_millis(5), 9);

        let leaked = tokio::spawn(async move { timer.elapsed().await });
        assert_eq!(op.task.await.unwrap().unwrap(), 9);
        assert_eq!(ledger.pending_timers(), 1);

        leaked.abort();
        let _ = leaked.await;
        assert_eq!(ledger.pending_timers(), 0);
    }
}

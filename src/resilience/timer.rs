//! Secondary waiters raced against an operation.
//!
//! # Responsibilities
//! - Arm exactly one waiter per race: a one-shot timer or a signal subscription
//! - Account for every armed waiter in the racer's ledger
//! - Release the waiter on drop, whichever side won
//!
//! # Design Decisions
//! - Cancelling a tokio `Sleep` is dropping it, so release lives in `Drop`
//!   and runs on every exit path (win, loss, caller dropping the race)
//! - The pending-timer gauge is adjusted by +1/-1 so several racers can
//!   share it

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Sleep;

use crate::observability::metrics;
use crate::resilience::ledger::RaceLedger;
use crate::resilience::race::{RaceCondition, RaceError};
use crate::resilience::signal::Subscription;

/// A one-shot deadline owned by a single race.
pub(crate) struct TimerGuard {
    sleep: Pin<Box<Sleep>>,
    duration: Duration,
    fired: bool,
    ledger: Arc<RaceLedger>,
}

impl TimerGuard {
    pub(crate) fn arm(duration: Duration, ledger: Arc<RaceLedger>) -> Self {
        let pending = ledger.timer_armed();
        metrics::timer_armed();
        tracing::trace!(duration_ms = duration.as_millis() as u64, pending, "Timer armed");
        Self {
            sleep: Box::pin(tokio::time::sleep(duration)),
            duration,
            fired: false,
            ledger,
        }
    }

    pub(crate) async fn elapsed(&mut self) {
        self.sleep.as_mut().await;
        self.fired = true;
    }

    pub(crate) fn duration(&self) -> Duration {
        self.duration
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        let pending = self.ledger.timer_disarmed();
        metrics::timer_disarmed();
        if self.fired {
            tracing::trace!(pending, "Timer fired and observed");
        } else {
            tracing::trace!(pending, "Timer cancelled before firing");
        }
    }
}

/// A cancellation-signal subscription owned by a single race.
pub(crate) struct SignalWaiter {
    subscription: Subscription,
    ledger: Arc<RaceLedger>,
}

impl SignalWaiter {
    pub(crate) fn subscribe(subscription: Subscription, ledger: Arc<RaceLedger>) -> Self {
        ledger.subscribed();
        Self {
            subscription,
            ledger,
        }
    }
}

impl Drop for SignalWaiter {
    fn drop(&mut self) {
        self.ledger.unsubscribed();
        tracing::trace!(fired = self.subscription.is_fired(), "Signal subscription released");
    }
}

/// The single secondary waiter of a race.
pub(crate) enum Waiter {
    Timer(TimerGuard),
    Signal(SignalWaiter),
}

impl Waiter {
    pub(crate) fn arm(condition: &RaceCondition, ledger: &Arc<RaceLedger>) -> Self {
        match condition {
            RaceCondition::Timeout(duration) => {
                Waiter::Timer(TimerGuard::arm(*duration, Arc::clone(ledger)))
            }
            RaceCondition::Signal(signal) => {
                Waiter::Signal(SignalWaiter::subscribe(signal.subscribe(), Arc::clone(ledger)))
            }
        }
    }

    /// Resolve when the waiter fires, yielding the interruption it stands for.
    pub(crate) fn wait<E>(&mut self) -> impl Future<Output = RaceError<E>> + '_ {
        async move {
            match self {
                Waiter::Timer(timer) => {
                    timer.elapsed().await;
                    RaceError::TimedOut(timer.duration())
                }
                Waiter::Signal(waiter) => {
                    waiter.subscription.fired().await;
                    RaceError::Cancelled
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::signal::CancellationSignal;

    #[tokio::test(start_paused = true)]
    async fn timer_released_on_drop_without_firing() {
        let ledger = Arc::new(RaceLedger::new());
        let timer = TimerGuard::arm(Duration::from_secs(60), Arc::clone(&ledger));
        assert_eq!(ledger.pending_timers(), 1);
        drop(timer);
        assert_eq!(ledger.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_then_releases() {
        let ledger = Arc::new(RaceLedger::new());
        let mut waiter = Waiter::arm(&RaceCondition::Timeout(Duration::from_millis(10)), &ledger);
        let err: RaceError<()> = waiter.wait().await;
        assert!(matches!(err, RaceError::TimedOut(d) if d == Duration::from_millis(10)));
        assert_eq!(ledger.pending_timers(), 1);
        drop(waiter);
        assert_eq!(ledger.pending_timers(), 0);
    }

    #[tokio::test]
    async fn signal_waiter_unsubscribes_on_drop() {
        let ledger = Arc::new(RaceLedger::new());
        let signal = CancellationSignal::new();
        let waiter = Waiter::arm(&RaceCondition::Signal(signal.clone()), &ledger);
        assert_eq!(signal.listener_count(), 1);
        assert_eq!(ledger.live_subscriptions(), 1);

        drop(waiter);
        assert_eq!(signal.listener_count(), 0);
        assert_eq!(ledger.live_subscriptions(), 0);
    }
}

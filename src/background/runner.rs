//! Scoped background runner.
//!
//! # Responsibilities
//! - Schedule deferred work without blocking the caller
//! - Give each job a fresh resource scope it alone owns
//! - Catch every failure (errors and panics) and report it to the sink
//! - Release the scope on every exit path
//!
//! # Design Decisions
//! - Work is an `FnOnce(ResourceScope) -> Future` closure that may only
//!   capture `Send + 'static` values; request-scoped handles have no business
//!   in it and the request id travels as a `String` in `JobContext`
//! - The start delay is read when a job is scheduled, so a reloaded
//!   `background.start_delay_ms` applies to the next job
//! - The scope is released before the failure is reported
//! - Failures go to the sink only; there is no caller to return them to

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::background::scope::{ResourceScope, ScopeFactory, ScopeSnapshot};
use crate::background::tracker::JobTracker;
use crate::background::{BackgroundError, JobContext};
use crate::config::BackgroundConfig;
use crate::observability::metrics;
use crate::observability::FailureSink;

/// Runs deferred work detached from the request that scheduled it.
#[derive(Clone)]
pub struct BackgroundRunner {
    scopes: ScopeFactory,
    sink: Arc<dyn FailureSink>,
    tracker: JobTracker,
    start_delay_ms: Arc<AtomicU64>,
}

impl BackgroundRunner {
    pub fn new(scopes: ScopeFactory, sink: Arc<dyn FailureSink>, start_delay: Duration) -> Self {
        Self {
            scopes,
            sink,
            tracker: JobTracker::new(),
            start_delay_ms: Arc::new(AtomicU64::new(start_delay.as_millis() as u64)),
        }
    }

    pub fn from_config(
        config: &BackgroundConfig,
        scopes: ScopeFactory,
        sink: Arc<dyn FailureSink>,
    ) -> Self {
        Self::new(scopes, sink, Duration::from_millis(config.start_delay_ms))
    }

    /// Delay applied to jobs scheduled from now on. Shared by every clone.
    pub fn set_start_delay(&self, delay: Duration) {
        let previous = self
            .start_delay_ms
            .swap(delay.as_millis() as u64, Ordering::Relaxed);
        if previous != delay.as_millis() as u64 {
            tracing::info!(
                previous_ms = previous,
                delay_ms = delay.as_millis() as u64,
                "Background start delay changed"
            );
        }
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms.load(Ordering::Relaxed))
    }

    /// Schedule `work` and return immediately.
    ///
    /// After the start delay the job receives a freshly created
    /// [`ResourceScope`]. Whatever happens inside `work`, the scope is released
    /// exactly once and failures are reported to the sink tagged with
    /// `context`.
    pub fn run_detached<W, Fut>(&self, context: JobContext, work: W)
    where
        W: FnOnce(ResourceScope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BackgroundError>> + Send + 'static,
    {
        let job_guard = self.tracker.track();
        let scopes = self.scopes.clone();
        let sink = Arc::clone(&self.sink);
        let start_delay = self.start_delay();

        tracing::debug!(
            job = context.job,
            request_id = %context.request_id,
            delay_ms = start_delay.as_millis() as u64,
            "Background job scheduled"
        );

        tokio::spawn(async move {
            let _job_guard = job_guard;
            if !start_delay.is_zero() {
                tokio::time::sleep(start_delay).await;
            }

            let start = Instant::now();
            let scope_guard = scopes.create_scope(context.job, &context.request_id);
            let scope = scope_guard.scope().clone();
            let span = scope.span().clone();

            let outcome = AssertUnwindSafe(async move { work(scope).await })
                .catch_unwind()
                .instrument(span.clone())
                .await;

            let result = match outcome {
                Ok(result) => result,
                Err(panic) => Err(BackgroundError::Panicked(panic_message(panic.as_ref()))),
            };

            drop(scope_guard);

            let _entered = span.enter();
            match result {
                Ok(()) => {
                    metrics::record_background_job(context.job, "ok", start);
                    tracing::info!(
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Background job completed"
                    );
                }
                Err(e) => {
                    metrics::record_background_job(context.job, "failed", start);
                    sink.record(&e, &context.tags());
                }
            }
        });
    }

    /// Jobs scheduled and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.in_flight()
    }

    /// Wait for in-flight jobs. Returns `false` if `timeout` elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let in_flight = self.in_flight();
        if in_flight > 0 {
            tracing::info!(in_flight, "Draining background jobs");
        }
        let drained = self.tracker.wait_idle(timeout).await;
        if !drained {
            tracing::warn!(
                in_flight = self.in_flight(),
                "Background jobs still running at drain deadline"
            );
        }
        drained
    }

    pub fn scopes(&self) -> ScopeSnapshot {
        self.scopes.snapshot()
    }

    pub fn scope_factory(&self) -> &ScopeFactory {
        &self.scopes
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

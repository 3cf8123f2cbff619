//! Detached background work subsystem.
//!
//! # Data Flow
//! ```text
//! Handler (request still alive):
//!     capture plain values → JobContext { job, request_id }
//!     → runner.rs run_detached(context, work)   (returns immediately)
//!
//! Detached task (request may be gone):
//!     tracker.rs JobGuard (in-flight count)
//!     → start delay
//!     → scope.rs create_scope() (fresh storage context + span)
//!     → work(scope) inside a failure boundary
//!     → scope released → failure reported to the sink
//! ```
//!
//! # Design Decisions
//! - Deferred work never borrows request-scoped resources; it re-acquires
//!   them from a scope it owns
//! - Every failure, including a panic, is survivable and reported, never
//!   propagated
//! - Scope release lives in a guard's `Drop`, so it happens exactly once

pub mod runner;
pub mod scope;
pub mod tracker;

pub use runner::BackgroundRunner;
pub use scope::{ResourceScope, ScopeFactory, ScopeGuard, ScopeSnapshot};
pub use tracker::{JobGuard, JobTracker};

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Failures raised inside deferred work.
#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("job panicked: {0}")]
    Panicked(String),
}

/// Plain values a deferred job may carry from the request that scheduled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    /// Job name used in logs and metrics.
    pub job: &'static str,
    /// Request id, extracted before the request completed.
    pub request_id: String,
}

impl JobContext {
    pub fn new(job: &'static str, request_id: impl Into<String>) -> Self {
        Self {
            job,
            request_id: request_id.into(),
        }
    }

    /// Tags attached to a failure report.
    pub fn tags(&self) -> [(&'static str, String); 2] {
        [
            ("job", self.job.to_string()),
            ("request_id", self.request_id.clone()),
        ]
    }
}

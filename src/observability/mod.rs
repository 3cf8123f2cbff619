//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Detached work failures:
//!     → sink.rs (log + bounded window for the admin API)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows into background jobs as a plain string tag
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod sink;

pub use sink::{FailureLog, FailureRecord, FailureSink, Tags};

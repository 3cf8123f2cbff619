//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Build server → Listen
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Cancel in-flight races
//!     → Drain background jobs (bounded) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Shutdown is a cancellation signal, so races can use it directly
//! - Drain has a deadline: jobs still running after it are abandoned

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

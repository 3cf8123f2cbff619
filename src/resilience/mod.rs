//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Handler with an in-flight operation:
//!     → race.rs (spawned operation vs. one secondary waiter)
//!     → timer.rs (arm timer or signal subscription, release on drop)
//!     → signal.rs (broadcast cancellation, shared by many races)
//!     → ledger.rs (pending timers, live subscriptions, outcomes)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline or a cancellation source
//! - Cleanup is enforced in one primitive, not per call site
//! - Timeout and cancellation errors are distinct from operation errors

pub mod ledger;
pub mod race;
pub mod signal;
pub mod timer;

pub use ledger::{LedgerSnapshot, Outcome, RaceLedger};
pub use race::{DeadlineRacer, OperationHandle, RaceCondition, RaceError};
pub use signal::{CancellationSignal, FireOnDrop, Subscription};

//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! ResourceScope
//!     → context.rs (unit of work bound to the scope: add, save_changes)
//!     → store.rs (shared in-memory table, constraint checks, fault injection)
//!     → model.rs (persisted records)
//! ```
//!
//! # Design Decisions
//! - One `PokemonStore` per process, one `StorageContext` per scope
//! - A context refuses work once its scope is released
//! - Failures are typed: conflict, unavailable, disposed

pub mod context;
pub mod model;
pub mod store;

pub use context::StorageContext;
pub use model::Pokemon;
pub use store::PokemonStore;

use thiserror::Error;

/// Errors raised by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A unique constraint was violated.
    #[error("conflict: pokemon named '{0}' already exists")]
    Conflict(String),

    /// The store cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The context was used after its scope was released.
    #[error("storage context used after its scope was released")]
    Disposed,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

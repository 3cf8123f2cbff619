//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ScenarioConfig (validated, immutable)
//!     → shared via ArcSwap with request handlers
//!
//! On file change:
//!     watcher.rs sees an event in the config file's directory
//!     → waits for the burst of events to settle
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → skipped if equal to the last config
//!     → atomic swap of Arc<ScenarioConfig>
//!     → next request observes new timeouts and admin key
//!     → next background job observes the new start delay
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener, body limit, request timeout, remote, storage and
//!   observability settings are read once at startup; reloads that change
//!   them are logged as needing a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BackgroundConfig, ListenerConfig, LogFormat, ObservabilityConfig, RemoteConfig,
    ScenarioConfig, StorageConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;

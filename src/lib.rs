//! Async scenarios: deadline racing and scoped background work.

pub mod admin;
pub mod background;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod remote;
pub mod resilience;
pub mod storage;

pub use config::schema::ScenarioConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{DeadlineRacer, OperationHandle, RaceError};

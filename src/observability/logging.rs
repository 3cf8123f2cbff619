//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable by `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Build the filter: `RUST_LOG` wins, then `log_level` from config.
///
/// A bare level such as `debug` applies to this crate and to `tower_http`;
/// anything else is treated as a full filter directive.
pub fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = config.log_level.trim();
    let directive = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("async_scenarios={level},tower_http={level}")
    };

    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("invalid log filter '{directive}': {e}; falling back to info");
        EnvFilter::new("async_scenarios=info,tower_http=info")
    })
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(build_filter(config));

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    }
}

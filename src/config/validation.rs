//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ScenarioConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ScenarioConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("timeouts.publish_ms ({publish_ms}) exceeds timeouts.max_publish_ms ({max_publish_ms})")]
    PublishAboveMax { publish_ms: u64, max_publish_ms: u64 },

    #[error("admin.api_key: must not be empty when admin is enabled")]
    EmptyApiKey,
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &ScenarioConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let nonzero = [
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.publish_ms", config.timeouts.publish_ms),
        ("timeouts.max_publish_ms", config.timeouts.max_publish_ms),
        ("background.drain_timeout_secs", config.background.drain_timeout_secs),
        (
            "background.failure_log_capacity",
            config.background.failure_log_capacity as u64,
        ),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.timeouts.publish_ms > config.timeouts.max_publish_ms {
        errors.push(ValidationError::PublishAboveMax {
            publish_ms: config.timeouts.publish_ms,
            max_publish_ms: config.timeouts.max_publish_ms,
        });
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ScenarioConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ScenarioConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.timeouts.publish_ms = 20_000;
        config.admin.api_key = " ".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero {
            field: "timeouts.request_secs"
        }));
        assert!(errors.contains(&ValidationError::EmptyApiKey));
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = ScenarioConfig::default();
        config.observability.metrics_enabled = false;
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
    }
}

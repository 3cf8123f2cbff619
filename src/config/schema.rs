//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deadlines applied to requests and raced operations.
    pub timeouts: TimeoutConfig,

    /// Deferred work settings.
    pub background: BackgroundConfig,

    /// Simulated remote pub/sub dependency.
    pub remote: RemoteConfig,

    /// Simulated persistence layer.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl ScenarioConfig {
    /// Fields that differ between `self` and `next` but are only read at
    /// startup. Reloading them has no effect until the server restarts.
    ///
    /// Everything else (publish deadlines, background start delay, drain
    /// timeout, admin key) is read from the live config.
    pub fn restart_required(&self, next: &ScenarioConfig) -> Vec<&'static str> {
        let changes = [
            ("listener.bind_address", self.listener.bind_address != next.listener.bind_address),
            ("listener.max_body_bytes", self.listener.max_body_bytes != next.listener.max_body_bytes),
            ("timeouts.request_secs", self.timeouts.request_secs != next.timeouts.request_secs),
            (
                "background.failure_log_capacity",
                self.background.failure_log_capacity != next.background.failure_log_capacity,
            ),
            ("remote", self.remote != next.remote),
            ("storage", self.storage != next.storage),
            ("observability", self.observability != next.observability),
            ("admin.enabled", self.admin.enabled != next.admin.enabled),
        ];
        changes
            .into_iter()
            .filter(|(_, changed)| *changed)
            .map(|(field, _)| field)
            .collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a request/response in seconds.
    pub request_secs: u64,

    /// Default deadline for a raced publish in milliseconds.
    pub publish_ms: u64,

    /// Upper bound a client may ask for via `?timeout_ms=`.
    pub max_publish_ms: u64,
}

impl TimeoutConfig {
    pub fn publish(&self) -> Duration {
        Duration::from_millis(self.publish_ms)
    }

    /// Clamp a client-requested deadline to the configured maximum.
    pub fn publish_or(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms.unwrap_or(self.publish_ms).min(self.max_publish_ms);
        Duration::from_millis(ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            publish_ms: 500,
            max_publish_ms: 10_000,
        }
    }
}

/// Deferred work configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Delay before a detached job starts, in milliseconds.
    pub start_delay_ms: u64,

    /// How long shutdown waits for in-flight jobs, in seconds.
    pub drain_timeout_secs: u64,

    /// Number of recent failures kept for the admin API.
    pub failure_log_capacity: usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 1000,
            drain_timeout_secs: 10,
            failure_log_capacity: 100,
        }
    }
}

/// Remote dependency configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Endpoint name used in logs.
    pub endpoint: String,

    /// Simulated connect latency in milliseconds.
    pub connect_latency_ms: u64,

    /// Simulated publish latency in milliseconds.
    pub publish_latency_ms: u64,

    /// Random extra latency, up to this many milliseconds, per publish.
    pub jitter_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "pubsub://localhost:6379".to_string(),
            connect_latency_ms: 200,
            publish_latency_ms: 50,
            jitter_ms: 25,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Simulated commit latency in milliseconds.
    pub write_latency_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            write_latency_ms: 20,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

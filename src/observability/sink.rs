//! Failure sink for detached work.
//!
//! # Responsibilities
//! - Accept a background failure plus free-form contextual tags
//! - Log it, count it, and keep a bounded window of recent failures
//!
//! # Design Decisions
//! - Recording never blocks on I/O and never fails: a poisoned lock is
//!   recovered, a full window evicts the oldest record
//! - The trait is the seam; `FailureLog` is the implementation the server uses

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::background::BackgroundError;
use crate::observability::metrics;

/// Contextual tags attached to a failure, e.g. `("request_id", "…")`.
pub type Tags = [(&'static str, String)];

/// Destination for failures that have no caller left to receive them.
pub trait FailureSink: Send + Sync + 'static {
    fn record(&self, failure: &BackgroundError, tags: &Tags);
}

/// One recorded failure.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    /// Seconds since epoch.
    pub at: u64,
    pub error: String,
    pub tags: BTreeMap<String, String>,
}

impl FailureRecord {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Logs failures and keeps the most recent `capacity` of them.
#[derive(Debug)]
pub struct FailureLog {
    capacity: usize,
    records: Mutex<VecDeque<FailureRecord>>,
    total: AtomicU64,
}

impl FailureLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
            total: AtomicU64::new(0),
        }
    }

    /// Recent failures, oldest first.
    pub fn recent(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Failures recorded since startup, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl FailureSink for FailureLog {
    fn record(&self, failure: &BackgroundError, tags: &Tags) {
        tracing::error!(error = %failure, tags = ?tags, "Background task failed.");

        let tags: BTreeMap<String, String> = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        metrics::record_background_failure(
            tags.get("job").cloned().unwrap_or_else(|| "unknown".to_string()),
        );

        let record = FailureRecord {
            at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            error: failure.to_string(),
            tags,
        };

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        self.total.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn keeps_bounded_window() {
        let log = FailureLog::new(2);
        for i in 0..3 {
            log.record(
                &BackgroundError::Storage(StorageError::Unavailable(format!("attempt {i}"))),
                &[("request_id", format!("req-{i}"))],
            );
        }

        let recent = log.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tag("request_id"), Some("req-1"));
        assert_eq!(recent[1].tag("request_id"), Some("req-2"));
        assert_eq!(log.total(), 3);
    }
}

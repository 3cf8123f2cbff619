//! Persisted records.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A stored pokemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    /// Assigned by the store on save; zero until then.
    pub id: u64,
    pub name: String,
    /// Request that caused this record to be written, if any.
    pub origin_request_id: Option<String>,
    /// Creation time (seconds since epoch).
    pub created_at: u64,
}

impl Pokemon {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            origin_request_id: None,
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    pub fn with_origin(mut self, request_id: impl Into<String>) -> Self {
        self.origin_request_id = Some(request_id.into());
        self
    }
}

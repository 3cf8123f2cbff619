//! Shared in-memory pokemon table.
//!
//! # Responsibilities
//! - Persist committed batches all-or-nothing
//! - Enforce the unique-name constraint
//! - Simulate write latency and connectivity loss

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::storage::model::Pokemon;
use crate::storage::{StorageError, StorageResult};

/// Process-wide table of pokemon, keyed by name.
#[derive(Debug)]
pub struct PokemonStore {
    rows: DashMap<String, Pokemon>,
    next_id: AtomicU64,
    write_latency: Duration,
    available: AtomicBool,
    /// One-shot fault returned by the next commit.
    injected: Mutex<Option<StorageError>>,
    /// Serializes the check-then-insert step of commits.
    commit_lock: Mutex<()>,
}

impl PokemonStore {
    pub fn new(write_latency: Duration) -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicU64::new(1),
            write_latency,
            available: AtomicBool::new(true),
            injected: Mutex::new(None),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(Duration::from_millis(config.write_latency_ms))
    }

    /// Simulate connectivity loss (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::info!(available, "Storage availability changed");
    }

    /// Make the next commit fail with `error`.
    pub fn fail_next(&self, error: StorageError) {
        *self.injected.lock().expect("storage fault mutex poisoned") = Some(error);
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, name: &str) -> Option<Pokemon> {
        self.rows.get(name).map(|r| r.value().clone())
    }

    /// Persist `batch`, returning the assigned ids in order.
    pub async fn commit(&self, batch: Vec<Pokemon>) -> StorageResult<Vec<u64>> {
        if !self.write_latency.is_zero() {
            tokio::time::sleep(self.write_latency).await;
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("connection refused".to_string()));
        }
        if let Some(error) = self
            .injected
            .lock()
            .expect("storage fault mutex poisoned")
            .take()
        {
            return Err(error);
        }

        let _guard = self.commit_lock.lock().expect("storage commit mutex poisoned");

        {
            let mut seen = HashSet::new();
            for pokemon in &batch {
                if self.rows.contains_key(&pokemon.name) || !seen.insert(pokemon.name.as_str()) {
                    return Err(StorageError::Conflict(pokemon.name.clone()));
                }
            }
        }

        let mut ids = Vec::with_capacity(batch.len());
        for mut pokemon in batch {
            pokemon.id = self.next_id.fetch_add(1, Ordering::Relaxed);
            ids.push(pokemon.id);
            self.rows.insert(pokemon.name.clone(), pokemon);
        }
        Ok(ids)
    }
}

impl Default for PokemonStore {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_assigns_ids() {
        let store = PokemonStore::default();
        let ids = store
            .commit(vec![Pokemon::new("pikachu"), Pokemon::new("eevee")])
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.count(), 2);
        assert_eq!(store.get("eevee").unwrap().id, 2);
    }

    #[tokio::test]
    async fn duplicate_name_conflicts_without_partial_write() {
        let store = PokemonStore::default();
        store.commit(vec![Pokemon::new("mew")]).await.unwrap();

        let err = store
            .commit(vec![Pokemon::new("onix"), Pokemon::new("mew")])
            .await
            .unwrap_err();
        assert_eq!(err, StorageError::Conflict("mew".into()));
        assert!(store.get("onix").is_none());
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn unavailable_and_injected_faults() {
        let store = PokemonStore::default();
        store.set_available(false);
        assert!(matches!(
            store.commit(vec![Pokemon::new("a")]).await,
            Err(StorageError::Unavailable(_))
        ));
        store.set_available(true);

        store.fail_next(StorageError::Unavailable("reset by peer".into()));
        assert!(store.commit(vec![Pokemon::new("a")]).await.is_err());
        // One-shot.
        assert!(store.commit(vec![Pokemon::new("a")]).await.is_ok());
    }
}

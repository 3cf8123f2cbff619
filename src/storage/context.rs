//! Scope-bound unit of work.
//!
//! A `StorageContext` tracks pending additions and persists them with
//! `save_changes`. It belongs to exactly one resource scope; once that scope
//! is released every operation fails with [`StorageError::Disposed`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::storage::model::Pokemon;
use crate::storage::store::PokemonStore;
use crate::storage::{StorageError, StorageResult};

#[derive(Debug)]
struct ContextInner {
    store: Arc<PokemonStore>,
    pending: Mutex<Vec<Pokemon>>,
    disposed: AtomicBool,
}

/// Handle to a unit of work. Clones share the same pending set.
#[derive(Debug, Clone)]
pub struct StorageContext {
    inner: Arc<ContextInner>,
}

impl StorageContext {
    pub fn new(store: Arc<PokemonStore>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                store,
                pending: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    fn ensure_live(&self) -> StorageResult<()> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return Err(StorageError::Disposed);
        }
        Ok(())
    }

    /// Track `pokemon` for insertion on the next save.
    pub fn add(&self, pokemon: Pokemon) -> StorageResult<()> {
        self.ensure_live()?;
        self.inner
            .pending
            .lock()
            .expect("storage context mutex poisoned")
            .push(pokemon);
        Ok(())
    }

    /// Number of tracked, unsaved additions.
    pub fn pending(&self) -> usize {
        self.inner
            .pending
            .lock()
            .expect("storage context mutex poisoned")
            .len()
    }

    /// Persist pending additions. Returns how many rows were written.
    ///
    /// On failure the additions stay pending.
    pub async fn save_changes(&self) -> StorageResult<usize> {
        self.ensure_live()?;
        let batch = std::mem::take(
            &mut *self
                .inner
                .pending
                .lock()
                .expect("storage context mutex poisoned"),
        );
        if batch.is_empty() {
            return Ok(0);
        }

        match self.inner.store.commit(batch.clone()).await {
            Ok(ids) => {
                tracing::debug!(rows = ids.len(), "Changes saved");
                Ok(ids.len())
            }
            Err(e) => {
                let mut pending = self
                    .inner
                    .pending
                    .lock()
                    .expect("storage context mutex poisoned");
                let newer = std::mem::replace(&mut *pending, batch);
                pending.extend(newer);
                Err(e)
            }
        }
    }

    /// Release the context. Idempotent; returns `true` on the first call.
    pub fn dispose(&self) -> bool {
        let first = !self.inner.disposed.swap(true, Ordering::SeqCst);
        if first {
            self.inner
                .pending
                .lock()
                .expect("storage context mutex poisoned")
                .clear();
        }
        first
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

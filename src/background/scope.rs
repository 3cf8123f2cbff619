//! Independently owned resource scopes.
//!
//! # Responsibilities
//! - Create a fresh storage context and logging span per scope
//! - Release a scope exactly once, disposing its storage context
//! - Count created and released scopes
//!
//! # Design Decisions
//! - `ScopeFactory` is the only process-wide piece; it is cheap to clone
//!   and safe to hand to detached tasks
//! - `ResourceScope` is a handle; `ScopeGuard` owns the release

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Span;

use crate::storage::{PokemonStore, StorageContext};

#[derive(Debug, Default)]
struct ScopeStats {
    next_id: AtomicU64,
    created: AtomicU64,
    released: AtomicU64,
}

/// Point-in-time scope counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScopeSnapshot {
    pub created: u64,
    pub released: u64,
    pub live: u64,
}

/// Creates resource scopes over the shared store.
#[derive(Debug, Clone)]
pub struct ScopeFactory {
    store: Arc<PokemonStore>,
    stats: Arc<ScopeStats>,
}

impl ScopeFactory {
    pub fn new(store: Arc<PokemonStore>) -> Self {
        Self {
            store,
            stats: Arc::new(ScopeStats::default()),
        }
    }

    pub fn store(&self) -> &Arc<PokemonStore> {
        &self.store
    }

    /// Create a scope owned by the caller. It is released when the returned
    /// guard drops.
    pub fn create_scope(&self, kind: &'static str, request_id: &str) -> ScopeGuard {
        let id = self.stats.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.created.fetch_add(1, Ordering::SeqCst);

        let span = tracing::info_span!("resource_scope", kind, request_id = %request_id, scope = id);
        span.in_scope(|| tracing::trace!("Scope created"));

        ScopeGuard {
            scope: ResourceScope {
                inner: Arc::new(ScopeInner {
                    id,
                    storage: StorageContext::new(Arc::clone(&self.store)),
                    span,
                    released: AtomicBool::new(false),
                    stats: Arc::clone(&self.stats),
                }),
            },
        }
    }

    pub fn snapshot(&self) -> ScopeSnapshot {
        let created = self.stats.created.load(Ordering::SeqCst);
        let released = self.stats.released.load(Ordering::SeqCst);
        ScopeSnapshot {
            created,
            released,
            live: created.saturating_sub(released),
        }
    }
}

#[derive(Debug)]
struct ScopeInner {
    id: u64,
    storage: StorageContext,
    span: Span,
    released: AtomicBool,
    stats: Arc<ScopeStats>,
}

/// Services bound to one scope.
#[derive(Debug, Clone)]
pub struct ResourceScope {
    inner: Arc<ScopeInner>,
}

impl ResourceScope {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The scope's unit of work.
    pub fn storage(&self) -> StorageContext {
        self.inner.storage.clone()
    }

    /// The scope's logging span.
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    fn release(&self) -> bool {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.storage.dispose();
        self.inner.stats.released.fetch_add(1, Ordering::SeqCst);
        self.inner.span.in_scope(|| tracing::trace!("Scope released"));
        true
    }
}

/// Owns a scope's release.
#[derive(Debug)]
pub struct ScopeGuard {
    scope: ResourceScope,
}

impl ScopeGuard {
    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.scope.release();
    }
}

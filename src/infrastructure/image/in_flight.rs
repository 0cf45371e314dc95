//! Per-key registry of fetches in progress, with tier invalidation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::domain::entities::{CacheKey, LoadedImage};
use crate::domain::errors::{CacheError, CacheResult};

/// Handle on a running fetch; every clone resolves to the same result.
pub type SharedLoad = Shared<BoxFuture<'static, CacheResult<LoadedImage>>>;

struct Entry {
    id: u64,
    load: SharedLoad,
}

/// At most one load per key. Late callers attach to the running one.
///
/// Loads run in their own task, so a caller dropping its handle does not stop
/// the load for anyone else. The entry is removed once the load finishes.
///
/// The registry also tracks a generation for its tier. [`InFlight::invalidate`]
/// bumps it and forgets every running load; loads started before that must not
/// write into the tier, which they check through their [`Epoch`].
#[derive(Default)]
pub struct InFlight {
    loads: Mutex<HashMap<CacheKey, Entry>>,
    next_id: AtomicU64,
    // Changed only while `gate` is held for writing.
    generation: AtomicU64,
    gate: RwLock<()>,
}

/// The tier generation a load was started in.
#[derive(Clone)]
pub struct Epoch {
    registry: Arc<InFlight>,
    generation: u64,
}

impl Epoch {
    /// Returns a guard if the tier has not been invalidated since the load
    /// started. Writes into the tier must happen while the guard is alive.
    pub async fn admit(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let guard = self.registry.gate.read().await;
        (self.registry.generation.load(Ordering::Acquire) == self.generation).then_some(guard)
    }

    /// Returns true if the tier has not been invalidated since the load started.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.registry.generation.load(Ordering::Acquire) == self.generation
    }
}

impl InFlight {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the load running for `key`, or spawns the one built by `start`.
    ///
    /// `start` receives the epoch the load belongs to. The flag is true when
    /// this call started the load.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn join_or_start<F, Fut>(self: &Arc<Self>, key: &CacheKey, start: F) -> (SharedLoad, bool)
    where
        F: FnOnce(Epoch) -> Fut,
        Fut: Future<Output = CacheResult<LoadedImage>> + Send + 'static,
    {
        let mut loads = self.loads.lock();
        if let Some(existing) = loads.get(key) {
            return (existing.load.clone(), false);
        }

        let epoch = Epoch {
            registry: Arc::clone(self),
            generation: self.generation.load(Ordering::Acquire),
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(self);
        let owned_key = key.clone();
        let load = start(epoch);
        // The lock is held until the entry is inserted, so the removal below
        // cannot run first.
        let handle = tokio::spawn(async move {
            let result = load.await;
            let mut loads = registry.loads.lock();
            if loads.get(&owned_key).is_some_and(|entry| entry.id == id) {
                loads.remove(&owned_key);
            }
            result
        });

        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(CacheError::from(e)),
            }
        }
        .boxed()
        .shared();
        loads.insert(
            key.clone(),
            Entry {
                id,
                load: shared.clone(),
            },
        );
        (shared, true)
    }

    /// Starts a new generation and runs `clear` before any load can write again.
    ///
    /// Running loads are forgotten: their callers still get a result, but later
    /// callers start a fresh load.
    pub async fn invalidate<F, T>(&self, clear: F) -> T
    where
        F: Future<Output = T>,
    {
        let _gate = self.gate.write().await;
        let dropped = {
            let mut loads = self.loads.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
            let dropped = loads.len();
            loads.clear();
            dropped
        };
        if dropped > 0 {
            debug!(dropped, "Detached in-flight loads from cleared tier");
        }
        clear.await
    }

    /// Returns true if a load for `key` is running.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.loads.lock().contains_key(key)
    }

    /// Number of loads running.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loads.lock().len()
    }

    /// Returns true if nothing is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! The cross-stage item map.
//!
//! Pipeline stages that need to hand values to one another — an auth
//! middleware stashing a user record for the handler, a handler leaving a
//! note for a close callback — share one [`ItemMap`] per context. The map
//! does not exist until somebody asks for it, and first access may race:
//! a stage running while a WebSocket handshake is suspended can touch it
//! concurrently with the handler. The gate below guarantees that exactly
//! one map is ever built and that every racer gets the same instance.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

// ── ItemMap ──────────────────────────────────────────────────────────────────

/// A shared, type-erased key/value store scoped to one request.
///
/// Values are stored as `Box<dyn Any>`; [`get`](ItemMap::get) hands back a
/// clone of the stored value, so anything you put in that needs to come out
/// again should be `Clone` (or wrapped in an `Arc`).
#[derive(Default)]
pub struct ItemMap {
    entries: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl ItemMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.entries.write().insert(key.into(), Box::new(value));
    }

    /// Returns a clone of the value under `key`, if present and of type `T`.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.entries
            .read()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Removes the entry under `key`. Returns whether one existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

// ── Lazy gate ────────────────────────────────────────────────────────────────

/// Exactly-once, on-demand construction of the shared [`ItemMap`].
///
/// A plain mutex-gated slot rather than a lazy-init primitive: the winner of
/// a racing first access publishes its map under the lock, and every later
/// caller clones the same `Arc`.
pub(crate) struct LazyItems {
    slot: Mutex<Option<Arc<ItemMap>>>,
}

impl LazyItems {
    pub(crate) fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// Returns the shared map, creating it on first call.
    pub(crate) fn get_or_create(&self) -> Arc<ItemMap> {
        let mut slot = self.slot.lock();
        match &*slot {
            Some(map) => Arc::clone(map),
            None => {
                let map = Arc::new(ItemMap::new());
                *slot = Some(Arc::clone(&map));
                map
            }
        }
    }

    /// Whether the map has been materialized, without materializing it.
    pub(crate) fn initialized(&self) -> bool {
        self.slot.lock().is_some()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

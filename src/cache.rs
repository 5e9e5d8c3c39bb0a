//! Per-scope instance cache
//!
//! A [`ScopeCache`] holds the instances created for one scope instance (one
//! container's singletons, one session, one call, ...). Each binding key gets
//! its own `OnceCell` slot, so creation is serialized per key while different
//! keys never contend beyond a brief map-shard lock.
//!
//! A scope instance can be shared by several containers. Scoped bindings
//! therefore cache under their own [`BindingId`] next to the key, so a child
//! override and the parent binding it shadows never see each other's
//! instances.

use crate::binding::BindingId;
use crate::error::{DiError, Result};
use crate::key::BindingKey;
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Type-erased resolved instance.
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// One creation slot.
///
/// `creator` holds the token of the thread running the factory, or 0.
#[derive(Default)]
struct Slot {
    cell: OnceCell<AnyInstance>,
    creator: AtomicU64,
}

/// Slots for one key, one per binding caching under it. `None` is the slot
/// used by [`ScopeCache::get_or_create`] and by container singletons.
type Slots = Vec<(Option<BindingId>, Arc<Slot>)>;

/// Small process-unique token for the current thread (never 0).
pub(crate) fn thread_token() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static TOKEN: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    TOKEN.with(|token| *token)
}

/// Clears a creator token when the factory returns or unwinds.
pub(crate) struct Creating<'a>(pub(crate) &'a AtomicU64);

impl Drop for Creating<'_> {
    fn drop(&mut self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Instances cached for one scope instance, keyed by binding.
///
/// For a fixed key the factory passed to [`get_or_create`](Self::get_or_create)
/// runs at most once until the entry is invalidated. Concurrent callers for the
/// same key block until the first one finishes; a failed or panicking factory
/// leaves the slot empty so the next caller retries. A factory that asks the
/// same cache for its own key again, on the same thread, gets
/// [`DiError::DependencyLoop`] instead of waiting on itself.
///
/// # Examples
///
/// ```rust
/// use bindery::{AnyInstance, BindingKey, ScopeCache};
/// use std::sync::Arc;
///
/// let cache = ScopeCache::new();
/// let key = BindingKey::of::<u32>();
///
/// let first = cache.get_or_create(&key, || Ok(Arc::new(7u32) as AnyInstance)).unwrap();
/// let second = cache.get_or_create(&key, || Ok(Arc::new(8u32) as AnyInstance)).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
///
/// cache.invalidate(&key);
/// assert!(cache.get(&key).is_none());
/// ```
pub struct ScopeCache {
    slots: DashMap<BindingKey, Slots, RandomState>,
}

impl ScopeCache {
    /// Create an empty cache.
    ///
    /// Uses 8 shards: scope caches are created often (one per session or call)
    /// and typically hold a handful of entries.
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    /// Return the cached instance for `key`, running `create` if there is none.
    ///
    /// `create` runs without any map lock held, so it may itself resolve other
    /// keys cached here.
    pub fn get_or_create<F>(&self, key: &BindingKey, create: F) -> Result<AnyInstance>
    where
        F: FnOnce() -> Result<AnyInstance>,
    {
        self.get_or_create_for(key, None, create, || DiError::DependencyLoop {
            path: vec![key.clone(), key.clone()],
        })
    }

    /// [`get_or_create`](Self::get_or_create) in the slot of `binding`.
    ///
    /// `reentered` builds the error returned when the current thread is
    /// already running the factory for this slot.
    pub(crate) fn get_or_create_for<F, L>(
        &self,
        key: &BindingKey,
        binding: Option<BindingId>,
        create: F,
        reentered: L,
    ) -> Result<AnyInstance>
    where
        F: FnOnce() -> Result<AnyInstance>,
        L: FnOnce() -> DiError,
    {
        let slot = self.slot(key, binding);

        if let Some(instance) = slot.cell.get() {
            #[cfg(feature = "logging")]
            trace!(target: "bindery", key = %key, "Scope cache hit");

            return Ok(Arc::clone(instance));
        }

        let token = thread_token();
        if slot.creator.load(Ordering::Acquire) == token {
            let err = reentered();

            #[cfg(feature = "logging")]
            debug!(target: "bindery", key = %key, error = %err, "Re-entrant creation");

            return Err(err);
        }

        let instance = slot.cell.get_or_try_init(|| {
            #[cfg(feature = "logging")]
            debug!(target: "bindery", key = %key, "Creating cached instance");

            slot.creator.store(token, Ordering::Release);
            let _creating = Creating(&slot.creator);
            create()
        })?;

        Ok(Arc::clone(instance))
    }

    /// The cached instance for `key`, if one has been created.
    ///
    /// When several bindings sharing this cache have created an instance for
    /// `key`, the earliest slot wins.
    #[inline]
    pub fn get(&self, key: &BindingKey) -> Option<AnyInstance> {
        self.slots.get(key).and_then(|slots| {
            slots
                .iter()
                .find_map(|(_, slot)| slot.cell.get().map(Arc::clone))
        })
    }

    /// Whether an instance for `key` has been created.
    #[inline]
    pub fn contains(&self, key: &BindingKey) -> bool {
        self.get(key).is_some()
    }

    /// Drop the entries for `key`. The next `get_or_create` rebuilds it.
    ///
    /// Returns whether an instance had been created.
    pub fn invalidate(&self, key: &BindingKey) -> bool {
        let removed = self.slots.remove(key).is_some_and(|(_, slots)| {
            slots.iter().any(|(_, slot)| slot.cell.get().is_some())
        });

        #[cfg(feature = "logging")]
        debug!(target: "bindery", key = %key, removed, "Scope cache entry invalidated");

        removed
    }

    /// Drop every entry.
    pub fn clear(&self) {
        #[cfg(feature = "logging")]
        debug!(target: "bindery", entries = self.len(), "Scope cache cleared");

        self.slots.clear();
    }

    /// Number of created instances.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .map(|slots| {
                slots
                    .value()
                    .iter()
                    .filter(|(_, slot)| slot.cell.get().is_some())
                    .count()
            })
            .sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch or insert the slot of `binding` for `key`; the shard lock ends
    /// with this call.
    fn slot(&self, key: &BindingKey, binding: Option<BindingId>) -> Arc<Slot> {
        if let Some(slot) = self.slots.get(key).and_then(|slots| find_slot(&slots, binding)) {
            return slot;
        }

        let mut slots = self.slots.entry(key.clone()).or_default();
        if let Some(slot) = find_slot(&slots, binding) {
            return slot;
        }
        let slot = Arc::new(Slot::default());
        slots.push((binding, Arc::clone(&slot)));
        slot
    }
}

fn find_slot(slots: &Slots, binding: Option<BindingId>) -> Option<Arc<Slot>> {
    slots
        .iter()
        .find(|(owner, _)| *owner == binding)
        .map(|(_, slot)| Arc::clone(slot))
}

impl Default for ScopeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeCache")
            .field("entries", &self.len())
            .finish()
    }
}

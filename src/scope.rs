//! Scope collaborators
//!
//! A scope decides which [`ScopeCache`] a scoped binding reads and writes.
//! The host supplies the context value (a session, a request, ...) through
//! [`Container::on`](crate::Container::on); the scope maps that context to a
//! key and the key to a cache. The engine never creates or destroys scope
//! instances itself.

use crate::cache::ScopeCache;
use crate::key::{BindingKey, TypeDescriptor};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::Any;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::debug;

/// Type-erased context value carried by a resolution.
pub type ScopeContext = Arc<dyn Any + Send + Sync>;

/// Maps a resolution context to the cache of its scope instance.
///
/// # Examples
///
/// ```rust
/// use bindery::{Scope, ScopeCache};
/// use std::sync::Arc;
///
/// struct Tenant { name: String }
///
/// /// Every resolution shares one cache, whatever the tenant.
/// struct Global(Arc<ScopeCache>);
///
/// impl Scope for Global {
///     type Context = Tenant;
///     type Key = ();
///
///     fn scope_key(&self, _tenant: &Tenant) {}
///
///     fn cache(&self, _key: &()) -> Arc<ScopeCache> {
///         Arc::clone(&self.0)
///     }
/// }
/// ```
pub trait Scope: Send + Sync + 'static {
    /// Context value a resolution must carry to use this scope.
    type Context: Send + Sync + 'static;

    /// Identity of one scope instance.
    type Key;

    /// Which scope instance `context` belongs to.
    fn scope_key(&self, context: &Self::Context) -> Self::Key;

    /// The cache of the scope instance identified by `key`.
    fn cache(&self, key: &Self::Key) -> Arc<ScopeCache>;
}

/// Object-safe view of a [`Scope`], as stored in scoped bindings.
pub(crate) trait ErasedScope: Send + Sync {
    fn cache_for(&self, context: &ScopeContext) -> Option<Arc<ScopeCache>>;

    fn context_type(&self) -> TypeDescriptor;
}

impl<S: Scope> ErasedScope for S {
    fn cache_for(&self, context: &ScopeContext) -> Option<Arc<ScopeCache>> {
        let context = context.downcast_ref::<S::Context>()?;
        Some(self.cache(&self.scope_key(context)))
    }

    fn context_type(&self) -> TypeDescriptor {
        TypeDescriptor::of::<S::Context>()
    }
}

/// Process-unique scope identifier.
///
/// Handy as the context of short-lived scopes such as "one call": create a
/// fresh id per call and resolve with `container.on(id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Generate a new unique scope ID.
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

type KeyFn<C, K> = Box<dyn Fn(&C) -> K + Send + Sync>;

/// Scope whose instances are identified by a key extracted from the context.
///
/// Scope instances open lazily the first time a key is seen and live until
/// the host [`close`](Self::close)s them.
///
/// # Examples
///
/// ```rust
/// use bindery::prelude::*;
/// use bindery::KeyedScope;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// struct Session { id: u32 }
/// struct Cart { serial: u32 }
///
/// static SERIAL: AtomicU32 = AtomicU32::new(0);
///
/// let sessions = Arc::new(KeyedScope::new(|session: &Session| session.id));
///
/// let container = Container::builder()
///     .bind::<Cart>()
///     .scoped(Arc::clone(&sessions), |_| {
///         Ok(Cart { serial: SERIAL.fetch_add(1, Ordering::SeqCst) })
///     })?
///     .build();
///
/// let a = container.on(Session { id: 1 }).get::<Cart>()?;
/// let again = container.on(Session { id: 1 }).get::<Cart>()?;
/// let b = container.on(Session { id: 2 }).get::<Cart>()?;
///
/// assert!(Arc::ptr_eq(&a, &again));
/// assert_ne!(a.serial, b.serial);
///
/// // Ending the session drops its instances
/// sessions.close(&1);
/// let fresh = container.on(Session { id: 1 }).get::<Cart>()?;
/// assert!(!Arc::ptr_eq(&a, &fresh));
/// # Ok::<(), bindery::DiError>(())
/// ```
pub struct KeyedScope<C, K> {
    key_of: KeyFn<C, K>,
    caches: DashMap<K, Arc<ScopeCache>, RandomState>,
}

impl<C, K> KeyedScope<C, K>
where
    C: Send + Sync + 'static,
    K: Hash + Eq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    /// Create a scope keyed by `key_of(context)`.
    pub fn new<F>(key_of: F) -> Self
    where
        F: Fn(&C) -> K + Send + Sync + 'static,
    {
        Self {
            key_of: Box::new(key_of),
            caches: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// The cache of an already open scope instance.
    #[inline]
    pub fn cache_if_open(&self, key: &K) -> Option<Arc<ScopeCache>> {
        self.caches.get(key).map(|cache| Arc::clone(cache.value()))
    }

    /// Drop the instance cached for `binding` in scope instance `key`.
    ///
    /// Returns whether there was one.
    pub fn invalidate(&self, key: &K, binding: &BindingKey) -> bool {
        self.cache_if_open(key)
            .is_some_and(|cache| cache.invalidate(binding))
    }

    /// Drop every instance cached in scope instance `key`, keeping it open.
    pub fn clear(&self, key: &K) {
        if let Some(cache) = self.cache_if_open(key) {
            cache.clear();
        }
    }

    /// End scope instance `key`, dropping its cache.
    ///
    /// The next resolution with a context mapping to `key` opens a new one.
    pub fn close(&self, key: &K) -> bool {
        let closed = self.caches.remove(key).is_some();

        #[cfg(feature = "logging")]
        debug!(target: "bindery", scope_key = ?key, closed, "Scope instance closed");

        closed
    }

    /// End the scope instance `context` belongs to.
    pub fn close_context(&self, context: &C) -> bool {
        self.close(&(self.key_of)(context))
    }

    /// Number of open scope instances.
    #[inline]
    pub fn open_scopes(&self) -> usize {
        self.caches.len()
    }
}

impl KeyedScope<ScopeId, ScopeId> {
    /// Scope with one instance per [`ScopeId`] context.
    pub fn per_id() -> Self {
        Self::new(|id: &ScopeId| *id)
    }
}

impl<C, K> Scope for KeyedScope<C, K>
where
    C: Send + Sync + 'static,
    K: Hash + Eq + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    type Context = C;
    type Key = K;

    #[inline]
    fn scope_key(&self, context: &C) -> K {
        (self.key_of)(context)
    }

    fn cache(&self, key: &K) -> Arc<ScopeCache> {
        if let Some(cache) = self.cache_if_open(key) {
            return cache;
        }

        let cache = self.caches.entry(key.clone()).or_insert_with(|| {
            #[cfg(feature = "logging")]
            debug!(target: "bindery", scope_key = ?key, "Opening scope instance");

            Arc::new(ScopeCache::new())
        });
        Arc::clone(cache.value())
    }
}

impl<C, K: Hash + Eq> std::fmt::Debug for KeyedScope<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedScope")
            .field("context", &std::any::type_name::<C>())
            .field("open_scopes", &self.caches.len())
            .finish()
    }
}

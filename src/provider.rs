//! Injectable types and deferred resolution handles
//!
//! [`Provider`], [`Factory`] and [`LazyInstance`] are detached handles: they
//! keep a reference to their container and start a new top-level resolution
//! every time they are used.

use crate::cache::{Creating, thread_token};
use crate::container::Container;
use crate::error::{DiError, Result};
use crate::key::BindingKey;
use crate::resolver::{Resolver, downcast};
use crate::scope::ScopeContext;
use once_cell::sync::OnceCell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Marker trait for types that can be bound and resolved.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// Types that know how to build themselves from resolved dependencies.
///
/// `T::inject` has the shape of a factory, so it can be bound directly:
///
/// ```rust
/// use bindery::prelude::*;
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Database { config: Arc<Config> }
///
/// impl Inject for Database {
///     fn inject(resolver: &Resolver<'_>) -> bindery::Result<Self> {
///         Ok(Database { config: resolver.get()? })
///     }
/// }
///
/// let container = Container::builder()
///     .bind::<Config>().instance(Config { url: "postgres://localhost".into() })?
///     .bind::<Database>().singleton(Database::inject)?
///     .build();
///
/// assert_eq!(container.get::<Database>()?.config.url, "postgres://localhost");
/// # Ok::<(), bindery::DiError>(())
/// ```
///
/// With the `derive` feature, `#[derive(Inject)]` generates the impl.
pub trait Inject: Injectable + Sized {
    /// Build an instance, resolving dependencies through `resolver`.
    fn inject(resolver: &Resolver<'_>) -> Result<Self>;
}

/// Zero-argument handle producing instances of `T` on demand.
///
/// Obtained from [`Container::provider`]; each [`get`](Self::get) is a full
/// resolution, so the binding's lifecycle decides whether instances repeat.
pub struct Provider<T> {
    container: Container,
    key: BindingKey,
    scope: Option<ScopeContext>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> Provider<T> {
    pub(crate) fn new(container: Container, key: BindingKey, scope: Option<ScopeContext>) -> Self {
        Self {
            container,
            key,
            scope,
            _marker: PhantomData,
        }
    }

    /// Resolve an instance.
    pub fn get(&self) -> Result<Arc<T>> {
        let instance = self
            .container
            .resolve_detached(self.key.clone(), None, self.scope.as_ref())?;
        downcast(&self.key, instance)
    }

    #[inline]
    pub fn key(&self) -> &BindingKey {
        &self.key
    }
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            key: self.key.clone(),
            scope: self.scope.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").field("key", &self.key).finish()
    }
}

/// Handle producing instances of `T` from an argument of type `A`.
///
/// Obtained from [`Container::factory`].
pub struct Factory<A, T> {
    container: Container,
    key: BindingKey,
    scope: Option<ScopeContext>,
    _marker: PhantomData<fn(A) -> T>,
}

impl<A: Send + 'static, T: Injectable> Factory<A, T> {
    pub(crate) fn new(container: Container, key: BindingKey, scope: Option<ScopeContext>) -> Self {
        Self {
            container,
            key,
            scope,
            _marker: PhantomData,
        }
    }

    /// Resolve an instance built from `argument`.
    pub fn create(&self, argument: A) -> Result<Arc<T>> {
        let instance = self.container.resolve_detached(
            self.key.clone(),
            Some(Box::new(argument)),
            self.scope.as_ref(),
        )?;
        downcast(&self.key, instance)
    }

    #[inline]
    pub fn key(&self) -> &BindingKey {
        &self.key
    }
}

impl<A, T> Clone for Factory<A, T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            key: self.key.clone(),
            scope: self.scope.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, T> std::fmt::Debug for Factory<A, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory").field("key", &self.key).finish()
    }
}

/// Resolve-on-first-use handle.
///
/// Nothing is looked up until the first [`get`](Self::get); the result is
/// then kept locally, so later calls return the same `Arc` whatever the
/// binding's lifecycle. A failed resolution is not kept and the next call
/// retries.
///
/// A binding that reaches the same handle again while it is being resolved,
/// on the same thread, fails with [`DiError::DependencyLoop`].
pub struct LazyInstance<T> {
    provider: Provider<T>,
    value: OnceCell<Arc<T>>,
    resolver_thread: AtomicU64,
}

impl<T: Injectable> LazyInstance<T> {
    pub(crate) fn new(provider: Provider<T>) -> Self {
        Self {
            provider,
            value: OnceCell::new(),
            resolver_thread: AtomicU64::new(0),
        }
    }

    /// The instance, resolving it on first access.
    pub fn get(&self) -> Result<Arc<T>> {
        if let Some(value) = self.value.get() {
            return Ok(Arc::clone(value));
        }

        let token = thread_token();
        if self.resolver_thread.load(Ordering::Acquire) == token {
            let key = self.provider.key.clone();
            return Err(DiError::DependencyLoop {
                path: vec![key.clone(), key],
            });
        }

        self.value
            .get_or_try_init(|| {
                self.resolver_thread.store(token, Ordering::Release);
                let _resolving = Creating(&self.resolver_thread);
                self.provider.get()
            })
            .map(Arc::clone)
    }

    /// Whether the instance has been resolved already.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T> std::fmt::Debug for LazyInstance<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyInstance")
            .field("key", &self.provider.key)
            .field("resolved", &self.value.get().is_some())
            .finish()
    }
}

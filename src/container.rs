//! Dependency injection container
//!
//! A [`Container`] is an immutable registry of bindings plus an optional
//! parent. Resolution looks in the container's own registry first and walks
//! up the parent chain on a miss, so a child's bindings shadow its ancestors'
//! without touching them.

use crate::binding::{AnyArgument, Binding, BindingKind};
use crate::builder::ContainerBuilder;
use crate::cache::{AnyInstance, ScopeCache};
use crate::context::ResolutionContext;
use crate::error::{DiError, NotFoundReason, Result};
use crate::key::{BindingKey, Tag};
use crate::provider::{Factory, Injectable, LazyInstance, Provider};
use crate::registry::BindingRegistry;
use crate::resolver::{Resolve, Resolver};
use crate::scope::ScopeContext;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Dependency injection container.
///
/// Cloning is cheap and yields a handle to the same container. Containers are
/// `Send + Sync`; concurrent resolutions only contend when they create the
/// same cached instance.
///
/// # Examples
///
/// ```rust
/// use bindery::prelude::*;
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Database { config: Arc<Config> }
///
/// let container = Container::builder()
///     .bind::<Config>().instance(Config { url: "postgres://localhost".into() })?
///     .bind::<Database>().singleton(|r| Ok(Database { config: r.get()? }))?
///     .build();
///
/// let db = container.get::<Database>()?;
/// assert_eq!(db.config.url, "postgres://localhost");
/// assert!(Arc::ptr_eq(&db, &container.get::<Database>()?));
/// # Ok::<(), bindery::DiError>(())
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: BindingRegistry,
    /// Back-reference only: a parent never knows its children
    parent: Option<Container>,
    /// Instances of this container's singleton bindings
    singletons: ScopeCache,
    allow_silent_override: bool,
    depth: u32,
}

impl Container {
    /// Start declaring a root container.
    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// A root container with no bindings.
    #[inline]
    pub fn empty() -> Self {
        ContainerBuilder::new().build()
    }

    pub(crate) fn from_parts(
        registry: BindingRegistry,
        parent: Option<Container>,
        allow_silent_override: bool,
    ) -> Self {
        let depth = parent.as_ref().map_or(0, |parent| parent.depth() + 1);

        #[cfg(feature = "logging")]
        debug!(
            target: "bindery",
            depth,
            bindings = registry.len(),
            allow_silent_override,
            "Creating DI container"
        );

        Self {
            inner: Arc::new(ContainerInner {
                registry,
                parent,
                singletons: ScopeCache::new(),
                allow_silent_override,
                depth,
            }),
        }
    }

    /// Start declaring a child container.
    ///
    /// The child resolves everything this container does; its own bindings
    /// shadow this container's for resolutions made through the child.
    /// Redeclaring an inherited key must be marked as an override unless
    /// the builder allows silent overrides.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bindery::prelude::*;
    ///
    /// let root = Container::builder()
    ///     .constant("author", String::from("romain boisselle"))?
    ///     .build();
    ///
    /// let upper = root
    ///     .child()
    ///     .allow_silent_override()
    ///     .constant("author", String::from("ROMAIN BOISSELLE"))?
    ///     .build();
    ///
    /// assert_eq!(*upper.get_tagged::<String>("author")?, "ROMAIN BOISSELLE");
    /// assert_eq!(*root.get_tagged::<String>("author")?, "romain boisselle");
    /// # Ok::<(), bindery::DiError>(())
    /// ```
    #[inline]
    pub fn child(&self) -> ContainerBuilder {
        ContainerBuilder::with_parent(self.clone())
    }

    /// Build a child container in one go.
    ///
    /// `overrides_allowed` lets declarations shadow inherited keys without
    /// being marked as overrides.
    pub fn create_child<F>(&self, overrides_allowed: bool, declare: F) -> Result<Container>
    where
        F: FnOnce(ContainerBuilder) -> Result<ContainerBuilder>,
    {
        let builder = self.child().silent_override(overrides_allowed);
        Ok(declare(builder)?.build())
    }

    /// View of this container whose resolutions carry `context`.
    ///
    /// Scoped bindings use the context to pick their scope instance.
    #[inline]
    pub fn on<C: Send + Sync + 'static>(&self, context: C) -> Contextual {
        self.on_shared(Arc::new(context))
    }

    /// Like [`on`](Self::on), for a context that is already shared.
    #[inline]
    pub fn on_shared<C: Send + Sync + 'static>(&self, context: Arc<C>) -> Contextual {
        Contextual {
            container: self.clone(),
            context,
        }
    }

    // =========================================================================
    // Deferred handles
    // =========================================================================

    /// Handle resolving the untagged `T` on demand.
    ///
    /// Fails right away if `T` is not bound as a zero-argument binding.
    #[inline]
    pub fn provider<T: Injectable>(&self) -> Result<Provider<T>> {
        self.provider_for(BindingKey::of::<T>(), None)
    }

    /// Handle resolving `T` under `tag` on demand.
    #[inline]
    pub fn provider_tagged<T: Injectable>(&self, tag: impl Into<Tag>) -> Result<Provider<T>> {
        self.provider_for(BindingKey::of::<T>().with_tag(tag), None)
    }

    /// Handle building `T` from an `A` on demand.
    ///
    /// Fails right away if no factory of `A` is bound for `T`.
    #[inline]
    pub fn factory<A: Send + 'static, T: Injectable>(&self) -> Result<Factory<A, T>> {
        self.factory_for(BindingKey::of::<T>().with_argument::<A>(), None)
    }

    /// Tagged form of [`factory`](Self::factory).
    #[inline]
    pub fn factory_tagged<A: Send + 'static, T: Injectable>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Factory<A, T>> {
        self.factory_for(BindingKey::of::<T>().with_tag(tag).with_argument::<A>(), None)
    }

    /// Handle resolving the untagged `T` on first use.
    #[inline]
    pub fn lazy<T: Injectable>(&self) -> LazyInstance<T> {
        LazyInstance::new(Provider::new(self.clone(), BindingKey::of::<T>(), None))
    }

    /// Handle resolving `T` under `tag` on first use.
    #[inline]
    pub fn lazy_tagged<T: Injectable>(&self, tag: impl Into<Tag>) -> LazyInstance<T> {
        LazyInstance::new(Provider::new(
            self.clone(),
            BindingKey::of::<T>().with_tag(tag),
            None,
        ))
    }

    fn provider_for<T: Injectable>(
        &self,
        key: BindingKey,
        scope: Option<ScopeContext>,
    ) -> Result<Provider<T>> {
        self.ensure_bound(&key)?;
        Ok(Provider::new(self.clone(), key, scope))
    }

    fn factory_for<A: Send + 'static, T: Injectable>(
        &self,
        key: BindingKey,
        scope: Option<ScopeContext>,
    ) -> Result<Factory<A, T>> {
        self.ensure_bound(&key)?;
        Ok(Factory::new(self.clone(), key, scope))
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Whether the untagged `T` is bound here or in an ancestor.
    #[inline]
    pub fn contains<T: Injectable>(&self) -> bool {
        self.contains_key(&BindingKey::of::<T>())
    }

    /// Whether `T` under `tag` is bound here or in an ancestor.
    #[inline]
    pub fn contains_tagged<T: Injectable>(&self, tag: impl Into<Tag>) -> bool {
        self.contains_key(&BindingKey::of::<T>().with_tag(tag))
    }

    /// Whether exactly `key` is bound here or in an ancestor.
    #[inline]
    pub fn contains_key(&self, key: &BindingKey) -> bool {
        self.find(key).is_some()
    }

    /// Keys declared in this container (not including parents), in
    /// declaration order.
    pub fn keys(&self) -> Vec<BindingKey> {
        self.inner
            .registry
            .iter()
            .map(|binding| binding.key().clone())
            .collect()
    }

    /// The binding `key` resolves to, if any.
    #[inline]
    pub fn binding(&self, key: &BindingKey) -> Option<&Binding> {
        self.find(key).map(|(_, binding)| binding)
    }

    /// Number of bindings declared in this container (not including parents).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.is_empty()
    }

    /// Distance to the root container (0 = root).
    #[inline]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    #[inline]
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// Whether this container was built allowing silent overrides.
    #[inline]
    pub fn allows_silent_override(&self) -> bool {
        self.inner.allow_silent_override
    }

    /// Cache of this container's singleton instances.
    ///
    /// Invalidating an entry makes the next resolution rebuild it.
    #[inline]
    pub fn singletons(&self) -> &ScopeCache {
        &self.inner.singletons
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Start a new top-level resolution of `key`.
    pub(crate) fn resolve_detached(
        &self,
        key: BindingKey,
        argument: Option<AnyArgument>,
        scope: Option<&ScopeContext>,
    ) -> Result<AnyInstance> {
        let context = ResolutionContext::new();
        self.resolve_in(key, argument, &context, scope)
    }

    /// Resolve `key` as part of the resolution tracked by `context`.
    ///
    /// The key stays on the context's stack until this returns, whatever
    /// the outcome. The binding's factory resolves its own dependencies
    /// against the container that owns the binding.
    pub(crate) fn resolve_in(
        &self,
        key: BindingKey,
        argument: Option<AnyArgument>,
        context: &ResolutionContext,
        scope: Option<&ScopeContext>,
    ) -> Result<AnyInstance> {
        let _frame = context.enter(&key)?;

        let Some((owner, binding)) = self.find(&key) else {
            let err = self.not_found(key);

            #[cfg(feature = "logging")]
            debug!(target: "bindery", depth = self.depth(), error = %err, "Resolution failed");

            return Err(err);
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "bindery",
            key = %key,
            lifecycle = %binding.lifecycle(),
            depth = self.depth(),
            owner_depth = owner.depth(),
            stack_depth = context.depth(),
            "Resolving binding"
        );

        let resolver = Resolver::new(owner, context, scope);

        match binding.kind() {
            BindingKind::Instance(instance) => Ok(Arc::clone(instance)),
            BindingKind::Provider(create) => create(&resolver, argument),
            BindingKind::Singleton(create) => owner.inner.singletons.get_or_create_for(
                &key,
                None,
                || create(&resolver, None),
                || reentered(&key, context),
            ),
            BindingKind::Scoped {
                id,
                scope: binding_scope,
                create,
            } => {
                let cache = scope
                    .and_then(|context| binding_scope.cache_for(context))
                    .ok_or_else(|| DiError::NotFound {
                        key: key.clone(),
                        reason: NotFoundReason::MissingContext {
                            expected: binding_scope.context_type(),
                        },
                    })?;
                cache.get_or_create_for(
                    &key,
                    Some(*id),
                    || create(&resolver, None),
                    || reentered(&key, context),
                )
            }
        }
    }

    /// This container followed by its ancestors, nearest first.
    fn ancestry(&self) -> impl Iterator<Item = &Container> {
        std::iter::successors(Some(self), |container| container.inner.parent.as_ref())
    }

    /// Nearest binding for exactly `key`, with the container that owns it.
    fn find(&self, key: &BindingKey) -> Option<(&Container, &Binding)> {
        self.ancestry().find_map(|container| {
            container
                .inner
                .registry
                .lookup(key)
                .map(|binding| (container, binding))
        })
    }

    /// Explain why nothing in the chain answers `key`.
    fn not_found(&self, key: BindingKey) -> DiError {
        let registered = self
            .ancestry()
            .find_map(|container| container.inner.registry.lookup_ignoring_argument(&key))
            .map(|binding| binding.key().clone());

        let reason = match registered {
            Some(registered) => NotFoundReason::KindMismatch { registered },
            None => NotFoundReason::NoBinding,
        };
        DiError::NotFound { key, reason }
    }

    fn ensure_bound(&self, key: &BindingKey) -> Result<()> {
        if self.contains_key(key) {
            Ok(())
        } else {
            Err(self.not_found(key.clone()))
        }
    }
}

/// Loop error for `key` requested again on the thread already creating it.
///
/// The request came through a fresh resolution (a handle or the container
/// itself), so `context` starts inside the outer creation of `key`.
fn reentered(key: &BindingKey, context: &ResolutionContext) -> DiError {
    DiError::DependencyLoop {
        path: std::iter::once(key.clone()).chain(context.stack()).collect(),
    }
}

impl Resolve for Container {
    #[inline]
    fn resolve_any(&self, key: BindingKey, argument: Option<AnyArgument>) -> Result<AnyInstance> {
        self.resolve_detached(key, argument, None)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("depth", &self.inner.depth)
            .field("bindings", &self.inner.registry)
            .field("singletons", &self.inner.singletons.len())
            .finish()
    }
}

/// A container paired with a scope context.
///
/// Created by [`Container::on`]. Every resolution made through it, including
/// nested ones made by factories, carries the context.
#[derive(Clone)]
pub struct Contextual {
    container: Container,
    context: ScopeContext,
}

impl Contextual {
    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[inline]
    pub fn context(&self) -> &ScopeContext {
        &self.context
    }

    /// Handle resolving the untagged `T` on demand, in this context.
    #[inline]
    pub fn provider<T: Injectable>(&self) -> Result<Provider<T>> {
        self.container
            .provider_for(BindingKey::of::<T>(), Some(Arc::clone(&self.context)))
    }

    /// Handle resolving `T` under `tag` on demand, in this context.
    #[inline]
    pub fn provider_tagged<T: Injectable>(&self, tag: impl Into<Tag>) -> Result<Provider<T>> {
        self.container.provider_for(
            BindingKey::of::<T>().with_tag(tag),
            Some(Arc::clone(&self.context)),
        )
    }

    /// Handle building `T` from an `A` on demand, in this context.
    #[inline]
    pub fn factory<A: Send + 'static, T: Injectable>(&self) -> Result<Factory<A, T>> {
        self.container.factory_for(
            BindingKey::of::<T>().with_argument::<A>(),
            Some(Arc::clone(&self.context)),
        )
    }

    #[inline]
    pub fn factory_tagged<A: Send + 'static, T: Injectable>(
        &self,
        tag: impl Into<Tag>,
    ) -> Result<Factory<A, T>> {
        self.container.factory_for(
            BindingKey::of::<T>().with_tag(tag).with_argument::<A>(),
            Some(Arc::clone(&self.context)),
        )
    }

    /// Handle resolving the untagged `T` on first use, in this context.
    #[inline]
    pub fn lazy<T: Injectable>(&self) -> LazyInstance<T> {
        self.lazy_for(BindingKey::of::<T>())
    }

    #[inline]
    pub fn lazy_tagged<T: Injectable>(&self, tag: impl Into<Tag>) -> LazyInstance<T> {
        self.lazy_for(BindingKey::of::<T>().with_tag(tag))
    }

    fn lazy_for<T: Injectable>(&self, key: BindingKey) -> LazyInstance<T> {
        LazyInstance::new(Provider::new(
            self.container.clone(),
            key,
            Some(Arc::clone(&self.context)),
        ))
    }
}

impl Resolve for Contextual {
    #[inline]
    fn resolve_any(&self, key: BindingKey, argument: Option<AnyArgument>) -> Result<AnyInstance> {
        self.container
            .resolve_detached(key, argument, Some(&self.context))
    }
}

impl std::fmt::Debug for Contextual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contextual")
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverrideViolation;
    use crate::scope::{KeyedScope, ScopeId};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::thread;

    #[derive(Debug)]
    struct Person {
        name: String,
    }

    impl Person {
        fn new(name: &str) -> Self {
            Self { name: name.into() }
        }
    }

    #[allow(dead_code)]
    struct A(Arc<B>);
    #[allow(dead_code)]
    struct B(Arc<C>);
    #[allow(dead_code)]
    struct C(Arc<A>);

    #[test]
    fn test_acyclic_graph_resolves() {
        struct Config(&'static str);
        struct Repo(Arc<Config>);
        struct Service(Arc<Repo>, Arc<Config>);

        let container = Container::builder()
            .bind::<Config>()
            .instance(Config("db"))
            .unwrap()
            .bind::<Repo>()
            .singleton(|r| Ok(Repo(r.get()?)))
            .unwrap()
            .bind::<Service>()
            .provider(|r| Ok(Service(r.get()?, r.get()?)))
            .unwrap()
            .build();

        let service = container.get::<Service>().unwrap();
        assert_eq!(service.0.0.0, "db");
        assert!(Arc::ptr_eq(&service.0.0, &service.1));
    }

    #[test]
    fn test_instance_returned_as_is() {
        let shared = Arc::new(Person::new("Salomon"));
        let container = Container::builder()
            .bind::<Person>()
            .shared(Arc::clone(&shared))
            .unwrap()
            .build();

        assert!(Arc::ptr_eq(&shared, &container.get::<Person>().unwrap()));
    }

    #[test]
    fn test_provider_runs_every_time() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let container = Container::builder()
            .bind::<Person>()
            .provider(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Person::new("p"))
            })
            .unwrap()
            .build();

        let first = container.get::<Person>().unwrap();
        for _ in 0..4 {
            assert!(!Arc::ptr_eq(&first, &container.get::<Person>().unwrap()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_singleton_concurrent_resolution() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let container = Container::builder()
            .bind::<Person>()
            .singleton(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(20));
                Ok(Person::new("single"))
            })
            .unwrap()
            .build();

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    container.get::<Person>().unwrap()
                })
            })
            .collect();

        let people: Vec<Arc<Person>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for person in &people[1..] {
            assert!(Arc::ptr_eq(&people[0], person));
        }
    }

    #[test]
    fn test_dependency_loop_path() {
        let container = Container::builder()
            .bind::<A>()
            .singleton(|r| Ok(A(r.get()?)))
            .unwrap()
            .bind::<B>()
            .singleton(|r| Ok(B(r.get()?)))
            .unwrap()
            .bind::<C>()
            .singleton(|r| Ok(C(r.get()?)))
            .unwrap()
            .build();

        let err = container.get::<A>().err().unwrap();
        assert_eq!(
            err.loop_path().unwrap(),
            &[
                BindingKey::of::<A>(),
                BindingKey::of::<B>(),
                BindingKey::of::<C>(),
                BindingKey::of::<A>(),
            ]
        );
        assert_eq!(
            err.to_string(),
            "Dependency recursion:\n     bind<A>()\n    ╔╩>bind<B>()\n    ║  ╚>bind<C>()\n    ║    ╚>bind<A>()\n    ╚══════╝"
        );

        // Nothing was cached and the failure is repeatable
        assert!(container.singletons().is_empty());
        assert!(matches!(
            container.get::<B>(),
            Err(DiError::DependencyLoop { .. })
        ));
    }

    #[test]
    fn test_loop_through_tagged_providers() {
        struct Root(#[allow(dead_code)] Arc<A>);

        let container = Container::builder()
            .bind::<Root>()
            .provider(|r| Ok(Root(r.get()?)))
            .unwrap()
            .bind::<A>()
            .provider(|r| Ok(A(r.get()?)))
            .unwrap()
            .bind::<B>()
            .provider(|r| Ok(B(r.get_tagged("yay")?)))
            .unwrap()
            .bind::<C>()
            .tagged("yay")
            .provider(|r| Ok(C(r.get()?)))
            .unwrap()
            .build();

        let err = container.get::<Root>().err().unwrap();
        let path = err.loop_path().unwrap();
        assert_eq!(path.first(), Some(&BindingKey::of::<A>()));
        assert_eq!(path.last(), Some(&BindingKey::of::<A>()));
        assert_eq!(path[2], BindingKey::of::<C>().with_tag("yay"));
    }

    #[test]
    fn test_same_type_under_other_tag_is_not_a_loop() {
        struct Node {
            next: Option<Arc<Node>>,
        }

        let container = Container::builder()
            .bind::<Node>()
            .singleton(|r| {
                Ok(Node {
                    next: Some(r.get_tagged("root")?),
                })
            })
            .unwrap()
            .bind::<Node>()
            .tagged("root")
            .singleton(|_| Ok(Node { next: None }))
            .unwrap()
            .build();

        let node = container.get::<Node>().unwrap();
        assert!(node.next.as_ref().unwrap().next.is_none());
    }

    #[test]
    fn test_not_found() {
        let container = Container::empty();
        let err = container.get::<Person>().unwrap_err();
        assert!(err.is_unbound(&BindingKey::of::<Person>()));

        let err = container.get::<Vec<String>>().unwrap_err();
        assert!(matches!(err, DiError::NotFound { .. }));
    }

    #[test]
    fn test_tag_not_found() {
        let container = Container::builder()
            .bind::<Person>()
            .provider(|_| Ok(Person::new("anonymous")))
            .unwrap()
            .bind::<Person>()
            .tagged("x")
            .provider(|_| Ok(Person::new("Salomon")))
            .unwrap()
            .build();

        let err = container.get_tagged::<Person>("y").unwrap_err();
        assert!(err.is_unbound(&BindingKey::of::<Person>().with_tag("y")));
        assert_eq!(container.get_tagged::<Person>("x").unwrap().name, "Salomon");
    }

    #[test]
    fn test_factory_is_not_provider() {
        let container = Container::builder()
            .bind::<Person>()
            .factory(|_, name: String| Ok(Person { name }))
            .unwrap()
            .build();

        let err = container.provider::<Person>().unwrap_err();
        match err {
            DiError::NotFound {
                reason: NotFoundReason::KindMismatch { registered },
                ..
            } => assert_eq!(registered, BindingKey::of::<Person>().with_argument::<String>()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            container.get::<Person>(),
            Err(DiError::NotFound { .. })
        ));

        let person = container.get_with::<String, Person>("Salomon".into()).unwrap();
        assert_eq!(person.name, "Salomon");
    }

    #[test]
    fn test_provider_is_not_factory() {
        let container = Container::builder()
            .bind::<Person>()
            .provider(|_| Ok(Person::new("p")))
            .unwrap()
            .build();

        assert!(matches!(
            container.factory::<i32, Person>(),
            Err(DiError::NotFound {
                reason: NotFoundReason::KindMismatch { .. },
                ..
            })
        ));
        assert!(container.get_with::<i32, Person>(1).is_err());
    }

    #[test]
    fn test_try_get() {
        let container = Container::builder()
            .bind::<Person>()
            .factory(|_, name: String| Ok(Person { name }))
            .unwrap()
            .bind::<A>()
            .provider(|r| Ok(A(r.get()?)))
            .unwrap()
            .build();

        // Nothing bound at all
        assert!(container.try_get::<String>().unwrap().is_none());
        // Bound, but as a factory
        assert!(container.try_get::<Person>().is_err());
        // Bound, but its dependency is missing
        assert!(container.try_get::<A>().is_err());
    }

    #[test]
    fn test_failed_factory_can_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let container = Container::builder()
            .bind::<Person>()
            .singleton(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DiError::creation_failed::<Person>("warming up"))
                } else {
                    Ok(Person::new("ready"))
                }
            })
            .unwrap()
            .build();

        assert!(matches!(
            container.get::<Person>(),
            Err(DiError::CreationFailed { .. })
        ));
        assert_eq!(container.get::<Person>().unwrap().name, "ready");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_child_override_shadows_parent_only() {
        let parent = Container::builder()
            .bind::<Person>()
            .instance(Person::new("parent"))
            .unwrap()
            .build();

        let child = parent
            .create_child(true, |builder| {
                builder.bind::<Person>().instance(Person::new("child"))
            })
            .unwrap();
        let sibling = parent.child().build();

        assert_eq!(child.get::<Person>().unwrap().name, "child");
        assert_eq!(sibling.get::<Person>().unwrap().name, "parent");
        assert_eq!(parent.get::<Person>().unwrap().name, "parent");
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn test_child_override_requires_permission() {
        let parent = Container::builder()
            .bind::<Person>()
            .instance(Person::new("parent"))
            .unwrap()
            .build();

        let err = parent
            .create_child(false, |builder| {
                builder.bind::<Person>().instance(Person::new("child"))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            DiError::OverwritingBinding {
                reason: OverrideViolation::NotPermitted,
                ..
            }
        ));

        let explicit = parent
            .create_child(false, |builder| {
                builder
                    .bind::<Person>()
                    .overriding()
                    .instance(Person::new("explicit"))
            })
            .unwrap();
        assert_eq!(explicit.get::<Person>().unwrap().name, "explicit");
    }

    #[test]
    fn test_singletons_belong_to_owning_container() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let parent = Container::builder()
            .bind::<Person>()
            .singleton(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Person::new("shared"))
            })
            .unwrap()
            .build();

        let left = parent.child().build();
        let right = parent.child().build();

        let a = left.get::<Person>().unwrap();
        let b = right.get::<Person>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(parent.singletons().contains(&BindingKey::of::<Person>()));
        assert!(left.singletons().is_empty());
    }

    #[test]
    fn test_parent_bindings_use_parent_dependencies() {
        struct Greeter(Arc<String>);

        let parent = Container::builder()
            .constant("name", String::from("parent"))
            .unwrap()
            .bind::<Greeter>()
            .provider(|r| Ok(Greeter(r.get_tagged("name")?)))
            .unwrap()
            .build();

        let child = parent
            .child()
            .allow_silent_override()
            .constant("name", String::from("child"))
            .unwrap()
            .build();

        assert_eq!(*child.get::<Greeter>().unwrap().0, "parent");
        assert_eq!(*child.get_tagged::<String>("name").unwrap(), "child");
    }

    #[test]
    fn test_singleton_invalidation_rebuilds() {
        static NEXT: AtomicU32 = AtomicU32::new(0);

        struct Serial(u32);

        let container = Container::builder()
            .bind::<Serial>()
            .singleton(|_| Ok(Serial(NEXT.fetch_add(1, Ordering::SeqCst))))
            .unwrap()
            .build();

        let first = container.get::<Serial>().unwrap();
        assert!(container.singletons().invalidate(&BindingKey::of::<Serial>()));
        let second = container.get::<Serial>().unwrap();
        assert_ne!(first.0, second.0);
    }

    #[test]
    fn test_scoped_per_session_and_invalidation() {
        struct Session(u32);
        struct Random(u32);

        static NEXT: AtomicU32 = AtomicU32::new(0);
        let sessions = Arc::new(KeyedScope::new(|session: &Session| session.0));

        let container = Container::builder()
            .bind::<Random>()
            .scoped(Arc::clone(&sessions), |_| {
                Ok(Random(NEXT.fetch_add(1, Ordering::SeqCst)))
            })
            .unwrap()
            .build();

        let a1 = container.on(Session(1)).get::<Random>().unwrap();
        let a2 = container.on(Session(1)).get::<Random>().unwrap();
        let b = container.on(Session(2)).get::<Random>().unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));

        assert!(sessions.invalidate(&1, &BindingKey::of::<Random>()));
        let a3 = container.on(Session(1)).get::<Random>().unwrap();
        assert_ne!(a1.0, a3.0);

        // Session 2 is untouched
        let b2 = container.on(Session(2)).get::<Random>().unwrap();
        assert!(Arc::ptr_eq(&b, &b2));
    }

    #[test]
    fn test_scoped_without_context_is_not_found() {
        #[derive(Debug)]
        struct Random;

        let calls = KeyedScope::per_id();
        let container = Container::builder()
            .bind::<Random>()
            .scoped(Arc::new(calls), |_| Ok(Random))
            .unwrap()
            .build();

        let err = container.get::<Random>().unwrap_err();
        assert!(matches!(
            err,
            DiError::NotFound {
                reason: NotFoundReason::MissingContext { .. },
                ..
            }
        ));
        assert!(container.on("wrong context type").get::<Random>().is_err());
        assert!(container.on(ScopeId::new()).get::<Random>().is_ok());
    }

    #[test]
    fn test_scope_context_reaches_nested_factories() {
        struct Call(Arc<RequestLog>);
        struct RequestLog(Mutex<Vec<&'static str>>);

        let calls = Arc::new(KeyedScope::per_id());
        let container = Container::builder()
            .bind::<RequestLog>()
            .scoped(Arc::clone(&calls), |_| Ok(RequestLog(Mutex::new(Vec::new()))))
            .unwrap()
            .bind::<Call>()
            .provider(|r| Ok(Call(r.get()?)))
            .unwrap()
            .build();

        let id = ScopeId::new();
        let scoped = container.on(id);
        scoped.get::<Call>().unwrap().0.0.lock().unwrap().push("setup");
        scoped.get::<Call>().unwrap().0.0.lock().unwrap().push("call");

        let log = scoped.get::<RequestLog>().unwrap();
        assert_eq!(*log.0.lock().unwrap(), ["setup", "call"]);

        calls.close(&id);
        assert!(container.on(id).get::<RequestLog>().unwrap().0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_contextual_handles_keep_context() {
        struct Session(u32);
        struct Cart(u32);

        static NEXT: AtomicU32 = AtomicU32::new(0);
        let sessions = Arc::new(KeyedScope::new(|session: &Session| session.0));

        let container = Container::builder()
            .bind::<Cart>()
            .scoped(sessions, |_| Ok(Cart(NEXT.fetch_add(1, Ordering::SeqCst))))
            .unwrap()
            .build();

        let session = container.on(Session(9));
        let provider = session.provider::<Cart>().unwrap();
        let lazy = session.lazy::<Cart>();

        let direct = session.get::<Cart>().unwrap();
        assert!(Arc::ptr_eq(&direct, &provider.get().unwrap()));
        assert!(Arc::ptr_eq(&direct, &lazy.get().unwrap()));

        // Without a context the same handle cannot work
        let detached = container.provider::<Cart>().unwrap();
        assert!(detached.get().is_err());
    }

    #[test]
    fn test_deep_parent_chain() {
        #[derive(Clone)]
        struct RootService(i32);
        #[derive(Clone)]
        struct MiddleService(i32);
        #[derive(Clone)]
        struct LeafService(i32);

        let root = Container::builder()
            .bind::<RootService>()
            .instance(RootService(1))
            .unwrap()
            .build();
        let middle1 = root
            .child()
            .bind::<MiddleService>()
            .instance(MiddleService(2))
            .unwrap()
            .build();
        let middle2 = middle1.child().build();
        let leaf = middle2
            .child()
            .bind::<LeafService>()
            .instance(LeafService(4))
            .unwrap()
            .build();

        assert_eq!(leaf.get::<RootService>().unwrap().0, 1);
        assert_eq!(leaf.get::<MiddleService>().unwrap().0, 2);
        assert_eq!(leaf.get::<LeafService>().unwrap().0, 4);
        assert_eq!(leaf.depth(), 3);

        assert!(middle2.contains::<RootService>());
        assert!(middle2.contains::<MiddleService>());
        assert!(!middle2.contains::<LeafService>());
    }

    #[test]
    fn test_keys_in_declaration_order() {
        let container = Container::builder()
            .bind::<u8>()
            .instance(1)
            .unwrap()
            .constant("name", String::from("x"))
            .unwrap()
            .bind::<u16>()
            .instance(2)
            .unwrap()
            .build();

        assert_eq!(
            container.keys(),
            [
                BindingKey::of::<u8>(),
                BindingKey::of::<String>().with_tag("name"),
                BindingKey::of::<u16>(),
            ]
        );
        assert_eq!(container.len(), 3);
    }

    #[test]
    fn test_scoped_override_keeps_parent_instance() {
        struct Session(u32);
        struct Label(&'static str);

        let sessions = Arc::new(KeyedScope::new(|session: &Session| session.0));
        let parent = Container::builder()
            .bind::<Label>()
            .scoped(Arc::clone(&sessions), |_| Ok(Label("parent")))
            .unwrap()
            .build();
        let child = parent
            .create_child(true, |builder| {
                builder
                    .bind::<Label>()
                    .scoped(Arc::clone(&sessions), |_| Ok(Label("child")))
            })
            .unwrap();

        // Child first, so the parent must not pick up the child's instance
        assert_eq!(child.on(Session(1)).get::<Label>().unwrap().0, "child");
        assert_eq!(parent.on(Session(1)).get::<Label>().unwrap().0, "parent");
        assert_eq!(child.on(Session(1)).get::<Label>().unwrap().0, "child");

        // An inheriting sibling shares the parent's instance
        let sibling = parent.child().build();
        let from_parent = parent.on(Session(1)).get::<Label>().unwrap();
        let from_sibling = sibling.on(Session(1)).get::<Label>().unwrap();
        assert!(Arc::ptr_eq(&from_parent, &from_sibling));

        let cache = sessions.cache_if_open(&1).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_roots_sharing_a_scope_stay_apart() {
        struct Session(u32);
        struct Label(&'static str);

        let sessions = Arc::new(KeyedScope::new(|session: &Session| session.0));
        let container = |name: &'static str| {
            Container::builder()
                .bind::<Label>()
                .scoped(Arc::clone(&sessions), move |_| Ok(Label(name)))
                .unwrap()
                .build()
        };
        let a = container("a");
        let b = container("b");

        assert_eq!(a.on(Session(7)).get::<Label>().unwrap().0, "a");
        assert_eq!(b.on(Session(7)).get::<Label>().unwrap().0, "b");

        // Invalidation drops the key for every container using the session
        assert!(sessions.invalidate(&7, &BindingKey::of::<Label>()));
        assert!(sessions.cache_if_open(&7).unwrap().is_empty());
    }

    #[test]
    fn test_singleton_resolving_itself_through_container() {
        #[derive(Debug)]
        struct Service;

        let container = Container::builder()
            .bind::<Service>()
            .singleton(|r| {
                r.container().get::<Service>()?;
                Ok(Service)
            })
            .unwrap()
            .build();

        let key = BindingKey::of::<Service>();
        let err = container.get::<Service>().unwrap_err();
        assert_eq!(err.loop_path(), Some(&[key.clone(), key][..]));
        assert!(container.singletons().is_empty());
    }

    #[test]
    fn test_singleton_loop_through_provider_handle() {
        #[derive(Debug)]
        struct Pool;
        struct Lease(#[allow(dead_code)] Arc<Pool>);

        let container = Container::builder()
            .bind::<Pool>()
            .singleton(|r| {
                let leases = r.container().provider::<Lease>()?;
                leases.get()?;
                Ok(Pool)
            })
            .unwrap()
            .bind::<Lease>()
            .provider(|r| Ok(Lease(r.get()?)))
            .unwrap()
            .build();

        let err = container.get::<Pool>().unwrap_err();
        assert_eq!(
            err.loop_path(),
            Some(
                &[
                    BindingKey::of::<Pool>(),
                    BindingKey::of::<Lease>(),
                    BindingKey::of::<Pool>(),
                ][..]
            )
        );

        // Nothing is left half-built; the same loop is reported again
        assert!(matches!(
            container.get::<Pool>(),
            Err(DiError::DependencyLoop { .. })
        ));
    }
}

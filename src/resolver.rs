//! Resolution surface
//!
//! [`Resolve`] is implemented by everything that can hand out instances: the
//! [`Container`] itself, a [`Contextual`](crate::Contextual) view carrying a
//! scope context, and the [`Resolver`] passed to factories. Implementors
//! provide the type-erased [`resolve_any`](Resolve::resolve_any); the typed
//! methods are built on top of it.

use crate::binding::AnyArgument;
use crate::cache::AnyInstance;
use crate::container::Container;
use crate::context::ResolutionContext;
use crate::error::{DiError, Result};
use crate::key::{BindingKey, Tag};
use crate::provider::Injectable;
use crate::scope::ScopeContext;
use std::sync::Arc;

/// Typed access to bound instances.
pub trait Resolve {
    /// Resolve `key`, passing `argument` to factory bindings.
    fn resolve_any(&self, key: BindingKey, argument: Option<AnyArgument>) -> Result<AnyInstance>;

    /// Resolve the untagged binding for `T`.
    #[inline]
    fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        resolve_typed(self, BindingKey::of::<T>(), None)
    }

    /// Resolve the binding for `T` under `tag`.
    #[inline]
    fn get_tagged<T: Injectable>(&self, tag: impl Into<Tag>) -> Result<Arc<T>> {
        resolve_typed(self, BindingKey::of::<T>().with_tag(tag), None)
    }

    /// Resolve the factory binding for `T` taking an `A`.
    #[inline]
    fn get_with<A: Send + 'static, T: Injectable>(&self, argument: A) -> Result<Arc<T>> {
        resolve_typed(
            self,
            BindingKey::of::<T>().with_argument::<A>(),
            Some(Box::new(argument)),
        )
    }

    /// Resolve the factory binding for `T` taking an `A`, under `tag`.
    #[inline]
    fn get_tagged_with<A: Send + 'static, T: Injectable>(
        &self,
        tag: impl Into<Tag>,
        argument: A,
    ) -> Result<Arc<T>> {
        resolve_typed(
            self,
            BindingKey::of::<T>().with_tag(tag).with_argument::<A>(),
            Some(Box::new(argument)),
        )
    }

    /// Like [`get`](Self::get), but `Ok(None)` when nothing at all is bound
    /// to `T`. Kind mismatches, loops and factory failures are still errors.
    #[inline]
    fn try_get<T: Injectable>(&self) -> Result<Option<Arc<T>>> {
        try_resolve_typed(self, BindingKey::of::<T>())
    }

    /// Tagged form of [`try_get`](Self::try_get).
    #[inline]
    fn try_get_tagged<T: Injectable>(&self, tag: impl Into<Tag>) -> Result<Option<Arc<T>>> {
        try_resolve_typed(self, BindingKey::of::<T>().with_tag(tag))
    }
}

fn resolve_typed<R, T>(resolver: &R, key: BindingKey, argument: Option<AnyArgument>) -> Result<Arc<T>>
where
    R: Resolve + ?Sized,
    T: Injectable,
{
    let instance = resolver.resolve_any(key.clone(), argument)?;
    downcast(&key, instance)
}

fn try_resolve_typed<R, T>(resolver: &R, key: BindingKey) -> Result<Option<Arc<T>>>
where
    R: Resolve + ?Sized,
    T: Injectable,
{
    match resolver.resolve_any(key.clone(), None) {
        Ok(instance) => downcast(&key, instance).map(Some),
        Err(err) if err.is_unbound(&key) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Recover the concrete type of an instance resolved for `key`.
pub(crate) fn downcast<T: Injectable>(key: &BindingKey, instance: AnyInstance) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| {
        DiError::Internal(format!(
            "instance bound to {key} is not a {}",
            std::any::type_name::<T>()
        ))
    })
}

/// Handle given to factories for resolving their own dependencies.
///
/// It shares the resolution context of the request that triggered the
/// factory, so dependency loops spanning several factories are detected, and
/// it carries the same scope context, so scoped dependencies land in the same
/// scope instance.
pub struct Resolver<'a> {
    container: &'a Container,
    context: &'a ResolutionContext,
    scope: Option<&'a ScopeContext>,
}

impl<'a> Resolver<'a> {
    #[inline]
    pub(crate) fn new(
        container: &'a Container,
        context: &'a ResolutionContext,
        scope: Option<&'a ScopeContext>,
    ) -> Self {
        Self {
            container,
            context,
            scope,
        }
    }

    /// The container owning the binding being built.
    ///
    /// Providers and factories obtained from it start their own resolutions
    /// when invoked.
    #[inline]
    pub fn container(&self) -> &'a Container {
        self.container
    }

    /// Scope context of the current resolution, if any.
    #[inline]
    pub fn scope_context(&self) -> Option<&'a ScopeContext> {
        self.scope
    }

    /// Keys currently under construction, outermost first.
    #[inline]
    pub fn stack(&self) -> Vec<BindingKey> {
        self.context.stack()
    }
}

impl Resolve for Resolver<'_> {
    #[inline]
    fn resolve_any(&self, key: BindingKey, argument: Option<AnyArgument>) -> Result<AnyInstance> {
        self.container
            .resolve_in(key, argument, self.context, self.scope)
    }
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("depth", &self.context.depth())
            .field("has_scope_context", &self.scope.is_some())
            .finish()
    }
}

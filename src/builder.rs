//! Declaration phase
//!
//! Bindings are declared on a [`ContainerBuilder`], either through the typed
//! [`Bind`] chain or as raw [`Declaration`]s. Each declaration is checked
//! against what is already declared locally and what the parent chain
//! provides; [`build`](ContainerBuilder::build) then freezes the result.

use crate::binding::Binding;
use crate::container::Container;
use crate::error::{DiError, OverrideViolation, Result};
use crate::key::Tag;
use crate::provider::Injectable;
use crate::registry::BindingRegistry;
use crate::resolver::Resolver;
use crate::scope::Scope;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// A binding plus whether it is meant to replace an existing one.
#[derive(Debug)]
pub struct Declaration {
    binding: Binding,
    overrides: bool,
}

impl Declaration {
    #[inline]
    pub fn new(binding: Binding) -> Self {
        Self {
            binding,
            overrides: false,
        }
    }

    /// Mark the declaration as an explicit override.
    ///
    /// An explicit override must have something to replace, locally or in
    /// the parent chain.
    #[inline]
    pub fn overriding(mut self) -> Self {
        self.overrides = true;
        self
    }

    #[inline]
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    #[inline]
    pub fn is_override(&self) -> bool {
        self.overrides
    }
}

impl From<Binding> for Declaration {
    #[inline]
    fn from(binding: Binding) -> Self {
        Self::new(binding)
    }
}

/// Collects declarations for a new container.
///
/// # Examples
///
/// ```rust
/// use bindery::prelude::*;
///
/// struct Greeting(String);
///
/// let container = Container::builder()
///     .constant("name", String::from("world"))?
///     .bind::<Greeting>()
///     .provider(|r| Ok(Greeting(format!("hello {}", r.get_tagged::<String>("name")?))))?
///     .build();
///
/// assert_eq!(container.get::<Greeting>()?.0, "hello world");
/// # Ok::<(), bindery::DiError>(())
/// ```
#[must_use]
pub struct ContainerBuilder {
    registry: BindingRegistry,
    parent: Option<Container>,
    allow_silent_override: bool,
}

impl ContainerBuilder {
    /// Builder for a root container.
    #[inline]
    pub fn new() -> Self {
        Self {
            registry: BindingRegistry::new(),
            parent: None,
            allow_silent_override: false,
        }
    }

    pub(crate) fn with_parent(parent: Container) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Let declarations replace existing keys without being marked as
    /// overrides.
    #[inline]
    pub fn allow_silent_override(self) -> Self {
        self.silent_override(true)
    }

    #[inline]
    pub fn silent_override(mut self, allowed: bool) -> Self {
        self.allow_silent_override = allowed;
        self
    }

    /// Start declaring a binding for `T`.
    #[inline]
    pub fn bind<T: Injectable>(self) -> Bind<T> {
        Bind {
            builder: self,
            tag: None,
            overrides: false,
            _marker: PhantomData,
        }
    }

    /// Bind `value` under `tag`.
    #[inline]
    pub fn constant<T: Injectable>(self, tag: impl Into<Tag>, value: T) -> Result<Self> {
        self.declare(Binding::instance(value).tagged(tag))
    }

    /// Add a single declaration.
    ///
    /// Fails with:
    /// - [`DiError::OverwritingBinding`] ([`OverrideViolation::NothingToOverride`])
    ///   for an explicit override of a key bound nowhere,
    /// - [`DiError::DuplicateBinding`] for an unmarked redeclaration of a
    ///   local key,
    /// - [`DiError::OverwritingBinding`] ([`OverrideViolation::NotPermitted`])
    ///   for an unmarked redeclaration of an inherited key,
    ///
    /// unless silent overrides are allowed, which lifts the last two.
    pub fn declare(mut self, declaration: impl Into<Declaration>) -> Result<Self> {
        let Declaration { binding, overrides } = declaration.into();
        let key = binding.key();

        let local = self.registry.contains(key);
        let inherited = self
            .parent
            .as_ref()
            .is_some_and(|parent| parent.contains_key(key));

        if overrides && !local && !inherited {
            return Err(DiError::OverwritingBinding {
                key: key.clone(),
                reason: OverrideViolation::NothingToOverride,
            });
        }
        if inherited && !local && !overrides && !self.allow_silent_override {
            return Err(DiError::OverwritingBinding {
                key: key.clone(),
                reason: OverrideViolation::NotPermitted,
            });
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "bindery",
            key = %key,
            lifecycle = %binding.lifecycle(),
            replaces = local || inherited,
            "Declaring binding"
        );

        let allow_replace = overrides || self.allow_silent_override;
        self.registry.register(binding, allow_replace)?;
        Ok(self)
    }

    /// Add every declaration of `declarations`, stopping at the first error.
    pub fn extend<I>(self, declarations: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Declaration>,
    {
        declarations
            .into_iter()
            .try_fold(self, |builder, declaration| builder.declare(declaration))
    }

    /// Number of bindings declared so far (not including parents).
    #[inline]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Freeze the declarations into a container.
    pub fn build(self) -> Container {
        Container::from_parts(self.registry, self.parent, self.allow_silent_override)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("bindings", &self.registry)
            .field("has_parent", &self.parent.is_some())
            .field("allow_silent_override", &self.allow_silent_override)
            .finish()
    }
}

/// Typed declaration of one binding for `T`.
///
/// Finish with one of [`instance`](Self::instance),
/// [`provider`](Self::provider), [`factory`](Self::factory),
/// [`singleton`](Self::singleton) or [`scoped`](Self::scoped), which hand
/// the builder back.
#[must_use]
pub struct Bind<T> {
    builder: ContainerBuilder,
    tag: Option<Tag>,
    overrides: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> Bind<T> {
    #[inline]
    pub fn tagged(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Declare this binding as an explicit override.
    #[inline]
    pub fn overriding(mut self) -> Self {
        self.overrides = true;
        self
    }

    /// Bind a pre-built value.
    #[inline]
    pub fn instance(self, value: T) -> Result<ContainerBuilder> {
        self.finish(Binding::instance(value))
    }

    /// Bind a value that is already shared.
    #[inline]
    pub fn shared(self, value: Arc<T>) -> Result<ContainerBuilder> {
        self.finish(Binding::shared(value))
    }

    /// Bind a factory run on every resolution.
    pub fn provider<F>(self, create: F) -> Result<ContainerBuilder>
    where
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let binding = Binding::provider(create)?;
        self.finish(binding)
    }

    /// Bind a factory taking an `A`, run on every resolution.
    pub fn factory<A, F>(self, create: F) -> Result<ContainerBuilder>
    where
        A: Send + 'static,
        F: Fn(&Resolver<'_>, A) -> Result<T> + Send + Sync + 'static,
    {
        let binding = Binding::factory(create)?;
        self.finish(binding)
    }

    /// Bind a factory run once, on first resolution.
    pub fn singleton<F>(self, create: F) -> Result<ContainerBuilder>
    where
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let binding = Binding::singleton(create)?;
        self.finish(binding)
    }

    /// Bind a factory run once per instance of `scope`.
    pub fn scoped<S, F>(self, scope: Arc<S>, create: F) -> Result<ContainerBuilder>
    where
        S: Scope,
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let binding = Binding::scoped(scope, create)?;
        self.finish(binding)
    }

    fn finish(self, binding: Binding) -> Result<ContainerBuilder> {
        let binding = match self.tag {
            Some(tag) => binding.tagged(tag),
            None => binding,
        };
        let declaration = Declaration {
            binding,
            overrides: self.overrides,
        };
        self.builder.declare(declaration)
    }
}

impl<T> std::fmt::Debug for Bind<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bind")
            .field("type", &std::any::type_name::<T>())
            .field("tag", &self.tag)
            .field("overrides", &self.overrides)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::BindingKey;
    use crate::resolver::Resolve;

    #[derive(Debug)]
    struct Person {
        name: String,
    }

    #[test]
    fn test_duplicate_binding() {
        let err = ContainerBuilder::new()
            .bind::<Person>()
            .instance(Person { name: "a".into() })
            .unwrap()
            .bind::<Person>()
            .instance(Person { name: "b".into() })
            .unwrap_err();

        assert!(matches!(err, DiError::DuplicateBinding { key } if key == BindingKey::of::<Person>()));
    }

    #[test]
    fn test_silent_override_replaces() {
        let container = ContainerBuilder::new()
            .allow_silent_override()
            .bind::<Person>()
            .instance(Person { name: "a".into() })
            .unwrap()
            .bind::<Person>()
            .instance(Person { name: "b".into() })
            .unwrap()
            .build();

        assert_eq!(container.get::<Person>().unwrap().name, "b");
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_explicit_override_replaces_local() {
        let container = ContainerBuilder::new()
            .bind::<Person>()
            .instance(Person { name: "a".into() })
            .unwrap()
            .bind::<Person>()
            .overriding()
            .instance(Person { name: "b".into() })
            .unwrap()
            .build();

        assert_eq!(container.get::<Person>().unwrap().name, "b");
    }

    #[test]
    fn test_override_needs_a_target() {
        let err = ContainerBuilder::new()
            .bind::<Person>()
            .overriding()
            .instance(Person { name: "a".into() })
            .unwrap_err();

        assert!(matches!(
            err,
            DiError::OverwritingBinding {
                reason: OverrideViolation::NothingToOverride,
                ..
            }
        ));

        // Even with silent overrides
        let err = ContainerBuilder::new()
            .allow_silent_override()
            .declare(Declaration::new(Binding::instance(1u8)).overriding())
            .unwrap_err();
        assert!(matches!(err, DiError::OverwritingBinding { .. }));
    }

    #[test]
    fn test_tags_are_distinct_keys() {
        let container = ContainerBuilder::new()
            .bind::<Person>()
            .instance(Person { name: "anon".into() })
            .unwrap()
            .bind::<Person>()
            .tagged("boss")
            .instance(Person { name: "Salomon".into() })
            .unwrap()
            .build();

        assert_eq!(container.get::<Person>().unwrap().name, "anon");
        assert_eq!(container.get_tagged::<Person>("boss").unwrap().name, "Salomon");
    }

    #[test]
    fn test_unit_provider_rejected_by_builder() {
        let err = ContainerBuilder::new()
            .bind::<()>()
            .provider(|_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, DiError::InvalidArgument { .. }));

        assert!(ContainerBuilder::new().bind::<()>().instance(()).is_ok());
    }

    #[test]
    fn test_extend_stops_at_first_error() {
        let declarations = vec![
            Declaration::new(Binding::instance(1u8)),
            Declaration::new(Binding::instance(2u16)),
            Declaration::new(Binding::instance(3u8)),
        ];
        let err = ContainerBuilder::new().extend(declarations).unwrap_err();
        assert!(matches!(err, DiError::DuplicateBinding { .. }));

        let builder = ContainerBuilder::new()
            .extend([Binding::instance(1u8), Binding::instance(2u16)])
            .unwrap();
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_child_keeps_sibling_keys_apart() {
        let parent = ContainerBuilder::new().build();
        let a = parent.child().bind::<u8>().instance(1).unwrap().build();
        let b = parent.child().bind::<u8>().instance(2).unwrap().build();

        assert_eq!(*a.get::<u8>().unwrap(), 1);
        assert_eq!(*b.get::<u8>().unwrap(), 2);
        assert!(!parent.contains::<u8>());
    }
}

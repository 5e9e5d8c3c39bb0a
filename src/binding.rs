//! Bindings and their lifecycles
//!
//! A [`Binding`] pairs a [`BindingKey`] with a way of producing instances.
//! The factory closure is stored type-erased next to its lifecycle in one
//! enum, so resolution dispatches with a `match` rather than through a
//! trait object per lifecycle.

use crate::cache::AnyInstance;
use crate::error::{DiError, Result};
use crate::key::{BindingKey, Tag};
use crate::provider::Injectable;
use crate::resolver::Resolver;
use crate::scope::{ErasedScope, Scope};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Type-erased argument passed to a factory binding.
pub type AnyArgument = Box<dyn Any + Send>;

/// Type-erased factory. The argument is present exactly when the binding key
/// carries an argument type.
pub(crate) type CreateFn =
    Arc<dyn Fn(&Resolver<'_>, Option<AnyArgument>) -> Result<AnyInstance> + Send + Sync>;

/// How often a binding's factory runs and where its results are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Pre-built value returned as-is
    Instance,
    /// Factory invoked on every resolution
    Provider,
    /// Factory invoked once per owning container
    Singleton,
    /// Factory invoked once per scope instance
    Scoped,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Instance => "instance",
            Self::Provider => "provider",
            Self::Singleton => "singleton",
            Self::Scoped => "scoped",
        };
        f.write_str(name)
    }
}

/// Process-unique identity of one scoped binding.
///
/// A scope instance may be shared by several containers, so scoped bindings
/// cache under this id as well as their key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BindingId(u64);

impl BindingId {
    #[inline]
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) enum BindingKind {
    Instance(AnyInstance),
    Provider(CreateFn),
    Singleton(CreateFn),
    Scoped {
        id: BindingId,
        scope: Arc<dyn ErasedScope>,
        create: CreateFn,
    },
}

/// A registered rule mapping a key to a factory and a lifecycle.
///
/// Bindings are usually declared through
/// [`ContainerBuilder::bind`](crate::ContainerBuilder::bind); the constructors
/// here feed the raw declaration stream
/// ([`ContainerBuilder::declare`](crate::ContainerBuilder::declare)).
///
/// Every constructor that runs a factory rejects `()` as the bound type: such
/// a binding could never be usefully retrieved.
pub struct Binding {
    key: BindingKey,
    kind: BindingKind,
}

impl Binding {
    /// Bind a pre-built value.
    pub fn instance<T: Injectable>(value: T) -> Self {
        Self {
            key: BindingKey::of::<T>(),
            kind: BindingKind::Instance(Arc::new(value)),
        }
    }

    /// Bind a shared value that already lives in an `Arc`.
    pub fn shared<T: Injectable>(value: Arc<T>) -> Self {
        Self {
            key: BindingKey::of::<T>(),
            kind: BindingKind::Instance(value),
        }
    }

    /// Bind a factory invoked on every resolution.
    pub fn provider<T, F>(create: F) -> Result<Self>
    where
        T: Injectable,
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let key = Self::checked_key(BindingKey::of::<T>())?;
        Ok(Self {
            key,
            kind: BindingKind::Provider(erase(create)),
        })
    }

    /// Bind a factory taking an argument of type `A`, invoked on every
    /// resolution.
    pub fn factory<A, T, F>(create: F) -> Result<Self>
    where
        A: Send + 'static,
        T: Injectable,
        F: Fn(&Resolver<'_>, A) -> Result<T> + Send + Sync + 'static,
    {
        let key = Self::checked_key(BindingKey::of::<T>().with_argument::<A>())?;
        let create: CreateFn = Arc::new(move |resolver: &Resolver<'_>, argument: Option<AnyArgument>| {
            let argument = argument
                .ok_or_else(|| DiError::Internal("factory binding called without argument".into()))?
                .downcast::<A>()
                .map_err(|_| {
                    DiError::Internal(format!(
                        "factory argument is not a {}",
                        std::any::type_name::<A>()
                    ))
                })?;
            let instance = create(resolver, *argument)?;
            Ok(Arc::new(instance) as AnyInstance)
        });
        Ok(Self {
            key,
            kind: BindingKind::Provider(create),
        })
    }

    /// Bind a factory invoked once; the owning container caches the result.
    pub fn singleton<T, F>(create: F) -> Result<Self>
    where
        T: Injectable,
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let key = Self::checked_key(BindingKey::of::<T>())?;
        Ok(Self {
            key,
            kind: BindingKind::Singleton(erase(create)),
        })
    }

    /// Bind a factory invoked once per instance of `scope`.
    pub fn scoped<S, T, F>(scope: Arc<S>, create: F) -> Result<Self>
    where
        S: Scope,
        T: Injectable,
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let key = Self::checked_key(BindingKey::of::<T>())?;
        Ok(Self {
            key,
            kind: BindingKind::Scoped {
                id: BindingId::next(),
                scope,
                create: erase(create),
            },
        })
    }

    /// Same binding under `tag`.
    #[inline]
    pub fn tagged(mut self, tag: impl Into<Tag>) -> Self {
        self.key = self.key.with_tag(tag);
        self
    }

    #[inline]
    pub fn key(&self) -> &BindingKey {
        &self.key
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        match self.kind {
            BindingKind::Instance(_) => Lifecycle::Instance,
            BindingKind::Provider(_) => Lifecycle::Provider,
            BindingKind::Singleton(_) => Lifecycle::Singleton,
            BindingKind::Scoped { .. } => Lifecycle::Scoped,
        }
    }

    #[inline]
    pub(crate) fn kind(&self) -> &BindingKind {
        &self.kind
    }

    fn checked_key(key: BindingKey) -> Result<BindingKey> {
        if key.bound_type().is_unit() {
            return Err(DiError::InvalidArgument {
                key,
                reason: "the factory returns `()`, which can never be retrieved meaningfully"
                    .into(),
            });
        }
        Ok(key)
    }
}

fn erase<T, F>(create: F) -> CreateFn
where
    T: Injectable,
    F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(move |resolver: &Resolver<'_>, _: Option<AnyArgument>| {
        Ok(Arc::new(create(resolver)?) as AnyInstance)
    })
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

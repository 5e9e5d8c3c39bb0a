//! Binding keys
//!
//! A [`BindingKey`] is the structural identity of a requested capability:
//! the bound type, an optional tag, and an optional argument type for
//! bindings that take a parameter. Two keys are equal when all three parts
//! are equal, so a provider and a factory for the same type never collide.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Stable identity token for a type, with its name kept for diagnostics.
///
/// Equality and hashing only look at the `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    /// Descriptor for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, as reported by `std::any::type_name`.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with every module path stripped.
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }

    #[inline]
    pub(crate) fn is_unit(&self) -> bool {
        self.id == TypeId::of::<()>()
    }
}

impl PartialEq for TypeDescriptor {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Strip module paths from a type name, generics included.
///
/// `alloc::vec::Vec<core::option::Option<u8>>` becomes `Vec<Option<u8>>`.
pub(crate) fn short_type_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut segment_start = 0;
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push(c);
            segment_start = out.len();
        }
    }

    out
}

/// A binding tag, distinguishing several bindings of the same type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tag(Arc<str>);

impl Tag {
    /// Create a tag.
    #[inline]
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&Tag> for Tag {
    fn from(value: &Tag) -> Self {
        value.clone()
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structural identity of a requested capability.
///
/// # Examples
///
/// ```rust
/// use bindery::BindingKey;
///
/// struct Person;
///
/// let plain = BindingKey::of::<Person>();
/// let named = BindingKey::of::<Person>().with_tag("named");
/// let factory = BindingKey::of::<Person>().with_argument::<String>();
///
/// assert_ne!(plain, named);
/// assert_ne!(plain, factory);
/// assert_eq!(named.to_string(), r#"bind<Person>(tag = "named")"#);
/// assert_eq!(factory.to_string(), "bind<Person>() with factory<String>");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    bound: TypeDescriptor,
    tag: Option<Tag>,
    argument: Option<TypeDescriptor>,
}

impl BindingKey {
    /// Untagged, argument-less key for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            bound: TypeDescriptor::of::<T>(),
            tag: None,
            argument: None,
        }
    }

    /// Same key with `tag`.
    #[inline]
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Same key, taking an argument of type `A`.
    #[inline]
    pub fn with_argument<A: ?Sized + 'static>(mut self) -> Self {
        self.argument = Some(TypeDescriptor::of::<A>());
        self
    }

    #[inline]
    pub fn bound_type(&self) -> &TypeDescriptor {
        &self.bound
    }

    #[inline]
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    #[inline]
    pub fn argument_type(&self) -> Option<&TypeDescriptor> {
        self.argument.as_ref()
    }

    /// Whether this key names a binding that takes an argument.
    #[inline]
    pub fn is_factory(&self) -> bool {
        self.argument.is_some()
    }

    /// Whether `other` names the same type and tag, whatever its argument.
    #[inline]
    pub(crate) fn same_capability(&self, other: &BindingKey) -> bool {
        self.bound == other.bound && self.tag == other.tag
    }
}

impl fmt::Debug for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bind<{}>(", self.bound)?;
        if let Some(tag) = &self.tag {
            write!(f, "tag = {:?}", tag.as_str())?;
        }
        f.write_str(")")?;
        if let Some(argument) = &self.argument {
            write!(f, " with factory<{}>", argument)?;
        }
        Ok(())
    }
}

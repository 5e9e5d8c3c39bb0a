//! Error types for binding registration and resolution

use crate::context::render_loop;
use crate::key::{BindingKey, TypeDescriptor};
use std::fmt;
use thiserror::Error;

/// Errors raised while declaring bindings or resolving them.
///
/// Every variant carries the offending key(s) so callers can branch on the
/// failure kind and render a precise diagnostic.
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No usable binding exists for the requested key and calling convention
    #[error("No binding found for {key}{reason}")]
    NotFound {
        key: BindingKey,
        reason: NotFoundReason,
    },

    /// A key was requested while already under construction in the same
    /// resolution. `path` runs from the first occurrence back to the
    /// recurrence, so it starts and ends with the same key.
    #[error("{}", render_loop(.path))]
    DependencyLoop { path: Vec<BindingKey> },

    /// The same key was declared twice in one container
    #[error("Binding {key} is already declared in this container")]
    DuplicateBinding { key: BindingKey },

    /// A declaration broke the override rules of its container
    #[error("Binding {key} {reason}")]
    OverwritingBinding {
        key: BindingKey,
        reason: OverrideViolation,
    },

    /// A binding that can never be meaningfully retrieved
    #[error("Invalid binding {key}: {reason}")]
    InvalidArgument { key: BindingKey, reason: String },

    /// A factory failed for reasons of its own
    #[error("Failed to create {type_name}: {reason}")]
    CreationFailed {
        type_name: &'static str,
        reason: String,
    },

    /// Internal error
    #[error("Internal DI error: {0}")]
    Internal(String),
}

/// Why a lookup produced [`DiError::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundReason {
    /// Nothing is bound to this type and tag anywhere in the container chain.
    NoBinding,
    /// The type and tag are bound, but with a different calling convention
    /// (a factory requested as a provider, or the reverse).
    KindMismatch { registered: BindingKey },
    /// The binding is scoped and the resolution carried no context of the
    /// type its scope expects.
    MissingContext { expected: TypeDescriptor },
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBinding => Ok(()),
            Self::KindMismatch { registered } => {
                write!(f, " (a binding of another kind exists: {registered})")
            }
            Self::MissingContext { expected } => {
                write!(f, " (scoped binding needs a `{expected}` context)")
            }
        }
    }
}

/// Which override rule a declaration broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideViolation {
    /// The key exists in a parent container and overriding was not permitted.
    NotPermitted,
    /// The declaration was marked as an override but nothing is bound to override.
    NothingToOverride,
}

impl fmt::Display for OverrideViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPermitted => f.write_str(
                "overrides a parent binding; declare it as an override or allow silent overrides",
            ),
            Self::NothingToOverride => f.write_str("must override an existing binding"),
        }
    }
}

impl DiError {
    /// Create a NotFound error with no binding at all for `key`
    #[inline]
    pub fn not_found(key: BindingKey) -> Self {
        Self::NotFound {
            key,
            reason: NotFoundReason::NoBinding,
        }
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed<T: ?Sized + 'static>(reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Whether this is a NotFound for `key` itself with nothing bound.
    ///
    /// Used by `try_get` to tell an absent binding from a failed one.
    #[inline]
    pub fn is_unbound(&self, key: &BindingKey) -> bool {
        matches!(
            self,
            Self::NotFound { key: missing, reason: NotFoundReason::NoBinding } if missing == key
        )
    }

    /// The cycle path of a [`DiError::DependencyLoop`].
    #[inline]
    pub fn loop_path(&self) -> Option<&[BindingKey]> {
        match self {
            Self::DependencyLoop { path } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Person;

    #[test]
    fn test_not_found_message() {
        let err = DiError::not_found(BindingKey::of::<Person>().with_tag("y"));
        assert_eq!(err.to_string(), r#"No binding found for bind<Person>(tag = "y")"#);
    }

    #[test]
    fn test_kind_mismatch_message() {
        let err = DiError::NotFound {
            key: BindingKey::of::<Person>(),
            reason: NotFoundReason::KindMismatch {
                registered: BindingKey::of::<Person>().with_argument::<String>(),
            },
        };
        assert_eq!(
            err.to_string(),
            "No binding found for bind<Person>() (a binding of another kind exists: bind<Person>() with factory<String>)"
        );
    }

    #[test]
    fn test_is_unbound_only_matches_own_key() {
        let key = BindingKey::of::<Person>();
        let other = BindingKey::of::<String>();

        assert!(DiError::not_found(key.clone()).is_unbound(&key));
        assert!(!DiError::not_found(other).is_unbound(&key));

        let mismatch = DiError::NotFound {
            key: key.clone(),
            reason: NotFoundReason::KindMismatch {
                registered: key.clone().with_argument::<u8>(),
            },
        };
        assert!(!mismatch.is_unbound(&key));
    }

    #[test]
    fn test_override_messages() {
        let err = DiError::OverwritingBinding {
            key: BindingKey::of::<Person>(),
            reason: OverrideViolation::NothingToOverride,
        };
        assert_eq!(
            err.to_string(),
            "Binding bind<Person>() must override an existing binding"
        );
    }
}

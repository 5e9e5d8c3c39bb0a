//! Binding registry
//!
//! Ordered, append-only storage of one container's bindings. The registry is
//! filled while the container is being built and never mutated afterwards,
//! so lookups need no locking.

use crate::binding::Binding;
use crate::error::{DiError, Result};
use crate::key::BindingKey;
use ahash::RandomState;
use std::collections::HashMap;

/// Bindings of one container, in registration order.
#[derive(Default)]
pub struct BindingRegistry {
    bindings: Vec<Binding>,
    index: HashMap<BindingKey, usize, RandomState>,
}

impl BindingRegistry {
    /// Create an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `binding`.
    ///
    /// A binding whose key is already present is rejected with
    /// [`DiError::DuplicateBinding`] unless `allow_replace` is set, in which
    /// case it takes the old binding's place (and position).
    pub fn register(&mut self, binding: Binding, allow_replace: bool) -> Result<()> {
        match self.index.get(binding.key()) {
            Some(&position) if allow_replace => {
                self.bindings[position] = binding;
                Ok(())
            }
            Some(_) => Err(DiError::DuplicateBinding {
                key: binding.key().clone(),
            }),
            None => {
                self.index.insert(binding.key().clone(), self.bindings.len());
                self.bindings.push(binding);
                Ok(())
            }
        }
    }

    /// Binding registered under exactly `key`.
    #[inline]
    pub fn lookup(&self, key: &BindingKey) -> Option<&Binding> {
        self.index.get(key).map(|&position| &self.bindings[position])
    }

    /// A binding for the same type and tag as `key`, whatever its argument type.
    ///
    /// Only used to explain a failed exact lookup, so a scan is fine.
    pub fn lookup_ignoring_argument(&self, key: &BindingKey) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|binding| binding.key().same_capability(key))
    }

    #[inline]
    pub fn contains(&self, key: &BindingKey) -> bool {
        self.index.contains_key(key)
    }

    /// Bindings in registration order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.bindings.iter()).finish()
    }
}

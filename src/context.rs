//! Resolution context and dependency loop detection
//!
//! Every top-level resolve call owns one [`ResolutionContext`]: the stack of
//! keys currently under construction. Recursive resolutions triggered by
//! factories push onto the same stack, so a key reappearing while still on
//! it is a cycle. The reported path is cut from the live stack at the moment
//! of detection, which keeps it in step with the actual recursion.

use crate::error::{DiError, Result};
use crate::key::BindingKey;
use std::cell::RefCell;
use std::fmt::Write;

#[cfg(feature = "logging")]
use tracing::debug;

/// Stack of keys being constructed by one top-level resolution.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    stack: RefCell<Vec<BindingKey>>,
}

impl ResolutionContext {
    /// Fresh, empty context.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `key`, failing with [`DiError::DependencyLoop`] if it is already
    /// being constructed. The returned frame pops the key when dropped, on
    /// success, error and unwind alike.
    pub(crate) fn enter(&self, key: &BindingKey) -> Result<Frame<'_>> {
        let mut stack = self.stack.borrow_mut();

        if let Some(first) = stack.iter().position(|active| active == key) {
            let mut path = stack[first..].to_vec();
            path.push(key.clone());

            #[cfg(feature = "logging")]
            debug!(
                target: "bindery",
                key = %key,
                loop_len = path.len() - 1,
                "Dependency loop detected"
            );

            return Err(DiError::DependencyLoop { path });
        }

        stack.push(key.clone());
        Ok(Frame { context: self })
    }

    /// Number of keys currently under construction.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Snapshot of the keys under construction, outermost first.
    pub fn stack(&self) -> Vec<BindingKey> {
        self.stack.borrow().clone()
    }
}

/// One active entry of a [`ResolutionContext`].
pub(crate) struct Frame<'a> {
    context: &'a ResolutionContext,
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.context.stack.borrow_mut().pop();
    }
}

/// Render a loop path as a box-drawn diagram.
///
/// The first key sits on its own line, each dependency is indented one step
/// further, and the closing bar links the last entry back to the first.
pub(crate) fn render_loop(path: &[BindingKey]) -> String {
    let mut out = String::from("Dependency recursion:\n");

    for (index, key) in path.iter().enumerate() {
        out.push_str("  ");
        match index {
            0 => out.push_str("   "),
            1 => out.push_str("  ╔╩>"),
            _ => {
                out.push_str("  ║");
                out.push_str(&"  ".repeat(index - 1));
                out.push_str("╚>");
            }
        }
        let _ = writeln!(out, "{key}");
    }

    out.push_str("    ╚");
    out.push_str(&"══".repeat(path.len().saturating_sub(1)));
    out.push('╝');
    out
}

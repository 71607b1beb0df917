//! Imperative references to nodes in a view, set once the binding that owns them runs.

use std::fmt;

use wisteria_reactive::{create_signal, Signal};

use crate::generic_node::GenericNode;

/// A reference to a [`GenericNode`], settable once by whatever binding creates the node and
/// readable (reactively) afterwards.
pub struct NodeRef<G: GenericNode>(Signal<Option<G>>);

impl<G: GenericNode> NodeRef<G> {
    /// Creates an unset node ref, scoped to the current reactive owner.
    pub fn new() -> Self {
        Self(create_signal(None))
    }

    /// Gets the node. Tracks the ref, so an effect reading it re-runs once the ref is set.
    ///
    /// # Panics
    /// Panics if the node ref has not been set yet. Reading a ref is typically only meaningful
    /// inside `on_mount`, after the node it refers to has been created.
    #[track_caller]
    pub fn get(&self) -> G {
        self.try_get().expect("NodeRef is not set")
    }

    /// Tries to get the node, returning `None` if it has not been set yet.
    pub fn try_get(&self) -> Option<G> {
        self.0.get_clone()
    }

    /// Sets the node ref. Called once by the binding that creates the referenced node.
    pub fn set(&self, node: G) {
        self.0.set(Some(node));
    }
}

impl<G: GenericNode> Default for NodeRef<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GenericNode> Clone for NodeRef<G> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<G: GenericNode> Copy for NodeRef<G> {}

impl<G: GenericNode> fmt::Debug for NodeRef<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.0.get_clone()).finish()
    }
}

impl<G: GenericNode> PartialEq for NodeRef<G> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<G: GenericNode> Eq for NodeRef<G> {}

#[cfg(test)]
mod tests {
    use wisteria_reactive::create_root;

    use super::*;
    use crate::test_support::StringNode;

    #[test]
    fn unset_ref_has_no_node() {
        let _ = create_root(|| {
            let node_ref: NodeRef<StringNode> = NodeRef::new();
            assert_eq!(node_ref.try_get(), None);
        });
    }

    #[test]
    fn set_ref_is_readable() {
        let _ = create_root(|| {
            let node_ref: NodeRef<StringNode> = NodeRef::new();
            let node = StringNode::new("div");
            node_ref.set(node.clone());
            assert_eq!(node_ref.get(), node);
        });
    }
}

//! The reactive node arena key type and the per-node record stored in a [`Root`](crate::Root).

use std::any::{Any, TypeId};

use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::error::{ControlError, SuspenseToken};
use crate::Root;

new_key_type! {
    /// A handle to a node stored in a [`Root`](crate::Root)'s arena.
    ///
    /// Signals, computeds, effects, and root contexts are all nodes; the arena erases the
    /// distinction so the scheduler can treat them uniformly for dependency tracking and dirty
    /// propagation.
    pub struct NodeId;
}

/// Whether a node's cached value is up to date with its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    /// Up to date; no recomputation needed.
    Clean,
    /// A dependency might have changed (reached through a `Memo` whose own freshness hasn't
    /// been checked yet). Must walk `dependencies` to find out before doing anything else.
    Check,
    /// A direct dependency is known to have changed; recomputation is unavoidable.
    Dirty,
}

/// What kind of reactive primitive a node represents. Only affects how the scheduler invokes
/// the node's `callback` and what lifecycle lists are meaningful on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// A plain signal: no `callback`, written to directly.
    Signal,
    /// A computed/memo: `callback` recomputes the cached value and reports whether it changed.
    Memo,
    /// An effect: `callback` re-runs the body for its side effect; the return value is ignored.
    Effect,
    /// A root/owner context: never dirtied directly, just a lifecycle anchor.
    Root,
}

/// A reactive node inside the reactive graph arena.
pub(crate) struct ReactiveNode {
    pub kind: NodeKind,
    /// Value of the node, if any. Signals and memos hold one; plain effects don't.
    pub value: Option<Box<dyn Any>>,
    /// Callback invoked to bring this node up to date. Returns whether the externally visible
    /// value changed (always `true` for effects, which have no dependents to notify).
    pub callback: Option<Box<dyn FnMut(&mut Box<dyn Any>) -> bool>>,
    /// Topological level: `1 + max(dependency levels)`. The scheduler drains the pending queue
    /// in ascending level order so no node observes a dependency mid-update.
    pub level: u32,
    /// Nodes owned by this node (child roots, signals, effects created while this node was
    /// current). Disposed before this node's own cleanups.
    pub children: Vec<NodeId>,
    /// The owning node, or `None` for the top-level root.
    pub parent: Option<NodeId>,
    pub dependents: SmallVec<[NodeId; 1]>,
    pub dependencies: SmallVec<[NodeId; 1]>,
    /// Cleanups registered by `on_cleanup` during the last run of this node's body. Run in
    /// reverse before the next run, and again at dispose.
    pub cleanups: Vec<Box<dyn FnOnce()>>,
    /// Callbacks registered by `on_destroy`. Run in reverse, after `cleanups`, only at dispose.
    pub destroy_list: Vec<Box<dyn FnOnce()>>,
    /// Callbacks registered by `on_mount`, drained once by `flush_on_mount`.
    pub on_mount: Vec<Box<dyn FnOnce()>>,
    pub context: Vec<(TypeId, Box<dyn Any>)>,
    pub error_handlers: Vec<Box<dyn Fn(&ControlError) -> bool>>,
    pub suspense_handlers: Vec<Box<dyn Fn(SuspenseToken) -> bool>>,
    pub state: NodeState,
    /// Monotonic creation order, used to break ties between same-level nodes in a flush: per
    /// the ordering guarantee, an earlier-created node runs before a later one when neither
    /// depends on the other.
    pub seq: u64,
    #[cfg(debug_assertions)]
    pub created_at: &'static std::panic::Location<'static>,
}

impl ReactiveNode {
    pub fn new(kind: NodeKind, parent: Option<NodeId>, seq: u64) -> Self {
        ReactiveNode {
            kind,
            value: None,
            callback: None,
            level: 0,
            children: Vec::new(),
            parent,
            dependents: SmallVec::new(),
            dependencies: SmallVec::new(),
            cleanups: Vec::new(),
            destroy_list: Vec::new(),
            on_mount: Vec::new(),
            context: Vec::new(),
            error_handlers: Vec::new(),
            suspense_handlers: Vec::new(),
            state: NodeState::Clean,
            seq,
            #[cfg(debug_assertions)]
            created_at: std::panic::Location::caller(),
        }
    }
}

/// An owning handle to a node, used by [`create_root`](crate::create_root) and keyed blocks.
#[derive(Debug, Clone, Copy)]
pub struct NodeHandle(pub(crate) NodeId);

impl NodeId {
    /// Destroys this node: disposes children first (deepest first), then runs this node's own
    /// cleanups (reverse order) followed by its destroy list (reverse order), then removes it
    /// from the arena. Idempotent — disposing an already-removed node is a no-op.
    pub fn dispose(self) {
        let root = Root::global();
        if !root.nodes.borrow().contains_key(self) {
            return;
        }
        self.dispose_children();

        let cleanups = std::mem::take(&mut root.nodes.borrow_mut()[self].cleanups);
        let cleanup_err = crate::error::run_cleanups_collecting_error(cleanups);
        let destroy_list = std::mem::take(&mut root.nodes.borrow_mut()[self].destroy_list);
        let destroy_err = crate::error::run_cleanups_collecting_error(destroy_list);
        let parent = root.nodes.borrow().get(self).and_then(|n| n.parent);

        root.remove_node_edges(self);
        root.nodes.borrow_mut().remove(self);

        // The first cleanup-kind error observed (cleanups run before the destroy list, so a
        // cleanup failure always predates a destroy-list one) is re-raised once every callback
        // has had a chance to run, routed from the nearest surviving ancestor since `self` no
        // longer exists in the arena.
        if let Some(err) = cleanup_err.or(destroy_err) {
            if let Some(parent) = parent {
                root.route_control(parent, crate::error::Control::Error(err));
            }
        }
    }

    /// Disposes every child of this node, deepest first, without touching this node itself.
    pub fn dispose_children(self) {
        let root = Root::global();
        let children = match root.nodes.borrow_mut().get_mut(self) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            child.dispose();
        }
    }

    pub(crate) fn is_alive(self) -> bool {
        Root::global().nodes.borrow().contains_key(self)
    }
}

impl NodeHandle {
    pub fn dispose(self) {
        self.0.dispose();
    }

    pub fn is_alive(self) -> bool {
        self.0.is_alive()
    }
}

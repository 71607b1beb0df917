//! The [`Root`]: the scheduler, dependency graph arena, and lifecycle owner all in one place.
//!
//! A single-threaded host runs exactly one `Root` per reactive tree. It owns the node arena, the
//! current-owner/current-tracker cursors used for dependency recording, and the pending-update
//! queue the microtask flush drains.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::config::CycleGuardConfig;
use crate::error::{Control, ControlError, SuspenseToken};
use crate::node::{NodeId, NodeKind, NodeState, ReactiveNode};

thread_local! {
    static GLOBAL_ROOT: RefCell<Option<Rc<Root>>> = RefCell::new(None);
}

/// Records which nodes were read while tracking was active, so the caller can wire them up as
/// dependencies of whatever node is being (re)computed.
#[derive(Default)]
pub(crate) struct DependencyTracker {
    pub dependencies: SmallVec<[NodeId; 4]>,
}

impl DependencyTracker {
    /// Wires every tracked dependency to `dependent`, replacing its previous dependency set.
    /// Stale edges (dependencies no longer read) are removed from the old deps' dependent sets
    /// first, satisfying the "dependency tightness" testable property.
    pub fn create_dependency_link(&self, root: &Root, dependent: NodeId) {
        let mut nodes = root.nodes.borrow_mut();
        let old_deps = std::mem::replace(
            &mut nodes[dependent].dependencies,
            self.dependencies.clone(),
        );
        for old in old_deps {
            if let Some(node) = nodes.get_mut(old) {
                node.dependents.retain(|&d| d != dependent);
            }
        }
        let mut new_level = 0;
        for &dep in &self.dependencies {
            if let Some(node) = nodes.get_mut(dep) {
                if !node.dependents.contains(&dependent) {
                    node.dependents.push(dependent);
                }
                new_level = new_level.max(node.level + 1);
            }
        }
        nodes[dependent].level = new_level;
    }
}

/// The reactive graph arena plus scheduler state. See the module docs.
pub struct Root {
    pub(crate) nodes: RefCell<SlotMap<NodeId, ReactiveNode>>,
    root_node: NodeId,
    /// The node that owns anything created right now (child signals/effects/roots attach here).
    pub(crate) current_node: Cell<NodeId>,
    /// Set while a memo/effect body is being (re)computed; tracked reads push into it. `None`
    /// means reads are untracked (e.g. inside `untrack`, or while constructing a keyed block
    /// with the active subscriber explicitly cleared).
    pub(crate) tracker: RefCell<Option<DependencyTracker>>,
    /// Pending normal-priority nodes, bucketed by topological level, drained ascending.
    pending: RefCell<BTreeMap<u32, Vec<NodeId>>>,
    /// Pending transition-priority nodes; drained only after `pending` is fully empty.
    pending_transition: RefCell<BTreeMap<u32, Vec<NodeId>>>,
    in_transition: Cell<bool>,
    batch_depth: Cell<u32>,
    seq_counter: Cell<u64>,
    flushing: Cell<bool>,
    pub(crate) cycle_guard: CycleGuardConfig,
    effect_runs_this_flush: RefCell<BTreeMap<NodeId, u32>>,
    flush_cycles_this_microtask: Cell<u32>,
    /// How many nested [`Root::run_in_node`] calls are currently on the stack; bounded by
    /// `cycle_guard.max_root_reentrant_depth`.
    reentrant_depth: Cell<u32>,
    /// One sample per completed flush: whether that flush's busiest node got within
    /// `cycle_guard.high_usage_ratio` of `max_effect_runs_per_flush`. Bounded to
    /// `cycle_guard.window_size` entries.
    usage_window: RefCell<VecDeque<bool>>,
    /// Whether the sustained-high-usage warning already fired for the current guarded period;
    /// reset once the window's ratio drops back below the threshold, so the warning fires once
    /// per spike rather than once per flush.
    high_usage_warned: Cell<bool>,
}

/// An owning handle returned by [`create_root`], the public entry point for a fresh lifecycle
/// scope. Dropping the handle does *not* dispose the root; call [`RootHandle::dispose`]
/// explicitly (mirrors `create_root`'s explicit teardown contract in spec §4.4).
pub struct RootHandle {
    pub(crate) node: NodeId,
}

impl RootHandle {
    /// Runs cleanups (reverse order), then the destroy list (reverse order), depth-first through
    /// every child root first. Idempotent.
    pub fn dispose(self) {
        self.node.dispose();
    }

    /// Re-enters this root as current and runs `f`, restoring the previous current node after.
    pub fn run_in<T>(&self, f: impl FnOnce() -> T) -> T {
        Root::global().run_in_node(self.node, f)
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Dequeues and invokes every `on_mount` callback registered while building this root. Left
    /// unfired by [`create_root_deferred`] so a caller that still needs to insert this root's
    /// nodes into a tree can do so before mount callbacks observe them. [`create_root`] calls this
    /// immediately, for callers that don't need the gap.
    pub fn flush_on_mount(&self) {
        Root::global().flush_on_mount(self.node);
    }
}

impl Root {
    /// Returns the thread's global root, lazily creating one on first use. A host that wants
    /// multiple independent trees should call [`Root::set_global`] with its own instance.
    pub fn global() -> Rc<Root> {
        GLOBAL_ROOT.with(|g| {
            let mut slot = g.borrow_mut();
            if slot.is_none() {
                *slot = Some(Root::new_static());
            }
            slot.as_ref().unwrap().clone()
        })
    }

    pub fn set_global(root: Rc<Root>) {
        GLOBAL_ROOT.with(|g| *g.borrow_mut() = Some(root));
    }

    /// Tears down the thread's global root reference, if any exists.
    pub fn reinit() {
        GLOBAL_ROOT.with(|g| *g.borrow_mut() = None);
    }

    fn new_static() -> Rc<Root> {
        let mut nodes = SlotMap::default();
        let root_node = nodes.insert(ReactiveNode::new(NodeKind::Root, None, 0));
        Rc::new(Root {
            nodes: RefCell::new(nodes),
            root_node,
            current_node: Cell::new(root_node),
            tracker: RefCell::new(None),
            pending: RefCell::new(BTreeMap::new()),
            pending_transition: RefCell::new(BTreeMap::new()),
            in_transition: Cell::new(false),
            batch_depth: Cell::new(0),
            seq_counter: Cell::new(1),
            flushing: Cell::new(false),
            cycle_guard: CycleGuardConfig::default(),
            effect_runs_this_flush: RefCell::new(BTreeMap::new()),
            flush_cycles_this_microtask: Cell::new(0),
            reentrant_depth: Cell::new(0),
            usage_window: RefCell::new(VecDeque::new()),
            high_usage_warned: Cell::new(false),
        })
    }

    pub(crate) fn next_seq(&self) -> u64 {
        let seq = self.seq_counter.get();
        self.seq_counter.set(seq + 1);
        seq
    }

    /// Creates a new node owned by the current node, without making it current.
    pub(crate) fn create_node(&self, kind: NodeKind) -> NodeId {
        let parent = self.current_node.get();
        let seq = self.next_seq();
        let id = self
            .nodes
            .borrow_mut()
            .insert(ReactiveNode::new(kind, Some(parent), seq));
        if let Some(parent_node) = self.nodes.borrow_mut().get_mut(parent) {
            parent_node.children.push(id);
        }
        id
    }

    /// Runs `f` with `node` set as current (the owner for anything `f` creates), restoring the
    /// previous current node afterwards even if `f` panics. This is the `push_root`/`pop_root`
    /// pair from spec §5/§7: every nested call deepens the cycle guard's reentrant-depth count,
    /// restored on the way back out regardless of unwinding.
    pub(crate) fn run_in_node<T>(&self, node: NodeId, f: impl FnOnce() -> T) -> T {
        let prev = self.current_node.replace(node);
        let depth = self.reentrant_depth.get() + 1;
        self.reentrant_depth.set(depth);
        let _guard = ScopeGuard(Some(|| {
            self.current_node.set(prev);
            self.reentrant_depth.set(self.reentrant_depth.get() - 1);
        }));
        if depth > self.cycle_guard.max_root_reentrant_depth {
            if self.cycle_guard.dev_mode {
                panic!(
                    "cycle guard: current-node reentry depth exceeded max_root_reentrant_depth ({})",
                    self.cycle_guard.max_root_reentrant_depth
                );
            }
            #[cfg(feature = "trace")]
            tracing::warn!(
                "cycle guard: current-node reentry depth {depth} exceeded max_root_reentrant_depth ({})",
                self.cycle_guard.max_root_reentrant_depth
            );
        }
        f()
    }

    /// Runs `f` with a fresh dependency tracker installed, returning `f`'s result alongside the
    /// tracker so the caller can link the recorded dependencies to whichever node it likes.
    pub(crate) fn tracked_scope<T>(&self, f: impl FnOnce() -> T) -> (T, DependencyTracker) {
        let prev = self.tracker.replace(Some(DependencyTracker::default()));
        let result = f();
        let tracker = self.tracker.replace(prev).unwrap();
        (result, tracker)
    }

    /// Runs `f` with tracking suppressed entirely: reads inside `f` record no dependencies,
    /// regardless of whether an outer tracker is active. This is `untrack`, and it's also what
    /// the keyed-list reconciler uses so a block's inner effects aren't swallowed as
    /// dependencies of the outer reconcile effect.
    pub(crate) fn untracked_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        let prev = self.tracker.replace(None);
        let result = f();
        self.tracker.replace(prev);
        result
    }

    /// Records a read of `dep` against the currently active tracker, if any.
    pub(crate) fn track_read(&self, dep: NodeId) {
        if let Some(tracker) = self.tracker.borrow_mut().as_mut() {
            if !tracker.dependencies.contains(&dep) {
                tracker.dependencies.push(dep);
            }
        }
    }

    /// Marks every direct dependent of a changed `node` (a written signal, or a memo found to
    /// have actually changed) `Dirty`, and every dependent beyond that `Check` — "might be
    /// stale, ask `dependencies` before assuming so". Only effects are enqueued for the next
    /// flush; a dirty memo just sits on its own state until something reads it. Does not run
    /// anything: flush is always deferred to [`Root::end_batch`]/[`Root::schedule_flush`] so
    /// writes inside a batch coalesce.
    pub(crate) fn mark_dependents_dirty(&self, node: NodeId) {
        let dependents = {
            let nodes = self.nodes.borrow();
            nodes.get(node).map(|n| n.dependents.clone()).unwrap_or_default()
        };
        for dep in dependents {
            self.mark_node(dep, NodeState::Dirty);
        }
        self.schedule_flush();
    }

    /// Applies `new_state` to `node` (a no-op on anything but a `Memo`/`Effect`) and, the first
    /// time this node leaves `Clean`, propagates `Check` to its own dependents in turn. `Dirty`
    /// always wins over `Check`; re-marking an already-`Dirty` or already-equally-marked node is
    /// a no-op, which is what keeps this from looping on a dependency cycle.
    fn mark_node(&self, node: NodeId, new_state: NodeState) {
        let (kind, level, cur_state) = {
            let nodes = self.nodes.borrow();
            match nodes.get(node) {
                Some(n) => (n.kind, n.level, n.state),
                None => return,
            }
        };
        if !matches!(kind, NodeKind::Memo | NodeKind::Effect) {
            return;
        }
        if cur_state == NodeState::Dirty || cur_state == new_state {
            return;
        }
        self.nodes.borrow_mut()[node].state = new_state;
        if kind == NodeKind::Effect {
            self.enqueue(node, level);
        }
        let dependents = self.nodes.borrow()[node].dependents.clone();
        for dep in dependents {
            self.mark_node(dep, NodeState::Check);
        }
    }

    /// Brings a `Check`/`Dirty` memo up to date, recursing into its own dependencies first when
    /// it's only `Check`. No-op (returns `false`) for anything already `Clean`, or that isn't a
    /// `Memo` at all (a plain signal or an effect, neither of which is ever itself stale in a way
    /// this needs to resolve). This is the pull half of the scheduler: nothing calls this during
    /// a flush drain except an effect checking whether it really needs to run; everything else
    /// reaches it lazily through [`crate::signals::ReadSignal::with_untracked`].
    pub(crate) fn ensure_updated(&self, node: NodeId) -> bool {
        let (kind, state) = {
            let nodes = self.nodes.borrow();
            match nodes.get(node) {
                Some(n) => (n.kind, n.state),
                None => return false,
            }
        };
        if kind != NodeKind::Memo || state == NodeState::Clean {
            return false;
        }
        if state == NodeState::Check && !self.dependencies_changed(node) {
            self.nodes.borrow_mut()[node].state = NodeState::Clean;
            return false;
        }
        self.recompute_memo(node)
    }

    /// Whether any of `node`'s dependencies actually changed, resolving each one (recursively,
    /// for memo dependencies) along the way.
    fn dependencies_changed(&self, node: NodeId) -> bool {
        let deps = self
            .nodes
            .borrow()
            .get(node)
            .map(|n| n.dependencies.clone())
            .unwrap_or_default();
        let mut changed = false;
        for dep in deps {
            if self.ensure_updated(dep) {
                changed = true;
            }
        }
        changed
    }

    /// Re-runs a memo's callback unconditionally and reports whether its value changed under its
    /// equality predicate. Shares the dispose-children/run-cleanups/invoke-callback shape of
    /// [`Root::run_node_update`]; kept separate because memos recompute from an arbitrary read
    /// site, never from the flush queue.
    fn recompute_memo(&self, node: NodeId) -> bool {
        node.dispose_children();
        let cleanups = std::mem::take(&mut self.nodes.borrow_mut()[node].cleanups);
        if let Some(err) = crate::error::run_cleanups_collecting_error(cleanups) {
            self.route_control(node, Control::Error(err));
        }

        let prev_owner = self.current_node.replace(node);
        let mut callback = self.nodes.borrow_mut()[node].callback.take();
        let changed = if let Some(cb) = callback.as_mut() {
            let mut value = self.nodes.borrow_mut()[node]
                .value
                .take()
                .unwrap_or_else(|| Box::new(()) as Box<dyn std::any::Any>);
            let changed = cb(&mut value);
            self.nodes.borrow_mut()[node].value = Some(value);
            changed
        } else {
            true
        };
        self.nodes.borrow_mut()[node].callback = callback;
        self.current_node.set(prev_owner);
        self.nodes.borrow_mut()[node].state = NodeState::Clean;
        changed
    }

    fn enqueue(&self, node: NodeId, level: u32) {
        let queue = if self.in_transition.get() {
            &self.pending_transition
        } else {
            &self.pending
        };
        let mut queue = queue.borrow_mut();
        let bucket = queue.entry(level).or_default();
        if !bucket.contains(&node) {
            bucket.push(node);
        }
    }

    /// Requests a flush. A host integration typically calls this from its own microtask hook;
    /// with no batch open it drains synchronously right away. Inside a batch this is a no-op:
    /// the outer [`Root::end_batch`] triggers the flush exactly once.
    pub(crate) fn schedule_flush(&self) {
        if self.batch_depth.get() == 0 {
            self.run_flush();
        }
    }

    pub fn has_pending_work(&self) -> bool {
        !self.pending.borrow().is_empty() || !self.pending_transition.borrow().is_empty()
    }

    pub(crate) fn start_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    pub(crate) fn end_batch(&self) {
        let depth = self.batch_depth.get() - 1;
        self.batch_depth.set(depth);
        if depth == 0 {
            self.run_flush();
        }
    }

    /// Drains the pending queue to a fixed point: all normal-priority work first, then
    /// transition-priority, re-checking after each drain in case a rerun enqueues more work.
    /// Guarded against runaway loops in development.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub(crate) fn run_flush(&self) {
        if self.flushing.get() || self.batch_depth.get() > 0 {
            return;
        }
        self.flushing.set(true);
        self.flush_cycles_this_microtask.set(0);
        self.effect_runs_this_flush.borrow_mut().clear();

        loop {
            if !self.pending.borrow().is_empty() {
                self.drain_queue(&self.pending);
            } else if !self.pending_transition.borrow().is_empty() {
                self.in_transition.set(true);
                self.drain_queue(&self.pending_transition);
                self.in_transition.set(false);
            } else {
                break;
            }
            self.flush_cycles_this_microtask
                .set(self.flush_cycles_this_microtask.get() + 1);
            if self.flush_cycles_this_microtask.get()
                > self.cycle_guard.max_flush_cycles_per_microtask
            {
                #[cfg(feature = "trace")]
                tracing::warn!("cycle guard: exceeded max_flush_cycles_per_microtask");
                break;
            }
        }

        self.record_usage_sample();
        self.flushing.set(false);
    }

    /// Samples this just-finished flush's busiest node against `high_usage_ratio`, folds it into
    /// the sliding `window_size`-entry window, and warns once per stretch of the window that
    /// stays over threshold (not once per flush in that stretch).
    fn record_usage_sample(&self) {
        let limit = self.cycle_guard.max_effect_runs_per_flush.max(1) as f32;
        let peak = self
            .effect_runs_this_flush
            .borrow()
            .values()
            .copied()
            .max()
            .unwrap_or(0) as f32;
        let sample_is_high = peak / limit >= self.cycle_guard.high_usage_ratio;

        let mut window = self.usage_window.borrow_mut();
        window.push_back(sample_is_high);
        while window.len() > self.cycle_guard.window_size.max(1) as usize {
            window.pop_front();
        }
        let high_count = window.iter().filter(|&&h| h).count();
        let window_ratio = high_count as f32 / window.len() as f32;

        if window_ratio >= self.cycle_guard.high_usage_ratio {
            if !self.high_usage_warned.get() {
                self.high_usage_warned.set(true);
                #[cfg(feature = "trace")]
                tracing::warn!(
                    "cycle guard: sustained high effect-run activity over the last {} flushes (ratio {window_ratio})",
                    window.len()
                );
            }
        } else {
            self.high_usage_warned.set(false);
        }
    }

    fn drain_queue(&self, queue: &RefCell<BTreeMap<u32, Vec<NodeId>>>) {
        // Ascending-level order guarantees a node's dependencies have already settled by the
        // time it runs. Same-level ties break by creation order (the ordering guarantee).
        let level = match queue.borrow().keys().next().copied() {
            Some(l) => l,
            None => return,
        };
        let mut bucket = queue.borrow_mut().remove(&level).unwrap_or_default();
        bucket.sort_by_key(|&id| self.nodes.borrow().get(id).map(|n| n.seq).unwrap_or(0));
        for node in bucket {
            self.run_node_update(node);
        }
    }

    /// Re-evaluates a single pending effect: if it was only reached through `Check` (a memo
    /// somewhere upstream, not a direct write), first resolves whether any dependency actually
    /// changed and bails out clean if not. Otherwise runs cleanups from its previous run,
    /// re-tracks dependencies, and invokes its callback. Only ever called with an `Effect` node —
    /// memos never enter the flush queue; they recompute lazily wherever
    /// [`crate::signals::ReadSignal::with_untracked`] finds them stale.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub(crate) fn run_node_update(&self, node: NodeId) {
        if !self.nodes.borrow().contains_key(node) {
            return;
        }
        let state = self.nodes.borrow()[node].state;
        if state == NodeState::Clean {
            return;
        }
        if state == NodeState::Check && !self.dependencies_changed(node) {
            self.nodes.borrow_mut()[node].state = NodeState::Clean;
            return;
        }

        {
            let mut count = self.effect_runs_this_flush.borrow_mut();
            let entry = count.entry(node).or_insert(0);
            *entry += 1;
            if *entry > self.cycle_guard.max_effect_runs_per_flush {
                #[cfg(feature = "trace")]
                tracing::warn!("cycle guard: node re-ran past max_effect_runs_per_flush");
                self.nodes.borrow_mut()[node].state = NodeState::Clean;
                return;
            }
        }

        // Dispose this node's children and run its cleanups before re-reading dependencies:
        // the lifecycle invariant that teardown happens before the new render.
        node.dispose_children();
        let cleanups = std::mem::take(&mut self.nodes.borrow_mut()[node].cleanups);
        if let Some(err) = crate::error::run_cleanups_collecting_error(cleanups) {
            self.route_control(node, Control::Error(err));
        }

        let prev_owner = self.current_node.replace(node);
        let mut callback = self.nodes.borrow_mut()[node].callback.take();
        if let Some(cb) = callback.as_mut() {
            let mut value = self.nodes.borrow_mut()[node]
                .value
                .take()
                .unwrap_or_else(|| Box::new(()) as Box<dyn std::any::Any>);
            cb(&mut value);
            self.nodes.borrow_mut()[node].value = Some(value);
        }
        self.nodes.borrow_mut()[node].callback = callback;
        self.current_node.set(prev_owner);
        self.nodes.borrow_mut()[node].state = NodeState::Clean;

        // Effects have no dependents of their own (nothing reads an effect's "value"), so there
        // is nothing left to propagate here.
    }

    pub(crate) fn remove_node_edges(&self, node: NodeId) {
        let (deps, dependents) = {
            let mut nodes = self.nodes.borrow_mut();
            let n = &mut nodes[node];
            (
                std::mem::take(&mut n.dependencies),
                std::mem::take(&mut n.dependents),
            )
        };
        let mut nodes = self.nodes.borrow_mut();
        for dep in deps {
            if let Some(n) = nodes.get_mut(dep) {
                n.dependents.retain(|&d| d != node);
            }
        }
        for dependent in dependents {
            if let Some(n) = nodes.get_mut(dependent) {
                n.dependencies.retain(|&d| d != node);
            }
        }
        if let Some(parent) = nodes.get(node).and_then(|n| n.parent) {
            if let Some(parent_node) = nodes.get_mut(parent) {
                parent_node.children.retain(|&c| c != node);
            }
        }
    }

    pub(crate) fn provide_context<T: 'static>(&self, node: NodeId, value: T) {
        let type_id = TypeId::of::<T>();
        let mut nodes = self.nodes.borrow_mut();
        let ctx = &mut nodes[node].context;
        if ctx.iter().any(|(t, _)| *t == type_id) {
            panic!("existing context with type exists already");
        }
        ctx.push((type_id, Box::new(value)));
    }

    pub(crate) fn try_use_context<T: Clone + 'static>(&self, node: NodeId) -> Option<T> {
        let type_id = TypeId::of::<T>();
        let mut current = Some(node);
        while let Some(n) = current {
            let nodes = self.nodes.borrow();
            let found = nodes
                .get(n)
                .and_then(|nd| nd.context.iter().find(|(t, _)| *t == type_id))
                .map(|(_, v)| v.downcast_ref::<T>().unwrap().clone());
            if found.is_some() {
                return found;
            }
            current = nodes.get(n).and_then(|nd| nd.parent);
        }
        None
    }

    /// Walks from `node` up through parents invoking registered error handlers; the first
    /// handler to return `true` stops propagation. Returns the error back if nothing handled it.
    pub(crate) fn propagate_error(
        &self,
        node: NodeId,
        error: ControlError,
    ) -> Result<(), ControlError> {
        let mut current = Some(node);
        while let Some(n) = current {
            let handler_count = self
                .nodes
                .borrow()
                .get(n)
                .map(|nd| nd.error_handlers.len())
                .unwrap_or(0);
            for i in 0..handler_count {
                let handled = {
                    let nodes = self.nodes.borrow();
                    nodes
                        .get(n)
                        .and_then(|nd| nd.error_handlers.get(i))
                        .map(|h| h(&error))
                };
                if handled == Some(true) {
                    return Ok(());
                }
            }
            current = self.nodes.borrow().get(n).and_then(|nd| nd.parent);
        }
        Err(error)
    }

    /// Walks from `node` up through parents invoking registered suspense handlers; the first
    /// handler to return `true` has acknowledged the token (it is responsible for swapping to a
    /// fallback and subscribing to resolution itself).
    pub(crate) fn propagate_suspense(
        &self,
        node: NodeId,
        token: SuspenseToken,
    ) -> Result<(), SuspenseToken> {
        let mut current = Some(node);
        while let Some(n) = current {
            let handler_count = self
                .nodes
                .borrow()
                .get(n)
                .map(|nd| nd.suspense_handlers.len())
                .unwrap_or(0);
            for i in 0..handler_count {
                let handled = {
                    let nodes = self.nodes.borrow();
                    nodes
                        .get(n)
                        .and_then(|nd| nd.suspense_handlers.get(i))
                        .map(|h| h(token.clone()))
                };
                if handled == Some(true) {
                    return Ok(());
                }
            }
            current = self.nodes.borrow().get(n).and_then(|nd| nd.parent);
        }
        Err(token)
    }

    /// Routes a [`Control`] value raised while running under `node` to the appropriate handler
    /// chain, re-raising to the host as a panic if nothing absorbs it.
    pub(crate) fn route_control(&self, node: NodeId, control: Control) {
        match control {
            Control::Error(e) => {
                if let Err(unhandled) = self.propagate_error(node, e) {
                    panic!("unhandled render error: {unhandled}");
                }
            }
            Control::Suspend(token) => {
                if let Err(unhandled) = self.propagate_suspense(node, token) {
                    panic!(
                        "unhandled suspense token (epoch {}) with no suspense boundary above",
                        unhandled.epoch()
                    );
                }
            }
        }
    }

    pub(crate) fn root_node(&self) -> NodeId {
        self.root_node
    }

    /// Dequeues and invokes every mount callback recorded on `node`.
    pub(crate) fn flush_on_mount(&self, node: NodeId) {
        let queue = match self.nodes.borrow_mut().get_mut(node) {
            Some(n) => std::mem::take(&mut n.on_mount),
            None => return,
        };
        for cb in queue {
            cb();
        }
    }
}

/// Minimal scope-guard so `run_in_node` restores state on panic without pulling in a crate.
struct ScopeGuard<F: FnOnce()>(Option<F>);
impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Creates a fresh root context as a child of the current node, runs `f` inside it, and returns
/// both `f`'s result and a handle to dispose the root later. Disposal is always explicit: dropping
/// the returned handle does nothing by itself.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_root<T>(f: impl FnOnce() -> T) -> (T, RootHandle) {
    let (result, handle) = create_root_deferred(f);
    handle.flush_on_mount();
    (result, handle)
}

/// Like [`create_root`], but leaves the new root's `on_mount` queue unflushed. A caller that still
/// needs to insert the new root's nodes into a tree (the binding layer, the keyed-list reconciler)
/// should do that first and only then call [`RootHandle::flush_on_mount`] — otherwise a mount
/// callback could observe a node that isn't attached to anything yet.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_root_deferred<T>(f: impl FnOnce() -> T) -> (T, RootHandle) {
    let root = Root::global();
    let node = root.create_node(NodeKind::Root);
    let result = root.run_in_node(node, f);
    (result, RootHandle { node })
}

/// Creates a child root context, runs `f` inside it, and returns a handle. Used internally by
/// the binding layer and reconciler for per-subtree/per-block ownership.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_child_scope<T>(f: impl FnOnce() -> T) -> (T, RootHandle) {
    create_root(f)
}

/// Attaches `f` to the current node's on-mount queue. Run once, after the creating frame returns
/// via [`Root::flush_on_mount`].
pub fn on_mount(f: impl FnOnce() + 'static) {
    let root = Root::global();
    let node = root.current_node.get();
    root.nodes.borrow_mut()[node].on_mount.push(Box::new(f));
}

/// Attaches `f` to the current node's cleanup bucket. Runs in reverse order the next time that
/// node reruns (if it's an effect/memo) or when it's disposed.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    let root = Root::global();
    let node = root.current_node.get();
    root.nodes.borrow_mut()[node].cleanups.push(Box::new(f));
}

/// Attaches `f` to the current node's destroy list. Runs in reverse order, after cleanups, only
/// when the node is disposed (never on an ordinary rerun).
pub fn on_destroy(f: impl FnOnce() + 'static) {
    let root = Root::global();
    let node = root.current_node.get();
    root.nodes.borrow_mut()[node]
        .destroy_list
        .push(Box::new(f));
}

/// Registers an error handler on the current node. See [`Root::propagate_error`].
pub fn register_error_handler(f: impl Fn(&ControlError) -> bool + 'static) {
    let root = Root::global();
    let node = root.current_node.get();
    root.nodes.borrow_mut()[node]
        .error_handlers
        .push(Box::new(f));
}

/// Registers a suspense handler on the current node. See [`Root::propagate_suspense`].
pub fn register_suspense_handler(f: impl Fn(SuspenseToken) -> bool + 'static) {
    let root = Root::global();
    let node = root.current_node.get();
    root.nodes.borrow_mut()[node]
        .suspense_handlers
        .push(Box::new(f));
}

/// Executes `f`, suppressing flush until it returns; exactly one flush runs after the outermost
/// batch completes, however many signals were written inside it.
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    let root = Root::global();
    root.start_batch();
    let result = f();
    root.end_batch();
    result
}

/// Evaluates `f` with the active subscriber cleared; signals read inside never join any
/// caller's dependency set.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    Root::global().untracked_scope(f)
}

/// Returns the node currently acting as owner (current root); used by the reconciler to key
/// per-block state off of it.
pub(crate) fn use_current_node() -> NodeId {
    Root::global().current_node.get()
}

/// Marks writes performed inside `f` as low-priority: they flush only after all normal-priority
/// work in the same cycle has run to completion.
pub fn start_transition(f: impl FnOnce()) {
    let root = Root::global();
    let was = root.in_transition.replace(true);
    f();
    root.in_transition.set(was);
    root.schedule_flush();
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::*;

    #[test]
    fn cleanup_runs_on_dispose() {
        let flag = Rc::new(Cell::new(false));
        let (_, handle) = create_root(|| {
            let flag = flag.clone();
            on_cleanup(move || flag.set(true));
        });
        handle.dispose();
        assert!(flag.get());
    }

    #[test]
    fn dispose_is_idempotent() {
        let (_, handle) = create_root(|| {});
        handle.dispose();
    }

    #[test]
    fn batch_coalesces_effect_runs() {
        let _ = create_root(|| {
            let a = create_signal(1);
            let b = create_signal(2);
            let runs = create_signal(0);
            create_effect(move || {
                a.track();
                b.track();
                runs.update(|r| *r += 1);
            });
            assert_eq!(runs.get(), 1);
            batch(|| {
                a.set(10);
                b.set(20);
            });
            assert_eq!(runs.get(), 2);
        });
    }

    #[test]
    fn panicking_cleanup_does_not_skip_the_rest() {
        let ran = Rc::new(RefCell::new(Vec::<&'static str>::new()));
        let (_, handle) = create_root(|| {
            let ran = ran.clone();
            on_cleanup(move || ran.borrow_mut().push("first"));
            let ran2 = ran.clone();
            on_cleanup(move || {
                ran2.borrow_mut().push("second");
                panic!("boom");
            });
            let ran3 = ran.clone();
            on_cleanup(move || ran3.borrow_mut().push("third"));
        });
        handle.dispose();
        // Cleanups run in reverse: third, second (panics), first. All three still ran.
        assert_eq!(*ran.borrow(), vec!["third", "second", "first"]);
    }

    #[test]
    fn panicking_cleanup_reaches_the_error_handler() {
        let caught = Rc::new(Cell::new(false));
        let (_, child) = create_root(|| {
            let caught = caught.clone();
            register_error_handler(move |_err| {
                caught.set(true);
                true
            });
            let (_, inner) = create_child_scope(|| {
                on_cleanup(|| panic!("cleanup failed"));
            });
            inner.dispose();
        });
        assert!(caught.get());
        child.dispose();
    }

    #[test]
    fn context_is_visible_in_child_scope() {
        let _ = create_root(|| {
            provide_context(42i32);
            let (value, _handle) = create_child_scope(|| use_context::<i32>());
            assert_eq!(value, 42);
        });
    }
}

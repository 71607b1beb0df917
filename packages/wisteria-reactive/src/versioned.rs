//! Versioned signals: like a plain [`Signal`](crate::Signal), but with an escape hatch to force
//! a notification even when the new value compares equal to the old one.
//!
//! The keyed-list reconciler is the motivating case: a block's item may be the same reference
//! (by key) but mutated in place, so equality-based suppression would hide a real change from
//! anything bound to it.

use crate::node::{NodeId, NodeKind};
use crate::root::Root;

struct VersionedValue<T> {
    value: T,
    version: u64,
    eq: Box<dyn Fn(&T, &T) -> bool>,
}

/// A signal whose writes are still equality-suppressed by default, but which additionally exposes
/// [`VersionedSignal::force`] to notify unconditionally and [`VersionedSignal::peek_version`] to
/// observe the monotonic version counter directly.
pub struct VersionedSignal<T: 'static>(NodeId, std::marker::PhantomData<T>);

impl<T> Clone for VersionedSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for VersionedSignal<T> {}

/// Creates a new [`VersionedSignal`] using [`PartialEq::eq`] as the default equality predicate.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_versioned_signal<T: PartialEq + 'static>(value: T) -> VersionedSignal<T> {
    create_versioned_signal_with_equals(value, PartialEq::eq)
}

/// Creates a new [`VersionedSignal`] with an explicit equality predicate.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_versioned_signal_with_equals<T: 'static>(
    value: T,
    eq: impl Fn(&T, &T) -> bool + 'static,
) -> VersionedSignal<T> {
    let root = Root::global();
    let id = root.create_node(NodeKind::Signal);
    root.nodes.borrow_mut()[id].value = Some(Box::new(VersionedValue {
        value,
        version: 0,
        eq: Box::new(eq),
    }));
    VersionedSignal(id, std::marker::PhantomData)
}

impl<T> VersionedSignal<T> {
    fn node(self) -> NodeId {
        self.0
    }

    pub fn is_alive(self) -> bool {
        self.0.is_alive()
    }

    pub fn dispose(self) {
        self.0.dispose();
    }

    /// Tracks this signal in the current reactive scope.
    pub fn track(self) {
        Root::global().track_read(self.node());
    }

    /// Reads the current version without tracking.
    pub fn peek_version(self) -> u64 {
        let root = Root::global();
        let nodes = root.nodes.borrow();
        let value: &VersionedValue<T> = nodes[self.node()]
            .value
            .as_ref()
            .expect("versioned signal has no value")
            .downcast_ref()
            .expect("wrong versioned signal type");
        value.version
    }

    /// Accesses the value without tracking it.
    pub fn peek_value<U>(self, f: impl FnOnce(&T) -> U) -> U {
        let root = Root::global();
        let nodes = root.nodes.borrow();
        let value: &VersionedValue<T> = nodes[self.node()]
            .value
            .as_ref()
            .expect("versioned signal has no value")
            .downcast_ref()
            .expect("wrong versioned signal type");
        f(&value.value)
    }

    /// Accesses the value, tracking this signal in the current reactive scope.
    pub fn with<U>(self, f: impl FnOnce(&T) -> U) -> U {
        self.track();
        self.peek_value(f)
    }

    pub fn get_clone(self) -> T
    where
        T: Clone,
    {
        self.with(Clone::clone)
    }

    pub fn get(self) -> T
    where
        T: Copy,
    {
        self.with(|v| *v)
    }

    /// Writes a new value; notifies dependents only if it differs under the equality predicate
    /// (same contract as [`crate::Signal::set`]). The version counter advances only when it does.
    pub fn set(self, new: T)
    where
        T: Clone,
    {
        self.update(|slot| *slot = new);
    }

    /// Updates the value in place; notifies and bumps the version only if the result differs.
    ///
    /// Requires `T: Clone` for the same reason as [`crate::Signal::update`]: `f` may replace the
    /// value outright, so a real clone is the only sound way to retain the "before" snapshot.
    pub fn update<U>(self, f: impl FnOnce(&mut T) -> U) -> U
    where
        T: Clone,
    {
        let root = Root::global();
        let (ret, changed) = {
            let mut nodes = root.nodes.borrow_mut();
            let value: &mut VersionedValue<T> = nodes[self.node()]
                .value
                .as_mut()
                .expect("versioned signal has no value")
                .downcast_mut()
                .expect("wrong versioned signal type");
            let before = value.value.clone();
            let ret = f(&mut value.value);
            let changed = !(value.eq)(&before, &value.value);
            if changed {
                value.version += 1;
            }
            (ret, changed)
        };
        if changed {
            root.mark_dependents_dirty(self.node());
        }
        ret
    }

    /// Bumps the version and notifies dependents unconditionally, regardless of whether the
    /// in-place mutation `f` performs would compare equal under the equality predicate. Use this
    /// when the value was mutated through a reference obtained elsewhere and the signal has no
    /// way to observe what changed.
    pub fn force(self, f: impl FnOnce(&mut T)) {
        let root = Root::global();
        {
            let mut nodes = root.nodes.borrow_mut();
            let value: &mut VersionedValue<T> = nodes[self.node()]
                .value
                .as_mut()
                .expect("versioned signal has no value")
                .downcast_mut()
                .expect("wrong versioned signal type");
            f(&mut value.value);
            value.version += 1;
        }
        root.mark_dependents_dirty(self.node());
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn versioned_signal_suppresses_equal_writes() {
        let _ = create_root(|| {
            let signal = create_versioned_signal(0);
            assert_eq!(signal.peek_version(), 0);
            signal.set(0);
            assert_eq!(signal.peek_version(), 0);
            signal.set(1);
            assert_eq!(signal.peek_version(), 1);
        });
    }

    #[test]
    fn versioned_signal_force_always_bumps_and_notifies() {
        let _ = create_root(|| {
            let signal = create_versioned_signal(vec![1, 2, 3]);
            let runs = create_signal(0);
            create_effect(move || {
                signal.track();
                runs.update_silent(|r| *r += 1);
            });
            assert_eq!(runs.get_untracked(), 1);

            // Mutate in place without changing the observable vec contents.
            signal.force(|v| v.push(4));
            assert_eq!(signal.peek_version(), 1);
            assert_eq!(runs.get_untracked(), 2);

            // force() notifies even though this "mutation" leaves the value unchanged.
            signal.force(|_| {});
            assert_eq!(signal.peek_version(), 2);
            assert_eq!(runs.get_untracked(), 3);
        });
    }
}

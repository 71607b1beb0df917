//! Reactive signals: the atomic read-tracking/write-notifying cell.

use std::fmt;
use std::fmt::Formatter;
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{AddAssign, Deref, DivAssign, MulAssign, RemAssign, SubAssign};

use crate::create_memo;
use crate::node::{NodeHandle, NodeId, NodeKind};
use crate::root::Root;

/// A read-only reactive value.
///
/// A `ReadSignal` can be obtained by dereferencing a [`Signal`] — every `Signal` is a
/// `ReadSignal` with additional write abilities. See [`create_signal`] for more information.
pub struct ReadSignal<T: 'static> {
    pub(crate) id: NodeId,
    #[cfg(debug_assertions)]
    created_at: &'static std::panic::Location<'static>,
    _phantom: PhantomData<T>,
}

/// A reactive value that can be read and written to. The writable analog of [`ReadSignal`].
pub struct Signal<T: 'static>(pub(crate) ReadSignal<T>);

/// The per-signal equality predicate: writes for which `eq(prev, next)` holds do not notify
/// subscribers. Boxed so `Signal<T>` stays a plain `Copy` handle regardless of what closure
/// produced the predicate.
struct SignalValue<T> {
    value: T,
    eq: Box<dyn Fn(&T, &T) -> bool>,
}

/// Creates a new [`Signal`] whose default equality predicate is [`PartialEq::eq`]: writing a
/// value equal to the current one does not notify dependents. For types without `PartialEq`, or
/// a custom comparison (including one that always reports "changed"), use
/// [`create_signal_with_equals`].
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_signal<T: PartialEq + 'static>(value: T) -> Signal<T> {
    create_signal_with_equals(value, PartialEq::eq)
}

/// Creates a new [`Signal`] with an explicit equality predicate used to suppress no-op writes.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_signal_with_equals<T: 'static>(
    value: T,
    eq: impl Fn(&T, &T) -> bool + 'static,
) -> Signal<T> {
    let root = Root::global();
    let id = root.create_node(NodeKind::Signal);
    root.nodes.borrow_mut()[id].value = Some(Box::new(SignalValue {
        value,
        eq: Box::new(eq),
    }));
    Signal(ReadSignal {
        id,
        #[cfg(debug_assertions)]
        created_at: std::panic::Location::caller(),
        _phantom: PhantomData,
    })
}

impl<T> ReadSignal<T> {
    /// Wraps an existing node as a `ReadSignal`. Used by [`crate::create_memo`] and friends,
    /// which create the backing node themselves.
    #[cfg_attr(debug_assertions, track_caller)]
    pub(crate) fn from_id(id: NodeId) -> Self {
        ReadSignal {
            id,
            #[cfg(debug_assertions)]
            created_at: std::panic::Location::caller(),
            _phantom: PhantomData,
        }
    }

    /// Returns `true` if the signal is still alive, i.e. has not yet been disposed.
    pub fn is_alive(self) -> bool {
        self.id.is_alive()
    }

    /// Disposes the signal, freeing the memory held on by it. Accessing it afterwards panics.
    pub fn dispose(self) {
        NodeHandle(self.id).dispose();
    }

    fn disposed_panic_message(self) -> String {
        #[cfg(not(debug_assertions))]
        return "signal was disposed".to_string();

        #[cfg(debug_assertions)]
        return format!("signal was disposed. Created at {}", self.created_at);
    }

    /// Gets the value without tracking it. Requires [`Copy`]; see [`ReadSignal::get_clone_untracked`]
    /// or [`ReadSignal::with_untracked`] otherwise.
    pub fn get_untracked(self) -> T
    where
        T: Copy,
    {
        self.with_untracked(|value| *value)
    }

    /// Gets the value without tracking it, cloning it.
    pub fn get_clone_untracked(self) -> T
    where
        T: Clone,
    {
        self.with_untracked(Clone::clone)
    }

    /// Gets the value, tracking this signal in the current reactive scope. Requires [`Copy`].
    pub fn get(self) -> T
    where
        T: Copy,
    {
        self.track();
        self.get_untracked()
    }

    /// Gets the value, tracking this signal in the current reactive scope, cloning it.
    pub fn get_clone(self) -> T
    where
        T: Clone,
    {
        self.track();
        self.get_clone_untracked()
    }

    /// Accesses the value without tracking it. If this is a memo left `Check`/`Dirty` by some
    /// earlier write, brings it up to date first — this is the one place a lazily-evaluated
    /// memo's callback actually runs outside the scheduler's own effect-freshness check.
    pub fn with_untracked<U>(self, f: impl FnOnce(&T) -> U) -> U {
        let root = Root::global();
        root.ensure_updated(self.id);
        let nodes = root.nodes.borrow();
        let node = nodes
            .get(self.id)
            .unwrap_or_else(|| panic!("{}", self.disposed_panic_message()));
        let signal_value: &SignalValue<T> = node
            .value
            .as_ref()
            .expect("signal has no value")
            .downcast_ref()
            .expect("wrong signal type");
        f(&signal_value.value)
    }

    /// Accesses the value, tracking this signal in the current reactive scope.
    pub fn with<U>(self, f: impl FnOnce(&T) -> U) -> U {
        self.track();
        self.with_untracked(f)
    }

    /// Tracks the signal in the current reactive scope. Done automatically by [`ReadSignal::get`]
    /// and similar accessors.
    pub fn track(self) {
        Root::global().track_read(self.id);
    }
}

impl<T> Signal<T> {
    /// Sets a new value, suppressing notification of dependents. Generally discouraged — easy to
    /// leave dependents observing a stale value.
    pub fn set_silent(self, new: T) {
        self.replace_silent(new);
    }

    /// Sets a new value, comparing against the current one via the signal's equality predicate;
    /// notifies dependents only if it differs.
    pub fn set(self, new: T)
    where
        T: Clone,
    {
        self.replace(new);
    }

    pub fn replace_silent(self, new: T) -> T {
        self.update_silent(|val| std::mem::replace(val, new))
    }

    pub fn replace(self, new: T) -> T
    where
        T: Clone,
    {
        self.update(|val| std::mem::replace(val, new))
    }

    pub fn take_silent(self) -> T
    where
        T: Default,
    {
        self.replace_silent(T::default())
    }

    pub fn take(self) -> T
    where
        T: Default + Clone,
    {
        self.replace(T::default())
    }

    /// Updates the value silently (no notification), regardless of whether it ends up different.
    pub fn update_silent<U>(self, f: impl FnOnce(&mut T) -> U) -> U {
        let root = Root::global();
        let mut nodes = root.nodes.borrow_mut();
        let node = nodes
            .get_mut(self.0.id)
            .unwrap_or_else(|| panic!("{}", self.0.disposed_panic_message()));
        let signal_value: &mut SignalValue<T> = node
            .value
            .as_mut()
            .expect("signal has no value")
            .downcast_mut()
            .expect("wrong signal type");
        f(&mut signal_value.value)
    }

    /// Updates the value and notifies dependents unless the new value compares equal to the
    /// previous one under this signal's equality predicate.
    ///
    /// Requires `T: Clone` so a pre-mutation snapshot can be taken for the comparison: `f` is free
    /// to replace the value outright (dropping the old one), so the only sound way to still know
    /// what "old" was is to have cloned it first — anything cheaper would mean two live owners of
    /// the same non-`Copy` resource.
    pub fn update<U>(self, f: impl FnOnce(&mut T) -> U) -> U
    where
        T: Clone,
    {
        let root = Root::global();
        let (ret, changed) = {
            let mut nodes = root.nodes.borrow_mut();
            let node = nodes
                .get_mut(self.0.id)
                .unwrap_or_else(|| panic!("{}", self.0.disposed_panic_message()));
            let signal_value: &mut SignalValue<T> = node
                .value
                .as_mut()
                .expect("signal has no value")
                .downcast_mut()
                .expect("wrong signal type");
            let before = signal_value.value.clone();
            let ret = f(&mut signal_value.value);
            let changed = !(signal_value.eq)(&before, &signal_value.value);
            (ret, changed)
        };
        if changed {
            root.mark_dependents_dirty(self.0.id);
        }
        ret
    }

    pub fn set_fn_silent(self, f: impl FnOnce(&T) -> T) {
        self.update_silent(move |val| *val = f(val));
    }

    pub fn set_fn(self, f: impl FnOnce(&T) -> T)
    where
        T: Clone,
    {
        self.update(move |val| *val = f(val));
    }

    pub fn map<U: PartialEq + 'static>(self, mut f: impl FnMut(&T) -> U + 'static) -> ReadSignal<U> {
        create_memo(move || self.with(&mut f))
    }

    pub fn split(self) -> (ReadSignal<T>, impl Fn(T) -> T)
    where
        T: Clone,
    {
        (*self, move |value| self.replace(value))
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ReadSignal<T> {}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Signal<T> {}

impl<T: Default + PartialEq> Default for ReadSignal<T> {
    fn default() -> Self {
        *create_signal(Default::default())
    }
}
impl<T: Default + PartialEq> Default for Signal<T> {
    fn default() -> Self {
        create_signal(Default::default())
    }
}

impl<T: PartialEq> PartialEq for ReadSignal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.with(|value| other.with(|other| value == other))
    }
}
impl<T: Eq> Eq for ReadSignal<T> {}
impl<T: PartialOrd> PartialOrd for ReadSignal<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.with(|value| other.with(|other| value.partial_cmp(other)))
    }
}
impl<T: Ord> Ord for ReadSignal<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.with(|value| other.with(|other| value.cmp(other)))
    }
}
impl<T: Hash> Hash for ReadSignal<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.with(|value| value.hash(state))
    }
}

impl<T: PartialEq> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.with(|value| other.with(|other| value == other))
    }
}
impl<T: Eq> Eq for Signal<T> {}

impl<T> Deref for Signal<T> {
    type Target = ReadSignal<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|value| value.fmt(f))
    }
}
impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|value| value.fmt(f))
    }
}

impl<T: fmt::Display> fmt::Display for ReadSignal<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|value| value.fmt(f))
    }
}
impl<T: fmt::Display> fmt::Display for Signal<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|value| value.fmt(f))
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for ReadSignal<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.with(|value| value.serialize(serializer))
    }
}
#[cfg(feature = "serde")]
impl<'de, T: serde::Deserialize<'de> + PartialEq> serde::Deserialize<'de> for ReadSignal<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(*create_signal(T::deserialize(deserializer)?))
    }
}

impl<T: AddAssign<Rhs> + PartialEq + Clone, Rhs> AddAssign<Rhs> for Signal<T> {
    fn add_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this += rhs);
    }
}
impl<T: SubAssign<Rhs> + PartialEq + Clone, Rhs> SubAssign<Rhs> for Signal<T> {
    fn sub_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this -= rhs);
    }
}
impl<T: MulAssign<Rhs> + PartialEq + Clone, Rhs> MulAssign<Rhs> for Signal<T> {
    fn mul_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this *= rhs);
    }
}
impl<T: DivAssign<Rhs> + PartialEq + Clone, Rhs> DivAssign<Rhs> for Signal<T> {
    fn div_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this /= rhs);
    }
}
impl<T: RemAssign<Rhs> + PartialEq + Clone, Rhs> RemAssign<Rhs> for Signal<T> {
    fn rem_assign(&mut self, rhs: Rhs) {
        self.update(|this| *this %= rhs);
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn signal() {
        let _ = create_root(|| {
            let state = create_signal(0);
            assert_eq!(state.get(), 0);
            state.set(1);
            assert_eq!(state.get(), 1);
            state.set_fn(|n| *n + 1);
            assert_eq!(state.get(), 2);
        });
    }

    #[test]
    fn signal_composition() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let double = || state.get() * 2;
            assert_eq!(double(), 0);
            state.set(1);
            assert_eq!(double(), 2);
        });
    }

    #[test]
    fn equal_write_does_not_notify() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let runs = create_signal(0);
            create_effect(move || {
                state.track();
                runs.update_silent(|r| *r += 1);
            });
            assert_eq!(runs.get_untracked(), 1);
            state.set(0);
            assert_eq!(runs.get_untracked(), 1);
            state.set(1);
            assert_eq!(runs.get_untracked(), 2);
        });
    }

    #[test]
    fn set_silent_signal() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let double = state.map(|&x| x * 2);
            assert_eq!(double.get(), 0);
            state.set_silent(1);
            assert_eq!(double.get(), 0);
        });
    }

    #[test]
    fn map_signal() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let double = state.map(|&x| x * 2);
            assert_eq!(double.get(), 0);
            state.set(1);
            assert_eq!(double.get(), 2);
        });
    }

    #[test]
    fn take_signal() {
        let _ = create_root(|| {
            let state = create_signal(123);
            let x = state.take();
            assert_eq!(x, 123);
            assert_eq!(state.get(), 0);
        });
    }

    #[test]
    fn signal_split() {
        let _ = create_root(|| {
            let (state, set_state) = create_signal(0).split();
            assert_eq!(state.get(), 0);
            set_state(1);
            assert_eq!(state.get(), 1);
        });
    }

    #[test]
    fn signal_display_and_debug() {
        let _ = create_root(|| {
            let signal = create_signal(0);
            assert_eq!(format!("{signal}"), "0");
            assert_eq!(format!("{signal:?}"), "0");
        });
    }

    #[test]
    fn signal_update_runs_effect_once_per_real_change() {
        let _ = create_root(|| {
            let signal = create_signal("Hello ".to_string());
            let counter = create_signal(0);
            create_effect(move || {
                signal.track();
                counter.update_silent(|c| *c += 1);
            });
            signal.update(|value| value.push_str("World!"));
            assert_eq!(signal.get_clone(), "Hello World!");
            assert_eq!(counter.get(), 2);
        });
    }
}

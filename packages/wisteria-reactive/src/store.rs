//! Stores: a deep, per-property reactive proxy over a plain tree of values.
//!
//! Unlike a plain [`Signal`](crate::Signal), reading `store.field("user").field("name")` only
//! subscribes to that one property — sibling fields can change without rerunning anything that
//! only read `name`. This is implemented as a path-keyed cache of lazily created signals rather
//! than language-level proxy magic (there is no such thing in Rust): every distinct path into the
//! tree gets its own signal the first time something reads through it, and that signal is reused
//! (identity-cached) on every later access through the same path.
//!
//! A store's backing signals are owned by a dedicated child root created alongside the store, not
//! by whatever scope happens to read a path first — otherwise a field first read inside an effect
//! would be disposed and recreated every time that effect reruns.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::root::{batch, create_child_scope, Root};
use crate::signals::{create_signal, Signal};

/// A key identifying one step into a [`StoreValue`] tree: either a map field or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    Field(Rc<str>),
    Index(usize),
}

impl From<&str> for PathKey {
    fn from(s: &str) -> Self {
        PathKey::Field(s.into())
    }
}
impl From<usize> for PathKey {
    fn from(i: usize) -> Self {
        PathKey::Index(i)
    }
}

/// The plain, non-reactive value a store wraps. Mirrors the shape of a JSON-like document: scalars,
/// an ordered list, or an ordered map (insertion order is preserved, matching own-key enumeration
/// order for a plain object).
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Vec<StoreValue>),
    Map(Vec<(Rc<str>, StoreValue)>),
}

impl StoreValue {
    pub fn map(entries: impl IntoIterator<Item = (impl Into<Rc<str>>, StoreValue)>) -> Self {
        StoreValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list(items: impl IntoIterator<Item = StoreValue>) -> Self {
        StoreValue::List(items.into_iter().collect())
    }

    fn child(&self, key: &PathKey) -> StoreValue {
        match (self, key) {
            (StoreValue::Map(entries), PathKey::Field(name)) => entries
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap_or(StoreValue::Null),
            (StoreValue::List(items), PathKey::Index(i)) => {
                items.get(*i).cloned().unwrap_or(StoreValue::Null)
            }
            _ => StoreValue::Null,
        }
    }

    /// Own keys, in enumeration order. Empty for anything that isn't a `Map`.
    fn own_keys(&self) -> Vec<Rc<str>> {
        match self {
            StoreValue::Map(entries) => entries.iter().map(|(k, _)| k.clone()).collect(),
            _ => Vec::new(),
        }
    }

    fn len(&self) -> usize {
        match self {
            StoreValue::List(items) => items.len(),
            StoreValue::Map(entries) => entries.len(),
            _ => 0,
        }
    }
}

impl From<bool> for StoreValue {
    fn from(v: bool) -> Self {
        StoreValue::Bool(v)
    }
}
impl From<f64> for StoreValue {
    fn from(v: f64) -> Self {
        StoreValue::Number(v)
    }
}
impl From<i64> for StoreValue {
    fn from(v: i64) -> Self {
        StoreValue::Number(v as f64)
    }
}
impl From<&str> for StoreValue {
    fn from(v: &str) -> Self {
        StoreValue::Str(v.into())
    }
}
impl From<String> for StoreValue {
    fn from(v: String) -> Self {
        StoreValue::Str(v.into())
    }
}

struct StoreInner {
    /// Owner node for every lazily created signal; outlives (and is independent from) whatever
    /// scope first reads a given path.
    owner: StoreOwner,
    data: RefCell<StoreValue>,
    signals: RefCell<HashMap<Vec<PathKey>, Signal<StoreValue>>>,
    /// One version counter per container path, bumped whenever that path's own keys (for a map)
    /// or length (for a list) change; this is what a `for key in store.keys()` binding tracks
    /// instead of the full value.
    iterate: RefCell<HashMap<Vec<PathKey>, Signal<u64>>>,
}

/// Just the bits of a root we need: the node to parent new signals under.
struct StoreOwner(crate::node::NodeId);

/// A reactive store: a path-addressable, deeply-observable wrapper over a [`StoreValue`] tree.
#[derive(Clone)]
pub struct Store(Rc<StoreInner>);

/// Creates a new store rooted at `initial`.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_store(initial: impl Into<StoreValue>) -> Store {
    let (owner_node, _handle) = create_child_scope(|| Root::global().current_node_for_store());
    Store(Rc::new(StoreInner {
        owner: StoreOwner(owner_node),
        data: RefCell::new(initial.into()),
        signals: RefCell::new(HashMap::new()),
        iterate: RefCell::new(HashMap::new()),
    }))
}

impl Root {
    /// Helper used only by the store constructor: the node that's current right after entering
    /// the fresh child scope is exactly the owner we want every lazy field signal parented to.
    fn current_node_for_store(&self) -> crate::node::NodeId {
        self.current_node.get()
    }
}

impl Store {
    /// A handle to the root of this store, equivalent to `self.path(&[])`.
    pub fn root(&self) -> StoreNode {
        StoreNode {
            store: self.clone(),
            path: Vec::new(),
        }
    }

    fn signal_for(&self, path: &[PathKey]) -> Signal<StoreValue> {
        if let Some(sig) = self.0.signals.borrow().get(path) {
            return *sig;
        }
        let value = self.navigate(path);
        let owner = self.0.owner.0;
        let signal = Root::global().run_in_node(owner, || create_signal(value));
        self.0.signals.borrow_mut().insert(path.to_vec(), signal);
        signal
    }

    fn iterate_signal_for(&self, path: &[PathKey]) -> Signal<u64> {
        if let Some(sig) = self.0.iterate.borrow().get(path) {
            return *sig;
        }
        let owner = self.0.owner.0;
        let signal = Root::global().run_in_node(owner, || create_signal(0u64));
        self.0.iterate.borrow_mut().insert(path.to_vec(), signal);
        signal
    }

    fn navigate(&self, path: &[PathKey]) -> StoreValue {
        let mut current = self.0.data.borrow().clone();
        for key in path {
            current = current.child(key);
        }
        current
    }

    /// Writes `value` at `path`, updating the canonical data, notifying this path's own signal,
    /// and shallow-reconciling any already-cached child signals: children whose key disappeared
    /// are dropped from the cache (so a subsequent read recreates them fresh rather than observing
    /// a stale value), and a container's iterate-signal is bumped so key/length-enumeration
    /// bindings re-run. Does *not* force notification of grandchildren whose value didn't change.
    fn write(&self, path: &[PathKey], value: StoreValue) {
        batch(|| {
            self.write_into_data(path, value.clone());
            self.reconcile_path(path, &value);
        });
    }

    fn write_into_data(&self, path: &[PathKey], value: StoreValue) {
        fn go(current: &mut StoreValue, path: &[PathKey], value: StoreValue) {
            match path.split_first() {
                None => *current = value,
                Some((PathKey::Field(name), rest)) => {
                    if let StoreValue::Map(entries) = current {
                        if let Some(entry) = entries.iter_mut().find(|(k, _)| k == name) {
                            go(&mut entry.1, rest, value);
                            return;
                        }
                        if rest.is_empty() {
                            entries.push((name.clone(), value));
                            return;
                        }
                    } else if rest.is_empty() {
                        *current = StoreValue::Map(vec![(name.clone(), value)]);
                        return;
                    }
                }
                Some((PathKey::Index(i), rest)) => {
                    if let StoreValue::List(items) = current {
                        if *i < items.len() {
                            go(&mut items[*i], rest, value);
                            return;
                        }
                        if *i == items.len() && rest.is_empty() {
                            items.push(value);
                            return;
                        }
                    } else if rest.is_empty() {
                        *current = StoreValue::List(vec![value]);
                        return;
                    }
                }
            }
        }
        go(&mut self.0.data.borrow_mut(), path, value);
    }

    fn reconcile_path(&self, path: &[PathKey], value: &StoreValue) {
        if let Some(sig) = self.0.signals.borrow().get(path) {
            sig.set(value.clone());
        }
        match value {
            StoreValue::Map(entries) => {
                let live: std::collections::HashSet<Rc<str>> =
                    entries.iter().map(|(k, _)| k.clone()).collect();
                let mut child_path = path.to_vec();
                // Notify every signal whose field disappeared (it now reads back as `Null`)
                // *before* dropping it from the cache, so an existing subscriber still wakes up
                // for this round instead of being silently orphaned (§4.9).
                let orphaned: Vec<Vec<PathKey>> = self
                    .0
                    .signals
                    .borrow()
                    .keys()
                    .filter(|p| {
                        p.len() == child_path.len() + 1
                            && p.starts_with(path)
                            && matches!(&p[child_path.len()], PathKey::Field(name) if !live.contains(name))
                    })
                    .cloned()
                    .collect();
                for p in &orphaned {
                    if let Some(sig) = self.0.signals.borrow().get(p) {
                        sig.set(StoreValue::Null);
                    }
                }
                self.0.signals.borrow_mut().retain(|p, _| !orphaned.contains(p));
                for (key, child_value) in entries {
                    child_path.push(PathKey::Field(key.clone()));
                    if self.0.signals.borrow().contains_key(&child_path) {
                        self.reconcile_path(&child_path, child_value);
                    }
                    child_path.pop();
                }
                self.bump_iterate(path);
            }
            StoreValue::List(items) => {
                let mut child_path = path.to_vec();
                child_path.push(PathKey::Index(0));
                let prefix_len = child_path.len();
                // Truncation (§4.9): notify every signal whose index is now out of range before
                // dropping it, so a subscriber reading a since-removed index still observes the
                // change instead of silently going stale.
                let orphaned: Vec<Vec<PathKey>> = self
                    .0
                    .signals
                    .borrow()
                    .keys()
                    .filter(|p| {
                        p.len() == prefix_len
                            && p.starts_with(path)
                            && matches!(p[prefix_len - 1], PathKey::Index(i) if i >= items.len())
                    })
                    .cloned()
                    .collect();
                for p in &orphaned {
                    if let Some(sig) = self.0.signals.borrow().get(p) {
                        sig.set(StoreValue::Null);
                    }
                }
                self.0.signals.borrow_mut().retain(|p, _| !orphaned.contains(p));
                for (i, item) in items.iter().enumerate() {
                    let mut p = path.to_vec();
                    p.push(PathKey::Index(i));
                    if self.0.signals.borrow().contains_key(&p) {
                        self.reconcile_path(&p, item);
                    }
                }
                self.bump_iterate(path);
            }
            _ => {}
        }
    }

    fn bump_iterate(&self, path: &[PathKey]) {
        if let Some(sig) = self.0.iterate.borrow().get(path) {
            sig.update(|v| *v = v.wrapping_add(1));
        }
    }
}

/// A handle to one path inside a [`Store`]. Cheap to clone; `field`/`index` just extend the path.
#[derive(Clone)]
pub struct StoreNode {
    store: Store,
    path: Vec<PathKey>,
}

impl StoreNode {
    /// Descends into a map field.
    pub fn field(&self, name: impl Into<Rc<str>>) -> StoreNode {
        let mut path = self.path.clone();
        path.push(PathKey::Field(name.into()));
        StoreNode {
            store: self.store.clone(),
            path,
        }
    }

    /// Descends into a list index.
    pub fn index(&self, i: usize) -> StoreNode {
        let mut path = self.path.clone();
        path.push(PathKey::Index(i));
        StoreNode {
            store: self.store.clone(),
            path,
        }
    }

    /// Reads this path's value, tracking it in the current reactive scope.
    pub fn get(&self) -> StoreValue {
        self.store.signal_for(&self.path).get_clone()
    }

    /// Reads this path's value without tracking it.
    pub fn get_untracked(&self) -> StoreValue {
        self.store.navigate(&self.path)
    }

    /// Writes a new value at this path, reconciling any already-observed descendants.
    pub fn set(&self, value: impl Into<StoreValue>) {
        self.store.write(&self.path, value.into());
    }

    /// Tracks this path without caring about the value.
    pub fn track(&self) {
        self.store.signal_for(&self.path).track();
    }

    /// Own keys of a map at this path, tracked via this path's iterate-signal (not its value
    /// signal, so adding/removing a sibling key doesn't force a full-value read).
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.store.iterate_signal_for(&self.path).track();
        self.store.navigate(&self.path).own_keys()
    }

    /// Length of a list (or map) at this path, tracked the same way as [`StoreNode::keys`].
    pub fn len(&self) -> usize {
        self.store.iterate_signal_for(&self.path).track();
        self.store.navigate(&self.path).len()
    }
}

/// Applies `f` to the store's root, batching every write performed inside it into a single flush.
/// Use this for a coordinated multi-field update instead of several separate `.set()` calls.
pub fn set_store(store: &Store, f: impl FnOnce(&StoreNode)) {
    batch(|| f(&store.root()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_effect, create_root};

    #[test]
    fn reads_and_writes_nested_fields() {
        let _ = create_root(|| {
            let store = create_store(StoreValue::map([(
                "user",
                StoreValue::map([("name", "Alice".into()), ("age", 30.0.into())]),
            )]));
            let name_node = store.root().field("user").field("name");
            assert_eq!(name_node.get(), StoreValue::Str("Alice".into()));

            name_node.set("Bob");
            assert_eq!(name_node.get(), StoreValue::Str("Bob".into()));
        });
    }

    #[test]
    fn sibling_field_write_does_not_rerun_unrelated_subscriber() {
        let _ = create_root(|| {
            let store = create_store(StoreValue::map([
                ("a", 1.0.into()),
                ("b", 2.0.into()),
            ]));
            let runs = create_signal(0);
            let a = store.root().field("a");
            let b = store.root().field("b");
            create_effect(move || {
                a.track();
                runs.update_silent(|r| *r += 1);
            });
            assert_eq!(runs.get(), 1);
            b.set(20.0);
            assert_eq!(runs.get(), 1); // unrelated field: no rerun
            a.set(10.0);
            assert_eq!(runs.get(), 2);
        });
    }

    #[test]
    fn array_truncation_invalidates_stale_index_signal() {
        let _ = create_root(|| {
            let store = create_store(StoreValue::list([1.0.into(), 2.0.into(), 3.0.into()]));
            let third = store.root().index(2);
            assert_eq!(third.get(), StoreValue::Number(3.0));

            store
                .root()
                .set(StoreValue::list([1.0.into(), 2.0.into()]));
            // Re-reading a now-out-of-range index yields Null instead of the stale cached 3.0.
            assert_eq!(third.get(), StoreValue::Null);
        });
    }

    #[test]
    fn array_truncation_notifies_subscribers_of_dropped_indices() {
        let _ = create_root(|| {
            let store = create_store(StoreValue::list([1.0.into(), 2.0.into(), 3.0.into()]));
            let third = store.root().index(2);
            let runs = create_signal(0);
            {
                let third = third.clone();
                create_effect(move || {
                    third.track();
                    runs.update_silent(|r| *r += 1);
                });
            }
            assert_eq!(runs.get(), 1);

            store
                .root()
                .set(StoreValue::list([1.0.into(), 2.0.into()]));
            // The subscriber to the now-out-of-range index reruns, per §4.9's truncation rule.
            assert_eq!(runs.get(), 2);
            assert_eq!(third.get(), StoreValue::Null);
        });
    }

    #[test]
    fn keys_tracks_iterate_signal_not_full_value() {
        let _ = create_root(|| {
            let store = create_store(StoreValue::map([("a", 1.0.into())]));
            let root = store.root();
            assert_eq!(root.keys(), vec![Rc::from("a")]);

            let runs = create_signal(0);
            create_effect(move || {
                let _ = root.keys();
                runs.update_silent(|r| *r += 1);
            });
            assert_eq!(runs.get(), 1);

            set_store(&store, |s| s.field("b").set(2.0));
            assert_eq!(runs.get(), 2);
            assert_eq!(store.root().keys(), vec![Rc::from("a"), Rc::from("b")]);
        });
    }

    #[test]
    fn set_store_batches_multiple_writes() {
        let _ = create_root(|| {
            let store = create_store(StoreValue::map([("a", 1.0.into()), ("b", 2.0.into())]));
            let runs = create_signal(0);
            let a = store.root().field("a");
            let b = store.root().field("b");
            create_effect(move || {
                a.track();
                b.track();
                runs.update_silent(|r| *r += 1);
            });
            assert_eq!(runs.get(), 1);

            set_store(&store, |s| {
                s.field("a").set(10.0);
                s.field("b").set(20.0);
            });
            assert_eq!(runs.get(), 2); // one flush for both writes
        });
    }
}

//! `Keyed`/`Indexed`: thin wrappers over the core keyed-list reconciler (§4.6), specialized to
//! [`DomNode`] and to render functions that take just the item and its index (the key itself is
//! only needed by the reconciler's diff, not by the caller).

use std::fmt;
use std::hash::Hash;

use wisteria_core::{Control, KeyedListHandle, View};
use wisteria_reactive::{ReadSignal, VersionedSignal};

use crate::DomNode;

/// Mounts a reactive keyed list (§4.6) before `marker` (or at the end of `parent`), keeping one
/// block per key so a reused item keeps its node identity, inner root, and reactive state across
/// updates instead of being torn down and recreated.
pub fn keyed<T, K>(
    parent: DomNode,
    marker: Option<DomNode>,
    items_fn: impl FnMut() -> Vec<T> + 'static,
    key_fn: impl Fn(&T) -> K + 'static,
    render_fn: impl Fn(VersionedSignal<T>, ReadSignal<usize>) -> Result<View<DomNode>, Control> + 'static,
) -> KeyedListHandle<DomNode>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + fmt::Debug + 'static,
{
    wisteria_core::keyed_list(
        parent,
        marker,
        items_fn,
        move |item, _index| key_fn(item),
        move |item, index, _key| render_fn(item, index),
    )
}

/// Like [`keyed`], but keys each item by its position instead of an explicit key function: a
/// block at a given index is reused for whatever item now occupies that index, even if the item
/// itself changed, and is only destroyed when the list shrinks past it. Cheaper than `keyed` when
/// items don't have a stable identity worth tracking across reorders, at the cost of losing node
/// identity across reorders (a shuffled list recreates in place rather than moving nodes).
pub fn indexed<T>(
    parent: DomNode,
    marker: Option<DomNode>,
    items_fn: impl FnMut() -> Vec<T> + 'static,
    render_fn: impl Fn(VersionedSignal<T>, ReadSignal<usize>) -> Result<View<DomNode>, Control> + 'static,
) -> KeyedListHandle<DomNode>
where
    T: Clone + 'static,
{
    wisteria_core::keyed_list(
        parent,
        marker,
        items_fn,
        |_item, index| index,
        move |item, index, _key| render_fn(item, index),
    )
}

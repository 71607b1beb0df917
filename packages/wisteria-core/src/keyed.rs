//! The keyed-list reconciler (§4.6): efficient in-place reordering of a reactive list, with
//! per-item reactive state (an item signal and an index signal) and lifecycle hooks that survive
//! reorders, and only actually tear down a block when its key disappears from the list.
//!
//! The hard part this module earns its keep on is *not* re-rendering a block just because its
//! position changed: [`reconcile_fragments`] (in [`crate::render`]) already knows how to move a
//! flat node array into place with a near-minimal number of `insert_before` calls, so the bulk of
//! this module is bookkeeping — matching old keys to new ones, deciding which of the fast paths
//! applies, and keeping every block's own root a child of a persistent container rather than of
//! the watching effect (whose `dispose_children` on every re-run would otherwise tear every block
//! down and rebuild it from scratch on every single list change).

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use wisteria_reactive::{
    create_render_effect, create_root_deferred, create_signal, create_versioned_signal_with_equals,
    propagate_error, propagate_suspense, untrack, Control, NodeHandle, NodeId, ReadSignal,
    RootHandle, Signal, VersionedSignal,
};

use crate::generic_node::GenericNode;
use crate::render::{append_nodes, reconcile_fragments};
use crate::view::View;

struct Block<G: GenericNode, T: 'static> {
    nodes: Vec<G>,
    root: RootHandle,
    item: VersionedSignal<T>,
    index: Signal<usize>,
}

impl<G: GenericNode, T> Block<G, T> {
    fn destroy(self, parent: &G) {
        self.root.dispose();
        for node in &self.nodes {
            parent.remove_child(node);
        }
    }
}

struct KeyedState<G: GenericNode, T: 'static, K> {
    blocks: HashMap<K, Block<G, T>>,
    order: Vec<K>,
}

/// Handle returned by [`keyed_list`]. The list keeps running until [`KeyedListHandle::dispose`]
/// is called; dropping the handle without calling it leaves the list (and its watching effect)
/// alive, matching [`wisteria_reactive::create_root`]'s explicit-teardown contract.
pub struct KeyedListHandle<G: GenericNode> {
    /// The marker inserted immediately before the list's first item (or immediately before
    /// [`KeyedListHandle::end_marker`], if the list is empty).
    pub start_marker: G,
    /// The marker the list's items are always inserted before.
    pub end_marker: G,
    effect: Rc<std::cell::RefCell<Option<NodeHandle>>>,
    container_node: NodeId,
}

impl<G: GenericNode> fmt::Debug for KeyedListHandle<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedListHandle")
            .field("start_marker", &self.start_marker)
            .field("end_marker", &self.end_marker)
            .field("container_node", &self.container_node)
            .finish()
    }
}

impl<G: GenericNode> KeyedListHandle<G> {
    /// Tears down every remaining block and the watching effect.
    pub fn dispose(self) {
        if let Some(effect) = self.effect.borrow_mut().take() {
            effect.dispose();
        }
        self.container_node.dispose();
    }
}

/// Builds a reactive keyed list (§4.6): mounts `parent`'s children for `items_fn()`'s current
/// value before `marker` (or at the end of `parent`, if `marker` is `None`), keeping one block per
/// key across updates so reused blocks keep their node identity, inner root, and reactive state.
///
/// `render_fn` is called once per *new* key, with a versioned item signal (bumped — regardless of
/// equality — every time a reused block's item is updated, since the item may have been mutated
/// in place rather than replaced) and a plain index signal (updated whenever the block's position
/// changes). It runs with the active subscriber cleared, so an inner effect it creates is not
/// mistaken for a dependency of the list's own watching effect.
pub fn keyed_list<G, T, K>(
    parent: G,
    marker: Option<G>,
    mut items_fn: impl FnMut() -> Vec<T> + 'static,
    key_fn: impl Fn(&T, usize) -> K + 'static,
    render_fn: impl Fn(VersionedSignal<T>, ReadSignal<usize>, K) -> Result<View<G>, Control> + 'static,
) -> KeyedListHandle<G>
where
    G: GenericNode,
    T: Clone + 'static,
    K: Eq + Hash + Clone + fmt::Debug + 'static,
{
    let start_marker = G::create_marker();
    let end_marker = G::create_marker();
    parent.insert_before(&start_marker, marker.as_ref());
    parent.insert_before(&end_marker, marker.as_ref());

    // Blocks live under their own persistent root, never under the watching effect below: the
    // effect's own re-run disposes *its* children on every re-run (so a previous child binding's
    // subtree is always rebuilt), which would defeat the entire point of reusing blocks here.
    let (_, container) = create_root_deferred(|| {});
    let container_node = container.node_id();
    let container = Rc::new(container);

    let state = Rc::new(std::cell::RefCell::new(KeyedState::<G, T, K> {
        blocks: HashMap::new(),
        order: Vec::new(),
    }));
    let key_fn = Rc::new(key_fn);
    let render_fn = Rc::new(render_fn);
    let effect_cell: Rc<std::cell::RefCell<Option<NodeHandle>>> =
        Rc::new(std::cell::RefCell::new(None));

    let start = {
        let container = container.clone();
        let state = state.clone();
        let parent = parent.clone();
        let end_marker = end_marker.clone();
        let key_fn = key_fn.clone();
        let render_fn = render_fn.clone();
        let effect_cell = effect_cell.clone();
        move || {
            let handle = create_render_effect(move || {
                let items = items_fn();
                diff(
                    &container,
                    &state,
                    &parent,
                    &end_marker,
                    items,
                    key_fn.as_ref(),
                    render_fn.as_ref(),
                );
            });
            *effect_cell.borrow_mut() = Some(handle);
        }
    };

    // Connected guard (§4.6 step 1): a disconnected range defers the first diff until the host
    // reports the marker is attached. Hosts with no notion of deferred connection (the default
    // `on_connected`, used by every non-DOM host) invoke `start` immediately.
    if start_marker.is_connected() {
        start();
    } else {
        start_marker.on_connected(Box::new(start));
    }

    KeyedListHandle {
        start_marker,
        end_marker,
        effect: effect_cell,
        container_node,
    }
}

fn diff<G, T, K>(
    container: &RootHandle,
    state: &Rc<std::cell::RefCell<KeyedState<G, T, K>>>,
    parent: &G,
    end_marker: &G,
    items: Vec<T>,
    key_fn: &(impl Fn(&T, usize) -> K + 'static),
    render_fn: &(impl Fn(VersionedSignal<T>, ReadSignal<usize>, K) -> Result<View<G>, Control> + 'static),
) where
    G: GenericNode,
    T: Clone + 'static,
    K: Eq + Hash + Clone + fmt::Debug + 'static,
{
    let keys: Vec<K> = items
        .iter()
        .enumerate()
        .map(|(i, item)| key_fn(item, i))
        .collect();

    // Empty fast-path (§4.6 step 2).
    if items.is_empty() {
        let mut state_ref = state.borrow_mut();
        for key in state_ref.order.drain(..) {
            if let Some(block) = state_ref.blocks.remove(&key) {
                block.destroy(parent);
            }
        }
        return;
    }

    // Stable-order fast-path (§4.6 step 3): same keys, same order, nothing moved — just update
    // item/index signals in place.
    {
        let state_ref = state.borrow();
        if keys == state_ref.order {
            for (i, (item, key)) in items.iter().zip(keys.iter()).enumerate() {
                if let Some(block) = state_ref.blocks.get(key) {
                    block.item.force(|slot| *slot = item.clone());
                    block.index.set(i);
                }
            }
            return;
        }
    }

    // General pass (§4.6 step 4): build the next block map and order, reusing what we can.
    let mut next_blocks: HashMap<K, Block<G, T>> = HashMap::with_capacity(items.len());
    let mut next_order: Vec<K> = Vec::with_capacity(items.len());
    let mut created_in_order: Vec<K> = Vec::new();

    {
        let mut state_ref = state.borrow_mut();
        for (i, item) in items.iter().enumerate() {
            let key = keys[i].clone();

            if let Some(old) = next_blocks.remove(&key) {
                // Duplicate key within this same update: the earlier occurrence loses.
                #[cfg(feature = "trace")]
                tracing::warn!(?key, "keyed list: duplicate key, earlier occurrence discarded");
                next_order.retain(|k| k != &key);
                created_in_order.retain(|k| k != &key);
                old.destroy(parent);
            }

            let block = if let Some(mut existing) = state_ref.blocks.remove(&key) {
                existing.item.force(|slot| *slot = item.clone());
                existing.index.set(i);
                existing
            } else {
                let index_signal = create_signal(i);
                let item_signal = create_versioned_signal_with_equals(item.clone(), |_: &T, _: &T| false);
                let key_for_render = key.clone();
                let render_fn = render_fn;
                let (result, block_root) = untrack(|| {
                    container.run_in(|| {
                        create_root_deferred(|| render_fn(item_signal, *index_signal, key_for_render))
                    })
                });
                let view = match result {
                    Ok(view) => view,
                    Err(Control::Error(err)) => {
                        propagate_error(&err);
                        View::empty()
                    }
                    Err(Control::Suspend(token)) => {
                        propagate_suspense(token);
                        View::empty()
                    }
                };
                let nodes = untrack(|| view.flatten());
                created_in_order.push(key.clone());
                Block {
                    nodes,
                    root: block_root,
                    item: item_signal,
                    index: index_signal,
                }
            };

            next_blocks.insert(key.clone(), block);
            next_order.push(key);
        }

        // Append fast-path (§4.6 step 5): every old block was reused, in order, and the new
        // order only extends it — insert the new tail and skip the general reorder pass.
        let is_pure_append = state_ref.order.len() <= next_order.len()
            && next_order[..state_ref.order.len()] == state_ref.order[..];
        if is_pure_append {
            for key in &next_order[state_ref.order.len()..] {
                let block = next_blocks.get(key).expect("just inserted");
                for node in &block.nodes {
                    parent.insert_before(node, Some(end_marker));
                }
            }
        } else {
            // Deletion pass (§4.6 step 6): anything left in the old map lost its key this round.
            for (_, block) in state_ref.blocks.drain() {
                block.destroy(parent);
            }

            // Reorder pass (§4.6 step 7): `a` is the surviving old physical order, `b` is the
            // full new order (including brand-new, not-yet-attached blocks).
            let mut a: Vec<G> = Vec::new();
            for key in &state_ref.order {
                if let Some(block) = next_blocks.get(key) {
                    a.extend(block.nodes.iter().cloned());
                }
            }
            let b: Vec<G> = next_order
                .iter()
                .flat_map(|key| next_blocks.get(key).expect("just inserted").nodes.iter().cloned())
                .collect();

            if a.is_empty() {
                append_nodes(parent, b, Some(end_marker));
            } else {
                reconcile_fragments(parent, &mut a, &b);
            }
        }

        // Swap M <-> M', OB <-> OB' (§4.6 step 8).
        state_ref.blocks = next_blocks;
        state_ref.order = next_order;
    }

    // Mount flush (§4.6 step 9): every newly created block, in creation order.
    let state_ref = state.borrow();
    for key in created_in_order {
        if let Some(block) = state_ref.blocks.get(&key) {
            block.root.flush_on_mount();
        }
    }
}

#[cfg(test)]
mod tests {
    use wisteria_reactive::{create_root, create_signal};

    use super::*;
    use crate::test_support::StringNode;

    fn render_li(text: &str) -> Result<View<StringNode>, Control> {
        let node = StringNode::create_text_node(text.to_string().into());
        let li = StringNode::new("li");
        li.append_child(&node);
        Ok(View::new_node(li))
    }

    #[test]
    fn renders_initial_items_in_order() {
        let _ = create_root(|| {
            let parent = StringNode::new("ul");
            let items = create_signal(vec![1u32, 2, 3]);
            let handle = keyed_list(
                parent.clone(),
                None,
                move || items.get_clone(),
                |item, _| *item,
                |item, _, _| render_li(&item.get_clone().to_string()),
            );
            let texts: Vec<String> = parent
                .children()
                .iter()
                .filter(|c| c.children().len() == 1)
                .map(|li| li.children()[0].text())
                .collect();
            assert_eq!(texts, vec!["1", "2", "3"]);
            handle.dispose();
        });
    }

    #[test]
    fn reorders_without_recreating_nodes() {
        let _ = create_root(|| {
            let parent = StringNode::new("ul");
            let items = create_signal(vec![1u32, 2, 3]);
            let _handle = keyed_list(
                parent.clone(),
                None,
                move || items.get_clone(),
                |item, _| *item,
                |item, _, _| render_li(&item.get_clone().to_string()),
            );
            let before: Vec<StringNode> = parent.children();

            items.set(vec![3, 2, 1]);

            let after: Vec<StringNode> = parent.children();
            assert_eq!(after, vec![before[2].clone(), before[1].clone(), before[0].clone()]);
            let texts: String = after.iter().map(|li| li.children()[0].text()).collect();
            assert_eq!(texts, "threetwoone".replacen("three", "3", 1).replacen("two", "2", 1).replacen("one", "1", 1));
        });
    }

    #[test]
    fn duplicate_keys_keep_only_the_last_occurrence() {
        let _ = create_root(|| {
            let parent = StringNode::new("ul");
            let items = create_signal(vec!["A".to_string(), "B".to_string(), "C".to_string()]);
            let _handle = keyed_list(
                parent.clone(),
                None,
                move || items.get_clone(),
                |_, _| 1u32,
                |item, _, _| render_li(&item.get_clone()),
            );
            assert_eq!(parent.children().len(), 1);
            assert_eq!(parent.children()[0].children()[0].text(), "C");
        });
    }

    #[test]
    fn removing_all_items_clears_the_container() {
        let _ = create_root(|| {
            let parent = StringNode::new("ul");
            let items = create_signal(vec![1u32, 2]);
            let _handle = keyed_list(
                parent.clone(),
                None,
                move || items.get_clone(),
                |item, _| *item,
                |item, _, _| render_li(&item.get_clone().to_string()),
            );
            assert_eq!(parent.children().len(), 2);

            items.set(vec![]);
            assert_eq!(parent.children().len(), 0);
        });
    }

    #[test]
    fn appending_items_does_not_disturb_existing_blocks() {
        let _ = create_root(|| {
            let parent = StringNode::new("ul");
            let items = create_signal(vec![1u32, 2]);
            let _handle = keyed_list(
                parent.clone(),
                None,
                move || items.get_clone(),
                |item, _| *item,
                |item, _, _| render_li(&item.get_clone().to_string()),
            );
            let first_two = parent.children();

            items.set(vec![1, 2, 3]);

            let after = parent.children();
            assert_eq!(after.len(), 3);
            assert_eq!(after[0], first_two[0]);
            assert_eq!(after[1], first_two[1]);
        });
    }

    #[test]
    fn reused_block_item_signal_updates_without_moving_nodes() {
        let _ = create_root(|| {
            let parent = StringNode::new("ul");
            let items = create_signal(vec![(1u32, "a".to_string())]);
            let _handle = keyed_list(
                parent.clone(),
                None,
                move || items.get_clone(),
                |item, _| item.0,
                |item, _, _| render_li(&item.get_clone().1),
            );
            let before = parent.children();
            assert_eq!(before[0].children()[0].text(), "a");

            items.set(vec![(1, "b".to_string())]);
            let after = parent.children();
            assert_eq!(after, before);
            assert_eq!(after[0].children()[0].text(), "b");
        });
    }
}

//! Tree-mutation helpers shared by the binding layer: inserting a [`View`], tearing one down, and
//! reconciling one array of nodes against another.

use hashbrown::HashMap;

use crate::generic_node::GenericNode;
use crate::view::View;

/// Inserts `view`'s nodes under `parent`, before `marker` (or at the end, if `marker` is `None`).
/// If `current` is `Some`, its nodes are reconciled against `view`'s instead of being blindly
/// appended — this is what lets a child binding (§4.5) re-run without tearing down and rebuilding
/// nodes that didn't actually change position.
pub fn insert<G: GenericNode>(
    parent: &G,
    view: View<G>,
    current: Option<Vec<G>>,
    marker: Option<&G>,
) {
    let next = view.flatten();
    match current {
        None => append_nodes(parent, next, marker),
        Some(current) if current.is_empty() => append_nodes(parent, next, marker),
        Some(mut current) => {
            if next.is_empty() {
                clean_children(parent, current, None);
            } else {
                reconcile_fragments(parent, &mut current, &next);
            }
        }
    }
}

/// Removes every node in `current` from `parent`. If `replacement` is given, it takes the place
/// of the first removed node (subsequent ones are simply removed) instead of leaving a gap.
pub fn clean_children<G: GenericNode>(parent: &G, current: Vec<G>, replacement: Option<&G>) {
    let mut replacement = replacement;
    for node in current {
        if let Some(new_node) = replacement.take() {
            parent.replace_child(&node, new_node);
        } else {
            parent.remove_child(&node);
        }
    }
}

/// Appends every node in `fragment` before `marker` (or at the end of `parent`).
pub fn append_nodes<G: GenericNode>(parent: &G, fragment: Vec<G>, marker: Option<&G>) {
    for node in fragment {
        parent.insert_before(&node, marker);
    }
}

/// Reconciles the node array `a` (currently children of `parent`, in DOM order) against the
/// target array `b`, performing the minimal number of `insert_before`/`remove_child` calls.
///
/// This is the array-diffing half of the keyed-list reconciler's reorder pass (§4.6 step 7):
/// common-prefix/suffix trimming, an O(1) backward-swap fast path, and a map-based fallback that
/// detects a run of already-in-order nodes (a poor man's longest-increasing-subsequence: it only
/// needs to find *one* run starting at the current position, since the loop re-evaluates after
/// each fallback step) to batch-insert instead of moving node-by-node.
///
/// # Panics
/// Panics if `a` is empty — callers should use [`append_nodes`] instead in that case.
pub fn reconcile_fragments<G: GenericNode>(parent: &G, a: &mut [G], b: &[G]) {
    debug_assert!(!a.is_empty(), "a cannot be empty; use append_nodes instead");

    let b_len = b.len();
    let mut a_end = a.len();
    let mut b_end = b_len;
    let mut a_start = 0;
    let mut b_start = 0;
    let mut map = None::<HashMap<G, usize>>;

    let after = a[a_end - 1].next_sibling();

    while a_start < a_end || b_start < b_end {
        if a_end == a_start {
            let anchor = if b_end < b_len {
                if b_start != 0 {
                    b[b_start - 1].next_sibling()
                } else {
                    Some(b[b_end - b_start].clone())
                }
            } else {
                after.clone()
            };
            for new_node in &b[b_start..b_end] {
                parent.insert_before(new_node, anchor.as_ref());
            }
            b_start = b_end;
        } else if b_end == b_start {
            for node in &a[a_start..a_end] {
                if map.is_none() || !map.as_ref().unwrap().contains_key(node) {
                    parent.remove_child(node);
                }
            }
            a_start = a_end;
        } else if a[a_start] == b[b_start] {
            a_start += 1;
            b_start += 1;
        } else if a[a_end - 1] == b[b_end - 1] {
            a_end -= 1;
            b_end -= 1;
        } else if a[a_start] == b[b_end - 1] && b[b_start] == a[a_end - 1] {
            let node = a[a_end - 1].next_sibling();
            parent.insert_before(&b[b_start], a[a_start].next_sibling().as_ref());
            parent.insert_before(&b[b_end - 1], node.as_ref());
            a_start += 1;
            b_start += 1;
            a_end -= 1;
            b_end -= 1;
            a[a_end] = b[b_end].clone();
        } else {
            if map.is_none() {
                map = Some(
                    b[b_start..b_end]
                        .iter()
                        .enumerate()
                        .map(|(i, node)| (node.clone(), i))
                        .collect(),
                );
            }
            let map_ref = map.as_ref().unwrap();

            if let Some(&index) = map_ref.get(&a[a_start]) {
                if b_start < index && index < b_end {
                    let mut i = a_start;
                    let mut sequence = 1;
                    while i + 1 < a_end && i + 1 < b_end {
                        i += 1;
                        if map_ref.get(&a[i]).copied() != Some(index + sequence) {
                            break;
                        }
                        sequence += 1;
                    }

                    if sequence > index - b_start {
                        let anchor = &a[a_start];
                        while b_start < index {
                            parent.insert_before(&b[b_start], Some(anchor));
                            b_start += 1;
                        }
                    } else {
                        parent.replace_child(&a[a_start], &b[b_start]);
                        a_start += 1;
                        b_start += 1;
                    }
                } else {
                    a_start += 1;
                }
            } else {
                parent.remove_child(&a[a_start]);
                a_start += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StringNode;

    fn attach(parent: &StringNode, children: &[StringNode]) {
        for child in children {
            parent.append_child(child);
        }
    }

    #[test]
    fn reconcile_common_prefix_and_suffix_leaves_middle_diff_only() {
        let parent = StringNode::new("ul");
        let a0 = StringNode::new("li");
        let a1 = StringNode::new("li");
        let a2 = StringNode::new("li");
        attach(&parent, &[a0.clone(), a1.clone(), a2.clone()]);

        let b1 = StringNode::new("li");
        let mut a = [a0.clone(), a1, a2.clone()];
        let b = [a0.clone(), b1.clone(), a2.clone()];
        reconcile_fragments(&parent, &mut a, &b);

        assert_eq!(parent.children(), vec![a0, b1, a2]);
    }

    #[test]
    fn reconcile_backward_swap() {
        let parent = StringNode::new("ul");
        let a0 = StringNode::new("li");
        let a1 = StringNode::new("li");
        attach(&parent, &[a0.clone(), a1.clone()]);

        let mut a = [a0.clone(), a1.clone()];
        let b = [a1.clone(), a0.clone()];
        reconcile_fragments(&parent, &mut a, &b);

        assert_eq!(parent.children(), vec![a1, a0]);
    }

    #[test]
    fn reconcile_append_and_remove() {
        let parent = StringNode::new("ul");
        let a0 = StringNode::new("li");
        attach(&parent, &[a0.clone()]);

        let b0 = StringNode::new("li");
        let mut a = [a0.clone()];
        let b = [a0.clone(), b0.clone()];
        reconcile_fragments(&parent, &mut a, &b);
        assert_eq!(parent.children(), vec![a0.clone(), b0.clone()]);

        let mut a2 = [a0.clone(), b0];
        let b2 = [a0.clone()];
        reconcile_fragments(&parent, &mut a2, &b2);
        assert_eq!(parent.children(), vec![a0]);
    }

    #[test]
    fn insert_replaces_current_nodes() {
        let parent = StringNode::new("div");
        let old = StringNode::new("span");
        parent.append_child(&old);

        let new = StringNode::new("span");
        insert(&parent, View::new_node(new.clone()), Some(vec![old]), None);
        assert_eq!(parent.children(), vec![new]);
    }

    #[test]
    fn insert_with_no_current_appends() {
        let parent = StringNode::new("div");
        let node = StringNode::new("span");
        insert(&parent, View::new_node(node.clone()), None, None);
        assert_eq!(parent.children(), vec![node]);
    }
}

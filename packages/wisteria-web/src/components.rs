//! `Show`: the display-toggling control-flow primitive (§4.5 "Show").

use std::borrow::Cow;

use wisteria_core::{insert, GenericNode, View};
use wisteria_reactive::create_effect;

use crate::DomNode;

/// Conditionally shows `children`, toggling the `display` CSS property instead of tearing the
/// subtree down and rebuilding it. `children` is rendered exactly once, up front; every later
/// change to `when` costs one style write, which is the point for a branch expensive enough that
/// it should stay resident rather than remount on every toggle. For a branch that's cheap to
/// tear down, or that must not exist in the tree at all while hidden (e.g. because mounting it
/// has side effects), use a child or conditional binding (see `wisteria_core::bind_child`,
/// `bind_conditional`) instead.
///
/// Wraps `children` in a container element so there's always a single node to toggle `display`
/// on; the container defaults to `display: contents` so it doesn't otherwise affect layout.
pub fn show(mut when: impl FnMut() -> bool + 'static, children: impl FnOnce() -> View<DomNode>) -> View<DomNode> {
    let container = DomNode::create_element(Cow::Borrowed("wisteria-show"));
    container.set_style_property("display", Some("contents"));
    insert(&container, children(), None, None);

    let container_for_effect = container.clone();
    create_effect(move || {
        let display = if when() { Some("contents") } else { Some("none") };
        container_for_effect.set_display(display);
    });

    View::new_node(container)
}

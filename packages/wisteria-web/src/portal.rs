//! `Portal`: renders into a different part of the DOM than its logical position (§4.5 "Portal").

use wisteria_core::View;

use crate::DomNode;

/// Renders `children` under whatever element matches `selector`, instead of wherever `Portal`
/// itself sits in the tree. Cleanup is tied to the *current* root, not to the portal content's own
/// effect, so the portaled subtree unmounts along with its logical parent (see
/// `wisteria_core::bind_portal`).
///
/// # Panics
/// Panics if no element matches `selector`.
pub fn portal(selector: &str, children: impl FnOnce() -> View<DomNode> + 'static) {
    let container = crate::document()
        .query_selector(selector)
        .unwrap_or_else(|e| panic!("invalid portal selector {selector:?}: {e:?}"))
        .unwrap_or_else(|| panic!("no element matches portal selector {selector:?}"));
    let container = DomNode::from_web_sys(container.into());
    wisteria_core::bind_portal(container, children);
}

//! Abstraction over the tree that the core mutates.
//!
//! Everything above this trait — bindings, the keyed-list reconciler, control flow — only ever
//! calls through [`GenericNode`]. A host crate (such as `wisteria-web`) implements it once for
//! its concrete node type and the rest of the stack works unmodified.

use std::borrow::Cow;
use std::fmt::Debug;
use std::hash::Hash;

/// Abstraction over a rendering backend's tree node.
///
/// [`GenericNode`]s should be cheaply cloneable (typically backed by a reference-counted handle)
/// and preserve reference equality: two clones of the same node must compare equal and hash
/// identically, since the keyed-list reconciler and the binding layer use node identity (not
/// structural equality) to decide whether a DOM move is needed.
pub trait GenericNode: Debug + Clone + PartialEq + Eq + Hash + 'static {
    /// Type-erased event data passed to handlers registered with
    /// [`GenericNode::add_event_listener`].
    type EventData;

    /// Creates a new element by tag name.
    fn create_element(tag: Cow<'static, str>) -> Self;

    /// Creates a new element by tag name in a namespace (e.g. SVG, MathML).
    fn create_element_ns(namespace: &'static str, tag: Cow<'static, str>) -> Self;

    /// Creates a new text node.
    fn create_text_node(text: Cow<'static, str>) -> Self;

    /// Creates a marker (dummy) node with no visible rendering. Used by the binding layer and
    /// the keyed-list reconciler as anchors that mark a position in the tree without being part
    /// of its visible content. For DOM hosts this is an empty comment node.
    fn create_marker() -> Self;

    /// Sets an attribute. A `None` value removes the attribute (equivalent to calling
    /// [`GenericNode::remove_attribute`]); this lets callers express the attribute-binding policy
    /// (§4.5) as a single call.
    fn set_attribute(&self, name: &str, value: Option<&str>);

    /// Sets a namespaced attribute (e.g. `xlink:href` in SVG).
    fn set_attribute_ns(&self, namespace: &str, name: &str, value: Option<&str>);

    /// Removes an attribute. A no-op if the attribute is not present.
    fn remove_attribute(&self, name: &str);

    /// Sets a string-valued property directly on the node (as opposed to a serialized attribute).
    /// Used for the element-specific keys the attribute-binding policy classifies as
    /// value-like properties (`value`).
    fn set_property_str(&self, name: &str, value: Cow<'static, str>);

    /// Sets a bool-valued property directly on the node. Used for the element-specific keys the
    /// attribute-binding policy classifies as checked-like properties (`checked`, `selected`,
    /// `disabled`, `readonly`, `multiple`, `muted`).
    fn set_property_bool(&self, name: &str, value: bool);

    /// Sets the `class` attribute wholesale. Distinct from [`GenericNode::set_attribute`] because
    /// DOM hosts can set `className` directly, which is measurably faster than
    /// `setAttribute("class", ...)`.
    fn set_class_name(&self, value: &str);

    /// Toggles a single class token.
    fn set_class(&self, name: &str, enabled: bool);

    /// Sets a single inline style property. `None` removes it.
    fn set_style_property(&self, name: &str, value: Option<&str>);

    /// Sets the `display` CSS property directly. Used by `Show` to toggle visibility without
    /// unmounting, distinct from the general style binding so hosts can special-case it (DOM
    /// hosts route it through `set_style_property("display", ...)` by default).
    fn set_display(&self, value: Option<&str>) {
        self.set_style_property("display", value);
    }

    /// Appends `child` as the last child of `self`.
    fn append_child(&self, child: &Self);

    /// Inserts `new_node` before `reference_node`, or appends it if `reference_node` is `None`.
    fn insert_before(&self, new_node: &Self, reference_node: Option<&Self>);

    /// Removes `child` from `self`'s children.
    fn remove_child(&self, child: &Self);

    /// Replaces `old` with `new` in `self`'s children. The default implementation removes `old`
    /// and inserts `new` in its place; DOM hosts override this with `Node::replaceChild`, which
    /// is a single host call instead of two.
    fn replace_child(&self, old: &Self, new: &Self) {
        self.insert_before(new, Some(old));
        self.remove_child(old);
    }

    /// Removes this node from its parent, if any.
    fn remove_self(&self);

    /// Returns the parent node, or `None` if detached.
    fn parent_node(&self) -> Option<Self>;

    /// Returns the first child, or `None` if this node has no children.
    fn first_child(&self) -> Option<Self>;

    /// Returns the next sibling, or `None` if this is the last sibling.
    fn next_sibling(&self) -> Option<Self>;

    /// Whether this node is currently attached to a connected document (i.e. reachable from a
    /// root that is itself part of the live tree, not merely detached DOM). The connected guard
    /// in the keyed-list reconciler (§4.6 step 1) uses this to decide whether to defer the
    /// initial diff.
    fn is_connected(&self) -> bool;

    /// Registers `f` to run once, the next time this node becomes connected, if it is not
    /// already. The default implementation invokes `f` immediately, which is correct for hosts
    /// with no concept of deferred connection (most non-DOM hosts). DOM hosts override this with
    /// a `MutationObserver`.
    fn on_connected(&self, f: Box<dyn FnOnce()>) {
        f();
    }

    /// Sets the text content of the node, replacing any existing children.
    fn set_text_content(&self, text: Cow<'static, str>);

    /// Adds an event listener. `name` is the event name (e.g. `"click"`).
    fn add_event_listener(&self, name: &'static str, handler: Box<dyn FnMut(Self::EventData)>);

    /// Deep-clones this node and its subtree.
    fn deep_clone(&self) -> Self;
}

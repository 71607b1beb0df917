//! The binding layer (§4.5): effects that keep one piece of the tree in sync with a reactive
//! source. Every binding follows the same shape — open a [`create_render_effect`], read the
//! source, mutate the node — and returns the effect's [`NodeHandle`] so the caller (a component,
//! or the keyed-list reconciler) can dispose it independently of the surrounding root.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wisteria_reactive::{
    create_render_effect, create_root, on_cleanup, propagate_error, propagate_suspense,
    untrack, Control, ControlError, NodeHandle,
};

use crate::generic_node::GenericNode;
use crate::render::{clean_children, insert};
use crate::view::View;

/// Whether an attribute-binding key is classified as a plain attribute or as a DOM property.
/// Exposed so host crates can build their own classification table (§6: "a static table, open to
/// extension at startup") and feed classification decisions into [`bind_attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Set via [`GenericNode::set_attribute`] (or removed when the value is nullish/false).
    Attribute,
    /// Set via [`GenericNode::set_property_str`], falling back to `""` when nullish.
    StringProperty,
    /// Set via [`GenericNode::set_property_bool`], falling back to `false` when nullish.
    BoolProperty,
}

/// A value produced by an attribute-binding source, before the [`PropertyKind`] policy decides
/// how it is written to the node.
#[derive(Debug, Clone)]
pub enum AttrValue {
    /// A nullish value (JSX's `null`/`undefined`): removes the attribute, or resets a property to
    /// its nullish fallback.
    Nullish,
    /// `true`/`false`. For a plain attribute this means "present with no value" / "removed"; for
    /// a property-classified key this writes the boolean directly.
    Bool(bool),
    /// Any other value, already stringified by the caller.
    Str(Cow<'static, str>),
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}
impl From<&'static str> for AttrValue {
    fn from(value: &'static str) -> Self {
        AttrValue::Str(Cow::Borrowed(value))
    }
}
impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(Cow::Owned(value))
    }
}
impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => AttrValue::Nullish,
        }
    }
}

/// Applies the attribute-binding policy (§4.5) once: booleans become presence for plain
/// attributes, nullish/false values are removed, and `kind` overrides the decision for
/// element-specific keys that should instead be written as node properties.
fn apply_attribute<G: GenericNode>(node: &G, name: &str, value: AttrValue, kind: PropertyKind) {
    match kind {
        PropertyKind::Attribute => match value {
            AttrValue::Nullish => node.remove_attribute(name),
            AttrValue::Bool(true) => node.set_attribute(name, Some("")),
            AttrValue::Bool(false) => node.remove_attribute(name),
            AttrValue::Str(s) => node.set_attribute(name, Some(&s)),
        },
        PropertyKind::StringProperty => match value {
            AttrValue::Nullish => node.set_property_str(name, Cow::Borrowed("")),
            AttrValue::Bool(b) => node.set_property_str(name, Cow::Owned(b.to_string())),
            AttrValue::Str(s) => node.set_property_str(name, s),
        },
        PropertyKind::BoolProperty => match value {
            AttrValue::Nullish => node.set_property_bool(name, false),
            AttrValue::Bool(b) => node.set_property_bool(name, b),
            AttrValue::Str(s) => node.set_property_bool(name, !s.is_empty()),
        },
    }
}

/// Binds an attribute or property to a reactive source (§4.5 "Attribute binding"). `kind` decides
/// whether `name` is written as an attribute or a property; host crates derive it from their
/// classification table.
pub fn bind_attribute<G: GenericNode>(
    node: G,
    name: &'static str,
    kind: PropertyKind,
    mut value: impl FnMut() -> AttrValue + 'static,
) -> NodeHandle {
    create_render_effect(move || {
        let next = value();
        apply_attribute(&node, name, next, kind);
    })
}

/// Normalizes a value for the text binding: `None`/`false` become an empty string, everything
/// else is stringified. Implemented for the common scalar types plus `Option<T>`.
pub trait TextLike {
    /// Produces the normalized text.
    fn normalize_text(self) -> Cow<'static, str>;
}

impl TextLike for Cow<'static, str> {
    fn normalize_text(self) -> Cow<'static, str> {
        self
    }
}
impl TextLike for String {
    fn normalize_text(self) -> Cow<'static, str> {
        Cow::Owned(self)
    }
}
impl TextLike for &'static str {
    fn normalize_text(self) -> Cow<'static, str> {
        Cow::Borrowed(self)
    }
}
impl TextLike for bool {
    fn normalize_text(self) -> Cow<'static, str> {
        if self {
            Cow::Borrowed("true")
        } else {
            Cow::Borrowed("")
        }
    }
}
impl<T: TextLike> TextLike for Option<T> {
    fn normalize_text(self) -> Cow<'static, str> {
        match self {
            Some(value) => value.normalize_text(),
            None => Cow::Borrowed(""),
        }
    }
}

macro_rules! impl_text_like_for_display {
    ($($ty:ty),*) => {
        $(
            impl TextLike for $ty {
                fn normalize_text(self) -> Cow<'static, str> {
                    Cow::Owned(self.to_string())
                }
            }
        )*
    };
}
impl_text_like_for_display!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// Binds a text node's data to a reactive source (§4.5 "Text binding").
pub fn bind_text<G: GenericNode, T: TextLike>(
    node: G,
    mut value: impl FnMut() -> T + 'static,
) -> NodeHandle {
    create_render_effect(move || {
        node.set_text_content(value().normalize_text());
    })
}

/// A class binding's source: either a single string (overwrites wholesale) or a set of
/// `(name, enabled)` pairs (toggles individual classes, preserving any static classes present
/// when the binding was created — §4.5 "Class binding").
#[derive(Debug, Clone)]
pub enum ClassValue {
    /// Overwrites the whole `class` attribute.
    Str(Cow<'static, str>),
    /// Enables/disables the listed classes; anything not listed is left untouched.
    Map(Vec<(Cow<'static, str>, bool)>),
}

/// Binds the `class` attribute/classList to a reactive source.
pub fn bind_class<G: GenericNode>(
    node: G,
    mut value: impl FnMut() -> ClassValue + 'static,
) -> NodeHandle {
    // Classes present before the first run are preserved across `Map` updates.
    let static_classes: Rc<RefCell<Option<Vec<Cow<'static, str>>>>> = Rc::new(RefCell::new(None));
    create_render_effect(move || match value() {
        ClassValue::Str(class) => node.set_class_name(&class),
        ClassValue::Map(entries) => {
            let mut statics = static_classes.borrow_mut();
            if statics.is_none() {
                *statics = Some(entries.iter().map(|(name, _)| name.clone()).collect());
            }
            for (name, enabled) in &entries {
                node.set_class(name, *enabled);
            }
            for name in statics.as_ref().unwrap() {
                if !entries.iter().any(|(n, _)| n == name) {
                    node.set_class(name, true);
                }
            }
        }
    })
}

/// CSS properties whose numeric values are written without a `px` suffix (§4.5 "Style binding").
pub const UNITLESS_STYLE_PROPERTIES: &[&str] = &[
    "animation-iteration-count",
    "border-image-outset",
    "border-image-slice",
    "border-image-width",
    "box-flex",
    "box-flex-group",
    "box-ordinal-group",
    "column-count",
    "columns",
    "flex",
    "flex-grow",
    "flex-positive",
    "flex-shrink",
    "flex-negative",
    "flex-order",
    "grid-area",
    "grid-row",
    "grid-row-end",
    "grid-row-span",
    "grid-row-start",
    "grid-column",
    "grid-column-end",
    "grid-column-span",
    "grid-column-start",
    "font-weight",
    "line-clamp",
    "line-height",
    "opacity",
    "order",
    "orphans",
    "tab-size",
    "widows",
    "z-index",
    "zoom",
];

/// Converts a camelCase style key (`zIndex`) to kebab-case (`z-index`). Keys already in
/// kebab-case pass through unchanged.
pub fn kebab_case_style_key(key: &str) -> Cow<'static, str> {
    if !key.bytes().any(|b| b.is_ascii_uppercase()) {
        return Cow::Owned(key.to_string());
    }
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    Cow::Owned(out)
}

/// Formats a style value: numbers get a `px` suffix unless their (already kebab-cased) property
/// name is in [`UNITLESS_STYLE_PROPERTIES`].
pub fn format_style_value(property: &str, value: StyleNumericValue) -> String {
    match value {
        StyleNumericValue::Str(s) => s.into_owned(),
        StyleNumericValue::Num(n) => {
            if UNITLESS_STYLE_PROPERTIES.contains(&property) {
                format_number(n)
            } else {
                format!("{}px", format_number(n))
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// A style binding's numeric-or-string value, before unit formatting.
#[derive(Debug, Clone, Copy)]
pub enum StyleNumericValue {
    /// Already a formatted string; passed through verbatim.
    Str(Cow<'static, str>),
    /// A bare number; formatted per [`format_style_value`]'s unit policy.
    Num(f64),
}

/// A style binding's source: a CSS string (overwrites wholesale) or a map of properties to
/// values. On rebind, properties present in the previous map but absent from the next are
/// removed (§4.5 "Style binding").
#[derive(Debug, Clone)]
pub enum StyleValue {
    /// Overwrites the whole inline `style` attribute.
    Str(Cow<'static, str>),
    /// `(kebab-or-camel-case property, value)` pairs.
    Map(Vec<(Cow<'static, str>, StyleNumericValue)>),
}

/// Binds the inline `style` attribute to a reactive source.
pub fn bind_style<G: GenericNode>(
    node: G,
    mut value: impl FnMut() -> StyleValue + 'static,
) -> NodeHandle {
    let previous_keys: Rc<RefCell<Vec<Cow<'static, str>>>> = Rc::new(RefCell::new(Vec::new()));
    create_render_effect(move || match value() {
        StyleValue::Str(style) => {
            node.set_attribute("style", Some(&style));
            previous_keys.borrow_mut().clear();
        }
        StyleValue::Map(entries) => {
            let mut previous = previous_keys.borrow_mut();
            let mut next_keys = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = kebab_case_style_key(&key);
                let formatted = format_style_value(&key, value);
                node.set_style_property(&key, Some(&formatted));
                next_keys.push(key);
            }
            for key in previous.iter() {
                if !next_keys.contains(key) {
                    node.set_style_property(key, None);
                }
            }
            *previous = next_keys;
        }
    })
}

/// The general reactive child binding (§4.5 "Child binding"): tears down the previous subtree's
/// root on every re-run, evaluates `render` for the new value, mounts it under a fresh nested
/// root, and routes thrown errors/suspense tokens to the enclosing chains.
///
/// `parent`/`marker` describe where to insert: nodes go immediately before `marker` (or appended,
/// if `marker` is `None`).
pub fn bind_child<G: GenericNode>(
    parent: G,
    marker: Option<G>,
    mut render: impl FnMut() -> Result<View<G>, Control> + 'static,
) -> NodeHandle {
    let current: Rc<RefCell<Option<(Vec<G>, NodeHandle)>>> = Rc::new(RefCell::new(None));
    create_render_effect(move || {
        let old_nodes = if let Some((nodes, child_root)) = current.borrow_mut().take() {
            child_root.dispose();
            Some(nodes)
        } else {
            None
        };
        let (root_value, root_handle) = create_root(|| render());
        match root_value {
            Ok(view) => {
                let nodes = untrack(&|| view.clone().flatten());
                insert(&parent, view, old_nodes, marker.as_ref());
                *current.borrow_mut() = Some((nodes, root_handle));
            }
            Err(Control::Error(err)) => {
                root_handle.dispose();
                if let Some(old_nodes) = old_nodes {
                    clean_children(&parent, old_nodes, None);
                }
                propagate_error(&err);
            }
            Err(Control::Suspend(token)) => {
                if let Some(old_nodes) = old_nodes {
                    clean_children(&parent, old_nodes, None);
                }
                propagate_suspense(token);
            }
        }
    })
}

/// An optimization of [`bind_child`] for boolean-gated branches (§4.5 "Conditional binding"):
/// skips teardown when the condition hasn't changed since the last run, and keeps a stable
/// start/end marker pair so the insertion range never moves even while its content does.
pub fn bind_conditional<G: GenericNode>(
    parent: G,
    end_marker: G,
    mut condition: impl FnMut() -> bool + 'static,
    mut render_true: impl FnMut() -> View<G> + 'static,
    mut render_false: impl FnMut() -> View<G> + 'static,
) -> NodeHandle {
    let state: Rc<RefCell<Option<(bool, Vec<G>, NodeHandle)>>> = Rc::new(RefCell::new(None));
    create_render_effect(move || {
        let next_condition = condition();
        let mut state_ref = state.borrow_mut();
        if let Some((prev_condition, _, _)) = state_ref.as_ref() {
            if *prev_condition == next_condition {
                return;
            }
        }
        let old_nodes = if let Some((_, nodes, old_root)) = state_ref.take() {
            old_root.dispose();
            Some(nodes)
        } else {
            None
        };
        let (view, root_handle) = create_root(|| {
            if next_condition {
                render_true()
            } else {
                render_false()
            }
        });
        let nodes = untrack(&|| view.clone().flatten());
        insert(&parent, view, old_nodes, Some(&end_marker));
        *state_ref = Some((next_condition, nodes, root_handle));
    })
}

/// Renders `children` under `container` instead of `parent` (§4.5 "Portal"). Cleanup is
/// registered on the *creating* root (via [`on_cleanup`]), not on the binding's own effect, so
/// the portaled content unmounts together with its logical parent rather than whenever the
/// portal's source happens to re-run.
pub fn bind_portal<G: GenericNode>(container: G, children: impl FnOnce() -> View<G>) {
    let (view, root_handle) = create_root(children);
    let nodes = untrack(&|| view.clone().flatten());
    insert(&container, view, None, None);
    on_cleanup(move || {
        root_handle.dispose();
    });
}

/// A static-vs-dynamic attribute-name key used by a host's property/attribute classification
/// table (§6). Host crates build a `HashMap<&'static str, PropertyKind>` keyed by attribute name
/// (optionally scoped per tag) and look it up before calling [`bind_attribute`].
pub type ClassificationTable = HashMap<&'static str, PropertyKind>;

#[cfg(test)]
mod tests {
    use wisteria_reactive::{create_root, create_signal};

    use super::*;
    use crate::test_support::StringNode;

    #[test]
    fn text_binding_normalizes_nullish_and_false_to_empty() {
        let _ = create_root(|| {
            let node = StringNode::create_text_node("".into());
            let value = create_signal(Some(true));
            bind_text(node.clone(), move || value.get());
            assert_eq!(node.text(), "true");

            value.set(Some(false));
            assert_eq!(node.text(), "");

            value.set(None);
            assert_eq!(node.text(), "");
        });
    }

    #[test]
    fn attribute_binding_removes_on_false_and_sets_empty_on_true() {
        let _ = create_root(|| {
            let node = StringNode::new("input");
            let value = create_signal(true);
            bind_attribute(node.clone(), "disabled", PropertyKind::Attribute, move || {
                AttrValue::Bool(value.get())
            });
            assert_eq!(node.attribute("disabled"), Some("".to_string()));

            value.set(false);
            assert_eq!(node.attribute("disabled"), None);
        });
    }

    #[test]
    fn attribute_binding_classified_as_property_writes_property() {
        let _ = create_root(|| {
            let node = StringNode::new("input");
            let value = create_signal(AttrValue::Str(Cow::Borrowed("hello")) as AttrValue);
            bind_attribute(node.clone(), "value", PropertyKind::StringProperty, {
                let value = value;
                move || value.get_clone()
            });
            assert_eq!(node.property("value"), Some("hello".to_string()));
            assert_eq!(node.attribute("value"), None);
        });
    }

    #[test]
    fn class_binding_map_preserves_statics_and_toggles() {
        let _ = create_root(|| {
            let node = StringNode::new("div");
            node.set_class_name("static-class");
            let enabled = create_signal(true);
            bind_class(node.clone(), move || {
                ClassValue::Map(vec![(Cow::Borrowed("active"), enabled.get())])
            });
            assert!(node.has_class("active"));
            assert!(node.has_class("static-class"));

            enabled.set(false);
            assert!(!node.has_class("active"));
            assert!(node.has_class("static-class"));
        });
    }

    #[test]
    fn style_binding_removes_stale_keys_and_formats_px() {
        let _ = create_root(|| {
            let node = StringNode::new("div");
            let phase = create_signal(0u32);
            bind_style(node.clone(), move || match phase.get() {
                0 => StyleValue::Map(vec![
                    (Cow::Borrowed("width"), StyleNumericValue::Num(10.0)),
                    (Cow::Borrowed("zIndex"), StyleNumericValue::Num(2.0)),
                ]),
                _ => StyleValue::Map(vec![(Cow::Borrowed("width"), StyleNumericValue::Num(20.0))]),
            });
            assert_eq!(node.style("width"), Some("10px".to_string()));
            assert_eq!(node.style("z-index"), Some("2".to_string()));

            phase.set(1);
            assert_eq!(node.style("width"), Some("20px".to_string()));
            assert_eq!(node.style("z-index"), None);
        });
    }

    #[test]
    fn child_binding_tears_down_previous_subtree_on_rerun() {
        let _ = create_root(|| {
            let parent = StringNode::new("div");
            let phase = create_signal(0u32);
            bind_child(parent.clone(), None, move || {
                let node = StringNode::new(if phase.get() == 0 { "a" } else { "b" });
                Ok(View::new_node(node))
            });
            assert_eq!(parent.children().len(), 1);
            assert!(format!("{:?}", parent.children()[0]).starts_with("<a"));
            phase.set(1);
            assert_eq!(parent.children().len(), 1);
            assert!(format!("{:?}", parent.children()[0]).starts_with("<b"));
        });
    }

    #[test]
    fn conditional_binding_skips_teardown_when_condition_unchanged() {
        let _ = create_root(|| {
            let parent = StringNode::new("div");
            let end = StringNode::create_marker();
            parent.append_child(&end);
            let condition = create_signal(true);
            let runs = create_signal(0);
            bind_conditional(
                parent.clone(),
                end,
                move || condition.get(),
                move || {
                    runs.set(runs.get_untracked() + 1);
                    View::new_node(StringNode::new("a"))
                },
                move || View::new_node(StringNode::new("b")),
            );
            assert_eq!(runs.get(), 1);
            condition.set(true); // unchanged: signal write still dirties, but handler short-circuits
            assert_eq!(runs.get(), 1);
        });
    }
}

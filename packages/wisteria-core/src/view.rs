//! Representation of a rendered UI fragment.

use std::fmt;
use std::rc::Rc;

use wisteria_reactive::{create_effect, create_signal_with_equals, Signal};

use crate::generic_node::GenericNode;

/// Internal representation of [`View`].
enum ViewInner<G: GenericNode> {
    /// A single tree node.
    Node(G),
    /// A view whose node set changes over time. Re-run on every change of the inner signal by
    /// whatever effect created it (typically a child binding); the signal itself just holds the
    /// latest set of nodes for [`View::flatten`] to read.
    Dyn(Signal<View<G>>),
    /// A fixed-size fragment of sub-views, flattened depth-first.
    Fragment(Rc<[View<G>]>),
}

impl<G: GenericNode> Clone for ViewInner<G> {
    fn clone(&self) -> Self {
        match self {
            Self::Node(node) => Self::Node(node.clone()),
            Self::Dyn(signal) => Self::Dyn(*signal),
            Self::Fragment(fragment) => Self::Fragment(fragment.clone()),
        }
    }
}

/// A view: the unit of rendered output that bindings and components produce.
///
/// A view is either a single host node, a fragment of several views, or a dynamic view whose
/// node set is replaced over time (driven by whatever effect produced it — see
/// [`View::new_dyn`]).
pub struct View<G: GenericNode> {
    inner: ViewInner<G>,
}

impl<G: GenericNode> Clone for View<G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<G: GenericNode> View<G> {
    /// Wraps a single node.
    pub fn new_node(node: G) -> Self {
        Self {
            inner: ViewInner::Node(node),
        }
    }

    /// Wraps a fragment of views.
    pub fn new_fragment(views: Vec<View<G>>) -> Self {
        Self {
            inner: ViewInner::Fragment(Rc::from(views.into_boxed_slice())),
        }
    }

    /// Creates a dynamic view from a closure re-evaluated by an enclosing effect. The closure
    /// runs once immediately to produce the initial value; callers that need to react to the
    /// closure's dependencies (the common case — a child binding) should instead build the
    /// [`Signal`] themselves inside their own effect and call [`View::from_signal`], since that
    /// lets the binding control when old nodes are torn down relative to when new ones are
    /// created. This constructor is for the simple case of a view with no cleanup requirements.
    pub fn new_dyn(mut f: impl FnMut() -> View<G> + 'static) -> Self {
        let initial = f();
        // Views have no meaningful equality; every recomputation is a real change.
        let signal = create_signal_with_equals(initial, |_: &View<G>, _: &View<G>| false);
        create_effect(move || {
            let next = f();
            signal.set(next);
        });
        Self::from_signal(signal)
    }

    /// Wraps a signal of views directly, without creating the driving effect.
    pub fn from_signal(signal: Signal<View<G>>) -> Self {
        Self {
            inner: ViewInner::Dyn(signal),
        }
    }

    /// An empty view: a single marker node with no visible content.
    pub fn empty() -> Self {
        Self::new_node(G::create_marker())
    }

    /// Returns the single node, if this view wraps exactly one.
    pub fn as_node(&self) -> Option<&G> {
        match &self.inner {
            ViewInner::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Flattens the view into its current list of host nodes, depth-first.
    pub fn flatten(self) -> Vec<G> {
        match self.inner {
            ViewInner::Node(node) => vec![node],
            ViewInner::Dyn(signal) => signal.get_clone().flatten(),
            ViewInner::Fragment(fragment) => fragment
                .iter()
                .cloned()
                .flat_map(View::flatten)
                .collect(),
        }
    }
}

impl<G: GenericNode> Default for View<G> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<G: GenericNode> fmt::Debug for View<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ViewInner::Node(node) => node.fmt(f),
            ViewInner::Dyn(signal) => signal.get_clone().fmt(f),
            ViewInner::Fragment(fragment) => fragment.fmt(f),
        }
    }
}

/// Converts a value into a [`View`]. Implemented for host node types, text-like values, and
/// collections of views; components implement this for their return type.
pub trait IntoView<G: GenericNode> {
    /// Produces the view.
    fn into_view(self) -> View<G>;
}

impl<G: GenericNode> IntoView<G> for View<G> {
    fn into_view(self) -> View<G> {
        self
    }
}

impl<G: GenericNode> IntoView<G> for Vec<View<G>> {
    fn into_view(self) -> View<G> {
        View::new_fragment(self)
    }
}

impl<G: GenericNode> IntoView<G> for Option<View<G>> {
    fn into_view(self) -> View<G> {
        self.unwrap_or_default()
    }
}

macro_rules! impl_into_view_for_display {
    ($($ty:ty),*) => {
        $(
            impl<G: GenericNode> IntoView<G> for $ty {
                fn into_view(self) -> View<G> {
                    View::new_node(G::create_text_node(self.to_string().into()))
                }
            }
        )*
    };
}

impl_into_view_for_display!(
    &'static str, String, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
    f32, f64
);

#[cfg(test)]
mod tests {
    use wisteria_reactive::create_root;

    use super::*;
    use crate::test_support::StringNode;

    #[test]
    fn flatten_node_returns_itself() {
        let node = StringNode::new("a");
        let view: View<StringNode> = View::new_node(node.clone());
        assert_eq!(view.flatten(), vec![node]);
    }

    #[test]
    fn flatten_fragment_is_depth_first() {
        let a = StringNode::new("a");
        let b = StringNode::new("b");
        let view: View<StringNode> =
            View::new_fragment(vec![View::new_node(a.clone()), View::new_node(b.clone())]);
        assert_eq!(view.flatten(), vec![a, b]);
    }

    #[test]
    fn dyn_view_flattens_to_current_value() {
        let _ = create_root(|| {
            let a = StringNode::new("a");
            let b = StringNode::new("b");
            let toggle = wisteria_reactive::create_signal(false);
            let a2 = a.clone();
            let b2 = b.clone();
            let view: View<StringNode> =
                View::new_dyn(move || View::new_node(if toggle.get() { b2.clone() } else { a2.clone() }));
            assert_eq!(view.clone().flatten(), vec![a]);
            toggle.set(true);
            assert_eq!(view.flatten(), vec![b]);
        });
    }
}

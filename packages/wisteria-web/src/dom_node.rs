//! The DOM [`GenericNode`] implementation: everything above this module (bindings, the keyed-list
//! reconciler, control flow) only ever calls through that trait, so this is the only file in the
//! crate that actually touches `web_sys`/`wasm_bindgen`.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use wasm_bindgen::intern;
use wasm_bindgen::prelude::*;
use web_sys::{Comment, Element, MutationObserver, MutationObserverInit, Node, Text};
use wisteria_core::generic_node::GenericNode;

use crate::document;

#[wasm_bindgen]
extern "C" {
    /// Extends [`Node`] with an expando id field, since `web_sys::Node` has no [`Hash`] impl of
    /// its own.
    #[wasm_bindgen(extends = Node)]
    type NodeWithId;
    #[wasm_bindgen(method, getter, js_name = "$$$nodeId")]
    fn node_id(this: &NodeWithId) -> Option<u64>;
    #[wasm_bindgen(method, setter, js_name = "$$$nodeId")]
    fn set_node_id(this: &NodeWithId, id: u64);

    /// `Element.className` has a failable setter on SVG elements (it's an `SVGAnimatedString`
    /// there, not a plain string); falling back to `setAttribute("class", ...)` handles both.
    #[wasm_bindgen(extends = Element)]
    type ElementTrySetClassName;
    #[wasm_bindgen(method, catch, setter, js_name = "className")]
    fn try_set_class_name(this: &ElementTrySetClassName, value: &str) -> Result<(), JsValue>;
}

fn next_node_id(node: &Node) -> u64 {
    thread_local!(static COUNTER: Cell<u64> = const { Cell::new(1) }); // 0 means "unassigned".
    let id = COUNTER.with(|c| {
        let next = c.get();
        c.set(next + 1);
        next
    });
    node.unchecked_ref::<NodeWithId>().set_node_id(id);
    id
}

fn node_id(node: &Node) -> u64 {
    let ext = node.unchecked_ref::<NodeWithId>();
    match ext.node_id() {
        Some(id) => id,
        None => next_node_id(node),
    }
}

/// A [`GenericNode`] backed by a real `web_sys::Node`.
#[derive(Clone)]
pub struct DomNode {
    node: Node,
}

impl DomNode {
    /// Wraps an existing `web_sys::Node`, e.g. the app's mount point.
    pub fn from_web_sys(node: Node) -> Self {
        Self { node }
    }

    /// Returns the underlying `web_sys::Node`.
    pub fn as_web_sys(&self) -> &Node {
        &self.node
    }

    /// Casts the underlying node, panicking if it is not an instance of `T`.
    pub fn unchecked_into<T: JsCast>(self) -> T {
        self.node.unchecked_into()
    }
}

impl PartialEq for DomNode {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}
impl Eq for DomNode {}

impl Hash for DomNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        node_id(&self.node).hash(state);
    }
}

impl fmt::Debug for DomNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = if let Some(el) = self.node.dyn_ref::<Element>() {
            el.outer_html()
        } else if let Some(text) = self.node.dyn_ref::<Text>() {
            text.text_content().unwrap_or_default()
        } else if let Some(comment) = self.node.dyn_ref::<Comment>() {
            format!("<!--{}-->", comment.text_content().unwrap_or_default())
        } else {
            "<node>".to_string()
        };
        f.debug_tuple("DomNode").field(&text).finish()
    }
}

impl GenericNode for DomNode {
    type EventData = web_sys::Event;

    fn create_element(tag: Cow<'static, str>) -> Self {
        let node = document()
            .create_element(intern(&tag))
            .unwrap_throw()
            .into();
        DomNode { node }
    }

    fn create_element_ns(namespace: &'static str, tag: Cow<'static, str>) -> Self {
        let node = document()
            .create_element_ns(Some(intern(namespace)), intern(&tag))
            .unwrap_throw()
            .into();
        DomNode { node }
    }

    fn create_text_node(text: Cow<'static, str>) -> Self {
        DomNode {
            node: document().create_text_node(&text).into(),
        }
    }

    fn create_marker() -> Self {
        DomNode {
            node: document().create_comment("").into(),
        }
    }

    fn set_attribute(&self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => self
                .node
                .unchecked_ref::<Element>()
                .set_attribute(intern(name), value)
                .unwrap_throw(),
            None => self.remove_attribute(name),
        }
    }

    fn set_attribute_ns(&self, namespace: &str, name: &str, value: Option<&str>) {
        match value {
            Some(value) => self
                .node
                .unchecked_ref::<Element>()
                .set_attribute_ns(Some(namespace), intern(name), value)
                .unwrap_throw(),
            None => self
                .node
                .unchecked_ref::<Element>()
                .remove_attribute_ns(Some(namespace), name)
                .unwrap_throw(),
        }
    }

    fn remove_attribute(&self, name: &str) {
        self.node
            .unchecked_ref::<Element>()
            .remove_attribute(intern(name))
            .unwrap_throw();
    }

    fn set_property_str(&self, name: &str, value: Cow<'static, str>) {
        js_sys::Reflect::set(&self.node, &JsValue::from_str(name), &JsValue::from_str(&value))
            .unwrap_throw();
    }

    fn set_property_bool(&self, name: &str, value: bool) {
        js_sys::Reflect::set(&self.node, &JsValue::from_str(name), &JsValue::from_bool(value))
            .unwrap_throw();
    }

    fn set_class_name(&self, value: &str) {
        if self
            .node
            .unchecked_ref::<ElementTrySetClassName>()
            .try_set_class_name(value)
            .is_err()
        {
            // SVG elements only expose `className` as an `SVGAnimatedString`.
            self.node
                .unchecked_ref::<Element>()
                .set_attribute("class", value)
                .unwrap_throw();
        }
    }

    fn set_class(&self, name: &str, enabled: bool) {
        let list = self.node.unchecked_ref::<Element>().class_list();
        if enabled {
            list.add_1(name).unwrap_throw();
        } else {
            list.remove_1(name).unwrap_throw();
        }
    }

    fn set_style_property(&self, name: &str, value: Option<&str>) {
        let style = self
            .node
            .unchecked_ref::<web_sys::HtmlElement>()
            .style();
        match value {
            Some(value) => style.set_property(name, value).unwrap_throw(),
            None => {
                style.remove_property(name).unwrap_throw();
            }
        }
    }

    fn append_child(&self, child: &Self) {
        self.node.append_child(&child.node).unwrap_throw();
    }

    fn insert_before(&self, new_node: &Self, reference_node: Option<&Self>) {
        self.node
            .insert_before(&new_node.node, reference_node.map(|n| &n.node))
            .unwrap_throw();
    }

    fn remove_child(&self, child: &Self) {
        self.node.remove_child(&child.node).unwrap_throw();
    }

    fn replace_child(&self, old: &Self, new: &Self) {
        self.node.replace_child(&new.node, &old.node).unwrap_throw();
    }

    fn remove_self(&self) {
        if let Some(parent) = self.node.parent_node() {
            parent.remove_child(&self.node).unwrap_throw();
        }
    }

    fn parent_node(&self) -> Option<Self> {
        self.node.parent_node().map(|node| DomNode { node })
    }

    fn first_child(&self) -> Option<Self> {
        self.node.first_child().map(|node| DomNode { node })
    }

    fn next_sibling(&self) -> Option<Self> {
        self.node.next_sibling().map(|node| DomNode { node })
    }

    fn is_connected(&self) -> bool {
        self.node.is_connected()
    }

    fn on_connected(&self, f: Box<dyn FnOnce()>) {
        if self.is_connected() {
            f();
            return;
        }
        // Watches the whole document for subtree changes until this node shows up connected.
        // Detaching a node from the keyed-list/child-binding machinery always goes through
        // `Document`, so a single document-level observer is enough; we don't need one per node.
        let node = self.node.clone();
        let f = Rc::new(RefCell::new(Some(f)));
        let observer_slot: Rc<RefCell<Option<MutationObserver>>> = Rc::new(RefCell::new(None));
        let observer_slot_for_closure = observer_slot.clone();
        let closure = Closure::<dyn FnMut()>::new(move || {
            if node.is_connected() {
                if let Some(f) = f.borrow_mut().take() {
                    f();
                }
                if let Some(observer) = observer_slot_for_closure.borrow_mut().take() {
                    observer.disconnect();
                }
            }
        });
        let observer = MutationObserver::new(closure.as_ref().unchecked_ref()).unwrap_throw();
        let mut init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer
            .observe_with_options(&document(), &init)
            .unwrap_throw();
        *observer_slot.borrow_mut() = Some(observer);
        closure.forget();
    }

    fn set_text_content(&self, text: Cow<'static, str>) {
        self.node.set_text_content(Some(&text));
    }

    fn add_event_listener(&self, name: &'static str, mut handler: Box<dyn FnMut(Self::EventData)>) {
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
            handler(event);
        });
        self.node
            .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
            .unwrap_throw();
        wisteria_reactive::on_cleanup(move || drop(closure));
    }

    fn deep_clone(&self) -> Self {
        DomNode {
            node: self.node.clone_node_with_deep(true).unwrap_throw(),
        }
    }
}

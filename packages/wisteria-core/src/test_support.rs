//! A minimal in-memory [`GenericNode`] implementation used only by this crate's own tests.
//!
//! None of the other crates in this workspace depend on it; it exists so the binding layer and
//! keyed-list reconciler — both entirely generic over `GenericNode` — can be tested without
//! pulling in a real DOM (which would require `wasm-bindgen-test` and a browser/`jsdom` runner).

#![cfg(test)]

use std::cell::RefCell;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::generic_node::GenericNode;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Element(Cow<'static, str>),
    Text,
    Marker,
}

struct Inner {
    id: u64,
    kind: Kind,
    text: RefCell<String>,
    attributes: RefCell<HashMap<String, String>>,
    classes: RefCell<Vec<String>>,
    styles: RefCell<HashMap<String, String>>,
    parent: RefCell<Option<StringNode>>,
    children: RefCell<Vec<StringNode>>,
}

/// A cheaply-cloneable handle to an in-memory test node, identified by a unique id.
#[derive(Clone)]
pub(crate) struct StringNode(Rc<Inner>);

thread_local! {
    static NEXT_ID: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
}

fn next_id() -> u64 {
    NEXT_ID.with(|cell| {
        let id = cell.get();
        cell.set(id + 1);
        id
    })
}

impl StringNode {
    pub(crate) fn new(tag: &'static str) -> Self {
        Self(Rc::new(Inner {
            id: next_id(),
            kind: Kind::Element(Cow::Borrowed(tag)),
            text: RefCell::new(String::new()),
            attributes: RefCell::new(HashMap::new()),
            classes: RefCell::new(Vec::new()),
            styles: RefCell::new(HashMap::new()),
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        }))
    }

    pub(crate) fn attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub(crate) fn property(&self, name: &str) -> Option<String> {
        self.attribute(&format!("prop:{name}"))
    }

    pub(crate) fn style(&self, name: &str) -> Option<String> {
        self.0.styles.borrow().get(name).cloned()
    }

    pub(crate) fn has_class(&self, name: &str) -> bool {
        self.0.classes.borrow().iter().any(|c| c == name)
    }

    pub(crate) fn text(&self) -> String {
        self.0.text.borrow().clone()
    }

    pub(crate) fn children(&self) -> Vec<StringNode> {
        self.0.children.borrow().clone()
    }
}

impl PartialEq for StringNode {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for StringNode {}

impl std::hash::Hash for StringNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for StringNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            Kind::Element(tag) => write!(f, "<{tag} id={}>", self.0.id),
            Kind::Text => write!(f, "text({:?})", self.0.text.borrow()),
            Kind::Marker => write!(f, "<!--marker {}-->", self.0.id),
        }
    }
}

impl GenericNode for StringNode {
    type EventData = ();

    fn create_element(tag: Cow<'static, str>) -> Self {
        Self(Rc::new(Inner {
            id: next_id(),
            kind: Kind::Element(tag),
            text: RefCell::new(String::new()),
            attributes: RefCell::new(HashMap::new()),
            classes: RefCell::new(Vec::new()),
            styles: RefCell::new(HashMap::new()),
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        }))
    }

    fn create_element_ns(_namespace: &'static str, tag: Cow<'static, str>) -> Self {
        Self::create_element(tag)
    }

    fn create_text_node(text: Cow<'static, str>) -> Self {
        Self(Rc::new(Inner {
            id: next_id(),
            kind: Kind::Text,
            text: RefCell::new(text.into_owned()),
            attributes: RefCell::new(HashMap::new()),
            classes: RefCell::new(Vec::new()),
            styles: RefCell::new(HashMap::new()),
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        }))
    }

    fn create_marker() -> Self {
        Self(Rc::new(Inner {
            id: next_id(),
            kind: Kind::Marker,
            text: RefCell::new(String::new()),
            attributes: RefCell::new(HashMap::new()),
            classes: RefCell::new(Vec::new()),
            styles: RefCell::new(HashMap::new()),
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        }))
    }

    fn set_attribute(&self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.0
                    .attributes
                    .borrow_mut()
                    .insert(name.to_string(), value.to_string());
            }
            None => self.remove_attribute(name),
        }
    }

    fn set_attribute_ns(&self, _namespace: &str, name: &str, value: Option<&str>) {
        self.set_attribute(name, value);
    }

    fn remove_attribute(&self, name: &str) {
        self.0.attributes.borrow_mut().remove(name);
    }

    fn set_property_str(&self, name: &str, value: Cow<'static, str>) {
        self.0
            .attributes
            .borrow_mut()
            .insert(format!("prop:{name}"), value.into_owned());
    }

    fn set_property_bool(&self, name: &str, value: bool) {
        self.0
            .attributes
            .borrow_mut()
            .insert(format!("prop:{name}"), value.to_string());
    }

    fn set_class_name(&self, value: &str) {
        *self.0.classes.borrow_mut() = value.split_whitespace().map(str::to_string).collect();
    }

    fn set_class(&self, name: &str, enabled: bool) {
        let mut classes = self.0.classes.borrow_mut();
        classes.retain(|c| c != name);
        if enabled {
            classes.push(name.to_string());
        }
    }

    fn set_style_property(&self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.0
                    .styles
                    .borrow_mut()
                    .insert(name.to_string(), value.to_string());
            }
            None => {
                self.0.styles.borrow_mut().remove(name);
            }
        }
    }

    fn append_child(&self, child: &Self) {
        self.insert_before(child, None);
    }

    fn insert_before(&self, new_node: &Self, reference_node: Option<&Self>) {
        new_node.remove_self();
        let mut children = self.0.children.borrow_mut();
        let index = match reference_node {
            Some(reference) => children
                .iter()
                .position(|c| c == reference)
                .unwrap_or(children.len()),
            None => children.len(),
        };
        children.insert(index, new_node.clone());
        *new_node.0.parent.borrow_mut() = Some(self.clone());
    }

    fn remove_child(&self, child: &Self) {
        self.0.children.borrow_mut().retain(|c| c != child);
        *child.0.parent.borrow_mut() = None;
    }

    fn remove_self(&self) {
        if let Some(parent) = self.parent_node() {
            parent.remove_child(self);
        }
    }

    fn parent_node(&self) -> Option<Self> {
        self.0.parent.borrow().clone()
    }

    fn first_child(&self) -> Option<Self> {
        self.0.children.borrow().first().cloned()
    }

    fn next_sibling(&self) -> Option<Self> {
        let parent = self.parent_node()?;
        let children = parent.0.children.borrow();
        let index = children.iter().position(|c| c == self)?;
        children.get(index + 1).cloned()
    }

    fn is_connected(&self) -> bool {
        // The test tree has no document root; treat every node reachable from some ancestor
        // chain as connected, which is sufficient for exercising non-deferred reconciler paths.
        true
    }

    fn set_text_content(&self, text: Cow<'static, str>) {
        self.0.children.borrow_mut().clear();
        *self.0.text.borrow_mut() = text.into_owned();
    }

    fn add_event_listener(&self, _name: &'static str, _handler: Box<dyn FnMut(())>) {}

    fn deep_clone(&self) -> Self {
        let clone = Self::create_element(match &self.0.kind {
            Kind::Element(tag) => tag.clone(),
            _ => Cow::Borrowed(""),
        });
        clone
    }
}

//! DOM rendering backend for wisteria: the [`DomNode`] [`GenericNode`] implementation, plus the
//! control-flow components (`Show`, `Keyed`, `Indexed`, `Portal`, `ErrorBoundary`, `Suspense`)
//! built on top of `wisteria-core`'s generic binding layer and keyed-list reconciler.
//!
//! Everything generic (bindings, reconciliation, the reactive graph itself) lives in
//! `wisteria-core`/`wisteria-reactive`; this crate only supplies the concrete `web_sys` glue.

#![deny(missing_debug_implementations)]
#![warn(missing_docs)]

use std::cell::Cell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wisteria_core::View;
use wisteria_reactive::{create_root, on_cleanup};

pub mod classify;
pub mod components;
pub mod dom_node;
pub mod error_boundary;
pub mod iter;
pub mod portal;
pub mod suspense;

pub use classify::*;
pub use components::*;
pub use dom_node::DomNode;
pub use error_boundary::*;
pub use iter::*;
pub use portal::*;
pub use suspense::*;
pub use wisteria_core::*;
pub use wisteria_reactive::*;

/// Utility function for accessing the global [`web_sys::Window`] object.
///
/// # Panics
/// Panics if there is no global `window` (i.e. this isn't running in a browser/worker context
/// that has one).
pub fn window() -> web_sys::Window {
    web_sys::window().expect("no global `window` exists")
}

/// Utility function for accessing the global [`web_sys::Document`] object.
///
/// # Panics
/// Panics if there is no global `document`.
pub fn document() -> web_sys::Document {
    thread_local! {
        static DOCUMENT: web_sys::Document =
            web_sys::window().expect("no global `window` exists")
                .document().expect("no `document` exists");
    }
    DOCUMENT.with(Clone::clone)
}

/// Renders a view into `<body>`. Alias for [`render_to`] with `parent` set to the document body.
///
/// Leaks the root scope for the lifetime of the page — use [`render_in_scope`] if you need to
/// unmount later.
pub fn render(view: impl FnOnce() -> View<DomNode> + 'static) {
    let body = document().body().expect("document has no <body>");
    render_to(view, &body.into());
}

/// Renders a view under `parent`, leaking the root scope for the lifetime of the page.
pub fn render_to(view: impl FnOnce() -> View<DomNode> + 'static, parent: &web_sys::Node) {
    let (_, handle) = create_root(|| render_in_scope(view, parent));
    // Intentionally leaked: the whole point of `render`/`render_to` is an app that lives for the
    // lifetime of the page. Callers that need teardown should use `render_in_scope` directly.
    std::mem::forget(handle);
}

/// Renders a view under `parent` inside the current reactive root, for callers that want to
/// control the root's lifetime themselves (e.g. mounting an ephemeral widget into a non-wisteria
/// page and tearing it down again).
pub fn render_in_scope(view: impl FnOnce() -> View<DomNode> + 'static, parent: &web_sys::Node) {
    let parent = DomNode::from_web_sys(parent.clone());
    wisteria_core::insert(&parent, view(), None, None);
}

/// Queues `f` to run once the component mounting it has been attached to a connected document.
///
/// If called more than once while the current node is being disposed and recreated (e.g. inside a
/// reactive child binding), only the latest registration fires, since each run registers its own
/// cleanup that cancels a stale one.
pub fn on_mount(f: impl FnOnce() + 'static) {
    let is_alive = Rc::new(Cell::new(true));
    on_cleanup({
        let is_alive = is_alive.clone();
        move || is_alive.set(false)
    });
    queue_microtask(move || {
        if is_alive.get() {
            f();
        }
    });
}

/// Schedules `f` to run on the microtask queue (`queueMicrotask`).
pub fn queue_microtask(f: impl FnOnce() + 'static) {
    #[wasm_bindgen]
    extern "C" {
        #[wasm_bindgen(js_name = "queueMicrotask")]
        fn queue_microtask_js(f: &JsValue);
    }
    queue_microtask_js(&Closure::once_into_js(f));
}

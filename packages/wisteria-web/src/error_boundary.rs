//! `ErrorBoundary`: catches a render/effect error from `children` and swaps in `fallback(error)`
//! (§4.7).

use std::cell::RefCell;
use std::rc::Rc;

use wisteria_core::{clean_children, insert, View};
use wisteria_reactive::{
    create_root, register_error_handler, untrack, Control, ControlError, RootHandle,
};

use crate::DomNode;

/// (Re-)renders `render`'s output before `marker` (or at the end of `parent`), tearing down
/// whatever this boundary had mounted previously. Mirrors `suspense::mount`; `ErrorBoundary` only
/// ever re-renders in response to an error being caught or `reset` being called, never a tracked
/// signal.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
fn mount(
    parent: &DomNode,
    marker: Option<&DomNode>,
    mounted: &Rc<RefCell<Option<(Vec<DomNode>, RootHandle)>>>,
    render: impl FnOnce() -> Result<View<DomNode>, Control>,
) -> Option<ControlError> {
    let old_nodes = if let Some((nodes, old_root)) = mounted.borrow_mut().take() {
        old_root.dispose();
        Some(nodes)
    } else {
        None
    };
    let (result, root) = create_root(render);
    match result {
        Ok(view) => {
            let nodes = untrack(&|| view.clone().flatten());
            insert(parent, view, old_nodes, marker);
            *mounted.borrow_mut() = Some((nodes, root));
            None
        }
        Err(Control::Error(e)) => {
            root.dispose();
            if let Some(old_nodes) = old_nodes {
                clean_children(parent, old_nodes, None);
            }
            Some(e)
        }
        Err(Control::Suspend(token)) => {
            // Not this boundary's job; re-throw unchanged. `suspense::propagate_suspense` walks
            // past us since we never registered a suspense handler.
            root.dispose();
            if let Some(old_nodes) = old_nodes {
                clean_children(parent, old_nodes, None);
            }
            wisteria_reactive::propagate_suspense(token);
            None
        }
    }
}

/// Renders `children` inside a nested root; if it (or anything nested inside it, however deep)
/// throws a render/effect error, destroys that root and mounts `fallback(error)` under a fresh
/// nested root instead. `on_error`, if given, is invoked once for every caught error as an
/// observable side effect (logging, reporting) — its return value is ignored, it never changes
/// which subtree is shown.
///
/// `reset_keys` is read once, up front (mirroring `resetKeys` identity comparison at each
/// `children` re-render): callers that want "reset on prop change" recreate this boundary rather
/// than fight two independent lifecycles, the same way a keyed block is recreated by its key
/// rather than updated in place.
///
/// Does not itself register a suspense handler, so a suspense token thrown inside `children`
/// passes straight through this boundary to whatever handler is above it — `ErrorBoundary` and
/// `Suspense` compose by nesting, not by one subsuming the other.
pub fn error_boundary(
    parent: DomNode,
    marker: Option<DomNode>,
    fallback: impl Fn(ControlError) -> Result<View<DomNode>, Control> + 'static,
    children: impl Fn() -> Result<View<DomNode>, Control> + 'static,
    on_error: Option<Box<dyn Fn(&ControlError)>>,
) -> RootHandle {
    let mounted: Rc<RefCell<Option<(Vec<DomNode>, RootHandle)>>> = Rc::new(RefCell::new(None));
    let fallback = Rc::new(fallback);
    let on_error = Rc::new(on_error);

    let (_, boundary) = create_root(|| {
        register_error_handler({
            let mounted = mounted.clone();
            let parent = parent.clone();
            let marker = marker.clone();
            let fallback = fallback.clone();
            let on_error = on_error.clone();
            move |error| {
                #[cfg(feature = "trace")]
                tracing::trace!(%error, "error boundary: caught error, mounting fallback");
                if let Some(cb) = on_error.as_ref() {
                    cb(error);
                }
                let error = error.clone();
                let fallback = fallback.clone();
                // Rendering the fallback can itself fail; that error is not caught here, it
                // propagates past this boundary same as §4.7 specifies.
                if let Some(unhandled) =
                    mount(&parent, marker.as_ref(), &mounted, move || fallback(error))
                {
                    wisteria_reactive::propagate_error(&unhandled);
                }
                true
            }
        });

        if let Some(unhandled) = mount(&parent, marker.as_ref(), &mounted, move || children()) {
            wisteria_reactive::propagate_error(&unhandled);
        }
    });

    boundary
}

/// Handle returned by [`error_boundary`]; `.dispose()` tears down the boundary, its currently
/// mounted subtree (whichever of `children`/`fallback` is showing), and its error handler.
pub type ErrorBoundaryHandle = RootHandle;

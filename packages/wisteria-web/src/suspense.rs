//! `Suspense`: swaps a subtree for a fallback while a thrown suspense token is pending (§4.8).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen_futures::spawn_local;
use wisteria_core::{clean_children, insert, View};
use wisteria_reactive::{
    create_root, on_destroy, propagate_error, propagate_suspense, register_suspense_handler,
    untrack, Control, RootHandle,
};

use crate::DomNode;

/// (Re-)renders `render`'s output before `marker` (or at the end of `parent`), tearing down
/// whatever this boundary had mounted previously. Mirrors `wisteria_core::bind_child`'s teardown
/// policy, but driven explicitly instead of by a render effect, since `Suspense` only ever
/// re-renders in response to a suspense token resolving, never a tracked signal.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
fn mount(
    parent: &DomNode,
    marker: Option<&DomNode>,
    mounted: &Rc<RefCell<Option<(Vec<DomNode>, RootHandle)>>>,
    render: impl FnOnce() -> Result<View<DomNode>, Control>,
) {
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
        }
        Err(Control::Error(e)) => {
            root.dispose();
            if let Some(old_nodes) = old_nodes {
                clean_children(parent, old_nodes, None);
            }
            propagate_error(&e);
        }
        Err(Control::Suspend(token)) => {
            root.dispose();
            if let Some(old_nodes) = old_nodes {
                clean_children(parent, old_nodes, None);
            }
            propagate_suspense(token);
        }
    }
}

/// Renders `children` under a nested root with a registered suspense handler. Any suspense token
/// thrown from inside that subtree — whether thrown directly by `children` or propagated up from
/// something nested arbitrarily deep inside it, such as a keyed-list block or a further child
/// binding — increments a pending counter and swaps the mounted subtree for `fallback`'s output.
/// Overlapping tokens are tracked together: the swap back to `children` only happens once every
/// outstanding token for the current render has resolved.
///
/// Errors thrown by either `children` or `fallback` are not caught here; they propagate to
/// whatever error chain is above this boundary, same as if `Suspense` weren't there.
///
/// A resolution that arrives after this boundary has been torn down (e.g. because an enclosing
/// `ErrorBoundary`'s `resetKeys` remounted it) is a no-op: disposal flips the `alive` flag the
/// spawned resolution task checks before touching anything, which is what keeps a stale,
/// superseded render's resolution from corrupting the counter of whatever replaced it.
pub fn suspense(
    parent: DomNode,
    marker: Option<DomNode>,
    fallback: impl Fn() -> Result<View<DomNode>, Control> + 'static,
    children: impl Fn() -> Result<View<DomNode>, Control> + 'static,
) -> RootHandle {
    let alive = Rc::new(Cell::new(true));
    let pending = Rc::new(Cell::new(0u32));
    let mounted: Rc<RefCell<Option<(Vec<DomNode>, RootHandle)>>> = Rc::new(RefCell::new(None));
    let fallback = Rc::new(fallback);
    let children = Rc::new(children);

    let (_, boundary) = create_root(|| {
        on_destroy({
            let alive = alive.clone();
            move || alive.set(false)
        });

        register_suspense_handler({
            let alive = alive.clone();
            let pending = pending.clone();
            let mounted = mounted.clone();
            let parent = parent.clone();
            let marker = marker.clone();
            let fallback = fallback.clone();
            let children = children.clone();
            move |token| {
                let was_idle = pending.get() == 0;
                pending.set(pending.get() + 1);
                if was_idle {
                    let fallback = fallback.clone();
                    mount(&parent, marker.as_ref(), &mounted, move || fallback());
                }

                let alive = alive.clone();
                let pending = pending.clone();
                let mounted = mounted.clone();
                let parent = parent.clone();
                let marker = marker.clone();
                let children = children.clone();
                spawn_local(async move {
                    token.await;
                    if !alive.get() {
                        return;
                    }
                    let remaining = pending.get() - 1;
                    pending.set(remaining);
                    if remaining == 0 {
                        mount(&parent, marker.as_ref(), &mounted, move || children());
                    }
                });
                true
            }
        });

        mount(&parent, marker.as_ref(), &mounted, move || children());
    });

    boundary
}

/// Handle returned by [`suspense`]; `.dispose()` tears down the boundary, its currently mounted
/// subtree (whichever of `children`/`fallback` is showing), and its suspense handler.
pub type SuspenseHandle = RootHandle;

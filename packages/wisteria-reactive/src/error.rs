//! Error and suspension propagation.
//!
//! The source material this runtime is modeled on uses thrown exceptions for both render errors
//! and suspension (a thrown "thenable"). In Rust there is no exception channel, so both are
//! represented as values: a `Control` is either an error or a pending suspense token, and
//! fallible reactive bodies return `Result<T, Control>`. Handlers registered on a root decide
//! whether they've absorbed the value or it should keep propagating to the parent root.

use std::cell::Cell;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::node::NodeId;
use crate::root::Root;

/// The error taxonomy a user render body, binding, or cleanup can produce.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ControlError {
    /// A view function, component body, or binding panicked/returned an error while rendering.
    #[error("render error: {0}")]
    UserRenderError(Rc<str>),
    /// A cleanup or destroy callback returned an error. Every remaining cleanup still runs; the
    /// first error observed is the one re-raised.
    #[error("cleanup error: {0}")]
    CleanupError(Rc<str>),
    /// A low-level invariant was violated (e.g. registering a handler with no current root).
    #[error("invariant violation: {0}")]
    InvariantViolation(Rc<str>),
    /// A tree-host operation failed persistently (e.g. cross-document insert, after adopt/import
    /// was already retried).
    #[error("host operation failed: {0}")]
    HostOperationFailure(Rc<str>),
}

impl ControlError {
    pub fn render(msg: impl fmt::Display) -> Self {
        ControlError::UserRenderError(msg.to_string().into())
    }

    pub fn cleanup(msg: impl fmt::Display) -> Self {
        ControlError::CleanupError(msg.to_string().into())
    }

    pub fn invariant(msg: impl fmt::Display) -> Self {
        ControlError::InvariantViolation(msg.to_string().into())
    }

    pub fn host_operation(msg: impl fmt::Display) -> Self {
        ControlError::HostOperationFailure(msg.to_string().into())
    }
}

/// A thrown "thenable": a pending future, tagged with an epoch so a stale resolution (e.g. from
/// a render superseded by a `resetKeys` change) can be ignored by the handler that catches it.
#[derive(Clone)]
pub struct SuspenseToken {
    pub(crate) epoch: u64,
    pub(crate) future: Rc<RefCellFuture>,
}

pub(crate) type RefCellFuture = std::cell::RefCell<Pin<Box<dyn Future<Output = ()>>>>;

impl SuspenseToken {
    pub fn new(epoch: u64, future: impl Future<Output = ()> + 'static) -> Self {
        SuspenseToken {
            epoch,
            future: Rc::new(std::cell::RefCell::new(Box::pin(future))),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl fmt::Debug for SuspenseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspenseToken")
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Lets a `Suspense` boundary actually wait for the token it caught: `token.await` polls the same
/// shared future every clone of this token refers to. Only the handler that absorbed the token
/// (`propagate_suspense` hands it to exactly one) is expected to poll it.
impl Future for SuspenseToken {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.future.borrow_mut().as_mut().poll(cx)
    }
}

/// Either an error or a pending suspension, the two things a render body may "throw".
#[derive(Debug, Clone)]
pub enum Control {
    Error(ControlError),
    Suspend(SuspenseToken),
}

impl From<ControlError> for Control {
    fn from(e: ControlError) -> Self {
        Control::Error(e)
    }
}

impl From<SuspenseToken> for Control {
    fn from(t: SuspenseToken) -> Self {
        Control::Suspend(t)
    }
}

/// Monotonic epoch counter, used so suspense resolutions for a superseded render (e.g. after
/// `resetKeys` changes) are recognizably stale. One counter per process is sufficient since
/// epochs are only ever compared for equality within the same `Suspense` instance.
pub(crate) fn next_epoch() -> u64 {
    thread_local! {
        static EPOCH: Cell<u64> = Cell::new(0);
    }
    EPOCH.with(|e| {
        let next = e.get() + 1;
        e.set(next);
        next
    })
}

/// Runs every cleanup in `cleanups`, reverse order, even if one of them panics: a panicking
/// cleanup never stops the rest from attempting to run (§4.2/§7 "cleanup error"). Returns the
/// first panic observed, converted to a [`ControlError::CleanupError`], for the caller to route
/// up the error-handler chain once every cleanup has had its turn.
pub(crate) fn run_cleanups_collecting_error(cleanups: Vec<Box<dyn FnOnce()>>) -> Option<ControlError> {
    let mut first = None;
    for cb in cleanups.into_iter().rev() {
        if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(cb)) {
            if first.is_none() {
                first = Some(ControlError::cleanup(panic_payload_message(&payload)));
            }
        }
    }
    first
}

fn panic_payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "cleanup panicked with a non-string payload".to_string()
    }
}

/// Routes a render error up the current node's error-handler chain (§4.4/§6).
///
/// Equivalent to raising `Control::Error(error.clone())` from whatever is currently running.
/// Panics if no ancestor root has an error handler registered.
pub fn propagate_error(error: &ControlError) {
    let root = Root::global();
    let node = root.current_node.get();
    root.route_control(node, Control::Error(error.clone()));
}

/// Routes a suspense token up the current node's suspense-handler chain (§4.4/§6).
///
/// Panics if no ancestor root has a suspense boundary registered.
pub fn propagate_suspense(token: SuspenseToken) {
    let root = Root::global();
    let node = root.current_node.get();
    root.route_control(node, Control::Suspend(token));
}

struct ResolverState {
    done: bool,
    waker: Option<std::task::Waker>,
}

/// Resolves or rejects the [`SuspenseToken`] it was paired with by [`create_suspense_token`].
///
/// Calling either method after the first call is a no-op. The node the token was created under
/// is captured at creation time, so `reject` always reports to the boundary above *that* node,
/// regardless of what happens to be running when the async work actually completes.
pub struct SuspenseResolver {
    state: Rc<RefCell<ResolverState>>,
    node: NodeId,
}

impl SuspenseResolver {
    fn complete(&self) {
        let mut state = self.state.borrow_mut();
        if state.done {
            return;
        }
        state.done = true;
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    /// Marks the token's future ready with a successful result.
    pub fn resolve(&self) {
        self.complete();
    }

    /// Marks the token's future ready and routes `error` up the error-handler chain rooted at the
    /// node the token was created under, same as [`Root::route_control`]: re-raised to the host
    /// as a panic if nothing along that chain handles it.
    pub fn reject(&self, error: ControlError) {
        self.complete();
        let root = Root::global();
        root.route_control(self.node, Control::Error(error));
    }
}

/// Creates a fresh [`SuspenseToken`] together with the [`SuspenseResolver`] used to settle it.
///
/// The token's future resolves once `resolve`/`reject` is called on the paired resolver; until
/// then, polling it yields `Poll::Pending`.
pub fn create_suspense_token() -> (SuspenseToken, SuspenseResolver) {
    let root = Root::global();
    let node = root.current_node.get();
    let epoch = next_epoch();
    let state = Rc::new(RefCell::new(ResolverState {
        done: false,
        waker: None,
    }));
    let future_state = state.clone();
    let future = std::future::poll_fn(move |cx| {
        let mut state = future_state.borrow_mut();
        if state.done {
            Poll::Ready(())
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    });
    let token = SuspenseToken::new(epoch, future);
    let resolver = SuspenseResolver { state, node };
    (token, resolver)
}

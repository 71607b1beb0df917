//! Transitions: marking a batch of writes as low priority so the scheduler finishes all
//! normal-priority work before reacting to them.
//!
//! Built entirely on top of [`crate::start_transition`] — nothing here touches the scheduler
//! directly. A write performed inside a transition is enqueued into the root's
//! `pending_transition` bucket, which [`crate::Root::run_flush`] only drains once `pending` is
//! empty; that ordering is what gives [`use_deferred_value`] its "lags by exactly one transitioned
//! flush" behavior for free, with no special-casing needed here.

use crate::root::start_transition;
use crate::signals::{create_signal, Signal};

/// A handle returned by [`use_transition`]: lets a component start a transition and observe
/// whether one is currently running.
#[derive(Clone, Copy)]
pub struct Transition {
    pending: Signal<bool>,
}

impl Transition {
    /// Runs `f`, marking any writes it performs as transition-priority. Because flushes in this
    /// scheduler are synchronous rather than fiber-scheduled, `is_pending` is only observably
    /// `true` to effects that read it *during* `f`'s own synchronous extent (e.g. nested
    /// transitions); by the time `start` returns, the flush triggered by this transition has
    /// already drained.
    pub fn start(&self, f: impl FnOnce()) {
        self.pending.set(true);
        start_transition(f);
        self.pending.set(false);
    }

    /// Whether a transition started through this handle is currently running.
    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }
}

/// Creates a [`Transition`] handle, scoped to the current reactive owner like any other signal.
///
/// # Example
/// ```
/// # use wisteria_reactive::*;
/// # create_root(|| {
/// let tab = create_signal("home");
/// let transition = use_transition();
///
/// transition.start(move || {
///     tab.set("settings");
/// });
/// assert_eq!(tab.get(), "settings");
/// # });
/// ```
pub fn use_transition() -> Transition {
    Transition {
        pending: create_signal(false),
    }
}

/// Derives a value that mirrors `source`, except that updates written inside a transition are
/// deferred: the returned signal only catches up once all normal-priority work in that flush has
/// settled, so a transition-priority write to `source` doesn't immediately invalidate the rest of
/// the UI still reading the deferred value.
///
/// Note this only defers relative to *other normal-priority work in the same flush* — it does not
/// introduce an additional frame of its own, since this scheduler has no concept of frames.
///
/// # Example
/// ```
/// # use wisteria_reactive::*;
/// # create_root(|| {
/// let query = create_signal(String::new());
/// let deferred_query = use_deferred_value(move || query.get_clone());
/// assert_eq!(deferred_query.get_clone(), "");
///
/// let transition = use_transition();
/// transition.start(|| query.set("rust".to_string()));
/// assert_eq!(deferred_query.get_clone(), "rust");
/// # });
/// ```
pub fn use_deferred_value<T: PartialEq + Clone + 'static>(
    source: impl Fn() -> T + 'static,
) -> crate::signals::ReadSignal<T> {
    let initial = crate::root::untrack(&source);
    let deferred = create_signal(initial);
    crate::effects::create_effect(move || {
        let value = source();
        deferred.set(value);
    });
    *deferred
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn transition_reports_not_pending_after_synchronous_flush() {
        let _ = create_root(|| {
            let transition = use_transition();
            assert!(!transition.is_pending());
            let signal = create_signal(0);
            transition.start(|| signal.set(1));
            assert_eq!(signal.get(), 1);
            assert!(!transition.is_pending());
        });
    }

    #[test]
    fn deferred_value_tracks_transitioned_writes() {
        let _ = create_root(|| {
            let source = create_signal(0);
            let deferred = use_deferred_value(move || source.get());
            assert_eq!(deferred.get(), 0);

            let transition = use_transition();
            transition.start(|| source.set(5));
            assert_eq!(deferred.get(), 5);
        });
    }
}

//! Memos (pull-based derived signals).

use std::cell::RefCell;

use crate::node::{NodeId, NodeKind};
use crate::root::Root;
use crate::signals::{create_signal, ReadSignal};

/// Runs `f` now (tracking whatever signals it reads), then stores the result as a node of `kind`
/// whose callback re-runs `f` and reports whether the result changed under `eq`. Shared by
/// [`create_memo_with`] and [`create_effect`]; the difference between a memo and an effect is not
/// just whether anything downstream looks at the produced value, but *when* the callback runs
/// again: a dirtied `Effect` is queued and re-run by the scheduler during the next flush, while a
/// dirtied `Memo` just sits stale until something actually reads it — see
/// [`crate::root::Root::ensure_updated`].
pub(crate) fn create_computation<T: 'static>(
    kind: NodeKind,
    mut f: impl FnMut() -> T + 'static,
    eq: impl Fn(&T, &T) -> bool + 'static,
) -> NodeId {
    let root = Root::global();
    let id = root.create_node(kind);
    let (initial, tracker) = root.run_in_node(id, || root.tracked_scope(&mut f));
    tracker.create_dependency_link(&root, id);
    root.nodes.borrow_mut()[id].value = Some(Box::new(initial));
    root.nodes.borrow_mut()[id].callback = Some(Box::new(move |value| {
        let root = Root::global();
        let slot: &mut T = value.downcast_mut().expect("wrong computation type");
        let (new, tracker) = root.tracked_scope(&mut f);
        tracker.create_dependency_link(&root, id);
        let changed = !eq(slot, &new);
        *slot = new;
        changed
    }));
    id
}

/// Creates a memoized computation from some signals, using a custom comparison function to
/// decide whether dependents should be notified of a new value.
///
/// To use the output type's [`PartialEq`] implementation instead, use [`create_memo`] or
/// [`create_selector`] (identical; `create_selector` is kept as a familiar alias).
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_memo_with<T: 'static>(
    f: impl FnMut() -> T + 'static,
    eq: impl Fn(&T, &T) -> bool + 'static,
) -> ReadSignal<T> {
    ReadSignal::from_id(create_computation(NodeKind::Memo, f, eq))
}

/// Creates a memoized computation from some signals.
///
/// The output is derived from all the signals read within the closure. A write to any tracked
/// signal marks the memo stale but does not recompute it; the body only runs again the next time
/// something actually reads the memo (via `.get()`, `.with()`, or a dependent effect needing to
/// decide whether it must re-run). If the recomputed result compares equal to the old one under
/// [`PartialEq`], dependents of the memo are not notified (an equal recomputation is invisible
/// downstream).
///
/// # Difference from derived signals
///
/// Derived signals (plain functions referencing signals) don't cache their result at all: calling
/// one twice re-runs the computation twice, every time, whether or not anything changed. A memo
/// caches its last result and only recomputes once per batch of dependency changes, however many
/// times something reads it afterwards — but unlike an effect, it doesn't pay that recomputation
/// cost until something actually reads it.
///
/// ```
/// # use wisteria_reactive::*;
/// # create_root(|| {
/// let state = create_signal(0);
/// let double = create_memo(move || state.get() * 2);
///
/// assert_eq!(double.get(), 0);
/// state.set(1);
/// assert_eq!(double.get(), 2);
/// # });
/// ```
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_memo<T: PartialEq + 'static>(f: impl FnMut() -> T + 'static) -> ReadSignal<T> {
    create_memo_with(f, PartialEq::eq)
}

/// Alias for [`create_memo`], kept for readers used to calling out the equality-suppressing
/// behavior explicitly. Identical to `create_memo`; see [`create_memo_with`] for a custom
/// comparator.
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_selector<T: PartialEq + 'static>(f: impl FnMut() -> T + 'static) -> ReadSignal<T> {
    create_memo(f)
}

/// Alias for [`create_memo_with`].
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_selector_with<T: 'static>(
    f: impl FnMut() -> T + 'static,
    eq: impl Fn(&T, &T) -> bool + 'static,
) -> ReadSignal<T> {
    create_memo_with(f, eq)
}

/// An alternative to [`create_signal`] that derives the next value from a reducer function
/// instead of writing it directly.
///
/// Returns a [`ReadSignal`] and a dispatch function that sends a message through `reduce` to
/// produce the next state.
///
/// # Example
/// ```
/// # use wisteria_reactive::*;
/// enum Msg {
///     Increment,
///     Decrement,
/// }
///
/// # create_root(|| {
/// let (state, dispatch) = create_reducer(0, |&state, msg: Msg| match msg {
///     Msg::Increment => state + 1,
///     Msg::Decrement => state - 1,
/// });
///
/// assert_eq!(state.get(), 0);
/// dispatch(Msg::Increment);
/// assert_eq!(state.get(), 1);
/// dispatch(Msg::Decrement);
/// assert_eq!(state.get(), 0);
/// # });
/// ```
#[cfg_attr(debug_assertions, track_caller)]
pub fn create_reducer<T: PartialEq + Clone + 'static, Msg>(
    initial: T,
    reduce: impl FnMut(&T, Msg) -> T + 'static,
) -> (ReadSignal<T>, impl Fn(Msg)) {
    let reduce = RefCell::new(reduce);
    let signal = create_signal(initial);
    let dispatch = move |msg| signal.update(|value| *value = reduce.borrow_mut()(value, msg));
    (*signal, dispatch)
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn memo() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let double = create_memo(move || state.get() * 2);

            assert_eq!(double.get(), 0);
            state.set(1);
            assert_eq!(double.get(), 2);
            state.set(2);
            assert_eq!(double.get(), 4);
        });
    }

    #[test]
    fn memo_only_runs_once_per_dependency_change() {
        let _ = create_root(|| {
            let state = create_signal(0);

            let counter = create_signal(0);
            let double = create_memo(move || {
                counter.set_silent(counter.get_untracked() + 1);
                state.get() * 2
            });

            assert_eq!(counter.get(), 1); // once for the initial computation
            state.set(2);
            assert_eq!(counter.get(), 1); // stale, but not recomputed until something reads it
            assert_eq!(double.get(), 4); // reading it pulls the recompute
            assert_eq!(counter.get(), 2);
            assert_eq!(double.get(), 4); // reading again does not recompute a second time
            assert_eq!(counter.get(), 2);
        });
    }

    #[test]
    fn memo_suppresses_notification_on_equal_recompute() {
        let _ = create_root(|| {
            let state = create_signal(1);
            let squared = create_memo(move || state.get() * state.get());

            let counter = create_signal(0);
            create_effect(move || {
                counter.set(counter.get_untracked() + 1);
                squared.track();
            });
            assert_eq!(squared.get(), 1);
            assert_eq!(counter.get(), 1);

            state.set(-1); // squared recomputes to 1, same as before: no notification
            assert_eq!(squared.get(), 1);
            assert_eq!(counter.get(), 1);

            state.set(2);
            assert_eq!(squared.get(), 4);
            assert_eq!(counter.get(), 2);
        });
    }

    #[test]
    fn dependency_on_memo() {
        let _ = create_root(|| {
            let state = create_signal(0);
            let double = create_memo(move || state.get() * 2);
            let quadruple = create_memo(move || double.get() * 2);

            assert_eq!(quadruple.get(), 0);
            state.set(1);
            assert_eq!(quadruple.get(), 4);
        });
    }

    #[test]
    fn untracked_memo() {
        let _ = create_root(|| {
            let state = create_signal(1);
            let double = create_memo(move || state.get_untracked() * 2);

            assert_eq!(double.get(), 2);
            state.set(2);
            assert_eq!(double.get(), 2); // untracked read: no re-subscription
        });
    }

    #[test]
    fn memos_recreate_dependencies_each_run() {
        let _ = create_root(|| {
            let condition = create_signal(true);

            let state1 = create_signal(0);
            let state2 = create_signal(1);

            let counter = create_signal(0);
            let tracked = create_memo(move || {
                counter.set_silent(counter.get_untracked() + 1);

                if condition.get() {
                    state1.track();
                } else {
                    state2.track();
                }
            });

            tracked.get();
            assert_eq!(counter.get(), 1);

            state1.set(1);
            tracked.get(); // pulls the recompute
            assert_eq!(counter.get(), 2);

            state2.set(1);
            tracked.get();
            assert_eq!(counter.get(), 2); // not tracked

            condition.set(false);
            tracked.get();
            assert_eq!(counter.get(), 3);

            state1.set(2);
            tracked.get();
            assert_eq!(counter.get(), 3); // not tracked anymore

            state2.set(2);
            tracked.get();
            assert_eq!(counter.get(), 4); // tracked after condition flipped
        });
    }

    #[test]
    fn destroy_memos_on_scope_dispose() {
        let _ = create_root(|| {
            let counter = create_signal(0);
            let trigger = create_signal(());

            let (tracked, child_scope) = create_child_scope(move || {
                create_memo(move || {
                    trigger.track();
                    counter.set_silent(counter.get_untracked() + 1);
                })
            });

            assert_eq!(counter.get(), 1);

            trigger.set(());
            tracked.get();
            assert_eq!(counter.get(), 2);

            child_scope.dispose();
            trigger.set(());
            assert_eq!(counter.get(), 2); // memo destroyed, so no longer executed
        });
    }

    #[test]
    fn reducer() {
        let _ = create_root(|| {
            enum Msg {
                Increment,
                Decrement,
            }

            let (state, dispatch) = create_reducer(0, |state, msg: Msg| match msg {
                Msg::Increment => *state + 1,
                Msg::Decrement => *state - 1,
            });

            assert_eq!(state.get(), 0);
            dispatch(Msg::Increment);
            assert_eq!(state.get(), 1);
            dispatch(Msg::Decrement);
            assert_eq!(state.get(), 0);
            dispatch(Msg::Increment);
            dispatch(Msg::Increment);
            assert_eq!(state.get(), 2);
        });
    }
}

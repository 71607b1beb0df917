//! Context values threaded down the owner (root) hierarchy.
//!
//! Unlike dependency tracking, context walks the *owner* chain (`ReactiveNode::parent`), not the
//! dependency graph: a value provided by an ancestor root is visible to any descendant root,
//! regardless of whether anything reads it reactively.

use crate::root::{use_current_node, Root};

/// Provides a context value in the current root. Visible to this root and any descendant root
/// created afterwards, via [`use_context`]/[`try_use_context`].
///
/// # Panics
/// Panics if a context of the same type already exists in the current root. A context in an
/// ancestor root is shadowed, not replaced.
#[cfg_attr(debug_assertions, track_caller)]
pub fn provide_context<T: 'static>(value: T) {
    let root = Root::global();
    root.provide_context(use_current_node(), value);
}

/// Gets a context value of the given type, searching from the current root upward.
pub fn try_use_context<T: Clone + 'static>() -> Option<T> {
    let root = Root::global();
    root.try_use_context(use_current_node())
}

/// Gets a context value of the given type.
///
/// # Panics
/// Panics if no context of this type is found anywhere in the current root's ancestor chain.
#[cfg_attr(debug_assertions, track_caller)]
pub fn use_context<T: Clone + 'static>() -> T {
    try_use_context().expect("context not found for type")
}

/// Gets a context value, computing and providing it in the current root if absent.
pub fn use_context_or_else<T: Clone + 'static>(f: impl FnOnce() -> T) -> T {
    match try_use_context::<T>() {
        Some(v) => v,
        None => {
            let v = f();
            provide_context(v.clone());
            v
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn context() {
        let _ = create_root(|| {
            provide_context(42i32);
            assert_eq!(use_context::<i32>(), 42);
        });
    }

    #[test]
    fn context_in_nested_scope() {
        let _ = create_root(|| {
            provide_context(42i32);
            let _ = create_child_scope(|| {
                assert_eq!(use_context::<i32>(), 42);
            });
        });
    }

    #[test]
    #[should_panic = "existing context with type exists already"]
    fn existing_context_with_same_type_should_panic() {
        let _ = create_root(|| {
            provide_context(0i32);
            provide_context(0i32);
        });
    }

    #[test]
    fn test_use_context_or_else() {
        let _ = create_root(|| {
            assert!(try_use_context::<i32>().is_none());
            let a = use_context_or_else(|| 123);
            assert_eq!(a, 123);
            assert!(try_use_context::<i32>().is_some());
            let b: i32 = use_context_or_else(|| panic!("don't call me"));
            assert_eq!(b, 123);
        });
    }
}

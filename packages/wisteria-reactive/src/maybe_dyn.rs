use std::borrow::Cow;
use std::rc::Rc;

use crate::*;

/// Represents a value that can be either static or dynamic.
///
/// This is useful for cases where you want to accept a value that can be either static or
/// dynamic, such as an attribute value in the binding layer: a plain string is static, a signal or
/// closure is dynamic.
///
/// A [`MaybeDyn`] value can be created from a static value or a closure that returns the value by
/// using the [`From`] trait.
///
/// # Creating a `MaybeDyn`
///
/// You can create a `MaybeDyn` directly by using one of the enum variants. However, most of the
/// time you probably want to rely on one of the generated `From` impls via
/// [`impl_into_maybe_dyn!`].
///
/// The reason every concrete type needs its own impl is the lack of specialization: we want
/// `Into<MaybeDyn<T>>` for both `T` and functions that return `T`, and without specialization
/// those blanket impls would conflict for any `T` that is itself `Fn() -> T`.
#[derive(Clone)]
pub enum MaybeDyn<T>
where
    T: Into<Self> + 'static,
{
    /// A static value, fixed for the lifetime of the binding.
    Static(T),
    /// A dynamic value backed directly by a signal.
    Signal(ReadSignal<T>),
    /// A derived dynamic value recomputed on every read.
    Derived(Rc<dyn Fn() -> Self>),
}

impl<T: Into<Self> + 'static> MaybeDyn<T> {
    /// Gets the value by consuming itself. Unlike [`MaybeDyn::get_clone`], this avoids a clone
    /// when the value is static.
    pub fn evaluate(self) -> T
    where
        T: Clone,
    {
        match self {
            Self::Static(value) => value,
            Self::Signal(signal) => signal.get_clone(),
            Self::Derived(f) => f().evaluate(),
        }
    }

    /// Gets the value by copying it. For non-`Copy` types, use [`MaybeDyn::get_clone`].
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        match self {
            Self::Static(value) => *value,
            Self::Signal(value) => value.get(),
            Self::Derived(f) => f().evaluate(),
        }
    }

    /// Gets the value by cloning it. For `Copy` types, [`MaybeDyn::get`] avoids the clone.
    pub fn get_clone(&self) -> T
    where
        T: Clone,
    {
        match self {
            Self::Static(value) => value.clone(),
            Self::Signal(value) => value.get_clone(),
            Self::Derived(f) => f().evaluate(),
        }
    }

    /// Tracks the reactive dependency, if any. A no-op for `Static`.
    pub fn track(&self) {
        match self {
            Self::Static(_) => {}
            Self::Signal(signal) => signal.track(),
            Self::Derived(f) => f().track(),
        }
    }

    /// Returns the value if it is statically known, or `None` if it is dynamic.
    pub fn as_static(&self) -> Option<&T> {
        match self {
            Self::Static(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Into<Self>> From<ReadSignal<T>> for MaybeDyn<T> {
    fn from(val: ReadSignal<T>) -> Self {
        MaybeDyn::Signal(val)
    }
}

impl<T: Into<Self>> From<Signal<T>> for MaybeDyn<T> {
    fn from(val: Signal<T>) -> Self {
        MaybeDyn::Signal(*val)
    }
}

impl<F, U, T: Into<Self>> From<F> for MaybeDyn<T>
where
    F: Fn() -> U + 'static,
    U: Into<MaybeDyn<T>>,
{
    fn from(f: F) -> Self {
        MaybeDyn::Derived(Rc::new(move || f().into()))
    }
}

/// Generates the `From` impls needed to make a type usable as `impl Into<MaybeDyn<T>>`.
///
/// Because of Rust's orphan rules, `Into<MaybeDyn<T>>` can only be implemented here, in the
/// crate that defines `MaybeDyn`. List any additional source types that should also convert
/// (e.g. `&'static str` into a `Cow<'static, str>`-backed `MaybeDyn`) after a `;`.
///
/// # Example
/// ```
/// # use wisteria_reactive::*;
/// struct MyType;
///
/// impl From<i32> for MyType {
///     fn from(_: i32) -> Self {
///         todo!();
///     }
/// }
///
/// impl_into_maybe_dyn!(MyType; i32);
/// ```
#[macro_export]
macro_rules! impl_into_maybe_dyn {
    ($ty:ty $(; $($from:ty),*)?) => {
        impl From<$ty> for $crate::MaybeDyn<$ty> {
            fn from(val: $ty) -> Self {
                MaybeDyn::Static(val)
            }
        }

        $(
            $(
                impl From<$from> for $crate::MaybeDyn<$ty> {
                    fn from(val: $from) -> Self {
                        MaybeDyn::Static(val.into())
                    }
                }
            )*
        )?
    };
}

impl_into_maybe_dyn!(bool);
impl_into_maybe_dyn!(Cow<'static, str>; &'static str, String);

impl_into_maybe_dyn!(f32);
impl_into_maybe_dyn!(f64);

impl_into_maybe_dyn!(i8);
impl_into_maybe_dyn!(i16);
impl_into_maybe_dyn!(i32);
impl_into_maybe_dyn!(i64);
impl_into_maybe_dyn!(i128);
impl_into_maybe_dyn!(isize);
impl_into_maybe_dyn!(u8);
impl_into_maybe_dyn!(u16);
impl_into_maybe_dyn!(u32);
impl_into_maybe_dyn!(u64);
impl_into_maybe_dyn!(u128);
impl_into_maybe_dyn!(usize);

impl<T> From<Vec<T>> for MaybeDyn<Vec<T>> {
    fn from(val: Vec<T>) -> Self {
        MaybeDyn::Static(val)
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn maybe_dyn_static() {
        let _ = create_root(|| {
            let md: MaybeDyn<i32> = 5.into();
            assert_eq!(md.get(), 5);
            assert_eq!(md.as_static(), Some(&5));
        });
    }

    #[test]
    fn maybe_dyn_signal_tracks() {
        let _ = create_root(|| {
            let signal = create_signal(1);
            let md: MaybeDyn<i32> = signal.into();
            assert_eq!(md.get(), 1);
            assert!(md.as_static().is_none());

            let seen = create_signal(0);
            create_effect(move || {
                md.track();
                seen.set(seen.get_untracked() + 1);
            });
            assert_eq!(seen.get(), 1);
            signal.set(2);
            assert_eq!(seen.get(), 2);
        });
    }

    #[test]
    fn maybe_dyn_derived() {
        let _ = create_root(|| {
            let signal = create_signal(1);
            let md: MaybeDyn<i32> = (move || signal.get() * 10).into();
            assert_eq!(md.get(), 10);
            signal.set(2);
            assert_eq!(md.get(), 20);
        });
    }
}

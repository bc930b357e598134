//! Adapter synthesis: turning native callables into fixed-ABI thunks.
//!
//! Every bindable signature implements one of three traits, selected when
//! the binding is registered:
//!
//! - [`IntoNativeFn`]: free functions, arguments from slot 1
//! - [`IntoMethod`]: member functions taking `&C` or `&mut C`, arguments
//!   from a caller-chosen offset (2 for methods invoked with an implicit
//!   self slot, 1 for function-style members, 3 for property accessors)
//! - [`IntoConstructor`]: callables producing a `C`, wrapped as an owned
//!   instance
//!
//! Each generated thunk checks that the frame holds exactly the expected
//! number of values, decodes its arguments in order, invokes the callable
//! and pushes the result. Unit results push nothing; tuple results push one
//! value per element.

use std::marker::PhantomData;

use lualite_core::{FromScript, NativeFn, PropertyKind, ScriptState, ToScript, check_arity};

use crate::instance::Owned;
use crate::member::{MemberFn, Receiver};

/// Stack offset of the first argument of a free function.
pub const FREE_OFFSET: i32 = 1;
/// Stack offset of the first argument of a member invoked with a self slot.
pub const METHOD_OFFSET: i32 = 2;
/// Stack offset of the first argument of a property accessor.
pub const PROPERTY_OFFSET: i32 = 3;

/// Marker for members taking `&C`.
pub struct RefSelf(PhantomData<()>);

/// Marker for members taking `&mut C`.
pub struct MutSelf(PhantomData<()>);

/// A free callable that can become a [`NativeFn`].
pub trait IntoNativeFn<Args, Ret>: 'static {
    const ARITY: usize;

    fn into_native_fn(self) -> NativeFn;
}

/// A member callable of class `C` that can become a [`MemberFn`].
pub trait IntoMethod<C, Args, Ret>: 'static {
    const ARITY: usize;

    /// Kind tag of the result, used for property introspection.
    const KIND: PropertyKind;

    /// Build a thunk whose first argument sits at stack index `offset`.
    fn into_member_fn(self, offset: i32) -> MemberFn;
}

/// A callable that constructs a `C`.
pub trait IntoConstructor<C, Args>: 'static {
    const ARITY: usize;

    fn into_constructor(self) -> NativeFn;
}

/// Number of values a thunk expects in its frame.
#[inline]
pub const fn expected_depth(arity: usize, offset: i32) -> usize {
    arity + offset as usize - 1
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! impl_adapters {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, $($arg,)*> IntoNativeFn<($($arg,)*), R> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: ToScript,
            $($arg: FromScript,)*
        {
            const ARITY: usize = count!($($arg)*);

            fn into_native_fn(self) -> NativeFn {
                NativeFn::new(move |state: &mut dyn ScriptState| {
                    check_arity(state, count!($($arg)*))?;
                    let mut index = FREE_OFFSET - 1;
                    $(
                        index += 1;
                        let $arg = $arg::from_script(state, index)?;
                    )*
                    (self)($($arg),*).to_script(state)
                })
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<C, F, R, $($arg,)*> IntoMethod<C, (RefSelf, $($arg,)*), R> for F
        where
            C: 'static,
            F: Fn(&C, $($arg),*) -> R + 'static,
            R: ToScript,
            $($arg: FromScript,)*
        {
            const ARITY: usize = count!($($arg)*);
            const KIND: PropertyKind = R::KIND;

            fn into_member_fn(self, offset: i32) -> MemberFn {
                let depth = expected_depth(count!($($arg)*), offset);
                MemberFn::new(move |state: &mut dyn ScriptState, receiver: &Receiver<'_>| {
                    check_arity(state, depth)?;
                    let mut index = offset - 1;
                    $(
                        index += 1;
                        let $arg = $arg::from_script(state, index)?;
                    )*
                    receiver
                        .with_ref(|this: &C| (self)(this, $($arg),*))?
                        .to_script(state)
                })
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<C, F, R, $($arg,)*> IntoMethod<C, (MutSelf, $($arg,)*), R> for F
        where
            C: 'static,
            F: Fn(&mut C, $($arg),*) -> R + 'static,
            R: ToScript,
            $($arg: FromScript,)*
        {
            const ARITY: usize = count!($($arg)*);
            const KIND: PropertyKind = R::KIND;

            fn into_member_fn(self, offset: i32) -> MemberFn {
                let depth = expected_depth(count!($($arg)*), offset);
                MemberFn::new(move |state: &mut dyn ScriptState, receiver: &Receiver<'_>| {
                    check_arity(state, depth)?;
                    let mut index = offset - 1;
                    $(
                        index += 1;
                        let $arg = $arg::from_script(state, index)?;
                    )*
                    receiver
                        .with_mut(|this: &mut C| (self)(this, $($arg),*))?
                        .to_script(state)
                })
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<C, F, $($arg,)*> IntoConstructor<C, ($($arg,)*)> for F
        where
            C: 'static,
            F: Fn($($arg),*) -> C + 'static,
            $($arg: FromScript,)*
        {
            const ARITY: usize = count!($($arg)*);

            fn into_constructor(self) -> NativeFn {
                NativeFn::new(move |state: &mut dyn ScriptState| {
                    check_arity(state, count!($($arg)*))?;
                    let mut index = FREE_OFFSET - 1;
                    $(
                        index += 1;
                        let $arg = $arg::from_script(state, index)?;
                    )*
                    Owned((self)($($arg),*)).to_script(state)
                })
            }
        }
    };
}

impl_adapters!();
impl_adapters!(A1);
impl_adapters!(A1, A2);
impl_adapters!(A1, A2, A3);
impl_adapters!(A1, A2, A3, A4);
impl_adapters!(A1, A2, A3, A4, A5);
impl_adapters!(A1, A2, A3, A4, A5, A6);
impl_adapters!(A1, A2, A3, A4, A5, A6, A7);
impl_adapters!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Thunk for a free function that manages the stack itself.
pub fn vararg_fn<F, R>(f: F) -> NativeFn
where
    F: Fn(&mut dyn ScriptState) -> R + 'static,
    R: ToScript,
{
    NativeFn::new(move |state: &mut dyn ScriptState| f(state).to_script(state))
}

/// Thunk for a member that manages the stack itself.
pub fn vararg_member<C, F, R>(f: F) -> MemberFn
where
    C: 'static,
    F: Fn(&mut C, &mut dyn ScriptState) -> R + 'static,
    R: ToScript,
{
    MemberFn::new(move |state: &mut dyn ScriptState, receiver: &Receiver<'_>| {
        receiver
            .with_mut(|this: &mut C| f(this, &mut *state))?
            .to_script(state)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lualite_core::NativeError;
    use lualite_host::State;

    fn call_native(state: &mut State, function: NativeFn, args: &[i64]) -> Result<(), NativeError> {
        state.push_closure(function, 0);
        for arg in args {
            state.push_integer(*arg);
        }
        state.call(args.len(), None)
    }

    #[test]
    fn free_function_decodes_and_pushes() {
        let mut state = State::new();
        let sum = (|a: i64, b: i64| a + b).into_native_fn();
        call_native(&mut state, sum, &[3, 4]).unwrap();
        assert_eq!(state.top(), 1);
        assert_eq!(state.to_integer(-1), Some(7));
    }

    #[test]
    fn arity_is_checked_exactly() {
        let mut state = State::new();
        let sum = (|a: i64, b: i64| a + b).into_native_fn();
        let err = call_native(&mut state, sum, &[3]).unwrap_err();
        assert_eq!(
            err,
            NativeError::ArityMismatch {
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn unit_return_pushes_nothing() {
        let mut state = State::new();
        let noop = (|_: i64| ()).into_native_fn();
        call_native(&mut state, noop, &[1]).unwrap();
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn tuple_return_pushes_each_element() {
        let mut state = State::new();
        let split = (|n: i64| (n / 10, n % 10)).into_native_fn();
        call_native(&mut state, split, &[42]).unwrap();
        assert_eq!(state.top(), 2);
        assert_eq!(state.to_integer(1), Some(4));
        assert_eq!(state.to_integer(2), Some(2));
    }

    #[test]
    fn wrong_argument_kind_is_a_type_mismatch() {
        let mut state = State::new();
        let negate = (|flag: bool| !flag).into_native_fn();
        state.push_closure(negate, 0);
        state.push_integer(1);
        let err = state.call(1, None).unwrap_err();
        assert_eq!(
            err,
            NativeError::TypeMismatch {
                index: 1,
                expected: "boolean",
                actual: "integer"
            }
        );
    }

    #[test]
    fn error_results_propagate() {
        let mut state = State::new();
        let checked = (|n: i64| -> Result<i64, NativeError> {
            if n < 0 {
                Err(NativeError::other("negative"))
            } else {
                Ok(n)
            }
        })
        .into_native_fn();
        let err = call_native(&mut state, checked, &[-1]).unwrap_err();
        assert_eq!(err, NativeError::Other("negative".into()));
    }

    #[test]
    fn vararg_function_sees_the_raw_frame() {
        let mut state = State::new();
        let count = vararg_fn(|state: &mut dyn ScriptState| state.top() as i64);
        call_native(&mut state, count, &[1, 2, 3, 4]).unwrap();
        assert_eq!(state.to_integer(-1), Some(4));
    }

    #[test]
    fn member_kinds_follow_return_type() {
        struct Probe;
        fn kind_of<F: IntoMethod<Probe, A, R>, A, R>(_: F) -> PropertyKind {
            F::KIND
        }
        assert_eq!(kind_of(|_: &Probe| true), PropertyKind::Boolean);
        assert_eq!(kind_of(|_: &Probe| 1u8), PropertyKind::Integer);
        assert_eq!(kind_of(|_: &Probe| 1.5f32), PropertyKind::Number);
        assert_eq!(kind_of(|_: &Probe| String::new()), PropertyKind::String);
        assert_eq!(kind_of(|_: &mut Probe| ()), PropertyKind::Other);
    }

    #[test]
    fn expected_depth_per_offset() {
        assert_eq!(expected_depth(2, FREE_OFFSET), 2);
        assert_eq!(expected_depth(2, METHOD_OFFSET), 3);
        assert_eq!(expected_depth(0, PROPERTY_OFFSET), 2);
        assert_eq!(expected_depth(1, PROPERTY_OFFSET), 3);
    }
}

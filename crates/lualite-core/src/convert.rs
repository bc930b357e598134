//! The value codec: conversions between native values and stack slots.
//!
//! - [`ToScript`]: push a native value, reporting how many slots it used
//! - [`FromScript`]: read a native value from a (possibly relative) index
//!
//! ## Supported Types
//!
//! - Integers: `i8`..`i64`, `u8`..`u64`, `isize`, `usize`
//! - Floats: `f32`, `f64`
//! - Boolean: `bool` (checked before any integer handling)
//! - Strings: `String`, `&str` (encode only)
//! - Pointers: `*mut T`, `*const T`, `&mut T` (encode only), [`LightUserData`]
//! - Unit: `()` pushes nothing
//! - [`Untyped`]: pushes nothing, reads nothing
//! - `Option<T>`: `None` is nil
//! - `Result<T, E>`: `Err` propagates out of the thunk
//! - Tuples up to eight elements: multiple results at the top level, a
//!   fixed-length table when nested
//!
//! Containers live in [`crate::containers`].

use crate::error::{ConversionError, NativeError};
use crate::state::ScriptState;
use crate::value::{LightUserData, PropertyKind, ValueKind};

/// Push a native value onto the stack.
pub trait ToScript: Sized {
    /// Kind reported for properties whose getter returns this type.
    const KIND: PropertyKind = PropertyKind::Other;

    /// Push the value and return the number of slots pushed.
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError>;

    /// Push exactly one slot. Extra slots are dropped and a missing one
    /// becomes nil. Used wherever a single value is required, such as a
    /// container element.
    fn to_script_one(self, state: &mut dyn ScriptState) -> Result<(), NativeError> {
        match self.to_script(state)? {
            1 => {}
            0 => state.push_nil(),
            n => state.pop(n - 1),
        }
        Ok(())
    }
}

/// Read a native value from a stack slot.
pub trait FromScript: Sized {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError>;
}

/// Placeholder that occupies no slots.
///
/// As a parameter it consumes one argument position without reading it. As a
/// return type it pushes nothing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Untyped;

/// Fail unless the current frame holds exactly `expected` values.
#[inline]
pub fn check_arity(state: &dyn ScriptState, expected: usize) -> Result<(), NativeError> {
    let actual = state.top();
    if actual == expected {
        Ok(())
    } else {
        Err(NativeError::ArityMismatch { expected, actual })
    }
}

/// Error for a slot that does not hold `expected`.
pub fn slot_mismatch(state: &dyn ScriptState, index: i32, expected: &'static str) -> NativeError {
    match state.kind(index) {
        Some(kind) => NativeError::TypeMismatch {
            index,
            expected,
            actual: kind.name(),
        },
        None => NativeError::StackUnderflow {
            index,
            top: state.top(),
        },
    }
}

/// Read element `n` of the table at absolute index `table`.
pub fn read_element<T: FromScript>(
    state: &mut dyn ScriptState,
    table: i32,
    n: i64,
) -> Result<T, NativeError> {
    state.raw_get_i(table, n);
    let value = T::from_script(state, -1);
    state.pop(1);
    value
}

fn read_integer(state: &dyn ScriptState, index: i32) -> Result<i64, NativeError> {
    match state.kind(index) {
        Some(ValueKind::Integer) | Some(ValueKind::Number) => match state.to_integer(index) {
            Some(value) => Ok(value),
            None => Err(ConversionError::NotAnInteger {
                value: state.to_number(index).unwrap_or(f64::NAN),
            }
            .into()),
        },
        _ => Err(slot_mismatch(state, index, "integer")),
    }
}

// ============================================================================
// Boolean
// ============================================================================

impl ToScript for bool {
    const KIND: PropertyKind = PropertyKind::Boolean;

    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        state.push_boolean(self);
        Ok(1)
    }
}

impl FromScript for bool {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        state.expect_kind(index, ValueKind::Boolean)?;
        Ok(state.to_boolean(index))
    }
}

// ============================================================================
// Integers
// ============================================================================

macro_rules! impl_script_int {
    ($($ty:ty),*) => {
        $(
            impl ToScript for $ty {
                const KIND: PropertyKind = PropertyKind::Integer;

                fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
                    state.push_integer(i64::from(self));
                    Ok(1)
                }
            }

            impl FromScript for $ty {
                fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
                    let value = read_integer(state, index)?;
                    <$ty>::try_from(value).map_err(|_| {
                        ConversionError::IntegerOverflow {
                            value,
                            target_type: stringify!($ty),
                        }
                        .into()
                    })
                }
            }
        )*
    };
}

impl_script_int!(i8, i16, i32, i64, u8, u16, u32);

// Full-width unsigned values travel as their two's-complement bit pattern so
// every value survives a round trip.
macro_rules! impl_script_wide {
    ($($ty:ty),*) => {
        $(
            impl ToScript for $ty {
                const KIND: PropertyKind = PropertyKind::Integer;

                fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
                    state.push_integer(self as i64);
                    Ok(1)
                }
            }

            impl FromScript for $ty {
                fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
                    Ok(read_integer(state, index)? as $ty)
                }
            }
        )*
    };
}

impl_script_wide!(u64, usize);

impl ToScript for isize {
    const KIND: PropertyKind = PropertyKind::Integer;

    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        state.push_integer(self as i64);
        Ok(1)
    }
}

impl FromScript for isize {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        let value = read_integer(state, index)?;
        isize::try_from(value).map_err(|_| {
            ConversionError::IntegerOverflow {
                value,
                target_type: "isize",
            }
            .into()
        })
    }
}

// ============================================================================
// Floats
// ============================================================================

impl ToScript for f64 {
    const KIND: PropertyKind = PropertyKind::Number;

    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        state.push_number(self);
        Ok(1)
    }
}

impl FromScript for f64 {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        match (state.kind(index), state.to_number(index)) {
            (Some(kind), Some(value)) if kind.is_numeric() => Ok(value),
            _ => Err(slot_mismatch(state, index, "number")),
        }
    }
}

impl ToScript for f32 {
    const KIND: PropertyKind = PropertyKind::Number;

    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        state.push_number(f64::from(self));
        Ok(1)
    }
}

impl FromScript for f32 {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        f64::from_script(state, index).map(|value| value as f32)
    }
}

// ============================================================================
// Strings
// ============================================================================

impl ToScript for &str {
    const KIND: PropertyKind = PropertyKind::String;

    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        state.push_string(self);
        Ok(1)
    }
}

impl ToScript for String {
    const KIND: PropertyKind = PropertyKind::String;

    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        state.push_string(&self);
        Ok(1)
    }
}

impl FromScript for String {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        match (state.kind(index), state.to_str(index)) {
            (Some(ValueKind::String | ValueKind::Integer | ValueKind::Number), Some(value)) => {
                Ok(value)
            }
            _ => Err(slot_mismatch(state, index, "string")),
        }
    }
}

// ============================================================================
// Pointers
// ============================================================================

impl ToScript for LightUserData {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        state.push_light_userdata(self);
        Ok(1)
    }
}

impl FromScript for LightUserData {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        match state.to_light_userdata(index) {
            Some(light) => Ok(light),
            None => Err(slot_mismatch(state, index, "userdata")),
        }
    }
}

impl<T> ToScript for *mut T {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        LightUserData::from_ptr(self).to_script(state)
    }
}

impl<T> FromScript for *mut T {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        LightUserData::from_script(state, index).map(LightUserData::cast)
    }
}

impl<T> ToScript for *const T {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        LightUserData::from_ptr(self.cast_mut()).to_script(state)
    }
}

impl<T> FromScript for *const T {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        LightUserData::from_script(state, index).map(|light| light.cast::<T>().cast_const())
    }
}

/// A mutable reference to a plain value encodes as its address. The
/// referent must outlive every script-side use of that address.
impl<T> ToScript for &mut T {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        LightUserData::from_ptr(self as *mut T).to_script(state)
    }
}

// ============================================================================
// Unit, Untyped, Option, Result
// ============================================================================

impl ToScript for () {
    fn to_script(self, _state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        Ok(0)
    }
}

impl ToScript for Untyped {
    fn to_script(self, _state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        Ok(0)
    }
}

impl FromScript for Untyped {
    fn from_script(_state: &mut dyn ScriptState, _index: i32) -> Result<Self, NativeError> {
        Ok(Untyped)
    }
}

impl<T: ToScript> ToScript for Option<T> {
    const KIND: PropertyKind = T::KIND;

    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        match self {
            Some(value) => value.to_script(state),
            None => {
                state.push_nil();
                Ok(1)
            }
        }
    }
}

impl<T: FromScript> FromScript for Option<T> {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        if state.is_nil(index) {
            Ok(None)
        } else {
            T::from_script(state, index).map(Some)
        }
    }
}

impl<T, E> ToScript for Result<T, E>
where
    T: ToScript,
    E: Into<NativeError>,
{
    const KIND: PropertyKind = T::KIND;

    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        match self {
            Ok(value) => value.to_script(state),
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// Tuples
// ============================================================================

macro_rules! impl_script_tuple {
    ($len:expr => $($name:ident $idx:tt),+) => {
        impl<$($name: ToScript),+> ToScript for ($($name,)+) {
            fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
                $( self.$idx.to_script_one(state)?; )+
                Ok($len)
            }

            fn to_script_one(self, state: &mut dyn ScriptState) -> Result<(), NativeError> {
                state.create_table($len, 0);
                $(
                    self.$idx.to_script_one(state)?;
                    state.raw_set_i(-2, $idx + 1);
                )+
                Ok(())
            }
        }

        impl<$($name: FromScript),+> FromScript for ($($name,)+) {
            fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
                state.expect_kind(index, ValueKind::Table)?;
                let table = state.abs_index(index);
                Ok(($(read_element::<$name>(state, table, $idx + 1)?,)+))
            }
        }
    };
}

impl_script_tuple!(1 => A 0);
impl_script_tuple!(2 => A 0, B 1);
impl_script_tuple!(3 => A 0, B 1, C 2);
impl_script_tuple!(4 => A 0, B 1, C 2, D 3);
impl_script_tuple!(5 => A 0, B 1, C 2, D 3, E 4);
impl_script_tuple!(6 => A 0, B 1, C 2, D 3, E 4, F 5);
impl_script_tuple!(7 => A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_script_tuple!(8 => A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

//! The host boundary.
//!
//! [`ScriptState`] is everything the binding layer needs from an embedded
//! runtime: a stack of values addressed by position, tables with raw and
//! metamethod-aware access, native closures with upvalues, and a slot for
//! application data. Indices follow the usual stack conventions: positive
//! indices count from the bottom of the current frame starting at 1,
//! negative indices count back from the top, and the pseudo-indices
//! [`REGISTRY_INDEX`] and [`upvalue_index`] address the host registry table
//! and the running closure's upvalues.

use std::any::Any;
use std::rc::Rc;

use crate::error::NativeError;
use crate::native_fn::NativeFn;
use crate::value::{LightUserData, ValueKind};

/// Pseudo-index of the host registry table.
pub const REGISTRY_INDEX: i32 = -1_000_000;

/// Request every result a call produces.
pub const MULTRET: Option<usize> = None;

/// Pseudo-index of the `n`-th (1-based) upvalue of the running closure.
#[inline]
pub const fn upvalue_index(n: i32) -> i32 {
    REGISTRY_INDEX - n
}

/// True for [`REGISTRY_INDEX`] and upvalue pseudo-indices.
#[inline]
pub const fn is_pseudo_index(index: i32) -> bool {
    index <= REGISTRY_INDEX
}

/// Stack-based value exchange with an embedded runtime.
pub trait ScriptState {
    // --- stack -------------------------------------------------------------

    /// Number of values in the current frame.
    fn top(&self) -> usize;

    /// Truncate or nil-extend the current frame to `top` values.
    fn set_top(&mut self, top: usize);

    /// Convert a relative index into an absolute one. Pseudo-indices are
    /// returned unchanged.
    fn abs_index(&self, index: i32) -> i32;

    /// Kind of the value at `index`, or `None` when the index is not valid.
    fn kind(&self, index: i32) -> Option<ValueKind>;

    /// Push a copy of the value at `index`.
    fn push_value(&mut self, index: i32);

    /// Move the top value into position `index`, shifting values up.
    fn insert(&mut self, index: i32);

    /// Remove the value at `index`, shifting values down.
    fn remove(&mut self, index: i32);

    /// Pop the top value and store it at `index`.
    fn replace(&mut self, index: i32);

    // --- push --------------------------------------------------------------

    fn push_nil(&mut self);
    fn push_boolean(&mut self, value: bool);
    fn push_integer(&mut self, value: i64);
    fn push_number(&mut self, value: f64);
    fn push_string(&mut self, value: &str);
    fn push_light_userdata(&mut self, value: LightUserData);

    /// Pop `upvalues` values and push a native closure capturing them.
    /// The first popped-in-order value becomes upvalue 1.
    fn push_closure(&mut self, function: NativeFn, upvalues: usize);

    // --- read --------------------------------------------------------------

    /// Truthiness: everything except nil and false.
    fn to_boolean(&self, index: i32) -> bool;

    /// Integer at `index`. Floats with an exact integer value convert.
    fn to_integer(&self, index: i32) -> Option<i64>;

    /// Number at `index`. Integers convert.
    fn to_number(&self, index: i32) -> Option<f64>;

    /// String at `index`. Numbers convert to their textual form.
    fn to_str(&self, index: i32) -> Option<String>;

    fn to_light_userdata(&self, index: i32) -> Option<LightUserData>;

    /// Primitive equality without metamethods. Tables and functions compare
    /// by identity.
    fn raw_equal(&self, a: i32, b: i32) -> bool;

    // --- tables ------------------------------------------------------------

    /// Push a new table with room for `narr` sequence and `nrec` record entries.
    fn create_table(&mut self, narr: usize, nrec: usize);

    /// Replace the key on top of the stack with `t[key]`, without metamethods.
    fn raw_get(&mut self, table: i32);

    /// `t[k] = v` where `v` is on top and `k` just below it; pops both.
    fn raw_set(&mut self, table: i32);

    /// Push `t[n]`.
    fn raw_get_i(&mut self, table: i32, n: i64);

    /// `t[n] = v` where `v` is on top; pops it.
    fn raw_set_i(&mut self, table: i32, n: i64);

    /// Length of the sequence part of the table at `table`.
    fn raw_len(&self, table: i32) -> usize;

    /// Pop a key and push the next key/value pair. Returns `false`, pushing
    /// nothing, once iteration is complete. Start with a nil key.
    fn next(&mut self, table: i32) -> bool;

    /// Push `t[key]`, honoring `__index`.
    fn get_field(&mut self, table: i32, key: &str) -> Result<(), NativeError>;

    /// `t[key] = v` where `v` is on top, honoring `__newindex`; pops it.
    fn set_field(&mut self, table: i32, key: &str) -> Result<(), NativeError>;

    /// Pop a table and set it as the metatable of the table at `index`.
    fn set_metatable(&mut self, index: i32);

    /// Push the metatable of the value at `index` if it has one.
    fn get_metatable(&mut self, index: i32) -> bool;

    // --- globals -----------------------------------------------------------

    fn get_global(&mut self, name: &str);

    /// Pop a value and bind it to the global `name`.
    fn set_global(&mut self, name: &str);

    // --- calls -------------------------------------------------------------

    /// Call the function below `nargs` arguments. On success, the function and
    /// its arguments are replaced by `nresults` values (all of them for
    /// [`MULTRET`]). On failure they are removed.
    fn call(&mut self, nargs: usize, nresults: Option<usize>) -> Result<(), NativeError>;

    // --- application data --------------------------------------------------

    fn app_data(&self) -> Option<Rc<dyn Any>>;
    fn set_app_data(&mut self, data: Rc<dyn Any>);

    // --- provided ----------------------------------------------------------

    fn pop(&mut self, n: usize) {
        let top = self.top();
        self.set_top(top.saturating_sub(n));
    }

    fn is_nil(&self, index: i32) -> bool {
        matches!(self.kind(index), Some(ValueKind::Nil) | None)
    }

    fn is_table(&self, index: i32) -> bool {
        self.kind(index) == Some(ValueKind::Table)
    }

    /// Kind name of the value at `index`, or `"no value"`.
    fn type_name(&self, index: i32) -> &'static str {
        self.kind(index).map_or("no value", ValueKind::name)
    }

    /// Push `t[key]` for a string key, without metamethods.
    fn raw_get_field(&mut self, table: i32, key: &str) {
        let table = self.abs_index(table);
        self.push_string(key);
        self.raw_get(table);
    }

    /// `t[key] = v` for a string key where `v` is on top; pops it.
    fn raw_set_field(&mut self, table: i32, key: &str) {
        let table = self.abs_index(table);
        self.push_string(key);
        self.insert(-2);
        self.raw_set(table);
    }

    /// Push the table stored at `t[name]`, creating it when absent.
    /// Returns `true` when the table already existed.
    fn get_sub_table(&mut self, table: i32, name: &str) -> bool {
        let table = self.abs_index(table);
        self.raw_get_field(table, name);
        if self.is_table(-1) {
            return true;
        }
        self.pop(1);
        self.create_table(0, 0);
        self.push_value(-1);
        self.raw_set_field(table, name);
        false
    }

    /// Fail unless the value at `index` has kind `expected`.
    fn expect_kind(&self, index: i32, expected: ValueKind) -> Result<(), NativeError> {
        match self.kind(index) {
            Some(kind) if kind == expected => Ok(()),
            Some(kind) => Err(NativeError::TypeMismatch {
                index,
                expected: expected.name(),
                actual: kind.name(),
            }),
            None => Err(NativeError::StackUnderflow {
                index,
                top: self.top(),
            }),
        }
    }
}

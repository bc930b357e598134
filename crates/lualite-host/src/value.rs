//! Host values and table keys.

use std::rc::Rc;

use lualite_core::{LightUserData, ValueKind};
use ordered_float::OrderedFloat;

use crate::arena::Handle;

/// A value on the host stack or inside a table.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(Rc<str>),
    Table(Handle),
    LightUserData(LightUserData),
    Function(Handle),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Table(_) => ValueKind::Table,
            Value::LightUserData(_) => ValueKind::LightUserData,
            Value::Function(_) => ValueKind::Function,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Equality without metamethods. Integers and floats with the same
    /// numeric value are equal.
    pub fn raw_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Integer(a), Value::Number(b)) | (Value::Number(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::LightUserData(a), Value::LightUserData(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

/// A normalized table key. Nil and NaN cannot be keys, and floats with an
/// integral value are stored as integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Boolean(bool),
    Integer(i64),
    Number(OrderedFloat<f64>),
    String(Rc<str>),
    Table(Handle),
    LightUserData(usize),
    Function(Handle),
}

impl Key {
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Nil => None,
            Value::Boolean(b) => Some(Key::Boolean(*b)),
            Value::Integer(i) => Some(Key::Integer(*i)),
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => Some(integral(*n).map_or(Key::Number(OrderedFloat(*n)), Key::Integer)),
            Value::String(s) => Some(Key::String(Rc::clone(s))),
            Value::Table(h) => Some(Key::Table(*h)),
            Value::LightUserData(l) => Some(Key::LightUserData(l.address())),
            Value::Function(h) => Some(Key::Function(*h)),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Boolean(b) => Value::Boolean(*b),
            Key::Integer(i) => Value::Integer(*i),
            Key::Number(n) => Value::Number(n.into_inner()),
            Key::String(s) => Value::String(Rc::clone(s)),
            Key::Table(h) => Value::Table(*h),
            Key::LightUserData(address) => Value::LightUserData(LightUserData::from_address(*address)),
            Key::Function(h) => Value::Function(*h),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::String(Rc::from(value))
    }
}

/// The integer a float represents exactly, if any.
pub(crate) fn integral(n: f64) -> Option<i64> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

/// Textual form of a float: integral values keep a trailing `.0`.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

//! Core types for the lualite binding layer.
//!
//! This crate holds everything the binding layer and a host agree on:
//!
//! - [`ScriptState`]: the stack/table/closure boundary a host implements
//! - [`NativeFn`]: the fixed-ABI native callback
//! - [`ToScript`] / [`FromScript`]: the value codec
//! - [`BindConfig`]: binding-wide settings
//! - the error hierarchy rooted at [`LualiteError`]

pub mod call;
pub mod config;
#[cfg(feature = "containers")]
pub mod containers;
pub mod convert;
pub mod error;
pub mod native_fn;
pub mod state;
pub mod type_hash;
pub mod value;

pub use call::{call, call_global};
pub use config::{BindConfig, UnknownKeyPolicy};
pub use convert::{FromScript, ToScript, Untyped, check_arity, read_element, slot_mismatch};
pub use error::{ConversionError, LualiteError, NativeError, RegistrationError};
pub use native_fn::{NativeCallable, NativeFn};
pub use state::{MULTRET, REGISTRY_INDEX, ScriptState, is_pseudo_index, upvalue_index};
pub use type_hash::TypeHash;
pub use value::{LightUserData, PropertyAccess, PropertyKind, ValueKind};

//! lualite: a compile-time binding layer that exposes native functions,
//! classes, constants and nested namespaces to a Lua-like runtime.
//!
//! Bindings are declared with a [`Module`], which commits classes into the
//! state's [`Registry`] and writes every scope into the runtime as nested
//! tables. Native callables of any supported signature are adapted into
//! fixed-ABI thunks; values cross the boundary through [`ToScript`] and
//! [`FromScript`].
//!
//! # Example
//!
//! ```ignore
//! use lualite::prelude::*;
//!
//! let mut state = State::new();
//! Module::named(&mut state, "math")
//!     .constant("PI", std::f64::consts::PI)
//!     .function("add", |a: i64, b: i64| a + b)
//!     .build()?;
//! ```
//!
//! # Crates
//!
//! - `lualite-core`: host boundary, value codec, errors, config
//! - `lualite-registry`: classes, adapters, instances, scopes
//! - `lualite-macros`: `#[derive(NativeClass)]` (feature `macros`)
//! - `lualite-host`: in-memory reference host (feature `host`)

pub use lualite_core as core;
pub use lualite_registry as registry;

#[cfg(feature = "host")]
pub use lualite_host as host;

pub use lualite_core::{
    BindConfig, ConversionError, FromScript, LualiteError, NativeError, NativeFn,
    RegistrationError, ScriptState, ToScript, UnknownKeyPolicy, call, call_global,
};
pub use lualite_registry::{
    AsBase, ClassBuilder, ClassDescriptor, Instance, Module, NativeClass, Owned, Registry, Scope,
    Shared,
};

#[cfg(feature = "macros")]
pub use lualite_macros::NativeClass;

pub mod prelude {
    pub use lualite_core::{
        BindConfig, ConversionError, FromScript, LightUserData, LualiteError, NativeError,
        NativeFn, PropertyAccess, PropertyKind, RegistrationError, ScriptState, ToScript,
        UnknownKeyPolicy, Untyped, ValueKind, call, call_global,
    };
    pub use lualite_registry::{
        AsBase, ClassBuilder, ClassDescriptor, ConstantValue, Instance, Module, NativeClass,
        Owned, Registry, Scope, Shared,
    };

    #[cfg(feature = "macros")]
    pub use lualite_macros::NativeClass;

    #[cfg(feature = "host")]
    pub use lualite_host::State;
}

//! Class descriptors, adapter thunks, instance lifecycle and scope
//! materialization for lualite.
//!
//! # Overview
//!
//! - [`Module`] / [`Scope`]: declare what to export and where
//! - [`ClassBuilder`]: declare a class bound to a native type
//! - [`Registry`]: per-state store of committed classes and live instances
//! - [`Owned`] / [`Shared`] / [`Instance`]: move instances across the boundary
//!
//! # Example
//!
//! ```ignore
//! Module::named(&mut state, "geometry")
//!     .class(
//!         ClassBuilder::<Point>::new("Point")
//!             .constructor(|x: f64, y: f64| Point { x, y })
//!             .method("length", Point::length),
//!     )
//!     .build()?;
//! ```

pub mod adapter;
pub mod chain;
pub mod class;
pub mod instance;
pub mod member;
pub mod native_class;
pub mod registry;
pub mod scope;

pub use adapter::{IntoConstructor, IntoMethod, IntoNativeFn, MutSelf, RefSelf};
pub use chain::{AsBase, Chain, Upcast};
pub use class::{Accessor, BaseLink, ClassBuilder, ClassDescriptor, MethodEntry, PropertyInfo};
pub use instance::{
    INSTANCE_CACHE_KEY, INSTANCE_KEY, Instance, InstanceHeap, Owned, Shared, push_owned,
    wrapper_address,
};
pub use member::{MemberFn, Receiver};
pub use native_class::NativeClass;
pub use registry::Registry;
pub use scope::{ConstantValue, Module, Scope, ScopeTree};

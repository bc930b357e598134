//! Unified error types for the binding layer.
//!
//! ## Error Hierarchy
//!
//! ```text
//! LualiteError (top-level wrapper)
//! ├── ConversionError   - a single value could not cross the boundary
//! ├── NativeError       - a bound call failed at script-call time
//! └── RegistrationError - a class or scope could not be materialized
//! ```
//!
//! Every precondition a thunk checks (argument count, slot kind, stack depth)
//! surfaces as a [`NativeError`] variant instead of aborting the process.

use thiserror::Error;

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors converting one value between its native and script forms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Integer value does not fit the target type.
    #[error("integer overflow: {value} does not fit in {target_type}")]
    IntegerOverflow {
        value: i64,
        target_type: &'static str,
    },

    /// A float has no exact integer representation.
    #[error("number {value} has no integer representation")]
    NotAnInteger { value: f64 },

    /// The value is not a wrapped native instance.
    #[error("value is not a native instance")]
    NotAnInstance,

    /// The wrapped instance is neither the requested class nor derived from it.
    #[error("instance of '{actual}' is not a '{expected}'")]
    ClassMismatch { expected: String, actual: String },
}

// ============================================================================
// Native Call Errors
// ============================================================================

/// Errors raised while a bound native callable runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// The stack depth does not equal the thunk's expected arity.
    #[error("arity mismatch: expected {expected} stack values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// The slot at `index` holds the wrong kind.
    #[error("type mismatch at stack index {index}: expected {expected}, got {actual}")]
    TypeMismatch {
        index: i32,
        expected: &'static str,
        actual: &'static str,
    },

    /// The index points past the current frame.
    #[error("stack underflow: index {index} is not valid with {top} values on the stack")]
    StackUnderflow { index: i32, top: usize },

    /// A property key has no getter or setter and the policy is strict.
    #[error("class '{class}' has no accessor '{key}'")]
    UnknownAccessor { class: String, key: String },

    /// A script wrote to a field the binding layer owns.
    #[error("field '{key}' of class '{class}' is read-only")]
    ReadOnlyField { class: String, key: String },

    /// The receiver is already borrowed by an outer call.
    #[error("instance of '{class}' is already borrowed")]
    InstanceBorrowed { class: String },

    /// The wrapper outlived the native instance it referred to.
    #[error("instance at {address:#x} is no longer alive")]
    StaleInstance { address: usize },

    /// A native type was pushed before its class was registered.
    #[error("type '{type_name}' has no registered class")]
    UnregisteredClass { type_name: &'static str },

    /// The state has no binding registry installed.
    #[error("no binding registry is installed in this state")]
    NoRegistry,

    /// The value at the call position is not callable.
    #[error("attempt to call a {kind} value")]
    NotCallable { kind: &'static str },

    /// The value cannot be indexed.
    #[error("attempt to index a {kind} value")]
    NotIndexable { kind: &'static str },

    /// A value failed to convert.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Free-form failure raised by native code.
    #[error("{0}")]
    Other(String),
}

impl NativeError {
    /// Create a free-form error.
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other(message.into())
    }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while registering or materializing bindings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// `inherits` named a base whose class has not been registered yet.
    #[error("class '{class}' inherits from '{base}', which is not registered")]
    BaseNotRegistered { class: String, base: &'static str },

    /// A scope name is already bound to something that is not a table.
    #[error("scope '{path}' is bound to a {kind} value, not a table")]
    ScopeNotTable { path: String, kind: &'static str },

    /// A host operation failed during materialization.
    #[error(transparent)]
    Native(#[from] NativeError),
}

// ============================================================================
// Unified Error
// ============================================================================

/// Top-level error covering every phase.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LualiteError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Native(#[from] NativeError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

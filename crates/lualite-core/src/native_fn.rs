//! Native callback storage and callable trait.

use std::fmt;
use std::rc::Rc;

use crate::error::NativeError;
use crate::state::ScriptState;

/// Type-erased native callback with the host's fixed ABI.
///
/// A callback reads its arguments from the current frame, pushes its
/// results, and returns how many it pushed. The inner callable is shared,
/// so cloning a `NativeFn` is cheap and every clone dispatches to the same
/// thunk.
pub struct NativeFn {
    inner: Rc<dyn NativeCallable>,
}

impl NativeFn {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut dyn ScriptState) -> Result<usize, NativeError> + 'static,
    {
        Self { inner: Rc::new(f) }
    }

    /// Wrap any [`NativeCallable`] implementation.
    pub fn from_callable<C>(callable: C) -> Self
    where
        C: NativeCallable + 'static,
    {
        Self {
            inner: Rc::new(callable),
        }
    }

    /// Invoke the callback against `state`.
    #[inline]
    pub fn call(&self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        self.inner.call(state)
    }

    /// True when both handles share one callable.
    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

impl Clone for NativeFn {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Trait for callable native functions.
pub trait NativeCallable {
    fn call(&self, state: &mut dyn ScriptState) -> Result<usize, NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut dyn ScriptState) -> Result<usize, NativeError>,
{
    fn call(&self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        (self)(state)
    }
}

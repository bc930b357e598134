//! Member thunks and the receiver they dispatch on.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lualite_core::{ConversionError, NativeError, ScriptState};

use crate::chain::Chain;

/// The instance a member thunk runs against, already resolved to the class
/// level the member was declared on.
///
/// The instance is shared with the heap; the receiver borrows it only for
/// the duration of the native call, so a reentrant call that needs a
/// conflicting borrow fails with [`NativeError::InstanceBorrowed`].
pub struct Receiver<'a> {
    cell: &'a RefCell<dyn Any>,
    chain: &'a Chain,
    class: &'a str,
}

impl<'a> Receiver<'a> {
    pub fn new(cell: &'a RefCell<dyn Any>, chain: &'a Chain, class: &'a str) -> Self {
        Self { cell, chain, class }
    }

    /// Name of the wrapper's class, for diagnostics.
    pub fn class(&self) -> &str {
        self.class
    }

    /// Run `f` with a shared view of the receiver as `T`.
    pub fn with_ref<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, NativeError> {
        let guard = self.cell.try_borrow().map_err(|_| self.borrowed())?;
        match self.chain.apply(&*guard).and_then(|view| view.downcast_ref::<T>()) {
            Some(target) => Ok(f(target)),
            None => Err(self.mismatch::<T>()),
        }
    }

    /// Run `f` with an exclusive view of the receiver as `T`.
    pub fn with_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, NativeError> {
        let mut guard = self.cell.try_borrow_mut().map_err(|_| self.borrowed())?;
        match self.chain.apply_mut(&mut *guard).and_then(|view| view.downcast_mut::<T>()) {
            Some(target) => Ok(f(target)),
            None => Err(self.mismatch::<T>()),
        }
    }

    fn borrowed(&self) -> NativeError {
        NativeError::InstanceBorrowed {
            class: self.class.to_owned(),
        }
    }

    fn mismatch<T>(&self) -> NativeError {
        ConversionError::ClassMismatch {
            expected: type_name::<T>().to_owned(),
            actual: self.class.to_owned(),
        }
        .into()
    }
}

/// Type-erased member thunk: reads arguments from the frame, runs against
/// a [`Receiver`], pushes results and returns their count.
pub struct MemberFn {
    inner: Rc<dyn Fn(&mut dyn ScriptState, &Receiver<'_>) -> Result<usize, NativeError>>,
}

impl MemberFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut dyn ScriptState, &Receiver<'_>) -> Result<usize, NativeError> + 'static,
    {
        Self { inner: Rc::new(f) }
    }

    #[inline]
    pub fn call(
        &self,
        state: &mut dyn ScriptState,
        receiver: &Receiver<'_>,
    ) -> Result<usize, NativeError> {
        (self.inner)(state, receiver)
    }
}

impl Clone for MemberFn {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for MemberFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberFn").finish_non_exhaustive()
    }
}

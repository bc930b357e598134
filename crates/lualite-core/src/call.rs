//! Calling script functions from native code.

use crate::convert::{FromScript, ToScript};
use crate::error::NativeError;
use crate::state::ScriptState;

/// Push `args` and call the function just below them.
///
/// `args` is usually a tuple, each element becoming one argument; `()` calls
/// with none. Results are left on the stack as for [`ScriptState::call`].
pub fn call<A: ToScript>(
    state: &mut dyn ScriptState,
    nresults: Option<usize>,
    args: A,
) -> Result<(), NativeError> {
    let function = state.top();
    if function == 0 {
        return Err(NativeError::StackUnderflow { index: -1, top: 0 });
    }
    let nargs = match args.to_script(state) {
        Ok(nargs) => nargs,
        Err(err) => {
            state.set_top(function - 1);
            return Err(err);
        }
    };
    state.call(nargs, nresults)
}

/// Call the global function `name` and decode its single result.
pub fn call_global<R: FromScript, A: ToScript>(
    state: &mut dyn ScriptState,
    name: &str,
    args: A,
) -> Result<R, NativeError> {
    state.get_global(name);
    call(state, Some(1), args)?;
    let result = R::from_script(state, -1);
    state.pop(1);
    result
}

//! In-memory reference host for the lualite binding layer.
//!
//! [`State`] implements [`lualite_core::ScriptState`] with a value stack,
//! insertion-ordered tables with metatables, native closures with upvalues,
//! and a mark-and-sweep collector that runs `__gc` finalizers. It has no
//! parser: "script code" is whatever drives the state through its API, which
//! is enough to exercise every binding end to end.

pub mod arena;
mod gc;
pub mod state;
pub mod table;
pub mod value;

pub use arena::{Arena, Handle};
pub use state::{HeapStats, MAX_CALL_DEPTH, State};
pub use table::Table;
pub use value::{Key, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use lualite_core::{NativeError, NativeFn, ScriptState, ValueKind, upvalue_index};

    fn add_fn() -> NativeFn {
        NativeFn::new(|state: &mut dyn ScriptState| {
            let a = state.to_integer(1).unwrap_or(0);
            let b = state.to_integer(2).unwrap_or(0);
            state.push_integer(a + b);
            Ok(1)
        })
    }

    #[test]
    fn relative_and_absolute_indices() {
        let mut state = State::new();
        state.push_integer(1);
        state.push_integer(2);
        state.push_integer(3);
        assert_eq!(state.top(), 3);
        assert_eq!(state.abs_index(-1), 3);
        assert_eq!(state.to_integer(-3), Some(1));
        assert_eq!(state.kind(4), None);
        assert_eq!(state.kind(-4), None);

        state.remove(1);
        assert_eq!(state.to_integer(1), Some(2));
        state.push_integer(9);
        state.insert(1);
        assert_eq!(state.to_integer(1), Some(9));
        state.set_top(1);
        assert_eq!(state.top(), 1);
    }

    #[test]
    fn call_adjusts_results() {
        let mut state = State::new();
        state.push_closure(add_fn(), 0);
        state.push_integer(3);
        state.push_integer(4);
        state.call(2, Some(2)).unwrap();
        assert_eq!(state.top(), 2);
        assert_eq!(state.to_integer(1), Some(7));
        assert_eq!(state.kind(2), Some(ValueKind::Nil));
    }

    #[test]
    fn calling_a_non_function_fails_and_cleans_up() {
        let mut state = State::new();
        state.push_integer(1);
        state.push_integer(2);
        let err = state.call(1, Some(1)).unwrap_err();
        assert_eq!(err, NativeError::NotCallable { kind: "integer" });
        assert_eq!(state.top(), 0);
    }

    #[test]
    fn frames_isolate_callee_indices() {
        let mut state = State::new();
        state.push_string("caller");
        state.push_closure(
            NativeFn::new(|state: &mut dyn ScriptState| {
                assert_eq!(state.top(), 1);
                assert_eq!(state.to_integer(1), Some(5));
                Ok(0)
            }),
            0,
        );
        state.push_integer(5);
        state.call(1, Some(0)).unwrap();
        assert_eq!(state.top(), 1);
        assert_eq!(state.to_str(1).as_deref(), Some("caller"));
    }

    #[test]
    fn upvalues_are_readable_and_writable() {
        let mut state = State::new();
        state.push_integer(10);
        state.push_closure(
            NativeFn::new(|state: &mut dyn ScriptState| {
                let current = state.to_integer(upvalue_index(1)).unwrap_or(0);
                state.push_integer(current + 1);
                state.replace(upvalue_index(1));
                state.push_integer(current);
                Ok(1)
            }),
            1,
        );
        state.set_global("tick");
        for expected in 10..13 {
            state.get_global("tick");
            state.call(0, Some(1)).unwrap();
            assert_eq!(state.to_integer(-1), Some(expected));
            state.pop(1);
        }
    }

    #[test]
    fn tables_raw_access_and_iteration() {
        let mut state = State::new();
        state.create_table(2, 1);
        state.push_integer(10);
        state.raw_set_i(-2, 1);
        state.push_integer(20);
        state.raw_set_i(-2, 2);
        state.push_boolean(true);
        state.raw_set_field(-2, "flag");
        assert_eq!(state.raw_len(-1), 2);

        let mut seen = 0;
        state.push_nil();
        while state.next(1) {
            seen += 1;
            state.pop(1);
        }
        assert_eq!(seen, 3);
        assert_eq!(state.top(), 1);
    }

    #[test]
    fn index_metamethod_function_and_table() {
        let mut state = State::new();
        // fallback table
        state.create_table(0, 1);
        state.push_integer(42);
        state.raw_set_field(-2, "answer");
        // object with metatable { __index = fallback }
        state.create_table(0, 0);
        state.create_table(0, 1);
        state.push_value(1);
        state.raw_set_field(-2, "__index");
        state.set_metatable(-2);

        state.get_field(-1, "answer").unwrap();
        assert_eq!(state.to_integer(-1), Some(42));
        state.pop(1);
        state.get_field(-1, "missing").unwrap();
        assert!(state.is_nil(-1));
    }

    #[test]
    fn newindex_metamethod_intercepts_absent_keys() {
        let mut state = State::new();
        state.create_table(0, 0);
        state.create_table(0, 1);
        state.push_closure(NativeFn::new(|_: &mut dyn ScriptState| Ok(0)), 0);
        state.raw_set_field(-2, "__newindex");
        state.set_metatable(-2);

        state.push_integer(1);
        state.set_field(-2, "dropped").unwrap();
        state.raw_get_field(-1, "dropped");
        assert!(state.is_nil(-1));
    }

    #[test]
    fn collector_runs_finalizers_once_and_frees() {
        let mut state = State::new();
        state.create_table(0, 0);
        state.create_table(0, 1);
        state.push_closure(
            NativeFn::new(|state: &mut dyn ScriptState| {
                state.get_global("finalized");
                let count = state.to_integer(-1).unwrap_or(0);
                state.pop(1);
                state.push_integer(count + 1);
                state.set_global("finalized");
                Ok(0)
            }),
            0,
        );
        state.raw_set_field(-2, "__gc");
        state.set_metatable(-2);
        state.pop(1);

        let before = state.stats();
        assert!(state.collect_garbage() >= 2);
        assert!(state.stats().tables < before.tables);
        state.collect_garbage();

        state.get_global("finalized");
        assert_eq!(state.to_integer(-1), Some(1));
    }

    #[test]
    fn weak_values_are_cleared() {
        let mut state = State::new();
        state.create_table(0, 1);
        state.create_table(0, 1);
        state.push_string("v");
        state.raw_set_field(-2, "__mode");
        state.set_metatable(-2);
        state.push_value(-1);
        state.set_global("cache");

        state.create_table(0, 0);
        state.raw_set_field(-2, "entry");
        state.raw_get_field(-1, "entry");
        assert!(state.is_table(-1));
        state.pop(2);

        state.collect_garbage();
        state.get_global("cache");
        state.raw_get_field(-1, "entry");
        assert!(state.is_nil(-1));
    }
}

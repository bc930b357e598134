//! The reference host state.

use std::any::Any;
use std::rc::Rc;

use lualite_core::{
    LightUserData, NativeError, NativeFn, REGISTRY_INDEX, ScriptState, ValueKind, is_pseudo_index,
};

use crate::arena::{Arena, Handle};
use crate::table::Table;
use crate::value::{Key, Value, format_number, integral};

/// Nested native calls allowed before a call fails with a stack overflow.
pub const MAX_CALL_DEPTH: usize = 200;

/// `__index`/`__newindex` table chains longer than this are treated as loops.
const MAX_META_CHAIN: usize = 100;

/// A native closure and its captured upvalues.
pub struct Closure {
    pub(crate) function: NativeFn,
    pub(crate) upvalues: Vec<Value>,
}

struct Frame {
    base: usize,
    closure: Handle,
}

enum Slot {
    Stack(usize),
    Upvalue(usize),
    Registry,
}

/// Live object counts, for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub tables: usize,
    pub functions: usize,
}

/// In-memory host: one value stack, a table heap, native closures and a
/// mark-and-sweep collector.
pub struct State {
    pub(crate) stack: Vec<Value>,
    frames: Vec<Frame>,
    pub(crate) tables: Arena<Table>,
    pub(crate) functions: Arena<Closure>,
    pub(crate) globals: Handle,
    pub(crate) registry: Handle,
    app_data: Option<Rc<dyn Any>>,
}

impl State {
    pub fn new() -> Self {
        let mut tables = Arena::new();
        let globals = tables.allocate(Table::default());
        let registry = tables.allocate(Table::default());
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            tables,
            functions: Arena::new(),
            globals,
            registry,
            app_data: None,
        }
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            tables: self.tables.len(),
            functions: self.functions.len(),
        }
    }

    /// Value at `index`, if the index is valid.
    pub fn value(&self, index: i32) -> Option<Value> {
        match self.resolve(index)? {
            Slot::Stack(pos) => self.stack.get(pos).cloned(),
            Slot::Upvalue(n) => self.current_closure()?.upvalues.get(n).cloned(),
            Slot::Registry => Some(Value::Table(self.registry)),
        }
    }

    pub fn table(&self, handle: Handle) -> Option<&Table> {
        self.tables.get(handle)
    }

    fn base(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.base)
    }

    fn current_closure(&self) -> Option<&Closure> {
        let frame = self.frames.last()?;
        self.functions.get(frame.closure)
    }

    fn resolve(&self, index: i32) -> Option<Slot> {
        let base = self.base();
        if index > 0 {
            let pos = base + index as usize - 1;
            (pos < self.stack.len()).then_some(Slot::Stack(pos))
        } else if index == REGISTRY_INDEX {
            Some(Slot::Registry)
        } else if is_pseudo_index(index) {
            Some(Slot::Upvalue((REGISTRY_INDEX - index) as usize - 1))
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            let len = self.stack.len();
            (back <= len - base).then(|| Slot::Stack(len - back))
        } else {
            None
        }
    }

    fn store(&mut self, slot: Slot, value: Value) {
        match slot {
            Slot::Stack(pos) => {
                if let Some(entry) = self.stack.get_mut(pos) {
                    *entry = value;
                }
            }
            Slot::Upvalue(n) => {
                if let Some(frame) = self.frames.last()
                    && let Some(closure) = self.functions.get_mut(frame.closure)
                    && let Some(upvalue) = closure.upvalues.get_mut(n)
                {
                    *upvalue = value;
                }
            }
            Slot::Registry => {}
        }
    }

    /// Pop one value, never reaching below the current frame.
    fn pop_value(&mut self) -> Value {
        if self.stack.len() > self.base() {
            self.stack.pop().unwrap_or_default()
        } else {
            Value::Nil
        }
    }

    fn table_at(&self, index: i32) -> Option<Handle> {
        match self.value(index)? {
            Value::Table(handle) => Some(handle),
            _ => None,
        }
    }

    pub(crate) fn raw_lookup(&self, table: Handle, key: &Value) -> Value {
        match (self.tables.get(table), Key::from_value(key)) {
            (Some(table), Some(key)) => table.get(&key),
            _ => Value::Nil,
        }
    }

    pub(crate) fn raw_store(&mut self, table: Handle, key: Value, value: Value) {
        let Some(key) = Key::from_value(&key) else {
            log::warn!("ignoring table store with a {} key", key.kind());
            return;
        };
        if let Some(table) = self.tables.get_mut(table) {
            table.set(key, value);
        }
    }

    pub(crate) fn metafield(&self, table: Handle, name: &str) -> Option<Value> {
        let metatable = self.tables.get(table)?.metatable?;
        let value = self.tables.get(metatable)?.get_str(name);
        (!value.is_nil()).then_some(value)
    }

    pub(crate) fn call_value(
        &mut self,
        function: Value,
        args: Vec<Value>,
        nresults: usize,
    ) -> Result<Vec<Value>, NativeError> {
        let nargs = args.len();
        self.stack.push(function);
        self.stack.extend(args);
        self.call(nargs, Some(nresults))?;
        let at = self.stack.len() - nresults;
        Ok(self.stack.split_off(at))
    }

    fn index_value(&mut self, mut object: Value, key: Value) -> Result<Value, NativeError> {
        for _ in 0..MAX_META_CHAIN {
            let Value::Table(table) = object else {
                return Err(NativeError::NotIndexable {
                    kind: object.kind().name(),
                });
            };
            let raw = self.raw_lookup(table, &key);
            if !raw.is_nil() {
                return Ok(raw);
            }
            match self.metafield(table, "__index") {
                None => return Ok(Value::Nil),
                Some(handler @ Value::Function(_)) => {
                    let mut results = self.call_value(handler, vec![Value::Table(table), key], 1)?;
                    return Ok(results.pop().unwrap_or_default());
                }
                Some(next) => object = next,
            }
        }
        Err(NativeError::other("'__index' chain too long; possible loop"))
    }

    fn new_index(&mut self, mut object: Value, key: Value, value: Value) -> Result<(), NativeError> {
        for _ in 0..MAX_META_CHAIN {
            let Value::Table(table) = object else {
                return Err(NativeError::NotIndexable {
                    kind: object.kind().name(),
                });
            };
            if !self.raw_lookup(table, &key).is_nil() {
                self.raw_store(table, key, value);
                return Ok(());
            }
            match self.metafield(table, "__newindex") {
                None => {
                    self.raw_store(table, key, value);
                    return Ok(());
                }
                Some(handler @ Value::Function(_)) => {
                    self.call_value(handler, vec![Value::Table(table), key, value], 0)?;
                    return Ok(());
                }
                Some(next) => object = next,
            }
        }
        Err(NativeError::other("'__newindex' chain too long; possible loop"))
    }

    /// Frames' running closures, for the collector's root set.
    pub(crate) fn running_closures(&self) -> impl Iterator<Item = Handle> + '_ {
        self.frames.iter().map(|frame| frame.closure)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptState for State {
    fn top(&self) -> usize {
        self.stack.len() - self.base()
    }

    fn set_top(&mut self, top: usize) {
        let len = self.base() + top;
        self.stack.resize(len, Value::Nil);
    }

    fn abs_index(&self, index: i32) -> i32 {
        if index > 0 || is_pseudo_index(index) {
            index
        } else {
            self.top() as i32 + index + 1
        }
    }

    fn kind(&self, index: i32) -> Option<ValueKind> {
        self.value(index).map(|value| value.kind())
    }

    fn push_value(&mut self, index: i32) {
        let value = self.value(index).unwrap_or_default();
        self.stack.push(value);
    }

    fn insert(&mut self, index: i32) {
        if let Some(Slot::Stack(pos)) = self.resolve(index) {
            let value = self.pop_value();
            self.stack.insert(pos.min(self.stack.len()), value);
        }
    }

    fn remove(&mut self, index: i32) {
        if let Some(Slot::Stack(pos)) = self.resolve(index) {
            self.stack.remove(pos);
        }
    }

    fn replace(&mut self, index: i32) {
        let Some(slot) = self.resolve(index) else {
            self.pop_value();
            return;
        };
        let value = self.pop_value();
        self.store(slot, value);
    }

    fn push_nil(&mut self) {
        self.stack.push(Value::Nil);
    }

    fn push_boolean(&mut self, value: bool) {
        self.stack.push(Value::Boolean(value));
    }

    fn push_integer(&mut self, value: i64) {
        self.stack.push(Value::Integer(value));
    }

    fn push_number(&mut self, value: f64) {
        self.stack.push(Value::Number(value));
    }

    fn push_string(&mut self, value: &str) {
        self.stack.push(Value::from(value));
    }

    fn push_light_userdata(&mut self, value: LightUserData) {
        self.stack.push(Value::LightUserData(value));
    }

    fn push_closure(&mut self, function: NativeFn, upvalues: usize) {
        let available = self.top();
        let at = self.stack.len() - upvalues.min(available);
        let upvalues = self.stack.split_off(at);
        let handle = self.functions.allocate(Closure { function, upvalues });
        self.stack.push(Value::Function(handle));
    }

    fn to_boolean(&self, index: i32) -> bool {
        self.value(index).is_some_and(|value| value.is_truthy())
    }

    fn to_integer(&self, index: i32) -> Option<i64> {
        match self.value(index)? {
            Value::Integer(i) => Some(i),
            Value::Number(n) => integral(n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn to_number(&self, index: i32) -> Option<f64> {
        match self.value(index)? {
            Value::Integer(i) => Some(i as f64),
            Value::Number(n) => Some(n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn to_str(&self, index: i32) -> Option<String> {
        match self.value(index)? {
            Value::String(s) => Some(s.to_string()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Number(n) => Some(format_number(n)),
            _ => None,
        }
    }

    fn to_light_userdata(&self, index: i32) -> Option<LightUserData> {
        match self.value(index)? {
            Value::LightUserData(light) => Some(light),
            _ => None,
        }
    }

    fn raw_equal(&self, a: i32, b: i32) -> bool {
        match (self.value(a), self.value(b)) {
            (Some(a), Some(b)) => a.raw_eq(&b),
            _ => false,
        }
    }

    fn create_table(&mut self, narr: usize, nrec: usize) {
        let handle = self.tables.allocate(Table::with_capacity(narr + nrec));
        self.stack.push(Value::Table(handle));
    }

    fn raw_get(&mut self, table: i32) {
        let table = self.table_at(table);
        let key = self.pop_value();
        let value = table.map_or(Value::Nil, |table| self.raw_lookup(table, &key));
        self.stack.push(value);
    }

    fn raw_set(&mut self, table: i32) {
        let table = self.table_at(table);
        let value = self.pop_value();
        let key = self.pop_value();
        if let Some(table) = table {
            self.raw_store(table, key, value);
        }
    }

    fn raw_get_i(&mut self, table: i32, n: i64) {
        let value = self
            .table_at(table)
            .map_or(Value::Nil, |table| self.raw_lookup(table, &Value::Integer(n)));
        self.stack.push(value);
    }

    fn raw_set_i(&mut self, table: i32, n: i64) {
        let table = self.table_at(table);
        let value = self.pop_value();
        if let Some(table) = table {
            self.raw_store(table, Value::Integer(n), value);
        }
    }

    fn raw_len(&self, table: i32) -> usize {
        self.table_at(table)
            .and_then(|table| self.tables.get(table))
            .map_or(0, Table::len)
    }

    fn next(&mut self, table: i32) -> bool {
        let table = self.table_at(table);
        let key = self.pop_value();
        let entry = table.and_then(|table| {
            let table = self.tables.get(table)?;
            match Key::from_value(&key) {
                Some(key) => table.next(Some(&key)),
                None if key.is_nil() => table.next(None),
                None => None,
            }
        });
        match entry {
            Some((key, value)) => {
                self.stack.push(key.to_value());
                self.stack.push(value);
                true
            }
            None => false,
        }
    }

    fn get_field(&mut self, table: i32, key: &str) -> Result<(), NativeError> {
        let object = self.value(table).unwrap_or_default();
        let value = self.index_value(object, Value::from(key))?;
        self.stack.push(value);
        Ok(())
    }

    fn set_field(&mut self, table: i32, key: &str) -> Result<(), NativeError> {
        let object = self.value(table).unwrap_or_default();
        let value = self.pop_value();
        self.new_index(object, Value::from(key), value)
    }

    fn set_metatable(&mut self, index: i32) {
        let target = self.table_at(index);
        let metatable = match self.pop_value() {
            Value::Table(handle) => Some(handle),
            _ => None,
        };
        if let Some(table) = target.and_then(|target| self.tables.get_mut(target)) {
            table.metatable = metatable;
        }
    }

    fn get_metatable(&mut self, index: i32) -> bool {
        let metatable = self
            .table_at(index)
            .and_then(|table| self.tables.get(table))
            .and_then(Table::metatable);
        match metatable {
            Some(handle) => {
                self.stack.push(Value::Table(handle));
                true
            }
            None => false,
        }
    }

    fn get_global(&mut self, name: &str) {
        let value = self.raw_lookup(self.globals, &Value::from(name));
        self.stack.push(value);
    }

    fn set_global(&mut self, name: &str) {
        let value = self.pop_value();
        self.raw_store(self.globals, Value::from(name), value);
    }

    fn call(&mut self, nargs: usize, nresults: Option<usize>) -> Result<(), NativeError> {
        let top = self.top();
        if nargs + 1 > top {
            return Err(NativeError::StackUnderflow {
                index: -(nargs as i32) - 1,
                top,
            });
        }
        let function_pos = self.stack.len() - nargs - 1;
        let handle = match &self.stack[function_pos] {
            Value::Function(handle) => *handle,
            other => {
                let kind = other.kind().name();
                self.stack.truncate(function_pos);
                return Err(NativeError::NotCallable { kind });
            }
        };
        let Some(function) = self.functions.get(handle).map(|closure| closure.function.clone()) else {
            self.stack.truncate(function_pos);
            return Err(NativeError::NotCallable { kind: "collected" });
        };
        if self.frames.len() >= MAX_CALL_DEPTH {
            self.stack.truncate(function_pos);
            return Err(NativeError::other("stack overflow"));
        }

        self.frames.push(Frame {
            base: function_pos + 1,
            closure: handle,
        });
        let outcome = function.call(self);
        self.frames.pop();

        let produced = match outcome {
            Ok(produced) => produced,
            Err(err) => {
                self.stack.truncate(function_pos);
                return Err(err);
            }
        };
        let available = self.stack.len().saturating_sub(function_pos + 1);
        if produced > available {
            self.stack.truncate(function_pos);
            return Err(NativeError::other(format!(
                "native function reported {produced} results but left {available} on the stack"
            )));
        }
        let results = self.stack.split_off(self.stack.len() - produced);
        self.stack.truncate(function_pos);
        match nresults {
            None => self.stack.extend(results),
            Some(n) => self.stack.extend(
                results
                    .into_iter()
                    .chain(std::iter::repeat(Value::Nil))
                    .take(n),
            ),
        }
        Ok(())
    }

    fn app_data(&self) -> Option<Rc<dyn Any>> {
        self.app_data.clone()
    }

    fn set_app_data(&mut self, data: Rc<dyn Any>) {
        self.app_data = Some(data);
    }
}

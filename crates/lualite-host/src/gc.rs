//! Mark-and-sweep collection with `__gc` finalizers and weak-valued tables.
//!
//! Roots are the stack, the globals table, the host registry and every
//! running closure. A table whose metatable has `__mode` containing `v`
//! holds its values weakly: entries whose value is otherwise unreachable
//! are cleared before finalizers run. Finalizers run once per object; an
//! object a finalizer makes reachable again survives the cycle.

use rustc_hash::FxHashSet;

use crate::arena::Handle;
use crate::state::State;
use crate::table::Table;
use crate::value::Value;

#[derive(Default)]
struct Marks {
    tables: FxHashSet<Handle>,
    functions: FxHashSet<Handle>,
}

impl State {
    /// Run a full collection cycle. Returns the number of objects freed.
    pub fn collect_garbage(&mut self) -> usize {
        let marks = self.mark();
        self.clear_weak_entries(&marks);

        let pending: Vec<Handle> = self
            .tables
            .iter()
            .filter(|(handle, table)| {
                !marks.tables.contains(handle)
                    && !table.finalized
                    && matches!(self.metafield(*handle, "__gc"), Some(Value::Function(_)))
            })
            .map(|(handle, _)| handle)
            .collect();

        let marks = if pending.is_empty() {
            marks
        } else {
            for &handle in &pending {
                if let Some(table) = self.tables.get_mut(handle) {
                    table.finalized = true;
                }
                if let Some(finalizer) = self.metafield(handle, "__gc")
                    && let Err(err) = self.call_value(finalizer, vec![Value::Table(handle)], 0)
                {
                    log::warn!("error in __gc metamethod: {err}");
                }
            }
            let marks = self.mark();
            self.clear_weak_entries(&marks);
            marks
        };

        self.sweep(&marks)
    }

    fn mark(&self) -> Marks {
        let mut marks = Marks::default();
        let mut work: Vec<Value> = self.stack.clone();
        work.push(Value::Table(self.globals));
        work.push(Value::Table(self.registry));
        work.extend(self.running_closures().map(Value::Function));

        while let Some(value) = work.pop() {
            match value {
                Value::Table(handle) => {
                    if !marks.tables.insert(handle) {
                        continue;
                    }
                    let Some(table) = self.tables.get(handle) else {
                        continue;
                    };
                    if let Some(metatable) = table.metatable() {
                        work.push(Value::Table(metatable));
                    }
                    let weak_values = self.has_weak_values(table);
                    for (key, value) in table.entries() {
                        work.push(key.to_value());
                        if !weak_values {
                            work.push(value.clone());
                        }
                    }
                }
                Value::Function(handle) => {
                    if !marks.functions.insert(handle) {
                        continue;
                    }
                    if let Some(closure) = self.functions.get(handle) {
                        work.extend(closure.upvalues.iter().cloned());
                    }
                }
                _ => {}
            }
        }
        marks
    }

    fn has_weak_values(&self, table: &Table) -> bool {
        let Some(metatable) = table.metatable().and_then(|handle| self.tables.get(handle)) else {
            return false;
        };
        match metatable.get_str("__mode") {
            Value::String(mode) => mode.contains('v'),
            _ => false,
        }
    }

    fn clear_weak_entries(&mut self, marks: &Marks) {
        let mut cleared = Vec::new();
        for (handle, table) in self.tables.iter() {
            if !marks.tables.contains(&handle) || !self.has_weak_values(table) {
                continue;
            }
            for (key, value) in table.entries() {
                let dead = match value {
                    Value::Table(target) => !marks.tables.contains(target),
                    Value::Function(target) => !marks.functions.contains(target),
                    _ => false,
                };
                if dead {
                    cleared.push((handle, key.clone()));
                }
            }
        }
        for (handle, key) in cleared {
            if let Some(table) = self.tables.get_mut(handle) {
                table.set(key, Value::Nil);
            }
        }
    }

    fn sweep(&mut self, marks: &Marks) -> usize {
        let dead_tables: Vec<Handle> = self
            .tables
            .iter()
            .map(|(handle, _)| handle)
            .filter(|handle| !marks.tables.contains(handle))
            .collect();
        let dead_functions: Vec<Handle> = self
            .functions
            .iter()
            .map(|(handle, _)| handle)
            .filter(|handle| !marks.functions.contains(handle))
            .collect();
        let freed = dead_tables.len() + dead_functions.len();
        for handle in dead_tables {
            self.tables.free(handle);
        }
        for handle in dead_functions {
            self.functions.free(handle);
        }
        if freed > 0 {
            log::trace!("collected {freed} objects");
        }
        freed
    }
}

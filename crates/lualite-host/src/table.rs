//! Host tables.

use rustc_hash::FxHashMap;

use crate::arena::Handle;
use crate::value::{Key, Value};

/// An associative table with insertion-ordered iteration.
///
/// Assigning nil keeps the entry as a tombstone so that a `next` walk in
/// progress stays valid.
#[derive(Debug, Default)]
pub struct Table {
    entries: Vec<(Key, Value)>,
    positions: FxHashMap<Key, usize>,
    pub(crate) metatable: Option<Handle>,
    pub(crate) finalized: bool,
}

impl Table {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            positions: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            metatable: None,
            finalized: false,
        }
    }

    pub fn get(&self, key: &Key) -> Value {
        self.positions
            .get(key)
            .map_or(Value::Nil, |&pos| self.entries[pos].1.clone())
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.get(&Key::from(key))
    }

    pub fn set(&mut self, key: Key, value: Value) {
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None if value.is_nil() => {}
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Border of the sequence part: `n` such that `t[n]` is non-nil and
    /// `t[n + 1]` is nil, scanning from 1.
    pub fn len(&self) -> usize {
        let mut n = 0;
        while !self.get(&Key::Integer(n as i64 + 1)).is_nil() {
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, value)| value.is_nil())
    }

    /// Entry following `key` in iteration order, or the first one for `None`.
    pub fn next(&self, key: Option<&Key>) -> Option<(Key, Value)> {
        let start = match key {
            None => 0,
            Some(key) => self.positions.get(key)? + 1,
        };
        self.entries[start..]
            .iter()
            .find(|(_, value)| !value.is_nil())
            .cloned()
    }

    pub fn metatable(&self) -> Option<Handle> {
        self.metatable
    }

    /// Live entries.
    pub fn entries(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries
            .iter()
            .filter(|(_, value)| !value.is_nil())
            .map(|(key, value)| (key, value))
    }
}

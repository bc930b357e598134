//! Container codecs.
//!
//! Sequences encode as 1-based tables, sets as sequences of their elements,
//! and maps as key/value tables. Decoding is the structural inverse: length
//! and indexed reads for sequences, `next` iteration for maps.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::{BuildHasher, Hash};

use crate::convert::{FromScript, ToScript, read_element};
use crate::error::NativeError;
use crate::state::ScriptState;
use crate::value::ValueKind;

fn push_sequence<I>(state: &mut dyn ScriptState, len: usize, items: I) -> Result<usize, NativeError>
where
    I: IntoIterator,
    I::Item: ToScript,
{
    state.create_table(len, 0);
    for (i, item) in items.into_iter().enumerate() {
        item.to_script_one(state)?;
        state.raw_set_i(-2, i as i64 + 1);
    }
    Ok(1)
}

/// Read a sequence table, reserving capacity from its length first.
fn read_sequence<T, C>(
    state: &mut dyn ScriptState,
    index: i32,
    with_capacity: impl FnOnce(usize) -> C,
    mut push: impl FnMut(&mut C, T),
) -> Result<C, NativeError>
where
    T: FromScript,
{
    state.expect_kind(index, ValueKind::Table)?;
    let table = state.abs_index(index);
    let len = state.raw_len(table);
    let mut out = with_capacity(len);
    for n in 1..=len {
        push(&mut out, read_element(state, table, n as i64)?);
    }
    Ok(out)
}

fn push_map<K, V, I>(state: &mut dyn ScriptState, len: usize, entries: I) -> Result<usize, NativeError>
where
    I: IntoIterator<Item = (K, V)>,
    K: ToScript,
    V: ToScript,
{
    state.create_table(0, len);
    for (key, value) in entries {
        key.to_script_one(state)?;
        value.to_script_one(state)?;
        state.raw_set(-3);
    }
    Ok(1)
}

fn read_map<K, V, C>(
    state: &mut dyn ScriptState,
    index: i32,
    mut out: C,
    mut insert: impl FnMut(&mut C, K, V),
) -> Result<C, NativeError>
where
    K: FromScript,
    V: FromScript,
{
    state.expect_kind(index, ValueKind::Table)?;
    let table = state.abs_index(index);
    state.push_nil();
    while state.next(table) {
        let entry = match K::from_script(state, -2) {
            Ok(key) => V::from_script(state, -1).map(|value| (key, value)),
            Err(err) => Err(err),
        };
        match entry {
            Ok((key, value)) => {
                insert(&mut out, key, value);
                state.pop(1);
            }
            Err(err) => {
                state.pop(2);
                return Err(err);
            }
        }
    }
    Ok(out)
}

// ============================================================================
// Sequences
// ============================================================================

impl<T: ToScript> ToScript for Vec<T> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let len = self.len();
        push_sequence(state, len, self)
    }
}

impl<T: FromScript> FromScript for Vec<T> {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        read_sequence(state, index, Vec::with_capacity, Vec::push)
    }
}

impl<T: ToScript> ToScript for VecDeque<T> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let len = self.len();
        push_sequence(state, len, self)
    }
}

impl<T: FromScript> FromScript for VecDeque<T> {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        read_sequence(state, index, VecDeque::with_capacity, VecDeque::push_back)
    }
}

impl<T: ToScript> ToScript for LinkedList<T> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let len = self.len();
        push_sequence(state, len, self)
    }
}

impl<T: FromScript> FromScript for LinkedList<T> {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        read_sequence(state, index, |_| LinkedList::new(), LinkedList::push_back)
    }
}

impl<T: ToScript, const N: usize> ToScript for [T; N] {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        push_sequence(state, N, self)
    }
}

/// Reads `min(len, N)` elements; the rest keep their default value.
impl<T: FromScript + Default, const N: usize> FromScript for [T; N] {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        state.expect_kind(index, ValueKind::Table)?;
        let table = state.abs_index(index);
        let len = state.raw_len(table).min(N);
        let mut out: [T; N] = std::array::from_fn(|_| T::default());
        for (n, slot) in out.iter_mut().take(len).enumerate() {
            *slot = read_element(state, table, n as i64 + 1)?;
        }
        Ok(out)
    }
}

// ============================================================================
// Sets
// ============================================================================

impl<T: ToScript, S> ToScript for HashSet<T, S> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let len = self.len();
        push_sequence(state, len, self)
    }
}

impl<T, S> FromScript for HashSet<T, S>
where
    T: FromScript + Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        read_sequence(
            state,
            index,
            |len| HashSet::with_capacity_and_hasher(len, S::default()),
            |set, item| {
                set.insert(item);
            },
        )
    }
}

impl<T: ToScript> ToScript for BTreeSet<T> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let len = self.len();
        push_sequence(state, len, self)
    }
}

impl<T: FromScript + Ord> FromScript for BTreeSet<T> {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        read_sequence(
            state,
            index,
            |_| BTreeSet::new(),
            |set, item| {
                set.insert(item);
            },
        )
    }
}

// ============================================================================
// Maps
// ============================================================================

impl<K: ToScript, V: ToScript, S> ToScript for HashMap<K, V, S> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let len = self.len();
        push_map(state, len, self)
    }
}

impl<K, V, S> FromScript for HashMap<K, V, S>
where
    K: FromScript + Eq + Hash,
    V: FromScript,
    S: BuildHasher + Default,
{
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        read_map(state, index, HashMap::with_hasher(S::default()), |map, key, value| {
            map.insert(key, value);
        })
    }
}

impl<K: ToScript, V: ToScript> ToScript for BTreeMap<K, V> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let len = self.len();
        push_map(state, len, self)
    }
}

impl<K, V> FromScript for BTreeMap<K, V>
where
    K: FromScript + Ord,
    V: FromScript,
{
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        read_map(state, index, BTreeMap::new(), |map, key, value| {
            map.insert(key, value);
        })
    }
}

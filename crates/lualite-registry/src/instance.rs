//! Instance lifecycle: the heap of exposed instances, wrapper construction
//! and the metamethods that route script access back to native code.
//!
//! An exposed instance is a script table (the wrapper) holding one closure
//! per method, with a metatable carrying:
//!
//! - `__index` / `__newindex`: property dispatch through the class's getter
//!   and setter maps, falling back to the configured unknown-key policy
//! - `__gc`: releases the heap slot when the wrapper is collected
//! - `__instance`: the instance address, for decoding the wrapper back
//!
//! Wrappers are cached per address in a weak-valued registry table, so the
//! same native object always surfaces as the same script value while any
//! reference to it is alive.

use std::any::{Any, TypeId, type_name};
use std::cell::{Ref, RefCell, RefMut};
use std::marker::PhantomData;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use lualite_core::{
    ConversionError, FromScript, LightUserData, NativeError, REGISTRY_INDEX, ScriptState,
    ToScript, ValueKind, check_arity, slot_mismatch, upvalue_index,
};

use crate::chain::Chain;
use crate::class::ClassDescriptor;
use crate::member::Receiver;
use crate::registry::Registry;

/// Registry key of the weak wrapper cache.
pub const INSTANCE_CACHE_KEY: &str = "lualite.instances";
/// Metatable key holding a wrapper's instance address.
pub const INSTANCE_KEY: &str = "__instance";

// ============================================================================
// Heap
// ============================================================================

pub struct InstanceSlot {
    pub(crate) cell: Rc<RefCell<dyn Any>>,
    pub(crate) class: Rc<ClassDescriptor>,
    pub(crate) owned: bool,
}

impl InstanceSlot {
    pub fn class(&self) -> &ClassDescriptor {
        &self.class
    }

    /// Whether the slot holds the only binding-side owner of the instance.
    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

/// Instances currently reachable from script code, keyed by address.
///
/// The address is the location of the instance's cell, so inserting the same
/// shared instance twice yields the same slot.
#[derive(Default)]
pub struct InstanceHeap {
    slots: FxHashMap<usize, InstanceSlot>,
}

impl InstanceHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address_of(cell: &Rc<RefCell<dyn Any>>) -> usize {
        Rc::as_ptr(cell) as *const () as usize
    }

    pub fn insert(
        &mut self,
        cell: Rc<RefCell<dyn Any>>,
        class: Rc<ClassDescriptor>,
        owned: bool,
    ) -> usize {
        let address = Self::address_of(&cell);
        self.slots
            .entry(address)
            .or_insert(InstanceSlot { cell, class, owned });
        address
    }

    pub fn get(&self, address: usize) -> Option<&InstanceSlot> {
        self.slots.get(&address)
    }

    pub fn remove(&mut self, address: usize) -> Option<InstanceSlot> {
        self.slots.remove(&address)
    }

    pub fn contains(&self, address: usize) -> bool {
        self.slots.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ============================================================================
// Encodable handles
// ============================================================================

/// A value handed to script code by ownership; freed when its wrapper is
/// collected.
pub struct Owned<T>(pub T);

/// A value shared between native and script code. Collecting the wrapper
/// drops only the binding's reference.
pub struct Shared<T>(pub Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> From<Rc<RefCell<T>>> for Shared<T> {
    fn from(cell: Rc<RefCell<T>>) -> Self {
        Self(cell)
    }
}

impl<T> std::ops::Deref for Shared<T> {
    type Target = Rc<RefCell<T>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn adopt<T: 'static>(
    state: &mut dyn ScriptState,
    cell: Rc<RefCell<dyn Any>>,
    owned: bool,
) -> Result<usize, NativeError> {
    let registry = Registry::from_state(state)?;
    let class = registry
        .class::<T>()
        .ok_or(NativeError::UnregisteredClass {
            type_name: type_name::<T>(),
        })?;
    let address = registry.adopt(cell, class, owned);
    push_wrapper(state, &registry, address)?;
    Ok(address)
}

impl<T: 'static> ToScript for Owned<T> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let cell: Rc<RefCell<dyn Any>> = Rc::new(RefCell::new(self.0));
        adopt::<T>(state, cell, true)?;
        Ok(1)
    }
}

impl<T: 'static> ToScript for Shared<T> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let cell: Rc<RefCell<dyn Any>> = self.0;
        adopt::<T>(state, cell, false)?;
        Ok(1)
    }
}

/// A decoded reference to an exposed instance, viewed as `T`.
///
/// `T` is either the wrapper's own class or any registered base of it.
pub struct Instance<T> {
    cell: Rc<RefCell<dyn Any>>,
    chain: Chain,
    class: Rc<ClassDescriptor>,
    address: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Instance<T> {
    pub fn address(&self) -> usize {
        self.address
    }

    pub fn class(&self) -> &ClassDescriptor {
        &self.class
    }

    pub fn borrow(&self) -> Result<Ref<'_, T>, NativeError> {
        let guard = self.cell.try_borrow().map_err(|_| self.borrowed())?;
        let chain = &self.chain;
        Ref::filter_map(guard, |object| {
            chain
                .apply(object)
                .and_then(|view| view.downcast_ref::<T>())
        })
        .map_err(|_| self.mismatch())
    }

    pub fn borrow_mut(&self) -> Result<RefMut<'_, T>, NativeError> {
        let guard = self.cell.try_borrow_mut().map_err(|_| self.borrowed())?;
        let chain = &self.chain;
        RefMut::filter_map(guard, |object| {
            chain
                .apply_mut(object)
                .and_then(|view| view.downcast_mut::<T>())
        })
        .map_err(|_| self.mismatch())
    }

    fn borrowed(&self) -> NativeError {
        NativeError::InstanceBorrowed {
            class: self.class.name().to_owned(),
        }
    }

    fn mismatch(&self) -> NativeError {
        ConversionError::ClassMismatch {
            expected: type_name::<T>().to_owned(),
            actual: self.class.name().to_owned(),
        }
        .into()
    }
}

impl<T> Clone for Instance<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            chain: self.chain.clone(),
            class: Rc::clone(&self.class),
            address: self.address,
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> FromScript for Instance<T> {
    fn from_script(state: &mut dyn ScriptState, index: i32) -> Result<Self, NativeError> {
        let address = wrapper_address(state, index)?;
        let registry = Registry::from_state(state)?;
        let (cell, class) = registry.resolve(address)?;
        let chain = match class.upcast_chain(TypeId::of::<T>()) {
            Some(chain) => chain,
            None => {
                return Err(ConversionError::ClassMismatch {
                    expected: type_name::<T>().to_owned(),
                    actual: class.name().to_owned(),
                }
                .into());
            }
        };
        Ok(Self {
            cell,
            chain,
            class,
            address,
            _marker: PhantomData,
        })
    }
}

impl<T: 'static> ToScript for Instance<T> {
    fn to_script(self, state: &mut dyn ScriptState) -> Result<usize, NativeError> {
        let registry = Registry::from_state(state)?;
        let address = registry.adopt(self.cell, self.class, false);
        push_wrapper(state, &registry, address)?;
        Ok(1)
    }
}

/// Address of the instance behind the wrapper (or raw address) at `index`.
pub fn wrapper_address(state: &mut dyn ScriptState, index: i32) -> Result<usize, NativeError> {
    match state.kind(index) {
        Some(ValueKind::LightUserData) => state
            .to_light_userdata(index)
            .map(|light| light.address())
            .ok_or(ConversionError::NotAnInstance.into()),
        Some(ValueKind::Table) => {
            if !state.get_metatable(index) {
                return Err(ConversionError::NotAnInstance.into());
            }
            state.raw_get_field(-1, INSTANCE_KEY);
            let light = state.to_light_userdata(-1);
            state.pop(2);
            match light {
                Some(light) => Ok(light.address()),
                None => Err(ConversionError::NotAnInstance.into()),
            }
        }
        _ => Err(slot_mismatch(state, index, "instance")),
    }
}

// ============================================================================
// Wrappers
// ============================================================================

/// Push the wrapper cache, creating it on first use. Returns its absolute
/// index.
fn push_cache(state: &mut dyn ScriptState) -> i32 {
    state.raw_get_field(REGISTRY_INDEX, INSTANCE_CACHE_KEY);
    if !state.is_table(-1) {
        state.pop(1);
        state.create_table(0, 0);
        state.create_table(0, 1);
        state.push_string("v");
        state.raw_set_field(-2, "__mode");
        state.set_metatable(-2);
        state.push_value(-1);
        state.raw_set_field(REGISTRY_INDEX, INSTANCE_CACHE_KEY);
    }
    state.abs_index(-1)
}

fn push_address(state: &mut dyn ScriptState, address: usize) {
    state.push_light_userdata(LightUserData::from_address(address));
}

/// Push the wrapper for the instance at `address`, reusing a live one.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn push_wrapper(
    state: &mut dyn ScriptState,
    registry: &Registry,
    address: usize,
) -> Result<(), NativeError> {
    let (_, class) = registry.resolve(address)?;
    let cache = push_cache(state);

    push_address(state, address);
    state.raw_get(cache);
    if state.is_table(-1) {
        state.remove(cache);
        return Ok(());
    }
    state.pop(1);

    state.create_table(0, class.methods().len());
    for method in class.methods() {
        push_address(state, address);
        state.push_closure(method.dispatch().clone(), 1);
        state.raw_set_field(-2, method.name());
    }

    state.create_table(0, 5);
    push_address(state, address);
    state.push_closure(registry.index_fn.clone(), 1);
    state.raw_set_field(-2, "__index");
    push_address(state, address);
    state.push_closure(registry.newindex_fn.clone(), 1);
    state.raw_set_field(-2, "__newindex");
    push_address(state, address);
    state.push_closure(registry.gc_fn.clone(), 1);
    state.raw_set_field(-2, "__gc");
    push_address(state, address);
    state.raw_set_field(-2, INSTANCE_KEY);
    state.push_string(class.name());
    state.raw_set_field(-2, "__name");
    state.set_metatable(-2);

    push_address(state, address);
    state.push_value(-2);
    state.raw_set(cache);
    state.remove(cache);

    log::trace!("wrapped {} instance at {:#x}", class.name(), address);
    Ok(())
}

// ============================================================================
// Metamethods
// ============================================================================

pub(crate) fn bound_address(state: &dyn ScriptState) -> Result<usize, NativeError> {
    state
        .to_light_userdata(upvalue_index(1))
        .map(|light| light.address())
        .ok_or(ConversionError::NotAnInstance.into())
}

/// Key argument of a property access, if it is a string.
fn property_key(state: &dyn ScriptState) -> Option<String> {
    match state.kind(2) {
        Some(ValueKind::String) => state.to_str(2),
        _ => None,
    }
}

/// `__index`: `(wrapper, key) -> value`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn dispatch_get(state: &mut dyn ScriptState) -> Result<usize, NativeError> {
    check_arity(state, 2)?;
    let address = bound_address(state)?;
    let registry = Registry::from_state(state)?;
    let (cell, class) = registry.resolve(address)?;
    let Some(key) = property_key(state) else {
        return Ok(0);
    };
    match class.getter(&key) {
        Some(accessor) => {
            let receiver = Receiver::new(&cell, accessor.chain(), class.name());
            accessor.thunk().call(state, &receiver)
        }
        None => {
            registry
                .config()
                .unknown_get
                .apply("read", class.name(), &key)?;
            Ok(0)
        }
    }
}

/// `__newindex`: `(wrapper, key, value)`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn dispatch_set(state: &mut dyn ScriptState) -> Result<usize, NativeError> {
    check_arity(state, 3)?;
    let address = bound_address(state)?;
    let registry = Registry::from_state(state)?;
    let (cell, class) = registry.resolve(address)?;
    let Some(key) = property_key(state) else {
        return Ok(0);
    };
    match class.setter(&key) {
        Some(accessor) => {
            let receiver = Receiver::new(&cell, accessor.chain(), class.name());
            accessor.thunk().call(state, &receiver)?;
            Ok(0)
        }
        None => {
            registry
                .config()
                .unknown_set
                .apply("write", class.name(), &key)?;
            Ok(0)
        }
    }
}

/// `__gc`: releases the heap slot. Owned instances are dropped with it.
pub(crate) fn finalize_instance(state: &mut dyn ScriptState) -> Result<usize, NativeError> {
    let address = bound_address(state)?;
    let registry = Registry::from_state(state)?;
    if let Some(slot) = registry.release(address) {
        log::trace!(
            "released {} {} instance at {:#x}",
            if slot.owned { "owned" } else { "shared" },
            slot.class.name(),
            address
        );
    }
    Ok(0)
}

/// Construct-style helper for native code: wrap `value` as an owned instance
/// and return a handle to it.
pub fn push_owned<T: 'static>(state: &mut dyn ScriptState, value: T) -> Result<Instance<T>, NativeError> {
    Owned(value).to_script(state)?;
    Instance::<T>::from_script(state, -1)
}

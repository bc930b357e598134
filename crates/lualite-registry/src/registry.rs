//! The per-state binding registry.
//!
//! One [`Registry`] lives in each state's application-data slot. It owns
//! the committed class descriptors, keyed by the native type they describe,
//! and the heap of instances currently exposed to script code.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use lualite_core::{BindConfig, NativeError, NativeFn, RegistrationError, ScriptState};

use crate::class::{ClassBuilder, ClassDescriptor};
use crate::instance::{InstanceHeap, InstanceSlot, dispatch_get, dispatch_set, finalize_instance};

pub struct Registry {
    config: BindConfig,
    classes: RefCell<FxHashMap<TypeId, Rc<ClassDescriptor>>>,
    instances: RefCell<InstanceHeap>,
    pub(crate) index_fn: NativeFn,
    pub(crate) newindex_fn: NativeFn,
    pub(crate) gc_fn: NativeFn,
}

impl Registry {
    pub fn new(config: BindConfig) -> Self {
        Self {
            config,
            classes: RefCell::new(FxHashMap::default()),
            instances: RefCell::new(InstanceHeap::new()),
            index_fn: NativeFn::new(dispatch_get),
            newindex_fn: NativeFn::new(dispatch_set),
            gc_fn: NativeFn::new(finalize_instance),
        }
    }

    /// Install a fresh registry into `state`, replacing any previous one.
    pub fn install(state: &mut dyn ScriptState, config: BindConfig) -> Rc<Registry> {
        let registry = Rc::new(Registry::new(config));
        let data: Rc<dyn Any> = registry.clone();
        state.set_app_data(data);
        log::debug!("installed binding registry");
        registry
    }

    /// The registry installed in `state`.
    pub fn from_state(state: &dyn ScriptState) -> Result<Rc<Registry>, NativeError> {
        state
            .app_data()
            .and_then(|data| data.downcast::<Registry>().ok())
            .ok_or(NativeError::NoRegistry)
    }

    /// The registry installed in `state`, installing a default one if absent.
    pub fn get_or_install(state: &mut dyn ScriptState) -> Rc<Registry> {
        match Self::from_state(state) {
            Ok(registry) => registry,
            Err(_) => Self::install(state, BindConfig::default()),
        }
    }

    #[inline]
    pub fn config(&self) -> &BindConfig {
        &self.config
    }

    /// Commit a class without exporting it into any scope.
    ///
    /// The class becomes available for encoding instances and as a base of
    /// later classes, but script code cannot construct it by name.
    pub fn register<C: 'static>(
        &self,
        class: ClassBuilder<C>,
    ) -> Result<Rc<ClassDescriptor>, RegistrationError> {
        let (descriptor, _) = class.commit(self)?;
        Ok(descriptor)
    }

    /// Descriptor for native type `C`, if registered.
    pub fn class<C: 'static>(&self) -> Option<Rc<ClassDescriptor>> {
        self.class_by_type_id(TypeId::of::<C>())
    }

    pub fn class_by_type_id(&self, type_id: TypeId) -> Option<Rc<ClassDescriptor>> {
        self.classes.borrow().get(&type_id).cloned()
    }

    /// Descriptor registered under `name`.
    pub fn class_by_name(&self, name: &str) -> Option<Rc<ClassDescriptor>> {
        self.classes
            .borrow()
            .values()
            .find(|class| class.name() == name)
            .cloned()
    }

    pub fn class_count(&self) -> usize {
        self.classes.borrow().len()
    }

    pub(crate) fn insert_class(&self, descriptor: ClassDescriptor) -> Rc<ClassDescriptor> {
        let descriptor = Rc::new(descriptor);
        let previous = self
            .classes
            .borrow_mut()
            .insert(descriptor.native_type_id(), Rc::clone(&descriptor));
        if let Some(previous) = previous {
            log::warn!(
                "class '{}' re-registered, replacing '{}'",
                descriptor.name(),
                previous.name()
            );
        }
        descriptor
    }

    /// Number of instances currently exposed to script code.
    pub fn instance_count(&self) -> usize {
        self.instances.borrow().len()
    }

    pub(crate) fn adopt(
        &self,
        cell: Rc<RefCell<dyn Any>>,
        class: Rc<ClassDescriptor>,
        owned: bool,
    ) -> usize {
        self.instances.borrow_mut().insert(cell, class, owned)
    }

    pub(crate) fn resolve(
        &self,
        address: usize,
    ) -> Result<(Rc<RefCell<dyn Any>>, Rc<ClassDescriptor>), NativeError> {
        self.instances
            .borrow()
            .get(address)
            .map(|slot| (Rc::clone(&slot.cell), Rc::clone(&slot.class)))
            .ok_or(NativeError::StaleInstance { address })
    }

    pub(crate) fn release(&self, address: usize) -> Option<InstanceSlot> {
        self.instances.borrow_mut().remove(address)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("classes", &self.class_count())
            .field("instances", &self.instance_count())
            .finish()
    }
}

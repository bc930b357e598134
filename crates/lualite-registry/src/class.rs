//! Class descriptors and the fluent builder that produces them.
//!
//! A [`ClassBuilder`] collects a class's constructors, methods, property
//! accessors, class-level functions and constants, plus the bases it
//! inherits from. Committing the builder into a [`Registry`] flattens the
//! bases' members into the class's own tables, extending each inherited
//! member's upcast chain by one step, so dispatch never walks the hierarchy.

use std::any::{TypeId, type_name};
use std::marker::PhantomData;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use lualite_core::{
    NativeFn, PropertyAccess, PropertyKind, RegistrationError, ScriptState, ToScript,
    TypeHash,
};

use crate::adapter::{
    IntoConstructor, IntoMethod, IntoNativeFn, METHOD_OFFSET, FREE_OFFSET, PROPERTY_OFFSET,
    vararg_fn, vararg_member,
};
use crate::chain::{AsBase, Chain, Upcast};
use crate::instance::bound_address;
use crate::member::{MemberFn, Receiver};
use crate::native_class::NativeClass;
use crate::registry::Registry;
use crate::scope::{ConstantValue, ScopeItems};

// ============================================================================
// Descriptor
// ============================================================================

/// A method as exposed on instances: the thunk, the chain from the
/// instance's class to the declaring class, and the ready-made dispatcher.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    name: String,
    chain: Chain,
    thunk: MemberFn,
    dispatch: NativeFn,
}

impl MethodEntry {
    fn new(name: String, chain: Chain, thunk: MemberFn) -> Self {
        let dispatch = method_dispatch(chain.clone(), thunk.clone());
        Self {
            name,
            chain,
            thunk,
            dispatch,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Native function bound to one instance through its first upvalue.
    pub fn dispatch(&self) -> &NativeFn {
        &self.dispatch
    }
}

fn method_dispatch(chain: Chain, thunk: MemberFn) -> NativeFn {
    NativeFn::new(move |state: &mut dyn ScriptState| {
        let address = bound_address(state)?;
        let registry = Registry::from_state(state)?;
        let (cell, class) = registry.resolve(address)?;
        let receiver = Receiver::new(&cell, &chain, class.name());
        thunk.call(state, &receiver)
    })
}

/// A property getter or setter.
#[derive(Debug, Clone)]
pub struct Accessor {
    chain: Chain,
    thunk: MemberFn,
    kind: PropertyKind,
}

impl Accessor {
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn thunk(&self) -> &MemberFn {
        &self.thunk
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    fn inherited(&self, step: Upcast) -> Self {
        Self {
            chain: self.chain.prepend(step),
            thunk: self.thunk.clone(),
            kind: self.kind,
        }
    }
}

/// A direct base of a class.
#[derive(Debug, Clone)]
pub struct BaseLink {
    class: Rc<ClassDescriptor>,
    step: Upcast,
}

impl BaseLink {
    pub fn class(&self) -> &Rc<ClassDescriptor> {
        &self.class
    }

    pub fn step(&self) -> Upcast {
        self.step
    }
}

/// Name, kind and access of one exposed property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    pub kind: PropertyKind,
    pub access: PropertyAccess,
}

/// A committed class.
#[derive(Debug)]
pub struct ClassDescriptor {
    name: String,
    hash: TypeHash,
    type_id: TypeId,
    type_name: &'static str,
    constructors: Vec<(String, NativeFn)>,
    methods: Vec<MethodEntry>,
    getters: FxHashMap<String, Accessor>,
    setters: FxHashMap<String, Accessor>,
    bases: Vec<BaseLink>,
}

impl ClassDescriptor {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    #[inline]
    pub fn native_type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn constructors(&self) -> &[(String, NativeFn)] {
        &self.constructors
    }

    /// Own and inherited methods, in installation order. A later entry with
    /// the same name overrides an earlier one.
    pub fn methods(&self) -> &[MethodEntry] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.iter().rev().find(|method| method.name == name)
    }

    pub fn getter(&self, name: &str) -> Option<&Accessor> {
        self.getters.get(name)
    }

    pub fn setter(&self, name: &str) -> Option<&Accessor> {
        self.setters.get(name)
    }

    pub fn bases(&self) -> &[BaseLink] {
        &self.bases
    }

    /// Readable properties with their kinds, sorted by name.
    pub fn getters_info(&self) -> Vec<(String, PropertyKind)> {
        sorted_info(&self.getters)
    }

    /// Writable properties with their kinds, sorted by name.
    pub fn setters_info(&self) -> Vec<(String, PropertyKind)> {
        sorted_info(&self.setters)
    }

    /// Every property with its access mode, sorted by name.
    pub fn properties_info(&self) -> Vec<PropertyInfo> {
        let mut properties: FxHashMap<&str, PropertyInfo> = FxHashMap::default();
        for (name, accessor) in &self.getters {
            properties.insert(
                name.as_str(),
                PropertyInfo {
                    name: name.clone(),
                    kind: accessor.kind,
                    access: PropertyAccess::READ,
                },
            );
        }
        for (name, accessor) in &self.setters {
            properties
                .entry(name.as_str())
                .and_modify(|info| info.access |= PropertyAccess::WRITE)
                .or_insert_with(|| PropertyInfo {
                    name: name.clone(),
                    kind: accessor.kind,
                    access: PropertyAccess::WRITE,
                });
        }
        let mut properties: Vec<_> = properties.into_values().collect();
        properties.sort_by(|a, b| a.name.cmp(&b.name));
        properties
    }

    /// Whether this class is, or derives from, the class named by `hash`.
    pub fn is_a(&self, hash: TypeHash) -> bool {
        self.hash == hash || self.bases.iter().any(|base| base.class.is_a(hash))
    }

    pub fn is_a_name(&self, name: &str) -> bool {
        self.is_a(TypeHash::from_name(name))
    }

    /// Upcast chain from this class to native type `target`, if `target` is
    /// this class or one of its bases.
    pub fn upcast_chain(&self, target: TypeId) -> Option<Chain> {
        if self.type_id == target {
            return Some(Chain::identity());
        }
        self.bases.iter().find_map(|base| {
            base.class
                .upcast_chain(target)
                .map(|rest| rest.prepend(base.step))
        })
    }
}

fn sorted_info(accessors: &FxHashMap<String, Accessor>) -> Vec<(String, PropertyKind)> {
    let mut info: Vec<_> = accessors
        .iter()
        .map(|(name, accessor)| (name.clone(), accessor.kind))
        .collect();
    info.sort_by(|a, b| a.0.cmp(&b.0));
    info
}

// ============================================================================
// Builder
// ============================================================================

struct PendingBase {
    type_id: TypeId,
    type_name: &'static str,
    step: Upcast,
}

struct PendingAccessor {
    name: String,
    thunk: MemberFn,
    kind: PropertyKind,
}

/// Fluent builder for a class bound to native type `C`.
///
/// # Example
///
/// ```ignore
/// ClassBuilder::<Counter>::new("Counter")
///     .default_constructor()
///     .method("increment", Counter::increment)
///     .property_rw("count", Counter::count, Counter::set_count)
/// ```
pub struct ClassBuilder<C: 'static> {
    name: String,
    items: ScopeItems,
    constructors: Vec<(Option<String>, NativeFn)>,
    methods: Vec<(String, MemberFn)>,
    getters: Vec<PendingAccessor>,
    setters: Vec<PendingAccessor>,
    bases: Vec<PendingBase>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: 'static> ClassBuilder<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: ScopeItems::default(),
            constructors: Vec::new(),
            methods: Vec::new(),
            getters: Vec::new(),
            setters: Vec::new(),
            bases: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constructor under the configured default name (`new` unless changed).
    pub fn constructor<F, Args>(mut self, f: F) -> Self
    where
        F: IntoConstructor<C, Args>,
    {
        self.constructors.push((None, f.into_constructor()));
        self
    }

    pub fn constructor_named<F, Args>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: IntoConstructor<C, Args>,
    {
        self.constructors
            .push((Some(name.into()), f.into_constructor()));
        self
    }

    /// Zero-argument constructor using `C::default`.
    pub fn default_constructor(self) -> Self
    where
        C: Default,
    {
        self.constructor(C::default)
    }

    /// Method called with the instance in the first slot (`obj:m(...)`).
    pub fn method<F, Args, R>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: IntoMethod<C, Args, R>,
    {
        self.methods
            .push((name.into(), f.into_member_fn(METHOD_OFFSET)));
        self
    }

    /// Method called without a self slot (`obj.m(...)`).
    pub fn method_fn<F, Args, R>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: IntoMethod<C, Args, R>,
    {
        self.methods
            .push((name.into(), f.into_member_fn(FREE_OFFSET)));
        self
    }

    /// Method that reads its own arguments from the frame.
    pub fn vararg_method<F, R>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut C, &mut dyn ScriptState) -> R + 'static,
        R: ToScript,
    {
        self.methods.push((name.into(), vararg_member(f)));
        self
    }

    /// Read-only property.
    pub fn property<G, GArgs, GR>(mut self, name: impl Into<String>, getter: G) -> Self
    where
        G: IntoMethod<C, GArgs, GR>,
    {
        self.getters.push(PendingAccessor {
            name: name.into(),
            thunk: getter.into_member_fn(PROPERTY_OFFSET),
            kind: G::KIND,
        });
        self
    }

    /// Read-write property.
    pub fn property_rw<G, GArgs, GR, S, SArgs, SR>(
        mut self,
        name: impl Into<String>,
        getter: G,
        setter: S,
    ) -> Self
    where
        G: IntoMethod<C, GArgs, GR>,
        S: IntoMethod<C, SArgs, SR>,
    {
        let name = name.into();
        self.setters.push(PendingAccessor {
            name: name.clone(),
            thunk: setter.into_member_fn(PROPERTY_OFFSET),
            kind: G::KIND,
        });
        self.property(name, getter)
    }

    /// Write-only property.
    pub fn setter<S, SArgs, SR>(mut self, name: impl Into<String>, setter: S) -> Self
    where
        S: IntoMethod<C, SArgs, SR>,
    {
        self.setters.push(PendingAccessor {
            name: name.into(),
            thunk: setter.into_member_fn(PROPERTY_OFFSET),
            kind: PropertyKind::Other,
        });
        self
    }

    /// Class-level function, exported on the class table.
    pub fn function<F, Args, R>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: IntoNativeFn<Args, R>,
    {
        self.items.functions.push((name.into(), f.into_native_fn()));
        self
    }

    pub fn vararg_function<F, R>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut dyn ScriptState) -> R + 'static,
        R: ToScript,
    {
        self.items.functions.push((name.into(), vararg_fn(f)));
        self
    }

    /// Class-level constant, exported on the class table.
    pub fn constant(mut self, name: impl Into<String>, value: impl Into<ConstantValue>) -> Self {
        self.items.constants.push((name.into(), value.into()));
        self
    }

    pub fn enum_value(self, name: impl Into<String>, value: i64) -> Self {
        self.constant(name, ConstantValue::Integer(value))
    }

    /// Inherit every member of `B`'s class. `B` must be committed before
    /// this class.
    pub fn inherits<B: 'static>(mut self) -> Self
    where
        C: AsBase<B>,
    {
        self.bases.push(PendingBase {
            type_id: TypeId::of::<B>(),
            type_name: type_name::<B>(),
            step: Upcast::of::<C, B>(),
        });
        self
    }

    /// Flatten bases and own members into a descriptor and record it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(crate) fn commit(
        self,
        registry: &Registry,
    ) -> Result<(Rc<ClassDescriptor>, ScopeItems), RegistrationError> {
        let mut methods = Vec::new();
        let mut getters = FxHashMap::default();
        let mut setters = FxHashMap::default();
        let mut bases = Vec::with_capacity(self.bases.len());

        for base in self.bases {
            let Some(class) = registry.class_by_type_id(base.type_id) else {
                return Err(RegistrationError::BaseNotRegistered {
                    class: self.name,
                    base: base.type_name,
                });
            };
            for method in &class.methods {
                methods.push(MethodEntry::new(
                    method.name.clone(),
                    method.chain.prepend(base.step),
                    method.thunk.clone(),
                ));
            }
            for (name, accessor) in &class.getters {
                getters.insert(name.clone(), accessor.inherited(base.step));
            }
            for (name, accessor) in &class.setters {
                setters.insert(name.clone(), accessor.inherited(base.step));
            }
            log::debug!("class '{}' inherits '{}'", self.name, class.name);
            bases.push(BaseLink {
                class,
                step: base.step,
            });
        }

        for (name, thunk) in self.methods {
            methods.push(MethodEntry::new(name, Chain::identity(), thunk));
        }
        for accessor in self.getters {
            getters.insert(accessor.name, own_accessor(accessor.thunk, accessor.kind));
        }
        for accessor in self.setters {
            setters.insert(accessor.name, own_accessor(accessor.thunk, accessor.kind));
        }

        let default_name = &registry.config().default_constructor;
        let constructors = self
            .constructors
            .into_iter()
            .map(|(name, function)| (name.unwrap_or_else(|| default_name.clone()), function))
            .collect();

        let descriptor = ClassDescriptor {
            hash: TypeHash::from_name(&self.name),
            name: self.name,
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            constructors,
            methods,
            getters,
            setters,
            bases,
        };
        Ok((registry.insert_class(descriptor), self.items))
    }
}

impl<C: NativeClass> ClassBuilder<C> {
    /// Builder pre-populated from `C`'s [`NativeClass`] impl.
    pub fn native() -> Self {
        C::register(Self::new(C::CLASS_NAME))
    }
}

fn own_accessor(thunk: MemberFn, kind: PropertyKind) -> Accessor {
    Accessor {
        chain: Chain::identity(),
        thunk,
        kind,
    }
}

//! Scope tree: nested namespaces, class tables and the module that
//! materializes them into a state.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: `ScopeNode` (constants, functions, optional class)
//! - Edges: `Contains(name)` from a scope to each named child

use std::rc::Rc;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use lualite_core::{
    BindConfig, NativeError, NativeFn, RegistrationError, ScriptState, ToScript, ValueKind,
};

use crate::adapter::{IntoNativeFn, vararg_fn};
use crate::class::{ClassBuilder, ClassDescriptor};
use crate::registry::Registry;

// ============================================================================
// Entries
// ============================================================================

/// A constant or enum value exported into a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

impl ConstantValue {
    pub fn push(&self, state: &mut dyn ScriptState) {
        match self {
            ConstantValue::Boolean(value) => state.push_boolean(*value),
            ConstantValue::Integer(value) => state.push_integer(*value),
            ConstantValue::Number(value) => state.push_number(*value),
            ConstantValue::String(value) => state.push_string(value),
        }
    }
}

macro_rules! impl_constant_from {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for ConstantValue {
                fn from(value: $ty) -> Self {
                    ConstantValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_constant_from!(Boolean: bool);
impl_constant_from!(Integer: i8, i16, i32, i64, u8, u16, u32);
impl_constant_from!(Number: f32, f64);
impl_constant_from!(String: &str, String);

/// Constants and functions destined for one scope table.
#[derive(Debug, Default, Clone)]
pub struct ScopeItems {
    pub constants: Vec<(String, ConstantValue)>,
    pub functions: Vec<(String, NativeFn)>,
}

impl ScopeItems {
    fn is_empty(&self) -> bool {
        self.constants.is_empty() && self.functions.is_empty()
    }

    /// Write every entry into the table at `table`, or into globals when
    /// `table` is `None`.
    fn write(&self, state: &mut dyn ScriptState, table: Option<i32>) {
        for (name, value) in &self.constants {
            value.push(state);
            store(state, table, name);
        }
        for (name, function) in &self.functions {
            state.push_closure(function.clone(), 0);
            store(state, table, name);
        }
    }
}

fn store(state: &mut dyn ScriptState, table: Option<i32>, name: &str) {
    match table {
        Some(table) => state.raw_set_field(table, name),
        None => state.set_global(name),
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Type-erased class waiting to be committed.
trait PendingClass {
    fn name(&self) -> &str;

    fn commit(
        self: Box<Self>,
        registry: &Registry,
    ) -> Result<(Rc<ClassDescriptor>, ScopeItems), RegistrationError>;
}

impl<C: 'static> PendingClass for ClassBuilder<C> {
    fn name(&self) -> &str {
        ClassBuilder::name(self)
    }

    fn commit(
        self: Box<Self>,
        registry: &Registry,
    ) -> Result<(Rc<ClassDescriptor>, ScopeItems), RegistrationError> {
        ClassBuilder::commit(*self, registry)
    }
}

enum ScopeChild {
    Scope(Scope),
    Class(Box<dyn PendingClass>),
}

/// A named scope under construction.
pub struct Scope {
    name: String,
    items: ScopeItems,
    children: Vec<ScopeChild>,
}

macro_rules! scope_builder_methods {
    () => {
        pub fn constant(
            mut self,
            name: impl Into<String>,
            value: impl Into<ConstantValue>,
        ) -> Self {
            self.items.constants.push((name.into(), value.into()));
            self
        }

        pub fn enum_value(self, name: impl Into<String>, value: i64) -> Self {
            self.constant(name, ConstantValue::Integer(value))
        }

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

        /// Nested scope.
        pub fn scope(mut self, scope: Scope) -> Self {
            self.children.push(ScopeChild::Scope(scope));
            self
        }

        /// Class exported as a nested table named after the class.
        pub fn class<C: 'static>(mut self, class: ClassBuilder<C>) -> Self {
            self.children.push(ScopeChild::Class(Box::new(class)));
            self
        }
    };
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: ScopeItems::default(),
            children: Vec::new(),
        }
    }

    scope_builder_methods!();
}

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeEdge {
    /// Parent scope contains the named child.
    Contains(String),
}

#[derive(Debug, Default)]
pub struct ScopeNode {
    pub items: ScopeItems,
    pub class: Option<Rc<ClassDescriptor>>,
    needs_creation: bool,
}

/// Committed scope hierarchy, ready to be written into a state.
#[derive(Debug)]
pub struct ScopeTree {
    graph: DiGraph<ScopeNode, ScopeEdge>,
    root: NodeIndex,
    root_name: Option<String>,
}

impl ScopeTree {
    /// Tree whose root writes into globals (`None`) or into a global table.
    pub fn new(root_name: Option<String>) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(ScopeNode {
            needs_creation: root_name.is_some(),
            ..ScopeNode::default()
        });
        Self {
            graph,
            root,
            root_name,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, node: NodeIndex) -> &ScopeNode {
        &self.graph[node]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn add_child(&mut self, parent: NodeIndex, name: impl Into<String>) -> NodeIndex {
        let child = self.graph.add_node(ScopeNode {
            needs_creation: true,
            ..ScopeNode::default()
        });
        self.graph
            .add_edge(parent, child, ScopeEdge::Contains(name.into()));
        child
    }

    pub fn find_parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|edge| matches!(edge.weight(), ScopeEdge::Contains(_)))
            .map(|edge| edge.source())
    }

    /// Simple name of a node; the root's is the module name, if any.
    pub fn scope_name(&self, node: NodeIndex) -> Option<&str> {
        if node == self.root {
            return self.root_name.as_deref();
        }
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find_map(|edge| match edge.weight() {
                ScopeEdge::Contains(name) => Some(name.as_str()),
            })
    }

    /// Children in registration order.
    pub fn children(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Names from the outermost named scope down to `node`.
    pub fn scope_path(&self, node: NodeIndex) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(node);
        while let Some(node) = current {
            if let Some(name) = self.scope_name(node) {
                path.push(name.to_owned());
            }
            current = self.find_parent(node);
        }
        path.reverse();
        path
    }

    pub fn qualified_name(&self, node: NodeIndex) -> String {
        self.scope_path(node).join(".")
    }

    /// Commit `scope`'s classes in registration order and record it under
    /// `parent`.
    fn insert_scope(
        &mut self,
        parent: NodeIndex,
        items: ScopeItems,
        children: Vec<ScopeChild>,
        registry: &Registry,
    ) -> Result<(), RegistrationError> {
        self.graph[parent].items = items;
        for child in children {
            match child {
                ScopeChild::Scope(scope) => {
                    let node = self.add_child(parent, scope.name);
                    self.insert_scope(node, scope.items, scope.children, registry)?;
                }
                ScopeChild::Class(class) => {
                    let name = class.name().to_owned();
                    let (descriptor, items) = class.commit(registry)?;
                    let node = self.add_child(parent, name);
                    let node_data = &mut self.graph[node];
                    node_data.items = items;
                    node_data.class = Some(descriptor);
                }
            }
        }
        Ok(())
    }

    /// Push the table for `node`, creating it (and any missing ancestors)
    /// on first visit. Returns `false` when `node` is the unnamed root,
    /// whose entries go to globals.
    pub fn push_scope_table(
        &mut self,
        node: NodeIndex,
        state: &mut dyn ScriptState,
        config: &BindConfig,
    ) -> Result<bool, RegistrationError> {
        let Some(name) = self.scope_name(node).map(str::to_owned) else {
            return Ok(false);
        };
        let parent_pushed = match self.find_parent(node) {
            Some(parent) => self.push_scope_table(parent, state, config)?,
            None => false,
        };

        if self.graph[node].needs_creation {
            self.graph[node].needs_creation = false;
            self.get_in_parent(state, parent_pushed, &name);
            match state.kind(-1) {
                Some(ValueKind::Table) => state.pop(1),
                Some(ValueKind::Nil) | None => {
                    state.pop(1);
                    state.create_table(0, config.table_hint);
                    if parent_pushed {
                        state.raw_set_field(-2, &name);
                    } else {
                        state.set_global(&name);
                    }
                    log::debug!("created scope table '{}'", self.qualified_name(node));
                }
                Some(_) => {
                    let kind = state.type_name(-1);
                    state.pop(if parent_pushed { 2 } else { 1 });
                    return Err(RegistrationError::ScopeNotTable {
                        path: self.qualified_name(node),
                        kind,
                    });
                }
            }
        }

        self.get_in_parent(state, parent_pushed, &name);
        if parent_pushed {
            state.remove(-2);
        }
        if !state.is_table(-1) {
            let kind = state.type_name(-1);
            state.pop(1);
            return Err(RegistrationError::ScopeNotTable {
                path: self.qualified_name(node),
                kind,
            });
        }
        Ok(true)
    }

    fn get_in_parent(&self, state: &mut dyn ScriptState, parent_pushed: bool, name: &str) {
        if parent_pushed {
            state.raw_get_field(-1, name);
        } else {
            state.get_global(name);
        }
    }

    /// Write every scope, top-down, into `state`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn materialize(
        &mut self,
        state: &mut dyn ScriptState,
        config: &BindConfig,
    ) -> Result<(), RegistrationError> {
        let root = self.root;
        self.materialize_node(root, state, config)
    }

    fn materialize_node(
        &mut self,
        node: NodeIndex,
        state: &mut dyn ScriptState,
        config: &BindConfig,
    ) -> Result<(), RegistrationError> {
        let pushed = self.push_scope_table(node, state, config)?;
        let table = pushed.then(|| state.abs_index(-1));

        let data = &self.graph[node];
        data.items.write(state, table);
        if let (Some(class), Some(table)) = (&data.class, table) {
            for (name, constructor) in class.constructors() {
                state.push_closure(constructor.clone(), 0);
                state.raw_set_field(table, name);
            }
            push_class_metatable(state, class.name(), &config.class_name_key);
            state.set_metatable(table);
        }
        if pushed {
            state.pop(1);
        }
        if !data.items.is_empty() || data.class.is_some() {
            log::debug!("materialized scope '{}'", self.qualified_name(node));
        }

        for child in self.children(node) {
            self.materialize_node(child, state, config)?;
        }
        Ok(())
    }
}

/// Metatable for a class table: the class name is served through `__index`
/// and `__newindex` refuses to shadow it.
fn push_class_metatable(state: &mut dyn ScriptState, class: &str, name_key: &str) {
    state.create_table(0, 2);
    state.create_table(0, 1);
    state.push_string(class);
    state.raw_set_field(-2, name_key);
    state.raw_set_field(-2, "__index");

    let class = class.to_owned();
    let name_key = name_key.to_owned();
    state.push_closure(
        NativeFn::new(move |state: &mut dyn ScriptState| {
            if state.kind(2) == Some(ValueKind::String)
                && state.to_str(2).as_deref() == Some(name_key.as_str())
            {
                return Err(NativeError::ReadOnlyField {
                    class: class.clone(),
                    key: name_key.clone(),
                });
            }
            state.set_top(3);
            state.raw_set(1);
            Ok(0)
        }),
        0,
    );
    state.raw_set_field(-2, "__newindex");
}

// ============================================================================
// Module
// ============================================================================

/// Entry point for exporting bindings into a state.
///
/// A module without a name writes its direct entries as globals; a named
/// module writes them into a global table of that name. Nested scopes and
/// classes become nested tables either way.
pub struct Module<'s> {
    state: &'s mut dyn ScriptState,
    name: Option<String>,
    items: ScopeItems,
    children: Vec<ScopeChild>,
}

impl<'s> Module<'s> {
    pub fn new(state: &'s mut dyn ScriptState) -> Self {
        Self {
            state,
            name: None,
            items: ScopeItems::default(),
            children: Vec::new(),
        }
    }

    pub fn named(state: &'s mut dyn ScriptState, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(state)
        }
    }

    scope_builder_methods!();

    /// Commit every class, then materialize all scopes into the state.
    ///
    /// Classes commit depth-first in registration order, so a base must be
    /// registered (here or earlier) before any class inheriting it.
    pub fn build(self) -> Result<ScopeTree, RegistrationError> {
        let registry = Registry::get_or_install(self.state);
        let mut tree = ScopeTree::new(self.name);
        let root = tree.root();
        tree.insert_scope(root, self.items, self.children, &registry)?;
        tree.materialize(self.state, registry.config())?;
        log::debug!(
            "module built: {} scopes, {} classes registered",
            tree.node_count(),
            registry.class_count()
        );
        Ok(tree)
    }
}

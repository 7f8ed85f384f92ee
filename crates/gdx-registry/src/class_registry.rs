//! Class registry: every class known to the bridge and how they relate.
//!
//! Engine classes are recorded by generated code at startup; extension
//! classes are added by the registrar when they are registered with the
//! engine. Each class has a descriptor holding its methods, properties,
//! optional factory and virtual dispatch table.

use std::any::Any;
use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use gdx_sys as sys;
use gdx_sys::{MethodFlags, VariantType};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::RegistryError;

/// Wraps a raw engine object as the host wrapper of a concrete class.
pub type FactoryFn = fn(sys::ObjectPtr) -> Box<dyn Any>;

/// Host-side implementation of a virtual method.
///
/// Reads arguments from the engine-supplied pointer array and writes the
/// return value into `ret`.
pub type VirtualFn =
    unsafe fn(instance: sys::ClassInstancePtr, args: *const sys::ConstTypePtr, ret: sys::TypePtr);

// ============================================================================
// Descriptors
// ============================================================================

/// Type of an argument, return value or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgInfo {
    pub name: &'static str,
    /// `Nil` stands for "any variant".
    pub kind: VariantType,
    /// Set for object-typed values.
    pub class_name: Option<&'static str>,
}

impl ArgInfo {
    pub const fn new(name: &'static str, kind: VariantType) -> Self {
        Self {
            name,
            kind,
            class_name: None,
        }
    }

    pub const fn object(name: &'static str, class_name: &'static str) -> Self {
        Self {
            name,
            kind: VariantType::Object,
            class_name: Some(class_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub args: Vec<ArgInfo>,
    pub ret: Option<ArgInfo>,
    pub flags: MethodFlags,
    /// Manifest hash; absent for virtual and host-defined methods.
    pub hash: Option<i64>,
}

impl MethodDescriptor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
            ret: None,
            flags: MethodFlags::DEFAULT,
            hash: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = ArgInfo>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn with_return(mut self, ret: ArgInfo) -> Self {
        self.ret = Some(ret);
        self
    }

    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_hash(mut self, hash: i64) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn is_vararg(&self) -> bool {
        self.flags.contains(MethodFlags::VARARG)
    }

    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodFlags::VIRTUAL)
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub getter: &'static str,
    pub setter: Option<&'static str>,
    pub kind: VariantType,
    pub class_name: Option<&'static str>,
}

impl PropertyDescriptor {
    pub fn new(name: &'static str, kind: VariantType, getter: &'static str) -> Self {
        Self {
            name,
            getter,
            setter: None,
            kind,
            class_name: None,
        }
    }

    pub fn with_setter(mut self, setter: &'static str) -> Self {
        self.setter = Some(setter);
        self
    }
}

/// Name-keyed virtual dispatch table of one class.
#[derive(Debug, Clone, Default)]
pub struct VirtualTable {
    entries: FxHashMap<&'static str, VirtualFn>,
}

impl VirtualTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'static str, callable: VirtualFn) -> Option<VirtualFn> {
        self.entries.insert(name, callable)
    }

    pub fn get(&self, name: &str) -> Option<VirtualFn> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

/// Where a class is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassApi {
    Engine,
    Extension,
}

/// Everything the bridge records about one class.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub methods: Vec<MethodDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    pub is_refcounted: bool,
    pub is_instantiable: bool,
    pub factory: Option<FactoryFn>,
    pub virtuals: VirtualTable,
    pub api: ClassApi,
}

impl ClassDescriptor {
    /// Descriptor for a class implemented by the engine.
    pub fn engine(name: &'static str) -> Self {
        Self {
            name,
            parent: None,
            methods: Vec::new(),
            properties: Vec::new(),
            is_refcounted: false,
            is_instantiable: false,
            factory: None,
            virtuals: VirtualTable::new(),
            api: ClassApi::Engine,
        }
    }

    /// Descriptor for a class implemented by the host.
    pub fn extension(name: &'static str, parent: &'static str) -> Self {
        Self {
            parent: Some(parent),
            is_instantiable: true,
            api: ClassApi::Extension,
            ..Self::engine(name)
        }
    }

    pub fn with_parent(mut self, parent: &'static str) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn refcounted(mut self, is_refcounted: bool) -> Self {
        self.is_refcounted = is_refcounted;
        self
    }

    pub fn instantiable(mut self, is_instantiable: bool) -> Self {
        self.is_instantiable = is_instantiable;
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_factory(mut self, factory: FactoryFn) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_virtuals(mut self, virtuals: VirtualTable) -> Self {
        self.virtuals = virtuals;
        self
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Single-rooted tree of class descriptors.
///
/// Edges point from a class to its parent.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    graph: StableDiGraph<ClassDescriptor, ()>,
    by_name: FxHashMap<&'static str, NodeIndex>,
    root: Option<NodeIndex>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a class. Its parent must already be registered; only one class
    /// may be parentless.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> Result<(), RegistryError> {
        let name = descriptor.name;
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateClass(name.to_string()));
        }

        let parent = match descriptor.parent {
            Some(parent) => Some(*self.by_name.get(parent).ok_or_else(|| {
                RegistryError::UnknownParent {
                    class: name.to_string(),
                    parent: parent.to_string(),
                }
            })?),
            None => {
                if let Some(root) = self.root {
                    return Err(RegistryError::MultipleRoots {
                        class: name.to_string(),
                        root: self.graph[root].name.to_string(),
                    });
                }
                None
            }
        };

        let node = self.graph.add_node(descriptor);
        match parent {
            Some(parent) => {
                self.graph.add_edge(node, parent, ());
            }
            None => self.root = Some(node),
        }
        self.by_name.insert(name, node);
        debug!(class = name, "class registered");
        Ok(())
    }

    /// Remove a class without subclasses.
    pub fn unregister(&mut self, name: &str) -> Result<ClassDescriptor, RegistryError> {
        let node = self.node(name)?;
        let subclasses = self.subclasses(name);
        if !subclasses.is_empty() {
            return Err(RegistryError::HasSubclasses {
                class: name.to_string(),
                subclasses: subclasses.into_iter().map(str::to_string).collect(),
            });
        }

        self.by_name.remove(name);
        if self.root == Some(node) {
            self.root = None;
        }
        self.graph
            .remove_node(node)
            .ok_or_else(|| RegistryError::UnknownClass(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.by_name.get(name).map(|&node| &self.graph[node])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClassDescriptor> {
        let node = *self.by_name.get(name)?;
        self.graph.node_weight_mut(node)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn root(&self) -> Option<&ClassDescriptor> {
        self.root.map(|node| &self.graph[node])
    }

    pub fn parent(&self, name: &str) -> Option<&ClassDescriptor> {
        let node = *self.by_name.get(name)?;
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .next()
            .map(|parent| &self.graph[parent])
    }

    /// `name` followed by each ancestor up to the root.
    pub fn parent_chain(&self, name: &str) -> Vec<&'static str> {
        let mut chain = Vec::new();
        let mut current = self.by_name.get(name).copied();
        while let Some(node) = current {
            chain.push(self.graph[node].name);
            current = self.graph.neighbors_directed(node, Direction::Outgoing).next();
        }
        chain
    }

    /// Direct subclasses, sorted by name.
    pub fn subclasses(&self, name: &str) -> Vec<&'static str> {
        let Some(&node) = self.by_name.get(name) else {
            return Vec::new();
        };
        let mut children: Vec<_> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|child| self.graph[child].name)
            .collect();
        children.sort_unstable();
        children
    }

    /// Whether `class` is `ancestor` or derives from it.
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        self.parent_chain(class).contains(&ancestor)
    }

    /// Nearest factory along the parent chain of `name`.
    pub fn nearest_factory(&self, name: &str) -> Option<(&'static str, FactoryFn)> {
        self.parent_chain(name).into_iter().find_map(|class| {
            self.get(class)
                .and_then(|descriptor| descriptor.factory.map(|factory| (class, factory)))
        })
    }

    /// Virtual implementation for `method` declared on `class` or an ancestor.
    pub fn find_virtual(&self, class: &str, method: &str) -> Option<VirtualFn> {
        self.parent_chain(class)
            .into_iter()
            .find_map(|name| self.get(name).and_then(|d| d.virtuals.get(method)))
    }

    /// Check the hierarchy is a single tree.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if petgraph::algo::is_cyclic_directed(&self.graph) {
            let name = self
                .graph
                .node_indices()
                .next()
                .map(|node| self.graph[node].name)
                .unwrap_or_default();
            return Err(RegistryError::Cycle(name.to_string()));
        }

        let Some(root) = self.root else {
            return match self.graph.node_indices().next() {
                Some(node) => Err(RegistryError::UnknownParent {
                    class: self.graph[node].name.to_string(),
                    parent: self.graph[node].parent.unwrap_or_default().to_string(),
                }),
                None => Ok(()),
            };
        };
        let root_name = self.graph[root].name;
        for node in self.graph.node_indices() {
            let name = self.graph[node].name;
            if self.parent_chain(name).last() != Some(&root_name) {
                return Err(RegistryError::MultipleRoots {
                    class: name.to_string(),
                    root: root_name.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.graph.node_indices().map(move |node| &self.graph[node])
    }

    fn node(&self, name: &str) -> Result<NodeIndex, RegistryError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownClass(name.to_string()))
    }
}

// ============================================================================
// Global instance
// ============================================================================

static CLASSES: OnceLock<RwLock<ClassRegistry>> = OnceLock::new();

fn global() -> &'static RwLock<ClassRegistry> {
    CLASSES.get_or_init(|| RwLock::new(ClassRegistry::new()))
}

/// Shared access to the process-wide registry.
pub fn classes() -> RwLockReadGuard<'static, ClassRegistry> {
    global().read().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive access; only taken while classes are being registered.
pub fn classes_mut() -> RwLockWriteGuard<'static, ClassRegistry> {
    global().write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.register(ClassDescriptor::engine("Object")).unwrap();
        registry
            .register(ClassDescriptor::engine("RefCounted").with_parent("Object").refcounted(true))
            .unwrap();
        let resource = ClassDescriptor::engine("Resource").with_parent("RefCounted");
        registry.register(resource.refcounted(true)).unwrap();
        registry
            .register(ClassDescriptor::engine("Node").with_parent("Object"))
            .unwrap();
        registry
    }

    fn boxed_unit(_: sys::ObjectPtr) -> Box<dyn Any> {
        Box::new(())
    }

    unsafe fn noop_virtual(
        _: sys::ClassInstancePtr,
        _: *const sys::ConstTypePtr,
        _: sys::TypePtr,
    ) {
    }

    #[test]
    fn parent_chain_reaches_root() {
        let registry = hierarchy();
        assert_eq!(
            registry.parent_chain("Resource"),
            vec!["Resource", "RefCounted", "Object"]
        );
        assert_eq!(registry.parent("Node").unwrap().name, "Object");
        assert!(registry.parent("Object").is_none());
        assert_eq!(registry.root().unwrap().name, "Object");
        registry.validate().unwrap();
    }

    #[test]
    fn subclass_queries() {
        let registry = hierarchy();
        assert_eq!(registry.subclasses("Object"), vec!["Node", "RefCounted"]);
        assert!(registry.is_subclass_of("Resource", "Object"));
        assert!(registry.is_subclass_of("Node", "Node"));
        assert!(!registry.is_subclass_of("Node", "RefCounted"));
    }

    #[test]
    fn duplicate_and_orphan_classes_are_rejected() {
        let mut registry = hierarchy();
        assert_eq!(
            registry.register(ClassDescriptor::engine("Node").with_parent("Object")),
            Err(RegistryError::DuplicateClass("Node".into()))
        );
        assert!(matches!(
            registry.register(ClassDescriptor::engine("Sprite").with_parent("Node2D")),
            Err(RegistryError::UnknownParent { .. })
        ));
        assert!(matches!(
            registry.register(ClassDescriptor::engine("Other")),
            Err(RegistryError::MultipleRoots { .. })
        ));
    }

    #[test]
    fn unregister_leaf_only() {
        let mut registry = hierarchy();
        registry
            .register(ClassDescriptor::extension("Player", "Node"))
            .unwrap();

        assert!(matches!(
            registry.unregister("Node"),
            Err(RegistryError::HasSubclasses { .. })
        ));
        let removed = registry.unregister("Player").unwrap();
        assert_eq!(removed.api, ClassApi::Extension);
        assert!(!registry.contains("Player"));
        assert!(registry.subclasses("Node").is_empty());
    }

    #[test]
    fn factories_and_virtuals_resolve_through_ancestors() {
        let mut registry = ClassRegistry::new();
        registry
            .register(ClassDescriptor::engine("Object").with_factory(boxed_unit))
            .unwrap();
        let mut virtuals = VirtualTable::new();
        virtuals.insert("_ready", noop_virtual);
        registry
            .register(
                ClassDescriptor::extension("Player", "Object").with_virtuals(virtuals),
            )
            .unwrap();

        let (class, _) = registry.nearest_factory("Player").unwrap();
        assert_eq!(class, "Object");
        assert!(registry.find_virtual("Player", "_ready").is_some());
        assert!(registry.find_virtual("Player", "_process").is_none());
        assert!(registry.find_virtual("Object", "_ready").is_none());
    }

    #[test]
    fn descriptors_keep_declaration_order() {
        let descriptor = ClassDescriptor::engine("Animation")
            .with_method(
                MethodDescriptor::new("add_track")
                    .with_args([
                        ArgInfo::new("type", VariantType::Int),
                        ArgInfo::new("at_position", VariantType::Int),
                    ])
                    .with_return(ArgInfo::new("", VariantType::Int))
                    .with_hash(42),
            )
            .with_method(MethodDescriptor::new("get_track_count").with_flags(MethodFlags::CONST))
            .with_property(
                PropertyDescriptor::new("length", VariantType::Float, "get_length")
                    .with_setter("set_length"),
            );

        let names: Vec<_> = descriptor.methods.iter().map(|m| m.name).collect();
        assert_eq!(names, ["add_track", "get_track_count"]);
        assert_eq!(descriptor.method("add_track").unwrap().arg_count(), 2);
        assert!(!descriptor.method("add_track").unwrap().is_vararg());
        assert_eq!(descriptor.property("length").unwrap().setter, Some("set_length"));
    }
}

//! Process-global lookup tables for the gdx bridge.
//!
//! Two registries live here:
//!
//! - [`MethodBindCache`]: resolves `(class, method, hash)` triples, utility
//!   functions, builtin methods and variant constructors to engine function
//!   pointers once at startup. After [`install_cache`] it is immutable and
//!   lookups take no locks.
//! - [`ClassRegistry`]: the host-side record of every wrapped class, its
//!   parent link, subclasses, properties, factory and virtual dispatch table.
//!   The class hierarchy is kept in a `petgraph` graph.
//!
//! # Example
//!
//! ```ignore
//! use gdx_registry::{ClassDescriptor, ClassRegistry};
//!
//! let mut registry = ClassRegistry::new();
//! registry.register(ClassDescriptor::engine("Object"))?;
//! registry.register(ClassDescriptor::engine("Node").with_parent("Object"))?;
//!
//! assert!(registry.is_subclass_of("Node", "Object"));
//! ```

mod bind_cache;
mod class_registry;
mod error;

pub use bind_cache::{
    BindTables, BuiltinMethodFn, BuiltinMethodKey, ConstructorFn, DestructorFn, EngineResolver,
    FromTypeFn, MethodBind, MethodBindCache, MethodKey, MismatchPolicy, SymbolResolver, ToTypeFn,
    UtilityFn, UtilityKey, cache, install_cache, try_cache,
};
pub use class_registry::{
    ArgInfo, ClassApi, ClassDescriptor, ClassRegistry, FactoryFn, MethodDescriptor,
    PropertyDescriptor, VirtualFn, VirtualTable, classes, classes_mut,
};
pub use error::{BindError, RegistryError};

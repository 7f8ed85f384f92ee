//! Host classes: Rust types registered with the engine as new classes.
//!
//! A host class is a Rust struct holding a [`Base`] field for the engine
//! object it extends. Registering it tells the engine how to create and free
//! instances, which methods and properties it has, and which engine virtuals
//! it overrides:
//!
//! ```ignore
//! #[derive(HostClass)]
//! #[class(base = Node, init, register = Self::register_methods, overrides(ready))]
//! struct Counter {
//!     base: Base<Node>,
//!     #[var]
//!     count: i64,
//! }
//!
//! impl Counter {
//!     fn register_methods(builder: &mut ClassBuilder<Self>) {
//!         builder.method("bump", |this: &mut Counter, by: i64| this.count += by);
//!     }
//! }
//!
//! impl INode for Counter {
//!     fn ready(&mut self) {
//!         self.count = 1;
//!     }
//! }
//! ```
//!
//! The engine owns every instance: it calls the create callback when the
//! class is instantiated and the free callback when the object is
//! destroyed. [`Instance`] is the handle Rust code uses to reach the host
//! object behind an engine object.

mod builder;
mod callbacks;
mod instance;

use std::sync::{Mutex, PoisonError};

use gdx_registry::{ClassDescriptor, MethodDescriptor, RegistryError};
use gdx_sys::{ClassMethodInfo, Int, InitializationLevel, PropertyInfo, PropertyUsageFlags};
use thiserror::Error;
use tracing::{debug, info};

use crate::builtin::StringName;
use crate::obj::{ClassIdentity, EngineClass};

pub use builder::{ArgSpec, ClassBuilder, DynamicProperty, HostMethod};
#[doc(hidden)]
pub use instance::InstanceStorage;
pub use instance::{Base, Instance, with_instance};

use builder::{ConstantEntry, Hooks, MethodEntry, PropertyEntry};
pub(crate) use callbacks::guarded;

/// A Rust type registered as an engine class.
///
/// Usually derived with `#[derive(HostClass)]`.
pub trait HostClass: Sized + 'static {
    /// Engine class the host class extends.
    type Base: EngineClass;

    /// Name the class is registered under.
    const CLASS_NAME: &'static str;

    /// Build the host object for a freshly constructed engine object.
    fn init(base: Base<Self::Base>) -> Self;

    /// Declare methods, properties, constants, virtual overrides and hooks.
    fn register(builder: &mut ClassBuilder<Self>);
}

/// Hand-written constructor for host classes that derive `HostClass`
/// without `#[class(init)]`.
pub trait HostInit: HostClass {
    fn init(base: Base<Self::Base>) -> Self;
}

/// Failure to register or unregister a host class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrarError {
    #[error("engine rejected {operation} for `{class}` with error {code}")]
    Engine {
        class: String,
        operation: &'static str,
        code: i64,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("class `{0}` was not registered by this library")]
    NotRegistered(String),
}

/// Everything the callbacks of one registered class need. Leaked on
/// registration: engine objects may outlive the class registration.
pub(crate) struct ClassRuntime<T: HostClass> {
    pub(crate) methods: Vec<MethodEntry<T>>,
    pub(crate) hooks: Hooks<T>,
}

// ============================================================================
// Registration bookkeeping
// ============================================================================

struct Registered {
    class: &'static str,
    level: Option<InitializationLevel>,
}

static REGISTERED: Mutex<Vec<Registered>> = Mutex::new(Vec::new());
static CURRENT_LEVEL: Mutex<Option<InitializationLevel>> = Mutex::new(None);

/// Record the level being initialized; classes registered meanwhile are
/// unregistered when that level is deinitialized.
pub(crate) fn set_current_level(level: Option<InitializationLevel>) {
    *CURRENT_LEVEL.lock().unwrap_or_else(PoisonError::into_inner) = level;
}

/// Names of the classes registered by this library, oldest first.
pub fn registered_classes() -> Vec<&'static str> {
    REGISTERED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|entry| entry.class)
        .collect()
}

fn engine_result(class: &str, operation: &'static str, code: Int) -> Result<(), RegistrarError> {
    if code == 0 {
        return Ok(());
    }
    Err(RegistrarError::Engine {
        class: class.to_string(),
        operation,
        code,
    })
}

// ============================================================================
// Registration
// ============================================================================

/// Register `T` with the engine and the class registry.
pub fn register_class<T: HostClass>() -> Result<(), RegistrarError> {
    let class = T::CLASS_NAME;
    let parent = <T::Base as ClassIdentity>::CLASS_NAME;
    if gdx_registry::classes().contains(class) {
        return Err(RegistryError::DuplicateClass(class.to_string()).into());
    }
    let parent_refcounted = gdx_registry::classes()
        .get(parent)
        .map(|descriptor| descriptor.is_refcounted)
        .ok_or_else(|| RegistryError::UnknownParent {
            class: class.to_string(),
            parent: parent.to_string(),
        })?;

    let mut builder = ClassBuilder::<T>::new();
    T::register(&mut builder);
    let property_descriptors = builder.property_descriptors();
    let ClassBuilder {
        methods,
        properties,
        constants,
        virtuals,
        hooks,
    } = builder;

    let mut descriptor = ClassDescriptor::extension(class, parent)
        .refcounted(parent_refcounted)
        .with_virtuals(virtuals);
    for entry in &methods {
        let mut method = MethodDescriptor::new(entry.name)
            .with_args(ClassBuilder::<T>::arg_infos(entry))
            .with_flags(entry.flags);
        if let Some(ret) = entry.ret {
            method = method.with_return(gdx_registry::ArgInfo {
                name: "",
                kind: ret.kind,
                class_name: ret.class_name,
            });
        }
        descriptor = descriptor.with_method(method);
    }
    for property in property_descriptors {
        descriptor = descriptor.with_property(property);
    }

    let runtime: &'static ClassRuntime<T> = Box::leak(Box::new(ClassRuntime { methods, hooks }));

    let info = callbacks::creation_info(runtime);
    let library = gdx_sys::library();
    let register = gdx_sys::interface_fn!(classdb_register_extension_class);
    let code = gdx_sys::with_string_name(class, |class_name| {
        gdx_sys::with_string_name(parent, |parent_name| unsafe {
            register(library, class_name, parent_name, &info)
        })
    });
    engine_result(class, "class registration", code)?;

    let members = register_methods(class, runtime)
        .and_then(|()| register_properties(class, &properties))
        .and_then(|()| register_constants(class, &constants));
    if let Err(error) = members {
        unregister_from_engine(class);
        return Err(error);
    }

    if let Err(error) = gdx_registry::classes_mut().register(descriptor) {
        unregister_from_engine(class);
        return Err(error.into());
    }

    let level = *CURRENT_LEVEL.lock().unwrap_or_else(PoisonError::into_inner);
    REGISTERED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(Registered { class, level });
    info!(class, parent, methods = runtime.methods.len(), "host class registered");
    Ok(())
}

/// Points into `name` and `class_name`, which must outlive the result.
fn property_info(
    spec: ArgSpec,
    name: &StringName,
    class_name: &StringName,
    usage: PropertyUsageFlags,
) -> PropertyInfo {
    PropertyInfo {
        kind: spec.kind.sys(),
        name: name.sys(),
        class_name: class_name.sys(),
        hint: 0,
        hint_string: std::ptr::null(),
        usage: usage.bits(),
    }
}

fn register_methods<T: HostClass>(
    class: &'static str,
    runtime: &'static ClassRuntime<T>,
) -> Result<(), RegistrarError> {
    let register = gdx_sys::interface_fn!(classdb_register_extension_class_method);
    let library = gdx_sys::library();
    let class_name = StringName::from(class);

    for entry in &runtime.methods {
        let name = StringName::from(entry.name);
        let arg_names: Vec<StringName> = (0..entry.args.len())
            .map(|i| StringName::from(format!("arg{i}").as_str()))
            .collect();
        let arg_classes: Vec<StringName> = entry
            .args
            .iter()
            .map(|spec| StringName::from(spec.class_name.unwrap_or_default()))
            .collect();
        let args: Vec<PropertyInfo> = entry
            .args
            .iter()
            .zip(arg_names.iter().zip(&arg_classes))
            .map(|(spec, (name, class))| {
                property_info(*spec, name, class, PropertyUsageFlags::DEFAULT)
            })
            .collect();

        let empty = StringName::default();
        let ret_class =
            StringName::from(entry.ret.and_then(|ret| ret.class_name).unwrap_or_default());
        let ret = entry
            .ret
            .map(|spec| property_info(spec, &empty, &ret_class, PropertyUsageFlags::DEFAULT));

        let info = ClassMethodInfo {
            name: name.sys(),
            method_userdata: (entry as *const MethodEntry<T>).cast_mut().cast(),
            call_func: Some(callbacks::method_call::<T>),
            ptrcall_func: Some(callbacks::method_ptrcall::<T>),
            method_flags: entry.flags.bits(),
            has_return_value: if ret.is_some() { gdx_sys::TRUE } else { gdx_sys::FALSE },
            return_value_info: ret
                .as_ref()
                .map_or(std::ptr::null(), |ret| ret as *const PropertyInfo),
            argument_count: args.len() as u32,
            arguments_info: if args.is_empty() { std::ptr::null() } else { args.as_ptr() },
        };
        let code = unsafe { register(library, class_name.sys(), &info) };
        engine_result(class, "method registration", code)?;
        debug!(class, method = entry.name, "method registered");
    }
    Ok(())
}

fn register_properties(
    class: &'static str,
    properties: &[PropertyEntry],
) -> Result<(), RegistrarError> {
    let register = gdx_sys::interface_fn!(classdb_register_extension_class_property);
    let library = gdx_sys::library();
    let class_name = StringName::from(class);

    for property in properties {
        let name = StringName::from(property.name);
        let hint_class = StringName::from(property.spec.class_name.unwrap_or_default());
        let info = property_info(property.spec, &name, &hint_class, PropertyUsageFlags::DEFAULT);
        let getter = StringName::from(property.getter);
        let setter = StringName::from(property.setter.unwrap_or_default());
        let code =
            unsafe { register(library, class_name.sys(), &info, setter.sys(), getter.sys()) };
        engine_result(class, "property registration", code)?;
    }
    Ok(())
}

fn register_constants(
    class: &'static str,
    constants: &[ConstantEntry],
) -> Result<(), RegistrarError> {
    let register = gdx_sys::interface_fn!(classdb_register_extension_class_integer_constant);
    let library = gdx_sys::library();
    let class_name = StringName::from(class);

    for constant in constants {
        let enum_name = StringName::from(constant.enum_name);
        let name = StringName::from(constant.name);
        let is_bitfield = if constant.is_bitfield { gdx_sys::TRUE } else { gdx_sys::FALSE };
        let code = unsafe {
            register(
                library,
                class_name.sys(),
                enum_name.sys(),
                name.sys(),
                constant.value,
                is_bitfield,
            )
        };
        engine_result(class, "constant registration", code)?;
    }
    Ok(())
}

// ============================================================================
// Unregistration
// ============================================================================

fn unregister_from_engine(class: &str) -> Int {
    let unregister = gdx_sys::interface_fn!(classdb_unregister_extension_class);
    let library = gdx_sys::library();
    gdx_sys::with_string_name(class, |name| unsafe { unregister(library, name) })
}

/// Remove a class registered by [`register_class`].
///
/// Objects of the class that are still alive keep working; only new
/// instantiation stops.
pub fn unregister_class(class: &str) -> Result<(), RegistrarError> {
    let mut registered = REGISTERED.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(index) = registered.iter().position(|entry| entry.class == class) else {
        return Err(RegistrarError::NotRegistered(class.to_string()));
    };
    engine_result(class, "unregistration", unregister_from_engine(class))?;
    gdx_registry::classes_mut().unregister(class)?;
    registered.remove(index);
    info!(class, "host class unregistered");
    Ok(())
}

/// Unregister every class registered while `level` was initializing, newest
/// first. Failures are reported and do not stop the rest.
pub(crate) fn unregister_level(level: InitializationLevel) {
    let classes: Vec<&'static str> = REGISTERED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .rev()
        .filter(|entry| entry.level == Some(level))
        .map(|entry| entry.class)
        .collect();
    for class in classes {
        if let Err(error) = unregister_class(class) {
            crate::engine_error!("failed to unregister `{class}`: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Once;

    use gdx_sys::MethodFlags;
    use gdx_testengine::Var;

    use super::*;
    use crate::builtin::GString;
    use crate::call::CallError;
    use crate::classes::{INode, Node, Object, Resource};
    use crate::obj::Gd;
    use crate::meta::{FromVariant, ToVariant};
    use crate::obj::{EngineClass, ObjectError};
    use crate::test_support;

    #[derive(crate::HostClass)]
    #[class(base = Node, init, register = Self::register_methods, overrides(ready))]
    struct Counter {
        base: Base<Node>,
        #[var]
        count: i64,
        readies: i64,
    }

    impl Counter {
        fn register_methods(builder: &mut ClassBuilder<Self>) {
            builder
                .method("bump", |this: &mut Counter, by: i64| {
                    this.count += by;
                    this.count
                })
                .method("doubled", |this: &Counter| this.count * 2)
                .method("label", |this: &Counter| {
                    assert!(this.count >= 0, "negative count");
                    GString::from(format!("count {}", this.count))
                })
                .method("make_resource", |_this: &Counter| Some(Resource::new_gd()))
                .constant("Mode", "FAST", 2)
                .on_to_string(|this| format!("Counter({})", this.count));
        }
    }

    impl INode for Counter {
        fn ready(&mut self) {
            self.readies += 1;
        }
    }

    #[derive(crate::HostClass)]
    #[class(base = Object, init)]
    struct Transient {
        base: Base<Object>,
    }

    fn register_counter() {
        static REGISTER: Once = Once::new();
        REGISTER.call_once(|| register_class::<Counter>().unwrap());
    }

    fn object_var<T: HostClass>(instance: &Instance<T>) -> Var {
        let ptr = instance.base().raw_object().object_ptr();
        Var::from_object(ptr as usize, instance.instance_id())
    }

    #[test]
    fn registered_classes_reach_the_engine() {
        test_support::boot();
        register_counter();
        assert!(gdx_testengine::class_exists("Counter"));
        assert_eq!(gdx_testengine::class_parent("Counter").as_deref(), Some("Node"));
        assert_eq!(gdx_testengine::class_constant("Counter", "FAST"), Some(2));
        assert!(gdx_testengine::method_has_flags("Counter", "doubled", MethodFlags::CONST));
        assert!(gdx_testengine::class_properties("Counter").iter().any(|name| name == "count"));

        let classes = gdx_registry::classes();
        let descriptor = classes.get("Counter").unwrap();
        assert_eq!(descriptor.parent, Some("Node"));
        assert!(descriptor.virtuals.contains("_ready"));
        assert!(descriptor.method("get_count").is_some());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        test_support::boot();
        register_counter();
        assert_eq!(
            register_class::<Counter>(),
            Err(RegistrarError::Registry(RegistryError::DuplicateClass("Counter".into())))
        );
    }

    #[test]
    fn engine_calls_reach_host_methods() {
        test_support::boot();
        register_counter();
        let id = gdx_testengine::construct("Counter").unwrap();
        assert_eq!(gdx_testengine::class_of(id).as_deref(), Some("Counter"));

        let bumped = gdx_testengine::call_method(id, "bump", &[Var::from_int(3)]).unwrap();
        assert_eq!(bumped.as_int(), Some(3));
        let doubled = gdx_testengine::ptrcall_method(id, "doubled", &[]).unwrap();
        assert_eq!(doubled.as_int(), Some(6));

        assert!(gdx_testengine::set_property(id, "count", &Var::from_int(10)));
        assert_eq!(gdx_testengine::get_property(id, "count").and_then(|v| v.as_int()), Some(10));

        let error = gdx_testengine::call_method(id, "bump", &[]).unwrap_err();
        assert_eq!(CallError::from_sys(error), Some(CallError::TooFewArguments { expected: 1 }));
        gdx_testengine::destroy(id);
        assert!(gdx_testengine::is_destroyed(id));
    }

    #[test]
    fn returned_objects_keep_one_reference_for_the_engine() {
        test_support::boot();
        register_counter();
        let id = gdx_testengine::construct("Counter").unwrap();
        let before = crate::obj::live_references();

        let typed = gdx_testengine::ptrcall_method(id, "make_resource", &[]).unwrap();
        let (_, typed_id) = typed.object().unwrap();
        assert_eq!(gdx_testengine::reference_count(typed_id), Some(1));
        drop(typed);
        assert!(gdx_testengine::is_destroyed(typed_id));

        let dynamic = gdx_testengine::call_method(id, "make_resource", &[]).unwrap();
        let (_, dynamic_id) = dynamic.object().unwrap();
        assert!(gdx_testengine::is_live(dynamic_id));
        assert_eq!(gdx_testengine::reference_count(dynamic_id), Some(1));
        drop(dynamic);
        assert!(gdx_testengine::is_destroyed(dynamic_id));

        assert_eq!(crate::obj::live_references(), before);
        gdx_testengine::destroy(id);
    }

    #[test]
    fn panicking_methods_leave_a_default_return() {
        test_support::boot();
        register_counter();
        let mut counter = Instance::<Counter>::new().unwrap();
        counter.bind_mut().count = -1;
        let id = counter.instance_id();

        let typed = gdx_testengine::ptrcall_method(id, "label", &[]).unwrap();
        assert_eq!(typed.text().as_deref(), Some(""));
        let error = gdx_testengine::call_method(id, "label", &[]).unwrap_err();
        assert_eq!(CallError::from_sys(error), Some(CallError::InvalidMethod));
        assert!(
            gdx_testengine::captured_errors()
                .iter()
                .any(|message| message.contains("label panicked: negative count"))
        );

        counter.bind_mut().count = 2;
        let typed = gdx_testengine::ptrcall_method(id, "label", &[]).unwrap();
        assert_eq!(typed.text().as_deref(), Some("count 2"));
        unsafe { counter.free() };
    }

    #[test]
    fn returned_objects_reach_host_code_counted() {
        test_support::boot();
        register_counter();
        let counter = Instance::<Counter>::new().unwrap();
        let mut object: Gd<Object> = counter.base().clone().upcast();
        let made = object.call(&"make_resource".into(), &[]).unwrap();
        let resource = Gd::<Resource>::try_from_variant(&made).unwrap();
        drop(made);
        assert_eq!(gdx_testengine::reference_count(resource.instance_id()), Some(1));
        let id = resource.instance_id();
        drop(resource);
        assert!(gdx_testengine::is_destroyed(id));
        unsafe { counter.free() };
    }

    #[test]
    fn instances_bind_the_host_object() {
        test_support::boot();
        register_counter();
        let mut counter = Instance::<Counter>::new().unwrap();
        counter.bind_mut().count = 4;
        assert_eq!(counter.bind().count, 4);
        assert_eq!(counter.base().to_variant().stringify(), "Counter(4)");
        unsafe { counter.free() };
    }

    #[test]
    fn ready_runs_once_when_entering_the_tree() {
        test_support::boot();
        register_counter();
        let counter = Instance::<Counter>::new().unwrap();
        let root = gdx_testengine::scene_root();
        gdx_testengine::call_method(root, "add_child", &[object_var(&counter)]).unwrap();
        assert_eq!(counter.bind().readies, 1);
        gdx_testengine::iterate(1.0 / 60.0);
        assert_eq!(counter.bind().readies, 1);
    }

    #[test]
    fn plain_engine_objects_are_not_instances() {
        test_support::boot();
        register_counter();
        let node = Node::new_alloc();
        let result = Instance::<Counter>::from_gd(node.share());
        assert!(matches!(result, Err(ObjectError::CastFailed { to: "Counter", .. })));
    }

    #[test]
    fn unregistering_removes_the_class() {
        test_support::boot();
        register_class::<Transient>().unwrap();
        assert!(gdx_testengine::class_exists("Transient"));
        assert!(registered_classes().contains(&"Transient"));

        unregister_class("Transient").unwrap();
        assert!(!gdx_testengine::class_exists("Transient"));
        assert!(!gdx_registry::classes().contains("Transient"));
        assert_eq!(
            unregister_class("Transient"),
            Err(RegistrarError::NotRegistered("Transient".into()))
        );
    }
}

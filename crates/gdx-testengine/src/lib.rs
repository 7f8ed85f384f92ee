//! In-process reference implementation of the Host Engine.
//!
//! The engine owns the object table, the class database and the value
//! representation behind every opaque handle. [`boot`] hands the function
//! table to an extension entry point and runs its initialization levels;
//! the free functions in this crate are the inspection hooks tests use to
//! observe what the extension did.
//!
//! ```no_run
//! # unsafe extern "C" fn entry(
//! #     _: *const gdx_sys::EngineInterface,
//! #     _: gdx_sys::ClassLibraryPtr,
//! #     _: *mut gdx_sys::Initialization,
//! # ) -> gdx_sys::Bool { 1 }
//! gdx_testengine::boot(entry).unwrap();
//! gdx_testengine::iterate(1.0 / 60.0);
//! gdx_testengine::shutdown().unwrap();
//! ```

mod abi;
mod builtins;
mod classdb;
mod classes;
mod error;
mod hooks;
mod objects;
mod ops;
mod typed;
mod value;

use std::sync::Mutex;

use gdx_sys::{CallError, CallErrorType, Initialization, InitializationFunction, MethodFlags};

pub use crate::abi::{INTERFACE, override_version};
pub use crate::error::{EngineError, code};
pub use crate::hooks::*;
pub use crate::value::{Name, Var};

use crate::classdb::MethodBody;
use crate::value::lock;

/// Highest level the engine initializes (`Scene`).
const LAST_LEVEL: u32 = 2;

/// Address handed to the entry point as the library token.
static LIBRARY: u8 = 0;

struct Booted(Initialization);

// The userdata pointer belongs to the extension and is only passed back to it.
unsafe impl Send for Booted {}

static BOOTED: Mutex<Option<Booted>> = Mutex::new(None);

/// Load an extension: call its entry point, then initialize every level from
/// its minimum up to `Scene`.
pub fn boot(entry: InitializationFunction) -> Result<(), EngineError> {
    let mut booted = lock(&BOOTED);
    if booted.is_some() {
        return Err(EngineError::AlreadyBooted);
    }
    let mut init = Initialization {
        minimum_initialization_level: 0,
        userdata: std::ptr::null_mut(),
        initialize: None,
        deinitialize: None,
    };
    let library = std::ptr::addr_of!(LIBRARY).cast_mut().cast();
    let accepted = unsafe { entry(&INTERFACE, library, &mut init) };
    if accepted == 0 {
        tracing::warn!("extension entry point returned false");
        return Err(EngineError::EntryRejected);
    }
    tracing::info!(minimum_level = init.minimum_initialization_level, "extension loaded");
    *booted = Some(Booted(init));
    drop(booted);

    if let Some(initialize) = init.initialize {
        for level in init.minimum_initialization_level..=LAST_LEVEL {
            tracing::debug!(level, "initializing extension level");
            unsafe { initialize(init.userdata, level) };
        }
    }
    Ok(())
}

/// Deinitialize the loaded extension, levels in reverse order.
pub fn shutdown() -> Result<(), EngineError> {
    let Some(Booted(init)) = lock(&BOOTED).take() else {
        return Err(EngineError::NotBooted);
    };
    if let Some(deinitialize) = init.deinitialize {
        for level in (init.minimum_initialization_level..=LAST_LEVEL).rev() {
            tracing::debug!(level, "deinitializing extension level");
            unsafe { deinitialize(init.userdata, level) };
        }
    }
    tracing::info!("extension unloaded");
    Ok(())
}

pub fn is_booted() -> bool {
    lock(&BOOTED).is_some()
}

fn method_of(id: u64, name: &str) -> Result<std::sync::Arc<classdb::MethodInfo>, CallError> {
    let class = objects::class_name(id).ok_or(CallError::new(CallErrorType::InstanceIsNull, 0, 0))?;
    classdb::find_method(&class, name).ok_or(CallError::new(CallErrorType::InvalidMethod, 0, 0))
}

/// Call a method on object `id` the way scripts do, through variants.
pub fn call_method(id: u64, name: &str, args: &[Var]) -> Result<Var, CallError> {
    let method = method_of(id, name)?;
    classdb::call(&method, objects::ptr_of(id), args)
}

/// Call a method through typed storage, as engine-internal callers do.
/// Extension methods go through their pointer-call callback.
pub fn ptrcall_method(id: u64, name: &str, args: &[Var]) -> Result<Var, CallError> {
    let method = method_of(id, name)?;
    if matches!(method.body, MethodBody::Extension { ptrcall: Some(_), .. }) {
        return classdb::ptrcall_extension(&method, objects::ptr_of(id), args)
            .ok_or(CallError::new(CallErrorType::InvalidArgument, 0, 0));
    }
    classdb::call(&method, objects::ptr_of(id), args)
}

/// Whether `class::method` was registered with `flags`.
pub fn method_has_flags(class: &str, method: &str, flags: MethodFlags) -> bool {
    classdb::find_method(class, method).is_some_and(|info| {
        let signature = &info.signature;
        (!flags.contains(MethodFlags::CONST) || signature.is_const)
            && (!flags.contains(MethodFlags::VARARG) || signature.is_vararg)
            && (!flags.contains(MethodFlags::STATIC) || signature.is_static)
    })
}

/// Signature text of `class::method` as the engine hashes it.
pub fn method_signature(class: &str, method: &str) -> Option<String> {
    classdb::find_method(class, method).map(|info| info.signature.text.clone())
}

pub fn get_property(id: u64, property: &str) -> Option<Var> {
    let class = objects::class_name(id)?;
    Some(classes::object::get_property(id, &class, property))
}

pub fn set_property(id: u64, property: &str, value: &Var) -> bool {
    match objects::class_name(id) {
        Some(class) => {
            classes::object::set_property(id, &class, property, value);
            true
        }
        None => false,
    }
}

/// Deliver a notification as the engine would.
pub fn notify(id: u64, what: i64) {
    classdb::notify(id, what);
}

/// Run one frame of the main loop.
pub fn iterate(delta: f64) {
    classes::engine::iterate(delta);
}

/// Instantiate `class` as engine code would; `None` when it cannot be built.
pub fn construct(class: &str) -> Option<u64> {
    match classdb::construct(class) {
        Ok(object) => objects::id_of_ptr(object),
        Err(message) => {
            hooks::report_error(message);
            None
        }
    }
}

pub fn destroy(id: u64) {
    objects::destroy(id);
}

/// Class name of a live object, extension classes included.
pub fn class_of(id: u64) -> Option<String> {
    objects::class_name(id)
}

pub fn scene_root() -> u64 {
    classes::engine::scene_root()
}

/// Text an object produces when stringified.
pub fn stringify(value: &Var) -> String {
    ops::stringify(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn reject(
        _: *const gdx_sys::EngineInterface,
        _: gdx_sys::ClassLibraryPtr,
        _: *mut Initialization,
    ) -> gdx_sys::Bool {
        0
    }

    #[test]
    fn rejected_entry_points_stay_unloaded() {
        assert!(matches!(boot(reject), Err(EngineError::EntryRejected)));
        assert!(matches!(shutdown(), Err(EngineError::NotBooted)));
    }

    #[test]
    fn call_method_reports_unknown_methods() {
        let id = construct("Node").unwrap();
        let err = call_method(id, "no_such_method", &[]).unwrap_err();
        assert_eq!(err.kind(), CallErrorType::InvalidMethod);
        destroy(id);
        let err = call_method(id, "get_name", &[]).unwrap_err();
        assert_eq!(err.kind(), CallErrorType::InstanceIsNull);
    }

    #[test]
    fn properties_go_through_declared_accessors() {
        let id = construct("Resource").unwrap();
        assert!(set_property(id, "resource_name", &Var::from_str("sword")));
        let name = get_property(id, "resource_name").and_then(|v| v.text());
        assert_eq!(name.as_deref(), Some("sword"));
        assert!(method_has_flags("Resource", "get_name", MethodFlags::CONST));
        destroy(id);
    }
}

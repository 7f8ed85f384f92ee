//! `extern "C"` callbacks the engine invokes on host classes.
//!
//! Every callback runs its body under [`guarded`]: a panic in user code is
//! reported to the engine and replaced by a neutral result, never unwound
//! across the boundary.

use std::any::Any;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use gdx_registry::VirtualFn;
use gdx_sys::{
    Bool, ClassCreationInfo, ClassInstancePtr, ConstStringNamePtr, ConstTypePtr, ConstVariantPtr,
    Int, ObjectPtr, PropertyInfo, PropertyUsageFlags, TypePtr, UninitStringPtr, UninitVariantPtr,
};

use crate::builtin::{GString, StringName};
use crate::call::CallError;
use crate::meta::PtrCodec;
use crate::obj::{ClassIdentity, RawObject};
use crate::registrar::builder::MethodEntry;
use crate::registrar::instance::{Base, InstanceStorage, PropertyListBuffer};
use crate::registrar::{ClassRuntime, HostClass};
use crate::variant::Variant;

/// Callback table for `T`; hooks the class did not set stay `None` so the
/// engine falls back to its own handling.
pub(super) fn creation_info<T: HostClass>(runtime: &'static ClassRuntime<T>) -> ClassCreationInfo {
    let hooks = &runtime.hooks;
    ClassCreationInfo {
        is_virtual: gdx_sys::FALSE,
        is_abstract: gdx_sys::FALSE,
        set_func: if hooks.set.is_some() { Some(set::<T>) } else { None },
        get_func: if hooks.get.is_some() { Some(get::<T>) } else { None },
        get_property_list_func: if hooks.property_list.is_some() {
            Some(get_property_list::<T>)
        } else {
            None
        },
        free_property_list_func: if hooks.property_list.is_some() {
            Some(free_property_list::<T>)
        } else {
            None
        },
        notification_func: if hooks.notification.is_some() {
            Some(notification::<T>)
        } else {
            None
        },
        to_string_func: if hooks.to_string.is_some() { Some(to_string::<T>) } else { None },
        create_instance_func: Some(create_instance::<T>),
        free_instance_func: Some(free_instance::<T>),
        get_virtual_call_data_func: Some(get_virtual_call_data::<T>),
        call_virtual_with_data_func: Some(call_virtual_with_data),
        class_userdata: (runtime as *const ClassRuntime<T>).cast_mut().cast(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Run `f`, turning a panic into an engine error and `fallback`.
pub(crate) fn guarded<R>(class: &str, callback: &str, fallback: R, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            crate::engine_error!("`{class}` {callback} panicked: {reason}");
            fallback
        }
    }
}

fn to_bool(value: bool) -> Bool {
    if value { gdx_sys::TRUE } else { gdx_sys::FALSE }
}

// ============================================================================
// Lifetime
// ============================================================================

unsafe extern "C" fn create_instance<T: HostClass>(class_userdata: *mut c_void) -> ObjectPtr {
    guarded(T::CLASS_NAME, "create", ptr::null_mut(), || {
        let runtime = unsafe { &*class_userdata.cast::<ClassRuntime<T>>() };
        let base_class = <T::Base as ClassIdentity>::CLASS_NAME;
        let object = crate::obj::construct_object(base_class);
        let Some(raw) = (unsafe { RawObject::new(object, false) }) else {
            crate::engine_error!(
                "engine could not construct `{base_class}` for `{}`",
                T::CLASS_NAME
            );
            return ptr::null_mut();
        };

        let value = T::init(Base::new(raw));
        let instance = Box::new(InstanceStorage::new(value, runtime)).into_instance_ptr();
        let set_instance = gdx_sys::interface_fn!(object_set_instance);
        gdx_sys::with_string_name(T::CLASS_NAME, |name| unsafe {
            set_instance(object, name, instance)
        });
        object
    })
}

unsafe extern "C" fn free_instance<T: HostClass>(
    _class_userdata: *mut c_void,
    instance: ClassInstancePtr,
) {
    if instance.is_null() {
        return;
    }
    guarded(T::CLASS_NAME, "free", (), || unsafe { InstanceStorage::<T>::free(instance) });
}

// ============================================================================
// Virtuals
// ============================================================================

unsafe extern "C" fn get_virtual_call_data<T: HostClass>(
    _class_userdata: *mut c_void,
    name: ConstStringNamePtr,
) -> *mut c_void {
    guarded(T::CLASS_NAME, "virtual lookup", ptr::null_mut(), || {
        let name = unsafe { StringName::from_arg_ptr(name) }.to_string();
        match gdx_registry::classes().find_virtual(T::CLASS_NAME, &name) {
            Some(stub) => stub as *const () as *mut c_void,
            None => ptr::null_mut(),
        }
    })
}

unsafe extern "C" fn call_virtual_with_data(
    instance: ClassInstancePtr,
    _name: ConstStringNamePtr,
    virtual_userdata: *mut c_void,
    args: *const ConstTypePtr,
    ret: TypePtr,
) {
    if virtual_userdata.is_null() {
        return;
    }
    // Only ever a `VirtualFn` handed out by `get_virtual_call_data`.
    let stub = unsafe { std::mem::transmute::<*mut c_void, VirtualFn>(virtual_userdata) };
    guarded("host class", "virtual call", (), || unsafe { stub(instance, args, ret) });
}

// ============================================================================
// Methods
// ============================================================================

#[cfg_attr(feature = "profiling", profiling::function)]
pub(super) unsafe extern "C" fn method_call<T: HostClass>(
    method_userdata: *mut c_void,
    instance: ClassInstancePtr,
    args: *const ConstVariantPtr,
    argc: Int,
    ret: UninitVariantPtr,
    error: *mut gdx_sys::CallError,
) {
    let entry = unsafe { &*method_userdata.cast::<MethodEntry<T>>() };
    let result = if instance.is_null() {
        Err(CallError::InstanceIsNull)
    } else {
        guarded(T::CLASS_NAME, entry.name, Err(CallError::InvalidMethod), || {
            let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
            let args: Vec<&Variant> = (0..argc.max(0) as usize)
                .map(|index| unsafe { Variant::borrow_sys(*args.add(index)) })
                .collect();
            entry.method.call_variants(storage, &args)
        })
    };
    match result {
        Ok(value) => unsafe {
            value.write_return(ret);
            *error = gdx_sys::CallError::OK;
        },
        Err(failure) => unsafe {
            Variant::nil().write_return(ret);
            *error = failure.to_sys();
        },
    }
}

#[cfg_attr(feature = "profiling", profiling::function)]
pub(super) unsafe extern "C" fn method_ptrcall<T: HostClass>(
    method_userdata: *mut c_void,
    instance: ClassInstancePtr,
    args: *const ConstTypePtr,
    ret: TypePtr,
) {
    let entry = unsafe { &*method_userdata.cast::<MethodEntry<T>>() };
    if instance.is_null() {
        crate::engine_error!("`{}.{}` called on a null instance", T::CLASS_NAME, entry.name);
        unsafe { entry.method.write_default_return(ret) };
        return;
    }
    let completed = guarded(T::CLASS_NAME, entry.name, false, || {
        let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
        unsafe { entry.method.call_ptrs(storage, args, ret) };
        true
    });
    if !completed {
        unsafe { entry.method.write_default_return(ret) };
    }
}

// ============================================================================
// Hooks
// ============================================================================

unsafe extern "C" fn notification<T: HostClass>(instance: ClassInstancePtr, what: i32) {
    guarded(T::CLASS_NAME, "notification", (), || {
        let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
        if let Some(hook) = storage.runtime.hooks.notification {
            hook(&mut storage.borrow_mut(), what);
        }
    });
}

unsafe extern "C" fn to_string<T: HostClass>(
    instance: ClassInstancePtr,
    is_valid: *mut Bool,
    out: UninitStringPtr,
) {
    let text = guarded(T::CLASS_NAME, "to_string", None, || {
        let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
        let hook = storage.runtime.hooks.to_string?;
        Some(hook(&storage.borrow()))
    });
    match text {
        Some(text) => unsafe {
            GString::from(text).write_return(out);
            *is_valid = gdx_sys::TRUE;
        },
        None => unsafe { *is_valid = gdx_sys::FALSE },
    }
}

unsafe extern "C" fn set<T: HostClass>(
    instance: ClassInstancePtr,
    name: ConstStringNamePtr,
    value: ConstVariantPtr,
) -> Bool {
    let handled = guarded(T::CLASS_NAME, "set", false, || {
        let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
        let Some(hook) = storage.runtime.hooks.set else {
            return false;
        };
        let name = unsafe { StringName::from_arg_ptr(name) };
        let value = unsafe { Variant::borrow_sys(value) };
        hook(&mut storage.borrow_mut(), &name, value)
    });
    to_bool(handled)
}

unsafe extern "C" fn get<T: HostClass>(
    instance: ClassInstancePtr,
    name: ConstStringNamePtr,
    ret: UninitVariantPtr,
) -> Bool {
    let value = guarded(T::CLASS_NAME, "get", None, || {
        let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
        let hook = storage.runtime.hooks.get?;
        let name = unsafe { StringName::from_arg_ptr(name) };
        hook(&storage.borrow(), &name)
    });
    match value {
        Some(value) => {
            unsafe { value.write_return(ret) };
            gdx_sys::TRUE
        }
        None => gdx_sys::FALSE,
    }
}

unsafe extern "C" fn get_property_list<T: HostClass>(
    instance: ClassInstancePtr,
    count: *mut u32,
) -> *const PropertyInfo {
    let list = guarded(T::CLASS_NAME, "property list", None, || {
        let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
        let hook = storage.runtime.hooks.property_list?;
        let properties = hook(&storage.borrow());

        // Names first: the infos point at them, so the vector must not grow
        // afterwards.
        let names: Vec<StringName> = properties
            .iter()
            .flat_map(|property| {
                [
                    StringName::from(property.name.as_str()),
                    StringName::from(property.spec.class_name.unwrap_or_default()),
                ]
            })
            .collect();
        let infos: Vec<PropertyInfo> = properties
            .iter()
            .zip(names.chunks_exact(2))
            .map(|(property, pair)| PropertyInfo {
                kind: property.spec.kind.sys(),
                name: pair[0].sys(),
                class_name: pair[1].sys(),
                hint: 0,
                hint_string: ptr::null(),
                usage: PropertyUsageFlags::DEFAULT.bits(),
            })
            .collect();

        let len = infos.len() as u32;
        let head = infos.as_ptr();
        storage.property_lists.borrow_mut().push(PropertyListBuffer { infos, _names: names });
        Some((head, len))
    });
    match list {
        Some((head, len)) => {
            unsafe { *count = len };
            head
        }
        None => {
            unsafe { *count = 0 };
            ptr::null()
        }
    }
}

unsafe extern "C" fn free_property_list<T: HostClass>(
    instance: ClassInstancePtr,
    list: *const PropertyInfo,
) {
    if list.is_null() {
        return;
    }
    guarded(T::CLASS_NAME, "free property list", (), || {
        let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
        let mut lists = storage.property_lists.borrow_mut();
        match lists.iter().position(|buffer| buffer.infos.as_ptr() == list) {
            Some(index) => {
                lists.swap_remove(index);
            }
            None => crate::engine_error!(
                "`{}` was asked to free a property list it never returned",
                T::CLASS_NAME
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_turns_panics_into_fallbacks() {
        let value = guarded("Widget", "test", 7, || -> i32 { panic!("boom") });
        assert_eq!(value, 7);
        assert_eq!(guarded("Widget", "test", 7, || 3), 3);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");
        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}

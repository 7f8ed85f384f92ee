use std::ffi::c_void;

use gdx_sys::{
    Bool, CallError, ClassInstancePtr, ConstObjectPtr, ConstStringNamePtr, ConstTypePtr,
    ConstVariantPtr, Int, MethodBindPtr, ObjectId, ObjectPtr, TypePtr, UninitStringNamePtr,
    UninitVariantPtr,
};

use super::{name_arg, var_arg, write_name, write_var};
use crate::classdb::{self, MethodBody, MethodInfo};
use crate::classes::engine;
use crate::hooks::report_error;
use crate::objects;
use crate::typed;
use crate::value::{Name, Var};

/// # Safety
///
/// `method` must be a bind handed out by `classdb_get_method_bind`.
unsafe fn method_info<'a>(method: MethodBindPtr) -> Option<&'a MethodInfo> {
    unsafe { method.cast::<MethodInfo>().as_ref() }
}

pub(super) unsafe extern "C" fn object_method_bind_call(
    method: MethodBindPtr,
    object: ObjectPtr,
    args: *const ConstVariantPtr,
    argc: Int,
    ret: UninitVariantPtr,
    error: *mut CallError,
) {
    let Some(method) = (unsafe { method_info(method) }) else {
        report_error("object_method_bind_call: null method bind".to_string());
        return;
    };
    let count = usize::try_from(argc).unwrap_or_default();
    let args: Vec<Var> = (0..count).map(|i| unsafe { var_arg(*args.add(i)) }.clone()).collect();
    let result = classdb::call(method, object, &args);
    unsafe {
        match result {
            Ok(value) => {
                write_var(ret, value);
                if !error.is_null() {
                    *error = CallError::OK;
                }
            }
            Err(err) => {
                write_var(ret, Var::nil());
                if !error.is_null() {
                    *error = err;
                }
            }
        }
    }
}

/// Typed call. Extension methods with a pointer-call callback receive the
/// caller's storage unchanged; everything else is decoded, called and
/// re-encoded per the bound signature.
pub(super) unsafe extern "C" fn object_method_bind_ptrcall(
    method: MethodBindPtr,
    object: ObjectPtr,
    args: *const ConstTypePtr,
    ret: TypePtr,
) {
    let Some(method) = (unsafe { method_info(method) }) else {
        report_error("object_method_bind_ptrcall: null method bind".to_string());
        return;
    };

    if let MethodBody::Extension {
        userdata,
        ptrcall: Some(ptrcall),
        ..
    } = &method.body
    {
        match objects::id_of_ptr(object).and_then(objects::attached) {
            Some(attached) => unsafe {
                ptrcall(*userdata as *mut c_void, attached.instance as ClassInstancePtr, args, ret);
            },
            None => {
                report_error(format!("{}::{}: instance is null", method.class, method.name));
                unsafe { write_default(method, ret) };
            }
        }
        return;
    }

    let values: Vec<Var> = method
        .signature
        .args
        .iter()
        .enumerate()
        .map(|(i, arg)| unsafe { typed::read(arg.kind, *args.add(i)) })
        .collect();
    match classdb::call(method, object, &values) {
        Ok(value) => {
            if let Some(ret_type) = &method.signature.ret {
                if !ret.is_null() {
                    unsafe { typed::write_return(&value, ret_type.kind, ret) };
                }
            }
        }
        Err(err) => {
            report_error(format!("{}::{} failed: {:?}", method.class, method.name, err.kind()));
            unsafe { write_default(method, ret) };
        }
    }
}

unsafe fn write_default(method: &MethodInfo, ret: TypePtr) {
    if let Some(ret_type) = &method.signature.ret {
        if !ret.is_null() {
            unsafe { typed::write(&crate::ops::default_of(ret_type.kind), ret_type.kind, ret) };
        }
    }
}

pub(super) unsafe extern "C" fn object_destroy(object: ObjectPtr) {
    match objects::id_of_ptr(object) {
        Some(id) => objects::destroy(id),
        None => report_error("object_destroy: object is not alive".to_string()),
    }
}

pub(super) unsafe extern "C" fn global_get_singleton(name: ConstStringNamePtr) -> ObjectPtr {
    let name = unsafe { name_arg(name) };
    engine::singleton(name.as_str()).unwrap_or_else(|| {
        report_error(format!("singleton `{}` does not exist", name.as_str()));
        std::ptr::null_mut()
    })
}

fn live_id(object: ConstObjectPtr) -> Option<u64> {
    objects::id_of_ptr(object).filter(|id| objects::is_live(*id))
}

pub(super) unsafe extern "C" fn object_get_instance_id(object: ConstObjectPtr) -> ObjectId {
    live_id(object).unwrap_or_default()
}

pub(super) unsafe extern "C" fn object_get_instance_from_id(id: ObjectId) -> ObjectPtr {
    if objects::is_live(id) {
        objects::ptr_of(id)
    } else {
        std::ptr::null_mut()
    }
}

pub(super) unsafe extern "C" fn object_get_class_name(
    object: ConstObjectPtr,
    dst: UninitStringNamePtr,
) -> Bool {
    match live_id(object).and_then(objects::class_name) {
        Some(class) => {
            unsafe { write_name(dst, Name::intern(&class)) };
            1
        }
        None => {
            unsafe { write_name(dst, Name::intern("")) };
            0
        }
    }
}

pub(super) unsafe extern "C" fn object_cast_to(
    object: ConstObjectPtr,
    class_name: ConstStringNamePtr,
) -> ObjectPtr {
    let target = unsafe { name_arg(class_name) };
    match live_id(object).and_then(objects::class_name) {
        Some(class) if classdb::inherits(&class, target.as_str()) => object.cast_mut(),
        _ => std::ptr::null_mut(),
    }
}

pub(super) unsafe extern "C" fn object_set_instance(
    object: ObjectPtr,
    class_name: ConstStringNamePtr,
    instance: ClassInstancePtr,
) {
    let class = unsafe { name_arg(class_name) };
    let attached = live_id(object).is_some_and(|id| objects::attach(id, class.as_str(), instance));
    if !attached {
        report_error(format!(
            "object_set_instance: `{}` instance has no live object",
            class.as_str()
        ));
    }
}

pub(super) unsafe extern "C" fn object_get_instance(object: ConstObjectPtr) -> ClassInstancePtr {
    live_id(object)
        .and_then(objects::attached)
        .map_or(std::ptr::null_mut(), |attached| attached.instance as ClassInstancePtr)
}

pub(super) unsafe extern "C" fn ref_reference(object: ObjectPtr) -> Bool {
    live_id(object).is_some_and(objects::reference) as Bool
}

pub(super) unsafe extern "C" fn ref_unreference(object: ObjectPtr) -> Bool {
    live_id(object).is_some_and(objects::unreference) as Bool
}

pub(super) unsafe extern "C" fn ref_get_reference_count(object: ConstObjectPtr) -> Int {
    live_id(object).and_then(objects::reference_count).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::{Slot, TypedArgs};
    use gdx_sys::VariantType;

    #[test]
    fn ptrcall_round_trips_engine_methods() {
        let object = objects::create("Resource");
        let set = classdb::find_method("Resource", "set_name").unwrap();
        let get = classdb::find_method("Resource", "get_name").unwrap();
        let args = TypedArgs::new(&[Var::from_str("hero")], &[VariantType::String]);
        let pointers = args.pointers();
        let mut ret = Slot::new();
        unsafe {
            let set = std::sync::Arc::as_ptr(&set).cast();
            let get = std::sync::Arc::as_ptr(&get).cast();
            object_method_bind_ptrcall(set, object, pointers.as_ptr(), std::ptr::null_mut());
            object_method_bind_ptrcall(get, object, std::ptr::null(), ret.as_mut_ptr());
            let name = typed::read(VariantType::String, ret.as_ptr());
            typed::destroy(VariantType::String, ret.as_mut_ptr());
            assert_eq!(name.text().as_deref(), Some("hero"));
        }
        objects::destroy(objects::id_of_ptr(object).unwrap());
    }

    #[test]
    fn dead_objects_read_as_absent() {
        let object = objects::create("Node");
        let id = objects::id_of_ptr(object).unwrap();
        objects::destroy(id);
        unsafe {
            assert_eq!(object_get_instance_id(object), 0);
            assert!(object_get_instance_from_id(id).is_null());
            let mut word = 0usize;
            assert_eq!(object_get_class_name(object, (&mut word as *mut usize).cast()), 0);
        }
    }

    #[test]
    fn cast_follows_inheritance() {
        let object = objects::create("Node");
        let node = Name::intern("Node");
        let resource = Name::intern("Resource");
        let object_name = Name::intern("Object");
        unsafe {
            assert_eq!(object_cast_to(object, (&node.word() as *const usize).cast()), object);
            let class_tag = (&object_name.word() as *const usize).cast();
            assert_eq!(object_cast_to(object, class_tag), object);
            assert!(object_cast_to(object, (&resource.word() as *const usize).cast()).is_null());
        }
        objects::destroy(objects::id_of_ptr(object).unwrap());
    }
}

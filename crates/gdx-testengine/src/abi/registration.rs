use gdx_sys::{
    Bool, ClassCreationInfo, ClassLibraryPtr, ClassMethodInfo, ConstStringNamePtr, Int,
    MethodBindPtr, MethodFlags, ObjectPtr, PropertyInfo, VariantType,
};

use super::{name_arg, optional_name_arg};
use crate::classdb::{self, ArgType, ConstantRecord, ExtensionMethod, PropertyRecord};
use crate::error::code;
use crate::hooks::report_error;

pub(super) unsafe extern "C" fn classdb_construct_object(
    class_name: ConstStringNamePtr,
) -> ObjectPtr {
    let class = unsafe { name_arg(class_name) };
    classdb::construct(class.as_str()).unwrap_or_else(|message| {
        report_error(message);
        std::ptr::null_mut()
    })
}

pub(super) unsafe extern "C" fn classdb_get_method_bind(
    class_name: ConstStringNamePtr,
    method: ConstStringNamePtr,
    hash: Int,
) -> MethodBindPtr {
    let (class, method) = unsafe { (name_arg(class_name), name_arg(method)) };
    match classdb::method_bind(class.as_str(), method.as_str(), hash) {
        Some(info) => std::sync::Arc::as_ptr(&info).cast(),
        None => std::ptr::null(),
    }
}

pub(super) unsafe extern "C" fn classdb_get_method_hash(
    class_name: ConstStringNamePtr,
    method: ConstStringNamePtr,
) -> Int {
    let (class, method) = unsafe { (name_arg(class_name), name_arg(method)) };
    classdb::method_hash(class.as_str(), method.as_str())
}

pub(super) unsafe extern "C" fn classdb_register_extension_class(
    library: ClassLibraryPtr,
    class_name: ConstStringNamePtr,
    parent: ConstStringNamePtr,
    info: *const ClassCreationInfo,
) -> Int {
    let (name, parent) = unsafe { (name_arg(class_name), name_arg(parent)) };
    let Some(info) = (unsafe { info.as_ref() }) else {
        report_error(format!("class `{}` registered without creation info", name.as_str()));
        return code::ERR_INVALID_PARAMETER;
    };
    classdb::register_extension_class(library as usize, name.as_str(), parent.as_str(), *info)
}

/// Declared type of an argument or return value.
unsafe fn arg_type(info: &PropertyInfo) -> ArgType {
    let kind = VariantType::from_sys(info.kind);
    let class = if kind == VariantType::Object {
        unsafe { optional_name_arg(info.class_name) }.map(|name| name.as_str().to_string())
    } else {
        None
    };
    ArgType { kind, class }
}

pub(super) unsafe extern "C" fn classdb_register_extension_class_method(
    _library: ClassLibraryPtr,
    class_name: ConstStringNamePtr,
    info: *const ClassMethodInfo,
) -> Int {
    let class = unsafe { name_arg(class_name) };
    let Some(info) = (unsafe { info.as_ref() }) else {
        return code::ERR_INVALID_PARAMETER;
    };
    let args = if info.arguments_info.is_null() {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(info.arguments_info, info.argument_count as usize) }
            .iter()
            .map(|arg| unsafe { arg_type(arg) })
            .collect()
    };
    let ret = if info.has_return_value != 0 {
        let declared = unsafe { info.return_value_info.as_ref() };
        Some(declared.map_or_else(ArgType::any, |ret| unsafe { arg_type(ret) }))
    } else {
        None
    };
    let method = ExtensionMethod {
        name: unsafe { name_arg(info.name) }.as_str().to_string(),
        userdata: info.method_userdata as usize,
        call: info.call_func,
        ptrcall: info.ptrcall_func,
        flags: MethodFlags::from_bits_truncate(info.method_flags),
        args,
        ret,
    };
    classdb::register_extension_method(class.as_str(), method)
}

pub(super) unsafe extern "C" fn classdb_register_extension_class_property(
    _library: ClassLibraryPtr,
    class_name: ConstStringNamePtr,
    info: *const PropertyInfo,
    setter: ConstStringNamePtr,
    getter: ConstStringNamePtr,
) -> Int {
    let class = unsafe { name_arg(class_name) };
    let Some(info) = (unsafe { info.as_ref() }) else {
        return code::ERR_INVALID_PARAMETER;
    };
    let ArgType { kind, class: class_hint } = unsafe { arg_type(info) };
    let record = PropertyRecord {
        name: unsafe { name_arg(info.name) }.as_str().to_string(),
        kind,
        class: class_hint,
        setter: unsafe { name_arg(setter) }.as_str().to_string(),
        getter: unsafe { name_arg(getter) }.as_str().to_string(),
        usage: info.usage,
    };
    classdb::register_extension_property(class.as_str(), record)
}

pub(super) unsafe extern "C" fn classdb_register_extension_class_integer_constant(
    _library: ClassLibraryPtr,
    class_name: ConstStringNamePtr,
    enum_name: ConstStringNamePtr,
    constant_name: ConstStringNamePtr,
    value: Int,
    is_bitfield: Bool,
) -> Int {
    let class = unsafe { name_arg(class_name) };
    let constant = ConstantRecord {
        enum_name: unsafe { name_arg(enum_name) }.as_str().to_string(),
        name: unsafe { name_arg(constant_name) }.as_str().to_string(),
        value,
        is_bitfield: is_bitfield != 0,
    };
    classdb::register_extension_constant(class.as_str(), constant)
}

pub(super) unsafe extern "C" fn classdb_unregister_extension_class(
    library: ClassLibraryPtr,
    class_name: ConstStringNamePtr,
) -> Int {
    let class = unsafe { name_arg(class_name) };
    classdb::unregister_extension_class(library as usize, class.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Name;

    fn name_word(text: &str) -> usize {
        Name::intern(text).word()
    }

    #[test]
    fn method_binds_check_the_hash() {
        let class = name_word("Object");
        let method = name_word("get_class");
        unsafe {
            let class = (&class as *const usize).cast();
            let method = (&method as *const usize).cast();
            let hash = classdb_get_method_hash(class, method);
            assert_eq!(hash, 3142391475);
            assert!(!classdb_get_method_bind(class, method, hash).is_null());
            assert!(classdb_get_method_bind(class, method, hash + 1).is_null());
        }
    }

    #[test]
    fn abstract_classes_do_not_construct() {
        let class = name_word("FileAccess");
        let object = unsafe { classdb_construct_object((&class as *const usize).cast()) };
        assert!(object.is_null());
    }
}

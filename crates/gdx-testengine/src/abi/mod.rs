//! The `EngineInterface` table handed to extension entry points.
//!
//! Every entry decodes raw pointers into the engine's own values and forwards
//! to the object table, the class database or the value layer. No lock is
//! held while an entry calls back into the extension.

mod containers;
mod runtime;
mod object;
mod registration;
mod variant;

use gdx_sys::{ConstStringNamePtr, EngineInterface};

use crate::value::{Name, Var};

/// Decode a `StringName` argument; null reads as the empty name.
///
/// # Safety
///
/// `ptr` must be null or point to a string name produced by this engine.
pub(crate) unsafe fn name_arg(ptr: ConstStringNamePtr) -> Name {
    unsafe { optional_name_arg(ptr) }.unwrap_or_else(|| Name::intern(""))
}

/// Like [`name_arg`], with null and the empty name mapping to `None`.
///
/// # Safety
///
/// As for [`name_arg`].
pub(crate) unsafe fn optional_name_arg(ptr: ConstStringNamePtr) -> Option<Name> {
    if ptr.is_null() {
        return None;
    }
    let word = unsafe { *ptr.cast::<usize>() };
    if word == 0 {
        return None;
    }
    let name = unsafe { Name::from_word(word) };
    (!name.as_str().is_empty()).then_some(name)
}

/// Borrow the variant at `ptr`.
///
/// # Safety
///
/// `ptr` must point to an initialized variant that outlives `'a`.
pub(crate) unsafe fn var_arg<'a>(ptr: *const std::ffi::c_void) -> &'a Var {
    unsafe { &*ptr.cast::<Var>() }
}

/// Place `value` into uninitialized variant storage.
///
/// # Safety
///
/// `dst` must be writable storage for a variant; old contents are not dropped.
pub(crate) unsafe fn write_var(dst: *mut std::ffi::c_void, value: Var) {
    if !dst.is_null() {
        unsafe { std::ptr::write(dst.cast::<Var>(), value) };
    }
}

/// Place a string name word into uninitialized storage.
///
/// # Safety
///
/// `dst` must be writable storage for one word.
pub(crate) unsafe fn write_name(dst: *mut std::ffi::c_void, name: Name) {
    if !dst.is_null() {
        unsafe { *dst.cast::<usize>() = name.word() };
    }
}

pub(crate) unsafe fn c_text(ptr: *const std::ffi::c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { std::ffi::CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// The table passed to entry points.
pub static INTERFACE: EngineInterface = EngineInterface {
    get_version: Some(runtime::get_version),
    mem_alloc: Some(runtime::mem_alloc),
    mem_free: Some(runtime::mem_free),
    print_error: Some(runtime::print_error),
    print_warning: Some(runtime::print_warning),

    variant_new_copy: Some(variant::variant_new_copy),
    variant_new_nil: Some(variant::variant_new_nil),
    variant_destroy: Some(variant::variant_destroy),
    variant_get_type: Some(variant::variant_get_type),
    variant_booleanize: Some(variant::variant_booleanize),
    variant_equal: Some(variant::variant_equal),
    variant_hash: Some(variant::variant_hash),
    variant_stringify: Some(variant::variant_stringify),
    variant_can_convert_strict: Some(variant::variant_can_convert_strict),
    variant_construct: Some(variant::variant_construct),
    get_variant_from_type_constructor: Some(variant::get_variant_from_type_constructor),
    get_variant_to_type_constructor: Some(variant::get_variant_to_type_constructor),
    variant_get_ptr_constructor: Some(variant::variant_get_ptr_constructor),
    variant_get_ptr_destructor: Some(variant::variant_get_ptr_destructor),
    variant_get_ptr_builtin_method: Some(variant::variant_get_ptr_builtin_method),
    variant_get_ptr_utility_function: Some(variant::variant_get_ptr_utility_function),

    string_new_with_utf8_chars_and_len: Some(containers::string_new_with_utf8_chars_and_len),
    string_to_utf8_chars: Some(containers::string_to_utf8_chars),
    string_name_new_with_utf8_chars_and_len: Some(
        containers::string_name_new_with_utf8_chars_and_len,
    ),

    node_path_get_name_count: Some(containers::node_path_get_name_count),
    node_path_get_name: Some(containers::node_path_get_name),
    node_path_get_subname_count: Some(containers::node_path_get_subname_count),
    node_path_get_subname: Some(containers::node_path_get_subname),
    node_path_is_absolute: Some(containers::node_path_is_absolute),

    array_size: Some(containers::array_size),
    array_operator_index: Some(containers::array_operator_index),
    array_set: Some(containers::array_set),
    array_push_back: Some(containers::array_push_back),
    array_resize: Some(containers::array_resize),
    array_remove_at: Some(containers::array_remove_at),
    array_clear: Some(containers::array_clear),
    array_duplicate: Some(containers::array_duplicate),
    array_set_typed: Some(containers::array_set_typed),
    array_get_typed_builtin: Some(containers::array_get_typed_builtin),

    dictionary_size: Some(containers::dictionary_size),
    dictionary_operator_index: Some(containers::dictionary_operator_index),
    dictionary_get: Some(containers::dictionary_get),
    dictionary_erase: Some(containers::dictionary_erase),
    dictionary_clear: Some(containers::dictionary_clear),
    dictionary_keys: Some(containers::dictionary_keys),
    dictionary_values: Some(containers::dictionary_values),

    packed_array_size: Some(containers::packed_array_size),
    packed_array_resize: Some(containers::packed_array_resize),
    packed_array_operator_index: Some(containers::packed_array_operator_index),
    packed_array_operator_index_const: Some(containers::packed_array_operator_index_const),
    packed_array_push_back: Some(containers::packed_array_push_back),

    object_method_bind_call: Some(object::object_method_bind_call),
    object_method_bind_ptrcall: Some(object::object_method_bind_ptrcall),
    object_destroy: Some(object::object_destroy),
    global_get_singleton: Some(object::global_get_singleton),
    object_get_instance_id: Some(object::object_get_instance_id),
    object_get_instance_from_id: Some(object::object_get_instance_from_id),
    object_get_class_name: Some(object::object_get_class_name),
    object_cast_to: Some(object::object_cast_to),
    object_set_instance: Some(object::object_set_instance),
    object_get_instance: Some(object::object_get_instance),
    ref_reference: Some(object::ref_reference),
    ref_unreference: Some(object::ref_unreference),
    ref_get_reference_count: Some(object::ref_get_reference_count),

    classdb_construct_object: Some(registration::classdb_construct_object),
    classdb_get_method_bind: Some(registration::classdb_get_method_bind),
    classdb_get_method_hash: Some(registration::classdb_get_method_hash),
    classdb_register_extension_class: Some(registration::classdb_register_extension_class),
    classdb_register_extension_class_method: Some(
        registration::classdb_register_extension_class_method,
    ),
    classdb_register_extension_class_property: Some(
        registration::classdb_register_extension_class_property,
    ),
    classdb_register_extension_class_integer_constant: Some(
        registration::classdb_register_extension_class_integer_constant,
    ),
    classdb_unregister_extension_class: Some(registration::classdb_unregister_extension_class),
};

pub use self::runtime::override_version;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_is_provided() {
        assert!(INTERFACE.missing_entries().is_empty());
    }

    #[test]
    fn null_names_read_as_empty() {
        let name = unsafe { name_arg(std::ptr::null()) };
        assert_eq!(name.as_str(), "");
        let word = Name::intern("ready").word();
        let read = unsafe { optional_name_arg((&word as *const usize).cast()) };
        assert_eq!(read.map(Name::as_str), Some("ready"));
    }
}

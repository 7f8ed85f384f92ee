use std::mem::MaybeUninit;

use crate::types::{ConstStringNamePtr, Int, OpaqueStringName};
use crate::variant_type::VariantType;

/// Run `f` with a temporary engine `StringName` built from `name`.
///
/// Lookups by name (method binds, classes, singletons) take `StringName`
/// pointers; this keeps the temporary on the stack and destroys it afterwards.
pub fn with_string_name<R>(name: &str, f: impl FnOnce(ConstStringNamePtr) -> R) -> R {
    let construct = crate::interface_fn!(string_name_new_with_utf8_chars_and_len);
    let mut storage = MaybeUninit::<OpaqueStringName>::uninit();

    unsafe {
        construct(
            storage.as_mut_ptr().cast(),
            name.as_ptr().cast(),
            name.len() as Int,
        );
    }
    let mut storage = unsafe { storage.assume_init() };
    let result = f((&storage as *const OpaqueStringName).cast());

    let get_destructor = crate::interface_fn!(variant_get_ptr_destructor);
    if let Some(destroy) = unsafe { get_destructor(VariantType::StringName.sys()) } {
        unsafe { destroy((&mut storage as *mut OpaqueStringName).cast()) };
    }
    result
}

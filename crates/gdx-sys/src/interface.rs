//! The function-pointer table handed to the entry point.

use std::ffi::{c_char, c_void};

use crate::extension::{ClassCreationInfo, ClassMethodInfo, PropertyInfo};
use crate::types::*;
use crate::variant_type::CallError;

macro_rules! engine_interface {
    (
        $(
            $(#[$meta:meta])*
            $name:ident : fn($($arg:ident : $arg_ty:ty),* $(,)?) $(-> $ret:ty)?;
        )*
    ) => {
        /// Every entry the engine exposes to extensions.
        ///
        /// All entries are optional at the type level; [`EngineInterface::missing_entries`]
        /// reports the ones an engine build failed to provide.
        #[repr(C)]
        #[derive(Clone, Copy)]
        pub struct EngineInterface {
            $(
                $(#[$meta])*
                pub $name: Option<unsafe extern "C" fn($($arg: $arg_ty),*) $(-> $ret)?>,
            )*
        }

        impl EngineInterface {
            /// An interface with every entry unset.
            pub const EMPTY: EngineInterface = EngineInterface {
                $( $name: None, )*
            };

            /// Names of entries that are not set.
            pub fn missing_entries(&self) -> Vec<&'static str> {
                let mut missing = Vec::new();
                $(
                    if self.$name.is_none() {
                        missing.push(stringify!($name));
                    }
                )*
                missing
            }

            /// Number of entries in the table.
            pub const ENTRY_COUNT: usize = [$(stringify!($name)),*].len();
        }

        impl std::fmt::Debug for EngineInterface {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut s = f.debug_struct("EngineInterface");
                $( s.field(stringify!($name), &self.$name.is_some()); )*
                s.finish()
            }
        }
    };
}

engine_interface! {
    // ---------------------------------------------------------------
    // Core
    // ---------------------------------------------------------------
    get_version: fn(version: *mut EngineVersion);
    mem_alloc: fn(bytes: usize) -> *mut c_void;
    mem_free: fn(ptr: *mut c_void);
    print_error: fn(
        description: *const c_char,
        function: *const c_char,
        file: *const c_char,
        line: i32,
        notify_editor: Bool,
    );
    print_warning: fn(
        description: *const c_char,
        function: *const c_char,
        file: *const c_char,
        line: i32,
        notify_editor: Bool,
    );

    // ---------------------------------------------------------------
    // Variant
    // ---------------------------------------------------------------
    variant_new_copy: fn(dst: UninitVariantPtr, src: ConstVariantPtr);
    variant_new_nil: fn(dst: UninitVariantPtr);
    variant_destroy: fn(value: VariantPtr);
    variant_get_type: fn(value: ConstVariantPtr) -> VariantTypeRaw;
    variant_booleanize: fn(value: ConstVariantPtr) -> Bool;
    variant_equal: fn(a: ConstVariantPtr, b: ConstVariantPtr) -> Bool;
    variant_hash: fn(value: ConstVariantPtr) -> Int;
    variant_stringify: fn(value: ConstVariantPtr, out: UninitStringPtr);
    /// Whether the engine's conversion table supports `from -> to`.
    variant_can_convert_strict: fn(from: VariantTypeRaw, to: VariantTypeRaw) -> Bool;
    variant_construct: fn(
        kind: VariantTypeRaw,
        dst: UninitVariantPtr,
        args: *const ConstVariantPtr,
        argc: i32,
        error: *mut CallError,
    );
    get_variant_from_type_constructor: fn(kind: VariantTypeRaw) -> VariantFromTypeConstructorFunc;
    get_variant_to_type_constructor: fn(kind: VariantTypeRaw) -> TypeFromVariantConstructorFunc;
    variant_get_ptr_constructor: fn(kind: VariantTypeRaw, index: i32) -> PtrConstructor;
    variant_get_ptr_destructor: fn(kind: VariantTypeRaw) -> PtrDestructor;
    variant_get_ptr_builtin_method: fn(
        kind: VariantTypeRaw,
        method: ConstStringNamePtr,
        hash: Int,
    ) -> PtrBuiltInMethod;
    variant_get_ptr_utility_function: fn(name: ConstStringNamePtr, hash: Int) -> PtrUtilityFunction;

    // ---------------------------------------------------------------
    // Strings
    // ---------------------------------------------------------------
    string_new_with_utf8_chars_and_len: fn(
        dst: UninitStringPtr,
        contents: *const c_char,
        size: Int,
    );
    /// Copies at most `max` bytes into `buf` and returns the full UTF-8 length.
    string_to_utf8_chars: fn(value: ConstStringPtr, buf: *mut c_char, max: Int) -> Int;
    string_name_new_with_utf8_chars_and_len: fn(
        dst: UninitStringNamePtr,
        contents: *const c_char,
        size: Int,
    );

    // ---------------------------------------------------------------
    // NodePath
    // ---------------------------------------------------------------
    node_path_get_name_count: fn(path: ConstTypePtr) -> Int;
    node_path_get_name: fn(path: ConstTypePtr, index: Int, dst: UninitStringNamePtr);
    node_path_get_subname_count: fn(path: ConstTypePtr) -> Int;
    node_path_get_subname: fn(path: ConstTypePtr, index: Int, dst: UninitStringNamePtr);
    node_path_is_absolute: fn(path: ConstTypePtr) -> Bool;

    // ---------------------------------------------------------------
    // Array
    // ---------------------------------------------------------------
    array_size: fn(array: ConstTypePtr) -> Int;
    /// Null when `index` is out of bounds.
    array_operator_index: fn(array: TypePtr, index: Int) -> VariantPtr;
    array_set: fn(array: TypePtr, index: Int, value: ConstVariantPtr) -> Bool;
    array_push_back: fn(array: TypePtr, value: ConstVariantPtr) -> Bool;
    array_resize: fn(array: TypePtr, size: Int);
    array_remove_at: fn(array: TypePtr, index: Int);
    array_clear: fn(array: TypePtr);
    array_duplicate: fn(array: ConstTypePtr, deep: Bool, dst: UninitTypePtr);
    array_set_typed: fn(array: TypePtr, kind: VariantTypeRaw, class_name: ConstStringNamePtr);
    array_get_typed_builtin: fn(array: ConstTypePtr) -> VariantTypeRaw;

    // ---------------------------------------------------------------
    // Dictionary
    // ---------------------------------------------------------------
    dictionary_size: fn(dict: ConstTypePtr) -> Int;
    /// Inserts nil under `key` when absent.
    dictionary_operator_index: fn(dict: TypePtr, key: ConstVariantPtr) -> VariantPtr;
    dictionary_get: fn(dict: ConstTypePtr, key: ConstVariantPtr, dst: UninitVariantPtr) -> Bool;
    dictionary_erase: fn(dict: TypePtr, key: ConstVariantPtr) -> Bool;
    dictionary_clear: fn(dict: TypePtr);
    dictionary_keys: fn(dict: ConstTypePtr, dst: UninitTypePtr);
    dictionary_values: fn(dict: ConstTypePtr, dst: UninitTypePtr);

    // ---------------------------------------------------------------
    // Packed arrays
    // ---------------------------------------------------------------
    packed_array_size: fn(kind: VariantTypeRaw, array: ConstTypePtr) -> Int;
    packed_array_resize: fn(kind: VariantTypeRaw, array: TypePtr, size: Int) -> Int;
    /// Pointer to the element; makes the body unique first.
    packed_array_operator_index: fn(
        kind: VariantTypeRaw,
        array: TypePtr,
        index: Int,
    ) -> *mut c_void;
    packed_array_operator_index_const: fn(
        kind: VariantTypeRaw,
        array: ConstTypePtr,
        index: Int,
    ) -> *const c_void;
    packed_array_push_back: fn(kind: VariantTypeRaw, array: TypePtr, value: ConstTypePtr);

    // ---------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------
    object_method_bind_call: fn(
        method: MethodBindPtr,
        object: ObjectPtr,
        args: *const ConstVariantPtr,
        argc: Int,
        ret: UninitVariantPtr,
        error: *mut CallError,
    );
    object_method_bind_ptrcall: fn(
        method: MethodBindPtr,
        object: ObjectPtr,
        args: *const ConstTypePtr,
        ret: TypePtr,
    );
    object_destroy: fn(object: ObjectPtr);
    global_get_singleton: fn(name: ConstStringNamePtr) -> ObjectPtr;
    object_get_instance_id: fn(object: ConstObjectPtr) -> ObjectId;
    /// Null when no live object has the id.
    object_get_instance_from_id: fn(id: ObjectId) -> ObjectPtr;
    object_get_class_name: fn(object: ConstObjectPtr, dst: UninitStringNamePtr) -> Bool;
    /// Null when the object is not an instance of `class_name`.
    object_cast_to: fn(object: ConstObjectPtr, class_name: ConstStringNamePtr) -> ObjectPtr;
    object_set_instance: fn(
        object: ObjectPtr,
        class_name: ConstStringNamePtr,
        instance: ClassInstancePtr,
    );
    /// The extension instance attached with `object_set_instance`, or null.
    object_get_instance: fn(object: ConstObjectPtr) -> ClassInstancePtr;
    ref_reference: fn(object: ObjectPtr) -> Bool;
    /// True when the count reached zero and the caller must destroy the object.
    ref_unreference: fn(object: ObjectPtr) -> Bool;
    ref_get_reference_count: fn(object: ConstObjectPtr) -> Int;

    // ---------------------------------------------------------------
    // ClassDB
    // ---------------------------------------------------------------
    classdb_construct_object: fn(class_name: ConstStringNamePtr) -> ObjectPtr;
    classdb_get_method_bind: fn(
        class_name: ConstStringNamePtr,
        method: ConstStringNamePtr,
        hash: Int,
    ) -> MethodBindPtr;
    /// Hash of the method as compiled into the engine; -1 when unknown.
    classdb_get_method_hash: fn(class_name: ConstStringNamePtr, method: ConstStringNamePtr) -> Int;
    classdb_register_extension_class: fn(
        library: ClassLibraryPtr,
        class_name: ConstStringNamePtr,
        parent: ConstStringNamePtr,
        info: *const ClassCreationInfo,
    ) -> Int;
    classdb_register_extension_class_method: fn(
        library: ClassLibraryPtr,
        class_name: ConstStringNamePtr,
        info: *const ClassMethodInfo,
    ) -> Int;
    classdb_register_extension_class_property: fn(
        library: ClassLibraryPtr,
        class_name: ConstStringNamePtr,
        info: *const PropertyInfo,
        setter: ConstStringNamePtr,
        getter: ConstStringNamePtr,
    ) -> Int;
    classdb_register_extension_class_integer_constant: fn(
        library: ClassLibraryPtr,
        class_name: ConstStringNamePtr,
        enum_name: ConstStringNamePtr,
        constant_name: ConstStringNamePtr,
        value: Int,
        is_bitfield: Bool,
    ) -> Int;
    classdb_unregister_extension_class: fn(
        library: ClassLibraryPtr,
        class_name: ConstStringNamePtr,
    ) -> Int;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_interface_reports_every_entry() {
        let missing = EngineInterface::EMPTY.missing_entries();
        assert_eq!(missing.len(), EngineInterface::ENTRY_COUNT);
        assert!(missing.contains(&"object_method_bind_ptrcall"));
    }

    #[test]
    fn debug_lists_presence() {
        let text = format!("{:?}", EngineInterface::EMPTY);
        assert!(text.contains("mem_alloc: false"));
    }
}

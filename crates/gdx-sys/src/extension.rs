//! Structures exchanged when registering extension classes.

use std::ffi::c_void;

use bitflags::bitflags;

use crate::types::*;
use crate::variant_type::CallError;

bitflags! {
    /// Usage flags attached to a property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyUsageFlags: u32 {
        const STORAGE = 1 << 1;
        const EDITOR = 1 << 2;
        const INTERNAL = 1 << 3;
        const READ_ONLY = 1 << 4;
        const DEFAULT = Self::STORAGE.bits() | Self::EDITOR.bits();
    }
}

bitflags! {
    /// Flags describing a registered method.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u32 {
        const NORMAL = 1 << 0;
        const EDITOR = 1 << 1;
        const CONST = 1 << 2;
        const VIRTUAL = 1 << 3;
        const VARARG = 1 << 4;
        const STATIC = 1 << 5;
        const DEFAULT = Self::NORMAL.bits();
    }
}

/// Description of a property or method argument.
///
/// The name pointers refer to `StringName`/`String` values owned by the
/// caller; the engine copies them during registration.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PropertyInfo {
    pub kind: VariantTypeRaw,
    pub name: ConstStringNamePtr,
    pub class_name: ConstStringNamePtr,
    pub hint: u32,
    pub hint_string: ConstStringPtr,
    pub usage: u32,
}

pub type ClassMethodCall = Option<
    unsafe extern "C" fn(
        method_userdata: *mut c_void,
        instance: ClassInstancePtr,
        args: *const ConstVariantPtr,
        argc: Int,
        ret: UninitVariantPtr,
        error: *mut CallError,
    ),
>;

pub type ClassMethodPtrCall = Option<
    unsafe extern "C" fn(
        method_userdata: *mut c_void,
        instance: ClassInstancePtr,
        args: *const ConstTypePtr,
        ret: TypePtr,
    ),
>;

/// A method registered on an extension class.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ClassMethodInfo {
    pub name: ConstStringNamePtr,
    pub method_userdata: *mut c_void,
    pub call_func: ClassMethodCall,
    pub ptrcall_func: ClassMethodPtrCall,
    pub method_flags: u32,
    pub has_return_value: Bool,
    pub return_value_info: *const PropertyInfo,
    pub argument_count: u32,
    pub arguments_info: *const PropertyInfo,
}

pub type ClassSet = Option<
    unsafe extern "C" fn(
        instance: ClassInstancePtr,
        name: ConstStringNamePtr,
        value: ConstVariantPtr,
    ) -> Bool,
>;

pub type ClassGet = Option<
    unsafe extern "C" fn(
        instance: ClassInstancePtr,
        name: ConstStringNamePtr,
        ret: UninitVariantPtr,
    ) -> Bool,
>;

pub type ClassGetPropertyList = Option<
    unsafe extern "C" fn(instance: ClassInstancePtr, count: *mut u32) -> *const PropertyInfo,
>;

pub type ClassFreePropertyList =
    Option<unsafe extern "C" fn(instance: ClassInstancePtr, list: *const PropertyInfo)>;

pub type ClassNotification = Option<unsafe extern "C" fn(instance: ClassInstancePtr, what: i32)>;

pub type ClassToString = Option<
    unsafe extern "C" fn(instance: ClassInstancePtr, is_valid: *mut Bool, out: UninitStringPtr),
>;

pub type ClassCreateInstance =
    Option<unsafe extern "C" fn(class_userdata: *mut c_void) -> ObjectPtr>;

pub type ClassFreeInstance =
    Option<unsafe extern "C" fn(class_userdata: *mut c_void, instance: ClassInstancePtr)>;

pub type ClassGetVirtualCallData = Option<
    unsafe extern "C" fn(class_userdata: *mut c_void, name: ConstStringNamePtr) -> *mut c_void,
>;

pub type ClassCallVirtualWithData = Option<
    unsafe extern "C" fn(
        instance: ClassInstancePtr,
        name: ConstStringNamePtr,
        virtual_userdata: *mut c_void,
        args: *const ConstTypePtr,
        ret: TypePtr,
    ),
>;

/// Callback table for an extension class.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ClassCreationInfo {
    pub is_virtual: Bool,
    pub is_abstract: Bool,
    pub set_func: ClassSet,
    pub get_func: ClassGet,
    pub get_property_list_func: ClassGetPropertyList,
    pub free_property_list_func: ClassFreePropertyList,
    pub notification_func: ClassNotification,
    pub to_string_func: ClassToString,
    pub create_instance_func: ClassCreateInstance,
    pub free_instance_func: ClassFreeInstance,
    pub get_virtual_call_data_func: ClassGetVirtualCallData,
    pub call_virtual_with_data_func: ClassCallVirtualWithData,
    pub class_userdata: *mut c_void,
}

/// Filled by the entry point to register per-level hooks.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Initialization {
    pub minimum_initialization_level: u32,
    pub userdata: *mut c_void,
    pub initialize: Option<unsafe extern "C" fn(userdata: *mut c_void, level: u32)>,
    pub deinitialize: Option<unsafe extern "C" fn(userdata: *mut c_void, level: u32)>,
}

/// Signature of the symbol exported by an extension library.
pub type InitializationFunction = unsafe extern "C" fn(
    interface: *const crate::EngineInterface,
    library: ClassLibraryPtr,
    init: *mut Initialization,
) -> Bool;

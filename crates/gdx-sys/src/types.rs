//! Pointer aliases and opaque layouts shared with the engine.

use std::ffi::c_void;

pub type Bool = u8;
pub type Int = i64;
pub type ObjectId = u64;
pub type VariantTypeRaw = u32;

pub const TRUE: Bool = 1;
pub const FALSE: Bool = 0;

pub type VariantPtr = *mut c_void;
pub type ConstVariantPtr = *const c_void;
pub type UninitVariantPtr = *mut c_void;

pub type StringPtr = *mut c_void;
pub type ConstStringPtr = *const c_void;
pub type UninitStringPtr = *mut c_void;

pub type StringNamePtr = *mut c_void;
pub type ConstStringNamePtr = *const c_void;
pub type UninitStringNamePtr = *mut c_void;

pub type ObjectPtr = *mut c_void;
pub type ConstObjectPtr = *const c_void;

pub type TypePtr = *mut c_void;
pub type ConstTypePtr = *const c_void;
pub type UninitTypePtr = *mut c_void;

pub type MethodBindPtr = *const c_void;
pub type ClassInstancePtr = *mut c_void;
pub type ClassLibraryPtr = *mut c_void;

// Opaque body sizes, in machine words.
pub const VARIANT_WORDS: usize = 3;
pub const STRING_WORDS: usize = 1;
pub const STRING_NAME_WORDS: usize = 1;
pub const NODE_PATH_WORDS: usize = 1;
pub const ARRAY_WORDS: usize = 1;
pub const DICTIONARY_WORDS: usize = 1;
pub const PACKED_ARRAY_WORDS: usize = 2;
pub const CALLABLE_WORDS: usize = 2;
pub const SIGNAL_WORDS: usize = 2;

/// Raw storage for an engine variant: a kind tag word and two payload words.
pub type OpaqueVariant = [usize; VARIANT_WORDS];
pub type OpaqueString = [usize; STRING_WORDS];
pub type OpaqueStringName = [usize; STRING_NAME_WORDS];
pub type OpaqueNodePath = [usize; NODE_PATH_WORDS];
pub type OpaqueArray = [usize; ARRAY_WORDS];
pub type OpaqueDictionary = [usize; DICTIONARY_WORDS];
pub type OpaquePackedArray = [usize; PACKED_ARRAY_WORDS];
pub type OpaqueCallable = [usize; CALLABLE_WORDS];
pub type OpaqueSignal = [usize; SIGNAL_WORDS];

/// Constructor indices understood by `variant_get_ptr_constructor`.
pub mod ctor {
    /// Default-constructs the kind.
    pub const DEFAULT: i32 = 0;
    /// Copy constructor; one argument of the same kind.
    pub const COPY: i32 = 1;
    /// `StringName`/`NodePath` from `String`, `String` from `StringName`,
    /// `Callable` from (object, method name), `Signal` from (object, signal name).
    pub const FROM_STRING: i32 = 2;
    /// `String` from `NodePath`.
    pub const STRING_FROM_NODE_PATH: i32 = 3;
}

/// Version reported by the engine through `get_version`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub string: *const std::ffi::c_char,
}

impl Default for EngineVersion {
    fn default() -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 0,
            string: std::ptr::null(),
        }
    }
}

/// Variant-to-value converter returned by `get_variant_to_type_constructor`.
pub type TypeFromVariantConstructorFunc =
    Option<unsafe extern "C" fn(dst: UninitTypePtr, src: VariantPtr)>;

/// Value-to-variant converter returned by `get_variant_from_type_constructor`.
pub type VariantFromTypeConstructorFunc =
    Option<unsafe extern "C" fn(dst: UninitVariantPtr, src: TypePtr)>;

pub type PtrConstructor =
    Option<unsafe extern "C" fn(dst: UninitTypePtr, args: *const ConstTypePtr)>;

pub type PtrDestructor = Option<unsafe extern "C" fn(value: TypePtr)>;

pub type PtrBuiltInMethod = Option<
    unsafe extern "C" fn(base: TypePtr, args: *const ConstTypePtr, ret: TypePtr, argc: i32),
>;

pub type PtrUtilityFunction =
    Option<unsafe extern "C" fn(ret: TypePtr, args: *const ConstTypePtr, argc: i32)>;

//! Raw ABI declarations for the Host Engine extension interface.
//!
//! This crate is the lowest layer of gdx. It contains:
//! - pointer aliases and opaque sizes for values crossing the ABI ([`types`])
//! - the variant kind table and call error structures ([`variant_type`])
//! - structures handed to the engine when registering extension classes ([`extension`])
//! - the function-pointer table the engine passes to the entry point ([`interface`])
//! - the process-global, write-once storage of that table ([`initialize`], [`interface()`])
//!
//! Nothing here is safe to use directly; the `gdx` crate builds the safe layer
//! on top.
//!
//! # Example
//!
//! ```ignore
//! // Inside an entry point:
//! unsafe { gdx_sys::initialize(interface, library)? };
//!
//! let destroy = gdx_sys::interface_fn!(object_destroy);
//! unsafe { destroy(object) };
//! ```

#![allow(non_camel_case_types)]

mod binding;
pub mod extension;
pub mod interface;
mod names;
pub mod types;
pub mod variant_type;

pub use binding::{
    BindingError, initialize, interface, is_initialized, library, missing_entry, try_interface,
};
pub use extension::*;
pub use interface::EngineInterface;
pub use names::with_string_name;
pub use types::*;
pub use variant_type::{CallError, CallErrorType, InitializationLevel, VariantType};

/// Floating point type used by vector and matrix layouts.
///
/// Engine builds come in single and double precision flavours; the bridge must
/// be compiled to match the engine it is loaded into.
#[cfg(not(feature = "double-precision"))]
pub type real = f32;

/// Floating point type used by vector and matrix layouts.
#[cfg(feature = "double-precision")]
pub type real = f64;

/// Name of the manifest build configuration matching [`real`] and the target
/// pointer width.
pub const BUILD_CONFIGURATION: &str = match (
    cfg!(feature = "double-precision"),
    cfg!(target_pointer_width = "64"),
) {
    (false, true) => "float_64",
    (false, false) => "float_32",
    (true, true) => "double_64",
    (true, false) => "double_32",
};

/// Fetch an entry of the global [`EngineInterface`].
///
/// Expands to the unwrapped function pointer. Startup validates that every
/// entry is present, so a missing entry here is a broken engine build.
#[macro_export]
macro_rules! interface_fn {
    ($name:ident) => {{
        match $crate::interface().$name {
            Some(f) => f,
            None => $crate::missing_entry(stringify!($name)),
        }
    }};
}

/// Compile-time layout check.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: () = assert!(::std::mem::size_of::<$ty>() == $size);
    };
}

static_assert_size!(types::OpaqueVariant, 3 * std::mem::size_of::<usize>());
static_assert_size!(CallError, 12);

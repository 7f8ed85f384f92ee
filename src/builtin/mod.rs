//! Engine builtin value types.
//!
//! Plain-data kinds (vectors, rects, transforms, colors, RIDs) are
//! `#[repr(C)]` structs with the engine's layout and travel by value.
//! Everything else holds an opaque engine body: the bridge copies,
//! defaults and destroys it only through the engine's per-kind constructor
//! and destructor entries, and never reads it.

mod array;
mod callable;
mod dictionary;
mod math;
mod packed;
mod string;

use std::mem::MaybeUninit;

use gdx_registry::{ConstructorFn, DestructorFn};
use gdx_sys::{ConstTypePtr, VariantType};
use thiserror::Error;

pub use array::{Array, ArrayElement, ArrayIter, TypedArray};
pub use callable::{Callable, Signal};
pub use dictionary::{Dictionary, DictionaryIter};
pub use math::{
    Aabb, Basis, Color, Plane, Projection, Quaternion, Rect2, Rect2i, Rid, Transform2D, Transform3D,
    Vector2, Vector2i, Vector3, Vector3i, Vector4, Vector4i,
};
pub use packed::{
    PackedArray, PackedByteArray, PackedColorArray, PackedElement, PackedFloat32Array,
    PackedFloat64Array, PackedInt32Array, PackedInt64Array, PackedStringArray, PackedVector2Array,
    PackedVector3Array,
};
pub use string::{GString, NodePath, StringName};

/// Errors from container accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("index {index} is out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("typed array holds `{}`, got `{}`", .expected.name(), .actual.name())]
    ElementType { expected: VariantType, actual: VariantType },
}

/// Constructor `index` of `kind`.
///
/// Default and copy constructors of every opaque kind are checked during
/// startup, so a miss here means the bridge is used before it initialized.
pub(crate) fn constructor(kind: VariantType, index: i32) -> ConstructorFn {
    match gdx_registry::cache().resolve_constructor(kind, index) {
        Ok(constructor) => constructor,
        Err(error) => panic!("{error}"),
    }
}

pub(crate) fn destructor(kind: VariantType) -> Option<DestructorFn> {
    gdx_registry::cache().destructor(kind)
}

/// Run constructor `index` of `kind` into fresh storage of type `T`.
///
/// # Safety
///
/// `T` must have the layout of `kind` and `args` must match what the
/// constructor reads.
pub(crate) unsafe fn construct<T>(kind: VariantType, index: i32, args: &[ConstTypePtr]) -> T {
    let construct = constructor(kind, index);
    let mut value = MaybeUninit::<T>::uninit();
    unsafe {
        construct(value.as_mut_ptr().cast(), args.as_ptr());
        value.assume_init()
    }
}

/// Drop, clone, default and codec impls for an opaque builtin whose only
/// field is `opaque`.
macro_rules! opaque_builtin {
    (impl [$($generics:tt)*] $ty:ty => $kind:expr) => {
        impl<$($generics)*> $ty {
            /// Pointer to the engine body.
            pub fn sys(&self) -> $crate::sys::ConstTypePtr {
                (self as *const Self).cast()
            }

            pub fn sys_mut(&mut self) -> $crate::sys::TypePtr {
                (self as *mut Self).cast()
            }
        }

        impl<$($generics)*> Drop for $ty {
            fn drop(&mut self) {
                if let Some(destroy) = $crate::builtin::destructor($kind) {
                    unsafe { destroy(self.sys_mut()) };
                }
            }
        }

        impl<$($generics)*> Clone for $ty {
            fn clone(&self) -> Self {
                unsafe { $crate::builtin::construct($kind, $crate::sys::ctor::COPY, &[self.sys()]) }
            }
        }

        impl<$($generics)*> Default for $ty {
            fn default() -> Self {
                unsafe { $crate::builtin::construct($kind, $crate::sys::ctor::DEFAULT, &[]) }
            }
        }

        $crate::meta::impl_opaque_codec!([$($generics)*] $ty => $kind);
    };
    ($ty:ty => $kind:expr) => {
        $crate::builtin::opaque_builtin!(impl [] $ty => $kind);
        $crate::meta::impl_variant_via_codec!($ty);
    };
}

pub(crate) use opaque_builtin;

/// Kinds whose default and copy constructors and destructor must resolve
/// before any builtin is used.
pub(crate) const OPAQUE_KINDS: &[VariantType] = &[
    VariantType::String,
    VariantType::StringName,
    VariantType::NodePath,
    VariantType::Callable,
    VariantType::Signal,
    VariantType::Dictionary,
    VariantType::Array,
    VariantType::PackedByteArray,
    VariantType::PackedInt32Array,
    VariantType::PackedInt64Array,
    VariantType::PackedFloat32Array,
    VariantType::PackedFloat64Array,
    VariantType::PackedStringArray,
    VariantType::PackedVector2Array,
    VariantType::PackedVector3Array,
    VariantType::PackedColorArray,
];

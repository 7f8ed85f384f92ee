//! Codecs between Rust values, typed storage and variants.
//!
//! Typed storage is what pointer calls exchange: `i64` for every integer,
//! `f64` for every float, a byte for `bool`, the raw layout for math types,
//! body words for engine-managed kinds and a whole variant where a signature
//! says `Variant`. [`PtrCodec`] moves values in and out of it with the
//! ownership rules each direction needs:
//!
//! | direction                          | method            | ownership            |
//! |------------------------------------|-------------------|----------------------|
//! | outbound argument                  | `write_arg`       | borrowed, bitwise    |
//! | inbound argument (virtual, method) | `from_arg_ptr`    | copied, engine keeps |
//! | return slot after an outbound call | `from_return_slot`| taken over           |
//! | return slot of an inbound call     | `write_return`    | moved to the engine  |
//!
//! Object slots follow the same rule: an argument slot borrows the object,
//! while a return slot holding a reference counted object carries one
//! reference that moves with the value.

use gdx_sys::{ConstTypePtr, TypePtr, VariantType};

use crate::variant::{Variant, VariantError};

/// Encoding of a type in pointer-call storage.
///
/// # Safety
///
/// `SIZE` must cover everything `write_arg` and `write_return` write, and
/// the four methods must agree with the engine's layout for
/// `VARIANT_TYPE`.
pub unsafe trait PtrCodec: Sized {
    /// Kind the value travels as; `Nil` means a whole variant.
    const VARIANT_TYPE: VariantType;

    /// Bytes the value occupies in typed storage.
    const SIZE: usize;

    /// Class name reported in property and argument descriptions.
    const CLASS_NAME: Option<&'static str> = None;

    /// Write a borrowed copy into argument storage.
    ///
    /// # Safety
    ///
    /// `dst` must be writable and aligned for `SIZE` bytes.
    unsafe fn write_arg(&self, dst: TypePtr);

    /// Copy a value out of storage the engine keeps ownership of.
    ///
    /// # Safety
    ///
    /// `src` must hold an initialized value of this kind.
    unsafe fn from_arg_ptr(src: ConstTypePtr) -> Self;

    /// Take over a value the engine placed into a return slot.
    ///
    /// # Safety
    ///
    /// `src` must hold an initialized value of this kind that nothing else
    /// will release.
    unsafe fn from_return_slot(src: TypePtr) -> Self;

    /// Move the value into an uninitialized return slot.
    ///
    /// # Safety
    ///
    /// `dst` must be writable and aligned for `SIZE` bytes; for `SIZE == 0`
    /// it may be null.
    unsafe fn write_return(self, dst: TypePtr);
}

/// Conversion to an owned variant.
pub trait ToVariant {
    fn to_variant(&self) -> Variant;
}

/// Checked conversion out of a variant.
pub trait FromVariant: Sized {
    fn try_from_variant(variant: &Variant) -> Result<Self, VariantError>;
}

impl<T: ToVariant + ?Sized> ToVariant for &T {
    fn to_variant(&self) -> Variant {
        (**self).to_variant()
    }
}

/// Scratch storage big enough for any typed value.
#[repr(C, align(16))]
pub(crate) struct Scratch([u64; 16]);

impl Scratch {
    pub(crate) fn new() -> Self {
        Scratch([0; 16])
    }

    pub(crate) fn as_mut_ptr(&mut self) -> TypePtr {
        self.0.as_mut_ptr().cast()
    }
}

/// Variant holding a copy of `value`, built through the engine's
/// from-type converter.
pub(crate) fn codec_to_variant<T: PtrCodec>(value: &T) -> Variant {
    let mut scratch = Scratch::new();
    unsafe {
        value.write_arg(scratch.as_mut_ptr());
        Variant::from_type_storage(T::VARIANT_TYPE, scratch.as_mut_ptr())
    }
}

/// Value of kind `T::VARIANT_TYPE` extracted through the engine's to-type
/// converter; other kinds are rejected without conversion.
pub(crate) fn codec_from_variant<T: PtrCodec>(variant: &Variant) -> Result<T, VariantError> {
    let actual = variant.get_type();
    if actual != T::VARIANT_TYPE {
        return Err(VariantError::TypeMismatch {
            expected: T::VARIANT_TYPE,
            actual,
        });
    }
    let mut scratch = Scratch::new();
    unsafe {
        variant.write_to_type_storage(T::VARIANT_TYPE, scratch.as_mut_ptr());
        Ok(T::from_return_slot(scratch.as_mut_ptr()))
    }
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! impl_int_codec {
    ($($ty:ty),*) => {$(
        unsafe impl PtrCodec for $ty {
            const VARIANT_TYPE: VariantType = VariantType::Int;
            const SIZE: usize = 8;

            unsafe fn write_arg(&self, dst: TypePtr) {
                unsafe { *dst.cast::<i64>() = *self as i64 };
            }

            unsafe fn from_arg_ptr(src: ConstTypePtr) -> Self {
                unsafe { *src.cast::<i64>() as $ty }
            }

            unsafe fn from_return_slot(src: TypePtr) -> Self {
                unsafe { Self::from_arg_ptr(src.cast_const()) }
            }

            unsafe fn write_return(self, dst: TypePtr) {
                unsafe { self.write_arg(dst) };
            }
        }

        impl ToVariant for $ty {
            fn to_variant(&self) -> Variant {
                codec_to_variant(self)
            }
        }

        impl FromVariant for $ty {
            fn try_from_variant(variant: &Variant) -> Result<Self, VariantError> {
                let wide: i64 = codec_from_variant(variant)?;
                <$ty>::try_from(wide).map_err(|_| VariantError::ConversionFailed {
                    from: VariantType::Int,
                    to: VariantType::Int,
                })
            }
        }

        impl From<$ty> for Variant {
            fn from(value: $ty) -> Self {
                value.to_variant()
            }
        }
    )*};
}

impl_int_codec!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_float_codec {
    ($($ty:ty),*) => {$(
        unsafe impl PtrCodec for $ty {
            const VARIANT_TYPE: VariantType = VariantType::Float;
            const SIZE: usize = 8;

            unsafe fn write_arg(&self, dst: TypePtr) {
                unsafe { *dst.cast::<f64>() = *self as f64 };
            }

            unsafe fn from_arg_ptr(src: ConstTypePtr) -> Self {
                unsafe { *src.cast::<f64>() as $ty }
            }

            unsafe fn from_return_slot(src: TypePtr) -> Self {
                unsafe { Self::from_arg_ptr(src.cast_const()) }
            }

            unsafe fn write_return(self, dst: TypePtr) {
                unsafe { self.write_arg(dst) };
            }
        }

        impl ToVariant for $ty {
            fn to_variant(&self) -> Variant {
                codec_to_variant(self)
            }
        }

        impl FromVariant for $ty {
            fn try_from_variant(variant: &Variant) -> Result<Self, VariantError> {
                let wide: f64 = codec_from_variant(variant)?;
                Ok(wide as $ty)
            }
        }

        impl From<$ty> for Variant {
            fn from(value: $ty) -> Self {
                value.to_variant()
            }
        }
    )*};
}

impl_float_codec!(f32, f64);

unsafe impl PtrCodec for bool {
    const VARIANT_TYPE: VariantType = VariantType::Bool;
    const SIZE: usize = 1;

    unsafe fn write_arg(&self, dst: TypePtr) {
        let value = if *self { gdx_sys::TRUE } else { gdx_sys::FALSE };
        unsafe { *dst.cast::<gdx_sys::Bool>() = value };
    }

    unsafe fn from_arg_ptr(src: ConstTypePtr) -> Self {
        unsafe { *src.cast::<gdx_sys::Bool>() != gdx_sys::FALSE }
    }

    unsafe fn from_return_slot(src: TypePtr) -> Self {
        unsafe { Self::from_arg_ptr(src.cast_const()) }
    }

    unsafe fn write_return(self, dst: TypePtr) {
        unsafe { self.write_arg(dst) };
    }
}

impl ToVariant for bool {
    fn to_variant(&self) -> Variant {
        codec_to_variant(self)
    }
}

impl FromVariant for bool {
    fn try_from_variant(variant: &Variant) -> Result<Self, VariantError> {
        codec_from_variant(variant)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        value.to_variant()
    }
}

/// No value: nothing is written or read.
unsafe impl PtrCodec for () {
    const VARIANT_TYPE: VariantType = VariantType::Nil;
    const SIZE: usize = 0;

    unsafe fn write_arg(&self, _dst: TypePtr) {}

    unsafe fn from_arg_ptr(_src: ConstTypePtr) -> Self {}

    unsafe fn from_return_slot(_src: TypePtr) -> Self {}

    unsafe fn write_return(self, _dst: TypePtr) {}
}

impl ToVariant for () {
    fn to_variant(&self) -> Variant {
        Variant::nil()
    }
}

impl FromVariant for () {
    fn try_from_variant(_variant: &Variant) -> Result<Self, VariantError> {
        Ok(())
    }
}

// ============================================================================
// Builtin helpers
// ============================================================================

/// `PtrCodec` and variant conversions for a `#[repr(C)]` plain-data type.
macro_rules! impl_pod_codec {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        unsafe impl $crate::meta::PtrCodec for $ty {
            const VARIANT_TYPE: $crate::sys::VariantType = $crate::sys::VariantType::$kind;
            const SIZE: usize = ::std::mem::size_of::<$ty>();

            unsafe fn write_arg(&self, dst: $crate::sys::TypePtr) {
                unsafe { ::std::ptr::write(dst.cast::<$ty>(), *self) };
            }

            unsafe fn from_arg_ptr(src: $crate::sys::ConstTypePtr) -> Self {
                unsafe { ::std::ptr::read(src.cast::<$ty>()) }
            }

            unsafe fn from_return_slot(src: $crate::sys::TypePtr) -> Self {
                unsafe { ::std::ptr::read(src.cast::<$ty>()) }
            }

            unsafe fn write_return(self, dst: $crate::sys::TypePtr) {
                unsafe { ::std::ptr::write(dst.cast::<$ty>(), self) };
            }
        }

        $crate::meta::impl_variant_via_codec!($ty);
    )*};
}

/// `PtrCodec` for an engine-managed body held in `#[repr(transparent)]`
/// opaque words. The type must also implement `Clone` through the engine's
/// copy constructor.
macro_rules! impl_opaque_codec {
    ([$($generics:tt)*] $ty:ty => $kind:expr) => {
        unsafe impl<$($generics)*> $crate::meta::PtrCodec for $ty {
            const VARIANT_TYPE: $crate::sys::VariantType = $kind;
            const SIZE: usize = ::std::mem::size_of::<$ty>();

            unsafe fn write_arg(&self, dst: $crate::sys::TypePtr) {
                unsafe {
                    ::std::ptr::copy_nonoverlapping(
                        (self as *const Self).cast::<u8>(),
                        dst.cast::<u8>(),
                        ::std::mem::size_of::<$ty>(),
                    )
                };
            }

            unsafe fn from_arg_ptr(src: $crate::sys::ConstTypePtr) -> Self {
                let borrowed =
                    ::std::mem::ManuallyDrop::new(unsafe { ::std::ptr::read(src.cast::<$ty>()) });
                ::std::clone::Clone::clone(&*borrowed)
            }

            unsafe fn from_return_slot(src: $crate::sys::TypePtr) -> Self {
                unsafe { ::std::ptr::read(src.cast::<$ty>()) }
            }

            unsafe fn write_return(self, dst: $crate::sys::TypePtr) {
                unsafe { ::std::ptr::write(dst.cast::<$ty>(), self) };
            }
        }
    };
}

/// `ToVariant`, `FromVariant` and `From<T> for Variant` through the
/// engine's converters for `T::VARIANT_TYPE`.
macro_rules! impl_variant_via_codec {
    ([$($generics:tt)*] $ty:ty) => {
        impl<$($generics)*> $crate::meta::ToVariant for $ty {
            fn to_variant(&self) -> $crate::variant::Variant {
                $crate::meta::codec_to_variant(self)
            }
        }

        impl<$($generics)*> $crate::meta::FromVariant for $ty {
            fn try_from_variant(
                variant: &$crate::variant::Variant,
            ) -> Result<Self, $crate::variant::VariantError> {
                $crate::meta::codec_from_variant(variant)
            }
        }

        impl<$($generics)*> From<$ty> for $crate::variant::Variant {
            fn from(value: $ty) -> Self {
                $crate::meta::ToVariant::to_variant(&value)
            }
        }
    };
    ($ty:ty) => {
        $crate::meta::impl_variant_via_codec!([] $ty);
    };
}

pub(crate) use {impl_opaque_codec, impl_pod_codec, impl_variant_via_codec};

// ============================================================================
// Engine enums
// ============================================================================

/// Codecs for a generated enum newtype: an `int` on the wire.
macro_rules! impl_engine_enum {
    ($name:ident) => {
        unsafe impl $crate::meta::PtrCodec for $name {
            const VARIANT_TYPE: $crate::sys::VariantType = $crate::sys::VariantType::Int;
            const SIZE: usize = 8;

            unsafe fn write_arg(&self, dst: $crate::sys::TypePtr) {
                unsafe { *dst.cast::<i64>() = self.ord() };
            }

            unsafe fn from_arg_ptr(src: $crate::sys::ConstTypePtr) -> Self {
                Self::from_ord(unsafe { *src.cast::<i64>() })
            }

            unsafe fn from_return_slot(src: $crate::sys::TypePtr) -> Self {
                Self::from_ord(unsafe { *src.cast::<i64>() })
            }

            unsafe fn write_return(self, dst: $crate::sys::TypePtr) {
                unsafe { *dst.cast::<i64>() = self.ord() };
            }
        }

        impl $crate::meta::ToVariant for $name {
            fn to_variant(&self) -> $crate::variant::Variant {
                $crate::meta::ToVariant::to_variant(&self.ord())
            }
        }

        impl $crate::meta::FromVariant for $name {
            fn try_from_variant(
                variant: &$crate::variant::Variant,
            ) -> Result<Self, $crate::variant::VariantError> {
                <i64 as $crate::meta::FromVariant>::try_from_variant(variant).map(Self::from_ord)
            }
        }

        impl From<$name> for $crate::variant::Variant {
            fn from(value: $name) -> Self {
                $crate::meta::ToVariant::to_variant(&value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> i64 {
                value.ord()
            }
        }
    };
}

/// Flag operators for a generated bitfield enum.
macro_rules! impl_engine_bitfield {
    ($name:ident) => {
        impl $name {
            /// Whether every bit of `other` is set.
            pub const fn contains(self, other: Self) -> bool {
                self.ord() & other.ord() == other.ord()
            }

            pub const fn is_empty(self) -> bool {
                self.ord() == 0
            }
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self::from_ord(self.ord() | rhs.ord())
            }
        }

        impl ::std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                *self = *self | rhs;
            }
        }

        impl ::std::ops::BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self::from_ord(self.ord() & rhs.ord())
            }
        }
    };
}

pub(crate) use {impl_engine_bitfield, impl_engine_enum};

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: PtrCodec>(value: T) -> Scratch {
        let mut scratch = Scratch::new();
        unsafe { value.write_return(scratch.as_mut_ptr()) };
        scratch
    }

    #[test]
    fn narrow_integers_travel_as_i64() {
        let mut scratch = encode(-3i8);
        assert_eq!(scratch.0[0] as i64, -3);
        assert_eq!(unsafe { i16::from_return_slot(scratch.as_mut_ptr()) }, -3);
        let mut scratch = encode(u32::MAX);
        assert_eq!(unsafe { u32::from_return_slot(scratch.as_mut_ptr()) }, u32::MAX);
    }

    #[test]
    fn floats_travel_as_f64() {
        let mut scratch = encode(0.25f32);
        assert_eq!(f64::from_bits(scratch.0[0]), 0.25);
        assert_eq!(unsafe { f32::from_return_slot(scratch.as_mut_ptr()) }, 0.25);
    }

    #[test]
    fn bools_use_one_byte() {
        let mut scratch = encode(true);
        assert_eq!(scratch.0[0], 1);
        assert!(unsafe { bool::from_return_slot(scratch.as_mut_ptr()) });
        assert_eq!(<bool as PtrCodec>::SIZE, 1);
    }

    #[test]
    fn unit_writes_nothing() {
        unsafe { ().write_return(std::ptr::null_mut()) };
        assert_eq!(<() as PtrCodec>::SIZE, 0);
    }
}

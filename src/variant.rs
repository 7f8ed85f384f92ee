//! The engine's dynamically typed value.
//!
//! A [`Variant`] is three words of engine-owned storage. The bridge never
//! reads them: kind queries, comparison, hashing, stringification and
//! conversions all go through interface entries.

use std::fmt;
use std::mem::MaybeUninit;

use gdx_sys::{
    CallError, ConstTypePtr, ConstVariantPtr, OpaqueVariant, TypePtr, VariantPtr, VariantType,
};
use thiserror::Error;

use crate::builtin::GString;
use crate::meta::{FromVariant, PtrCodec, ToVariant};

/// Failed extraction or conversion of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    #[error("expected a variant of type `{}`, found `{}`", .expected.name(), .actual.name())]
    TypeMismatch { expected: VariantType, actual: VariantType },

    #[error("cannot convert `{}` to `{}`", .from.name(), .to.name())]
    ConversionFailed { from: VariantType, to: VariantType },

    #[error("variant holds a null or freed object")]
    NullObject,

    #[error("object of class `{actual}` is not a `{expected}`")]
    ClassMismatch { expected: String, actual: String },
}

#[repr(transparent)]
pub struct Variant {
    opaque: OpaqueVariant,
}

impl Variant {
    pub fn nil() -> Self {
        let new_nil = gdx_sys::interface_fn!(variant_new_nil);
        let mut value = MaybeUninit::<Self>::uninit();
        unsafe {
            new_nil(value.as_mut_ptr().cast());
            value.assume_init()
        }
    }

    pub fn get_type(&self) -> VariantType {
        let get_type = gdx_sys::interface_fn!(variant_get_type);
        VariantType::from_sys(unsafe { get_type(self.sys()) })
    }

    pub fn is_nil(&self) -> bool {
        self.get_type() == VariantType::Nil
    }

    /// Truthiness as the engine's scripting layer defines it.
    pub fn booleanize(&self) -> bool {
        let booleanize = gdx_sys::interface_fn!(variant_booleanize);
        unsafe { booleanize(self.sys()) != gdx_sys::FALSE }
    }

    pub fn stringify(&self) -> GString {
        let stringify = gdx_sys::interface_fn!(variant_stringify);
        let mut text = MaybeUninit::<GString>::uninit();
        unsafe {
            stringify(self.sys(), text.as_mut_ptr().cast());
            text.assume_init()
        }
    }

    pub fn hash(&self) -> i64 {
        let hash = gdx_sys::interface_fn!(variant_hash);
        unsafe { hash(self.sys()) }
    }

    /// Extract a `T`, failing when the kind does not match exactly.
    pub fn try_to<T: FromVariant>(&self) -> Result<T, VariantError> {
        T::try_from_variant(self)
    }

    /// Strictly convert to `kind` using the engine's conversion table.
    pub fn convert(&self, kind: VariantType) -> Result<Variant, VariantError> {
        let from = self.get_type();
        if from == kind {
            return Ok(self.clone());
        }
        let failed = VariantError::ConversionFailed { from, to: kind };

        let can_convert = gdx_sys::interface_fn!(variant_can_convert_strict);
        if unsafe { can_convert(from.sys(), kind.sys()) } == gdx_sys::FALSE {
            return Err(failed);
        }

        let construct = gdx_sys::interface_fn!(variant_construct);
        let args = [self.sys()];
        let mut error = CallError::OK;
        let mut value = MaybeUninit::<Variant>::uninit();
        let value = unsafe {
            construct(kind.sys(), value.as_mut_ptr().cast(), args.as_ptr(), 1, &mut error);
            value.assume_init()
        };
        if error.is_ok() { Ok(value) } else { Err(failed) }
    }

    pub fn sys(&self) -> ConstVariantPtr {
        (self as *const Self).cast()
    }

    pub fn sys_mut(&mut self) -> VariantPtr {
        (self as *mut Self).cast()
    }

    /// View engine-owned variant storage.
    ///
    /// # Safety
    ///
    /// `ptr` must point to an initialized variant that outlives `'a`.
    pub unsafe fn borrow_sys<'a>(ptr: ConstVariantPtr) -> &'a Variant {
        unsafe { &*ptr.cast::<Variant>() }
    }

    /// Mutable view of engine-owned variant storage.
    ///
    /// # Safety
    ///
    /// As for [`Variant::borrow_sys`], and nothing else may access the
    /// storage during `'a`.
    pub unsafe fn borrow_sys_mut<'a>(ptr: VariantPtr) -> &'a mut Variant {
        unsafe { &mut *ptr.cast::<Variant>() }
    }

    /// Build a variant from typed storage of `kind`; `Nil` copies a whole
    /// variant.
    ///
    /// # Safety
    ///
    /// `src` must hold an initialized value of `kind`. It keeps ownership.
    pub(crate) unsafe fn from_type_storage(kind: VariantType, src: TypePtr) -> Variant {
        if kind == VariantType::Nil {
            return unsafe { Variant::borrow_sys(src.cast_const()) }.clone();
        }
        let Some(from_type) = gdx_registry::cache().variant_from_type(kind) else {
            crate::engine_error!("engine has no variant constructor for `{}`", kind.name());
            return Variant::nil();
        };
        let mut value = MaybeUninit::<Variant>::uninit();
        unsafe {
            from_type(value.as_mut_ptr().cast(), src);
            value.assume_init()
        }
    }

    /// Write this value into uninitialized typed storage of `kind`.
    ///
    /// # Safety
    ///
    /// `dst` must be writable storage for `kind`; the caller owns what is
    /// written.
    pub(crate) unsafe fn write_to_type_storage(&self, kind: VariantType, dst: TypePtr) {
        if kind == VariantType::Nil {
            unsafe { std::ptr::write(dst.cast::<Variant>(), self.clone()) };
            return;
        }
        match gdx_registry::cache().variant_to_type(kind) {
            Some(to_type) => unsafe { to_type(dst, self.sys().cast_mut()) },
            None => crate::engine_error!("engine has no `{}` extractor for variants", kind.name()),
        }
    }
}

impl Drop for Variant {
    fn drop(&mut self) {
        let destroy = gdx_sys::interface_fn!(variant_destroy);
        unsafe { destroy(self.sys_mut()) };
    }
}

impl Clone for Variant {
    fn clone(&self) -> Self {
        let new_copy = gdx_sys::interface_fn!(variant_new_copy);
        let mut value = MaybeUninit::<Self>::uninit();
        unsafe {
            new_copy(value.as_mut_ptr().cast(), self.sys());
            value.assume_init()
        }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::nil()
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        let equal = gdx_sys::interface_fn!(variant_equal);
        unsafe { equal(self.sys(), other.sys()) != gdx_sys::FALSE }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.stringify(), f)
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.get_type().name(), self.stringify())
    }
}

/// Arguments declared `Variant` travel as whole variants.
unsafe impl PtrCodec for Variant {
    const VARIANT_TYPE: VariantType = VariantType::Nil;
    const SIZE: usize = std::mem::size_of::<Variant>();

    unsafe fn write_arg(&self, dst: TypePtr) {
        let words = self.opaque.len();
        unsafe { std::ptr::copy_nonoverlapping(self.opaque.as_ptr(), dst.cast::<usize>(), words) };
    }

    unsafe fn from_arg_ptr(src: ConstTypePtr) -> Self {
        unsafe { Variant::borrow_sys(src) }.clone()
    }

    unsafe fn from_return_slot(src: TypePtr) -> Self {
        unsafe { std::ptr::read(src.cast::<Variant>()) }
    }

    unsafe fn write_return(self, dst: TypePtr) {
        unsafe { std::ptr::write(dst.cast::<Variant>(), self) };
    }
}

impl ToVariant for Variant {
    fn to_variant(&self) -> Variant {
        self.clone()
    }
}

impl FromVariant for Variant {
    fn try_from_variant(variant: &Variant) -> Result<Self, VariantError> {
        Ok(variant.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{
        Aabb, Basis, Color, PackedColorArray, PackedVector3Array, Plane, Projection, Quaternion,
        Rect2, Rect2i, Rid, Transform2D, Transform3D, Vector2, Vector2i, Vector3, Vector3i,
        Vector4, Vector4i,
    };
    use crate::meta::Scratch;
    use crate::test_support;

    #[test]
    fn nil_is_falsy_and_typed_nil() {
        test_support::boot();
        let nil = Variant::nil();
        assert!(nil.is_nil());
        assert!(!nil.booleanize());
        assert_eq!(Variant::default(), nil);
    }

    #[test]
    fn scalars_extract_only_as_their_kind() {
        test_support::boot();
        let v = Variant::from(42i64);
        assert_eq!(v.get_type(), VariantType::Int);
        assert_eq!(v.try_to::<i32>(), Ok(42));
        assert_eq!(
            v.try_to::<f64>(),
            Err(VariantError::TypeMismatch {
                expected: VariantType::Float,
                actual: VariantType::Int
            })
        );
        assert!(matches!(
            Variant::from(300i64).try_to::<u8>(),
            Err(VariantError::ConversionFailed { .. })
        ));
    }

    #[test]
    fn strict_conversion_follows_the_engine_table() {
        test_support::boot();
        let v = Variant::from(3i64);
        let as_float = v.convert(VariantType::Float).unwrap();
        assert_eq!(as_float.try_to::<f64>(), Ok(3.0));
        let vector = Variant::from(Vector2::new(1.0, 2.0));
        assert!(matches!(
            vector.convert(VariantType::Int),
            Err(VariantError::ConversionFailed { .. })
        ));
    }

    #[test]
    fn strings_stringify_and_compare() {
        test_support::boot();
        let a = Variant::from("hello");
        assert_eq!(a.get_type(), VariantType::String);
        assert_eq!(a.to_string(), "hello");
        assert_eq!(a, a.clone());
        assert_eq!(a.hash(), Variant::from("hello").hash());
        assert_ne!(a, Variant::from(1i64));
    }

    #[test]
    fn math_types_round_trip() {
        test_support::boot();
        let v = Variant::from(Vector2::new(0.5, -1.0));
        assert_eq!(v.try_to::<Vector2>(), Ok(Vector2::new(0.5, -1.0)));
    }

    /// Typed storage, variant extraction and same-kind conversion all give
    /// `value` back unchanged.
    fn assert_round_trips<T>(value: T, kind: VariantType)
    where
        T: PtrCodec + ToVariant + FromVariant + PartialEq + fmt::Debug + Copy,
    {
        let mut scratch = Scratch::new();
        unsafe { value.write_return(scratch.as_mut_ptr()) };
        assert_eq!(unsafe { T::from_return_slot(scratch.as_mut_ptr()) }, value);

        let variant = value.to_variant();
        assert_eq!(variant.get_type(), kind, "{value:?}");
        assert_eq!(variant.try_to::<T>(), Ok(value));
        let converted = variant.convert(kind).unwrap();
        assert_eq!(converted, variant);
        assert_eq!(converted.try_to::<T>(), Ok(value));
    }

    #[test]
    fn every_math_kind_round_trips() {
        test_support::boot();
        let v3 = |x, y, z| Vector3::new(x, y, z);
        let basis = Basis { rows: [v3(0.0, -1.0, 0.0), v3(1.0, 0.0, 0.0), v3(0.0, 0.0, 2.0)] };
        let projection = Projection {
            cols: [
                Vector4::new(1.0, 2.0, 3.0, 4.0),
                Vector4::new(5.0, 6.0, 7.0, 8.0),
                Vector4::new(9.0, 10.0, 11.0, 12.0),
                Vector4::new(13.0, 14.0, 15.0, 16.0),
            ],
        };
        let transform_2d = Transform2D {
            a: Vector2::new(0.0, 1.0),
            b: Vector2::new(-1.0, 0.0),
            origin: Vector2::new(3.5, -2.0),
        };

        assert_round_trips(Vector2i::new(-7, 9), VariantType::Vector2i);
        assert_round_trips(Vector3i::new(1, -2, 3), VariantType::Vector3i);
        assert_round_trips(Vector4::new(0.25, -0.5, 8.0, 1.0), VariantType::Vector4);
        assert_round_trips(Vector4i::new(i32::MIN, -1, 0, i32::MAX), VariantType::Vector4i);
        assert_round_trips(
            Rect2::new(Vector2::new(1.0, 2.0), Vector2::new(3.0, 4.0)),
            VariantType::Rect2,
        );
        assert_round_trips(
            Rect2i::new(Vector2i::new(-4, 4), Vector2i::new(16, 9)),
            VariantType::Rect2i,
        );
        assert_round_trips(transform_2d, VariantType::Transform2D);
        assert_round_trips(Plane::new(v3(0.0, 1.0, 0.0), -3.0), VariantType::Plane);
        assert_round_trips(Quaternion::new(0.5, 0.5, -0.5, 0.5), VariantType::Quaternion);
        assert_round_trips(Aabb::new(v3(-1.0, -2.0, -3.0), v3(2.0, 4.0, 6.0)), VariantType::Aabb);
        assert_round_trips(basis, VariantType::Basis);
        assert_round_trips(
            Transform3D { basis, origin: v3(10.0, 20.0, 30.0) },
            VariantType::Transform3D,
        );
        assert_round_trips(projection, VariantType::Projection);
        assert_round_trips(Color::from_rgba(0.1, 0.2, 0.3, 0.4), VariantType::Color);
        assert_round_trips(Rid::new(0xDEAD_BEEF), VariantType::Rid);
    }

    #[test]
    fn packed_spans_rewrap_unchanged() {
        test_support::boot();
        let colors = [Color::WHITE, Color::from_rgba8(10, 20, 30, 40), Color::TRANSPARENT];
        let packed = PackedColorArray::from_slice(&colors);
        let variant = packed.to_variant();
        assert_eq!(variant.get_type(), VariantType::PackedColorArray);

        let extracted = variant.try_to::<PackedColorArray>().unwrap();
        assert_eq!(extracted.as_slice(), &colors);
        let rewrapped = PackedColorArray::from_slice(extracted.as_slice());
        assert_eq!(rewrapped, packed);
        assert_eq!(rewrapped.to_variant(), variant);
        assert_eq!(variant.convert(VariantType::PackedColorArray).unwrap(), variant);

        let points = [v(1.0, 2.0, 3.0), v(-4.0, 5.5, 0.0)];
        let packed = PackedVector3Array::from_slice(&points);
        let rewrapped = PackedVector3Array::from_slice(packed.as_slice());
        assert_eq!(rewrapped.to_vec(), points);
        assert_eq!(rewrapped.to_variant(), packed.to_variant());
    }

    fn v(x: gdx_sys::real, y: gdx_sys::real, z: gdx_sys::real) -> Vector3 {
        Vector3::new(x, y, z)
    }
}

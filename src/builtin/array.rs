use std::fmt;
use std::marker::PhantomData;

use gdx_sys::{ConstTypePtr, Int, OpaqueArray, TypePtr, VariantType};

use crate::builtin::{
    Aabb, Basis, Callable, Color, ContainerError, Dictionary, GString, NodePath, PackedByteArray,
    PackedColorArray, PackedFloat32Array, PackedFloat64Array, PackedInt32Array, PackedInt64Array,
    PackedStringArray, PackedVector2Array, PackedVector3Array, Plane, Projection, Quaternion, Rect2,
    Rect2i, Rid, Signal, StringName, Transform2D, Transform3D, Vector2, Vector2i, Vector3, Vector3i,
    Vector4, Vector4i, opaque_builtin,
};
use crate::meta::{FromVariant, PtrCodec, ToVariant};
use crate::variant::{Variant, VariantError};

/// Engine array of variants. Copies share one body; use
/// [`Array::duplicate`] for an independent array.
#[repr(transparent)]
pub struct Array {
    opaque: OpaqueArray,
}

opaque_builtin!(Array => VariantType::Array);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let size = gdx_sys::interface_fn!(array_size);
        usize::try_from(unsafe { size(self.sys()) }).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the element at `index`.
    pub fn get(&self, index: usize) -> Option<Variant> {
        if index >= self.len() {
            return None;
        }
        let operator_index = gdx_sys::interface_fn!(array_operator_index);
        let element = unsafe { operator_index(self.sys().cast_mut(), index as Int) };
        if element.is_null() {
            return None;
        }
        Some(unsafe { Variant::borrow_sys(element) }.clone())
    }

    pub fn set(&mut self, index: usize, value: &Variant) -> Result<(), ContainerError> {
        let len = self.len();
        if index >= len {
            return Err(ContainerError::IndexOutOfBounds { index, len });
        }
        self.check_element(value)?;
        let set = gdx_sys::interface_fn!(array_set);
        let stored = unsafe { set(self.sys_mut(), index as Int, value.sys()) };
        self.accepted(value, stored)
    }

    pub fn push(&mut self, value: &Variant) -> Result<(), ContainerError> {
        self.check_element(value)?;
        let push_back = gdx_sys::interface_fn!(array_push_back);
        let stored = unsafe { push_back(self.sys_mut(), value.sys()) };
        self.accepted(value, stored)
    }

    /// Remove and return the element at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Variant, ContainerError> {
        let len = self.len();
        let value = self.get(index).ok_or(ContainerError::IndexOutOfBounds { index, len })?;
        let remove_at = gdx_sys::interface_fn!(array_remove_at);
        unsafe { remove_at(self.sys_mut(), index as Int) };
        Ok(value)
    }

    pub fn clear(&mut self) {
        let clear = gdx_sys::interface_fn!(array_clear);
        unsafe { clear(self.sys_mut()) };
    }

    /// Grow with nils or truncate to `len` elements.
    pub fn resize(&mut self, len: usize) {
        let resize = gdx_sys::interface_fn!(array_resize);
        unsafe { resize(self.sys_mut(), len as Int) };
    }

    /// Independent copy; `deep` also copies nested arrays and dictionaries.
    pub fn duplicate(&self, deep: bool) -> Self {
        let duplicate = gdx_sys::interface_fn!(array_duplicate);
        let mut copy = std::mem::MaybeUninit::<Self>::uninit();
        let deep = if deep { gdx_sys::TRUE } else { gdx_sys::FALSE };
        unsafe {
            duplicate(self.sys(), deep, copy.as_mut_ptr().cast());
            copy.assume_init()
        }
    }

    /// Element kind of a typed array; `Nil` when untyped.
    pub fn element_type(&self) -> VariantType {
        let typed = gdx_sys::interface_fn!(array_get_typed_builtin);
        VariantType::from_sys(unsafe { typed(self.sys()) })
    }

    pub fn is_typed(&self) -> bool {
        self.element_type() != VariantType::Nil
    }

    pub fn iter(&self) -> ArrayIter<'_> {
        ArrayIter { array: self, next: 0 }
    }

    /// Restrict elements to `kind` (and `class_name` for objects). Only
    /// empty arrays can be typed.
    fn set_typed(&mut self, kind: VariantType, class_name: &str) {
        let set_typed = gdx_sys::interface_fn!(array_set_typed);
        let class_name = StringName::from(class_name);
        unsafe { set_typed(self.sys_mut(), kind.sys(), class_name.sys()) };
    }

    fn check_element(&self, value: &Variant) -> Result<(), ContainerError> {
        let expected = self.element_type();
        let actual = value.get_type();
        if expected == VariantType::Nil || expected == actual {
            Ok(())
        } else {
            Err(ContainerError::ElementType { expected, actual })
        }
    }

    fn accepted(&self, value: &Variant, ok: gdx_sys::Bool) -> Result<(), ContainerError> {
        if ok != gdx_sys::FALSE {
            return Ok(());
        }
        Err(ContainerError::ElementType {
            expected: self.element_type(),
            actual: value.get_type(),
        })
    }
}

impl FromIterator<Variant> for Array {
    fn from_iter<I: IntoIterator<Item = Variant>>(iter: I) -> Self {
        let mut array = Array::new();
        for value in iter {
            // Untyped arrays accept every value.
            let _ = array.push(&value);
        }
        array
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = Variant;
    type IntoIter = ArrayIter<'a>;

    fn into_iter(self) -> ArrayIter<'a> {
        self.iter()
    }
}

pub struct ArrayIter<'a> {
    array: &'a Array,
    next: usize,
}

impl Iterator for ArrayIter<'_> {
    type Item = Variant;

    fn next(&mut self) -> Option<Variant> {
        let value = self.array.get(self.next)?;
        self.next += 1;
        Some(value)
    }
}

/// Type that can be the element of a [`TypedArray`].
pub trait ArrayElement: ToVariant + FromVariant + 'static {
    const ELEMENT_TYPE: VariantType;

    /// Class restriction for object elements.
    fn class_name() -> Option<&'static str> {
        None
    }
}

macro_rules! impl_array_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl ArrayElement for $ty {
            const ELEMENT_TYPE: VariantType = VariantType::$kind;
        }
    )*};
}

impl_array_element! {
    Variant => Nil,
    bool => Bool,
    i64 => Int,
    i32 => Int,
    f64 => Float,
    f32 => Float,
    GString => String,
    Vector2 => Vector2,
    Vector2i => Vector2i,
    Rect2 => Rect2,
    Rect2i => Rect2i,
    Vector3 => Vector3,
    Vector3i => Vector3i,
    Transform2D => Transform2D,
    Vector4 => Vector4,
    Vector4i => Vector4i,
    Plane => Plane,
    Quaternion => Quaternion,
    Aabb => Aabb,
    Basis => Basis,
    Transform3D => Transform3D,
    Projection => Projection,
    Color => Color,
    StringName => StringName,
    NodePath => NodePath,
    Rid => Rid,
    Callable => Callable,
    Signal => Signal,
    Dictionary => Dictionary,
    Array => Array,
    PackedByteArray => PackedByteArray,
    PackedInt32Array => PackedInt32Array,
    PackedInt64Array => PackedInt64Array,
    PackedFloat32Array => PackedFloat32Array,
    PackedFloat64Array => PackedFloat64Array,
    PackedStringArray => PackedStringArray,
    PackedVector2Array => PackedVector2Array,
    PackedVector3Array => PackedVector3Array,
    PackedColorArray => PackedColorArray,
}

/// Array whose elements the engine restricts to `T`.
#[repr(transparent)]
pub struct TypedArray<T: ArrayElement> {
    array: Array,
    _element: PhantomData<T>,
}

impl<T: ArrayElement> TypedArray<T> {
    pub fn new() -> Self {
        let mut array = Array::new();
        if T::ELEMENT_TYPE != VariantType::Nil {
            array.set_typed(T::ELEMENT_TYPE, T::class_name().unwrap_or(""));
        }
        Self::wrap(array)
    }

    fn wrap(array: Array) -> Self {
        Self {
            array,
            _element: PhantomData,
        }
    }

    /// Adopt `array` if its element type is `T`'s.
    pub fn try_from_array(array: Array) -> Result<Self, ContainerError> {
        let actual = array.element_type();
        if actual == T::ELEMENT_TYPE {
            Ok(Self::wrap(array))
        } else {
            Err(ContainerError::ElementType {
                expected: T::ELEMENT_TYPE,
                actual,
            })
        }
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.array.get(index).and_then(|value| T::try_from_variant(&value).ok())
    }

    pub fn set(&mut self, index: usize, value: &T) -> Result<(), ContainerError> {
        self.array.set(index, &value.to_variant())
    }

    pub fn push(&mut self, value: &T) -> Result<(), ContainerError> {
        self.array.push(&value.to_variant())
    }

    pub fn remove(&mut self, index: usize) -> Result<Option<T>, ContainerError> {
        self.array.remove(index).map(|value| T::try_from_variant(&value).ok())
    }

    pub fn clear(&mut self) {
        self.array.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.array.iter().filter_map(|value| T::try_from_variant(&value).ok())
    }

    pub fn as_array(&self) -> &Array {
        &self.array
    }

    pub fn into_array(self) -> Array {
        self.array
    }
}

impl<T: ArrayElement> Default for TypedArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ArrayElement> Clone for TypedArray<T> {
    fn clone(&self) -> Self {
        Self::wrap(self.array.clone())
    }
}

impl<T: ArrayElement> fmt::Debug for TypedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.array, f)
    }
}

impl<T: ArrayElement> FromIterator<T> for TypedArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = Self::new();
        for value in iter {
            let _ = array.push(&value);
        }
        array
    }
}

unsafe impl<T: ArrayElement> PtrCodec for TypedArray<T> {
    const VARIANT_TYPE: VariantType = VariantType::Array;
    const SIZE: usize = std::mem::size_of::<Array>();

    unsafe fn write_arg(&self, dst: TypePtr) {
        unsafe { self.array.write_arg(dst) };
    }

    unsafe fn from_arg_ptr(src: ConstTypePtr) -> Self {
        Self::wrap(unsafe { Array::from_arg_ptr(src) })
    }

    unsafe fn from_return_slot(src: TypePtr) -> Self {
        Self::wrap(unsafe { Array::from_return_slot(src) })
    }

    unsafe fn write_return(self, dst: TypePtr) {
        unsafe { self.array.write_return(dst) };
    }
}

impl<T: ArrayElement> ToVariant for TypedArray<T> {
    fn to_variant(&self) -> Variant {
        self.array.to_variant()
    }
}

impl<T: ArrayElement> FromVariant for TypedArray<T> {
    fn try_from_variant(variant: &Variant) -> Result<Self, VariantError> {
        let array = Array::try_from_variant(variant)?;
        let actual = array.element_type();
        if actual != T::ELEMENT_TYPE {
            return Err(VariantError::TypeMismatch {
                expected: T::ELEMENT_TYPE,
                actual,
            });
        }
        Ok(Self::wrap(array))
    }
}

impl<T: ArrayElement> From<TypedArray<T>> for Variant {
    fn from(array: TypedArray<T>) -> Self {
        array.to_variant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn copies_share_one_body() {
        test_support::boot();
        let mut a = Array::new();
        a.push(&Variant::from(1i64)).unwrap();
        let b = a.clone();
        a.push(&Variant::from("two")).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(a.duplicate(false).len(), 2);
    }

    #[test]
    fn out_of_bounds_access_is_reported() {
        test_support::boot();
        let mut a: Array = [Variant::from(1i64)].into_iter().collect();
        assert!(a.get(3).is_none());
        assert!(a.get(917).is_none());
        assert!(
            !gdx_testengine::captured_errors()
                .iter()
                .any(|message| message.contains("p_index = 917"))
        );
        assert_eq!(
            a.set(3, &Variant::nil()),
            Err(ContainerError::IndexOutOfBounds { index: 3, len: 1 })
        );
        assert_eq!(a.remove(0).unwrap().try_to::<i64>(), Ok(1));
        assert!(a.is_empty());
    }

    #[test]
    fn typed_arrays_reject_other_kinds() {
        test_support::boot();
        let mut ints = TypedArray::<i64>::new();
        ints.push(&5).unwrap();
        assert_eq!(ints.as_array().element_type(), VariantType::Int);
        let err = ints.as_array().clone().push(&Variant::from("x")).unwrap_err();
        assert_eq!(
            err,
            ContainerError::ElementType {
                expected: VariantType::Int,
                actual: VariantType::String
            }
        );
        assert_eq!(ints.iter().collect::<Vec<_>>(), [5]);
    }

    #[test]
    fn typed_arrays_check_variant_extraction() {
        test_support::boot();
        let floats: TypedArray<f64> = [0.5, 1.5].into_iter().collect();
        let v = floats.to_variant();
        assert!(TypedArray::<f64>::try_from_variant(&v).is_ok());
        assert!(TypedArray::<i64>::try_from_variant(&v).is_err());
    }

    #[test]
    fn object_elements_keep_their_objects_alive() {
        use crate::classes::Resource;
        use crate::obj::Gd;

        test_support::boot();
        let resource = Resource::new_gd();
        let id = resource.instance_id();
        let mut array = Array::new();
        array.push(&resource.to_variant()).unwrap();
        drop(resource);
        assert!(gdx_testengine::is_live(id));

        let element = array.get(0).unwrap();
        assert_eq!(element.get_type(), VariantType::Object);
        assert_eq!(Gd::<Resource>::try_from_variant(&element).map(|r| r.instance_id()), Ok(id));
        drop(element);
        drop(array);
        assert!(gdx_testengine::is_destroyed(id));
    }

    #[test]
    fn resize_pads_with_nil() {
        test_support::boot();
        let mut a = Array::new();
        a.resize(2);
        assert!(a.get(1).unwrap().is_nil());
        a.clear();
        assert_eq!(a.len(), 0);
    }
}

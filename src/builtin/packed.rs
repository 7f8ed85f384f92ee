use std::fmt;
use std::marker::PhantomData;

use gdx_sys::{Int, OpaquePackedArray, VariantType};

use crate::builtin::{Color, ContainerError, GString, Vector2, Vector3, opaque_builtin};
use crate::meta::impl_variant_via_codec;

/// Element type of a packed array, stored in its native layout.
pub trait PackedElement: Clone + 'static {
    const ARRAY_TYPE: VariantType;
}

macro_rules! impl_packed_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl PackedElement for $ty {
            const ARRAY_TYPE: VariantType = VariantType::$kind;
        }
    )*};
}

impl_packed_element! {
    u8 => PackedByteArray,
    i32 => PackedInt32Array,
    i64 => PackedInt64Array,
    f32 => PackedFloat32Array,
    f64 => PackedFloat64Array,
    GString => PackedStringArray,
    Vector2 => PackedVector2Array,
    Vector3 => PackedVector3Array,
    Color => PackedColorArray,
}

/// Contiguous engine array of `T`. Copies share the body until one of them
/// is written to.
#[repr(transparent)]
pub struct PackedArray<T: PackedElement> {
    opaque: OpaquePackedArray,
    _element: PhantomData<T>,
}

opaque_builtin!(impl [T: PackedElement] PackedArray<T> => T::ARRAY_TYPE);
impl_variant_via_codec!([T: PackedElement] PackedArray<T>);

pub type PackedByteArray = PackedArray<u8>;
pub type PackedInt32Array = PackedArray<i32>;
pub type PackedInt64Array = PackedArray<i64>;
pub type PackedFloat32Array = PackedArray<f32>;
pub type PackedFloat64Array = PackedArray<f64>;
pub type PackedStringArray = PackedArray<GString>;
pub type PackedVector2Array = PackedArray<Vector2>;
pub type PackedVector3Array = PackedArray<Vector3>;
pub type PackedColorArray = PackedArray<Color>;

impl<T: PackedElement> PackedArray<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(values: &[T]) -> Self {
        let mut array = Self::new();
        for value in values {
            array.push(value);
        }
        array
    }

    pub fn len(&self) -> usize {
        let size = gdx_sys::interface_fn!(packed_array_size);
        usize::try_from(unsafe { size(T::ARRAY_TYPE.sys(), self.sys()) }).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.as_slice().get(index).cloned()
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<(), ContainerError> {
        let len = self.len();
        match self.as_mut_slice().get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ContainerError::IndexOutOfBounds { index, len }),
        }
    }

    /// Append a copy of `value`.
    pub fn push(&mut self, value: &T) {
        let push_back = gdx_sys::interface_fn!(packed_array_push_back);
        unsafe { push_back(T::ARRAY_TYPE.sys(), self.sys_mut(), (value as *const T).cast()) };
    }

    /// Grow with default elements or truncate.
    pub fn resize(&mut self, len: usize) {
        let resize = gdx_sys::interface_fn!(packed_array_resize);
        unsafe { resize(T::ARRAY_TYPE.sys(), self.sys_mut(), len as Int) };
    }

    /// Elements in place.
    pub fn as_slice(&self) -> &[T] {
        let len = self.len();
        if len == 0 {
            return &[];
        }
        let index = gdx_sys::interface_fn!(packed_array_operator_index_const);
        let first = unsafe { index(T::ARRAY_TYPE.sys(), self.sys(), 0) };
        if first.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(first.cast::<T>(), len) }
    }

    /// Elements in place, after detaching from any shared copy.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len();
        if len == 0 {
            return &mut [];
        }
        let index = gdx_sys::interface_fn!(packed_array_operator_index);
        let first = unsafe { index(T::ARRAY_TYPE.sys(), self.sys_mut(), 0) };
        if first.is_null() {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(first.cast::<T>(), len) }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<T: PackedElement> From<&[T]> for PackedArray<T> {
    fn from(values: &[T]) -> Self {
        Self::from_slice(values)
    }
}

impl<T: PackedElement> FromIterator<T> for PackedArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = Self::new();
        for value in iter {
            array.push(&value);
        }
        array
    }
}

impl<T: PackedElement + PartialEq> PartialEq for PackedArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: PackedElement + fmt::Debug> fmt::Debug for PackedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FromVariant, ToVariant};
    use crate::test_support;

    #[test]
    fn slices_view_native_storage() {
        test_support::boot();
        let mut bytes = PackedByteArray::from_slice(&[1, 2, 3]);
        assert_eq!(bytes.as_slice(), &[1, 2, 3]);
        bytes.as_mut_slice()[0] = 9;
        assert_eq!(bytes.to_vec(), [9, 2, 3]);
        assert_eq!(bytes.set(5, 0), Err(ContainerError::IndexOutOfBounds { index: 5, len: 3 }));
    }

    #[test]
    fn writes_detach_shared_copies() {
        test_support::boot();
        let mut a: PackedInt32Array = [1, 2, 3].into_iter().collect();
        let b = a.clone();
        a.set(1, 20).unwrap();
        assert_eq!(a.to_vec(), [1, 20, 3]);
        assert_eq!(b.to_vec(), [1, 2, 3]);
    }

    #[test]
    fn string_elements_are_engine_strings() {
        test_support::boot();
        let mut names = PackedStringArray::new();
        names.push(&GString::from("a"));
        names.push(&GString::from("b"));
        assert_eq!(names.get(1).unwrap(), "b");
        names.resize(1);
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn packed_arrays_travel_in_variants() {
        test_support::boot();
        let points = PackedVector2Array::from_slice(&[Vector2::new(1.0, 2.0)]);
        let v = points.to_variant();
        assert_eq!(v.get_type(), VariantType::PackedVector2Array);
        assert_eq!(PackedVector2Array::try_from_variant(&v).unwrap(), points);
        assert!(PackedByteArray::try_from_variant(&v).is_err());
    }
}

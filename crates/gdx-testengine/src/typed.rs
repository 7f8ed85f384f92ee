//! Moving values between variants and typed storage.
//!
//! Typed storage is the layout the bridge passes through pointer calls: raw
//! scalars for `bool`/`int`/`float`, body words for engine-owned kinds, an
//! object pointer for objects, and a whole variant where the signature says
//! `Variant`.
//!
//! An object pointer in an argument slot is borrowed. In a return slot it
//! carries one reference for the receiver when the object is `RefCounted`:
//! [`write_return`] adds it and [`take_return`] adopts it.

use std::ffi::c_void;
use std::sync::Arc;

use gdx_sys::VariantType;

use crate::objects;
use crate::ops;
use crate::value::*;

/// Kind used when a signature slot accepts any variant.
pub const ANY: VariantType = VariantType::Nil;

/// Read a value of `kind` from typed storage. The storage keeps its value.
///
/// # Safety
///
/// `src` must point to initialized storage of `kind`.
pub unsafe fn read(kind: VariantType, src: *const c_void) -> Var {
    use VariantType::*;
    unsafe {
        match kind {
            Nil => (*src.cast::<Var>()).clone(),
            Bool => Var::from_bool(*src.cast::<u8>() != 0),
            Int => Var::from_int(*src.cast::<i64>()),
            Float => Var::from_float(*src.cast::<f64>()),
            Rid => Var::from_rid(*src.cast::<u64>()),
            String => Var::from_gstr(GStr::share_word(*src.cast::<usize>())),
            StringName => Var::from_name(Name::from_word(*src.cast::<usize>())),
            NodePath => Var::from_node_path(arc_share(*src.cast::<usize>())),
            Array => Var::from_array(arc_share(*src.cast::<usize>())),
            Dictionary => Var::from_dict(arc_share(*src.cast::<usize>())),
            Object => objects::object_var(*src.cast::<usize>()),
            Callable => {
                let words = *src.cast::<[usize; 2]>();
                Var::from_callable(words[0], Name::from_word(words[1]))
            }
            Signal => {
                let words = *src.cast::<[usize; 2]>();
                Var::from_signal(words[0], Name::from_word(words[1]))
            }
            k if k.is_packed_array() => Var::from_packed(arc_share(*src.cast::<usize>())),
            k => match pod_size(k) {
                Some(size) => {
                    let bytes = std::slice::from_raw_parts(src.cast::<u8>(), size);
                    Var::from_pod(k, bytes.to_vec())
                }
                None => Var::nil(),
            },
        }
    }
}

/// Placement-write `value` into uninitialized storage of `kind`, converting
/// it when the kinds differ. Values that do not convert write the default.
///
/// # Safety
///
/// `dst` must be writable, suitably aligned storage for `kind`; its previous
/// contents are not dropped.
pub unsafe fn write(value: &Var, kind: VariantType, dst: *mut c_void) {
    use VariantType::*;
    if kind == Nil {
        unsafe { std::ptr::write(dst.cast::<Var>(), value.clone()) };
        return;
    }
    let converted;
    let value = if value.kind() == kind || kind == Object {
        value
    } else {
        converted = ops::convert(value, kind).unwrap_or_else(|| ops::default_of(kind));
        &converted
    };

    unsafe {
        match kind {
            Bool => *dst.cast::<u8>() = value.as_bool().unwrap_or(false) as u8,
            Int => *dst.cast::<i64>() = value.as_int().unwrap_or_default(),
            Float => *dst.cast::<f64>() = value.as_float().unwrap_or_default(),
            Rid => *dst.cast::<u64>() = value.as_rid().unwrap_or_default(),
            Object => *dst.cast::<usize>() = objects::live_address(value),
            Callable | Signal => {
                let (address, name) = value.callable().unwrap_or((0, Name::intern("")));
                *dst.cast::<[usize; 2]>() = [address, name.word()];
            }
            String => {
                let text = value.gstr().unwrap_or_else(|| GStr::new(""));
                *dst.cast::<usize>() = text.into_word();
            }
            StringName => {
                let name = value.name().unwrap_or_else(|| Name::intern(""));
                *dst.cast::<usize>() = name.word();
            }
            NodePath => {
                let path = value.node_path().unwrap_or_else(|| Arc::new(NodePathBody::parse("")));
                *dst.cast::<usize>() = arc_into_word(path);
            }
            Array => {
                let body = value.array().unwrap_or_else(|| ArrayBody::from_vec(Vec::new()));
                *dst.cast::<usize>() = arc_into_word(body);
            }
            Dictionary => {
                let body = value.dict().unwrap_or_else(|| DictBody::from_entries(Vec::new()));
                *dst.cast::<usize>() = arc_into_word(body);
            }
            k if k.is_packed_array() => {
                let body = match value.packed() {
                    Some(body) => body,
                    None => Arc::new(PackedBody::empty(k).unwrap_or(PackedBody::Byte(Vec::new()))),
                };
                *dst.cast::<[usize; 2]>() = [arc_into_word(body), 0];
            }
            k => {
                if let (Some(size), Some(bytes)) = (pod_size(k), value.pod()) {
                    let count = size.min(bytes.len());
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.cast::<u8>(), count);
                }
            }
        }
    }
}

/// [`write`] into a return slot; object results carry a reference.
///
/// # Safety
///
/// As for [`write`].
pub unsafe fn write_return(value: &Var, kind: VariantType, dst: *mut c_void) {
    unsafe { write(value, kind, dst) };
    if kind == VariantType::Object {
        let address = unsafe { *dst.cast::<usize>() };
        if let Some(id) = objects::id_of(address) {
            objects::reference(id);
        }
    }
}

/// Take the value out of a return slot filled by the callee, releasing the
/// slot.
///
/// # Safety
///
/// `src` must hold an initialized return value of `kind`.
pub unsafe fn take_return(kind: VariantType, src: *mut c_void) -> Var {
    if kind == VariantType::Object {
        return objects::adopt_object_var(unsafe { *src.cast::<usize>() });
    }
    unsafe {
        let value = read(kind, src.cast_const());
        destroy(kind, src);
        value
    }
}

/// Release typed storage of `kind` previously filled by [`write`].
///
/// # Safety
///
/// `dst` must hold an initialized value of `kind`.
pub unsafe fn destroy(kind: VariantType, dst: *mut c_void) {
    use VariantType::*;
    unsafe {
        match kind {
            Nil => std::ptr::drop_in_place(dst.cast::<Var>()),
            String => drop(GStr::from_word(*dst.cast::<usize>())),
            NodePath => arc_release::<NodePathBody>(*dst.cast::<usize>()),
            Array => arc_release::<ArrayBody>(*dst.cast::<usize>()),
            Dictionary => arc_release::<DictBody>(*dst.cast::<usize>()),
            k if k.is_packed_array() => arc_release::<PackedBody>(*dst.cast::<usize>()),
            _ => {}
        }
    }
}

/// Aligned scratch storage big enough for any typed value.
#[repr(C, align(16))]
pub struct Slot([u8; 128]);

impl Slot {
    pub fn new() -> Self {
        Slot([0; 128])
    }

    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr().cast()
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.0.as_ptr().cast()
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed copies of a list of variants, destroyed on drop.
pub struct TypedArgs {
    kinds: Vec<VariantType>,
    slots: Vec<Slot>,
}

impl TypedArgs {
    pub fn new(values: &[Var], kinds: &[VariantType]) -> Self {
        let mut slots: Vec<Slot> = values.iter().map(|_| Slot::new()).collect();
        for ((value, kind), slot) in values.iter().zip(kinds).zip(slots.iter_mut()) {
            unsafe { write(value, *kind, slot.as_mut_ptr()) };
        }
        Self {
            kinds: kinds[..values.len().min(kinds.len())].to_vec(),
            slots,
        }
    }

    pub fn pointers(&self) -> Vec<*const c_void> {
        self.slots.iter().map(Slot::as_ptr).collect()
    }
}

impl Drop for TypedArgs {
    fn drop(&mut self) {
        for (kind, slot) in self.kinds.iter().zip(self.slots.iter_mut()) {
            unsafe { destroy(*kind, slot.as_mut_ptr()) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip_through_slots() {
        let mut slot = Slot::new();
        unsafe {
            write(&Var::from_int(42), VariantType::Int, slot.as_mut_ptr());
            assert_eq!(read(VariantType::Int, slot.as_ptr()).as_int(), Some(42));
            write(&Var::from_int(1), VariantType::Float, slot.as_mut_ptr());
            assert_eq!(read(VariantType::Float, slot.as_ptr()).as_float(), Some(1.0));
        }
    }

    #[test]
    fn strings_write_owned_words() {
        let mut slot = Slot::new();
        unsafe {
            write(&Var::from_str("hi"), VariantType::String, slot.as_mut_ptr());
            let value = read(VariantType::String, slot.as_ptr());
            destroy(VariantType::String, slot.as_mut_ptr());
            assert_eq!(value.text().as_deref(), Some("hi"));
        }
    }

    #[test]
    fn object_returns_carry_one_reference() {
        let ptr = objects::create("RefCounted");
        let id = objects::id_of_ptr(ptr).unwrap();
        let mut slot = Slot::new();
        unsafe {
            let value = objects::object_var(ptr as usize);
            write_return(&value, VariantType::Object, slot.as_mut_ptr());
            drop(value);
            assert_eq!(objects::reference_count(id), Some(1));
            let taken = take_return(VariantType::Object, slot.as_mut_ptr());
            assert_eq!(objects::reference_count(id), Some(1));
            drop(taken);
        }
        assert!(!objects::is_live(id));
    }

    #[test]
    fn mismatched_kinds_fall_back_to_default() {
        let mut slot = Slot::new();
        unsafe {
            write(&Var::from_str("x"), VariantType::Int, slot.as_mut_ptr());
            assert_eq!(read(VariantType::Int, slot.as_ptr()).as_int(), Some(0));
        }
    }
}

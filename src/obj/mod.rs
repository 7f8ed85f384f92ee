//! Engine objects and who releases them.
//!
//! Every engine class is a `#[repr(transparent)]` wrapper around a
//! [`RawObject`]; the handle types decide what happens when the wrapper goes
//! away:
//!
//! | handle        | reference counted object         | other objects                   |
//! |---------------|----------------------------------|---------------------------------|
//! | [`Gd`]        | holds one reference              | borrowed; the engine frees it   |
//! | [`Owned`]     | n/a                              | destroyed when dropped          |
//! | [`WeakGd`]    | no reference; upgrade checks id  | no ownership; upgrade checks id |
//!
//! Objects returned from engine calls are wrapped as `Gd`: counted when the
//! object is reference counted, borrowed otherwise. A caller that knows it
//! received a fresh unparented object claims it with [`Gd::take_ownership`].

mod gd;
mod owned;
mod weak;

use std::any::Any;
use std::sync::atomic::{AtomicIsize, Ordering};

use gdx_sys::{ObjectId, ObjectPtr, VariantType};
use thiserror::Error;

use crate::classes::Object;
use crate::meta::{Scratch, codec_to_variant};
use crate::variant::{Variant, VariantError};

pub use gd::Gd;
pub(crate) use gd::construct_object;
pub use owned::Owned;
pub use weak::WeakGd;

/// Name of the engine class a type wraps.
pub trait ClassIdentity {
    const CLASS_NAME: &'static str;
}

/// How instances of a class are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    /// Reference counted; freed when the last reference goes.
    RefCounted,
    /// Freed explicitly, by its owner or by the tree it is attached to.
    Manual,
    /// Decided per object at runtime (the root class).
    Dynamic,
}

/// A generated wrapper for an engine class.
///
/// # Safety
///
/// The type must be `#[repr(transparent)]` over [`RawObject`] and
/// `CLASS_NAME` must name the engine class the wrapper's methods expect.
pub unsafe trait EngineClass: ClassIdentity + Sized + 'static {
    const MEMORY: Memory;

    fn from_raw_object(object: RawObject) -> Self;

    fn raw_object(&self) -> &RawObject;
}

/// `Self` is `Base` or derives from it.
///
/// # Safety
///
/// Only sound when the engine hierarchy agrees.
pub unsafe trait Inherits<Base: EngineClass>: EngineClass {}

/// Engine object pointer plus the instance id it had when wrapped.
#[derive(Debug, PartialEq, Eq)]
pub struct RawObject {
    ptr: ObjectPtr,
    id: ObjectId,
    counted: bool,
}

impl RawObject {
    /// Wrap `ptr`; `None` for null or freed objects.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or an object pointer handed out by the engine.
    pub(crate) unsafe fn new(ptr: ObjectPtr, counted: bool) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        let get_id = gdx_sys::interface_fn!(object_get_instance_id);
        let id = unsafe { get_id(ptr) };
        (id != 0).then_some(Self { ptr, id, counted })
    }

    pub fn object_ptr(&self) -> ObjectPtr {
        self.ptr
    }

    pub fn instance_id(&self) -> ObjectId {
        self.id
    }

    /// Whether this wrapper holds one of the object's references.
    pub fn is_counted(&self) -> bool {
        self.counted
    }

    /// Whether the engine still knows the object under its id.
    pub fn is_alive(&self) -> bool {
        object_from_id(self.id) == Some(self.ptr)
    }

    /// Bitwise copy that releases nothing.
    pub(crate) fn borrowed(&self) -> Self {
        Self {
            ptr: self.ptr,
            id: self.id,
            counted: false,
        }
    }

    /// Engine class name of the live object.
    pub fn class_name(&self) -> Option<String> {
        class_name_of(self.ptr)
    }
}

/// Live object with instance id `id`.
pub(crate) fn object_from_id(id: ObjectId) -> Option<ObjectPtr> {
    if id == 0 {
        return None;
    }
    let from_id = gdx_sys::interface_fn!(object_get_instance_from_id);
    let ptr = unsafe { from_id(id) };
    (!ptr.is_null()).then_some(ptr)
}

pub(crate) fn class_name_of(ptr: ObjectPtr) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let get_class_name = gdx_sys::interface_fn!(object_get_class_name);
    let mut name = crate::builtin::StringName::default();
    let found = unsafe { get_class_name(ptr.cast_const(), name.sys_mut().cast()) };
    (found != gdx_sys::FALSE).then(|| name.to_string())
}

/// `ptr` cast to `class`, or `None` when the object is not one.
pub(crate) fn cast_ptr(ptr: ObjectPtr, class: &str) -> Option<ObjectPtr> {
    let cast_to = gdx_sys::interface_fn!(object_cast_to);
    let cast = gdx_sys::with_string_name(class, |name| unsafe { cast_to(ptr.cast_const(), name) });
    (!cast.is_null()).then_some(cast)
}

// ============================================================================
// Reference accounting
// ============================================================================

static LIVE_REFERENCES: AtomicIsize = AtomicIsize::new(0);

/// References the bridge has taken and not yet given back.
pub fn live_references() -> isize {
    LIVE_REFERENCES.load(Ordering::Acquire)
}

/// Add a reference; `false` when the object is not reference counted.
pub(crate) fn add_reference(ptr: ObjectPtr) -> bool {
    let reference = gdx_sys::interface_fn!(ref_reference);
    let counted = unsafe { reference(ptr) } != gdx_sys::FALSE;
    if counted {
        LIVE_REFERENCES.fetch_add(1, Ordering::AcqRel);
    }
    counted
}

/// Drop a reference and destroy the object when it was the last one.
pub(crate) fn release_reference(ptr: ObjectPtr) {
    let unreference = gdx_sys::interface_fn!(ref_unreference);
    LIVE_REFERENCES.fetch_sub(1, Ordering::AcqRel);
    if unsafe { unreference(ptr) } != gdx_sys::FALSE {
        let destroy = gdx_sys::interface_fn!(object_destroy);
        unsafe { destroy(ptr) };
    }
}

/// Account for a reference handed to or received from raw code.
pub(crate) fn transfer_reference(delta: isize) {
    LIVE_REFERENCES.fetch_add(delta, Ordering::AcqRel);
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("object has been freed")]
    Freed,

    #[error("object of class `{from}` is not a `{to}`")]
    CastFailed { from: String, to: &'static str },

    #[error("null object")]
    Null,
}

// ============================================================================
// Object arguments
// ============================================================================

/// Anything that can be passed where the engine expects an object of class
/// `C` (or null).
pub trait ObjectArg<C: EngineClass> {
    fn object_arg_ptr(&self) -> ObjectPtr;

    /// Object variant for dynamic calls.
    fn object_arg_variant(&self) -> Variant {
        object_variant(self.object_arg_ptr())
    }
}

/// The null object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Null;

impl<C: EngineClass> ObjectArg<C> for Null {
    fn object_arg_ptr(&self) -> ObjectPtr {
        std::ptr::null_mut()
    }
}

impl<C: EngineClass, T: Inherits<C>> ObjectArg<C> for Gd<T> {
    fn object_arg_ptr(&self) -> ObjectPtr {
        self.raw_object().object_ptr()
    }
}

impl<C: EngineClass, T: Inherits<C>> ObjectArg<C> for Option<Gd<T>> {
    fn object_arg_ptr(&self) -> ObjectPtr {
        self.as_ref().map_or(std::ptr::null_mut(), |gd| gd.raw_object().object_ptr())
    }
}

impl<C: EngineClass, T: Inherits<C>> ObjectArg<C> for Owned<T> {
    fn object_arg_ptr(&self) -> ObjectPtr {
        self.raw_object().object_ptr()
    }
}

/// Variant of kind `Object` holding `ptr`; it does not keep the object alive.
pub(crate) fn object_variant(ptr: ObjectPtr) -> Variant {
    codec_to_variant(&ObjectSlot(ptr))
}

/// Bare pointer in object typed storage.
struct ObjectSlot(ObjectPtr);

unsafe impl crate::meta::PtrCodec for ObjectSlot {
    const VARIANT_TYPE: VariantType = VariantType::Object;
    const SIZE: usize = std::mem::size_of::<ObjectPtr>();

    unsafe fn write_arg(&self, dst: gdx_sys::TypePtr) {
        unsafe { *dst.cast::<ObjectPtr>() = self.0 };
    }

    unsafe fn from_arg_ptr(src: gdx_sys::ConstTypePtr) -> Self {
        ObjectSlot(unsafe { *src.cast::<ObjectPtr>() })
    }

    unsafe fn from_return_slot(src: gdx_sys::TypePtr) -> Self {
        unsafe { Self::from_arg_ptr(src.cast_const()) }
    }

    unsafe fn write_return(self, dst: gdx_sys::TypePtr) {
        unsafe { self.write_arg(dst) };
    }
}

/// Object pointer held by `variant`; `None` for nil, null or freed objects.
pub(crate) fn variant_object_ptr(variant: &Variant) -> Result<Option<ObjectPtr>, VariantError> {
    match variant.get_type() {
        VariantType::Nil => Ok(None),
        VariantType::Object => {
            let mut scratch = Scratch::new();
            let ptr = unsafe {
                variant.write_to_type_storage(VariantType::Object, scratch.as_mut_ptr());
                *scratch.as_mut_ptr().cast::<ObjectPtr>()
            };
            Ok((!ptr.is_null()).then_some(ptr))
        }
        actual => Err(VariantError::TypeMismatch {
            expected: VariantType::Object,
            actual,
        }),
    }
}

// ============================================================================
// Lookup helpers used by generated code
// ============================================================================

/// The engine singleton for `T`.
///
/// # Panics
///
/// When the engine does not provide the singleton. Singletons are listed in
/// the manifest the bindings were generated from, so this only happens
/// against a mismatched engine.
pub fn singleton<T: EngineClass>() -> Gd<T> {
    let get_singleton = gdx_sys::interface_fn!(global_get_singleton);
    let ptr = gdx_sys::with_string_name(T::CLASS_NAME, |name| unsafe { get_singleton(name) });
    match unsafe { Gd::from_sys(ptr) } {
        Some(gd) => gd,
        None => panic!("engine singleton `{}` is not available", T::CLASS_NAME),
    }
}

/// Factory recorded in the class registry: `ptr` as a boxed `Gd<T>`.
pub fn factory<T: EngineClass>(ptr: ObjectPtr) -> Box<dyn Any> {
    match unsafe { Gd::<T>::from_sys(ptr) } {
        Some(gd) => Box::new(gd),
        None => Box::new(()),
    }
}

/// Wrap `ptr` as the most derived engine class the bridge knows for it.
///
/// Returns the class chosen and a boxed `Gd` of that class.
pub fn wrap_dynamic(ptr: ObjectPtr) -> Option<(&'static str, Box<dyn Any>)> {
    let class = class_name_of(ptr)?;
    let (wrapper, factory) = gdx_registry::classes().nearest_factory(&class)?;
    Some((wrapper, factory(ptr)))
}

impl Gd<Object> {
    /// Rewrap as the most derived class the bridge has a wrapper for,
    /// boxed for downcasting.
    pub fn into_dynamic(self) -> Option<(&'static str, Box<dyn Any>)> {
        wrap_dynamic(self.raw_object().object_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{Node, RefCounted, Resource};
    use crate::test_support;

    #[test]
    fn null_arguments_pass_a_null_pointer() {
        test_support::boot();
        assert!(<Null as ObjectArg<Node>>::object_arg_ptr(&Null).is_null());
        let none: Option<Gd<Node>> = None;
        assert!(ObjectArg::<Node>::object_arg_ptr(&none).is_null());
        let variant = ObjectArg::<Node>::object_arg_variant(&Null);
        assert_eq!(variant.get_type(), VariantType::Object);
        assert_eq!(variant_object_ptr(&variant), Ok(None));
    }

    #[test]
    fn dynamic_wrapping_picks_the_nearest_wrapper() {
        test_support::boot();
        let resource = Resource::new_gd();
        let (class, boxed) = wrap_dynamic(resource.raw_object().object_ptr()).unwrap();
        assert_eq!(class, "Resource");
        let wrapped = boxed.downcast::<Gd<Resource>>().unwrap();
        assert_eq!(wrapped.instance_id(), resource.instance_id());
    }

    #[test]
    fn references_taken_are_given_back() {
        test_support::boot();
        let before = live_references();
        {
            let object = RefCounted::new_gd();
            let copy = object.clone();
            assert_eq!(live_references() - before, 2);
            drop(copy);
            assert_eq!(live_references() - before, 1);
        }
        assert_eq!(live_references(), before);
    }

    #[test]
    fn freed_objects_do_not_wrap() {
        test_support::boot();
        let node = Node::new_alloc();
        let ptr = node.raw_object().object_ptr();
        drop(node);
        assert!(unsafe { RawObject::new(ptr, false) }.is_none());
        assert!(class_name_of(ptr).is_none());
        assert!(unsafe { Gd::<Node>::from_sys(ptr) }.is_none());
    }
}

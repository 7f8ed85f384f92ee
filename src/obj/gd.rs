use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};

use gdx_sys::{ConstTypePtr, ObjectId, ObjectPtr, TypePtr, VariantType};

use crate::builtin::ArrayElement;
use crate::meta::{FromVariant, PtrCodec, ToVariant};
use crate::obj::{
    EngineClass, Inherits, Memory, ObjectError, Owned, RawObject, WeakGd, add_reference, cast_ptr,
    class_name_of, object_from_id, object_variant, release_reference, transfer_reference,
    variant_object_ptr,
};
use crate::variant::{Variant, VariantError};

/// Handle to an engine object the caller does not free.
///
/// For reference counted objects the handle holds one reference: clones add
/// one, drops give one back and the last drop destroys the object. Other
/// objects belong to the engine (or to an [`Owned`] somewhere) and the
/// handle only borrows them; they may be freed under it, which
/// [`is_instance_valid`](Self::is_instance_valid) detects.
pub struct Gd<T: EngineClass> {
    inner: T,
}

impl<T: EngineClass> Gd<T> {
    pub(super) fn wrap(raw: RawObject) -> Self {
        Self {
            inner: T::from_raw_object(raw),
        }
    }

    /// Give up the handle without releasing anything.
    fn into_raw_object(self) -> RawObject {
        let this = ManuallyDrop::new(self);
        let raw = this.inner.raw_object();
        RawObject {
            ptr: raw.ptr,
            id: raw.id,
            counted: raw.counted,
        }
    }

    /// Construct a new `T` through the engine.
    ///
    /// # Panics
    ///
    /// When the engine cannot construct the class; generated constructors
    /// only exist for instantiable classes.
    pub fn new_instance() -> Self {
        let ptr = construct_object(T::CLASS_NAME);
        match unsafe { Self::from_sys(ptr) } {
            Some(gd) => gd,
            None => panic!("engine failed to construct `{}`", T::CLASS_NAME),
        }
    }

    /// Wrap an object the engine handed out, taking a reference when it is
    /// reference counted.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or an engine object of class `T` or a subclass.
    pub unsafe fn from_sys(ptr: ObjectPtr) -> Option<Self> {
        let raw = unsafe { RawObject::new(ptr, false) }?;
        let counted = T::MEMORY != Memory::Manual && add_reference(ptr);
        Some(Self::wrap(RawObject { counted, ..raw }))
    }

    /// Wrap an object the engine keeps ownership of; nothing is released
    /// when the handle drops.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or an engine object of class `T` or a subclass.
    pub unsafe fn from_engine_owned(ptr: ObjectPtr) -> Option<Self> {
        unsafe { RawObject::new(ptr, false) }.map(Self::wrap)
    }

    /// Take over a pointer produced by [`into_raw`](Self::into_raw),
    /// including the reference it carries.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `into_raw` on a `Gd` of `T` or a subclass, and
    /// must not be taken over twice.
    pub unsafe fn from_raw(ptr: ObjectPtr) -> Option<Self> {
        let raw = unsafe { RawObject::new(ptr, false) }?;
        let counted = T::MEMORY != Memory::Manual && cast_ptr(ptr, "RefCounted").is_some();
        if counted {
            transfer_reference(1);
        }
        Some(Self::wrap(RawObject { counted, ..raw }))
    }

    /// Object pointer, handing the handle's reference (if any) to the caller.
    pub fn into_raw(self) -> ObjectPtr {
        let raw = self.into_raw_object();
        if raw.counted {
            transfer_reference(-1);
        }
        raw.ptr
    }

    /// Live object with instance id `id`, if it is a `T`.
    pub fn from_instance_id(id: ObjectId) -> Result<Self, ObjectError> {
        let ptr = object_from_id(id).ok_or(ObjectError::Freed)?;
        if cast_ptr(ptr, T::CLASS_NAME).is_none() {
            return Err(ObjectError::CastFailed {
                from: class_name_of(ptr).unwrap_or_default(),
                to: T::CLASS_NAME,
            });
        }
        unsafe { Self::from_sys(ptr) }.ok_or(ObjectError::Freed)
    }

    pub fn instance_id(&self) -> ObjectId {
        self.inner.raw_object().instance_id()
    }

    /// Whether the object is still alive.
    pub fn is_instance_valid(&self) -> bool {
        self.inner.raw_object().is_alive()
    }

    /// Dynamic class name of the object.
    pub fn class_name(&self) -> Option<String> {
        self.inner.raw_object().class_name()
    }

    /// Convert to a base class handle.
    pub fn upcast<B: EngineClass>(self) -> Gd<B>
    where
        T: Inherits<B>,
    {
        Gd::wrap(self.into_raw_object())
    }

    pub fn upcast_ref<B: EngineClass>(&self) -> &B
    where
        T: Inherits<B>,
    {
        // Every wrapper is transparent over the same raw object.
        unsafe { &*(&self.inner as *const T).cast::<B>() }
    }

    pub fn upcast_mut<B: EngineClass>(&mut self) -> &mut B
    where
        T: Inherits<B>,
    {
        unsafe { &mut *(&mut self.inner as *mut T).cast::<B>() }
    }

    /// Convert to `U` when the object is one, returning the handle
    /// unchanged otherwise.
    pub fn try_cast<U: EngineClass>(self) -> Result<Gd<U>, Self> {
        if !self.is_instance_valid() {
            return Err(self);
        }
        match cast_ptr(self.inner.raw_object().object_ptr(), U::CLASS_NAME) {
            Some(_) => Ok(Gd::wrap(self.into_raw_object())),
            None => Err(self),
        }
    }

    /// Convert to `U`, dropping the handle on failure.
    pub fn cast<U: EngineClass>(self) -> Result<Gd<U>, ObjectError> {
        if !self.is_instance_valid() {
            return Err(ObjectError::Freed);
        }
        self.try_cast().map_err(|this| ObjectError::CastFailed {
            from: this.class_name().unwrap_or_default(),
            to: U::CLASS_NAME,
        })
    }

    pub fn downgrade(&self) -> WeakGd<T> {
        WeakGd::new(self.instance_id())
    }

    /// Claim an object the engine handed back unowned, such as a node
    /// created by an engine method and not yet added to a tree.
    ///
    /// Reference counted handles are returned unchanged.
    ///
    /// # Safety
    ///
    /// Nothing else may free the object afterwards.
    pub unsafe fn take_ownership(self) -> Result<Owned<T>, Self> {
        if self.inner.raw_object().is_counted() {
            return Err(self);
        }
        let raw = self.into_raw_object();
        Ok(unsafe { Owned::from_raw_object(raw) })
    }
}

impl<T: EngineClass> Deref for Gd<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: EngineClass> DerefMut for Gd<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: EngineClass> Clone for Gd<T> {
    fn clone(&self) -> Self {
        let raw = self.inner.raw_object();
        let counted = raw.counted && add_reference(raw.ptr);
        Self::wrap(RawObject { counted, ..raw.borrowed() })
    }
}

impl<T: EngineClass> Drop for Gd<T> {
    fn drop(&mut self) {
        let raw = self.inner.raw_object();
        if raw.counted {
            release_reference(raw.ptr);
        }
    }
}

impl<T: EngineClass> PartialEq for Gd<T> {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id() == other.instance_id()
    }
}

impl<T: EngineClass> Eq for Gd<T> {}

impl<T: EngineClass> fmt::Debug for Gd<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gd")
            .field("class", &T::CLASS_NAME)
            .field("id", &self.instance_id())
            .finish()
    }
}

pub(crate) fn construct_object(class: &str) -> ObjectPtr {
    let construct = gdx_sys::interface_fn!(classdb_construct_object);
    gdx_sys::with_string_name(class, |name| unsafe { construct(name) })
}

// ============================================================================
// Codecs
// ============================================================================

/// Object slots hold a bare pointer; null reads as `None`.
unsafe impl<T: EngineClass> PtrCodec for Option<Gd<T>> {
    const VARIANT_TYPE: VariantType = VariantType::Object;
    const SIZE: usize = std::mem::size_of::<ObjectPtr>();
    const CLASS_NAME: Option<&'static str> = Some(T::CLASS_NAME);

    unsafe fn write_arg(&self, dst: TypePtr) {
        let ptr = self.as_ref().map_or(std::ptr::null_mut(), |gd| gd.raw_object().object_ptr());
        unsafe { *dst.cast::<ObjectPtr>() = ptr };
    }

    unsafe fn from_arg_ptr(src: ConstTypePtr) -> Self {
        unsafe { Gd::from_sys(*src.cast::<ObjectPtr>()) }
    }

    unsafe fn from_return_slot(src: TypePtr) -> Self {
        // A returned reference counted object comes with the caller's reference.
        unsafe { Gd::from_raw(*src.cast::<ObjectPtr>()) }
    }

    unsafe fn write_return(self, dst: TypePtr) {
        let ptr = self.map_or(std::ptr::null_mut(), Gd::into_raw);
        unsafe { *dst.cast::<ObjectPtr>() = ptr };
    }
}

impl<T: EngineClass> ToVariant for Gd<T> {
    fn to_variant(&self) -> Variant {
        object_variant(self.raw_object().object_ptr())
    }
}

impl<T: EngineClass> FromVariant for Gd<T> {
    fn try_from_variant(variant: &Variant) -> Result<Self, VariantError> {
        let ptr = variant_object_ptr(variant)?.ok_or(VariantError::NullObject)?;
        if cast_ptr(ptr, T::CLASS_NAME).is_none() {
            return Err(VariantError::ClassMismatch {
                expected: T::CLASS_NAME.to_string(),
                actual: class_name_of(ptr).unwrap_or_default(),
            });
        }
        unsafe { Self::from_sys(ptr) }.ok_or(VariantError::NullObject)
    }
}

impl<T: EngineClass> From<Gd<T>> for Variant {
    fn from(gd: Gd<T>) -> Self {
        gd.to_variant()
    }
}

impl<T: EngineClass> ToVariant for Option<Gd<T>> {
    fn to_variant(&self) -> Variant {
        self.as_ref().map_or_else(Variant::nil, ToVariant::to_variant)
    }
}

impl<T: EngineClass> FromVariant for Option<Gd<T>> {
    fn try_from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant_object_ptr(variant)? {
            Some(_) => match Gd::try_from_variant(variant) {
                Ok(gd) => Ok(Some(gd)),
                // Freed objects read as null.
                Err(VariantError::NullObject) => Ok(None),
                Err(error) => Err(error),
            },
            None => Ok(None),
        }
    }
}

impl<T: EngineClass> ArrayElement for Gd<T> {
    const ELEMENT_TYPE: VariantType = VariantType::Object;

    fn class_name() -> Option<&'static str> {
        Some(T::CLASS_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{FileAccess, Node, Object, RefCounted, Resource};
    use crate::test_support;

    #[test]
    fn refcounted_handles_free_on_last_drop() {
        test_support::boot();
        let resource = Resource::new_gd();
        let id = resource.instance_id();
        let copy = resource.clone();
        assert_eq!(gdx_testengine::reference_count(id), Some(2));
        drop(resource);
        assert!(gdx_testengine::is_live(id));
        drop(copy);
        assert!(gdx_testengine::is_destroyed(id));
    }

    #[test]
    fn casts_check_the_dynamic_class() {
        test_support::boot();
        let resource = Resource::new_gd();
        let id = resource.instance_id();
        let object: Gd<Object> = resource.upcast();
        let back = object.try_cast::<Resource>().unwrap();
        assert_eq!(back.instance_id(), id);
        let failed = back.upcast::<RefCounted>().cast::<Node>();
        assert_eq!(
            failed,
            Err(ObjectError::CastFailed {
                from: "Resource".to_string(),
                to: "Node"
            })
        );
        assert!(gdx_testengine::is_destroyed(id));
    }

    #[test]
    fn engine_owned_handles_release_nothing() {
        test_support::boot();
        let node = Node::new_alloc();
        let id = node.instance_id();
        let borrowed = Gd::<Node>::from_instance_id(id).unwrap();
        drop(borrowed);
        assert!(gdx_testengine::is_live(id));
        drop(node);
        assert!(gdx_testengine::is_destroyed(id));
        assert_eq!(Gd::<Node>::from_instance_id(id), Err(ObjectError::Freed));
    }

    #[test]
    fn borrowed_handles_notice_frees() {
        test_support::boot();
        let node = Node::new_alloc();
        let view = node.share();
        assert!(view.is_instance_valid());
        drop(node);
        assert!(!view.is_instance_valid());
        assert_eq!(view.cast::<Object>(), Err(ObjectError::Freed));
    }

    #[test]
    fn raw_round_trip_keeps_the_reference() {
        test_support::boot();
        let resource = Resource::new_gd();
        let id = resource.instance_id();
        let ptr = resource.into_raw();
        assert_eq!(gdx_testengine::reference_count(id), Some(1));
        let back = unsafe { Gd::<Resource>::from_raw(ptr) }.unwrap();
        assert_eq!(gdx_testengine::reference_count(id), Some(1));
        drop(back);
        assert!(gdx_testengine::is_destroyed(id));
    }

    #[test]
    fn object_variants_check_class_and_liveness() {
        test_support::boot();
        let resource = Resource::new_gd();
        let variant = resource.to_variant();
        assert_eq!(variant.get_type(), VariantType::Object);
        assert_eq!(Gd::<Resource>::try_from_variant(&variant).unwrap(), resource);
        assert!(matches!(
            Gd::<Node>::try_from_variant(&variant),
            Err(VariantError::ClassMismatch { .. })
        ));

        let node = Node::new_alloc();
        let variant = node.share().to_variant();
        drop(node);
        assert_eq!(variant.get_type(), VariantType::Object);
        assert_eq!(Option::<Gd<Node>>::try_from_variant(&variant), Ok(None));
        assert_eq!(Option::<Gd<Node>>::try_from_variant(&Variant::nil()), Ok(None));
    }

    #[test]
    fn refcounted_engine_returns_are_counted_once() {
        test_support::boot();
        let before = crate::obj::live_references();
        let mode = crate::classes::file_access::ModeFlags::READ;
        let file = FileAccess::open(&"res://missing.txt".into(), mode);
        assert!(file.is_none());
        assert_eq!(crate::obj::live_references(), before);
    }
}

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use gdx_sys::{ClassInstancePtr, ObjectId, ObjectPtr, PropertyInfo};

use crate::builtin::StringName;
use crate::obj::{EngineClass, Gd, Inherits, ObjectArg, ObjectError, RawObject};
use crate::registrar::{ClassRuntime, HostClass};

/// Engine-side state of one host object, attached to the engine object with
/// `object_set_instance` and freed by the free-instance callback.
#[doc(hidden)]
pub struct InstanceStorage<T: HostClass> {
    value: RefCell<T>,
    pub(super) runtime: &'static ClassRuntime<T>,
    /// Property lists handed out and not yet returned.
    pub(super) property_lists: RefCell<Vec<PropertyListBuffer>>,
}

impl<T: HostClass> InstanceStorage<T> {
    pub(super) fn new(value: T, runtime: &'static ClassRuntime<T>) -> Self {
        Self {
            value: RefCell::new(value),
            runtime,
            property_lists: RefCell::new(Vec::new()),
        }
    }

    /// # Safety
    ///
    /// `instance` must come from [`into_instance_ptr`](Self::into_instance_ptr)
    /// for the same `T` and not be freed yet.
    pub(super) unsafe fn from_instance<'a>(instance: ClassInstancePtr) -> &'a Self {
        unsafe { &*instance.cast::<Self>() }
    }

    pub(super) fn into_instance_ptr(self: Box<Self>) -> ClassInstancePtr {
        Box::into_raw(self).cast()
    }

    /// # Safety
    ///
    /// As for [`from_instance`](Self::from_instance); afterwards the pointer
    /// is dangling.
    pub(super) unsafe fn free(instance: ClassInstancePtr) {
        drop(unsafe { Box::from_raw(instance.cast::<Self>()) });
    }

    /// # Panics
    ///
    /// When the instance is already mutably bound, e.g. by a callback that
    /// re-entered it.
    pub(super) fn borrow(&self) -> Ref<'_, T> {
        match self.value.try_borrow() {
            Ok(value) => value,
            Err(_) => panic!("`{}` instance is already bound mutably", T::CLASS_NAME),
        }
    }

    /// # Panics
    ///
    /// When the instance is already bound.
    pub(super) fn borrow_mut(&self) -> RefMut<'_, T> {
        match self.value.try_borrow_mut() {
            Ok(value) => value,
            Err(_) => panic!("`{}` instance is already bound", T::CLASS_NAME),
        }
    }
}

/// A property list handed to the engine, with the names its entries point
/// into.
pub(super) struct PropertyListBuffer {
    pub(super) infos: Vec<PropertyInfo>,
    pub(super) _names: Vec<StringName>,
}

/// Run `f` on the host object behind `instance`.
///
/// Used by the virtual forwarding stubs of every `I<Class>` trait.
///
/// # Safety
///
/// `instance` must be an instance pointer the engine passed to a callback
/// registered for `T`.
///
/// # Panics
///
/// When the instance is already bound; callbacks catch the panic and report
/// it to the engine.
pub unsafe fn with_instance<T: HostClass, R>(
    instance: ClassInstancePtr,
    f: impl FnOnce(&mut T) -> R,
) -> R {
    let storage = unsafe { InstanceStorage::<T>::from_instance(instance) };
    let mut value = storage.borrow_mut();
    f(&mut value)
}

// ============================================================================
// Base
// ============================================================================

/// The engine object a host object extends.
///
/// Held as a field of the host type. It does not keep the object alive: the
/// engine object owns the host object, not the other way round.
pub struct Base<B: EngineClass> {
    inner: B,
}

impl<B: EngineClass> Base<B> {
    pub(super) fn new(raw: RawObject) -> Self {
        Self {
            inner: B::from_raw_object(raw),
        }
    }

    /// A handle to the base object, as the handle rules of `B` prescribe.
    pub fn to_gd(&self) -> Gd<B> {
        match unsafe { Gd::from_sys(self.inner.raw_object().object_ptr()) } {
            Some(gd) => gd,
            None => panic!("base object of a live `{}` instance is gone", B::CLASS_NAME),
        }
    }

    pub fn instance_id(&self) -> ObjectId {
        self.inner.raw_object().instance_id()
    }
}

impl<B: EngineClass> Deref for Base<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.inner
    }
}

impl<B: EngineClass> DerefMut for Base<B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.inner
    }
}

impl<B: EngineClass> fmt::Debug for Base<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base")
            .field("class", &B::CLASS_NAME)
            .field("id", &self.instance_id())
            .finish()
    }
}

// ============================================================================
// Instance
// ============================================================================

/// Handle to an object of a registered host class.
///
/// Release rules follow the engine base class: a reference counted base is
/// counted like [`Gd`], any other base is borrowed and must be attached to a
/// tree or [`free`](Self::free)d.
pub struct Instance<T: HostClass> {
    base: Gd<T::Base>,
    _class: PhantomData<fn() -> T>,
}

impl<T: HostClass> Instance<T> {
    /// Construct a new object through the engine, which calls back into the
    /// registered create callback.
    pub fn new() -> Result<Self, ObjectError> {
        let ptr = crate::obj::construct_object(T::CLASS_NAME);
        let base = unsafe { Gd::<T::Base>::from_sys(ptr) }.ok_or(ObjectError::Null)?;
        Self::from_gd(base)
    }

    /// View `base` as a `T`, checking it carries a `T` instance.
    pub fn from_gd(base: Gd<T::Base>) -> Result<Self, ObjectError> {
        if !base.is_instance_valid() {
            return Err(ObjectError::Freed);
        }
        let class = base.class_name().unwrap_or_default();
        if class != T::CLASS_NAME || instance_ptr(base.raw_object().object_ptr()).is_null() {
            return Err(ObjectError::CastFailed {
                from: class,
                to: T::CLASS_NAME,
            });
        }
        Ok(Self {
            base,
            _class: PhantomData,
        })
    }

    fn storage(&self) -> &InstanceStorage<T> {
        let ptr = instance_ptr(self.base.raw_object().object_ptr());
        if ptr.is_null() {
            panic!("`{}` instance used after its object was freed", T::CLASS_NAME);
        }
        unsafe { InstanceStorage::from_instance(ptr) }
    }

    /// Shared access to the host object.
    ///
    /// # Panics
    ///
    /// When the object was freed or is bound mutably.
    pub fn bind(&self) -> Ref<'_, T> {
        self.storage().borrow()
    }

    /// Exclusive access to the host object.
    ///
    /// # Panics
    ///
    /// When the object was freed or is already bound.
    pub fn bind_mut(&mut self) -> RefMut<'_, T> {
        self.storage().borrow_mut()
    }

    pub fn base(&self) -> &Gd<T::Base> {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Gd<T::Base> {
        &mut self.base
    }

    pub fn into_base(self) -> Gd<T::Base> {
        self.base
    }

    /// Upcast to any engine ancestor of the base class.
    pub fn upcast<B: EngineClass>(self) -> Gd<B>
    where
        T::Base: Inherits<B>,
    {
        self.base.upcast()
    }

    pub fn instance_id(&self) -> ObjectId {
        self.base.instance_id()
    }

    pub fn is_instance_valid(&self) -> bool {
        self.base.is_instance_valid()
    }

    /// Destroy the object now. Reference counted objects are left to their
    /// last reference.
    ///
    /// # Safety
    ///
    /// Nothing else may free the object, and no other handle may bind it
    /// afterwards.
    pub unsafe fn free(self) {
        let ptr = self.base.raw_object().object_ptr();
        if self.base.raw_object().is_counted() {
            crate::engine_warn!(
                "`{}` is reference counted; dropping the handle instead of freeing",
                T::CLASS_NAME
            );
            return;
        }
        if !self.is_instance_valid() {
            crate::engine_error!("`{}` instance freed twice", T::CLASS_NAME);
            return;
        }
        drop(self);
        let destroy = gdx_sys::interface_fn!(object_destroy);
        unsafe { destroy(ptr) };
    }
}

impl<T: HostClass> Clone for Instance<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            _class: PhantomData,
        }
    }
}

impl<T: HostClass> PartialEq for Instance<T> {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}

impl<T: HostClass> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &T::CLASS_NAME)
            .field("id", &self.instance_id())
            .finish()
    }
}

impl<C: EngineClass, T: HostClass> ObjectArg<C> for Instance<T>
where
    T::Base: Inherits<C>,
{
    fn object_arg_ptr(&self) -> ObjectPtr {
        self.base.raw_object().object_ptr()
    }
}

fn instance_ptr(object: ObjectPtr) -> ClassInstancePtr {
    let get_instance = gdx_sys::interface_fn!(object_get_instance);
    unsafe { get_instance(object.cast_const()) }
}

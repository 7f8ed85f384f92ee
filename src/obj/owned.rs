use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};

use gdx_sys::{ObjectId, ObjectPtr};

use crate::classes::Node;
use crate::obj::gd::construct_object;
use crate::obj::{EngineClass, Gd, Inherits, RawObject, WeakGd};

/// Engine object the caller must free: dropping the handle destroys it.
///
/// Hand ownership to the engine with [`attach`](Self::attach) once the
/// object belongs to something that frees it, e.g. a parent node.
pub struct Owned<T: EngineClass> {
    inner: T,
}

impl<T: EngineClass> Owned<T> {
    /// Construct a new `T` through the engine.
    ///
    /// # Panics
    ///
    /// When the engine cannot construct the class.
    pub fn new_instance() -> Self {
        let ptr = construct_object(T::CLASS_NAME);
        match unsafe { Self::from_raw(ptr) } {
            Some(owned) => owned,
            None => panic!("engine failed to construct `{}`", T::CLASS_NAME),
        }
    }

    /// Take ownership of `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or an engine object of class `T` that nothing else
    /// frees.
    pub unsafe fn from_raw(ptr: ObjectPtr) -> Option<Self> {
        let raw = unsafe { RawObject::new(ptr, false) }?;
        Some(unsafe { Self::from_raw_object(raw) })
    }

    /// # Safety
    ///
    /// As for [`from_raw`](Self::from_raw).
    pub(crate) unsafe fn from_raw_object(raw: RawObject) -> Self {
        owners::claim(raw.id);
        Self {
            inner: T::from_raw_object(RawObject { counted: false, ..raw }),
        }
    }

    /// Give up ownership without freeing; the caller becomes responsible.
    pub fn into_raw(self) -> ObjectPtr {
        let this = ManuallyDrop::new(self);
        let raw = this.inner.raw_object();
        owners::release(raw.id);
        raw.ptr
    }

    /// Hand ownership to the engine, keeping a borrowing handle.
    pub fn attach(self) -> Gd<T> {
        let view = self.share();
        let _ = self.into_raw();
        view
    }

    /// Add the node under `parent` and hand ownership to the tree.
    pub fn attach_to<P>(self, parent: &mut Gd<P>) -> Gd<T>
    where
        T: Inherits<Node>,
        P: Inherits<Node>,
    {
        parent.upcast_mut::<Node>().add_child(&self);
        self.attach()
    }

    /// Borrowing handle; it does not keep the object alive.
    pub fn share(&self) -> Gd<T> {
        Gd::wrap(self.inner.raw_object().borrowed())
    }

    pub fn downgrade(&self) -> WeakGd<T> {
        WeakGd::new(self.instance_id())
    }

    pub fn instance_id(&self) -> ObjectId {
        self.inner.raw_object().instance_id()
    }

    /// Destroy the object now.
    pub fn free(self) {
        drop(self);
    }
}

impl<T: EngineClass> Drop for Owned<T> {
    fn drop(&mut self) {
        let raw = self.inner.raw_object();
        owners::release(raw.id);
        if !raw.is_alive() {
            crate::engine_error!(
                "owned `{}` (id {}) was freed by someone else",
                T::CLASS_NAME,
                raw.id
            );
            return;
        }
        let destroy = gdx_sys::interface_fn!(object_destroy);
        unsafe { destroy(raw.ptr) };
    }
}

impl<T: EngineClass> Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: EngineClass> DerefMut for Owned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: EngineClass> fmt::Debug for Owned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("class", &T::CLASS_NAME)
            .field("id", &self.instance_id())
            .finish()
    }
}

/// Debug-build record of which objects have an `Owned` handle.
mod owners {
    use gdx_sys::ObjectId;

    #[cfg(debug_assertions)]
    static OWNED: std::sync::Mutex<Option<rustc_hash::FxHashSet<ObjectId>>> =
        std::sync::Mutex::new(None);

    #[cfg(debug_assertions)]
    fn with_owned<R>(f: impl FnOnce(&mut rustc_hash::FxHashSet<ObjectId>) -> R) -> R {
        let mut guard = OWNED.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(guard.get_or_insert_with(Default::default))
    }

    pub(super) fn claim(id: ObjectId) {
        #[cfg(debug_assertions)]
        assert!(with_owned(|owned| owned.insert(id)), "object {id} already has an owner");
        #[cfg(not(debug_assertions))]
        let _ = id;
    }

    pub(super) fn release(id: ObjectId) {
        #[cfg(debug_assertions)]
        assert!(with_owned(|owned| owned.remove(&id)), "object {id} released twice");
        #[cfg(not(debug_assertions))]
        let _ = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn dropping_the_owner_frees_once() {
        test_support::boot();
        let node = Node::new_alloc();
        let id = node.instance_id();
        node.free();
        assert!(gdx_testengine::is_destroyed(id));
        assert_eq!(gdx_testengine::destroyed_objects().iter().filter(|d| **d == id).count(), 1);
    }

    #[test]
    fn attached_nodes_are_freed_by_their_parent() {
        test_support::boot();
        let mut parent = Node::new_alloc().attach();
        let child = Node::new_alloc();
        let child_id = child.instance_id();
        let child = child.attach_to(&mut parent);
        assert_eq!(parent.get_child_count(), 1);
        assert!(child.is_instance_valid());

        let parent = unsafe { parent.take_ownership() }.unwrap();
        drop(parent);
        assert!(gdx_testengine::is_destroyed(child_id));
        assert!(!child.is_instance_valid());
    }

    #[test]
    fn raw_hand_off_skips_the_free() {
        test_support::boot();
        let node = Node::new_alloc();
        let id = node.instance_id();
        let ptr = node.into_raw();
        assert!(gdx_testengine::is_live(id));
        let node = unsafe { Owned::<Node>::from_raw(ptr) }.unwrap();
        drop(node);
        assert!(gdx_testengine::is_destroyed(id));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "already has an owner")]
    fn two_owners_are_rejected() {
        test_support::boot();
        let node = Node::new_alloc();
        let ptr = node.raw_object().object_ptr();
        let _second = unsafe { Owned::<Node>::from_raw(ptr) };
    }
}

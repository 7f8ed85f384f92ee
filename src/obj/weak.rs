use std::fmt;
use std::marker::PhantomData;

use gdx_sys::ObjectId;

use crate::obj::{EngineClass, Gd, object_from_id};

/// Instance id of an object that may be freed at any time.
///
/// Holds no reference and no ownership; [`upgrade`](Self::upgrade) asks the
/// engine whether the id is still live.
pub struct WeakGd<T: EngineClass> {
    id: ObjectId,
    _class: PhantomData<fn() -> T>,
}

impl<T: EngineClass> WeakGd<T> {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self {
            id,
            _class: PhantomData,
        }
    }

    pub fn instance_id(&self) -> ObjectId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        object_from_id(self.id).is_some()
    }

    /// Strong handle when the object still exists.
    pub fn upgrade(&self) -> Option<Gd<T>> {
        let ptr = object_from_id(self.id)?;
        unsafe { Gd::from_sys(ptr) }
    }
}

impl<T: EngineClass> Clone for WeakGd<T> {
    fn clone(&self) -> Self {
        Self::new(self.id)
    }
}

impl<T: EngineClass> Copy for WeakGd<T> {}

impl<T: EngineClass> PartialEq for WeakGd<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: EngineClass> fmt::Debug for WeakGd<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakGd")
            .field("class", &T::CLASS_NAME)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::classes::{Node, Resource};
    use crate::test_support;

    #[test]
    fn weak_handles_do_not_keep_objects_alive() {
        test_support::boot();
        let resource = Resource::new_gd();
        let weak = resource.downgrade();
        assert_eq!(weak.upgrade().as_ref(), Some(&resource));
        drop(resource);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn upgrade_fails_after_free() {
        test_support::boot();
        let node = Node::new_alloc();
        let weak = node.downgrade();
        assert!(weak.upgrade().is_some());
        node.free();
        assert!(weak.upgrade().is_none());
    }
}

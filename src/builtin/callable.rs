use std::fmt;

use gdx_sys::{ConstTypePtr, OpaqueCallable, OpaqueSignal, VariantType, ctor};

use crate::builtin::{StringName, construct, opaque_builtin};
use crate::classes::Object;
use crate::meta::ToVariant;
use crate::obj::ObjectArg;

/// Reference to a method on a specific object.
#[repr(transparent)]
pub struct Callable {
    opaque: OpaqueCallable,
}

opaque_builtin!(Callable => VariantType::Callable);

impl Callable {
    /// Callable invoking `method` on `object`.
    pub fn from_object_method(object: &impl ObjectArg<Object>, method: &str) -> Self {
        let method = StringName::from(method);
        let object = object.object_arg_ptr();
        let args: [ConstTypePtr; 2] = [(&object as *const gdx_sys::ObjectPtr).cast(), method.sys()];
        unsafe { construct(VariantType::Callable, ctor::FROM_STRING, &args) }
    }

    /// Whether the callable targets nothing.
    pub fn is_null(&self) -> bool {
        !self.to_variant().booleanize()
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.to_variant() == other.to_variant()
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.to_variant().stringify())
    }
}

/// Reference to a signal on a specific object.
#[repr(transparent)]
pub struct Signal {
    opaque: OpaqueSignal,
}

opaque_builtin!(Signal => VariantType::Signal);

impl Signal {
    pub fn from_object_signal(object: &impl ObjectArg<Object>, signal: &str) -> Self {
        let signal = StringName::from(signal);
        let object = object.object_arg_ptr();
        let args: [ConstTypePtr; 2] = [(&object as *const gdx_sys::ObjectPtr).cast(), signal.sys()];
        unsafe { construct(VariantType::Signal, ctor::FROM_STRING, &args) }
    }

    pub fn is_null(&self) -> bool {
        !self.to_variant().booleanize()
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.to_variant() == other.to_variant()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal({})", self.to_variant().stringify())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{Node, Resource};
    use crate::test_support;

    #[test]
    fn default_callables_are_null() {
        test_support::boot();
        assert!(Callable::default().is_null());
        assert!(Signal::default().is_null());
    }

    #[test]
    fn bound_callables_name_their_target() {
        test_support::boot();
        let resource = Resource::new_gd();
        let callable = Callable::from_object_method(&resource, "get_name");
        assert!(!callable.is_null());
        assert_eq!(callable, callable.clone());
        assert!(format!("{callable:?}").contains("get_name"));
        assert_eq!(callable.to_variant().get_type(), VariantType::Callable);

        let node = Node::new_alloc();
        let signal = Signal::from_object_signal(&node, "ready");
        assert!(format!("{signal:?}").contains("ready"));
    }
}

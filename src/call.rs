//! Call trampolines used by the generated bindings.
//!
//! Fixed-signature calls go through pointer calls: arguments are written
//! into a [`Frame`] in typed-storage form and the engine writes the result
//! into the frame's return slot. Variadic calls build variants instead and
//! report failures as [`CallError`].
//!
//! Symbols that did not resolve at startup (only possible under
//! [`MismatchPolicy::Degrade`](gdx_registry::MismatchPolicy::Degrade)) warn
//! once and produce the return type's default value.

use std::mem::MaybeUninit;
use std::sync::{Mutex, PoisonError};

use gdx_registry::{BindError, MethodBind, MethodBindCache};
use gdx_sys::{ConstTypePtr, Int, ObjectPtr, TypePtr, VariantType, ctor};
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::frame::Frame;
use crate::meta::{FromVariant, PtrCodec};
use crate::variant::{Variant, VariantError};

/// Why a variadic call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("method does not exist")]
    InvalidMethod,

    #[error("argument {index} should be `{}`", .expected.name())]
    InvalidArgument { index: i32, expected: VariantType },

    #[error("too many arguments; expected {expected}")]
    TooManyArguments { expected: i32 },

    #[error("too few arguments; expected {expected}")]
    TooFewArguments { expected: i32 },

    #[error("method called on a null instance")]
    InstanceIsNull,

    #[error("non-const method called on a const instance")]
    MethodNotConst,

    #[error("`{0}` is not available in this engine")]
    Unavailable(String),

    #[error("unexpected return value: {0}")]
    Return(#[from] VariantError),
}

impl CallError {
    /// Error reported through the interface, or `None` for success.
    pub fn from_sys(error: gdx_sys::CallError) -> Option<Self> {
        use gdx_sys::CallErrorType as Kind;

        Some(match error.kind() {
            Kind::Ok => return None,
            Kind::InvalidMethod => CallError::InvalidMethod,
            Kind::InvalidArgument => CallError::InvalidArgument {
                index: error.argument,
                expected: VariantType::from_sys(error.expected as u32),
            },
            Kind::TooManyArguments => CallError::TooManyArguments {
                expected: error.expected,
            },
            Kind::TooFewArguments => CallError::TooFewArguments {
                expected: error.expected,
            },
            Kind::InstanceIsNull => CallError::InstanceIsNull,
            Kind::MethodNotConst => CallError::MethodNotConst,
        })
    }

    /// Interface form, for reporting failures of host methods to the engine.
    pub fn to_sys(&self) -> gdx_sys::CallError {
        use gdx_sys::CallErrorType as Kind;

        let (kind, argument, expected) = match self {
            CallError::InvalidMethod | CallError::Unavailable(_) => (Kind::InvalidMethod, 0, 0),
            CallError::InvalidArgument { index, expected } => {
                (Kind::InvalidArgument, *index, expected.sys() as i32)
            }
            CallError::TooManyArguments { expected } => (Kind::TooManyArguments, 0, *expected),
            CallError::TooFewArguments { expected } => (Kind::TooFewArguments, 0, *expected),
            CallError::InstanceIsNull => (Kind::InstanceIsNull, 0, 0),
            CallError::MethodNotConst => (Kind::MethodNotConst, 0, 0),
            CallError::Return(_) => (Kind::InvalidMethod, 0, 0),
        };
        gdx_sys::CallError::new(kind, argument, expected)
    }
}

// ============================================================================
// Pointer calls
// ============================================================================

/// `Class::method` of generated method `id`, for diagnostics.
fn method_label(cache: &MethodBindCache, id: usize) -> String {
    cache
        .method_key(id)
        .map_or_else(|| format!("method #{id}"), |key| format!("{}::{}", key.class, key.method))
}

/// Pointer call of generated class method `id` on `object` (null for static
/// methods).
///
/// # Safety
///
/// `fill` must push exactly `argc` arguments matching the method's
/// signature, `R` must match its return type and `object` must be a live
/// object of the method's class.
#[cfg_attr(feature = "profiling", profiling::function)]
pub unsafe fn class_ptrcall<R: PtrCodec>(
    id: usize,
    object: ObjectPtr,
    argc: usize,
    fill: impl FnOnce(&mut Frame),
) -> R {
    let cache = gdx_registry::cache();
    match cache.method(id) {
        Some(bind) => unsafe { bind_ptrcall(bind, object, argc, fill) },
        None => {
            if cache.note_unavailable(id) {
                let name = method_label(cache, id);
                crate::engine_warn!(
                    "`{name}` is not available in this engine; returning a default value"
                );
            }
            unsafe { default_return() }
        }
    }
}

/// Pointer call through an explicitly resolved method bind.
///
/// # Safety
///
/// As for [`class_ptrcall`].
pub unsafe fn bind_ptrcall<R: PtrCodec>(
    bind: MethodBind,
    object: ObjectPtr,
    argc: usize,
    fill: impl FnOnce(&mut Frame),
) -> R {
    let ptrcall = gdx_sys::interface_fn!(object_method_bind_ptrcall);
    let mut frame = Frame::acquire(argc);
    fill(&mut frame);
    debug_assert_eq!(frame.pushed(), argc, "argument count does not match the signature");
    let args = frame.as_pointer_array();
    let ret = frame.return_slot(R::SIZE);
    unsafe {
        ptrcall(bind.as_ptr(), object, args, ret);
        R::from_return_slot(ret)
    }
}

/// Method bind for a method outside the generated tables, resolved on
/// first use.
pub fn lookup_method(class: &str, method: &str, hash: i64) -> Result<MethodBind, BindError> {
    gdx_registry::cache().resolve_method(class, method, hash)
}

/// Pointer call of generated builtin method `id` on the value at `base`.
///
/// # Safety
///
/// `base` must hold a value of the method's builtin kind; see
/// [`class_ptrcall`] for the rest.
#[cfg_attr(feature = "profiling", profiling::function)]
pub unsafe fn builtin_ptrcall<R: PtrCodec>(
    id: usize,
    base: TypePtr,
    argc: usize,
    fill: impl FnOnce(&mut Frame),
) -> R {
    let Some(method) = gdx_registry::cache().builtin_method(id) else {
        warn_once(Table::BuiltinMethod, id);
        return unsafe { default_return() };
    };
    let mut frame = Frame::acquire(argc);
    fill(&mut frame);
    let args = frame.as_pointer_array();
    let ret = frame.return_slot(R::SIZE);
    unsafe {
        method(base, args, ret, argc as i32);
        R::from_return_slot(ret)
    }
}

/// Pointer call of generated utility function `id`.
///
/// # Safety
///
/// See [`class_ptrcall`].
#[cfg_attr(feature = "profiling", profiling::function)]
pub unsafe fn utility_ptrcall<R: PtrCodec>(
    id: usize,
    argc: usize,
    fill: impl FnOnce(&mut Frame),
) -> R {
    let Some(utility) = gdx_registry::cache().utility(id) else {
        warn_once(Table::Utility, id);
        return unsafe { default_return() };
    };
    let mut frame = Frame::acquire(argc);
    fill(&mut frame);
    let args = frame.as_pointer_array();
    let ret = frame.return_slot(R::SIZE);
    unsafe {
        utility(ret, args, argc as i32);
        R::from_return_slot(ret)
    }
}

// ============================================================================
// Variadic calls
// ============================================================================

/// Variadic call of generated class method `id`.
///
/// # Safety
///
/// `object` must be a live object of the method's class (or null for static
/// methods).
#[cfg_attr(feature = "profiling", profiling::function)]
pub unsafe fn class_varcall<R: FromVariant>(
    id: usize,
    object: ObjectPtr,
    fixed: &[Variant],
    varargs: &[Variant],
) -> Result<R, CallError> {
    let cache = gdx_registry::cache();
    let Some(bind) = cache.method(id) else {
        let name = method_label(cache, id);
        if cache.note_unavailable(id) {
            crate::engine_warn!("`{name}` is not available in this engine");
        }
        return Err(CallError::Unavailable(name));
    };

    let call = gdx_sys::interface_fn!(object_method_bind_call);
    let argc = fixed.len() + varargs.len();
    let mut frame = Frame::acquire(argc);
    for arg in fixed.iter().chain(varargs) {
        frame.push_ref(arg.sys().cast());
    }
    let mut error = gdx_sys::CallError::OK;
    let mut ret = MaybeUninit::<Variant>::uninit();
    let ret = unsafe {
        call(
            bind.as_ptr(),
            object,
            frame.as_pointer_array().cast(),
            argc as Int,
            ret.as_mut_ptr().cast(),
            &mut error,
        );
        ret.assume_init()
    };
    drop(frame);

    if let Some(error) = CallError::from_sys(error) {
        return Err(error);
    }
    Ok(R::try_from_variant(&ret)?)
}

/// Variadic call of generated utility function `id`. Arguments travel as
/// variants and so does the result.
///
/// # Safety
///
/// `R` must match the utility's return kind.
#[cfg_attr(feature = "profiling", profiling::function)]
pub unsafe fn utility_varcall<R: PtrCodec>(id: usize, fixed: &[Variant], varargs: &[Variant]) -> R {
    let Some(utility) = gdx_registry::cache().utility(id) else {
        warn_once(Table::Utility, id);
        return unsafe { default_return() };
    };
    let argc = fixed.len() + varargs.len();
    let mut frame = Frame::acquire(argc);
    for arg in fixed.iter().chain(varargs) {
        frame.push_ref(arg.sys().cast());
    }
    let args = frame.as_pointer_array();
    let ret = frame.return_slot(R::SIZE);
    unsafe {
        utility(ret, args, argc as i32);
        R::from_return_slot(ret)
    }
}

// ============================================================================
// Degraded symbols
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Table {
    Utility,
    BuiltinMethod,
}

static WARNED: Mutex<Option<FxHashSet<(Table, usize)>>> = Mutex::new(None);

fn warn_once(table: Table, id: usize) {
    let first = WARNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(FxHashSet::default)
        .insert((table, id));
    if first {
        let name = match table {
            Table::Utility => crate::tables::UTILITIES.get(id).map(|key| key.name.to_string()),
            Table::BuiltinMethod => crate::tables::BUILTIN_METHODS
                .get(id)
                .map(|key| format!("{}::{}", key.kind.name(), key.method)),
        };
        crate::engine_warn!(
            "`{}` is not available in this engine; returning a default value",
            name.unwrap_or_else(|| format!("#{id}"))
        );
    }
}

/// Default value of `R`, built in typed storage the way the engine would.
pub(crate) unsafe fn default_return<R: PtrCodec>() -> R {
    let mut frame = Frame::acquire(0);
    let slot = frame.return_slot(R::SIZE);
    let kind = R::VARIANT_TYPE;
    if R::SIZE > 0 {
        if kind == VariantType::Nil {
            unsafe { std::ptr::write(slot.cast::<Variant>(), Variant::nil()) };
        } else if crate::builtin::OPAQUE_KINDS.contains(&kind) {
            let construct = crate::builtin::constructor(kind, ctor::DEFAULT);
            unsafe { construct(slot, std::ptr::null::<ConstTypePtr>()) };
        }
    }
    // Plain kinds and object pointers default to zeroed storage.
    unsafe { R::from_return_slot(slot) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{GString, Vector2};
    use crate::classes::{Node, Object, Resource};
    use crate::obj::EngineClass;
    use crate::test_support;

    #[test]
    fn ptrcalls_marshal_arguments_and_returns() {
        test_support::boot();
        let mut resource = Resource::new_gd();
        resource.set_name(&GString::from("sword"));
        assert_eq!(resource.get_name(), "sword");
        assert_eq!(crate::utilities::absi(-7), 7);
        assert_eq!(crate::utilities::lerpf(0.0, 10.0, 0.25), 2.5);
        assert_eq!(Vector2::new(3.0, 4.0).length(), 5.0);
        assert_eq!(crate::frame::live_frames(), 0);
    }

    #[test]
    fn object_returns_wrap_engine_owned_nodes() {
        test_support::boot();
        let mut parent = Node::new_alloc();
        let child = Node::new_alloc().attach_to(&mut parent.share());
        let fetched = parent.get_child(0).unwrap();
        assert_eq!(fetched, child);
        assert!(parent.get_child(3).is_none());
    }

    #[test]
    fn varcalls_report_engine_errors() {
        test_support::boot();
        let mut object = Resource::new_gd().upcast::<Object>();
        let name = object.call(&"get_name".into(), &[]).unwrap();
        assert_eq!(name.get_type(), VariantType::String);
        assert_eq!(object.call(&"no_such_method".into(), &[]), Err(CallError::InvalidMethod));
        let error = object.call(&"set_name".into(), &[]).unwrap_err();
        assert_eq!(error, CallError::TooFewArguments { expected: 1 });
    }

    #[test]
    fn vararg_utilities_take_any_arguments() {
        test_support::boot();
        let rest = [Variant::from(1i64), Variant::from(true)];
        let text = crate::utilities::str(&Variant::from("a"), &rest);
        assert_eq!(text, "a1true");
        crate::utilities::print(&Variant::from("hello"), &[Variant::from(2i64)]);
        assert!(gdx_testengine::captured_output().iter().any(|line| line == "hello2"));
    }

    #[test]
    fn sys_errors_map_both_ways() {
        let error = CallError::InvalidArgument {
            index: 1,
            expected: VariantType::Int,
        };
        assert_eq!(CallError::from_sys(error.to_sys()), Some(error));
        assert_eq!(CallError::from_sys(gdx_sys::CallError::OK), None);
        assert_eq!(
            CallError::from_sys(CallError::TooManyArguments { expected: 2 }.to_sys()),
            Some(CallError::TooManyArguments { expected: 2 })
        );
    }

    #[test]
    fn resolved_binds_are_memoized() {
        test_support::boot();
        let key = crate::tables::METHODS
            .iter()
            .find(|key| key.class == "Node" && key.method == "get_child_count")
            .unwrap();
        let first = lookup_method(key.class, key.method, key.hash).unwrap();
        assert_eq!(lookup_method(key.class, key.method, key.hash).unwrap(), first);
        assert!(lookup_method("Node", "get_child_count", key.hash ^ 1).is_err());

        let node = Node::new_alloc();
        let count: i64 = unsafe { bind_ptrcall(first, node.raw_object().object_ptr(), 0, |_| {}) };
        assert_eq!(count, 0);
    }
}

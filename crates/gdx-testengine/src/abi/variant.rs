use std::sync::Arc;

use gdx_sys::{
    Bool, CallError, CallErrorType, ConstStringNamePtr, ConstTypePtr, ConstVariantPtr, Int,
    PtrBuiltInMethod, PtrConstructor, PtrDestructor, PtrUtilityFunction,
    TypeFromVariantConstructorFunc, TypePtr, UninitStringPtr, UninitTypePtr, UninitVariantPtr,
    VariantFromTypeConstructorFunc, VariantPtr, VariantType, VariantTypeRaw, ctor,
};

use super::{name_arg, var_arg, write_var};
use crate::value::{GStr, Name, NodePathBody, Var};
use crate::{builtins, objects, ops, typed};

pub(super) unsafe extern "C" fn variant_new_copy(dst: UninitVariantPtr, src: ConstVariantPtr) {
    unsafe { write_var(dst, var_arg(src).clone()) };
}

pub(super) unsafe extern "C" fn variant_new_nil(dst: UninitVariantPtr) {
    unsafe { write_var(dst, Var::nil()) };
}

pub(super) unsafe extern "C" fn variant_destroy(value: VariantPtr) {
    if !value.is_null() {
        unsafe { std::ptr::drop_in_place(value.cast::<Var>()) };
    }
}

pub(super) unsafe extern "C" fn variant_get_type(value: ConstVariantPtr) -> VariantTypeRaw {
    unsafe { var_arg(value) }.kind().sys()
}

pub(super) unsafe extern "C" fn variant_booleanize(value: ConstVariantPtr) -> Bool {
    ops::booleanize(unsafe { var_arg(value) }) as Bool
}

pub(super) unsafe extern "C" fn variant_equal(a: ConstVariantPtr, b: ConstVariantPtr) -> Bool {
    ops::equal(unsafe { var_arg(a) }, unsafe { var_arg(b) }) as Bool
}

pub(super) unsafe extern "C" fn variant_hash(value: ConstVariantPtr) -> Int {
    ops::hash(unsafe { var_arg(value) })
}

pub(super) unsafe extern "C" fn variant_stringify(value: ConstVariantPtr, out: UninitStringPtr) {
    let text = ops::stringify(unsafe { var_arg(value) });
    unsafe { *out.cast::<usize>() = GStr::new(text).into_word() };
}

pub(super) unsafe extern "C" fn variant_can_convert_strict(
    from: VariantTypeRaw,
    to: VariantTypeRaw,
) -> Bool {
    ops::can_convert_strict(VariantType::from_sys(from), VariantType::from_sys(to)) as Bool
}

/// Construct `kind` from variant arguments: none for the default value, one
/// for a strict conversion, two for callables and signals.
pub(super) unsafe extern "C" fn variant_construct(
    kind: VariantTypeRaw,
    dst: UninitVariantPtr,
    args: *const ConstVariantPtr,
    argc: i32,
    error: *mut CallError,
) {
    let kind = VariantType::from_sys(kind);
    let args: Vec<&Var> = (0..usize::try_from(argc).unwrap_or_default())
        .map(|i| unsafe { var_arg(*args.add(i)) })
        .collect();
    let result = construct(kind, &args);
    unsafe {
        match result {
            Ok(value) => {
                write_var(dst, value);
                if !error.is_null() {
                    *error = CallError::OK;
                }
            }
            Err(err) => {
                write_var(dst, Var::nil());
                if !error.is_null() {
                    *error = err;
                }
            }
        }
    }
}

fn construct(kind: VariantType, args: &[&Var]) -> Result<Var, CallError> {
    match args {
        [] => Ok(ops::default_of(kind)),
        [value] => ops::convert(value, kind)
            .ok_or(CallError::new(CallErrorType::InvalidArgument, 0, kind.sys() as i32)),
        [target, name] if matches!(kind, VariantType::Callable | VariantType::Signal) => {
            let address = objects::live_address(target);
            let name = Name::intern(&name.text().unwrap_or_default());
            Ok(if kind == VariantType::Callable {
                Var::from_callable(address, name)
            } else {
                Var::from_signal(address, name)
            })
        }
        _ => Err(CallError::new(CallErrorType::TooManyArguments, 0, 1)),
    }
}

// ============================================================================
// Per-kind function tables
// ============================================================================

unsafe extern "C" fn from_type<const K: u32>(dst: UninitVariantPtr, src: TypePtr) {
    unsafe { write_var(dst, typed::read(VariantType::from_sys(K), src.cast_const())) };
}

unsafe extern "C" fn to_type<const K: u32>(dst: UninitTypePtr, src: VariantPtr) {
    unsafe { typed::write(var_arg(src.cast_const()), VariantType::from_sys(K), dst) };
}

unsafe extern "C" fn construct_default<const K: u32>(
    dst: UninitTypePtr,
    _args: *const ConstTypePtr,
) {
    let kind = VariantType::from_sys(K);
    unsafe { typed::write(&ops::default_of(kind), kind, dst) };
}

unsafe extern "C" fn construct_copy<const K: u32>(dst: UninitTypePtr, args: *const ConstTypePtr) {
    let kind = VariantType::from_sys(K);
    unsafe {
        let value = typed::read(kind, *args);
        typed::write(&value, kind, dst);
    }
}

unsafe extern "C" fn destroy<const K: u32>(value: TypePtr) {
    unsafe { typed::destroy(VariantType::from_sys(K), value) };
}

/// Build a `[fn; 38]` table indexed by kind, with `None` for nil.
macro_rules! per_kind {
    ($f:ident) => {
        [
            None,
            Some($f::<1>),
            Some($f::<2>),
            Some($f::<3>),
            Some($f::<4>),
            Some($f::<5>),
            Some($f::<6>),
            Some($f::<7>),
            Some($f::<8>),
            Some($f::<9>),
            Some($f::<10>),
            Some($f::<11>),
            Some($f::<12>),
            Some($f::<13>),
            Some($f::<14>),
            Some($f::<15>),
            Some($f::<16>),
            Some($f::<17>),
            Some($f::<18>),
            Some($f::<19>),
            Some($f::<20>),
            Some($f::<21>),
            Some($f::<22>),
            Some($f::<23>),
            Some($f::<24>),
            Some($f::<25>),
            Some($f::<26>),
            Some($f::<27>),
            Some($f::<28>),
            Some($f::<29>),
            Some($f::<30>),
            Some($f::<31>),
            Some($f::<32>),
            Some($f::<33>),
            Some($f::<34>),
            Some($f::<35>),
            Some($f::<36>),
            Some($f::<37>),
        ]
    };
}

const FROM_TYPE: [VariantFromTypeConstructorFunc; VariantType::COUNT] = per_kind!(from_type);
const TO_TYPE: [TypeFromVariantConstructorFunc; VariantType::COUNT] = per_kind!(to_type);
const DEFAULT_CONSTRUCTORS: [PtrConstructor; VariantType::COUNT] = per_kind!(construct_default);
const COPY_CONSTRUCTORS: [PtrConstructor; VariantType::COUNT] = per_kind!(construct_copy);
const DESTRUCTORS: [PtrDestructor; VariantType::COUNT] = per_kind!(destroy);

fn lookup<T: Copy>(table: &[Option<T>; VariantType::COUNT], kind: VariantTypeRaw) -> Option<T> {
    table.get(kind as usize).copied().flatten()
}

pub(super) unsafe extern "C" fn get_variant_from_type_constructor(
    kind: VariantTypeRaw,
) -> VariantFromTypeConstructorFunc {
    lookup(&FROM_TYPE, kind)
}

pub(super) unsafe extern "C" fn get_variant_to_type_constructor(
    kind: VariantTypeRaw,
) -> TypeFromVariantConstructorFunc {
    lookup(&TO_TYPE, kind)
}

// Conversions behind constructor indices 2 and 3.

unsafe extern "C" fn string_name_from_string(dst: UninitTypePtr, args: *const ConstTypePtr) {
    unsafe {
        let text = GStr::borrow_word(*(*args).cast::<usize>());
        *dst.cast::<usize>() = Name::intern(text).word();
    }
}

unsafe extern "C" fn node_path_from_string(dst: UninitTypePtr, args: *const ConstTypePtr) {
    unsafe {
        let text = GStr::borrow_word(*(*args).cast::<usize>());
        *dst.cast::<usize>() = crate::value::arc_into_word(Arc::new(NodePathBody::parse(text)));
    }
}

unsafe extern "C" fn string_from_string_name(dst: UninitTypePtr, args: *const ConstTypePtr) {
    unsafe {
        let name = Name::from_word(*(*args).cast::<usize>());
        *dst.cast::<usize>() = GStr::new(name.as_str()).into_word();
    }
}

unsafe extern "C" fn string_from_node_path(dst: UninitTypePtr, args: *const ConstTypePtr) {
    unsafe {
        let path = crate::value::arc_borrow::<NodePathBody>(*(*args).cast::<usize>());
        *dst.cast::<usize>() = GStr::new(path.text.as_str()).into_word();
    }
}

/// `Callable`/`Signal` from an object pointer slot and a method name.
unsafe extern "C" fn bound_from_object(dst: UninitTypePtr, args: *const ConstTypePtr) {
    unsafe {
        let address = *(*args).cast::<usize>();
        let name = Name::from_word(*(*args.add(1)).cast::<usize>());
        let live = objects::id_of(address).is_some_and(objects::is_live);
        let address = if live { address } else { 0 };
        *dst.cast::<[usize; 2]>() = [address, name.word()];
    }
}

pub(super) unsafe extern "C" fn variant_get_ptr_constructor(
    kind: VariantTypeRaw,
    index: i32,
) -> PtrConstructor {
    use VariantType as K;
    match (VariantType::from_sys(kind), index) {
        (_, ctor::DEFAULT) => lookup(&DEFAULT_CONSTRUCTORS, kind),
        (_, ctor::COPY) => lookup(&COPY_CONSTRUCTORS, kind),
        (K::StringName, ctor::FROM_STRING) => Some(string_name_from_string),
        (K::NodePath, ctor::FROM_STRING) => Some(node_path_from_string),
        (K::String, ctor::FROM_STRING) => Some(string_from_string_name),
        (K::String, ctor::STRING_FROM_NODE_PATH) => Some(string_from_node_path),
        (K::Callable | K::Signal, ctor::FROM_STRING) => Some(bound_from_object),
        (kind, index) => {
            crate::hooks::report_error(format!("constructor {index} of `{kind}` does not exist"));
            None
        }
    }
}

pub(super) unsafe extern "C" fn variant_get_ptr_destructor(kind: VariantTypeRaw) -> PtrDestructor {
    lookup(&DESTRUCTORS, kind)
}

pub(super) unsafe extern "C" fn variant_get_ptr_builtin_method(
    kind: VariantTypeRaw,
    method: ConstStringNamePtr,
    hash: Int,
) -> PtrBuiltInMethod {
    let name = unsafe { name_arg(method) };
    builtins::builtin_method(VariantType::from_sys(kind), name.as_str(), hash)
}

pub(super) unsafe extern "C" fn variant_get_ptr_utility_function(
    name: ConstStringNamePtr,
    hash: Int,
) -> PtrUtilityFunction {
    let name = unsafe { name_arg(name) };
    builtins::utility_function(name.as_str(), hash)
}

#[cfg(test)]
mod tests {
    use std::ffi::c_void;

    use super::*;
    use crate::typed::Slot;

    #[test]
    fn construct_converts_strictly() {
        let vector = Var::from_pod(VariantType::Vector2i, crate::value::i32s_to_bytes(&[1, 2]));
        let args = [(&vector as *const Var).cast::<c_void>()];
        let mut dst = Var::nil();
        let mut error = CallError::OK;
        unsafe {
            variant_construct(
                VariantType::Vector3i.sys(),
                (&mut dst as *mut Var).cast(),
                args.as_ptr(),
                1,
                &mut error,
            );
        }
        assert_eq!(error.kind(), CallErrorType::InvalidArgument);
        assert!(dst.is_nil());
    }

    #[test]
    fn string_name_from_string_interns() {
        let constructor = unsafe {
            variant_get_ptr_constructor(VariantType::StringName.sys(), ctor::FROM_STRING)
        }
        .unwrap();
        let text = GStr::new("hello");
        let word = text.word();
        let args = [(&word as *const usize).cast::<c_void>()];
        let mut slot = Slot::new();
        unsafe { constructor(slot.as_mut_ptr(), args.as_ptr()) };
        let name = unsafe { Name::from_word(*slot.as_ptr().cast::<usize>()) };
        assert_eq!(name, Name::intern("hello"));
    }

    #[test]
    fn nil_has_no_converters() {
        unsafe {
            assert!(get_variant_from_type_constructor(0).is_none());
            assert!(get_variant_to_type_constructor(VariantType::Int.sys()).is_some());
            assert!(variant_get_ptr_destructor(99).is_none());
        }
    }
}

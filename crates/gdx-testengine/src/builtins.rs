//! Builtin-type methods and utility functions reachable through pointer calls.
//!
//! Each entry is a plain `extern "C"` function with the signature string the
//! API manifest hashes; lookups check the caller's hash against it.

use std::sync::LazyLock;

use gdx_sys::{ConstTypePtr, PtrBuiltInMethod, PtrUtilityFunction, TypePtr, VariantType, real};

use crate::classdb::{ArgType, Signature, signature_hash};
use crate::hooks::{report_error, report_output};
use crate::value::{Var, bytes_to_reals, reals_to_bytes};
use crate::{objects, ops, typed};

type Body = fn(this: &Var, args: &[Var]) -> Var;
type UtilityBody = fn(args: &[Var]) -> Var;

type BuiltinFn = unsafe extern "C" fn(TypePtr, *const ConstTypePtr, TypePtr, i32);
type UtilityFn = unsafe extern "C" fn(TypePtr, *const ConstTypePtr, i32);

/// Read `argc` typed arguments; arguments past the declared list are variants.
unsafe fn read_args(declared: &[ArgType], args: *const ConstTypePtr, argc: i32) -> Vec<Var> {
    let count = usize::try_from(argc).unwrap_or_default();
    if args.is_null() {
        return Vec::new();
    }
    (0..count)
        .map(|i| {
            let kind = declared.get(i).map_or(typed::ANY, |arg| arg.kind);
            unsafe { typed::read(kind, *args.add(i)) }
        })
        .collect()
}

unsafe fn write_ret(signature: &Signature, value: &Var, ret: TypePtr) {
    if let Some(ret_type) = &signature.ret {
        if !ret.is_null() {
            unsafe { typed::write_return(value, ret_type.kind, ret) };
        }
    }
}

unsafe fn run_builtin(
    kind: VariantType,
    signature: &Signature,
    base: TypePtr,
    args: *const ConstTypePtr,
    ret: TypePtr,
    argc: i32,
    body: Body,
) {
    let this = unsafe { typed::read(kind, base.cast_const()) };
    let args = unsafe { read_args(&signature.args, args, argc) };
    let result = body(&this, &args);
    unsafe { write_ret(signature, &result, ret) };
}

unsafe fn run_utility(
    signature: &Signature,
    ret: TypePtr,
    args: *const ConstTypePtr,
    argc: i32,
    body: UtilityBody,
) {
    let args = unsafe { read_args(&signature.args, args, argc) };
    let result = body(&args);
    unsafe { write_ret(signature, &result, ret) };
}

macro_rules! builtin_methods {
    ($( $fn_name:ident: $kind:ident . $name:literal $sig:literal => $body:expr; )*) => {
        $(
            unsafe extern "C" fn $fn_name(
                base: TypePtr,
                args: *const ConstTypePtr,
                ret: TypePtr,
                argc: i32,
            ) {
                static SIGNATURE: LazyLock<Signature> = LazyLock::new(|| Signature::parse($sig));
                unsafe { run_builtin(VariantType::$kind, &SIGNATURE, base, args, ret, argc, $body) }
            }
        )*

        const BUILTIN_METHODS: &[(VariantType, &str, &str, BuiltinFn)] = &[
            $( (VariantType::$kind, $name, $sig, $fn_name), )*
        ];
    };
}

macro_rules! utility_functions {
    ($( $fn_name:ident: $name:literal $sig:literal => $body:expr; )*) => {
        $(
            unsafe extern "C" fn $fn_name(ret: TypePtr, args: *const ConstTypePtr, argc: i32) {
                static SIGNATURE: LazyLock<Signature> = LazyLock::new(|| Signature::parse($sig));
                unsafe { run_utility(&SIGNATURE, ret, args, argc, $body) }
            }
        )*

        const UTILITY_FUNCTIONS: &[(&str, &str, UtilityFn)] = &[
            $( ($name, $sig, $fn_name), )*
        ];
    };
}

fn reals(value: &Var) -> Vec<real> {
    bytes_to_reals(value.pod().unwrap_or_default())
}

fn vector_length(value: &Var) -> f64 {
    reals(value).iter().map(|c| f64::from(*c) * f64::from(*c)).sum::<f64>().sqrt()
}

fn contains(items: &[Var], needle: &Var) -> bool {
    items.iter().any(|item| ops::equal(item, needle))
}

builtin_methods! {
    string_length: String."length" "int() const" =>
        |this, _| Var::from_int(this.text().unwrap_or_default().chars().count() as i64);
    string_to_upper: String."to_upper" "String() const" =>
        |this, _| Var::from_str(&this.text().unwrap_or_default().to_uppercase());
    string_begins_with: String."begins_with" "bool(String) const" =>
        |this, args| {
            let prefix = args.first().and_then(Var::text).unwrap_or_default();
            Var::from_bool(this.text().unwrap_or_default().starts_with(&prefix))
        };
    vector2_length: Vector2."length" "float() const" =>
        |this, _| Var::from_float(vector_length(this));
    vector2_dot: Vector2."dot" "float(Vector2) const" =>
        |this, args| {
            let other = args.first().map(reals).unwrap_or_default();
            let dot = reals(this)
                .iter()
                .zip(&other)
                .map(|(a, b)| f64::from(*a) * f64::from(*b))
                .sum();
            Var::from_float(dot)
        };
    vector3_length: Vector3."length" "float() const" =>
        |this, _| Var::from_float(vector_length(this));
    vector3_normalized: Vector3."normalized" "Vector3() const" =>
        |this, _| {
            let length = vector_length(this);
            let mut components = reals(this);
            if length > 0.0 {
                for c in &mut components {
                    *c = (f64::from(*c) / length) as real;
                }
            }
            Var::from_pod(VariantType::Vector3, reals_to_bytes(&components))
        };
    array_size: Array."size" "int() const" =>
        |this, _| Var::from_int(this.array().map_or(0, |a| a.snapshot().len() as i64));
    array_has: Array."has" "bool(Variant) const" =>
        |this, args| {
            let items = this.array().map(|a| a.snapshot()).unwrap_or_default();
            Var::from_bool(args.first().is_some_and(|needle| contains(&items, needle)))
        };
    array_reverse: Array."reverse" "void()" =>
        |this, _| {
            if let Some(body) = this.array() {
                crate::value::lock(&body.items).reverse();
            }
            Var::nil()
        };
    dictionary_size: Dictionary."size" "int() const" =>
        |this, _| Var::from_int(this.dict().map_or(0, |d| d.snapshot().len() as i64));
    dictionary_has: Dictionary."has" "bool(Variant) const" =>
        |this, args| {
            let entries = this.dict().map(|d| d.snapshot()).unwrap_or_default();
            let keys: Vec<Var> = entries.into_iter().map(|(k, _)| k).collect();
            Var::from_bool(args.first().is_some_and(|needle| contains(&keys, needle)))
        };
    packed_byte_array_size: PackedByteArray."size" "int() const" =>
        |this, _| Var::from_int(this.packed().map_or(0, |p| p.len() as i64));
}

fn concat(args: &[Var]) -> String {
    args.iter().map(ops::stringify).collect()
}

utility_functions! {
    utility_print: "print" "void(Variant) vararg" =>
        |args| {
            report_output(concat(args));
            Var::nil()
        };
    utility_str: "str" "String(Variant) vararg" =>
        |args| Var::from_str(&concat(args));
    utility_absi: "absi" "int(int)" =>
        |args| Var::from_int(args.first().and_then(Var::as_int).unwrap_or_default().wrapping_abs());
    utility_absf: "absf" "float(float)" =>
        |args| Var::from_float(args.first().and_then(Var::as_float).unwrap_or_default().abs());
    utility_lerpf: "lerpf" "float(float,float,float)" =>
        |args| {
            let v = |i: usize| args.get(i).and_then(Var::as_float).unwrap_or_default();
            Var::from_float(v(0) + (v(1) - v(0)) * v(2))
        };
    utility_typeof: "typeof" "int(Variant)" =>
        |args| Var::from_int(args.first().map_or(0, |v| v.kind().sys() as i64));
    utility_is_instance_valid: "is_instance_valid" "bool(Variant)" =>
        |args| Var::from_bool(args.first().is_some_and(|v| objects::live_address(v) != 0));
}

/// Builtin method `kind.name`, `None` when unknown or when `hash` does not
/// match the engine's signature.
pub fn builtin_method(kind: VariantType, name: &str, hash: i64) -> PtrBuiltInMethod {
    let found = BUILTIN_METHODS
        .iter()
        .find(|(k, n, _, _)| *k == kind && *n == name);
    let Some((_, _, signature, call)) = found else {
        report_error(format!("builtin method `{kind}::{name}` does not exist"));
        return None;
    };
    let expected = signature_hash(signature);
    if expected != hash {
        report_error(format!(
            "builtin method `{kind}::{name}` hash mismatch: requested {hash}, engine has {expected}"
        ));
        return None;
    }
    Some(*call)
}

/// Utility function `name`, with the same hash check as [`builtin_method`].
pub fn utility_function(name: &str, hash: i64) -> PtrUtilityFunction {
    let Some((_, signature, call)) = UTILITY_FUNCTIONS.iter().find(|(n, _, _)| *n == name) else {
        report_error(format!("utility function `{name}` does not exist"));
        return None;
    };
    let expected = signature_hash(signature);
    if expected != hash {
        report_error(format!(
            "utility function `{name}` hash mismatch: requested {hash}, engine has {expected}"
        ));
        return None;
    }
    Some(*call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::{Slot, TypedArgs};

    #[test]
    fn utility_hash_must_match() {
        assert!(utility_function("absi", signature_hash("int(int)")).is_some());
        assert!(utility_function("absi", 1).is_none());
        assert!(utility_function("nope", 1).is_none());
    }

    #[test]
    fn lerp_through_typed_args() {
        let call = utility_function("lerpf", signature_hash("float(float,float,float)")).unwrap();
        let values = [Var::from_float(0.0), Var::from_float(10.0), Var::from_float(0.25)];
        let args = TypedArgs::new(&values, &[VariantType::Float; 3]);
        let pointers = args.pointers();
        let mut ret = Slot::new();
        unsafe {
            call(ret.as_mut_ptr(), pointers.as_ptr(), 3);
            assert_eq!(typed::read(VariantType::Float, ret.as_ptr()).as_float(), Some(2.5));
        }
    }

    #[test]
    fn print_concatenates_arguments() {
        let call = utility_function("print", signature_hash("void(Variant) vararg")).unwrap();
        let values = [Var::from_str("score="), Var::from_int(12)];
        let args = TypedArgs::new(&values, &[typed::ANY, typed::ANY]);
        let pointers = args.pointers();
        unsafe { call(std::ptr::null_mut(), pointers.as_ptr(), 2) };
        assert!(crate::hooks::captured_output().contains(&"score=12".to_string()));
    }

    #[test]
    fn string_methods_read_the_base() {
        let hash = signature_hash("bool(String) const");
        let call = builtin_method(VariantType::String, "begins_with", hash).unwrap();
        let base = TypedArgs::new(&[Var::from_str("hello")], &[VariantType::String]);
        let args = TypedArgs::new(&[Var::from_str("he")], &[VariantType::String]);
        let base_ptr = base.pointers()[0].cast_mut();
        let mut ret = Slot::new();
        unsafe {
            call(base_ptr, args.pointers().as_ptr(), ret.as_mut_ptr(), 1);
            assert_eq!(typed::read(VariantType::Bool, ret.as_ptr()).as_bool(), Some(true));
        }
    }
}

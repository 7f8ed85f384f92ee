//! Variant operators: equality, hashing, truthiness, text and conversion.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use gdx_sys::VariantType;
use rustc_hash::FxHasher;

use crate::objects;
use crate::value::*;

pub fn equal(a: &Var, b: &Var) -> bool {
    use VariantType::*;
    match (a.kind(), b.kind()) {
        (Int | Float, Int | Float) if a.kind() != b.kind() => a.as_float() == b.as_float(),
        (String | StringName, String | StringName) if a.kind() != b.kind() => a.text() == b.text(),
        (x, y) if x != y => false,
        (Nil, _) => true,
        (Bool | Int | Rid | StringName, _) => a.words().0 == b.words().0,
        (Float, _) => a.as_float() == b.as_float(),
        (String | NodePath, _) => a.text() == b.text(),
        (Object, _) => object_address(a) == object_address(b),
        (Callable | Signal, _) => a.words() == b.words(),
        (Array, _) => match (a.array(), b.array()) {
            (Some(x), Some(y)) => {
                Arc::ptr_eq(&x, &y) || {
                    let (x, y) = (x.snapshot(), y.snapshot());
                    x.len() == y.len() && x.iter().zip(&y).all(|(p, q)| equal(p, q))
                }
            }
            _ => false,
        },
        (Dictionary, _) => match (a.dict(), b.dict()) {
            (Some(x), Some(y)) => {
                Arc::ptr_eq(&x, &y) || {
                    let (x, y) = (x.snapshot(), y.snapshot());
                    x.len() == y.len()
                        && x.iter().all(|(key, value)| {
                            y.iter().any(|(other_key, other_value)| {
                                equal(key, other_key) && equal(value, other_value)
                            })
                        })
                }
            }
            _ => false,
        },
        (k, _) if k.is_packed_array() => a.packed() == b.packed(),
        _ => a.pod() == b.pod(),
    }
}

/// Address of an object variant, or 0 when the object has died.
fn object_address(value: &Var) -> usize {
    match value.object() {
        Some((address, id)) if address != 0 && objects::is_live(id) => address,
        _ => 0,
    }
}

pub fn hash(value: &Var) -> i64 {
    let mut hasher = FxHasher::default();
    hash_into(value, &mut hasher);
    hasher.finish() as i64
}

fn hash_into(value: &Var, state: &mut FxHasher) {
    use VariantType::*;
    match value.kind() {
        Nil => 0u8.hash(state),
        Bool | Int => value.as_int().unwrap_or_default().hash(state),
        Float => {
            let float = value.as_float().unwrap_or_default();
            if float.fract() == 0.0 {
                (float as i64).hash(state)
            } else {
                ordered_float::OrderedFloat(float).hash(state)
            }
        }
        String | StringName | NodePath => value.text().hash(state),
        Object => object_address(value).hash(state),
        Array => {
            for item in value.array().map(|a| a.snapshot()).unwrap_or_default() {
                hash_into(&item, state);
            }
        }
        Dictionary => value.dict().map(|d| d.snapshot().len()).hash(state),
        k if k.is_packed_array() => {
            for item in value.packed().map(|p| p.to_vars()).unwrap_or_default() {
                hash_into(&item, state);
            }
        }
        _ => {
            value.kind().sys().hash(state);
            value.pod().hash(state);
            value.words().hash(state);
        }
    }
}

pub fn booleanize(value: &Var) -> bool {
    use VariantType::*;
    match value.kind() {
        Nil => false,
        Bool | Int | Float => value.as_bool().unwrap_or(false),
        String | StringName | NodePath => value.text().is_some_and(|t| !t.is_empty()),
        Object => object_address(value) != 0,
        Rid => value.as_rid() != Some(0),
        Array => value.array().is_some_and(|a| !a.snapshot().is_empty()),
        Dictionary => value.dict().is_some_and(|d| !d.snapshot().is_empty()),
        Callable | Signal => value.words().0 != 0,
        k if k.is_packed_array() => value.packed().is_some_and(|p| !p.is_empty()),
        _ => value.pod().is_some_and(|bytes| bytes.iter().any(|b| *b != 0)),
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn format_reals(bytes: &[u8]) -> String {
    let parts: Vec<_> = bytes_to_reals(bytes).into_iter().map(|r| format_float(r as f64)).collect();
    format!("({})", parts.join(", "))
}

fn format_ints(bytes: &[u8]) -> String {
    let parts: Vec<_> = bytes_to_i32s(bytes).into_iter().map(|i| i.to_string()).collect();
    format!("({})", parts.join(", "))
}

fn join_vars(items: &[Var]) -> String {
    items.iter().map(stringify).collect::<Vec<_>>().join(", ")
}

pub fn stringify(value: &Var) -> String {
    use VariantType::*;
    match value.kind() {
        Nil => "<null>".to_string(),
        Bool => value.as_bool().unwrap_or(false).to_string(),
        Int => value.as_int().unwrap_or_default().to_string(),
        Float => format_float(value.as_float().unwrap_or_default()),
        String | StringName | NodePath => value.text().unwrap_or_default(),
        Object => match value.object() {
            Some((address, id)) if address != 0 => objects::describe(id),
            _ => "<null>".to_string(),
        },
        Rid => format!("RID({})", value.as_rid().unwrap_or_default()),
        Array => {
            let items = value.array().map(|a| a.snapshot()).unwrap_or_default();
            format!("[{}]", join_vars(&items))
        }
        Dictionary => {
            let entries = value.dict().map(|d| d.snapshot()).unwrap_or_default();
            let parts: Vec<_> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", stringify(k), stringify(v)))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        Callable | Signal => match value.callable() {
            Some((address, name)) => {
                let owner = objects::describe(objects::id_of(address).unwrap_or(0));
                format!("{}::{}", owner, name.as_str())
            }
            None => std::string::String::new(),
        },
        k if k.is_packed_array() => {
            let items = value.packed().map(|p| p.to_vars()).unwrap_or_default();
            format!("[{}]", join_vars(&items))
        }
        Vector2i | Vector3i | Vector4i | Rect2i => format_ints(value.pod().unwrap_or_default()),
        Color => {
            let parts: Vec<_> = bytes_to_f32s(value.pod().unwrap_or_default())
                .into_iter()
                .map(|c| format_float(c as f64))
                .collect();
            format!("({})", parts.join(", "))
        }
        _ => format_reals(value.pod().unwrap_or_default()),
    }
}

// ============================================================================
// Conversion
// ============================================================================

pub fn can_convert_strict(from: VariantType, to: VariantType) -> bool {
    use VariantType::*;
    if from == to {
        return true;
    }
    match (from, to) {
        (Bool | Int | Float, Bool | Int | Float) => true,
        (String, StringName | NodePath) | (StringName | NodePath, String) => true,
        (Vector2, Vector2i) | (Vector2i, Vector2) => true,
        (Vector3, Vector3i) | (Vector3i, Vector3) => true,
        (Vector4, Vector4i) | (Vector4i, Vector4) => true,
        (Rect2, Rect2i) | (Rect2i, Rect2) => true,
        (Array, k) | (k, Array) => k.is_packed_array(),
        _ => false,
    }
}

/// Strict conversion of `value` to `to`, `None` when the table disallows it
/// or an element does not fit.
pub fn convert(value: &Var, to: VariantType) -> Option<Var> {
    use VariantType::*;
    let from = value.kind();
    if from == to {
        return Some(value.clone());
    }
    if !can_convert_strict(from, to) {
        return None;
    }
    Some(match to {
        Bool => Var::from_bool(value.as_bool()?),
        Int => Var::from_int(value.as_int()?),
        Float => Var::from_float(value.as_float()?),
        String => Var::from_str(&value.text()?),
        StringName => Var::from_name(Name::intern(&value.text()?)),
        NodePath => Var::from_node_path(Arc::new(NodePathBody::parse(&value.text()?))),
        Vector2 | Vector3 | Vector4 | Rect2 => {
            let reals: Vec<gdx_sys::real> = bytes_to_i32s(value.pod()?)
                .into_iter()
                .map(|i| i as gdx_sys::real)
                .collect();
            Var::from_pod(to, reals_to_bytes(&reals))
        }
        Vector2i | Vector3i | Vector4i | Rect2i => {
            let ints: Vec<i32> = bytes_to_reals(value.pod()?)
                .into_iter()
                .map(|r| r as i32)
                .collect();
            Var::from_pod(to, i32s_to_bytes(&ints))
        }
        Array => Var::from_array(ArrayBody::from_vec(value.packed()?.to_vars())),
        k if k.is_packed_array() => {
            let mut body = PackedBody::empty(k)?;
            for item in value.array()?.snapshot() {
                if !body.push_var(&item) {
                    return None;
                }
            }
            Var::from_packed(Arc::new(body))
        }
        _ => return None,
    })
}

/// Default value of a kind, as produced by its default constructor.
pub fn default_of(kind: VariantType) -> Var {
    use VariantType::*;
    match kind {
        Nil => Var::nil(),
        Bool => Var::from_bool(false),
        Int => Var::from_int(0),
        Float => Var::from_float(0.0),
        String => Var::from_str(""),
        StringName => Var::from_name(Name::intern("")),
        NodePath => Var::from_node_path(Arc::new(NodePathBody::parse(""))),
        Rid => Var::from_rid(0),
        Object => Var::from_object(0, 0),
        Callable => Var::from_callable(0, Name::intern("")),
        Signal => Var::from_signal(0, Name::intern("")),
        Dictionary => Var::from_dict(DictBody::from_entries(Vec::new())),
        Array => Var::from_array(ArrayBody::from_vec(Vec::new())),
        k if k.is_packed_array() => match PackedBody::empty(k) {
            Some(body) => Var::from_packed(Arc::new(body)),
            None => Var::nil(),
        },
        k => match pod_size(k) {
            Some(size) => Var::from_pod(k, vec![0; size]),
            None => Var::nil(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector2(x: f32, y: f32) -> Var {
        let reals = [x as gdx_sys::real, y as gdx_sys::real];
        Var::from_pod(VariantType::Vector2, reals_to_bytes(&reals))
    }

    #[test]
    fn numbers_compare_across_kinds() {
        assert!(equal(&Var::from_int(2), &Var::from_float(2.0)));
        assert!(!equal(&Var::from_int(2), &Var::from_str("2")));
    }

    #[test]
    fn strings_and_names_compare_by_text() {
        assert!(equal(&Var::from_str("a"), &Var::from_name(Name::intern("a"))));
    }

    #[test]
    fn stringify_formats() {
        assert_eq!(stringify(&Var::nil()), "<null>");
        assert_eq!(stringify(&Var::from_float(1.0)), "1.0");
        assert_eq!(stringify(&Var::from_float(0.5)), "0.5");
        assert_eq!(stringify(&vector2(1.0, 2.5)), "(1.0, 2.5)");
        let array =
            Var::from_array(ArrayBody::from_vec(vec![Var::from_int(1), Var::from_str("x")]));
        assert_eq!(stringify(&array), "[1, x]");
    }

    #[test]
    fn strict_conversion_table() {
        use VariantType::*;
        assert!(can_convert_strict(Int, Float));
        assert!(can_convert_strict(Vector2, Vector2i));
        assert!(can_convert_strict(Array, PackedByteArray));
        assert!(!can_convert_strict(Vector2i, Vector3i));
        assert!(!can_convert_strict(Nil, Int));
        assert!(!can_convert_strict(String, Int));
    }

    #[test]
    fn vector_conversion_truncates() {
        let converted = convert(&vector2(1.7, -2.2), VariantType::Vector2i).unwrap();
        assert_eq!(bytes_to_i32s(converted.pod().unwrap()), vec![1, -2]);
    }

    #[test]
    fn array_to_packed_rejects_foreign_elements() {
        let good = Var::from_array(ArrayBody::from_vec(vec![Var::from_int(1), Var::from_int(2)]));
        let packed = convert(&good, VariantType::PackedByteArray).unwrap();
        assert_eq!(packed.packed().unwrap().len(), 2);

        let bad = Var::from_array(ArrayBody::from_vec(vec![Var::from_str("x")]));
        assert!(convert(&bad, VariantType::PackedByteArray).is_none());
    }

    #[test]
    fn truthiness() {
        assert!(!booleanize(&Var::nil()));
        assert!(!booleanize(&Var::from_str("")));
        assert!(booleanize(&Var::from_int(3)));
        assert!(!booleanize(&default_of(VariantType::Vector3)));
    }
}

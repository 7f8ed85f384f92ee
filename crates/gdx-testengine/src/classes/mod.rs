//! Engine classes implemented by the reference engine.

pub mod animation;
pub mod engine;
pub mod file_access;
pub mod node;
pub mod object;
pub mod resource;

use std::sync::Arc;

use gdx_sys::{CallError, CallErrorType, ObjectPtr};

use crate::classdb::ClassInfo;
use crate::objects;
use crate::value::{DictBody, Name, Var};

/// Every engine class, parents first.
pub fn engine_classes() -> Vec<ClassInfo> {
    vec![
        object::object_class(),
        object::refcounted_class(),
        resource::resource_class(),
        node::node_class(),
        animation::animation_class(),
        resource::material_class(),
        resource::particle_process_material_class(),
        file_access::file_access_class(),
        engine::engine_class(),
    ]
}

pub(crate) fn instance_is_null() -> CallError {
    CallError::new(CallErrorType::InstanceIsNull, 0, 0)
}

/// Live instance id behind `this`.
pub(crate) fn this_id(this: ObjectPtr) -> Result<u64, CallError> {
    objects::id_of_ptr(this).filter(|id| objects::is_live(*id)).ok_or_else(instance_is_null)
}

pub(crate) fn int_arg(args: &[Var], index: usize) -> i64 {
    args.get(index).and_then(Var::as_int).unwrap_or_default()
}

pub(crate) fn float_arg(args: &[Var], index: usize) -> f64 {
    args.get(index).and_then(Var::as_float).unwrap_or_default()
}

pub(crate) fn text_arg(args: &[Var], index: usize) -> String {
    args.get(index).and_then(Var::text).unwrap_or_default()
}

/// Live object id passed at `index`, `None` for null or freed objects.
pub(crate) fn object_arg(args: &[Var], index: usize) -> Option<u64> {
    let address = objects::live_address(args.get(index)?);
    objects::id_of(address)
}

pub(crate) fn object_result(id: Option<u64>) -> Var {
    match id {
        Some(id) => Var::from_object(objects::address_of(id), id),
        None => Var::from_object(0, 0),
    }
}

pub(crate) fn dictionary(entries: Vec<(&str, Var)>) -> Var {
    let entries = entries
        .into_iter()
        .map(|(key, value)| (Var::from_str(key), value))
        .collect();
    Var::from_dict(DictBody::from_entries(entries))
}

pub(crate) fn string_name(text: &str) -> Var {
    Var::from_name(Name::intern(text))
}

pub(crate) fn node_path(text: &str) -> Var {
    Var::from_node_path(Arc::new(crate::value::NodePathBody::parse(text)))
}

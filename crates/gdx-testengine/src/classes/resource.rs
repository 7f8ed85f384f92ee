use gdx_sys::{CallError, ObjectPtr, VariantType, real};

use super::this_id;
use crate::classdb::ClassInfo;
use crate::objects;
use crate::value::{Var, reals_to_bytes};

pub fn resource_class() -> ClassInfo {
    ClassInfo::engine("Resource", Some("RefCounted"))
        .refcounted()
        .method("set_name", "void(String)", set_name)
        .method("get_name", "String() const", get_name)
        .property("resource_name", VariantType::String, "set_name", "get_name")
}

pub fn material_class() -> ClassInfo {
    ClassInfo::engine("Material", Some("Resource"))
        .refcounted()
        .not_instantiable()
        .method("set_render_priority", "void(int)", set_render_priority)
        .method("get_render_priority", "int() const", get_render_priority)
        .property("render_priority", VariantType::Int, "set_render_priority", "get_render_priority")
}

pub fn particle_process_material_class() -> ClassInfo {
    ClassInfo::engine("ParticleProcessMaterial", Some("Material"))
        .refcounted()
        .method(
            "set_emission_shape",
            "void(enum::ParticleProcessMaterial.EmissionShape)",
            set_emission_shape,
        )
        .method(
            "get_emission_shape",
            "enum::ParticleProcessMaterial.EmissionShape() const",
            get_emission_shape,
        )
        .method("set_emission_box_extents", "void(Vector3)", set_emission_box_extents)
        .method("get_emission_box_extents", "Vector3() const", get_emission_box_extents)
        .property("emission_shape", VariantType::Int, "set_emission_shape", "get_emission_shape")
        .property(
            "emission_box_extents",
            VariantType::Vector3,
            "set_emission_box_extents",
            "get_emission_box_extents",
        )
}

/// Store argument 0 under `key` in the object's property map.
fn store(this: ObjectPtr, key: &str, args: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    let value = args.first().cloned().unwrap_or_default();
    objects::with(id, |object| object.set_prop(key, value));
    Ok(Var::nil())
}

fn load(this: ObjectPtr, key: &str, default: impl FnOnce() -> Var) -> Result<Var, CallError> {
    let id = this_id(this)?;
    Ok(objects::with(id, |object| object.prop(key)).flatten().unwrap_or_else(default))
}

fn set_name(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    store(this, "resource_name", args)
}

fn get_name(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    load(this, "resource_name", || Var::from_str(""))
}

fn set_render_priority(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    store(this, "render_priority", args)
}

fn get_render_priority(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    load(this, "render_priority", || Var::from_int(0))
}

fn set_emission_shape(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    store(this, "emission_shape", args)
}

fn get_emission_shape(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    load(this, "emission_shape", || Var::from_int(0))
}

fn set_emission_box_extents(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    store(this, "emission_box_extents", args)
}

fn get_emission_box_extents(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    load(this, "emission_box_extents", || {
        Var::from_pod(VariantType::Vector3, reals_to_bytes(&[1.0 as real; 3]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classdb;
    use crate::value::bytes_to_reals;

    #[test]
    fn box_extents_default_to_unit() {
        let material = objects::create("ParticleProcessMaterial");
        let getter =
            classdb::find_method("ParticleProcessMaterial", "get_emission_box_extents").unwrap();
        let extents = classdb::call(&getter, material, &[]).unwrap();
        assert_eq!(bytes_to_reals(extents.pod().unwrap()), vec![1.0; 3]);
        objects::destroy(objects::id_of_ptr(material).unwrap());
    }

    #[test]
    fn material_is_abstract() {
        assert!(classdb::construct("Material").is_err());
        assert!(classdb::construct("ParticleProcessMaterial").is_ok());
    }
}

use gdx_sys::{CallError, CallErrorType, ObjectPtr, VariantType};

use super::{dictionary, int_arg, text_arg, this_id};
use crate::classdb::{self, ClassInfo};
use crate::objects;
use crate::value::{ArrayBody, ElementType, Var, lock};

pub const NOTIFICATION_POSTINITIALIZE: i64 = 0;
pub const NOTIFICATION_PREDELETE: i64 = 1;

pub fn object_class() -> ClassInfo {
    ClassInfo::engine("Object", None)
        .constant("NOTIFICATION_POSTINITIALIZE", NOTIFICATION_POSTINITIALIZE)
        .constant("NOTIFICATION_PREDELETE", NOTIFICATION_PREDELETE)
        .method("get_class", "String() const", get_class)
        .method("is_class", "bool(String) const", is_class)
        .method("get_instance_id", "int() const", get_instance_id)
        .method("set", "void(StringName,Variant)", set)
        .method("get", "Variant(StringName) const", get)
        .method("get_property_list", "typedarray::Dictionary() const", get_property_list)
        .method("has_method", "bool(StringName) const", has_method)
        .method("call", "Variant(StringName) vararg", call)
        .method("notification", "void(int)", notification)
}

pub fn refcounted_class() -> ClassInfo {
    ClassInfo::engine("RefCounted", Some("Object"))
        .refcounted()
        .method("get_reference_count", "int() const", get_reference_count)
}

fn class_of(this: ObjectPtr) -> Result<(u64, String), CallError> {
    let id = this_id(this)?;
    let class = objects::class_name(id).ok_or_else(super::instance_is_null)?;
    Ok((id, class))
}

fn get_class(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let (_, class) = class_of(this)?;
    Ok(Var::from_str(&class))
}

fn is_class(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let (_, class) = class_of(this)?;
    Ok(Var::from_bool(classdb::inherits(&class, &text_arg(args, 0))))
}

fn get_instance_id(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    Ok(Var::from_int(this_id(this)? as i64))
}

/// Extension `set` callback, then a declared property's setter, then the
/// object's dynamic property map.
pub(crate) fn set_property(id: u64, class: &str, property: &str, value: &Var) {
    if classdb::extension_set(id, property, value) {
        return;
    }
    if let Some(record) = classdb::find_property(class, property) {
        match classdb::find_method(class, &record.setter) {
            Some(setter) => {
                let args = std::slice::from_ref(value);
                if let Err(err) = classdb::call(&setter, objects::ptr_of(id), args) {
                    crate::hooks::report_error(format!("setting `{property}` failed: {err:?}"));
                }
            }
            None => crate::hooks::report_error(format!(
                "property `{property}` of `{class}` is read-only"
            )),
        }
        return;
    }
    objects::with(id, |object| object.set_prop(property, value.clone()));
}

pub(crate) fn get_property(id: u64, class: &str, property: &str) -> Var {
    if let Some(value) = classdb::extension_get(id, property) {
        return value;
    }
    if let Some(record) = classdb::find_property(class, property) {
        if let Some(getter) = classdb::find_method(class, &record.getter) {
            return classdb::call(&getter, objects::ptr_of(id), &[]).unwrap_or_default();
        }
    }
    objects::with(id, |object| object.prop(property)).flatten().unwrap_or_default()
}

fn set(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let (id, class) = class_of(this)?;
    set_property(id, &class, &text_arg(args, 0), &args[1]);
    Ok(Var::nil())
}

fn get(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let (id, class) = class_of(this)?;
    Ok(get_property(id, &class, &text_arg(args, 0)))
}

fn get_property_list(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let (id, class) = class_of(this)?;
    let mut records = classdb::properties_of(&class);
    records.extend(classdb::extension_property_list(id));

    let entries = records
        .into_iter()
        .map(|record| {
            dictionary(vec![
                ("name", Var::from_str(&record.name)),
                ("class_name", super::string_name(record.class.as_deref().unwrap_or_default())),
                ("type", Var::from_int(record.kind.sys() as i64)),
                ("usage", Var::from_int(record.usage as i64)),
            ])
        })
        .collect();
    let list = ArrayBody::from_vec(entries);
    *lock(&list.typed) = Some(ElementType {
        kind: VariantType::Dictionary,
        class: None,
    });
    Ok(Var::from_array(list))
}

fn has_method(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let (_, class) = class_of(this)?;
    Ok(Var::from_bool(classdb::has_method(&class, &text_arg(args, 0))))
}

fn call(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let (_, class) = class_of(this)?;
    let name = text_arg(args, 0);
    let method = classdb::find_method(&class, &name)
        .ok_or(CallError::new(CallErrorType::InvalidMethod, 0, 0))?;
    classdb::call(&method, this, &args[1..])
}

fn notification(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    classdb::notify(this_id(this)?, int_arg(args, 0));
    Ok(Var::nil())
}

fn get_reference_count(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    Ok(Var::from_int(objects::reference_count(id).unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_named(this: ObjectPtr, method: &str, args: &[Var]) -> Result<Var, CallError> {
        let class = objects::class_name(objects::id_of_ptr(this).unwrap()).unwrap();
        let method = classdb::find_method(&class, method).unwrap();
        classdb::call(&method, this, args)
    }

    #[test]
    fn dynamic_properties_round_trip() {
        let object = objects::create("Object");
        call_named(object, "set", &[super::super::string_name("hp"), Var::from_int(7)]).unwrap();
        let value = call_named(object, "get", &[super::super::string_name("hp")]).unwrap();
        assert_eq!(value.as_int(), Some(7));
        objects::destroy(objects::id_of_ptr(object).unwrap());
    }

    #[test]
    fn call_reports_missing_methods() {
        let object = objects::create("Object");
        let err = call_named(object, "call", &[super::super::string_name("nope")]).unwrap_err();
        assert_eq!(err.kind(), CallErrorType::InvalidMethod);
        let class = call_named(object, "call", &[super::super::string_name("get_class")]).unwrap();
        assert_eq!(class.text().as_deref(), Some("Object"));
        objects::destroy(objects::id_of_ptr(object).unwrap());
    }

    #[test]
    fn declared_properties_use_accessors() {
        let resource = objects::create("Resource");
        let args = [super::super::string_name("resource_name"), Var::from_str("hero")];
        call_named(resource, "set", &args).unwrap();
        let name = call_named(resource, "get_name", &[]).unwrap();
        assert_eq!(name.text().as_deref(), Some("hero"));
        objects::destroy(objects::id_of_ptr(resource).unwrap());
    }
}

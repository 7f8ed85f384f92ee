//! Serde model of the JSON API manifest.
//!
//! Only the parts the generator consumes are modelled; unknown fields are
//! ignored so newer manifests still load.

use std::path::Path;

use serde::Deserialize;

use crate::error::CodegenError;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub header: Header,
    #[serde(default)]
    pub builtin_class_sizes: Vec<BuildSizes>,
    #[serde(default)]
    pub global_enums: Vec<EnumDef>,
    #[serde(default)]
    pub utility_functions: Vec<UtilityFunction>,
    #[serde(default)]
    pub builtin_classes: Vec<BuiltinClass>,
    #[serde(default)]
    pub classes: Vec<Class>,
    #[serde(default)]
    pub singletons: Vec<Singleton>,
}

impl Manifest {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, CodegenError> {
        let text = std::fs::read_to_string(path).map_err(|source| CodegenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, CodegenError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|class| class.name == name)
    }

    /// Builtin sizes for one build configuration, e.g. `float_64`.
    pub fn sizes_for(&self, configuration: &str) -> Option<&BuildSizes> {
        self.builtin_class_sizes
            .iter()
            .find(|sizes| sizes.build_configuration == configuration)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub version_major: u32,
    pub version_minor: u32,
    pub version_patch: u32,
    #[serde(default)]
    pub version_status: String,
    #[serde(default)]
    pub version_build: String,
    #[serde(default)]
    pub version_full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSizes {
    pub build_configuration: String,
    pub sizes: Vec<SizeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizeEntry {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumDef {
    pub name: String,
    #[serde(default)]
    pub is_bitfield: bool,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UtilityFunction {
    pub name: String,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_vararg: bool,
    pub hash: i64,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuiltinClass {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<BuiltinMethod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuiltinMethod {
    pub name: String,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub is_vararg: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_static: bool,
    pub hash: i64,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default)]
    pub inherits: Option<String>,
    #[serde(default)]
    pub is_refcounted: bool,
    #[serde(default)]
    pub is_instantiable: bool,
    #[serde(default = "default_api_type")]
    pub api_type: String,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub methods: Vec<ClassMethod>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub signals: Vec<Signal>,
}

fn default_api_type() -> String {
    "core".to_string()
}

impl Class {
    /// Editor-only classes may be missing from runtime builds of the engine.
    pub fn is_editor_only(&self) -> bool {
        self.api_type == "editor"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassMethod {
    pub name: String,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_vararg: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub hash: Option<i64>,
    #[serde(default)]
    pub return_value: Option<ReturnValue>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnValue {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub meta: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub ty: String,
    pub name: String,
    #[serde(default)]
    pub setter: Option<String>,
    pub getter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signal {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Singleton {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "header": { "version_major": 4, "version_minor": 2, "version_patch": 0 },
        "classes": [
            { "name": "Object", "is_refcounted": false, "is_instantiable": true,
              "methods": [ { "name": "get_class", "is_const": true, "hash": 201670096,
                             "return_value": { "type": "String" } } ] }
        ]
    }"#;

    #[test]
    fn parses_minimal_manifest() {
        let manifest = Manifest::parse(MINIMAL).unwrap();
        assert_eq!(manifest.header.version_minor, 2);
        let object = manifest.class("Object").unwrap();
        assert!(object.inherits.is_none());
        assert_eq!(object.api_type, "core");
        assert_eq!(object.methods[0].hash, Some(201670096));
        assert_eq!(object.methods[0].return_value.as_ref().unwrap().ty, "String");
    }

    #[test]
    fn reports_malformed_json() {
        let err = Manifest::parse("{ \"header\": ").unwrap_err();
        assert!(matches!(err, CodegenError::Json(_)));
    }
}

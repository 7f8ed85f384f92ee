use std::path::PathBuf;
use std::process::Command;

use gdx_codegen::{CodegenConfig, CodegenError, GeneratedFile, Manifest, Precision};

fn manifest_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../api/extension_api.json")
}

fn shipped_manifest() -> Manifest {
    Manifest::load(&manifest_path()).expect("shipped manifest parses")
}

fn generated(name: &str) -> String {
    let files = gdx_codegen::emit(&shipped_manifest(), &CodegenConfig::default()).unwrap();
    files
        .into_iter()
        .find(|file: &GeneratedFile| file.name == name)
        .map(|file| file.tokens.to_string())
        .unwrap()
}

#[test]
fn emits_all_five_files() {
    let files = gdx_codegen::emit(&shipped_manifest(), &CodegenConfig::default()).unwrap();
    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        ["classes.rs", "builtin_methods.rs", "utilities.rs", "global_enums.rs", "tables.rs"]
    );
}

#[test]
fn shipped_manifest_has_single_rooted_hierarchy() {
    let manifest = shipped_manifest();
    let ctx = gdx_codegen::Context::new(&manifest).unwrap();
    for class in &manifest.classes {
        let chain = ctx.ancestors(class).unwrap();
        let root = chain.last().map(|c| c.name.as_str()).unwrap_or(class.name.as_str());
        assert_eq!(root, "Object", "{} does not reach Object", class.name);
    }
}

#[test]
fn classes_deref_to_their_parent() {
    let text = generated("classes.rs");
    assert!(text.contains("impl std :: ops :: Deref for Animation { type Target = Resource"));
    assert!(text.contains(
        "unsafe impl crate :: obj :: Inherits < Object > for ParticleProcessMaterial"
    ));
    assert!(!text.contains("impl std :: ops :: Deref for Object"));
}

#[test]
fn memory_kind_follows_refcounted_flag() {
    let text = generated("classes.rs");
    assert!(text.contains("pub fn new_gd () -> crate :: obj :: Gd < Self >"));
    assert!(text.contains("pub fn new_alloc () -> crate :: obj :: Owned < Self >"));
    assert!(text.contains(
        "const MEMORY : crate :: obj :: Memory = crate :: obj :: Memory :: Dynamic"
    ));
}

#[test]
fn trampolines_index_the_bind_cache() {
    let text = generated("classes.rs");
    assert!(text.contains("crate :: tables :: method_ids :: ANIMATION__ADD_TRACK"));
    assert!(text.contains(
        "pub fn add_track (& mut self , type_ : crate :: classes :: animation :: TrackType , at_position : i32) -> i32"
    ));
    assert!(text.contains("pub fn get_track_count (& self ,) -> i32"));
}

#[test]
fn static_methods_have_no_receiver() {
    let text = generated("classes.rs");
    assert!(text.contains(
        "pub fn open (path : & crate :: builtin :: GString , flags : crate :: classes :: file_access :: ModeFlags) -> Option < crate :: obj :: Gd < crate :: classes :: FileAccess >>"
    ));
}

#[test]
fn vararg_methods_report_call_errors() {
    let text = generated("classes.rs");
    assert!(text.contains(
        "varargs : & [crate :: variant :: Variant]) -> Result < crate :: variant :: Variant , crate :: call :: CallError >"
    ));
    assert!(text.contains("crate :: call :: class_varcall"));
}

#[test]
fn virtual_traits_flatten_ancestors() {
    let text = generated("classes.rs");
    assert!(text.contains("pub trait INode : crate :: registrar :: HostClass"));
    assert!(text.contains("fn process (& mut self , delta : f64)"));
    assert!(text.contains(
        "\"ready\" => Some ((\"_ready\" , crate :: classes :: node :: virtuals :: ready :: < Self >))"
    ));
    assert!(text.contains("pub trait IResource : crate :: registrar :: HostClass"));
}

#[test]
fn class_enums_live_in_class_module() {
    let text = generated("classes.rs");
    assert!(text.contains("pub mod animation"));
    assert!(text.contains("pub const TYPE_METHOD : TrackType = TrackType { ord : 5 }"));
    assert!(text.contains(
        "pub const EMISSION_SHAPE_BOX : EmissionShape = EmissionShape { ord : 3 }"
    ));
}

#[test]
fn constants_and_singletons() {
    let text = generated("classes.rs");
    assert!(text.contains("pub const NOTIFICATION_READY : i64 = 13"));
    assert!(text.contains("pub fn singleton () -> crate :: obj :: Gd < Self >"));
}

#[test]
fn tables_copy_hashes_verbatim() {
    let manifest = shipped_manifest();
    let text = generated("tables.rs");
    for class in &manifest.classes {
        for method in class.methods.iter().filter(|m| !m.is_virtual) {
            let hash = method.hash.unwrap();
            assert!(
                text.contains(&format!("hash : {hash}i64")),
                "{}::{} hash missing",
                class.name,
                method.name
            );
        }
    }
    assert!(text.contains("pub const ANIMATION__ADD_TRACK : usize"));
    assert!(text.contains("API_VERSION : (u32 , u32 , u32) = (4u32 , 2u32 , 0u32)"));
}

#[test]
fn tables_assert_builtin_layouts() {
    let text = generated("tables.rs");
    assert!(text.contains(
        "std :: mem :: size_of :: < crate :: builtin :: Vector3 > () == 12usize"
    ));
    assert!(text.contains(
        "std :: mem :: size_of :: < crate :: variant :: Variant > () == 24usize"
    ));

    let double = CodegenConfig {
        precision: Precision::Double,
        pointer_width: 64,
    };
    let files = gdx_codegen::emit(&shipped_manifest(), &double).unwrap();
    let tables = files.iter().find(|f| f.name == "tables.rs").unwrap().tokens.to_string();
    assert!(tables.contains("size_of :: < crate :: builtin :: Vector3 > () == 24usize"));
}

#[test]
fn missing_build_configuration_is_an_error() {
    let config = CodegenConfig {
        precision: Precision::Single,
        pointer_width: 16,
    };
    let err = gdx_codegen::emit(&shipped_manifest(), &config).unwrap_err();
    assert!(matches!(err, CodegenError::MissingBuildConfiguration(name) if name == "float_16"));
}

#[test]
fn builtin_methods_attach_to_rust_types() {
    let text = generated("builtin_methods.rs");
    assert!(text.contains("impl crate :: builtin :: GString"));
    assert!(text.contains("pub fn to_upper (& self ,) -> crate :: builtin :: GString"));
    assert!(text.contains("pub fn reverse (& mut self ,) -> ()"));
    assert!(text.contains("impl crate :: builtin :: PackedByteArray"));
}

#[test]
fn utilities_are_free_functions() {
    let text = generated("utilities.rs");
    assert!(text.contains("pub fn absi (x : i64) -> i64"));
    assert!(text.contains("pub fn typeof_ (variable : & crate :: variant :: Variant) -> i64"));
    assert!(text.contains(
        "pub fn print (arg1 : & crate :: variant :: Variant , varargs : & [crate :: variant :: Variant]) -> ()"
    ));
}

#[test]
fn unknown_parent_is_rejected() {
    let manifest = Manifest::parse(
        r#"{
            "header": { "version_major": 4, "version_minor": 2, "version_patch": 0 },
            "classes": [
                { "name": "Object" },
                { "name": "Node", "inherits": "Missing" }
            ]
        }"#,
    )
    .unwrap();
    let err = gdx_codegen::emit(&manifest, &CodegenConfig::default()).unwrap_err();
    assert!(matches!(err, CodegenError::UnknownParent { ref parent, .. } if parent == "Missing"));
}

#[test]
fn unknown_argument_type_is_rejected() {
    let manifest = Manifest::parse(
        r#"{
            "header": { "version_major": 4, "version_minor": 2, "version_patch": 0 },
            "builtin_class_sizes": [ { "build_configuration": "float_64", "sizes": [] } ],
            "classes": [
                { "name": "Object", "methods": [
                    { "name": "frob", "hash": 1, "arguments": [ { "name": "x", "type": "Gizmo" } ] }
                ] }
            ]
        }"#,
    )
    .unwrap();
    let err = gdx_codegen::emit(&manifest, &CodegenConfig::default()).unwrap_err();
    assert!(matches!(err, CodegenError::UnknownType { ref ty, .. } if ty == "Gizmo"));
}

#[test]
fn generate_writes_files_and_skips_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let config = CodegenConfig::default();
    let written = gdx_codegen::generate(&manifest_path(), dir.path(), &config).unwrap();
    assert_eq!(written.len(), 5);

    let classes = dir.path().join("classes.rs");
    let before = std::fs::metadata(&classes).unwrap().modified().unwrap();
    gdx_codegen::generate(&manifest_path(), dir.path(), &config).unwrap();
    let after = std::fs::metadata(&classes).unwrap().modified().unwrap();
    assert_eq!(before, after);

    let text = std::fs::read_to_string(classes).unwrap();
    assert!(text.starts_with("// Generated by gdx-codegen. Do not edit."));
}

#[test]
fn cli_generates_into_directory() {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_gdx-codegen"))
        .arg(manifest_path())
        .arg("--out")
        .arg(dir.path())
        .arg("--precision")
        .arg("double")
        .status()
        .unwrap();
    assert!(status.success());
    assert!(dir.path().join("tables.rs").exists());
    let tables = std::fs::read_to_string(dir.path().join("tables.rs")).unwrap();
    assert!(tables.contains("\"double_64\""));
}

#[test]
fn cli_fails_on_missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_gdx-codegen"))
        .arg(dir.path().join("missing.json"))
        .arg("--out")
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(!status.success());
}

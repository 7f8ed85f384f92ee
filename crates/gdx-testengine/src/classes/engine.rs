//! The `Engine` singleton and the main loop.

use std::ffi::CStr;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicI64, Ordering};

use gdx_sys::{CallError, ObjectPtr};

use super::{dictionary, float_arg, node, object_result};
use crate::classdb::ClassInfo;
use crate::objects;
use crate::value::Var;

pub const VERSION: (i64, i64, i64) = (4, 2, 0);
pub const VERSION_STATUS: &str = "stable";
pub const VERSION_BUILD: &str = "reference";
pub const VERSION_STRING: &CStr = c"Host Engine v4.2.0.stable.reference";

struct Globals {
    engine: u64,
    root: u64,
    frames: AtomicI64,
}

static GLOBALS: LazyLock<Globals> = LazyLock::new(|| {
    let engine = objects::id_of_ptr(objects::create("Engine")).unwrap_or_default();
    let root = objects::id_of_ptr(objects::create("Node")).unwrap_or_default();
    node::make_root(root);
    tracing::debug!(engine, root, "engine globals created");
    Globals {
        engine,
        root,
        frames: AtomicI64::new(0),
    }
});

pub fn engine_class() -> ClassInfo {
    ClassInfo::engine("Engine", Some("Object"))
        .not_instantiable()
        .method("get_frames_drawn", "int() const", get_frames_drawn)
        .method("get_scene_root", "Node() const", get_scene_root)
        .method("iterate", "void(float)", iterate_method)
        .method("is_editor_hint", "bool() const", is_editor_hint)
        .method("get_version_info", "Dictionary() const", get_version_info)
}

/// Object registered under a global singleton name.
pub fn singleton(name: &str) -> Option<ObjectPtr> {
    match name {
        "Engine" => Some(objects::ptr_of(GLOBALS.engine)),
        _ => None,
    }
}

/// Instance id of the scene root.
pub fn scene_root() -> u64 {
    GLOBALS.root
}

/// Run one frame: bump the frame counter and deliver `_process` to the tree.
pub fn iterate(delta: f64) {
    let frame = GLOBALS.frames.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::trace!(frame, delta, "frame");
    node::propagate_process(GLOBALS.root, delta);
}

fn get_frames_drawn(_: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    Ok(Var::from_int(GLOBALS.frames.load(Ordering::Relaxed)))
}

fn get_scene_root(_: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    Ok(object_result(Some(GLOBALS.root)))
}

fn iterate_method(_: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    iterate(float_arg(args, 0));
    Ok(Var::nil())
}

fn is_editor_hint(_: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    Ok(Var::from_bool(false))
}

fn get_version_info(_: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let (major, minor, patch) = VERSION;
    Ok(dictionary(vec![
        ("major", Var::from_int(major)),
        ("minor", Var::from_int(minor)),
        ("patch", Var::from_int(patch)),
        ("status", Var::from_str(VERSION_STATUS)),
        ("build", Var::from_str(VERSION_BUILD)),
        (
            "string",
            Var::from_str(&format!(
                "{major}.{minor}.{patch}.{VERSION_STATUS}.{VERSION_BUILD}"
            )),
        ),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classdb;

    #[test]
    fn iterate_counts_frames() {
        let engine = singleton("Engine").unwrap();
        let frames = classdb::find_method("Engine", "get_frames_drawn").unwrap();
        let before = classdb::call(&frames, engine, &[]).unwrap().as_int().unwrap();
        iterate(0.016);
        let after = classdb::call(&frames, engine, &[]).unwrap().as_int().unwrap();
        assert!(after > before);
    }

    #[test]
    fn scene_root_is_in_tree() {
        let engine = singleton("Engine").unwrap();
        let method = classdb::find_method("Engine", "get_scene_root").unwrap();
        let root = classdb::call(&method, engine, &[]).unwrap();
        let (_, id) = root.object().unwrap();
        assert_eq!(id, scene_root());
        let inside = classdb::find_method("Node", "is_inside_tree").unwrap();
        assert!(classdb::call(&inside, objects::ptr_of(id), &[]).unwrap().as_bool().unwrap());
        assert!(singleton("Missing").is_none());
    }
}

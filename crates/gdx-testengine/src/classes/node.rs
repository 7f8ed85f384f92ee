//! Scene tree nodes.
//!
//! Entering the tree notifies `ENTER_TREE` parents first, then `READY`
//! children first, once per node. Leaving notifies `EXIT_TREE` children first.

use gdx_sys::{CallError, ObjectPtr, VariantType};

use super::{int_arg, node_path, object_arg, object_result, string_name, text_arg, this_id};
use crate::classdb::{self, ClassInfo};
use crate::hooks::report_error;
use crate::objects;
use crate::value::Var;

pub const NOTIFICATION_ENTER_TREE: i64 = 10;
pub const NOTIFICATION_EXIT_TREE: i64 = 11;
pub const NOTIFICATION_READY: i64 = 13;
pub const NOTIFICATION_PROCESS: i64 = 17;

#[derive(Debug, Default, Clone)]
pub struct NodeState {
    pub name: String,
    pub parent: Option<u64>,
    pub children: Vec<u64>,
    pub in_tree: bool,
    pub ready: bool,
}

pub fn node_class() -> ClassInfo {
    ClassInfo::engine("Node", Some("Object"))
        .constant("NOTIFICATION_ENTER_TREE", NOTIFICATION_ENTER_TREE)
        .constant("NOTIFICATION_EXIT_TREE", NOTIFICATION_EXIT_TREE)
        .constant("NOTIFICATION_READY", NOTIFICATION_READY)
        .constant("NOTIFICATION_PROCESS", NOTIFICATION_PROCESS)
        .method("add_child", "void(Node)", add_child)
        .method("remove_child", "void(Node)", remove_child)
        .method("get_child_count", "int() const", get_child_count)
        .method("get_child", "Node(int) const", get_child)
        .method("get_parent", "Node() const", get_parent)
        .method("set_name", "void(StringName)", set_name)
        .method("get_name", "StringName() const", get_name)
        .method("is_inside_tree", "bool() const", is_inside_tree)
        .method("get_path", "NodePath() const", get_path)
        .property("name", VariantType::StringName, "set_name", "get_name")
}

fn state(id: u64) -> Option<NodeState> {
    objects::with(id, |object| object.node.clone()).flatten()
}

fn update(id: u64, f: impl FnOnce(&mut NodeState)) {
    objects::with(id, |object| object.node.as_mut().map(f));
}

fn display_name(id: u64) -> String {
    state(id).map(|node| node.name).unwrap_or_default()
}

/// Mark `id` as the in-tree root of the scene.
pub(crate) fn make_root(id: u64) {
    update(id, |node| {
        node.name = "root".to_string();
        node.in_tree = true;
        node.ready = true;
    });
}

fn propagate_enter(id: u64) {
    update(id, |node| node.in_tree = true);
    classdb::notify(id, NOTIFICATION_ENTER_TREE);
    for child in state(id).map(|node| node.children).unwrap_or_default() {
        propagate_enter(child);
    }
}

fn propagate_ready(id: u64) {
    for child in state(id).map(|node| node.children).unwrap_or_default() {
        propagate_ready(child);
    }
    let first = objects::with(id, |object| {
        object.node.as_mut().is_some_and(|node| !std::mem::replace(&mut node.ready, true))
    })
    .unwrap_or(false);
    if first {
        classdb::notify(id, NOTIFICATION_READY);
    }
}

fn propagate_exit(id: u64) {
    for child in state(id).map(|node| node.children).unwrap_or_default().into_iter().rev() {
        propagate_exit(child);
    }
    classdb::notify(id, NOTIFICATION_EXIT_TREE);
    update(id, |node| node.in_tree = false);
}

/// Deliver `_process` to every node in the subtree at `id`, parents first.
pub(crate) fn propagate_process(id: u64, delta: f64) {
    let Some(node) = state(id) else {
        return;
    };
    if !node.in_tree {
        return;
    }
    classdb::notify(id, NOTIFICATION_PROCESS);
    classdb::call_virtual(id, "_process", &[(Var::from_float(delta), VariantType::Float)], None);
    for child in node.children {
        propagate_process(child, delta);
    }
}

fn unique_name(parent: u64, wanted: &str) -> String {
    let siblings: Vec<String> = state(parent)
        .map(|node| node.children)
        .unwrap_or_default()
        .into_iter()
        .map(display_name)
        .collect();
    if !siblings.iter().any(|name| name == wanted) {
        return wanted.to_string();
    }
    (2..)
        .map(|n| format!("{wanted}{n}"))
        .find(|candidate| !siblings.contains(candidate))
        .unwrap_or_else(|| wanted.to_string())
}

fn is_ancestor(candidate: u64, of: u64) -> bool {
    let mut current = Some(of);
    while let Some(id) = current {
        if id == candidate {
            return true;
        }
        current = state(id).and_then(|node| node.parent);
    }
    false
}

fn add_child(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let parent = this_id(this)?;
    let Some(child) = object_arg(args, 0) else {
        report_error("add_child: parameter \"node\" is null".to_string());
        return Ok(Var::nil());
    };
    let Some(child_state) = state(child) else {
        report_error(format!("add_child: object #{child} is not a node"));
        return Ok(Var::nil());
    };
    if let Some(existing) = child_state.parent {
        report_error(format!(
            "Can't add child '{}' to '{}', already has a parent '{}'.",
            child_state.name,
            display_name(parent),
            display_name(existing)
        ));
        return Ok(Var::nil());
    }
    if is_ancestor(child, parent) {
        report_error(format!("Can't add child '{}' to one of its descendants.", child_state.name));
        return Ok(Var::nil());
    }

    let wanted = if child_state.name.is_empty() {
        objects::class_name(child).unwrap_or_else(|| "Node".to_string())
    } else {
        child_state.name.clone()
    };
    let name = unique_name(parent, &wanted);
    update(child, |node| {
        node.name = name;
        node.parent = Some(parent);
    });
    update(parent, |node| node.children.push(child));

    if state(parent).is_some_and(|node| node.in_tree) {
        propagate_enter(child);
        propagate_ready(child);
    }
    Ok(Var::nil())
}

fn unlink(parent: u64, child: u64) {
    update(parent, |node| node.children.retain(|c| *c != child));
    update(child, |node| node.parent = None);
}

fn remove_child(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let parent = this_id(this)?;
    let Some(child) = object_arg(args, 0) else {
        report_error("remove_child: parameter \"node\" is null".to_string());
        return Ok(Var::nil());
    };
    if state(child).and_then(|node| node.parent) != Some(parent) {
        report_error(format!(
            "Cannot remove child node '{}' as it is not a child of this node.",
            display_name(child)
        ));
        return Ok(Var::nil());
    }
    if state(child).is_some_and(|node| node.in_tree) {
        propagate_exit(child);
    }
    unlink(parent, child);
    Ok(Var::nil())
}

/// Leave the tree, detach from the parent and destroy the children of a
/// node about to be destroyed.
pub(crate) fn detach_for_destroy(id: u64) {
    let Some(node) = state(id) else {
        return;
    };
    if node.in_tree {
        propagate_exit(id);
    }
    if let Some(parent) = node.parent {
        unlink(parent, id);
    }
    for child in node.children {
        update(child, |state| state.parent = None);
        objects::destroy(child);
    }
}

fn get_child_count(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    Ok(Var::from_int(state(id).map_or(0, |node| node.children.len() as i64)))
}

fn get_child(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    let children = state(id).map(|node| node.children).unwrap_or_default();
    let count = children.len() as i64;
    let requested = int_arg(args, 0);
    let index = if requested < 0 { count + requested } else { requested };
    if index < 0 || index >= count {
        report_error(format!("Index p_index = {requested} is out of bounds (count = {count})."));
        return Ok(object_result(None));
    }
    Ok(object_result(children.get(index as usize).copied()))
}

fn get_parent(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    Ok(object_result(state(id).and_then(|node| node.parent)))
}

fn set_name(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    let name = text_arg(args, 0);
    update(id, |node| node.name = name);
    Ok(Var::nil())
}

fn get_name(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    Ok(string_name(&display_name(id)))
}

fn is_inside_tree(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    Ok(Var::from_bool(state(id).is_some_and(|node| node.in_tree)))
}

fn get_path(this: ObjectPtr, _: &[Var]) -> Result<Var, CallError> {
    let id = this_id(this)?;
    if !state(id).is_some_and(|node| node.in_tree) {
        report_error("Cannot get path of node as it is not in a scene tree.".to_string());
        return Ok(node_path(""));
    }
    let mut names = Vec::new();
    let mut current = Some(id);
    while let Some(node) = current.and_then(state) {
        names.push(node.name);
        current = node.parent;
    }
    names.reverse();
    Ok(node_path(&format!("/{}", names.join("/"))))
}

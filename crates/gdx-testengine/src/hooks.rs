//! Diagnostics exposed to tests.
//!
//! Output and error buffers are process-wide and only grow; tests running in
//! parallel should look for their own messages rather than compare whole
//! buffers.

use std::sync::{LazyLock, Mutex};

use crate::value::lock;
use crate::{classdb, objects};

static OUTPUT: LazyLock<Mutex<Vec<String>>> = LazyLock::new(Default::default);
static ERRORS: LazyLock<Mutex<Vec<String>>> = LazyLock::new(Default::default);
static WARNINGS: LazyLock<Mutex<Vec<String>>> = LazyLock::new(Default::default);

pub(crate) fn report_output(line: String) {
    tracing::info!(target: "gdx_testengine::print", "{line}");
    lock(&OUTPUT).push(line);
}

pub(crate) fn report_error(message: String) {
    tracing::error!(target: "gdx_testengine", "{message}");
    lock(&ERRORS).push(message);
}

pub(crate) fn report_warning(message: String) {
    tracing::warn!(target: "gdx_testengine", "{message}");
    lock(&WARNINGS).push(message);
}

/// Lines printed through the `print` utility.
pub fn captured_output() -> Vec<String> {
    lock(&OUTPUT).clone()
}

/// Errors raised by the engine or reported through `print_error`.
pub fn captured_errors() -> Vec<String> {
    lock(&ERRORS).clone()
}

/// Warnings reported through `print_warning`.
pub fn captured_warnings() -> Vec<String> {
    lock(&WARNINGS).clone()
}

/// Instance ids of every destroyed object, in destruction order.
pub fn destroyed_objects() -> Vec<u64> {
    objects::destroyed()
}

pub fn is_destroyed(id: u64) -> bool {
    objects::destroyed().contains(&id)
}

pub fn is_live(id: u64) -> bool {
    objects::is_live(id)
}

/// Reference count of a live `RefCounted` object.
pub fn reference_count(id: u64) -> Option<i64> {
    objects::reference_count(id)
}

pub fn live_object_count() -> usize {
    objects::live_count()
}

/// Report `hash` for `class::method` from now on. Call before booting to make
/// the bridge's startup resolution see a mismatch.
pub fn override_method_hash(class: &str, method: &str, hash: i64) {
    classdb::override_method_hash(class, method, hash);
}

/// Integer constant registered on `class` or an ancestor.
pub fn class_constant(class: &str, name: &str) -> Option<i64> {
    classdb::constant(class, name)
}

/// Enum name and bitfield flag a constant was registered with.
pub fn class_constant_enum(class: &str, name: &str) -> Option<(String, bool)> {
    classdb::constant_enum(class, name)
}

pub fn class_exists(class: &str) -> bool {
    classdb::exists(class)
}

pub fn class_parent(class: &str) -> Option<String> {
    classdb::parent_of(class)
}

/// Names of properties `class` exposes, ancestors included.
pub fn class_properties(class: &str) -> Vec<String> {
    classdb::properties_of(class).into_iter().map(|p| p.name).collect()
}

/// Names of the extension classes currently registered.
pub fn extension_classes() -> Vec<String> {
    classdb::extension_class_names()
}

/// Contents of a file in the in-memory file system.
pub fn read_file(path: &str) -> Option<Vec<u8>> {
    crate::classes::file_access::vfs_read(path)
}

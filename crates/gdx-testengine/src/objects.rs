//! Object table.
//!
//! Object pointers handed to the bridge are synthetic addresses derived from
//! the instance id. They are never dereferenced and never reused, so a stale
//! pointer always decodes to a dead id.
//!
//! Reference counts live in their own map so object variants can be copied
//! and dropped while the table is locked. An object whose last reference
//! goes away under the table lock is destroyed once the lock is released.

use std::cell::{Cell, RefCell};
use std::sync::{LazyLock, Mutex, RwLock};

use gdx_sys::{ClassInstancePtr, ObjectPtr};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::classes::{animation::AnimationState, file_access::FileState, node::NodeState};
use crate::value::{Var, lock};
use crate::{classdb, hooks};

const BASE: usize = 0x10_0000;
const STRIDE: usize = 16;

pub fn address_of(id: u64) -> usize {
    BASE + id as usize * STRIDE
}

pub fn ptr_of(id: u64) -> ObjectPtr {
    std::ptr::without_provenance_mut(address_of(id))
}

/// Id encoded in an object address; `None` for null or foreign pointers.
pub fn id_of(address: usize) -> Option<u64> {
    if address <= BASE || (address - BASE) % STRIDE != 0 {
        return None;
    }
    Some(((address - BASE) / STRIDE) as u64)
}

pub fn id_of_ptr(ptr: *const std::ffi::c_void) -> Option<u64> {
    id_of(ptr as usize)
}

/// Extension instance attached with `object_set_instance`.
#[derive(Debug, Clone)]
pub struct Attached {
    pub class: String,
    pub instance: usize,
}

#[derive(Debug)]
pub struct ObjectData {
    /// Engine class the object was constructed as.
    pub engine_class: String,
    pub extension: Option<Attached>,
    pub props: Vec<(String, Var)>,
    pub node: Option<NodeState>,
    pub animation: Option<AnimationState>,
    pub file: Option<FileState>,
}

impl ObjectData {
    /// Most derived class name, extension classes included.
    pub fn class_name(&self) -> &str {
        match &self.extension {
            Some(attached) => &attached.class,
            None => &self.engine_class,
        }
    }

    pub fn prop(&self, name: &str) -> Option<Var> {
        self.props.iter().find(|(key, _)| key == name).map(|(_, value)| value.clone())
    }

    pub fn set_prop(&mut self, name: &str, value: Var) {
        match self.props.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.props.push((name.to_string(), value)),
        }
    }
}

#[derive(Default)]
struct Table {
    next_id: u64,
    objects: FxHashMap<u64, ObjectData>,
    destroyed: Vec<u64>,
}

static TABLE: LazyLock<Mutex<Table>> = LazyLock::new(Default::default);
static LIVE: LazyLock<RwLock<FxHashSet<u64>>> = LazyLock::new(Default::default);
/// Counts of live `RefCounted` descendants.
static REFCOUNTS: LazyLock<Mutex<FxHashMap<u64, i64>>> = LazyLock::new(Default::default);

thread_local! {
    static TABLE_HELD: Cell<usize> = const { Cell::new(0) };
    static PENDING_DESTROY: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks the table as locked by this thread for as long as it lives.
struct Held;

impl Held {
    fn enter() -> Self {
        TABLE_HELD.with(|held| held.set(held.get() + 1));
        Held
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        TABLE_HELD.with(|held| held.set(held.get() - 1));
    }
}

fn table_held() -> bool {
    TABLE_HELD.try_with(|held| held.get() > 0).unwrap_or(false)
}

/// Destroy objects whose last reference went away under the table lock.
fn destroy_pending() {
    if table_held() {
        return;
    }
    loop {
        let next = PENDING_DESTROY
            .try_with(|pending| pending.borrow_mut().pop())
            .ok()
            .flatten();
        match next {
            Some(id) if is_live(id) => destroy(id),
            Some(_) => {}
            None => break,
        }
    }
}

pub fn is_live(id: u64) -> bool {
    LIVE.read().unwrap_or_else(std::sync::PoisonError::into_inner).contains(&id)
}

pub fn is_live_ptr(ptr: *const std::ffi::c_void) -> bool {
    id_of_ptr(ptr).is_some_and(is_live)
}

/// Allocate an object of the engine class `class`.
pub fn create(class: &str) -> ObjectPtr {
    let refcounted = classdb::is_refcounted(class);
    let is_node = classdb::inherits(class, "Node");
    let is_animation = classdb::inherits(class, "Animation");
    let is_file = classdb::inherits(class, "FileAccess");

    let mut table = lock(&TABLE);
    table.next_id += 1;
    let id = table.next_id;
    table.objects.insert(
        id,
        ObjectData {
            engine_class: class.to_string(),
            extension: None,
            props: Vec::new(),
            node: is_node.then(NodeState::default),
            animation: is_animation.then(AnimationState::default),
            file: is_file.then(FileState::default),
        },
    );
    LIVE.write().unwrap_or_else(std::sync::PoisonError::into_inner).insert(id);
    drop(table);
    if refcounted {
        lock(&REFCOUNTS).insert(id, 0);
    }

    tracing::trace!(class, id, "object created");
    ptr_of(id)
}

/// Run `f` on a live object. The table lock is held for the duration, so `f`
/// must not call back into the table or the bridge.
pub fn with<R>(id: u64, f: impl FnOnce(&mut ObjectData) -> R) -> Option<R> {
    let result = {
        let _held = Held::enter();
        let mut table = lock(&TABLE);
        table.objects.get_mut(&id).map(f)
    };
    destroy_pending();
    result
}

pub fn class_name(id: u64) -> Option<String> {
    with(id, |object| object.class_name().to_string())
}

pub fn attached(id: u64) -> Option<Attached> {
    with(id, |object| object.extension.clone()).flatten()
}

pub fn attach(id: u64, class: &str, instance: ClassInstancePtr) -> bool {
    with(id, |object| {
        object.extension = Some(Attached {
            class: class.to_string(),
            instance: instance as usize,
        });
    })
    .is_some()
}

/// Object variant for the address stored in an object slot. The variant
/// takes its own reference.
pub fn object_var(address: usize) -> Var {
    match id_of(address) {
        Some(id) => Var::from_object(address, id),
        None => Var::from_object(0, 0),
    }
}

/// Object variant taking over the reference a return slot carries.
pub fn adopt_object_var(address: usize) -> Var {
    match id_of(address) {
        Some(id) => Var::adopt_object(address, id),
        None => Var::from_object(0, 0),
    }
}

/// Address to store for an object variant: null for non-objects and dead
/// objects.
pub fn live_address(value: &Var) -> usize {
    match value.object() {
        Some((address, id)) if address != 0 && is_live(id) => address,
        _ => 0,
    }
}

/// `<Class#id>`, or the extension's own text.
pub fn describe(id: u64) -> String {
    let Some(class) = class_name(id) else {
        return "<Freed Object>".to_string();
    };
    if let Some(text) = classdb::extension_to_string(id) {
        return text;
    }
    format!("<{class}#{id}>")
}

// ============================================================================
// Reference counting
// ============================================================================

pub fn reference(id: u64) -> bool {
    let count = lock(&REFCOUNTS).get_mut(&id).map(|count| {
        *count += 1;
        *count
    });
    tracing::trace!(id, ?count, "reference");
    count.is_some()
}

/// Decrement; true when the count reached zero.
pub fn unreference(id: u64) -> bool {
    let count = lock(&REFCOUNTS).get_mut(&id).map(|count| {
        *count = (*count - 1).max(0);
        *count
    });
    tracing::trace!(id, ?count, "unreference");
    count == Some(0)
}

pub fn reference_count(id: u64) -> Option<i64> {
    lock(&REFCOUNTS).get(&id).copied()
}

/// Give back a reference held by an engine-side value, destroying the
/// object when it was the last one.
pub fn release(id: u64) {
    if !unreference(id) {
        return;
    }
    if table_held() {
        let _ = PENDING_DESTROY.try_with(|pending| pending.borrow_mut().push(id));
    } else {
        destroy(id);
    }
}

// ============================================================================
// Destruction
// ============================================================================

/// Destroy a live object: predelete notification, scene detachment,
/// children, extension instance, then the table entry.
pub fn destroy(id: u64) {
    if !is_live(id) {
        hooks::report_error(format!("object_destroy: instance #{id} is not alive"));
        return;
    }

    classdb::notify(id, crate::classes::object::NOTIFICATION_PREDELETE);
    crate::classes::node::detach_for_destroy(id);

    let removed = {
        let mut table = lock(&TABLE);
        let removed = table.objects.remove(&id);
        if removed.is_some() {
            table.destroyed.push(id);
        }
        LIVE.write().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&id);
        removed
    };
    lock(&REFCOUNTS).remove(&id);

    if let Some(Attached { class, instance }) = removed.and_then(|object| object.extension) {
        classdb::free_extension_instance(&class, instance as ClassInstancePtr);
    }
    tracing::trace!(id, "object destroyed");
}

pub fn destroyed() -> Vec<u64> {
    lock(&TABLE).destroyed.clone()
}

pub fn live_count() -> usize {
    lock(&TABLE).objects.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_decode_to_ids() {
        assert_eq!(id_of(address_of(7)), Some(7));
        assert_eq!(id_of(0), None);
        assert_eq!(id_of(address_of(7) + 1), None);
    }

    #[test]
    fn refcounts_start_at_zero() {
        let ptr = create("RefCounted");
        let id = id_of_ptr(ptr).unwrap();
        assert_eq!(reference_count(id), Some(0));
        assert!(reference(id));
        assert!(reference(id));
        assert_eq!(reference_count(id), Some(2));
        assert!(!unreference(id));
        assert!(unreference(id));
        destroy(id);
        assert!(!is_live(id));
        assert!(destroyed().contains(&id));
        assert_eq!(reference_count(id), None);
    }

    #[test]
    fn object_variants_hold_a_reference() {
        let ptr = create("RefCounted");
        let id = id_of_ptr(ptr).unwrap();
        let variant = object_var(ptr as usize);
        assert_eq!(reference_count(id), Some(1));
        let copy = variant.clone();
        assert_eq!(reference_count(id), Some(2));
        drop(variant);
        assert!(is_live(id));
        drop(copy);
        assert!(!is_live(id));
    }

    #[test]
    fn last_reference_dropped_under_the_table_lock_destroys_after_it() {
        let holder = id_of_ptr(create("Object")).unwrap();
        let ptr = create("RefCounted");
        let id = id_of_ptr(ptr).unwrap();
        with(holder, |object| object.set_prop("held", object_var(ptr as usize)));
        assert_eq!(reference_count(id), Some(1));
        with(holder, |object| object.set_prop("held", Var::nil()));
        assert!(!is_live(id));
        destroy(holder);
    }

    #[test]
    fn plain_objects_have_no_refcount() {
        let id = id_of_ptr(create("Object")).unwrap();
        assert_eq!(reference_count(id), None);
        assert!(!reference(id));
        destroy(id);
    }
}

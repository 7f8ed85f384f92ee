//! A host class with a hand-written init, a renamed class and a base field
//! under another name.

use gdx::prelude::*;

#[derive(HostClass)]
#[class(base = RefCounted, name = "SaveSlot", register = SaveSlot::register_methods)]
struct SaveSlot {
    #[base]
    owner: Base<RefCounted>,
    #[var(name = "slot_index")]
    index: i64,
    #[var(read_only)]
    label: GString,
}

impl HostInit for SaveSlot {
    fn init(owner: Base<RefCounted>) -> Self {
        Self {
            owner,
            index: 1,
            label: GString::new(),
        }
    }
}

impl SaveSlot {
    fn register_methods(builder: &mut ClassBuilder<Self>) {
        builder.method("is_first", |this: &SaveSlot| this.index == 1);
    }
}

fn main() {
    assert_eq!(<SaveSlot as gdx::registrar::HostClass>::CLASS_NAME, "SaveSlot");
    let _ = std::mem::size_of::<SaveSlot>();
}

//! Shared harness for the integration tests: one reference engine per test
//! binary, booted with the host classes below registered at the scene level.

#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use gdx::prelude::*;

/// Node that counts the engine callbacks it receives.
#[derive(HostClass)]
#[class(base = Node, init, register = Self::register_methods, overrides(ready, process))]
pub struct Spinner {
    base: Base<Node>,
    #[var]
    pub speed: f64,
    #[var(read_only)]
    pub angle: f64,
    pub readies: u32,
    pub frames: u32,
}

impl Spinner {
    fn register_methods(builder: &mut ClassBuilder<Self>) {
        builder
            .method("reset", |this: &mut Spinner| {
                this.angle = 0.0;
                this.frames = 0;
            })
            .method("turns", |this: &Spinner| (this.angle / 360.0).floor() as i64);
    }
}

impl INode for Spinner {
    fn ready(&mut self) {
        self.readies += 1;
    }

    fn process(&mut self, delta: f64) {
        self.angle += self.speed * delta;
        self.frames += 1;
    }
}

/// Reference counted bag of item weights.
#[derive(HostClass)]
#[class(base = RefCounted, register = Self::register_methods)]
pub struct Inventory {
    base: Base<RefCounted>,
    #[var]
    pub capacity: i64,
    pub items: Vec<i64>,
}

impl HostInit for Inventory {
    fn init(base: Base<RefCounted>) -> Self {
        Self {
            base,
            capacity: 3,
            items: Vec::new(),
        }
    }
}

impl Inventory {
    fn register_methods(builder: &mut ClassBuilder<Self>) {
        builder
            .method("store", |this: &mut Inventory, weight: i64| {
                if this.items.len() as i64 >= this.capacity {
                    return false;
                }
                this.items.push(weight);
                true
            })
            .method("total_weight", |this: &Inventory| this.items.iter().sum::<i64>())
            .constant("Limits", "MAX_CAPACITY", 64)
            .on_to_string(|this| format!("Inventory({}/{})", this.items.len(), this.capacity));
    }
}

struct BridgeTests;

impl ExtensionLibrary for BridgeTests {
    fn on_level_init(level: InitializationLevel) {
        if level == InitializationLevel::Scene {
            register_class::<Spinner>().expect("register Spinner");
            register_class::<Inventory>().expect("register Inventory");
        }
    }
}

gdx::entry_point!(gdx_bridge_tests_init, BridgeTests);

static BOOT: Once = Once::new();
static SERIAL: Mutex<()> = Mutex::new(());

/// Boot the engine on first use. The returned guard serializes tests, which
/// share the engine's object table.
pub fn setup() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    BOOT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        gdx_testengine::boot(gdx_bridge_tests_init).expect("reference engine boots");
    });
    guard
}

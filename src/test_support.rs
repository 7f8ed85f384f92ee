//! One reference engine shared by every unit test of the crate.
//!
//! The engine's object table and class database are process-global, so
//! tests that use them run one at a time: [`boot`] takes a lock the test
//! thread holds until it ends.

use std::cell::RefCell;
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use crate::init::ExtensionLibrary;

struct UnitTests;

impl ExtensionLibrary for UnitTests {}

crate::entry_point!(gdx_unit_tests_init, UnitTests);

static BOOT: Once = Once::new();
static SERIAL: Mutex<()> = Mutex::new(());

thread_local! {
    static HELD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

/// Boot the engine on first use and serialize the calling test.
pub(crate) fn boot() {
    HELD.with(|held| {
        let mut held = held.borrow_mut();
        if held.is_none() {
            *held = Some(SERIAL.lock().unwrap_or_else(PoisonError::into_inner));
        }
    });
    BOOT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        if let Err(error) = gdx_testengine::boot(gdx_unit_tests_init) {
            panic!("reference engine failed to boot: {error}");
        }
    });
}

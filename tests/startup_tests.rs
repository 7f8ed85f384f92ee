//! Startup checks against engines that do not match the bindings. The bind
//! cache can be installed once per process, so every scenario runs in order
//! inside a single test.

use gdx::prelude::*;

struct Strict;

impl ExtensionLibrary for Strict {}

gdx::entry_point!(gdx_strict_init, Strict);

struct Lenient;

impl ExtensionLibrary for Lenient {
    fn config() -> BridgeConfig {
        BridgeConfig {
            mismatch_policy: MismatchPolicy::Degrade,
            ..BridgeConfig::default()
        }
    }
}

gdx::entry_point!(gdx_lenient_init, Lenient);

#[test]
fn test_startup_against_mismatched_engines() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // A different minor version is refused before anything is resolved.
    gdx_testengine::override_version(4, 3, 0);
    assert!(matches!(
        gdx_testengine::boot(gdx_strict_init),
        Err(gdx_testengine::EngineError::EntryRejected)
    ));
    assert!(
        gdx_testengine::captured_errors()
            .iter()
            .any(|message| message.contains("incompatible"))
    );

    // Patch releases are accepted, but a changed method hash is fatal by default.
    gdx_testengine::override_version(4, 2, 7);
    gdx_testengine::override_method_hash("Animation", "add_track", 0x5eed);
    assert!(matches!(
        gdx_testengine::boot(gdx_strict_init),
        Err(gdx_testengine::EngineError::EntryRejected)
    ));
    assert!(
        gdx_testengine::captured_errors()
            .iter()
            .any(|message| message.contains("failed to resolve"))
    );

    // Degrading turns the missing method into a warning and a default value.
    gdx_testengine::boot(gdx_lenient_init).expect("degraded bindings load");
    let mut animation = Animation::new_gd();
    assert_eq!(animation.add_track(gdx::classes::animation::TrackType::TYPE_VALUE, -1), 0);
    assert_eq!(animation.get_track_count(), 0);
    let warnings = gdx_testengine::captured_warnings();
    assert_eq!(
        warnings.iter().filter(|message| message.contains("Animation::add_track")).count(),
        1
    );
    animation.add_track(gdx::classes::animation::TrackType::TYPE_VALUE, -1);
    assert_eq!(gdx_testengine::captured_warnings().len(), warnings.len(), "warned once per method");

    gdx_testengine::shutdown().expect("library unloads");
}

//! Library entry point and initialization levels.
//!
//! The engine calls the symbol declared with [`entry_point!`] once when it
//! loads the library. Startup then runs in a fixed order:
//!
//! 1. copy the interface table ([`gdx_sys::initialize`]);
//! 2. check the engine version against the manifest the bindings came from;
//! 3. resolve every method, utility and builtin method into the bind cache;
//! 4. check the builtin constructors and destructors the bridge relies on;
//! 5. record the engine class hierarchy in the class registry.
//!
//! Any failure makes the entry point return false, and the engine refuses
//! the library. Afterwards the engine walks the initialization levels and
//! the [`ExtensionLibrary`] hooks run once per level.

use gdx_registry::{BindError, EngineResolver, MethodBindCache, MismatchPolicy, RegistryError};
use gdx_sys::{
    BindingError, Bool, ClassLibraryPtr, EngineInterface, EngineVersion, Initialization,
    InitializationLevel,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::builtin::OPAQUE_KINDS;
use crate::registrar;

/// Startup settings of an extension library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Reaction to engine symbols that do not resolve.
    pub mismatch_policy: MismatchPolicy,
    /// First level the engine initializes the library at.
    pub minimum_level: InitializationLevel,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mismatch_policy: MismatchPolicy::Fatal,
            minimum_level: InitializationLevel::Scene,
        }
    }
}

/// Hooks of an extension library, named in [`entry_point!`].
pub trait ExtensionLibrary {
    fn config() -> BridgeConfig {
        BridgeConfig::default()
    }

    /// Called when the engine reaches `level`; register classes here.
    fn on_level_init(level: InitializationLevel) {
        let _ = level;
    }

    /// Called before the engine leaves `level`. Classes registered during
    /// the level are unregistered right after, newest first.
    fn on_level_deinit(level: InitializationLevel) {
        let _ = level;
    }
}

/// Why the library refused to load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("engine {engine} is incompatible with bindings generated for {manifest}")]
    IncompatibleVersion { engine: String, manifest: String },

    #[error("{} engine symbols failed to resolve; first: {}", .0.len(), first_failure(.0))]
    Bind(Vec<BindError>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("engine provides no {operation} for `{kind}`")]
    MissingOperation { kind: &'static str, operation: &'static str },
}

fn first_failure(errors: &[BindError]) -> String {
    errors.first().map(ToString::to_string).unwrap_or_default()
}

/// Declare the library's entry symbol.
///
/// ```ignore
/// struct Game;
/// impl ExtensionLibrary for Game {}
/// gdx::entry_point!(game_library_init, Game);
/// ```
#[macro_export]
macro_rules! entry_point {
    ($symbol:ident, $library:ty) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $symbol(
            interface: *const $crate::sys::EngineInterface,
            library: $crate::sys::ClassLibraryPtr,
            init: *mut $crate::sys::Initialization,
        ) -> $crate::sys::Bool {
            unsafe { $crate::init::__entry::<$library>(interface, library, init) }
        }
    };
}

#[doc(hidden)]
pub unsafe fn __entry<L: ExtensionLibrary>(
    interface: *const EngineInterface,
    library: ClassLibraryPtr,
    init: *mut Initialization,
) -> Bool {
    if init.is_null() {
        crate::engine_error!("entry point received a null initialization record");
        return gdx_sys::FALSE;
    }
    let loaded = registrar::guarded("library", "entry point", Err(None), || {
        unsafe { load::<L>(interface, library) }.map_err(Some)
    });
    match loaded {
        Ok(config) => {
            unsafe {
                *init = Initialization {
                    minimum_initialization_level: u32::from(config.minimum_level),
                    userdata: std::ptr::null_mut(),
                    initialize: Some(initialize_level::<L>),
                    deinitialize: Some(deinitialize_level::<L>),
                };
            }
            gdx_sys::TRUE
        }
        Err(Some(error)) => {
            crate::engine_error!("extension library failed to load: {error}");
            gdx_sys::FALSE
        }
        Err(None) => gdx_sys::FALSE,
    }
}

unsafe fn load<L: ExtensionLibrary>(
    interface: *const EngineInterface,
    library: ClassLibraryPtr,
) -> Result<BridgeConfig, InitError> {
    let config = L::config();
    match unsafe { gdx_sys::initialize(interface, library) } {
        Ok(()) => {}
        // Reloaded into the same process: the tables are still valid.
        Err(BindingError::AlreadyInitialized) if gdx_registry::try_cache().is_some() => {
            debug!("engine interface already installed; reusing bind cache");
            return Ok(config);
        }
        Err(BindingError::AlreadyInitialized) => {}
        Err(error) => return Err(error.into()),
    }

    check_version()?;

    let policy = config.mismatch_policy;
    let cache = MethodBindCache::load(&crate::tables::TABLES, policy, &EngineResolver)
        .map_err(InitError::Bind)?;
    check_builtin_operations(&cache)?;
    gdx_registry::install_cache(cache).map_err(|error| InitError::Bind(vec![error]))?;

    register_engine_classes()?;
    info!(
        version = crate::tables::API_VERSION_NAME,
        policy = ?config.mismatch_policy,
        "extension library loaded"
    );
    Ok(config)
}

/// Major and minor must match the manifest; patch releases are compatible.
fn check_version() -> Result<(), InitError> {
    let get_version = gdx_sys::interface_fn!(get_version);
    let mut version = EngineVersion::default();
    unsafe { get_version(&mut version) };

    let (major, minor, patch) = crate::tables::API_VERSION;
    if version.major != major || version.minor != minor {
        return Err(InitError::IncompatibleVersion {
            engine: format!("{}.{}.{}", version.major, version.minor, version.patch),
            manifest: format!("{major}.{minor}.{patch}"),
        });
    }
    debug!(major, minor, engine_patch = version.patch, "engine version accepted");
    Ok(())
}

fn check_builtin_operations(cache: &MethodBindCache) -> Result<(), InitError> {
    let mut missing = Vec::new();
    for &kind in OPAQUE_KINDS {
        for index in [gdx_sys::ctor::DEFAULT, gdx_sys::ctor::COPY] {
            if let Err(error) = cache.resolve_constructor(kind, index) {
                missing.push(error);
            }
        }
        if cache.destructor(kind).is_none() {
            return Err(InitError::MissingOperation {
                kind: kind.name(),
                operation: "destructor",
            });
        }
        if cache.variant_from_type(kind).is_none() || cache.variant_to_type(kind).is_none() {
            return Err(InitError::MissingOperation {
                kind: kind.name(),
                operation: "variant conversion",
            });
        }
    }
    if missing.is_empty() { Ok(()) } else { Err(InitError::Bind(missing)) }
}

fn register_engine_classes() -> Result<(), InitError> {
    let mut registry = gdx_registry::classes_mut();
    if !registry.is_empty() {
        return Ok(());
    }
    let descriptors = crate::tables::engine_class_descriptors();
    let count = descriptors.len();
    for descriptor in descriptors {
        registry.register(descriptor)?;
    }
    registry.validate()?;
    debug!(classes = count, "engine class hierarchy recorded");
    Ok(())
}

fn level_from_sys(level: u32) -> Option<InitializationLevel> {
    match InitializationLevel::try_from(level) {
        Ok(level) => Some(level),
        Err(_) => {
            crate::engine_error!("engine reported unknown initialization level {level}");
            None
        }
    }
}

unsafe extern "C" fn initialize_level<L: ExtensionLibrary>(
    _userdata: *mut std::ffi::c_void,
    level: u32,
) {
    let Some(level) = level_from_sys(level) else {
        return;
    };
    debug!(?level, "initializing level");
    registrar::set_current_level(Some(level));
    registrar::guarded("library", "level initialization", (), || L::on_level_init(level));
    registrar::set_current_level(None);
}

unsafe extern "C" fn deinitialize_level<L: ExtensionLibrary>(
    _userdata: *mut std::ffi::c_void,
    level: u32,
) {
    let Some(level) = level_from_sys(level) else {
        return;
    };
    debug!(?level, "deinitializing level");
    registrar::guarded("library", "level deinitialization", (), || L::on_level_deinit(level));
    registrar::unregister_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_strict() {
        let config = BridgeConfig::default();
        assert_eq!(config.mismatch_policy, MismatchPolicy::Fatal);
        assert_eq!(config.minimum_level, InitializationLevel::Scene);
    }

    #[test]
    fn bind_errors_report_the_first_failure() {
        let failures = vec![BindError::InterfaceNotLoaded, BindError::InterfaceNotLoaded];
        let error = InitError::Bind(failures);
        let message = error.to_string();
        assert!(message.starts_with("2 engine symbols failed to resolve"), "{message}");
    }

    #[test]
    fn the_bridge_loaded_against_the_reference_engine() {
        crate::test_support::boot();
        assert!(gdx_registry::try_cache().is_some());
        let classes = gdx_registry::classes();
        assert!(classes.contains("Object"));
        assert_eq!(classes.parent_chain("Node").last(), Some(&"Object"));
    }
}

use std::sync::OnceLock;

use thiserror::Error;

use crate::interface::EngineInterface;
use crate::types::ClassLibraryPtr;

struct Binding {
    interface: EngineInterface,
    library: LibraryToken,
}

#[derive(Clone, Copy)]
struct LibraryToken(ClassLibraryPtr);

// The library token is an opaque identifier; the engine never dereferences it
// on our behalf from other threads.
unsafe impl Send for LibraryToken {}
unsafe impl Sync for LibraryToken {}

static BINDING: OnceLock<Binding> = OnceLock::new();

/// Failure to install the engine interface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("engine passed a null interface table")]
    NullInterface,
    #[error("engine interface already installed")]
    AlreadyInitialized,
    #[error("engine interface lacks entries: {}", .0.join(", "))]
    MissingEntries(Vec<&'static str>),
}

/// Install the interface table received by the entry point.
///
/// The table is copied; the engine's pointer need not outlive this call.
///
/// # Safety
///
/// `interface` must be null or point to a valid, fully initialized table.
pub unsafe fn initialize(
    interface: *const EngineInterface,
    library: ClassLibraryPtr,
) -> Result<(), BindingError> {
    if interface.is_null() {
        return Err(BindingError::NullInterface);
    }
    let interface = unsafe { *interface };
    let missing = interface.missing_entries();
    if !missing.is_empty() {
        return Err(BindingError::MissingEntries(missing));
    }

    BINDING
        .set(Binding {
            interface,
            library: LibraryToken(library),
        })
        .map_err(|_| BindingError::AlreadyInitialized)
}

pub fn is_initialized() -> bool {
    BINDING.get().is_some()
}

pub fn try_interface() -> Option<&'static EngineInterface> {
    BINDING.get().map(|b| &b.interface)
}

/// The installed interface.
///
/// # Panics
///
/// When called before [`initialize`].
pub fn interface() -> &'static EngineInterface {
    match BINDING.get() {
        Some(binding) => &binding.interface,
        None => not_initialized(),
    }
}

/// Library token passed to class registration entries.
pub fn library() -> ClassLibraryPtr {
    match BINDING.get() {
        Some(binding) => binding.library.0,
        None => not_initialized(),
    }
}

#[cold]
#[inline(never)]
fn not_initialized() -> ! {
    panic!("engine interface used before the entry point installed it")
}

#[doc(hidden)]
#[cold]
#[inline(never)]
pub fn missing_entry(name: &str) -> ! {
    panic!("engine interface entry `{name}` is not available")
}

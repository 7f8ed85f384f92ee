//! Runtime bridge between Rust and the Host Engine's extension interface.
//!
//! An extension library exports one entry symbol ([`entry_point!`]). When the
//! engine loads it, the bridge copies the engine's function table, resolves
//! every method, utility and builtin method the generated bindings call, and
//! records the engine's class hierarchy. From then on:
//!
//! - [`classes`] wraps every engine class as a handle type whose methods
//!   marshal their arguments through a per-thread call [`frame`];
//! - [`obj`] decides who frees what: [`Gd`](obj::Gd) for engine-owned and
//!   reference-counted objects, [`Owned`](obj::Owned) for objects the caller
//!   must free, [`WeakGd`](obj::WeakGd) for handles that may dangle;
//! - [`variant`] and [`builtin`] hold the engine's dynamic values and
//!   containers without ever interpreting their bodies;
//! - [`registrar`] lets Rust types become engine classes with methods,
//!   properties and overridden virtuals.
//!
//! # Example
//!
//! ```ignore
//! use gdx::prelude::*;
//!
//! #[derive(HostClass)]
//! #[class(base = Node, init, overrides(ready))]
//! struct Player {
//!     base: Base<Node>,
//!     #[var]
//!     speed: f64,
//! }
//!
//! impl INode for Player {
//!     fn ready(&mut self) {
//!         gdx::utilities::print(&Variant::from("ready"), &[]);
//!     }
//! }
//!
//! struct Game;
//!
//! impl ExtensionLibrary for Game {
//!     fn on_level_init(level: InitializationLevel) {
//!         if level == InitializationLevel::Scene {
//!             register_class::<Player>().ok();
//!         }
//!     }
//! }
//!
//! gdx::entry_point!(game_library_init, Game);
//! ```

extern crate self as gdx;

pub mod builtin;
pub mod call;
pub mod frame;
pub mod init;
pub mod log;
pub mod meta;
pub mod obj;
pub mod registrar;
pub mod variant;

#[cfg(test)]
mod test_support;

pub use gdx_macros::HostClass;
pub use gdx_registry as registry;
pub use gdx_sys as sys;

/// Engine classes, their enums and virtual traits.
#[allow(clippy::all, non_camel_case_types, non_snake_case, unused_mut)]
pub mod classes {
    include!(concat!(env!("OUT_DIR"), "/classes.rs"));
}

/// Enums declared at the top level of the manifest.
#[allow(clippy::all)]
pub mod global {
    include!(concat!(env!("OUT_DIR"), "/global_enums.rs"));
}

/// Engine utility functions.
#[allow(clippy::all, clippy::too_many_arguments)]
pub mod utilities {
    include!(concat!(env!("OUT_DIR"), "/utilities.rs"));
}

#[allow(clippy::all)]
mod builtin_methods {
    include!(concat!(env!("OUT_DIR"), "/builtin_methods.rs"));
}

/// Bind-table ids, class descriptors and manifest metadata.
#[doc(hidden)]
#[allow(clippy::all)]
pub mod tables {
    include!(concat!(env!("OUT_DIR"), "/tables.rs"));
}

pub mod prelude {
    pub use crate::HostClass;
    pub use crate::builtin::*;
    pub use crate::call::CallError;
    pub use crate::classes::*;
    pub use crate::global::Error;
    pub use crate::init::{BridgeConfig, ExtensionLibrary, InitError};
    pub use crate::meta::{FromVariant, PtrCodec, ToVariant};
    pub use crate::obj::{
        ClassIdentity, EngineClass, Gd, Inherits, ObjectArg, ObjectError, Owned, WeakGd,
    };
    pub use crate::registrar::{
        Base, ClassBuilder, DynamicProperty, HostClass, HostInit, Instance, register_class,
    };
    pub use crate::variant::{Variant, VariantError};
    pub use gdx_registry::MismatchPolicy;
    pub use gdx_sys::{InitializationLevel, VariantType};
}

//! Proc macros for the gdx bridge.
//!
//! # Macros
//!
//! - `#[derive(HostClass)]` - Register a Rust struct as an engine class
//!
//! # Example
//!
//! ```ignore
//! use gdx::prelude::*;
//!
//! #[derive(HostClass)]
//! #[class(base = Node, init, register = Self::register_methods, overrides(ready, process))]
//! pub struct Mover {
//!     base: Base<Node>,
//!     #[var]
//!     speed: f64,
//!     #[var(read_only)]
//!     ticks: i64,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_class;

/// Derive `HostClass` for a struct with named fields.
///
/// # Class Attributes
///
/// - `#[class(base = Node)]` - Engine class to extend (required). A bare
///   name resolves in `gdx::classes`; a path is used as written.
/// - `#[class(name = "...")]` - Override the engine class name
/// - `#[class(init)]` - Generate `init`: the base field receives the engine
///   object, every other field its `Default`. Without it the type must
///   implement `HostInit`.
/// - `#[class(register = path)]` - Function taking `&mut ClassBuilder<Self>`
///   called after the generated registrations
/// - `#[class(overrides(ready, process))]` - Route these engine virtuals to
///   the type's `I<Base>` implementation
///
/// # Field Attributes
///
/// - `#[var]` - Expose as a property with `get_<name>`/`set_<name>` methods
/// - `#[var(read_only)]` - Expose with a getter only
/// - `#[var(name = "...")]` - Override the property name
/// - `#[base]` - Mark the base field when it is not named `base`
#[proc_macro_derive(HostClass, attributes(class, var, base))]
pub fn derive_host_class(input: TokenStream) -> TokenStream {
    derive_class::derive_host_class_impl(input)
}

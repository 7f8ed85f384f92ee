//! Token emitters, one per generated file.
//!
//! Every emitter works from the same [`SymbolIds`], so the constant a
//! trampoline indexes the bind cache with always matches the row the tables
//! file declares for it.

mod builtins;
mod classes;
mod enums;
mod tables;
mod utilities;

use proc_macro2::{Ident, TokenStream};
use quote::format_ident;

use crate::context::{Context, to_shouty_case};
use crate::error::CodegenError;
use crate::{CodegenConfig, GeneratedFile};

pub use enums::emit_enum;

/// A resolved row of one of the bind tables.
#[derive(Debug, Clone)]
pub(crate) struct SymbolRow {
    pub owner: String,
    pub name: String,
    pub hash: i64,
    pub optional: bool,
    pub id: Ident,
}

/// Id assignment for every engine symbol the generated code calls.
#[derive(Debug, Default)]
pub(crate) struct SymbolIds {
    pub methods: Vec<SymbolRow>,
    pub utilities: Vec<SymbolRow>,
    pub builtin_methods: Vec<SymbolRow>,
}

impl SymbolIds {
    pub fn collect(ctx: &Context<'_>) -> Result<Self, CodegenError> {
        let mut ids = SymbolIds::default();
        for class in &ctx.manifest.classes {
            for method in class.methods.iter().filter(|m| !m.is_virtual) {
                let hash = method.hash.ok_or_else(|| CodegenError::MissingHash {
                    class: class.name.clone(),
                    method: method.name.clone(),
                })?;
                ids.methods.push(SymbolRow {
                    owner: class.name.clone(),
                    name: method.name.clone(),
                    hash,
                    optional: class.is_editor_only(),
                    id: symbol_id(&class.name, &method.name),
                });
            }
        }
        for function in &ctx.manifest.utility_functions {
            ids.utilities.push(SymbolRow {
                owner: String::new(),
                name: function.name.clone(),
                hash: function.hash,
                optional: false,
                id: format_ident!("{}", function.name.to_ascii_uppercase()),
            });
        }
        for builtin in &ctx.manifest.builtin_classes {
            for method in &builtin.methods {
                ids.builtin_methods.push(SymbolRow {
                    owner: builtin.name.clone(),
                    name: method.name.clone(),
                    hash: method.hash,
                    optional: false,
                    id: symbol_id(&builtin.name, &method.name),
                });
            }
        }
        Ok(ids)
    }
}

/// `("Animation", "add_track")` -> `ANIMATION__ADD_TRACK`.
pub(crate) fn symbol_id(owner: &str, name: &str) -> Ident {
    format_ident!("{}__{}", to_shouty_case(owner), name.to_ascii_uppercase())
}

/// Emit every generated file.
pub(crate) fn emit_all(
    ctx: &Context<'_>,
    config: &CodegenConfig,
) -> Result<Vec<GeneratedFile>, CodegenError> {
    let ids = SymbolIds::collect(ctx)?;

    let files = [
        ("classes.rs", classes::emit(ctx)?),
        ("builtin_methods.rs", builtins::emit(ctx)?),
        ("utilities.rs", utilities::emit(ctx)?),
        ("global_enums.rs", enums::emit_global(ctx)),
        ("tables.rs", tables::emit(ctx, &ids, config)?),
    ];

    Ok(files
        .into_iter()
        .map(|(name, tokens): (&str, TokenStream)| GeneratedFile {
            name: name.to_string(),
            tokens,
        })
        .collect())
}

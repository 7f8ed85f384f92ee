//! Attribute parsing for `#[derive(HostClass)]`.

use syn::{Attribute, Ident, LitStr, Path, Token, parenthesized, punctuated::Punctuated};

/// Parsed `#[class(...)]` attributes on a struct.
#[derive(Default)]
pub struct ClassAttrs {
    /// Engine class to extend
    pub base: Option<Path>,
    /// Override the engine class name (default: Rust struct name)
    pub name: Option<String>,
    /// Generate `init` from the fields
    pub init: bool,
    /// User registration function
    pub register: Option<Path>,
    /// Rust names of overridden virtuals
    pub overrides: Vec<Ident>,
}

/// Parsed `#[var(...)]` attributes on a field.
#[derive(Debug, Default)]
pub struct VarAttrs {
    pub read_only: bool,
    pub name: Option<String>,
}

impl ClassAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("class") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("base") {
                    result.base = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    result.name = Some(value.value());
                } else if meta.path.is_ident("init") {
                    result.init = true;
                } else if meta.path.is_ident("register") {
                    result.register = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("overrides") {
                    let content;
                    parenthesized!(content in meta.input);
                    let names = Punctuated::<Ident, Token![,]>::parse_terminated(&content)?;
                    result.overrides.extend(names);
                } else {
                    return Err(meta.error(format!(
                        "unknown class attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}

impl VarAttrs {
    /// `None` when the field carries no `#[var]`.
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Option<Self>> {
        let mut result = None;

        for attr in attrs {
            if !attr.path().is_ident("var") {
                continue;
            }
            let var = result.get_or_insert_with(VarAttrs::default);
            // Bare `#[var]` has no list to parse.
            if matches!(attr.meta, syn::Meta::Path(_)) {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("read_only") {
                    var.read_only = true;
                } else if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    var.name = Some(value.value());
                } else {
                    return Err(meta.error(format!(
                        "unknown var attribute: {}",
                        meta.path.get_ident().map(|i| i.to_string()).unwrap_or_default()
                    )));
                }
                Ok(())
            })?;
        }

        Ok(result)
    }
}

/// Whether the field carries `#[base]`.
pub fn is_base_marked(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident("base"))
}

//! Validated view over a manifest: hierarchy queries, naming and type mapping.

use gdx_sys::VariantType;
use proc_macro2::{Ident, Span, TokenStream};
use quote::{format_ident, quote};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::CodegenError;
use crate::manifest::{Class, EnumDef, Manifest};

/// How a generated class manages its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    RefCounted,
    Manual,
    /// The root class: instances may be either.
    Dynamic,
}

/// How a value travels through a generated signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passing {
    /// Plain data, taken and returned by value.
    Copy,
    /// Engine-managed body, taken by reference.
    Ref,
    /// Object handle: `&impl ObjectArg<C>` in, `Option<Gd<C>>` out.
    Object,
}

/// Rust rendition of a manifest type.
#[derive(Debug, Clone)]
pub struct RustTy {
    /// Owned Rust type.
    pub tokens: TokenStream,
    pub passing: Passing,
    /// Variant kind recorded in descriptors; `Nil` means any variant.
    pub kind: VariantType,
    pub class_name: Option<String>,
}

impl RustTy {
    fn copy(tokens: TokenStream, kind: VariantType) -> Self {
        Self {
            tokens,
            passing: Passing::Copy,
            kind,
            class_name: None,
        }
    }

    fn by_ref(tokens: TokenStream, kind: VariantType) -> Self {
        Self {
            tokens,
            passing: Passing::Ref,
            kind,
            class_name: None,
        }
    }

    /// Type of a parameter in an outbound wrapper.
    pub fn param(&self) -> TokenStream {
        let tokens = &self.tokens;
        match self.passing {
            Passing::Copy => quote! { #tokens },
            Passing::Ref => quote! { &#tokens },
            Passing::Object => quote! { &impl crate::obj::ObjectArg<#tokens> },
        }
    }

    /// Type of a decoded value: return values and virtual parameters.
    pub fn owned(&self) -> TokenStream {
        let tokens = &self.tokens;
        match self.passing {
            Passing::Object => quote! { Option<crate::obj::Gd<#tokens>> },
            _ => quote! { #tokens },
        }
    }

    /// Statement pushing parameter `name` into `frame`.
    pub fn push(&self, name: &Ident) -> TokenStream {
        match self.passing {
            Passing::Copy => quote! { frame.push(&#name); },
            Passing::Ref => quote! { frame.push(#name); },
            Passing::Object => quote! { frame.push_object(#name.object_arg_ptr()); },
        }
    }

    /// `gdx_registry::ArgInfo` constructor expression.
    pub fn arg_info(&self, name: &str) -> TokenStream {
        let kind = variant_type_tokens(self.kind);
        match &self.class_name {
            Some(class) => quote! { gdx_registry::ArgInfo::object(#name, #class) },
            None => quote! { gdx_registry::ArgInfo::new(#name, #kind) },
        }
    }
}

pub fn variant_type_tokens(kind: VariantType) -> TokenStream {
    let ident = format_ident!("{}", format!("{kind:?}"));
    quote! { gdx_sys::VariantType::#ident }
}

pub struct Context<'m> {
    pub manifest: &'m Manifest,
    classes: FxHashMap<&'m str, &'m Class>,
    /// Qualified enum name (`Animation.TrackType` or `Error`) to Rust path.
    enums: FxHashMap<String, TokenStream>,
    singletons: FxHashSet<&'m str>,
}

impl<'m> Context<'m> {
    pub fn new(manifest: &'m Manifest) -> Result<Self, CodegenError> {
        let mut classes = FxHashMap::default();
        for class in &manifest.classes {
            if classes.insert(class.name.as_str(), class).is_some() {
                return Err(CodegenError::DuplicateClass(class.name.clone()));
            }
        }

        let mut roots = 0;
        for class in &manifest.classes {
            match &class.inherits {
                Some(parent) if !classes.contains_key(parent.as_str()) => {
                    return Err(CodegenError::UnknownParent {
                        class: class.name.clone(),
                        parent: parent.clone(),
                    });
                }
                Some(_) => {}
                None => roots += 1,
            }
        }
        if roots != 1 {
            return Err(CodegenError::RootCount(roots));
        }

        let mut enums = FxHashMap::default();
        for def in &manifest.global_enums {
            let ident = format_ident!("{}", def.name);
            enums.insert(def.name.clone(), quote! { crate::global::#ident });
        }
        for class in &manifest.classes {
            let module = class_module(&class.name);
            for def in &class.enums {
                let ident = format_ident!("{}", def.name);
                enums.insert(
                    format!("{}.{}", class.name, def.name),
                    quote! { crate::classes::#module::#ident },
                );
            }
        }

        let mut singletons = FxHashSet::default();
        for singleton in &manifest.singletons {
            if !classes.contains_key(singleton.ty.as_str()) {
                return Err(CodegenError::UnknownSingleton {
                    name: singleton.name.clone(),
                    class: singleton.ty.clone(),
                });
            }
            singletons.insert(singleton.ty.as_str());
        }

        let context = Self {
            manifest,
            classes,
            enums,
            singletons,
        };
        for class in &manifest.classes {
            context.ancestors(class)?;
        }
        Ok(context)
    }

    pub fn class(&self, name: &str) -> Option<&'m Class> {
        self.classes.get(name).copied()
    }

    /// Parent chain of `class`, nearest first.
    pub fn ancestors(&self, class: &'m Class) -> Result<Vec<&'m Class>, CodegenError> {
        let mut chain = Vec::new();
        let mut current = class;
        while let Some(parent) = &current.inherits {
            let parent = self
                .class(parent)
                .ok_or_else(|| CodegenError::UnknownParent {
                    class: current.name.clone(),
                    parent: parent.clone(),
                })?;
            if chain.len() > self.classes.len() {
                return Err(CodegenError::Cycle(class.name.clone()));
            }
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    pub fn memory(&self, class: &Class) -> Memory {
        if class.is_refcounted {
            Memory::RefCounted
        } else if class.inherits.is_none() {
            Memory::Dynamic
        } else {
            Memory::Manual
        }
    }

    pub fn is_singleton(&self, class: &str) -> bool {
        self.singletons.contains(class)
    }

    pub fn enum_path(&self, qualified: &str) -> Option<&TokenStream> {
        self.enums.get(qualified)
    }

    /// Map a manifest type (with optional width meta) to Rust.
    pub fn rust_type(
        &self,
        ty: &str,
        meta: Option<&str>,
        context: &str,
    ) -> Result<RustTy, CodegenError> {
        let unknown = || CodegenError::UnknownType {
            context: context.to_string(),
            ty: ty.to_string(),
        };

        let enum_name = ty.strip_prefix("enum::").or_else(|| ty.strip_prefix("bitfield::"));
        if let Some(qualified) = enum_name {
            let path = self.enum_path(qualified).ok_or_else(unknown)?;
            return Ok(RustTy::copy(path.clone(), VariantType::Int));
        }

        if let Some(element) = ty.strip_prefix("typedarray::") {
            let element = self.rust_type(element, None, context)?;
            let inner = match element.passing {
                Passing::Object => {
                    let class = &element.tokens;
                    quote! { crate::obj::Gd<#class> }
                }
                _ => element.tokens,
            };
            return Ok(RustTy::by_ref(
                quote! { crate::builtin::TypedArray<#inner> },
                VariantType::Array,
            ));
        }

        let mapped = match ty {
            "bool" => RustTy::copy(quote! { bool }, VariantType::Bool),
            "int" => {
                let tokens = match meta {
                    Some("int8") => quote! { i8 },
                    Some("int16") => quote! { i16 },
                    Some("int32") => quote! { i32 },
                    Some("uint8") => quote! { u8 },
                    Some("uint16") => quote! { u16 },
                    Some("uint32") => quote! { u32 },
                    Some("uint64") => quote! { u64 },
                    _ => quote! { i64 },
                };
                RustTy::copy(tokens, VariantType::Int)
            }
            "float" => {
                let tokens = match meta {
                    Some("float") => quote! { f32 },
                    _ => quote! { f64 },
                };
                RustTy::copy(tokens, VariantType::Float)
            }
            "Variant" => RustTy::by_ref(quote! { crate::variant::Variant }, VariantType::Nil),
            "String" => RustTy::by_ref(quote! { crate::builtin::GString }, VariantType::String),
            name => {
                if let Some(class) = self.class(name) {
                    let ident = format_ident!("{}", class.name);
                    return Ok(RustTy {
                        tokens: quote! { crate::classes::#ident },
                        passing: Passing::Object,
                        kind: VariantType::Object,
                        class_name: Some(class.name.clone()),
                    });
                }
                let kind = VariantType::from_name(name).ok_or_else(unknown)?;
                let ident = builtin_ident(kind);
                let tokens = quote! { crate::builtin::#ident };
                if kind.is_plain_data() {
                    RustTy::copy(tokens, kind)
                } else {
                    RustTy::by_ref(tokens, kind)
                }
            }
        };
        Ok(mapped)
    }
}

/// Rust type name of a builtin kind.
pub fn builtin_ident(kind: VariantType) -> Ident {
    match kind {
        VariantType::String => format_ident!("GString"),
        other => format_ident!("{}", format!("{other:?}")),
    }
}

/// Module holding a class's enums: `ParticleProcessMaterial` -> `particle_process_material`.
pub fn class_module(class: &str) -> Ident {
    format_ident!("{}", to_snake_case(class))
}

pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev_lower =
                i > 0 && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_ascii_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn to_shouty_case(name: &str) -> String {
    to_snake_case(name).to_ascii_uppercase()
}

const RESERVED: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "do", "dyn", "else",
    "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop",
    "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "self",
    "static", "struct", "super", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Identifier for a manifest name, suffixed with `_` when it is reserved.
pub fn safe_ident(name: &str) -> Ident {
    if RESERVED.contains(&name) {
        format_ident!("{}_", name)
    } else {
        Ident::new(name, Span::call_site())
    }
}

/// Rust name of a virtual method: `_ready` -> `ready`.
pub fn virtual_ident(name: &str) -> Ident {
    safe_ident(name.trim_start_matches('_'))
}

pub fn enum_ident(def: &EnumDef) -> Ident {
    format_ident!("{}", def.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_handles_acronyms() {
        assert_eq!(to_snake_case("ParticleProcessMaterial"), "particle_process_material");
        assert_eq!(to_snake_case("RefCounted"), "ref_counted");
        assert_eq!(to_snake_case("AABB"), "aabb");
        assert_eq!(to_snake_case("HTTPRequest"), "http_request");
    }

    #[test]
    fn reserved_names_get_suffix() {
        assert_eq!(safe_ident("type").to_string(), "type_");
        assert_eq!(safe_ident("typeof").to_string(), "typeof_");
        assert_eq!(safe_ident("length").to_string(), "length");
        assert_eq!(virtual_ident("_process").to_string(), "process");
    }

    #[test]
    fn builtin_names_follow_rust_types() {
        assert_eq!(builtin_ident(VariantType::String).to_string(), "GString");
        assert_eq!(builtin_ident(VariantType::Aabb).to_string(), "Aabb");
        assert_eq!(builtin_ident(VariantType::PackedByteArray).to_string(), "PackedByteArray");
    }
}

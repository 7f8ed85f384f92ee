use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use rustc_hash::FxHashSet;

use crate::context::{Context, enum_ident};
use crate::manifest::EnumDef;

/// Integer newtype with one associated constant per manifest value.
///
/// Unknown values received from the engine are preserved rather than
/// rejected, so the type is a struct and not a Rust enum.
pub fn emit_enum(def: &EnumDef) -> TokenStream {
    let name = enum_ident(def);
    let name_str = &def.name;

    let constants = def.values.iter().map(|value| {
        let ident = format_ident!("{}", value.name);
        let ord = Literal::i64_unsuffixed(value.value);
        quote! { pub const #ident: #name = #name { ord: #ord }; }
    });
    let all = def.values.iter().map(|value| {
        let ident = format_ident!("{}", value.name);
        quote! { Self::#ident }
    });

    let mut seen = FxHashSet::default();
    let name_arms = def
        .values
        .iter()
        .filter(|value| seen.insert(value.value))
        .map(|value| {
            let ord = Literal::i64_unsuffixed(value.value);
            let text = &value.name;
            quote! { #ord => Some(#text), }
        });

    let bitfield = def.is_bitfield.then(|| quote! { crate::meta::impl_engine_bitfield!(#name); });

    quote! {
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct #name {
            ord: i64,
        }

        impl #name {
            #(#constants)*

            pub const ALL: &'static [#name] = &[#(#all),*];

            pub const fn from_ord(ord: i64) -> Self {
                Self { ord }
            }

            pub const fn ord(self) -> i64 {
                self.ord
            }

            /// Manifest name of the value, if it is a known one.
            pub fn name(self) -> Option<&'static str> {
                match self.ord {
                    #(#name_arms)*
                    _ => None,
                }
            }
        }

        impl std::fmt::Debug for #name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.name() {
                    Some(value) => write!(f, "{}::{}", #name_str, value),
                    None => write!(f, "{}({})", #name_str, self.ord),
                }
            }
        }

        crate::meta::impl_engine_enum!(#name);
        #bitfield
    }
}

/// `global_enums.rs`: enums declared at manifest top level.
pub fn emit_global(ctx: &Context<'_>) -> TokenStream {
    let enums = ctx.manifest.global_enums.iter().map(emit_enum);
    quote! { #(#enums)* }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::EnumValue;

    fn side() -> EnumDef {
        EnumDef {
            name: "Side".to_string(),
            is_bitfield: false,
            values: vec![
                EnumValue { name: "SIDE_LEFT".to_string(), value: 0 },
                EnumValue { name: "SIDE_TOP".to_string(), value: 1 },
                EnumValue { name: "SIDE_FIRST".to_string(), value: 0 },
            ],
        }
    }

    #[test]
    fn constants_keep_manifest_names() {
        let text = emit_enum(&side()).to_string();
        assert!(text.contains("pub const SIDE_LEFT : Side = Side { ord : 0 }"));
        assert!(text.contains("pub const SIDE_FIRST : Side = Side { ord : 0 }"));
        assert!(text.contains("impl_engine_enum ! (Side)"));
        assert!(!text.contains("impl_engine_bitfield"));
    }

    #[test]
    fn aliased_values_name_the_first_constant() {
        let text = emit_enum(&side()).to_string();
        assert_eq!(text.matches("0 => Some").count(), 1);
        assert!(text.contains("0 => Some (\"SIDE_LEFT\")"));
    }

    #[test]
    fn bitfields_get_operators() {
        let mut def = side();
        def.is_bitfield = true;
        assert!(emit_enum(&def).to_string().contains("impl_engine_bitfield ! (Side)"));
    }
}

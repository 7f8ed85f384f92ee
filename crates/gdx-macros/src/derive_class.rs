//! Implementation of `#[derive(HostClass)]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Field, Fields, Path, parse_macro_input, spanned::Spanned};

use crate::attrs::{ClassAttrs, VarAttrs, is_base_marked};

pub fn derive_host_class_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_host_class_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_host_class_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(input.generics.span(), "host classes cannot be generic"));
    }
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(input.span(), "HostClass can only be derived for structs"));
    };
    let Fields::Named(fields) = &data.fields else {
        let message = "HostClass needs a struct with named fields";
        return Err(syn::Error::new(data.fields.span(), message));
    };

    let attrs = ClassAttrs::from_attrs(&input.attrs)?;
    let Some(base) = &attrs.base else {
        return Err(syn::Error::new(input.ident.span(), "missing `#[class(base = ...)]`"));
    };
    let class_name = attrs.name.clone().unwrap_or_else(|| name.to_string());
    let (base_ty, virtual_trait) = base_paths(base);

    let fields: Vec<&Field> = fields.named.iter().collect();
    let base_field = find_base_field(&fields, input)?;

    let init_body = if attrs.init {
        let inits = fields.iter().map(|field| {
            let ident = &field.ident;
            if ident.as_ref() == base_field.ident.as_ref() {
                quote! { #ident: base }
            } else {
                quote! { #ident: ::core::default::Default::default() }
            }
        });
        quote! { Self { #(#inits,)* } }
    } else {
        quote! { <Self as ::gdx::registrar::HostInit>::init(base) }
    };

    let properties = property_registrations(&fields)?;
    let overrides = attrs.overrides.iter().map(|rust_name| {
        let rust_str = rust_name.to_string();
        quote! {
            builder.override_virtual(<Self as #virtual_trait>::__virtual(#rust_str));
        }
    });
    let user_register = attrs.register.as_ref().map(|path| quote! { #path(builder); });

    Ok(quote! {
        impl ::gdx::registrar::HostClass for #name {
            type Base = #base_ty;

            const CLASS_NAME: &'static str = #class_name;

            fn init(base: ::gdx::registrar::Base<Self::Base>) -> Self {
                #init_body
            }

            fn register(builder: &mut ::gdx::registrar::ClassBuilder<Self>) {
                #(#properties)*
                #(#overrides)*
                #user_register
            }
        }
    })
}

/// Base class type and its `I<Base>` virtual trait. A bare name resolves in
/// `gdx::classes`.
fn base_paths(base: &Path) -> (TokenStream2, TokenStream2) {
    if let Some(ident) = base.get_ident() {
        let trait_ident = format_ident!("I{}", ident);
        return (quote! { ::gdx::classes::#ident }, quote! { ::gdx::classes::#trait_ident });
    }
    let mut trait_path = base.clone();
    if let Some(last) = trait_path.segments.last_mut() {
        last.ident = format_ident!("I{}", last.ident);
    }
    (quote! { #base }, quote! { #trait_path })
}

/// The field marked `#[base]`, else the one named `base`.
fn find_base_field<'a>(fields: &[&'a Field], input: &DeriveInput) -> syn::Result<&'a Field> {
    let marked: Vec<&Field> = fields.iter().copied().filter(|f| is_base_marked(&f.attrs)).collect();
    match marked.as_slice() {
        [field] => return Ok(*field),
        [] => {}
        [_, second, ..] => {
            return Err(syn::Error::new(second.span(), "only one field can be `#[base]`"));
        }
    }
    fields
        .iter()
        .copied()
        .find(|f| f.ident.as_ref().is_some_and(|ident| ident == "base"))
        .ok_or_else(|| {
            syn::Error::new(
                input.ident.span(),
                "host classes need a `base: Base<...>` field (or one marked `#[base]`)",
            )
        })
}

fn property_registrations(fields: &[&Field]) -> syn::Result<Vec<TokenStream2>> {
    let mut registrations = Vec::new();
    for field in fields {
        let Some(var) = VarAttrs::from_attrs(&field.attrs)? else {
            continue;
        };
        let Some(ident) = &field.ident else {
            continue;
        };
        let ty = &field.ty;
        let property = var.name.clone().unwrap_or_else(|| ident.to_string());
        let getter = quote! { |this: &Self| ::core::clone::Clone::clone(&this.#ident) };
        registrations.push(if var.read_only {
            quote! {
                builder.read_only_property::<#ty>(#property, #getter);
            }
        } else {
            quote! {
                builder.property::<#ty>(#property, #getter, |this: &mut Self, value: #ty| {
                    this.#ident = value
                });
            }
        });
    }
    Ok(registrations)
}

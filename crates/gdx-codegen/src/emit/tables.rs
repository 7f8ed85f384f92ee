use gdx_sys::{MethodFlags, VariantType};
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

use crate::CodegenConfig;
use crate::context::{Context, builtin_ident, variant_type_tokens};
use crate::emit::{SymbolIds, SymbolRow};
use crate::error::CodegenError;
use crate::manifest::{Class, ClassMethod};

/// `tables.rs`: symbol ids, bind tables, class descriptors, manifest
/// version and layout assertions.
pub fn emit(
    ctx: &Context<'_>,
    ids: &SymbolIds,
    config: &CodegenConfig,
) -> Result<TokenStream, CodegenError> {
    let method_ids = id_consts(&ids.methods);
    let utility_ids = id_consts(&ids.utilities);
    let builtin_ids = id_consts(&ids.builtin_methods);

    let methods = ids.methods.iter().map(|row| {
        let SymbolRow { owner, name, hash, optional, .. } = row;
        quote! {
            gdx_registry::MethodKey {
                class: #owner,
                method: #name,
                hash: #hash,
                optional: #optional,
            },
        }
    });
    let utilities = ids.utilities.iter().map(|row| {
        let SymbolRow { name, hash, .. } = row;
        quote! { gdx_registry::UtilityKey { name: #name, hash: #hash }, }
    });
    let mut builtin_methods = Vec::new();
    for row in &ids.builtin_methods {
        let kind = VariantType::from_name(&row.owner).ok_or_else(|| CodegenError::UnknownType {
            context: "builtin_classes".to_string(),
            ty: row.owner.clone(),
        })?;
        let kind = variant_type_tokens(kind);
        let SymbolRow { name, hash, .. } = row;
        builtin_methods.push(quote! {
            gdx_registry::BuiltinMethodKey { kind: #kind, method: #name, hash: #hash },
        });
    }

    let mut ordered = Vec::with_capacity(ctx.manifest.classes.len());
    for class in &ctx.manifest.classes {
        ordered.push((ctx.ancestors(class)?.len(), class));
    }
    ordered.sort_by_key(|(depth, _)| *depth);
    let mut descriptors = Vec::new();
    for (_, class) in ordered {
        descriptors.push(descriptor(ctx, class)?);
    }

    let singletons = ctx.manifest.singletons.iter().map(|singleton| {
        let name = &singleton.name;
        let ty = &singleton.ty;
        quote! { (#name, #ty), }
    });

    let header = &ctx.manifest.header;
    let (major, minor, patch) = (header.version_major, header.version_minor, header.version_patch);
    let full_name = &header.version_full_name;
    let configuration = config.build_configuration();
    let layout = layout_assertions(ctx, &configuration)?;

    Ok(quote! {
        pub mod method_ids {
            #(#method_ids)*
        }

        pub mod utility_ids {
            #(#utility_ids)*
        }

        pub mod builtin_method_ids {
            #(#builtin_ids)*
        }

        pub const METHODS: &[gdx_registry::MethodKey] = &[#(#methods)*];
        pub const UTILITIES: &[gdx_registry::UtilityKey] = &[#(#utilities)*];
        pub const BUILTIN_METHODS: &[gdx_registry::BuiltinMethodKey] = &[#(#builtin_methods)*];

        pub const TABLES: gdx_registry::BindTables = gdx_registry::BindTables {
            methods: METHODS,
            utilities: UTILITIES,
            builtin_methods: BUILTIN_METHODS,
        };

        /// Version of the manifest the bindings were generated from.
        pub const API_VERSION: (u32, u32, u32) = (#major, #minor, #patch);
        pub const API_VERSION_NAME: &str = #full_name;
        pub const BUILD_CONFIGURATION: &str = #configuration;

        /// `(singleton name, class)` pairs.
        pub const SINGLETONS: &[(&str, &str)] = &[#(#singletons)*];

        /// Descriptors for every engine class, parents before children.
        pub fn engine_class_descriptors() -> Vec<gdx_registry::ClassDescriptor> {
            vec![#(#descriptors),*]
        }

        #layout
    })
}

fn id_consts(rows: &[SymbolRow]) -> impl Iterator<Item = TokenStream> + '_ {
    rows.iter().enumerate().map(|(index, row)| {
        let id = &row.id;
        quote! { pub const #id: usize = #index; }
    })
}

fn method_flags(method: &ClassMethod) -> u32 {
    let mut flags = MethodFlags::DEFAULT;
    if method.is_const {
        flags |= MethodFlags::CONST;
    }
    if method.is_vararg {
        flags |= MethodFlags::VARARG;
    }
    if method.is_static {
        flags |= MethodFlags::STATIC;
    }
    if method.is_virtual {
        flags |= MethodFlags::VIRTUAL;
    }
    flags.bits()
}

fn descriptor(ctx: &Context<'_>, class: &Class) -> Result<TokenStream, CodegenError> {
    let name = &class.name;
    let ident = format_ident!("{}", class.name);
    let refcounted = class.is_refcounted;
    let instantiable = class.is_instantiable;
    let parent = class.inherits.as_ref().map(|parent| quote! { .with_parent(#parent) });

    let mut methods = Vec::new();
    for method in &class.methods {
        let method_name = &method.name;
        let mut args = Vec::new();
        for arg in &method.arguments {
            let context = format!("{}::{}({})", class.name, method.name, arg.name);
            let ty = ctx.rust_type(&arg.ty, arg.meta.as_deref(), &context)?;
            args.push(ty.arg_info(&arg.name));
        }
        let ret = match &method.return_value {
            Some(ret) => {
                let context = format!("{}::{} return", class.name, method.name);
                let info = ctx.rust_type(&ret.ty, ret.meta.as_deref(), &context)?.arg_info("");
                Some(quote! { .with_return(#info) })
            }
            None => None,
        };
        let args = (!args.is_empty()).then(|| quote! { .with_args([#(#args),*]) });
        let flags = Literal::u32_unsuffixed(method_flags(method));
        let hash = method.hash.map(|hash| quote! { .with_hash(#hash) });
        methods.push(quote! {
            .with_method(
                gdx_registry::MethodDescriptor::new(#method_name)
                    #args
                    #ret
                    .with_flags(gdx_sys::MethodFlags::from_bits_retain(#flags))
                    #hash
            )
        });
    }

    let mut properties = Vec::new();
    for property in &class.properties {
        let context = format!("{} property {}", class.name, property.name);
        let kind = variant_type_tokens(ctx.rust_type(&property.ty, None, &context)?.kind);
        let property_name = &property.name;
        let getter = &property.getter;
        let setter = property.setter.as_ref().map(|setter| quote! { .with_setter(#setter) });
        properties.push(quote! {
            .with_property(
                gdx_registry::PropertyDescriptor::new(#property_name, #kind, #getter) #setter
            )
        });
    }

    Ok(quote! {
        gdx_registry::ClassDescriptor::engine(#name)
            #parent
            .refcounted(#refcounted)
            .instantiable(#instantiable)
            .with_factory(crate::obj::factory::<crate::classes::#ident>)
            #(#methods)*
            #(#properties)*
    })
}

/// `size_of` checks for every builtin the bridge defines a Rust layout for.
fn layout_assertions(ctx: &Context<'_>, configuration: &str) -> Result<TokenStream, CodegenError> {
    let sizes = ctx
        .manifest
        .sizes_for(configuration)
        .ok_or_else(|| CodegenError::MissingBuildConfiguration(configuration.to_string()))?;

    let checks = sizes.sizes.iter().filter_map(|entry| {
        let path = match entry.name.as_str() {
            "Variant" => quote! { crate::variant::Variant },
            "Nil" | "bool" | "int" | "float" | "Object" => return None,
            name => {
                let ident = builtin_ident(VariantType::from_name(name)?);
                quote! { crate::builtin::#ident }
            }
        };
        let size = entry.size;
        let message =
            format!("layout of {} does not match the engine ({} bytes)", entry.name, size);
        Some(quote! {
            const _: () = assert!(std::mem::size_of::<#path>() == #size, #message);
        })
    });
    Ok(quote! { #(#checks)* })
}

use proc_macro2::{Ident, Literal, TokenStream};
use quote::{format_ident, quote};

use crate::context::{Context, Memory, Passing, RustTy, class_module, safe_ident, virtual_ident};
use crate::emit::enums::emit_enum;
use crate::emit::symbol_id;
use crate::error::CodegenError;
use crate::manifest::{Argument, Class, ClassMethod};

/// `classes.rs`: one handle type, enum module and virtual trait per class.
pub fn emit(ctx: &Context<'_>) -> Result<TokenStream, CodegenError> {
    let mut out = TokenStream::new();
    for class in &ctx.manifest.classes {
        out.extend(emit_class(ctx, class)?);
    }
    Ok(out)
}

struct Param {
    ident: Ident,
    ty: RustTy,
}

fn params(
    ctx: &Context<'_>,
    class: &Class,
    method: &ClassMethod,
) -> Result<Vec<Param>, CodegenError> {
    method
        .arguments
        .iter()
        .map(|arg: &Argument| {
            let context = format!("{}::{}({})", class.name, method.name, arg.name);
            Ok(Param {
                ident: safe_ident(&arg.name),
                ty: ctx.rust_type(&arg.ty, arg.meta.as_deref(), &context)?,
            })
        })
        .collect()
}

fn return_type(
    ctx: &Context<'_>,
    class: &Class,
    method: &ClassMethod,
) -> Result<Option<RustTy>, CodegenError> {
    method
        .return_value
        .as_ref()
        .map(|ret| {
            let context = format!("{}::{} return", class.name, method.name);
            ctx.rust_type(&ret.ty, ret.meta.as_deref(), &context)
        })
        .transpose()
}

fn emit_class(ctx: &Context<'_>, class: &Class) -> Result<TokenStream, CodegenError> {
    let name = format_ident!("{}", class.name);
    let name_str = &class.name;
    let module = class_module(&class.name);
    let ancestors = ctx.ancestors(class)?;

    let memory = match ctx.memory(class) {
        Memory::RefCounted => quote! { RefCounted },
        Memory::Manual => quote! { Manual },
        Memory::Dynamic => quote! { Dynamic },
    };

    let inherits = std::iter::once(&name)
        .cloned()
        .chain(ancestors.iter().map(|a| format_ident!("{}", a.name)))
        .map(|base| quote! { unsafe impl crate::obj::Inherits<#base> for #name {} });

    let deref = class.inherits.as_ref().map(|parent| {
        let parent = format_ident!("{}", parent);
        quote! {
            impl std::ops::Deref for #name {
                type Target = #parent;

                fn deref(&self) -> &#parent {
                    // Every class wraps the same raw object with the same layout.
                    unsafe { &*(self as *const Self).cast::<#parent>() }
                }
            }

            impl std::ops::DerefMut for #name {
                fn deref_mut(&mut self) -> &mut #parent {
                    unsafe { &mut *(self as *mut Self).cast::<#parent>() }
                }
            }
        }
    });

    let constants = class.constants.iter().map(|constant| {
        let ident = format_ident!("{}", constant.name);
        let value = Literal::i64_unsuffixed(constant.value);
        quote! { pub const #ident: i64 = #value; }
    });
    let signals = class.signals.iter().map(|signal| {
        let ident = format_ident!("SIGNAL_{}", signal.name.to_ascii_uppercase());
        let text = &signal.name;
        quote! { pub const #ident: &'static str = #text; }
    });

    let constructor = class.is_instantiable.then(|| match ctx.memory(class) {
        Memory::RefCounted => quote! {
            /// Construct a new instance; the handle holds the first reference.
            pub fn new_gd() -> crate::obj::Gd<Self> {
                crate::obj::Gd::<Self>::new_instance()
            }
        },
        _ => quote! {
            /// Construct a new instance owned by the caller until attached or freed.
            pub fn new_alloc() -> crate::obj::Owned<Self> {
                crate::obj::Owned::<Self>::new_instance()
            }
        },
    });

    let singleton = ctx.is_singleton(&class.name).then(|| {
        quote! {
            pub fn singleton() -> crate::obj::Gd<Self> {
                crate::obj::singleton::<Self>()
            }
        }
    });

    let mut methods = Vec::new();
    for method in class.methods.iter().filter(|m| !m.is_virtual) {
        methods.push(emit_method(ctx, class, method)?);
    }

    let enums = class.enums.iter().map(emit_enum);
    let (trait_tokens, virtual_fns) = emit_virtual_trait(ctx, class, &ancestors)?;

    Ok(quote! {
        #[doc = concat!("Engine class `", #name_str, "`.")]
        #[repr(transparent)]
        pub struct #name {
            object: crate::obj::RawObject,
        }

        impl crate::obj::ClassIdentity for #name {
            const CLASS_NAME: &'static str = #name_str;
        }

        unsafe impl crate::obj::EngineClass for #name {
            const MEMORY: crate::obj::Memory = crate::obj::Memory::#memory;

            fn from_raw_object(object: crate::obj::RawObject) -> Self {
                Self { object }
            }

            fn raw_object(&self) -> &crate::obj::RawObject {
                &self.object
            }
        }

        #(#inherits)*
        #deref

        impl #name {
            #(#constants)*
            #(#signals)*
            #constructor
            #singleton
            #(#methods)*
        }

        #trait_tokens

        pub mod #module {
            #[allow(unused_imports)]
            use super::*;

            #(#enums)*

            #[doc(hidden)]
            pub mod virtuals {
                #[allow(unused_imports)]
                use super::*;

                #(#virtual_fns)*
            }
        }
    })
}

fn emit_method(
    ctx: &Context<'_>,
    class: &Class,
    method: &ClassMethod,
) -> Result<TokenStream, CodegenError> {
    let ident = safe_ident(&method.name);
    let id = symbol_id(&class.name, &method.name);
    let params = params(ctx, class, method)?;
    let ret = return_type(ctx, class, method)?;
    let ret_ty = ret.as_ref().map(RustTy::owned).unwrap_or_else(|| quote! { () });

    let receiver = if method.is_static {
        quote! {}
    } else if method.is_const {
        quote! { &self, }
    } else {
        quote! { &mut self, }
    };
    let object = if method.is_static {
        quote! { std::ptr::null_mut() }
    } else {
        quote! { self.object.object_ptr() }
    };

    let signature = params.iter().map(|p| {
        let ident = &p.ident;
        let ty = p.ty.param();
        quote! { #ident: #ty }
    });

    if method.is_vararg {
        let fixed = params.iter().map(|p| to_variant(p));
        return Ok(quote! {
            pub fn #ident(
                #receiver
                #(#signature,)*
                varargs: &[crate::variant::Variant]
            ) -> Result<#ret_ty, crate::call::CallError> {
                let fixed = [#(#fixed),*];
                unsafe {
                    crate::call::class_varcall::<#ret_ty>(
                        crate::tables::method_ids::#id,
                        #object,
                        &fixed,
                        varargs
                    )
                }
            }
        });
    }

    let argc = params.len();
    let pushes = params.iter().map(|p| p.ty.push(&p.ident));
    let fill = if params.is_empty() {
        quote! { |_frame| {} }
    } else {
        quote! { |frame| { #(#pushes)* } }
    };

    Ok(quote! {
        pub fn #ident(#receiver #(#signature),*) -> #ret_ty {
            unsafe {
                crate::call::class_ptrcall::<#ret_ty>(
                    crate::tables::method_ids::#id,
                    #object,
                    #argc,
                    #fill
                )
            }
        }
    })
}

/// Expression converting a wrapper parameter to an owned variant.
fn to_variant(param: &Param) -> TokenStream {
    let ident = &param.ident;
    match param.ty.passing {
        Passing::Object => quote! { crate::obj::ObjectArg::object_arg_variant(#ident) },
        Passing::Copy => quote! { crate::meta::ToVariant::to_variant(&#ident) },
        Passing::Ref => quote! { crate::meta::ToVariant::to_variant(#ident) },
    }
}

/// The `I<Class>` trait, flattened over the ancestors' virtuals, plus one
/// forwarding stub per virtual in the class's own hidden module, bounded on
/// that trait so inherited virtuals resolve through it.
fn emit_virtual_trait(
    ctx: &Context<'_>,
    class: &Class,
    ancestors: &[&Class],
) -> Result<(TokenStream, Vec<TokenStream>), CodegenError> {
    let trait_name = format_ident!("I{}", class.name);
    let doc = format!("Virtual methods a host class based on `{}` may override.", class.name);

    let mut trait_methods = Vec::new();
    let mut lookup_arms = Vec::new();
    let mut stubs = Vec::new();

    // Ancestor virtuals first so the trait reads root to leaf.
    for owner in ancestors.iter().rev().copied().chain(std::iter::once(class)) {
        for method in owner.methods.iter().filter(|m| m.is_virtual) {
            let rust_name = virtual_ident(&method.name);
            let rust_str = rust_name.to_string();
            let engine_name = &method.name;
            let params = params(ctx, owner, method)?;
            let ret = return_type(ctx, owner, method)?;
            let ret_ty = ret.as_ref().map(RustTy::owned).unwrap_or_else(|| quote! { () });

            let signature: Vec<_> = params
                .iter()
                .map(|p| {
                    let ident = &p.ident;
                    let ty = p.ty.owned();
                    quote! { #ident: #ty }
                })
                .collect();
            let unused = params.iter().map(|p| &p.ident);
            let default_body = match ret {
                Some(_) => quote! { let _ = (#(#unused,)*); Default::default() },
                None => quote! { let _ = (#(#unused,)*); },
            };
            trait_methods.push(quote! {
                fn #rust_name(&mut self, #(#signature),*) -> #ret_ty {
                    #default_body
                }
            });

            let stub = format_ident!("{}", rust_str);
            let stub_module = class_module(&class.name);
            lookup_arms.push(quote! {
                #rust_str => Some((
                    #engine_name,
                    crate::classes::#stub_module::virtuals::#stub::<Self>
                )),
            });

            let decodes = params.iter().enumerate().map(|(i, p)| {
                let ident = &p.ident;
                let ty = p.ty.owned();
                quote! {
                    let #ident = unsafe {
                        <#ty as crate::meta::PtrCodec>::from_arg_ptr(*args.add(#i))
                    };
                }
            });
            let forwarded = params.iter().map(|p| &p.ident);
            let ignore_args = params.is_empty().then(|| quote! { let _ = args; });
            stubs.push(quote! {
                pub unsafe fn #stub<T: crate::classes::#trait_name>(
                    instance: gdx_sys::ClassInstancePtr,
                    args: *const gdx_sys::ConstTypePtr,
                    ret: gdx_sys::TypePtr,
                ) {
                    #ignore_args
                    #(#decodes)*
                    let result = unsafe {
                        crate::registrar::with_instance::<T, _>(instance, |this| {
                            this.#rust_name(#(#forwarded),*)
                        })
                    };
                    unsafe { crate::meta::PtrCodec::write_return(result, ret) };
                }
            });
        }
    }

    let tokens = quote! {
        #[doc = #doc]
        pub trait #trait_name: crate::registrar::HostClass {
            #(#trait_methods)*

            /// Engine name and forwarding stub for the virtual `name`.
            #[doc(hidden)]
            fn __virtual(name: &str) -> Option<(&'static str, gdx_registry::VirtualFn)>
            where
                Self: Sized,
            {
                match name {
                    #(#lookup_arms)*
                    _ => None,
                }
            }
        }
    };
    Ok((tokens, stubs))
}

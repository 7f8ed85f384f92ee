use proc_macro2::TokenStream;
use quote::quote;

use crate::context::{Context, builtin_ident, safe_ident};
use crate::emit::symbol_id;
use crate::error::CodegenError;
use crate::manifest::BuiltinMethod;
use gdx_sys::VariantType;

/// `builtin_methods.rs`: inherent methods on the hand-written builtin types.
pub fn emit(ctx: &Context<'_>) -> Result<TokenStream, CodegenError> {
    let mut out = TokenStream::new();
    for builtin in &ctx.manifest.builtin_classes {
        let kind = VariantType::from_name(&builtin.name).ok_or_else(|| CodegenError::UnknownType {
            context: "builtin_classes".to_string(),
            ty: builtin.name.clone(),
        })?;
        let ty = builtin_ident(kind);
        let mut methods = Vec::new();
        for method in &builtin.methods {
            methods.push(emit_method(ctx, &builtin.name, method)?);
        }
        out.extend(quote! {
            impl crate::builtin::#ty {
                #(#methods)*
            }
        });
    }
    Ok(out)
}

fn emit_method(
    ctx: &Context<'_>,
    owner: &str,
    method: &BuiltinMethod,
) -> Result<TokenStream, CodegenError> {
    let ident = safe_ident(&method.name);
    let id = symbol_id(owner, &method.name);

    let mut signature = Vec::new();
    let mut pushes = Vec::new();
    for arg in &method.arguments {
        let context = format!("{}::{}({})", owner, method.name, arg.name);
        let ty = ctx.rust_type(&arg.ty, arg.meta.as_deref(), &context)?;
        let arg_ident = safe_ident(&arg.name);
        let param = ty.param();
        signature.push(quote! { #arg_ident: #param });
        pushes.push(ty.push(&arg_ident));
    }

    let ret_ty = match &method.return_type {
        Some(ret) => {
            let context = format!("{}::{} return", owner, method.name);
            ctx.rust_type(ret, None, &context)?.owned()
        }
        None => quote! { () },
    };

    let (receiver, base) = if method.is_static {
        (quote! {}, quote! { std::ptr::null_mut() })
    } else if method.is_const {
        (quote! { &self, }, quote! { (self as *const Self).cast_mut().cast() })
    } else {
        (quote! { &mut self, }, quote! { (self as *mut Self).cast() })
    };

    let argc = method.arguments.len();
    let fill = if pushes.is_empty() {
        quote! { |_frame| {} }
    } else {
        quote! { |frame| { #(#pushes)* } }
    };

    Ok(quote! {
        pub fn #ident(#receiver #(#signature),*) -> #ret_ty {
            unsafe {
                crate::call::builtin_ptrcall::<#ret_ty>(
                    crate::tables::builtin_method_ids::#id,
                    #base,
                    #argc,
                    #fill
                )
            }
        }
    })
}

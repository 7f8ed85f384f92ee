use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::context::{Context, Passing, safe_ident};
use crate::error::CodegenError;
use crate::manifest::UtilityFunction;

/// `utilities.rs`: free functions forwarding to engine utility functions.
pub fn emit(ctx: &Context<'_>) -> Result<TokenStream, CodegenError> {
    let mut out = TokenStream::new();
    for function in &ctx.manifest.utility_functions {
        out.extend(emit_function(ctx, function)?);
    }
    Ok(out)
}

fn emit_function(
    ctx: &Context<'_>,
    function: &UtilityFunction,
) -> Result<TokenStream, CodegenError> {
    let ident = safe_ident(&function.name);
    let id = format_ident!("{}", function.name.to_ascii_uppercase());

    let mut signature = Vec::new();
    let mut pushes = Vec::new();
    let mut fixed = Vec::new();
    for arg in &function.arguments {
        let context = format!("utility {}({})", function.name, arg.name);
        let ty = ctx.rust_type(&arg.ty, arg.meta.as_deref(), &context)?;
        let arg_ident = safe_ident(&arg.name);
        let param = ty.param();
        signature.push(quote! { #arg_ident: #param });
        pushes.push(ty.push(&arg_ident));
        fixed.push(match ty.passing {
            Passing::Object => quote! { crate::obj::ObjectArg::object_arg_variant(#arg_ident) },
            Passing::Copy => quote! { crate::meta::ToVariant::to_variant(&#arg_ident) },
            Passing::Ref => quote! { crate::meta::ToVariant::to_variant(#arg_ident) },
        });
    }

    let ret_ty = match &function.return_type {
        Some(ret) => {
            let context = format!("utility {} return", function.name);
            ctx.rust_type(ret, None, &context)?.owned()
        }
        None => quote! { () },
    };

    if function.is_vararg {
        return Ok(quote! {
            pub fn #ident(#(#signature,)* varargs: &[crate::variant::Variant]) -> #ret_ty {
                let fixed = [#(#fixed),*];
                unsafe {
                    crate::call::utility_varcall::<#ret_ty>(
                        crate::tables::utility_ids::#id,
                        &fixed,
                        varargs
                    )
                }
            }
        });
    }

    let argc = function.arguments.len();
    let fill = if pushes.is_empty() {
        quote! { |_frame| {} }
    } else {
        quote! { |frame| { #(#pushes)* } }
    };
    Ok(quote! {
        pub fn #ident(#(#signature),*) -> #ret_ty {
            unsafe {
                crate::call::utility_ptrcall::<#ret_ty>(
                    crate::tables::utility_ids::#id,
                    #argc,
                    #fill
                )
            }
        }
    })
}

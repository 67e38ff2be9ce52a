use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};
use quote::quote;

pub fn derive_component(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    let name = &ast.ident;
    let (ty_impl, ty_gen, ty_where) = ast.generics.split_for_impl();

    let mut is_clone = false;

    for attr in &ast.attrs {
        if ! attr.path().is_ident("component") {
            continue;
        }

        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("clone") {
                is_clone = true;
                Ok(())
            } else {
                Err(meta.error("unknown component attribute, expected `clone`"))
            }
        });

        if let Err(err) = result {
            return err.to_compile_error().into();
        }
    }

    let lifecycle = if is_clone {
        quote! {
            fn lifecycle() -> essay_store_core::Lifecycle {
                essay_store_core::Lifecycle::cloned::<Self>()
            }
        }
    } else {
        quote! {}
    };

    TokenStream::from(quote! {
        impl #ty_impl essay_store_core::Component for #name #ty_gen #ty_where {
            #lifecycle
        }
    })
}

//! Implementation of the `#[derive(NativeClass)]` macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

use crate::attrs::{FieldAttrs, TypeAttrs};

pub fn derive_native_class_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_native_class_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_native_class_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let attrs = TypeAttrs::from_attrs(&input.attrs)?;
    let class_name = attrs.name.unwrap_or_else(|| name.to_string());
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let properties = collect_properties(input)?;

    Ok(quote! {
        impl #impl_generics ::lualite_registry::NativeClass for #name #ty_generics #where_clause {
            const CLASS_NAME: &'static str = #class_name;

            fn register(
                class: ::lualite_registry::ClassBuilder<Self>,
            ) -> ::lualite_registry::ClassBuilder<Self> {
                class #(#properties)*
            }
        }
    })
}

/// One builder call per exported field.
fn collect_properties(input: &DeriveInput) -> syn::Result<Vec<TokenStream2>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => return Ok(Vec::new()),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "NativeClass requires named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "NativeClass can only be derived for structs",
            ));
        }
    };

    let mut properties = Vec::new();
    for field in fields {
        let attrs = FieldAttrs::from_attrs(&field.attrs)?;
        if !attrs.is_exported() {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        if attrs.set && !attrs.get {
            return Err(syn::Error::new_spanned(
                ident,
                "`set` requires `get`; write-only properties need a ClassBuilder setter",
            ));
        }

        let ty = &field.ty;
        let property = attrs.name.unwrap_or_else(|| ident.to_string());
        let getter = quote! {
            |this: &Self| -> #ty { ::std::clone::Clone::clone(&this.#ident) }
        };
        properties.push(if attrs.set {
            quote! {
                .property_rw(
                    #property,
                    #getter,
                    |this: &mut Self, value: #ty| { this.#ident = value; },
                )
            }
        } else {
            quote! { .property(#property, #getter) }
        });
    }

    Ok(properties)
}

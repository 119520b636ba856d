//! `#[derive(FromEnv)]` for `graph_devflow::utils::from_env::FromEnv`.

use proc_macro::TokenStream as Ts;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, DeriveInput};

mod field;
use field::Field;

/// Derive `FromEnv` for a struct whose fields are all either loaded from one
/// env var (`#[from_env(var = "..", desc = "..")]`), loaded as a nested
/// `FromEnv` struct (no attribute), or defaulted (`#[from_env(skip)]`).
///
/// Inside `graph_devflow` itself, tag the struct `#[from_env(crate)]`.
#[proc_macro_derive(FromEnv, attributes(from_env))]
pub fn derive(input: Ts) -> Ts {
    let input = parse_macro_input!(input as DeriveInput);

    Input::from_derive(&input)
        .map(|input| input.expand())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct Input {
    ident: syn::Ident,
    crate_path: syn::Path,
    fields: Vec<Field>,
    tuple_like: bool,
}

impl Input {
    fn from_derive(input: &DeriveInput) -> syn::Result<Self> {
        let fields = match &input.data {
            syn::Data::Struct(data) => &data.fields,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "FromEnv can only be derived for structs",
                ))
            }
        };
        if fields.is_empty() {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "FromEnv can only be derived for structs with fields",
            ));
        }

        let mut crate_path = syn::parse_quote!(::graph_devflow);
        for attr in input.attrs.iter().filter(|a| a.path().is_ident("from_env")) {
            crate_path = attr.parse_args::<syn::Path>()?;
        }

        Ok(Self {
            ident: input.ident.clone(),
            crate_path,
            fields: fields.iter().map(Field::try_from).collect::<syn::Result<_>>()?,
            tuple_like: matches!(fields, syn::Fields::Unnamed(_)),
        })
    }

    fn construct(&self) -> TokenStream {
        let ident = &self.ident;
        let names = self.fields.iter().enumerate().map(|(i, f)| f.binding(i));
        if self.tuple_like {
            quote! { #ident( #(#names),* ) }
        } else {
            quote! { #ident { #(#names),* } }
        }
    }

    fn expand(&self) -> TokenStream {
        let ident = &self.ident;
        let crate_path = &self.crate_path;
        let mod_ident = format_ident!("__from_env_impls_{}", ident);

        let inventory = self.fields.iter().map(Field::inventory_item);
        let loads = self.fields.iter().enumerate().map(|(i, f)| f.load(i));
        let construct = self.construct();

        quote! {
            #[allow(non_snake_case, unused_imports)]
            mod #mod_ident {
                use super::*;
                use #crate_path::utils::from_env::{EnvItemInfo, FromEnv, FromEnvErr, FromEnvVar};

                #[automatically_derived]
                impl FromEnv for #ident {
                    fn inventory() -> ::std::vec::Vec<&'static EnvItemInfo> {
                        let mut items = ::std::vec::Vec::new();
                        #( #inventory )*
                        items
                    }

                    fn from_env() -> ::std::result::Result<Self, FromEnvErr> {
                        #( #loads )*
                        ::std::result::Result::Ok(#construct)
                    }
                }
            }
        }
    }
}

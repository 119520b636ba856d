use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Ident, LitStr};

/// How a field gets its value.
enum Source {
    /// One env var, parsed with `FromEnvVar`.
    Var {
        name: LitStr,
        desc: LitStr,
        optional: bool,
    },
    /// A nested `FromEnv` struct.
    Nested(syn::Type),
    /// `Default::default()`.
    Skip,
}

/// A parsed field of a struct deriving `FromEnv`.
pub(crate) struct Field {
    ident: Option<Ident>,
    source: Source,
}

impl TryFrom<&syn::Field> for Field {
    type Error = syn::Error;

    fn try_from(field: &syn::Field) -> syn::Result<Self> {
        let mut var: Option<LitStr> = None;
        let mut desc: Option<LitStr> = None;
        let mut optional = false;
        let mut skip = false;

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("from_env")) {
            attr.parse_nested_meta(|meta| {
                match meta.path.get_ident().map(Ident::to_string).as_deref() {
                    Some("var") => var = Some(meta.value()?.parse()?),
                    Some("desc") => desc = Some(meta.value()?.parse()?),
                    Some("optional") => optional = true,
                    Some("skip") => skip = true,
                    _ => return Err(meta.error("expected `var`, `desc`, `optional` or `skip`")),
                }
                Ok(())
            })?;
        }

        let source = match (skip, var) {
            (true, _) => Source::Skip,
            (false, Some(name)) => {
                let desc = desc.ok_or_else(|| {
                    syn::Error::new_spanned(
                        &name,
                        "env var fields need a description: `#[from_env(desc = \"..\")]`",
                    )
                })?;
                Source::Var {
                    name,
                    desc,
                    optional,
                }
            }
            (false, None) => Source::Nested(field.ty.clone()),
        };

        Ok(Self {
            ident: field.ident.clone(),
            source,
        })
    }
}

impl Field {
    /// The local binding (and struct field name) for this field.
    pub(crate) fn binding(&self, idx: usize) -> Ident {
        self.ident
            .clone()
            .unwrap_or_else(|| format_ident!("field_{idx}"))
    }

    /// Statement adding this field's vars to `items` in `inventory()`.
    pub(crate) fn inventory_item(&self) -> TokenStream {
        match &self.source {
            Source::Var {
                name,
                desc,
                optional,
            } => quote! {
                items.push(&EnvItemInfo {
                    var: #name,
                    description: #desc,
                    optional: #optional,
                });
            },
            Source::Nested(ty) => quote! {
                items.extend(<#ty as FromEnv>::inventory());
            },
            Source::Skip => quote! {},
        }
    }

    /// Statement binding this field's value in `from_env()`.
    pub(crate) fn load(&self, idx: usize) -> TokenStream {
        let binding = self.binding(idx);
        match &self.source {
            Source::Var { name, .. } => quote! {
                let #binding = FromEnvVar::from_env_var(#name)?;
            },
            Source::Nested(ty) => quote! {
                let #binding = <#ty as FromEnv>::from_env()?;
            },
            Source::Skip => quote! {
                let #binding = ::std::default::Default::default();
            },
        }
    }
}

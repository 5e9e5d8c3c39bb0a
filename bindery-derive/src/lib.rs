//! Derive macros for bindery
//!
//! `#[derive(Inject)]` implements `bindery::Inject` for a struct with named
//! fields, resolving the marked fields through the factory's resolver.
//!
//! ```rust,ignore
//! use bindery::prelude::*;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct Cache {
//!     size: usize,
//! }
//!
//! #[derive(Inject)]
//! struct UserService {
//!     #[inject]
//!     db: Arc<Database>,
//!     #[inject(tag = "sessions")]
//!     cache: Arc<Cache>,
//!     #[inject(optional)]
//!     audit: Option<Arc<AuditLog>>,
//!     // Non-injected fields use Default
//!     request_count: u64,
//! }
//!
//! let container = Container::builder()
//!     .bind::<Database>().instance(Database { url: "postgres://localhost".into() })?
//!     .bind::<Cache>().tagged("sessions").instance(Cache { size: 1024 })?
//!     .bind::<UserService>().singleton(UserService::inject)?
//!     .build();
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Type, parse_macro_input};

/// Derive macro for `bindery::Inject`.
///
/// # Attributes
///
/// - `#[inject]` - resolve the field. The field type must be `Arc<T>`.
/// - `#[inject(tag = "name")]` - resolve the binding of `T` tagged `name`.
/// - `#[inject(optional)]` - `None` when nothing is bound. The field type must be
///   `Option<Arc<T>>`; can be combined with `tag`.
///
/// Fields without `#[inject]` use `Default::default()`.
#[proc_macro_derive(Inject, attributes(inject))]
pub fn derive_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_inject(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_inject(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Inject can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Inject can only be derived for structs",
            ));
        }
    };

    let mut field_inits = Vec::with_capacity(fields.len());

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let field_type = &field.ty;

        let init = match parse_inject_attr(&field.attrs)? {
            None => quote! { ::std::default::Default::default() },
            Some(InjectAttr { optional: false, tag }) => {
                let inner = extract_arc_inner_type(field_type).ok_or_else(|| {
                    syn::Error::new_spanned(
                        field_type,
                        "fields marked with #[inject] must have type Arc<T>",
                    )
                })?;
                match tag {
                    Some(tag) => quote! {
                        ::bindery::Resolve::get_tagged::<#inner>(resolver, #tag)?
                    },
                    None => quote! { ::bindery::Resolve::get::<#inner>(resolver)? },
                }
            }
            Some(InjectAttr { optional: true, tag }) => {
                let inner = extract_option_arc_inner_type(field_type).ok_or_else(|| {
                    syn::Error::new_spanned(
                        field_type,
                        "fields marked with #[inject(optional)] must have type Option<Arc<T>>",
                    )
                })?;
                match tag {
                    Some(tag) => quote! {
                        ::bindery::Resolve::try_get_tagged::<#inner>(resolver, #tag)?
                    },
                    None => quote! { ::bindery::Resolve::try_get::<#inner>(resolver)? },
                }
            }
        };

        field_inits.push(quote! { #field_name: #init });
    }

    Ok(quote! {
        impl #impl_generics ::bindery::Inject for #name #ty_generics #where_clause {
            fn inject(resolver: &::bindery::Resolver<'_>) -> ::bindery::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#field_inits),*
                })
            }
        }
    })
}

/// Parsed `#[inject(...)]` attribute
struct InjectAttr {
    optional: bool,
    tag: Option<LitStr>,
}

fn parse_inject_attr(attrs: &[Attribute]) -> syn::Result<Option<InjectAttr>> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("inject")) else {
        return Ok(None);
    };

    let mut parsed = InjectAttr {
        optional: false,
        tag: None,
    };

    // Bare #[inject]
    if attr.meta.require_path_only().is_ok() {
        return Ok(Some(parsed));
    }

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("optional") {
            parsed.optional = true;
            Ok(())
        } else if meta.path.is_ident("tag") {
            let tag: LitStr = meta.value()?.parse()?;
            if tag.value().is_empty() {
                return Err(syn::Error::new(tag.span(), "tag must not be empty"));
            }
            parsed.tag = Some(tag);
            Ok(())
        } else {
            Err(meta.error("expected `optional` or `tag = \"...\"`"))
        }
    })?;

    Ok(Some(parsed))
}

/// Extract T from Arc<T>
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    generic_argument_of(ty, "Arc")
}

/// Extract T from Option<Arc<T>>
fn extract_option_arc_inner_type(ty: &Type) -> Option<&Type> {
    generic_argument_of(ty, "Option").and_then(extract_arc_inner_type)
}

fn generic_argument_of<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        syn::GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

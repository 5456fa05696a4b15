//! Procedural macros for datagate
//!
//! - `#[derive(Fields)]` - build a record's field-descriptor table
//!
//! Field attributes:
//!
//! - `#[validate(rules = "required|minLen:7")]` - rule text for the field
//! - `#[validate(filter = "trim|lower")]` - filters applied before rules
//! - `#[validate(rename = "userName")]` - name used in paths and messages
//! - `#[validate(nested)]` - the field is itself a `Fields` record
//! - `#[validate(readonly)]` - writes (defaults, filters) are rejected
//! - `#[validate(skip)]` - leave the field out of the table
//!
//! Every listed field must be `Serialize`; writable fields must also be
//! `DeserializeOwned`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Field, Fields as SynFields, GenericArgument, LitStr,
    PathArguments, Type,
};

/// Derive `datagate::Fields` for a struct with named fields.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize, Fields)]
/// struct User {
///     #[validate(rules = "required|minLen:7", filter = "trim")]
///     name: String,
///     #[validate(rules = "int:1,99")]
///     age: u32,
///     #[validate(nested)]
///     extra: Extra,
/// }
/// ```
#[proc_macro_derive(Fields, attributes(validate))]
pub fn derive_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct FieldOptions {
    rules: Option<String>,
    filter: Option<String>,
    rename: Option<String>,
    nested: bool,
    readonly: bool,
    skip: bool,
}

fn field_options(field: &Field) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("validate")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rules") {
                options.rules = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("filter") {
                options.filter = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("rename") {
                options.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("nested") {
                options.nested = true;
            } else if meta.path.is_ident("readonly") {
                options.readonly = true;
            } else if meta.path.is_ident("skip") {
                options.skip = true;
            } else {
                return Err(meta.error(
                    "expected one of `rules`, `filter`, `rename`, `nested`, `readonly`, `skip`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(options)
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            SynFields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Fields can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Fields can only be derived for structs",
            ))
        }
    };

    let mut descriptors = Vec::new();
    for field in fields {
        let options = field_options(field)?;
        if options.skip {
            continue;
        }
        descriptors.push(descriptor(field, &options));
    }

    Ok(quote! {
        impl #impl_generics ::datagate::data::Fields for #name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::datagate::data::FieldDescriptor<Self>> {
                ::std::vec![#(#descriptors),*]
            }
        }
    })
}

fn descriptor(field: &Field, options: &FieldOptions) -> TokenStream2 {
    // Named fields always carry an ident.
    let ident = field.ident.as_ref().map(|i| quote!(#i)).unwrap_or_default();
    let ty = &field.ty;
    let key = options
        .rename
        .clone()
        .unwrap_or_else(|| field.ident.as_ref().map(|i| i.to_string()).unwrap_or_default());

    let kind = if options.nested {
        quote!(::datagate::Kind::Map)
    } else {
        kind_of(ty)
    };

    let mut calls = quote! { .kind(#kind) };
    if let Some(rules) = &options.rules {
        calls.extend(quote! { .rules(#rules) });
    }
    if let Some(filter) = &options.filter {
        calls.extend(quote! { .filters(#filter) });
    }
    if !options.readonly {
        calls.extend(quote! {
            .setter(|record: &mut Self, value: ::datagate::Value| {
                ::datagate::data::assign(&mut record.#ident, #key, value)
            })
        });
    }
    if options.nested {
        calls.extend(quote! {
            .nested(::datagate::data::NestedAccess {
                get: |record: &Self, path: &str| ::datagate::data::get_path(&record.#ident, path),
                set: |record: &mut Self, path: &str, value: ::datagate::Value| {
                    ::datagate::data::set_path(&mut record.#ident, path, value)
                },
                kind_of: |record: &Self, path: &str| {
                    ::datagate::data::kind_of_path(&record.#ident, path)
                },
                rules: ::datagate::data::declared_rules::<#ty>,
            })
        });
    }

    quote! {
        ::datagate::data::FieldDescriptor::new(#key, |record: &Self| {
            ::datagate::data::to_value(&record.#ident)
        })
        #calls
    }
}

/// Map a field type to its declared kind by the last path segment.
fn kind_of(ty: &Type) -> TokenStream2 {
    let kind = match ty {
        Type::Reference(reference) => return kind_of(&reference.elem),
        Type::Array(_) | Type::Slice(_) => "Array",
        Type::Path(path) => match path.path.segments.last() {
            Some(segment) => {
                let ident = segment.ident.to_string();
                match ident.as_str() {
                    "Option" | "Box" => match first_type_argument(&segment.arguments) {
                        Some(inner) => return kind_of(inner),
                        None => "Unknown",
                    },
                    "String" | "str" | "char" => "String",
                    "i8" | "i16" | "i32" | "i64" | "i128" | "isize" => "Int",
                    "u8" | "u16" | "u32" | "u64" | "u128" | "usize" => "Uint",
                    "f32" | "f64" => "Float",
                    "bool" => "Bool",
                    "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "IndexSet" => "Array",
                    "HashMap" | "BTreeMap" | "IndexMap" | "Map" => "Map",
                    _ => "Unknown",
                }
            }
            None => "Unknown",
        },
        _ => "Unknown",
    };
    let kind = syn::Ident::new(kind, proc_macro2::Span::call_site());
    quote!(::datagate::Kind::#kind)
}

fn first_type_argument(arguments: &PathArguments) -> Option<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}

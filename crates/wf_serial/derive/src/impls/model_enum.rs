use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, LitStr};

use crate::derive_data::{FieldAttributes, TypeAttributes};

/// Implements `EnumType` and `MemberType` for a fieldless enum.
pub(crate) fn impl_model_enum(ast: &DeriveInput) -> syn::Result<TokenStream> {
    let Data::Enum(data) = &ast.data else {
        return Err(syn::Error::new(
            ast.ident.span(),
            "`ModelEnum` can only be derived for fieldless enums",
        ));
    };
    if !ast.generics.params.is_empty() {
        return Err(syn::Error::new(
            ast.generics.span(),
            "`ModelEnum` cannot be derived for generic types",
        ));
    }

    let attrs = TypeAttributes::parse_attrs(&ast.attrs)?;
    let wf_serial = crate::path::wf_serial();
    let model_ = crate::path::model_(&wf_serial);
    let value_ = crate::path::value_(&wf_serial);
    let ident = &ast.ident;

    let mut variants = Vec::with_capacity(data.variants.len());
    let mut names = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.fields.span(),
                "`ModelEnum` variants cannot carry data",
            ));
        }
        let variant_attrs = FieldAttributes::parse_attrs(&variant.attrs)?;
        let name = variant_attrs
            .rename
            .unwrap_or_else(|| LitStr::new(&variant.ident.to_string(), variant.ident.span()));
        variants.push(&variant.ident);
        names.push(name);
    }
    if variants.is_empty() {
        return Err(syn::Error::new(
            ident.span(),
            "`ModelEnum` needs at least one variant",
        ));
    }

    let indices = 0..variants.len();
    let type_path = match &attrs.type_path {
        Some(path) => quote!(#path),
        None => {
            let name = LitStr::new(&ident.to_string(), ident.span());
            quote!(::core::concat!(::core::module_path!(), "::", #name))
        }
    };
    let as_string = attrs.as_string;

    Ok(quote! {
        const _: () = {
            impl #model_::EnumType for #ident {
                fn enum_info() -> &'static #model_::EnumInfo {
                    static INFO: #model_::EnumInfo =
                        #model_::EnumInfo::new(#type_path, &[#(#names),*]).with_as_string(#as_string);
                    &INFO
                }
            }

            impl #value_::MemberType for #ident {
                #[inline]
                fn shape() -> #value_::Shape {
                    #value_::Shape::Enum(<Self as #model_::EnumType>::enum_info())
                }

                fn to_value(&self) -> #value_::Value {
                    let index: usize = match self {
                        #( Self::#variants => #indices, )*
                    };
                    match #value_::EnumValue::new(<Self as #model_::EnumType>::enum_info(), index) {
                        ::core::option::Option::Some(variant) => #value_::Value::Enum(variant),
                        ::core::option::Option::None => ::core::unreachable!(),
                    }
                }

                fn from_value(value: #value_::Value) -> ::core::result::Result<Self, #value_::ValueError> {
                    const VARIANTS: &[#ident] = &[#( #ident::#variants ),*];
                    let variant =
                        #value_::EnumValue::from_value(<Self as #model_::EnumType>::enum_info(), value)?;
                    ::core::result::Result::Ok(VARIANTS[variant.index()])
                }
            }
        };
    })
}

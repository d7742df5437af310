use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr};

use crate::derive_data::{DynamicMember, ModelField, ModelStruct, PropertyMember};

/// Implements `TypedModel` and `Model`.
pub(crate) fn impl_model(ast: &DeriveInput) -> syn::Result<TokenStream> {
    let model = ModelStruct::from_input(ast)?;
    let wf_serial = crate::path::wf_serial();
    let model_ = crate::path::model_(&wf_serial);
    let ident = model.ident;

    let type_info = get_type_info_tokens(&model, &wf_serial);
    let accessors = get_accessor_tokens(&model, &wf_serial);
    let auto_register =
        super::get_auto_register_impl(&wf_serial, ident, model.attrs.auto_register);

    Ok(quote! {
        const _: () = {
            impl #model_::TypedModel for #ident {
                fn type_info() -> &'static #model_::ModelInfo {
                    static CELL: #model_::ModelInfoCell = #model_::ModelInfoCell::new();
                    CELL.get_or_init(|| { #type_info })
                }
            }

            impl #model_::Model for #ident {
                #[inline]
                fn model_info(&self) -> &'static #model_::ModelInfo {
                    <Self as #model_::TypedModel>::type_info()
                }

                #accessors
            }

            #auto_register
        };
    })
}

fn get_type_info_tokens(model: &ModelStruct, wf_serial: &syn::Path) -> TokenStream {
    let model_ = crate::path::model_(wf_serial);
    let ident = model.ident;

    let type_path = match &model.attrs.type_path {
        Some(path) => quote!(#path),
        None => {
            let name = LitStr::new(&ident.to_string(), ident.span());
            quote!(::core::concat!(::core::module_path!(), "::", #name))
        }
    };

    let with_default =
        (!model.attrs.no_default).then(|| quote!(.with_default::<#ident>()));

    let with_base = model.base().map(|base| {
        let ty = base.ty;
        quote!(.with_base::<#ty>())
    });

    // Dynamic properties first, then regular properties, then fields.
    let members = model
        .attrs
        .dynamic
        .iter()
        .map(|dynamic| get_dynamic_member_tokens(dynamic, &model_))
        .chain(
            model
                .attrs
                .properties
                .iter()
                .map(|property| get_property_member_tokens(property, model, &model_)),
        )
        .chain(
            model
                .members()
                .map(|field| get_field_member_tokens(field, model, &model_)),
        );

    let with_items = model.items().map(|items| {
        let name = &items.name;
        quote!(.with_items(#name))
    });

    let with_items_by_default = model
        .attrs
        .as_collection
        .then(|| quote!(.with_items_by_default(true)));

    quote! {
        #model_::ModelInfo::new::<#ident>(#type_path)
            #with_default
            #with_base
            #( .with_member(#members) )*
            #with_items
            #with_items_by_default
    }
}

fn with_serialization_name(rename: Option<&LitStr>) -> Option<TokenStream> {
    rename.map(|rename| quote!(.with_serialization_name(#rename)))
}

fn with_flags(model_: &TokenStream, exclude: bool, include: bool) -> Option<TokenStream> {
    let mut flags = Vec::new();
    if exclude {
        flags.push(quote!(#model_::MemberFlags::EXCLUDED));
    }
    if include {
        flags.push(quote!(#model_::MemberFlags::INCLUDED));
    }
    (!flags.is_empty()).then(|| quote!(.with_flags(#( #flags )|*)))
}

fn get_dynamic_member_tokens(dynamic: &DynamicMember, model_: &TokenStream) -> TokenStream {
    let DynamicMember {
        name,
        ty,
        rename,
        exclude,
    } = dynamic;
    let rename = with_serialization_name(rename.as_ref());
    let flags = with_flags(model_, *exclude, false);

    quote! {
        #model_::MemberInfo::dynamic::<#ty>(#name)
            #rename
            #flags
    }
}

fn get_property_member_tokens(
    property: &PropertyMember,
    model: &ModelStruct,
    model_: &TokenStream,
) -> TokenStream {
    let ident = model.ident;
    let PropertyMember {
        name,
        ty,
        get,
        set,
        rename,
        include,
        exclude,
    } = property;
    let rename = with_serialization_name(rename.as_ref());
    let flags = with_flags(model_, *exclude, *include);
    let set = match set {
        Some(set) => quote!(::core::option::Option::Some(#set as fn(&mut #ident, #ty))),
        None => quote!(::core::option::Option::None),
    };

    quote! {
        #model_::MemberInfo::property::<#ident, #ty>(
            #name,
            #get as fn(&#ident) -> #ty,
            #set,
        )
        #rename
        #flags
    }
}

fn get_field_member_tokens(
    field: &ModelField,
    model: &ModelStruct,
    model_: &TokenStream,
) -> TokenStream {
    let ident = model.ident;
    let ModelField {
        ident: field_ident,
        ty,
        name,
        attrs,
    } = field;
    let rename = with_serialization_name(attrs.rename.as_ref());
    let flags = with_flags(model_, attrs.exclude, false);

    let option = |value: Option<bool>| match value {
        Some(value) => quote!(::core::option::Option::Some(#value)),
        None => quote!(::core::option::Option::None),
    };
    let hints = (attrs.as_string
        || attrs.parse
        || attrs.as_collection.is_some()
        || attrs.as_dictionary.is_some())
    .then(|| {
        let as_collection = option(attrs.as_collection);
        let as_dictionary = option(attrs.as_dictionary);
        let enum_as_string = option(attrs.as_string.then_some(true));
        let parse = option(attrs.parse.then_some(true));
        quote! {
            .with_hints(#model_::RepresentationHints {
                as_collection: #as_collection,
                as_dictionary: #as_dictionary,
                enum_as_string: #enum_as_string,
                parse: #parse,
            })
        }
    });

    quote! {
        #model_::MemberInfo::field::<#ident, #ty>(
            #name,
            |model| &model.#field_ident,
            |model| &mut model.#field_ident,
        )
        #rename
        #flags
        #hints
    }
}

/// `Model` capability accessors.
fn get_accessor_tokens(model: &ModelStruct, wf_serial: &syn::Path) -> TokenStream {
    let model_ = crate::path::model_(wf_serial);
    let mut tokens = TokenStream::new();

    if let Some(base) = model.base() {
        let field = base.ident;
        tokens.extend(quote! {
            #[inline]
            fn base(&self) -> ::core::option::Option<&dyn #model_::Model> {
                ::core::option::Option::Some(&self.#field)
            }

            #[inline]
            fn base_mut(&mut self) -> ::core::option::Option<&mut dyn #model_::Model> {
                ::core::option::Option::Some(&mut self.#field)
            }
        });
    }

    if let Some(bag) = model.bag() {
        let field = bag.ident;
        tokens.extend(quote! {
            #[inline]
            fn property_bag(&self) -> ::core::option::Option<&#model_::PropertyBag> {
                ::core::option::Option::Some(&self.#field)
            }

            #[inline]
            fn property_bag_mut(&mut self) -> ::core::option::Option<&mut #model_::PropertyBag> {
                ::core::option::Option::Some(&mut self.#field)
            }
        });
    }

    if model.attrs.callbacks {
        tokens.extend(quote! {
            #[inline]
            fn callbacks(&self) -> ::core::option::Option<&dyn #model_::SerializationCallbacks> {
                ::core::option::Option::Some(self)
            }

            #[inline]
            fn callbacks_mut(
                &mut self,
            ) -> ::core::option::Option<&mut dyn #model_::SerializationCallbacks> {
                ::core::option::Option::Some(self)
            }
        });
    }

    if model.attrs.custom {
        tokens.extend(quote! {
            #[inline]
            fn custom_serialization(
                &self,
            ) -> ::core::option::Option<&dyn #model_::CustomSerialization> {
                ::core::option::Option::Some(self)
            }

            #[inline]
            fn custom_serialization_mut(
                &mut self,
            ) -> ::core::option::Option<&mut dyn #model_::CustomSerialization> {
                ::core::option::Option::Some(self)
            }
        });
    }

    tokens
}

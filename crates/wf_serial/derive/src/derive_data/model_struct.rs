use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Ident, Type};

use super::{FieldAttributes, TypeAttributes};

/// One named field of a model struct.
pub(crate) struct ModelField<'a> {
    pub ident: &'a Ident,
    pub ty: &'a Type,
    /// Member name: the field name without a raw prefix.
    pub name: String,
    pub attrs: FieldAttributes,
}

/// A parsed `#[derive(Model)]` input.
pub(crate) struct ModelStruct<'a> {
    pub ident: &'a Ident,
    pub attrs: TypeAttributes,
    pub fields: Vec<ModelField<'a>>,
}

impl<'a> ModelStruct<'a> {
    pub fn from_input(ast: &'a DeriveInput) -> syn::Result<Self> {
        if !ast.generics.params.is_empty() {
            return Err(syn::Error::new(
                ast.generics.span(),
                "`Model` cannot be derived for generic types",
            ));
        }

        let data = match &ast.data {
            Data::Struct(data) => data,
            Data::Enum(data) => {
                return Err(syn::Error::new(
                    data.enum_token.span,
                    "`Model` is derived for structs; use `ModelEnum` for fieldless enums",
                ));
            }
            Data::Union(data) => {
                return Err(syn::Error::new(
                    data.union_token.span,
                    "`Model` cannot be derived for unions",
                ));
            }
        };

        let named = match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(fields) => {
                return Err(syn::Error::new(
                    fields.span(),
                    "`Model` needs named fields; tuple structs have no member names",
                ));
            }
        };

        let mut fields = Vec::with_capacity(named.len());
        for field in named {
            let Some(ident) = field.ident.as_ref() else {
                continue;
            };
            fields.push(ModelField {
                ident,
                ty: &field.ty,
                name: ident.unraw().to_string(),
                attrs: FieldAttributes::parse_attrs(&field.attrs)?,
            });
        }

        let this = Self {
            ident: &ast.ident,
            attrs: TypeAttributes::parse_attrs(&ast.attrs)?,
            fields,
        };
        this.validate()?;
        Ok(this)
    }

    fn validate(&self) -> syn::Result<()> {
        let single = |what: &str, mut found: Vec<&ModelField>| match found.len() {
            0 | 1 => Ok(()),
            _ => Err(syn::Error::new(
                found.swap_remove(1).ident.span(),
                format!("at most one `#[model({what})]` field is allowed"),
            )),
        };
        single("base", self.fields.iter().filter(|f| f.attrs.base).collect())?;
        single("bag", self.fields.iter().filter(|f| f.attrs.bag).collect())?;
        single("items", self.fields.iter().filter(|f| f.attrs.items).collect())?;

        if !self.attrs.dynamic.is_empty() && self.bag().is_none() {
            return Err(syn::Error::new(
                self.attrs.dynamic[0].name.span(),
                "dynamic properties need a `#[model(bag)]` field",
            ));
        }
        if let Some(items) = self.items()
            && !items.attrs.is_member()
        {
            return Err(syn::Error::new(
                items.ident.span(),
                "the `items` field must be a serialized member",
            ));
        }
        if self.attrs.as_collection && self.items().is_none() {
            return Err(syn::Error::new(
                Span::call_site(),
                "`as_collection` needs an `#[model(items)]` field",
            ));
        }
        Ok(())
    }

    pub fn base(&self) -> Option<&ModelField<'a>> {
        self.fields.iter().find(|field| field.attrs.base)
    }

    pub fn bag(&self) -> Option<&ModelField<'a>> {
        self.fields.iter().find(|field| field.attrs.bag)
    }

    pub fn items(&self) -> Option<&ModelField<'a>> {
        self.fields.iter().find(|field| field.attrs.items)
    }

    /// Fields that become members, in declaration order.
    pub fn members(&self) -> impl Iterator<Item = &ModelField<'a>> {
        self.fields.iter().filter(|field| field.attrs.is_member())
    }
}

use syn::meta::ParseNestedMeta;
use syn::{Attribute, LitStr};

use super::{parse_bool, parse_lit_str};
use crate::MODEL_ATTRIBUTE_NAME;

/// Attributes applied to one struct field or enum variant.
#[derive(Default)]
pub(crate) struct FieldAttributes {
    pub rename: Option<LitStr>,
    pub exclude: bool,
    pub ignore: bool,
    pub as_string: bool,
    pub parse: bool,
    pub as_collection: Option<bool>,
    pub as_dictionary: Option<bool>,
    pub base: bool,
    pub bag: bool,
    pub items: bool,
}

impl FieldAttributes {
    pub fn parse_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in attrs {
            if attr.path().is_ident(MODEL_ATTRIBUTE_NAME) {
                attr.parse_nested_meta(|meta| this.parse_meta(meta))?;
            }
        }
        Ok(this)
    }

    fn parse_meta(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        let path = &meta.path;
        if path.is_ident("rename") {
            self.rename = Some(parse_lit_str(&meta)?);
        } else if path.is_ident("exclude") {
            self.exclude = true;
        } else if path.is_ident("ignore") {
            self.ignore = true;
        } else if path.is_ident("as_string") {
            self.as_string = true;
        } else if path.is_ident("parse") {
            self.parse = true;
        } else if path.is_ident("as_collection") {
            self.as_collection = Some(parse_bool(&meta)?);
        } else if path.is_ident("as_dictionary") {
            self.as_dictionary = Some(parse_bool(&meta)?);
        } else if path.is_ident("base") {
            self.base = true;
        } else if path.is_ident("bag") {
            self.bag = true;
        } else if path.is_ident("items") {
            self.items = true;
        } else {
            return Err(meta.error("unsupported `model` field attribute"));
        }
        Ok(())
    }

    /// Whether the field is a serializable member.
    #[inline]
    pub fn is_member(&self) -> bool {
        !(self.ignore || self.base || self.bag)
    }
}

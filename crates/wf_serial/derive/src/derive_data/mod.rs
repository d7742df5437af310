//! Parsing of `#[model(..)]` attributes and derive inputs.

// -----------------------------------------------------------------------------
// Modules

mod field_attributes;
mod model_struct;
mod type_attributes;

// -----------------------------------------------------------------------------
// Internal API

pub(crate) use field_attributes::FieldAttributes;
pub(crate) use model_struct::{ModelField, ModelStruct};
pub(crate) use type_attributes::{DynamicMember, PropertyMember, TypeAttributes};

use syn::LitStr;
use syn::meta::ParseNestedMeta;

/// Parses `key = "..."`.
fn parse_lit_str(meta: &ParseNestedMeta) -> syn::Result<LitStr> {
    meta.value()?.parse()
}

/// Parses `key = true|false`, or a bare `key` meaning `true`.
fn parse_bool(meta: &ParseNestedMeta) -> syn::Result<bool> {
    if meta.input.peek(syn::Token![=]) {
        Ok(meta.value()?.parse::<syn::LitBool>()?.value)
    } else {
        Ok(true)
    }
}

//! Derive macros for `wf_serial`.
//!
//! - [`Model`]: describes a struct as a serializable model.
//! - [`ModelEnum`]: makes a fieldless enum usable as a member type.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::std_instead_of_core, reason = "proc-macro lib")]
#![allow(clippy::std_instead_of_alloc, reason = "proc-macro lib")]

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

static MODEL_ATTRIBUTE_NAME: &str = "model";

// -----------------------------------------------------------------------------
// Modules

mod derive_data;
mod impls;
mod path;

// -----------------------------------------------------------------------------
// Macros

/// # Model Derivation
///
/// `#[derive(Model)]` implements `TypedModel` and `Model` for a struct with
/// named fields, or a unit struct. Generic structs are not supported.
///
/// Every field becomes a member, in declaration order, after the dynamic
/// properties and regular properties declared on the type.
///
/// ## Type Attributes
///
/// - `type_path = "app::Node"`: overrides the default `module_path!()` based path.
/// - `no_default`: the engine cannot create instances (no `Default` bound).
/// - `callbacks`: the type implements `SerializationCallbacks`.
/// - `custom`: the type implements `CustomSerialization`.
/// - `auto_register`: submits the type for `ModelRegistry::auto_register`.
/// - `as_collection`: serialize the model as its items member by default.
/// - `dynamic(name = "..", ty = T [, rename = "..", exclude])`: a dynamic property
///   stored in the `#[model(bag)]` field.
/// - `property(name = "..", ty = T, get = path [, set = path, rename = "..", include, exclude])`:
///   a regular property. Without `set` it is calculated and skipped unless `include`d.
///
/// ## Field Attributes
///
/// - `rename = ".."`: the serialization name.
/// - `exclude`: a member that is never serialized.
/// - `ignore`: not a member at all.
/// - `as_string`: enum members are written by name.
/// - `parse`: scalar members travel as culture-formatted text.
/// - `as_collection = bool`, `as_dictionary = bool`: decides how a model value
///   stored in this member is written.
/// - `base`: the embedded base model.
/// - `bag`: the `PropertyBag` backing dynamic properties.
/// - `items`: the list or map holding the model's items.
///
/// ## Example
///
/// ```rust, ignore
/// #[derive(Model, Default)]
/// #[model(dynamic(name = "Notes", ty = String))]
/// struct Document {
///     #[model(base)]
///     entity: Entity,
///     #[model(bag)]
///     bag: PropertyBag,
///     #[model(rename = "Body")]
///     body: String,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    impls::impl_model(&ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// # Model Enum Derivation
///
/// `#[derive(ModelEnum)]` implements `EnumType` and `MemberType` for a
/// fieldless enum. The enum must be `Copy`.
///
/// Variants are written by declaration index unless `as_string` is set on the
/// type, on the member, or by a modifier.
///
/// ```rust, ignore
/// #[derive(ModelEnum, Clone, Copy, Default)]
/// #[model(as_string)]
/// enum Priority {
///     #[default]
///     Low,
///     #[model(rename = "urgent")]
///     High,
/// }
/// ```
#[proc_macro_derive(ModelEnum, attributes(model))]
pub fn derive_model_enum(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    impls::impl_model_enum(&ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

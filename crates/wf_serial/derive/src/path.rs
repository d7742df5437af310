//! Paths into `wf_serial` used by the generated code.

use proc_macro2::TokenStream;
use quote::quote;

/// Gets the access path to the `wf_serial` crate as seen from the caller.
///
/// Resolves to `::wf_serial`, or to `::<facade>::serial` when the caller
/// depends on a facade crate instead.
pub(crate) fn wf_serial() -> syn::Path {
    wf_macro_utils::Manifest::shared(|manifest| manifest.get_crate_path("wf_serial"))
}

#[inline(always)]
pub(crate) fn model_(wf_serial: &syn::Path) -> TokenStream {
    quote!(#wf_serial::model)
}

#[inline(always)]
pub(crate) fn value_(wf_serial: &syn::Path) -> TokenStream {
    quote!(#wf_serial::value)
}

#[cfg(feature = "auto_register")]
#[inline(always)]
pub(crate) fn auto_register_(wf_serial: &syn::Path) -> TokenStream {
    quote!(#wf_serial::__macro_exports::auto_register)
}

use proc_macro2::{Span, TokenStream};

/// Generates the `inventory` submission for `#[model(auto_register)]`.
#[cfg(feature = "auto_register")]
pub(crate) fn get_auto_register_impl(
    wf_serial: &syn::Path,
    ident: &syn::Ident,
    span: Option<Span>,
) -> TokenStream {
    let Some(span) = span else {
        return TokenStream::new();
    };
    let auto_register_ = crate::path::auto_register_(wf_serial);

    quote::quote_spanned! { span =>
        #auto_register_::inventory::submit! {
            #auto_register_::__AutoRegisterFunc(
                #auto_register_::__register::<#ident>
            )
        }
    }
}

/// `auto_register` is a no-op without the feature.
#[cfg(not(feature = "auto_register"))]
pub(crate) fn get_auto_register_impl(
    _: &syn::Path,
    _: &syn::Ident,
    _: Option<Span>,
) -> TokenStream {
    TokenStream::new()
}

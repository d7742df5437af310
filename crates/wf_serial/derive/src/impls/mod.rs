// -----------------------------------------------------------------------------
// Modules

mod auto_register;
mod model;
mod model_enum;

// -----------------------------------------------------------------------------
// Internal API

pub(crate) use model::impl_model;
pub(crate) use model_enum::impl_model_enum;

use auto_register::get_auto_register_impl;

//! Format-agnostic object-graph serialization.
//!
//! The engine walks a graph of [`Shared`](model::Shared) models, preserves
//! reference identity across shared children and cycles, lets ordered
//! [`SerializerModifier`](modifier::SerializerModifier)s reshape the output,
//! and delegates the wire format to a [`Backend`](backend::Backend).
//!
//! ## Layers
//!
//! - [`value`]: the [`Value`](value::Value) every member is converted to, and
//!   the [`Shape`](value::Shape) describing its declared type.
//! - [`model`]: the [`Model`](model::Model) trait, static
//!   [`ModelInfo`](model::ModelInfo) descriptors and shared handles.
//! - [`registry`]: type path lookup for polymorphic members.
//! - [`catalog`]: per-type cached member classification.
//! - [`reference`]: graph id assignment and back-reference resolution.
//! - [`modifier`]: per-type interceptor pipelines.
//! - [`context`]: per-operation state and depth scopes.
//! - [`serializer`]: the orchestration core.
//! - [`backend`]: the backend contract, plus JSON and binary backends.
//!
//! ## Example
//!
//! ```
//! use wf_serial::prelude::*;
//!
//! #[derive(Model, Default)]
//! struct Node {
//!     name: String,
//!     children: Vec<Shared<Node>>,
//! }
//!
//! let child = Shared::new(Node { name: "leaf".into(), ..Default::default() });
//! let root = Shared::new(Node { name: "root".into(), children: vec![child] });
//!
//! let mut serializer = Serializer::new(JsonBackend::new(), SerializationServices::new());
//! let mut out = Vec::new();
//! serializer.serialize(&root, &mut out).unwrap();
//!
//! let back = serializer.deserialize::<Node>(out.as_slice()).unwrap();
//! assert!(back.is_complete());
//! assert_eq!(back.value.read().children[0].read().name, "leaf");
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

// -----------------------------------------------------------------------------
// Extern Self

// Usually, we need to use `crate` in the crate itself and use `wf_serial` in doc testing.
// But `macro_utils::Manifest` can only choose one, so we must have an
// `extern self` to ensure `wf_serial` can be used as an alias for `crate`.
extern crate self as wf_serial;

// -----------------------------------------------------------------------------
// Alloc

// The crate uses `std`, but the workspace lints name collection and
// smart-pointer types through `alloc`.
extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod backend;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod modifier;
pub mod reference;
pub mod registry;
pub mod serializer;
pub mod value;

// -----------------------------------------------------------------------------
// Derive macros

pub use wf_serial_derive::{Model, ModelEnum};

// -----------------------------------------------------------------------------
// Prelude

pub mod prelude {
    //! Commonly used items.

    pub use crate::backend::{BinaryBackend, JsonBackend};
    pub use crate::config::SerializationConfiguration;
    pub use crate::error::{MemberFailure, SerializeError};
    pub use crate::model::{Model, Shared, SharedAny, TypedModel, WeakShared};
    pub use crate::modifier::SerializerModifier;
    pub use crate::serializer::{SerializationServices, Serializer};
    pub use crate::value::{Culture, MemberType, Value};
    pub use crate::{Model, ModelEnum};
}

// -----------------------------------------------------------------------------
// Macro exports

#[doc(hidden)]
pub mod __macro_exports;

//! The backend contract.
//!
//! The serializer core decides *what* is written: which members, in which
//! representation, with which graph ids. A [`Backend`] decides *how*: it turns
//! scalars, references, sequences, dictionaries and model scopes into
//! elements of its format, and frames the root element on the sink.
//!
//! Elements are built bottom-up. A model is opened with
//! [`begin_model`](Backend::begin_model), receives its finished members
//! through [`write_member`](Backend::write_member) and is closed into an
//! element with [`end_model`](Backend::end_model).

mod binary;
mod json;

pub use binary::{BinaryBackend, BinaryError, BinaryModelWriter, BinaryNode, MAGIC};
pub use json::{JsonBackend, JsonError, JsonSettings};

use alloc::string::String;
use alloc::vec::Vec;
use core::error::Error;
use std::io;

use crate::context::SerializationContext;
use crate::error::DecodeError;
use crate::model::{ModelInfo, SharedAny};
use crate::reference::GraphId;
use crate::serializer::MemberValue;
use crate::value::{ScalarKind, Value};

// -----------------------------------------------------------------------------
// Headers

/// The framing of a model element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelHeader {
    /// Concrete type path; absent on root values.
    pub type_path: Option<String>,
    /// Graph id of the instance; absent on root values.
    pub graph_id: Option<GraphId>,
}

/// A decoded model element.
#[derive(Debug)]
pub enum ModelElement<R> {
    /// A back-reference to an instance seen earlier.
    Reference(GraphId),
    /// A full model, with a reader over its members.
    Model { header: ModelHeader, reader: R },
}

// -----------------------------------------------------------------------------
// Limits

/// Container nesting a backend accepts when reading a document.
///
/// Allows four element levels for every model level of `max_depth`.
pub(crate) fn nesting_limit(ctx: &SerializationContext<'_>) -> usize {
    ctx.configuration().max_depth.saturating_mul(4).saturating_add(16)
}

// -----------------------------------------------------------------------------
// Backend

/// A format implementation.
///
/// Write-side failures are fatal and reported through [`Backend::Error`].
/// Read-side element decoding failures are [`DecodeError`]s, recorded
/// against the member being read.
pub trait Backend {
    /// One encoded value.
    type Element;
    /// Accumulates the members of a model being written.
    type Writer;
    /// Gives access to the members of a model being read.
    type Reader;
    type Error: Error + Send + Sync + 'static;

    /// Called once before the root is encoded.
    fn open_sink(&mut self, _ctx: &SerializationContext<'_>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Writes the finished root element to `sink`.
    fn close_sink(
        &mut self,
        ctx: &SerializationContext<'_>,
        root: Self::Element,
        sink: &mut dyn io::Write,
    ) -> Result<(), Self::Error>;

    fn begin_model(
        &mut self,
        ctx: &SerializationContext<'_>,
        header: &ModelHeader,
    ) -> Result<Self::Writer, Self::Error>;

    /// Stores one encoded member under `member.serialization_name`.
    fn write_member(
        &mut self,
        ctx: &SerializationContext<'_>,
        writer: &mut Self::Writer,
        member: &MemberValue,
        element: Self::Element,
    ) -> Result<(), Self::Error>;

    fn end_model(
        &mut self,
        ctx: &SerializationContext<'_>,
        writer: Self::Writer,
    ) -> Result<Self::Element, Self::Error>;

    /// Encodes a scalar: null, bool, integer, float, char or string.
    fn encode_scalar(
        &mut self,
        ctx: &SerializationContext<'_>,
        value: &Value,
    ) -> Result<Self::Element, Self::Error>;

    fn encode_reference(
        &mut self,
        ctx: &SerializationContext<'_>,
        id: GraphId,
    ) -> Result<Self::Element, Self::Error>;

    fn encode_sequence(
        &mut self,
        ctx: &SerializationContext<'_>,
        items: Vec<Self::Element>,
    ) -> Result<Self::Element, Self::Error>;

    fn encode_dictionary(
        &mut self,
        ctx: &SerializationContext<'_>,
        entries: Vec<(Self::Element, Self::Element)>,
    ) -> Result<Self::Element, Self::Error>;

    /// Reads the root element from `source`.
    fn open_source(
        &mut self,
        ctx: &SerializationContext<'_>,
        source: &mut dyn io::Read,
    ) -> Result<Self::Element, Self::Error>;

    fn read_model(
        &mut self,
        ctx: &SerializationContext<'_>,
        element: Self::Element,
    ) -> Result<ModelElement<Self::Reader>, DecodeError>;

    /// Takes the member stored under `name`, if present.
    fn read_member(
        &mut self,
        ctx: &SerializationContext<'_>,
        reader: &mut Self::Reader,
        name: &str,
    ) -> Option<Self::Element>;

    fn is_null(&self, element: &Self::Element) -> bool;

    fn decode_scalar(
        &mut self,
        ctx: &SerializationContext<'_>,
        element: Self::Element,
        kind: ScalarKind,
    ) -> Result<Value, DecodeError>;

    fn decode_sequence(
        &mut self,
        ctx: &SerializationContext<'_>,
        element: Self::Element,
    ) -> Result<Vec<Self::Element>, DecodeError>;

    fn decode_dictionary(
        &mut self,
        ctx: &SerializationContext<'_>,
        element: Self::Element,
    ) -> Result<Vec<(Self::Element, Self::Element)>, DecodeError>;

    /// Creates the instance a model element is read into.
    fn create_model_instance(
        &mut self,
        _ctx: &SerializationContext<'_>,
        info: &'static ModelInfo,
    ) -> Option<SharedAny> {
        info.create_instance()
    }
}

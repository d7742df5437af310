use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;
use std::io;

use bincode::config;
use serde::de::{self, DeserializeSeed, EnumAccess, SeqAccess, Unexpected, VariantAccess, Visitor};
use serde::{Deserializer, Serialize};
use thiserror::Error;

use crate::backend::{Backend, ModelElement, ModelHeader, nesting_limit};
use crate::context::SerializationContext;
use crate::error::DecodeError;
use crate::reference::GraphId;
use crate::serializer::MemberValue;
use crate::value::{ScalarKind, Value};

/// Leading bytes of every binary document.
pub const MAGIC: &[u8; 4] = b"WFB1";

// -----------------------------------------------------------------------------
// BinaryNode

/// The element tree of the binary format.
///
/// Encoded with the derived [`Serialize`]; decoded through [`NodeSeed`], which
/// bounds how deep containers may nest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BinaryNode {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    String(String),
    Reference(u32),
    Sequence(Vec<BinaryNode>),
    Dictionary(Vec<(BinaryNode, BinaryNode)>),
    Model {
        type_path: Option<String>,
        graph_id: Option<u32>,
        members: Vec<(String, BinaryNode)>,
    },
}

impl BinaryNode {
    fn kind(&self) -> &'static str {
        match self {
            BinaryNode::Null => "null",
            BinaryNode::Bool(_) => "bool",
            BinaryNode::Int(_) => "integer",
            BinaryNode::UInt(_) => "unsigned integer",
            BinaryNode::Float(_) => "float",
            BinaryNode::Char(_) => "char",
            BinaryNode::String(_) => "string",
            BinaryNode::Reference(_) => "reference",
            BinaryNode::Sequence(_) => "sequence",
            BinaryNode::Dictionary(_) => "dictionary",
            BinaryNode::Model { .. } => "model",
        }
    }
}

// -----------------------------------------------------------------------------
// Decoding

const VARIANTS: &[&str] = &[
    "Null",
    "Bool",
    "Int",
    "UInt",
    "Float",
    "Char",
    "String",
    "Reference",
    "Sequence",
    "Dictionary",
    "Model",
];

const MODEL_FIELDS: &[&str] = &["type_path", "graph_id", "members"];

/// Decodes one [`BinaryNode`], allowing `remaining` more container levels.
#[derive(Clone, Copy)]
struct NodeSeed {
    remaining: usize,
}

impl NodeSeed {
    fn nested<E: de::Error>(self) -> Result<Self, E> {
        match self.remaining.checked_sub(1) {
            Some(remaining) => Ok(NodeSeed { remaining }),
            None => Err(E::custom("element nesting is too deep")),
        }
    }
}

impl<'de> DeserializeSeed<'de> for NodeSeed {
    type Value = BinaryNode;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<BinaryNode, D::Error> {
        deserializer.deserialize_enum("BinaryNode", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for NodeSeed {
    type Value = BinaryNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a binary node")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<BinaryNode, A::Error> {
        let (tag, variant) = data.variant::<u32>()?;
        let node = match tag {
            0 => {
                variant.unit_variant()?;
                BinaryNode::Null
            }
            1 => BinaryNode::Bool(variant.newtype_variant()?),
            2 => BinaryNode::Int(variant.newtype_variant()?),
            3 => BinaryNode::UInt(variant.newtype_variant()?),
            4 => BinaryNode::Float(variant.newtype_variant()?),
            5 => BinaryNode::Char(variant.newtype_variant()?),
            6 => BinaryNode::String(variant.newtype_variant()?),
            7 => BinaryNode::Reference(variant.newtype_variant()?),
            8 => {
                let child = self.nested::<A::Error>()?;
                BinaryNode::Sequence(variant.newtype_variant_seed(ListSeed(child))?)
            }
            9 => {
                let child = self.nested::<A::Error>()?;
                BinaryNode::Dictionary(variant.newtype_variant_seed(ListSeed(PairSeed(child, child)))?)
            }
            10 => {
                let child = self.nested::<A::Error>()?;
                variant.struct_variant(MODEL_FIELDS, ModelVisitor(child))?
            }
            other => {
                return Err(de::Error::invalid_value(
                    Unexpected::Unsigned(other.into()),
                    &"a binary node tag",
                ));
            }
        };
        Ok(node)
    }
}

/// The fields of [`BinaryNode::Model`], in declaration order.
struct ModelVisitor(NodeSeed);

impl<'de> Visitor<'de> for ModelVisitor {
    type Value = BinaryNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a model node")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<BinaryNode, A::Error> {
        let type_path = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let graph_id = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        let members = seq
            .next_element_seed(ListSeed(PairSeed(PhantomData::<String>, self.0)))?
            .ok_or_else(|| de::Error::invalid_length(2, &self))?;
        Ok(BinaryNode::Model {
            type_path,
            graph_id,
            members,
        })
    }
}

/// A length-prefixed list of `S` elements.
#[derive(Clone, Copy)]
struct ListSeed<S>(S);

impl<'de, S: DeserializeSeed<'de> + Copy> DeserializeSeed<'de> for ListSeed<S> {
    type Value = Vec<S::Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, S: DeserializeSeed<'de> + Copy> Visitor<'de> for ListSeed<S> {
    type Value = Vec<S::Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of nodes")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        // The length prefix is untrusted.
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

/// A two-element tuple.
#[derive(Clone, Copy)]
struct PairSeed<A, B>(A, B);

impl<'de, A, B> DeserializeSeed<'de> for PairSeed<A, B>
where
    A: DeserializeSeed<'de> + Copy,
    B: DeserializeSeed<'de> + Copy,
{
    type Value = (A::Value, B::Value);

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_tuple(2, self)
    }
}

impl<'de, A, B> Visitor<'de> for PairSeed<A, B>
where
    A: DeserializeSeed<'de> + Copy,
    B: DeserializeSeed<'de> + Copy,
{
    type Value = (A::Value, B::Value);

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a pair")
    }

    fn visit_seq<S: SeqAccess<'de>>(self, mut seq: S) -> Result<Self::Value, S::Error> {
        let first = seq
            .next_element_seed(self.0)?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let second = seq
            .next_element_seed(self.1)?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        Ok((first, second))
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BinaryError {
    #[error("not a binary document: bad magic")]
    BadMagic,
    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),
    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("`{0}` values cannot be encoded as a binary scalar")]
    NotScalar(&'static str),
}

/// Members of a binary model being written.
#[derive(Debug, Default)]
pub struct BinaryModelWriter {
    header: ModelHeader,
    members: Vec<(String, BinaryNode)>,
}

// -----------------------------------------------------------------------------
// BinaryBackend

/// A compact backend: a [`BinaryNode`] tree encoded with `bincode`'s
/// standard configuration behind a 4-byte magic.
///
/// Integers keep their signedness, so decoding is strict: an unsigned member
/// is never read from a signed node.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryBackend;

impl BinaryBackend {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

fn unexpected(expected: &'static str, found: &BinaryNode) -> DecodeError {
    DecodeError::UnexpectedElement {
        expected,
        found: found.kind(),
    }
}

impl Backend for BinaryBackend {
    type Element = BinaryNode;
    type Writer = BinaryModelWriter;
    type Reader = Vec<(String, BinaryNode)>;
    type Error = BinaryError;

    fn close_sink(
        &mut self,
        _ctx: &SerializationContext<'_>,
        root: BinaryNode,
        sink: &mut dyn io::Write,
    ) -> Result<(), BinaryError> {
        let payload = bincode::serde::encode_to_vec(&root, config::standard())?;
        sink.write_all(MAGIC)?;
        sink.write_all(&payload)?;
        sink.flush()?;
        Ok(())
    }

    fn begin_model(
        &mut self,
        _ctx: &SerializationContext<'_>,
        header: &ModelHeader,
    ) -> Result<BinaryModelWriter, BinaryError> {
        Ok(BinaryModelWriter {
            header: header.clone(),
            members: Vec::new(),
        })
    }

    fn write_member(
        &mut self,
        _ctx: &SerializationContext<'_>,
        writer: &mut BinaryModelWriter,
        member: &MemberValue,
        element: BinaryNode,
    ) -> Result<(), BinaryError> {
        writer
            .members
            .push((member.serialization_name.into(), element));
        Ok(())
    }

    fn end_model(
        &mut self,
        _ctx: &SerializationContext<'_>,
        writer: BinaryModelWriter,
    ) -> Result<BinaryNode, BinaryError> {
        Ok(BinaryNode::Model {
            type_path: writer.header.type_path,
            graph_id: writer.header.graph_id.map(GraphId::get),
            members: writer.members,
        })
    }

    fn encode_scalar(
        &mut self,
        _ctx: &SerializationContext<'_>,
        value: &Value,
    ) -> Result<BinaryNode, BinaryError> {
        Ok(match value {
            Value::Null => BinaryNode::Null,
            Value::Bool(v) => BinaryNode::Bool(*v),
            Value::Int(v) => BinaryNode::Int(*v),
            Value::UInt(v) => BinaryNode::UInt(*v),
            Value::Float(v) => BinaryNode::Float(*v),
            Value::Char(v) => BinaryNode::Char(*v),
            Value::String(v) => BinaryNode::String(v.clone()),
            other => return Err(BinaryError::NotScalar(other.kind_name())),
        })
    }

    fn encode_reference(
        &mut self,
        _ctx: &SerializationContext<'_>,
        id: GraphId,
    ) -> Result<BinaryNode, BinaryError> {
        Ok(BinaryNode::Reference(id.get()))
    }

    fn encode_sequence(
        &mut self,
        _ctx: &SerializationContext<'_>,
        items: Vec<BinaryNode>,
    ) -> Result<BinaryNode, BinaryError> {
        Ok(BinaryNode::Sequence(items))
    }

    fn encode_dictionary(
        &mut self,
        _ctx: &SerializationContext<'_>,
        entries: Vec<(BinaryNode, BinaryNode)>,
    ) -> Result<BinaryNode, BinaryError> {
        Ok(BinaryNode::Dictionary(entries))
    }

    fn open_source(
        &mut self,
        ctx: &SerializationContext<'_>,
        source: &mut dyn io::Read,
    ) -> Result<BinaryNode, BinaryError> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;

        let payload = bytes.strip_prefix(MAGIC).ok_or(BinaryError::BadMagic)?;
        let seed = NodeSeed {
            remaining: nesting_limit(ctx),
        };
        let (root, _) = bincode::serde::seed_decode_from_slice(seed, payload, config::standard())?;
        Ok(root)
    }

    fn read_model(
        &mut self,
        _ctx: &SerializationContext<'_>,
        element: BinaryNode,
    ) -> Result<ModelElement<Self::Reader>, DecodeError> {
        match element {
            BinaryNode::Reference(id) => Ok(ModelElement::Reference(GraphId::from_raw(id))),
            BinaryNode::Model {
                type_path,
                graph_id,
                members,
            } => Ok(ModelElement::Model {
                header: ModelHeader {
                    type_path,
                    graph_id: graph_id.map(GraphId::from_raw),
                },
                reader: members,
            }),
            other => Err(unexpected("model", &other)),
        }
    }

    fn read_member(
        &mut self,
        _ctx: &SerializationContext<'_>,
        reader: &mut Self::Reader,
        name: &str,
    ) -> Option<BinaryNode> {
        let index = reader.iter().position(|(member, _)| member == name)?;
        Some(reader.swap_remove(index).1)
    }

    #[inline]
    fn is_null(&self, element: &BinaryNode) -> bool {
        matches!(element, BinaryNode::Null)
    }

    fn decode_scalar(
        &mut self,
        _ctx: &SerializationContext<'_>,
        element: BinaryNode,
        kind: ScalarKind,
    ) -> Result<Value, DecodeError> {
        match (kind, element) {
            (ScalarKind::Bool, BinaryNode::Bool(v)) => Ok(Value::Bool(v)),
            (ScalarKind::Int, BinaryNode::Int(v)) => Ok(Value::Int(v)),
            (ScalarKind::UInt, BinaryNode::UInt(v)) => Ok(Value::UInt(v)),
            (ScalarKind::Float, BinaryNode::Float(v)) => Ok(Value::Float(v)),
            (ScalarKind::Char, BinaryNode::Char(v)) => Ok(Value::Char(v)),
            (ScalarKind::String, BinaryNode::String(v)) => Ok(Value::String(v)),
            (kind, other) => Err(unexpected(kind.name(), &other)),
        }
    }

    fn decode_sequence(
        &mut self,
        _ctx: &SerializationContext<'_>,
        element: BinaryNode,
    ) -> Result<Vec<BinaryNode>, DecodeError> {
        match element {
            BinaryNode::Sequence(items) => Ok(items),
            other => Err(unexpected("sequence", &other)),
        }
    }

    fn decode_dictionary(
        &mut self,
        _ctx: &SerializationContext<'_>,
        element: BinaryNode,
    ) -> Result<Vec<(BinaryNode, BinaryNode)>, DecodeError> {
        match element {
            BinaryNode::Dictionary(entries) => Ok(entries),
            other => Err(unexpected("dictionary", &other)),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{BinaryBackend, BinaryError, BinaryNode, MAGIC};
    use crate::backend::Backend;
    use crate::config::SerializationConfiguration;
    use crate::context::{SerializationContext, SerializationMode};

    #[test]
    fn framing_round_trips() {
        let config = SerializationConfiguration::default();
        let ctx = SerializationContext::new(SerializationMode::Serialize, &config);
        let mut backend = BinaryBackend::new();

        let root = BinaryNode::Model {
            type_path: Some("app::Node".into()),
            graph_id: Some(1),
            members: vec![("name".into(), BinaryNode::String("root".into()))],
        };

        let mut bytes = Vec::new();
        backend.close_sink(&ctx, root.clone(), &mut bytes).unwrap();
        assert_eq!(&bytes[..4], MAGIC);

        let back = backend.open_source(&ctx, &mut bytes.as_slice()).unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let config = SerializationConfiguration::default();
        let ctx = SerializationContext::new(SerializationMode::Deserialize, &config);

        let result = BinaryBackend.open_source(&ctx, &mut &b"JSON{}"[..]);
        assert!(matches!(result, Err(BinaryError::BadMagic)));
    }

    fn nested_sequences(levels: usize) -> BinaryNode {
        (0..levels).fold(BinaryNode::Null, |node, _| BinaryNode::Sequence(vec![node]))
    }

    #[test]
    fn nesting_is_bounded_by_max_depth() {
        let config = SerializationConfiguration::default().with_max_depth(1);
        let ctx = SerializationContext::new(SerializationMode::Deserialize, &config);
        let mut backend = BinaryBackend::new();

        let mut shallow = Vec::new();
        backend.close_sink(&ctx, nested_sequences(10), &mut shallow).unwrap();
        let back = backend.open_source(&ctx, &mut shallow.as_slice()).unwrap();
        assert_eq!(back, nested_sequences(10));

        let mut deep = Vec::new();
        backend.close_sink(&ctx, nested_sequences(40), &mut deep).unwrap();
        let result = backend.open_source(&ctx, &mut deep.as_slice());
        assert!(matches!(result, Err(BinaryError::Decode(_))));
    }

    #[test]
    fn hostile_nesting_is_an_error() {
        // `Sequence` of length one, repeated, then `Null`.
        let mut bytes = MAGIC.to_vec();
        for _ in 0..100_000 {
            bytes.extend_from_slice(&[8, 1]);
        }
        bytes.push(0);

        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(move || {
                let config = SerializationConfiguration::default();
                let ctx = SerializationContext::new(SerializationMode::Deserialize, &config);
                matches!(
                    BinaryBackend.open_source(&ctx, &mut bytes.as_slice()),
                    Err(BinaryError::Decode(_))
                )
            })
            .unwrap();
        assert!(handle.join().unwrap());
    }
}

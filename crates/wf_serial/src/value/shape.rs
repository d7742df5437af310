use core::fmt;

use crate::model::{EnumInfo, ModelInfo};
use crate::value::Value;

// -----------------------------------------------------------------------------
// ScalarKind

/// The primitive leaf kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Float,
    Char,
    String,
}

impl ScalarKind {
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "integer",
            ScalarKind::UInt => "unsigned integer",
            ScalarKind::Float => "float",
            ScalarKind::Char => "char",
            ScalarKind::String => "string",
        }
    }

    /// The kind of a scalar value; `None` for null and composite values.
    pub fn of(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Bool(_) => ScalarKind::Bool,
            Value::Int(_) => ScalarKind::Int,
            Value::UInt(_) => ScalarKind::UInt,
            Value::Float(_) => ScalarKind::Float,
            Value::Char(_) => ScalarKind::Char,
            Value::String(_) => ScalarKind::String,
            _ => return None,
        })
    }
}

// -----------------------------------------------------------------------------
// Shape

/// The declared structure of a member type.
///
/// Nested shapes are reached through function pointers so that a model may
/// mention itself (`Vec<Shared<Node>>` inside `Node`) while its static
/// descriptor is still being built.
#[derive(Clone, Copy)]
pub enum Shape {
    /// A primitive leaf.
    Scalar(ScalarKind),
    /// A type that always travels as its text form.
    Text,
    /// A fieldless enum.
    Enum(&'static EnumInfo),
    /// A nullable slot.
    Option(fn() -> Shape),
    /// An ordered sequence.
    List(fn() -> Shape),
    /// Key/value entries.
    Map(fn() -> Shape, fn() -> Shape),
    /// A model of exactly this type.
    Model(&'static ModelInfo),
    /// A model of any registered type.
    AnyModel,
}

impl Shape {
    /// A readable description, used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Shape::Scalar(kind) => kind.name(),
            Shape::Text => "text",
            Shape::Enum(info) => info.type_path(),
            Shape::Option(_) => "optional value",
            Shape::List(_) => "list",
            Shape::Map(..) => "map",
            Shape::Model(info) => info.type_path(),
            Shape::AnyModel => "model",
        }
    }

    /// Strips every `Option` layer.
    pub fn unwrap_option(self) -> Shape {
        let mut shape = self;
        while let Shape::Option(inner) = shape {
            shape = inner();
        }
        shape
    }

    /// The element shape of a list.
    #[inline]
    pub fn item(self) -> Option<Shape> {
        match self.unwrap_option() {
            Shape::List(item) => Some(item()),
            _ => None,
        }
    }

    /// The key and value shapes of a map.
    #[inline]
    pub fn entry(self) -> Option<(Shape, Shape)> {
        match self.unwrap_option() {
            Shape::Map(key, value) => Some((key(), value())),
            _ => None,
        }
    }

    /// The shape a value would have if nothing were declared.
    pub fn infer(value: &Value) -> Shape {
        match value {
            Value::Null => Shape::Option(|| Shape::AnyModel),
            Value::Bool(_) => Shape::Scalar(ScalarKind::Bool),
            Value::Int(_) => Shape::Scalar(ScalarKind::Int),
            Value::UInt(_) => Shape::Scalar(ScalarKind::UInt),
            Value::Float(_) => Shape::Scalar(ScalarKind::Float),
            Value::Char(_) => Shape::Scalar(ScalarKind::Char),
            Value::String(_) => Shape::Scalar(ScalarKind::String),
            Value::Enum(value) => Shape::Enum(value.info()),
            Value::List(_) => Shape::List(|| Shape::AnyModel),
            Value::Map(_) => Shape::Map(|| Shape::Scalar(ScalarKind::String), || Shape::AnyModel),
            Value::Model(model) => Shape::Model(model.info()),
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar(kind) => write!(f, "Scalar({kind:?})"),
            Shape::Text => f.write_str("Text"),
            Shape::Enum(info) => write!(f, "Enum({})", info.type_path()),
            Shape::Option(inner) => write!(f, "Option({:?})", inner()),
            Shape::List(item) => write!(f, "List({:?})", item()),
            Shape::Map(key, value) => write!(f, "Map({:?}, {:?})", key(), value()),
            Shape::Model(info) => write!(f, "Model({})", info.type_path()),
            Shape::AnyModel => f.write_str("AnyModel"),
        }
    }
}

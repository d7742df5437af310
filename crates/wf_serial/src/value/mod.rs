//! The value layer.
//!
//! Every member crosses the engine as a [`Value`]. A member type converts to
//! and from it through [`MemberType`], and advertises its declared structure
//! as a [`Shape`] so the reading side knows what to expect before any data
//! arrives.

// -----------------------------------------------------------------------------
// Modules

mod member_type;
mod shape;
mod text;

// -----------------------------------------------------------------------------
// Exports

pub use member_type::MemberType;
pub use shape::{ScalarKind, Shape};
pub use text::{Culture, format_text_value, parse_text_value};

// -----------------------------------------------------------------------------
// Value

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use thiserror::Error;

use crate::model::{EnumInfo, SharedAny};

/// A dynamically typed member value.
///
/// Model values hold a shared handle, so cloning a `Value` never deep-copies
/// a model and equality between two models is identity.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    String(String),
    Enum(EnumValue),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Model(SharedAny),
}

impl Value {
    /// A short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::UInt(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Model(_) => "model",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn as_model(&self) -> Option<&SharedAny> {
        match self {
            Value::Model(model) => Some(model),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Model(a), Value::Model(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

// -----------------------------------------------------------------------------
// EnumValue

/// One variant of a fieldless enum, addressed by declaration index.
#[derive(Clone, Copy)]
pub struct EnumValue {
    info: &'static EnumInfo,
    index: usize,
}

impl EnumValue {
    /// Returns `None` when `index` is not a variant of `info`.
    pub fn new(info: &'static EnumInfo, index: usize) -> Option<Self> {
        (index < info.variants().len()).then_some(Self { info, index })
    }

    /// Looks a variant up by its serialized name.
    pub fn from_name(info: &'static EnumInfo, name: &str) -> Option<Self> {
        info.index_of(name).map(|index| Self { info, index })
    }

    #[inline]
    pub fn info(&self) -> &'static EnumInfo {
        self.info
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.info.variants()[self.index]
    }

    /// Reads a variant of `info` from an enum value, a variant index or a
    /// variant name.
    pub fn from_value(info: &'static EnumInfo, value: Value) -> Result<Self, ValueError> {
        let out_of_range = |value: String| ValueError::OutOfRange {
            value,
            target: info.type_path(),
        };
        let unknown = |name: &str| ValueError::UnknownVariant {
            name: name.into(),
            enum_name: info.type_path(),
        };

        match value {
            Value::Enum(variant) if core::ptr::eq(variant.info, info) => Ok(variant),
            Value::Enum(variant) => {
                Self::from_name(info, variant.name()).ok_or_else(|| unknown(variant.name()))
            }
            Value::Int(index) => usize::try_from(index)
                .ok()
                .and_then(|index| Self::new(info, index))
                .ok_or_else(|| out_of_range(index.to_string())),
            Value::UInt(index) => usize::try_from(index)
                .ok()
                .and_then(|index| Self::new(info, index))
                .ok_or_else(|| out_of_range(index.to_string())),
            Value::String(name) => Self::from_name(info, &name).ok_or_else(|| unknown(&name)),
            other => Err(ValueError::mismatch(info.type_path(), &other)),
        }
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.info, other.info) && self.index == other.index
    }
}

impl fmt::Debug for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.info.type_name(), self.name())
    }
}

// -----------------------------------------------------------------------------
// ValueError

/// A failed conversion between a [`Value`] and a member type.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("value `{value}` is out of range for `{target}`")]
    OutOfRange { value: String, target: &'static str },
    #[error("cannot parse `{text}` as `{target}`")]
    InvalidText { text: String, target: &'static str },
    #[error("`{name}` is not a variant of `{enum_name}`")]
    UnknownVariant {
        name: String,
        enum_name: &'static str,
    },
    #[error("expected a model of type `{expected}`, found `{found}`")]
    ModelType {
        expected: &'static str,
        found: &'static str,
    },
}

impl ValueError {
    #[inline]
    pub(crate) fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.kind_name(),
        }
    }
}

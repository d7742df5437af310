use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::hash::{BuildHasher, Hash};
use std::collections::HashMap;

use crate::model::{Shared, SharedAny, TypedModel, WeakShared};
use crate::value::{ScalarKind, Shape, Value, ValueError};

// -----------------------------------------------------------------------------
// MemberType

/// A type that can be stored in a model member.
///
/// `to_value` and `from_value` must agree: converting a value out and back in
/// yields an equal value. [`shape`](MemberType::shape) describes what
/// `to_value` produces, so a reader can classify an element before decoding it.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be used as a model member",
    note = "nested models are stored as `Shared<T>`, fieldless enums derive `ModelEnum`, \
            and `Display + FromStr` types can use `impl_text_value!`"
)]
pub trait MemberType: Sized + Send + Sync + 'static {
    /// The declared shape of this type.
    fn shape() -> Shape;

    /// Converts `self` into a [`Value`].
    fn to_value(&self) -> Value;

    /// Rebuilds an instance from a [`Value`].
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

// -----------------------------------------------------------------------------
// Primitives

fn out_of_range(value: impl ToString, target: &'static str) -> ValueError {
    ValueError::OutOfRange {
        value: value.to_string(),
        target,
    }
}

macro_rules! impl_integer {
    ($kind:ident, $variant:ident, $wide:ty: $($ty:ty),+) => {
        $(
            impl MemberType for $ty {
                #[inline]
                fn shape() -> Shape {
                    Shape::Scalar(ScalarKind::$kind)
                }

                #[inline]
                fn to_value(&self) -> Value {
                    Value::$variant(*self as $wide)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(v)
                            .map_err(|_| out_of_range(v, stringify!($ty))),
                        Value::UInt(v) => <$ty>::try_from(v)
                            .map_err(|_| out_of_range(v, stringify!($ty))),
                        other => Err(ValueError::mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )+
    };
}

impl_integer!(Int, Int, i64: i8, i16, i32, i64, isize);
impl_integer!(UInt, UInt, u64: u8, u16, u32, u64, usize);

impl MemberType for f64 {
    #[inline]
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Float)
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::UInt(v) => Ok(v as f64),
            other => Err(ValueError::mismatch("f64", &other)),
        }
    }
}

impl MemberType for f32 {
    #[inline]
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Float)
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl MemberType for bool {
    #[inline]
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Bool)
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

impl MemberType for char {
    #[inline]
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::Char)
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Char(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Char(v) => Ok(v),
            Value::String(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(ValueError::InvalidText { text, target: "char" }),
                }
            }
            other => Err(ValueError::mismatch("char", &other)),
        }
    }
}

impl MemberType for String {
    #[inline]
    fn shape() -> Shape {
        Shape::Scalar(ScalarKind::String)
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(v) => Ok(v),
            Value::Char(v) => Ok(v.to_string()),
            other => Err(ValueError::mismatch("string", &other)),
        }
    }
}

// -----------------------------------------------------------------------------
// Containers

impl<T: MemberType> MemberType for Option<T> {
    #[inline]
    fn shape() -> Shape {
        Shape::Option(T::shape)
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn collect_list<C: FromIterator<T>, T: MemberType>(value: Value) -> Result<C, ValueError> {
    match value {
        Value::List(items) => items.into_iter().map(T::from_value).collect(),
        other => Err(ValueError::mismatch("list", &other)),
    }
}

fn collect_map<C: FromIterator<(K, V)>, K: MemberType, V: MemberType>(
    value: Value,
) -> Result<C, ValueError> {
    match value {
        Value::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| -> Result<(K, V), ValueError> {
                Ok((K::from_value(k)?, V::from_value(v)?))
            })
            .collect(),
        other => Err(ValueError::mismatch("map", &other)),
    }
}

impl<T: MemberType> MemberType for Vec<T> {
    #[inline]
    fn shape() -> Shape {
        Shape::List(T::shape)
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        collect_list::<Self, T>(value)
    }
}

impl<T: MemberType> MemberType for VecDeque<T> {
    #[inline]
    fn shape() -> Shape {
        Shape::List(T::shape)
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        collect_list::<Self, T>(value)
    }
}

impl<K: MemberType + Ord, V: MemberType> MemberType for BTreeMap<K, V> {
    #[inline]
    fn shape() -> Shape {
        Shape::Map(K::shape, V::shape)
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        collect_map::<Self, K, V>(value)
    }
}

impl<K, V, S> MemberType for HashMap<K, V, S>
where
    K: MemberType + Eq + Hash,
    V: MemberType,
    S: BuildHasher + Default + Send + Sync + 'static,
{
    #[inline]
    fn shape() -> Shape {
        Shape::Map(K::shape, V::shape)
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        collect_map::<Self, K, V>(value)
    }
}

// -----------------------------------------------------------------------------
// Models

impl<T: TypedModel> MemberType for Shared<T> {
    #[inline]
    fn shape() -> Shape {
        Shape::Model(T::type_info())
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Model(self.to_any())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Model(model) => model.downcast::<T>().ok_or(ValueError::ModelType {
                expected: T::type_info().type_path(),
                found: model.info().type_path(),
            }),
            other => Err(ValueError::mismatch(T::type_info().type_path(), &other)),
        }
    }
}

impl<T: TypedModel> MemberType for WeakShared<T> {
    #[inline]
    fn shape() -> Shape {
        Shape::Option(<Shared<T> as MemberType>::shape)
    }

    fn to_value(&self) -> Value {
        match self.upgrade() {
            Some(shared) => shared.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(WeakShared::new()),
            other => Shared::<T>::from_value(other).map(|shared| shared.downgrade()),
        }
    }
}

impl MemberType for SharedAny {
    #[inline]
    fn shape() -> Shape {
        Shape::AnyModel
    }

    #[inline]
    fn to_value(&self) -> Value {
        Value::Model(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Model(model) => Ok(model),
            other => Err(ValueError::mismatch("model", &other)),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    use super::MemberType;
    use crate::value::{Value, ValueError};

    #[test]
    fn integers_check_range() {
        assert_eq!(u8::from_value(Value::Int(200)), Ok(200));
        assert!(matches!(
            u8::from_value(Value::Int(300)),
            Err(ValueError::OutOfRange { target: "u8", .. })
        ));
        assert!(matches!(
            u32::from_value(Value::Int(-1)),
            Err(ValueError::OutOfRange { .. })
        ));
        assert_eq!(i16::from_value(Value::UInt(12)), Ok(12));
    }

    #[test]
    fn mismatched_value_names_both_sides() {
        let err = bool::from_value(Value::String("yes".into())).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: "bool",
                found: "string"
            }
        );
    }

    #[test]
    fn containers_convert_elementwise() {
        let list = vec![Some(1_i32), None, Some(3)];
        let value = list.to_value();
        assert_eq!(
            value,
            Value::List(vec![Value::Int(1), Value::Null, Value::Int(3)])
        );
        assert_eq!(Vec::<Option<i32>>::from_value(value), Ok(list));

        let mut map = BTreeMap::new();
        map.insert(String::from("a"), 1.5_f64);
        let value = map.to_value();
        assert_eq!(BTreeMap::<String, f64>::from_value(value), Ok(map));
    }

    #[test]
    fn failing_element_fails_the_list() {
        let value = Value::List(vec![Value::Int(1), Value::String("x".into())]);
        assert!(Vec::<i64>::from_value(value).is_err());
    }
}

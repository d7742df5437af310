use alloc::string::{String, ToString};
use core::any::type_name;
use core::fmt::Display;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::{ScalarKind, Value, ValueError};

// -----------------------------------------------------------------------------
// Culture

/// Formatting settings for scalar-to-text conversion.
///
/// Only the decimal separator varies; every other scalar has a single text form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Culture {
    pub name: String,
    pub decimal_separator: char,
}

impl Culture {
    /// The culture-independent form: `.` as decimal separator.
    pub fn invariant() -> Self {
        Self {
            name: String::from("invariant"),
            decimal_separator: '.',
        }
    }

    pub fn new(name: impl Into<String>, decimal_separator: char) -> Self {
        Self {
            name: name.into(),
            decimal_separator,
        }
    }
}

impl Default for Culture {
    #[inline]
    fn default() -> Self {
        Self::invariant()
    }
}

// -----------------------------------------------------------------------------
// Scalar text

impl ScalarKind {
    /// Formats a scalar value as text under `culture`.
    pub fn format_text(self, value: &Value, culture: &Culture) -> Result<String, ValueError> {
        Ok(match (self, value) {
            (ScalarKind::Bool, Value::Bool(v)) => v.to_string(),
            (ScalarKind::Int, Value::Int(v)) => v.to_string(),
            (ScalarKind::UInt, Value::UInt(v)) => v.to_string(),
            (ScalarKind::Float, Value::Float(v)) => {
                let text = v.to_string();
                if culture.decimal_separator == '.' {
                    text
                } else {
                    text.replace('.', culture.decimal_separator.encode_utf8(&mut [0; 4]))
                }
            }
            (ScalarKind::Char, Value::Char(v)) => v.to_string(),
            (ScalarKind::String, Value::String(v)) => v.clone(),
            (kind, other) => return Err(ValueError::mismatch(kind.name(), other)),
        })
    }

    /// Parses text produced by [`format_text`](Self::format_text) under the same culture.
    pub fn parse_text(self, text: &str, culture: &Culture) -> Result<Value, ValueError> {
        let invalid = || ValueError::InvalidText {
            text: text.to_string(),
            target: self.name(),
        };
        match self {
            ScalarKind::Bool => {
                if text.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(invalid())
                }
            }
            ScalarKind::Int => text.trim().parse().map(Value::Int).map_err(|_| invalid()),
            ScalarKind::UInt => text.trim().parse().map(Value::UInt).map_err(|_| invalid()),
            ScalarKind::Float => {
                let normalized = if culture.decimal_separator == '.' {
                    text.trim().to_string()
                } else {
                    text.trim().replace(culture.decimal_separator, ".")
                };
                normalized.parse().map(Value::Float).map_err(|_| invalid())
            }
            ScalarKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(invalid()),
                }
            }
            ScalarKind::String => Ok(Value::String(text.to_string())),
        }
    }
}

// -----------------------------------------------------------------------------
// Text types

/// Converts a `Display` type into its text [`Value`].
///
/// Used by [`impl_text_value!`](crate::impl_text_value).
#[inline]
pub fn format_text_value<T: Display>(value: &T) -> Value {
    Value::String(value.to_string())
}

/// Parses a text [`Value`] through `FromStr`.
pub fn parse_text_value<T: FromStr>(value: Value) -> Result<T, ValueError> {
    match value {
        Value::String(text) => text.parse().map_err(|_| ValueError::InvalidText {
            text,
            target: type_name::<T>(),
        }),
        other => Err(ValueError::mismatch("text", &other)),
    }
}

/// Implements [`MemberType`](crate::value::MemberType) for types that
/// round-trip through `Display` and `FromStr`.
///
/// Such members always travel as text, whatever the backend.
///
/// ```
/// use core::fmt;
/// use core::str::FromStr;
/// use wf_serial::value::{MemberType, Value};
///
/// #[derive(Debug, PartialEq)]
/// struct Version(u32, u32);
///
/// impl fmt::Display for Version {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "{}.{}", self.0, self.1)
///     }
/// }
///
/// impl FromStr for Version {
///     type Err = ();
///     fn from_str(s: &str) -> Result<Self, ()> {
///         let (a, b) = s.split_once('.').ok_or(())?;
///         Ok(Version(a.parse().map_err(|_| ())?, b.parse().map_err(|_| ())?))
///     }
/// }
///
/// wf_serial::impl_text_value!(Version);
///
/// assert_eq!(Version(1, 2).to_value(), Value::from("1.2"));
/// assert_eq!(Version::from_value(Value::from("3.4")), Ok(Version(3, 4)));
/// ```
#[macro_export]
macro_rules! impl_text_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::value::MemberType for $ty {
                fn shape() -> $crate::value::Shape {
                    $crate::value::Shape::Text
                }

                fn to_value(&self) -> $crate::value::Value {
                    $crate::value::format_text_value(self)
                }

                fn from_value(
                    value: $crate::value::Value,
                ) -> ::core::result::Result<Self, $crate::value::ValueError> {
                    $crate::value::parse_text_value(value)
                }
            }
        )+
    };
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::Culture;
    use crate::value::{ScalarKind, Value};

    #[test]
    fn float_text_follows_culture() {
        let comma = Culture::new("nl-NL", ',');
        let text = ScalarKind::Float.format_text(&Value::Float(2.5), &comma).unwrap();
        assert_eq!(text, "2,5");
        assert_eq!(
            ScalarKind::Float.parse_text(&text, &comma).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            ScalarKind::Float
                .format_text(&Value::Float(2.5), &Culture::invariant())
                .unwrap(),
            "2.5"
        );
    }

    #[test]
    fn scalar_text_rejects_garbage() {
        let culture = Culture::invariant();
        assert!(ScalarKind::Int.parse_text("12a", &culture).is_err());
        assert!(ScalarKind::Char.parse_text("ab", &culture).is_err());
        assert_eq!(
            ScalarKind::Bool.parse_text("True", &culture).unwrap(),
            Value::Bool(true)
        );
        assert!(
            ScalarKind::Int
                .format_text(&Value::String("x".into()), &culture)
                .is_err()
        );
    }
}

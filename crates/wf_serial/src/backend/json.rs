use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use std::io;

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value as Json};
use thiserror::Error;

use crate::backend::{Backend, ModelElement, ModelHeader, nesting_limit};
use crate::context::SerializationContext;
use crate::error::DecodeError;
use crate::reference::GraphId;
use crate::serializer::MemberValue;
use crate::value::{ScalarKind, Value, ValueError};

const TYPE_KEY: &str = "$type";
const ID_KEY: &str = "$id";
const REF_KEY: &str = "$ref";

const NAN: &str = "NaN";
const INFINITY: &str = "inf";
const NEG_INFINITY: &str = "-inf";

// -----------------------------------------------------------------------------
// Settings and errors

/// JSON output settings, read from the configuration extensions.
///
/// ```
/// use wf_serial::backend::JsonSettings;
/// use wf_serial::config::SerializationConfiguration;
///
/// let config = SerializationConfiguration::new().with_extension(JsonSettings { pretty: true });
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonSettings {
    pub pretty: bool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JsonError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("`{0}` values cannot be encoded as a JSON scalar")]
    NotScalar(&'static str),
}

// -----------------------------------------------------------------------------
// JsonBackend

/// A backend producing JSON documents.
///
/// - A model is an object carrying `"$type"` and `"$id"`, then its members
///   keyed by serialization name.
/// - A repeated instance is `{"$ref": id}`.
/// - Sequences are arrays; dictionaries are arrays of `[key, value]` pairs.
/// - Non-finite floats are written as `"NaN"`, `"inf"` and `"-inf"`.
#[derive(Debug, Clone, Default)]
pub struct JsonBackend {
    settings: JsonSettings,
}

impl JsonBackend {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings used when the configuration carries none.
    #[inline]
    pub fn with_settings(settings: JsonSettings) -> Self {
        Self { settings }
    }

    fn settings(&self, ctx: &SerializationContext<'_>) -> JsonSettings {
        ctx.extension::<JsonSettings>()
            .copied()
            .unwrap_or(self.settings)
    }
}

fn kind_of(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn unexpected(expected: &'static str, found: &Json) -> DecodeError {
    DecodeError::UnexpectedElement {
        expected,
        found: kind_of(found),
    }
}

fn parse_graph_id(json: &Json) -> Result<GraphId, DecodeError> {
    json.as_u64()
        .and_then(|raw| u32::try_from(raw).ok())
        .map(GraphId::from_raw)
        .ok_or_else(|| unexpected("graph id", json))
}

fn out_of_range(number: &Number, target: &'static str) -> DecodeError {
    DecodeError::Value(ValueError::OutOfRange {
        value: number.to_string(),
        target,
    })
}

impl Backend for JsonBackend {
    type Element = Json;
    type Writer = Map<String, Json>;
    type Reader = Map<String, Json>;
    type Error = JsonError;

    fn close_sink(
        &mut self,
        ctx: &SerializationContext<'_>,
        root: Json,
        sink: &mut dyn io::Write,
    ) -> Result<(), JsonError> {
        if self.settings(ctx).pretty {
            serde_json::to_writer_pretty(&mut *sink, &root)?;
            sink.write_all(b"\n")?;
        } else {
            serde_json::to_writer(&mut *sink, &root)?;
        }
        sink.flush()?;
        Ok(())
    }

    fn begin_model(
        &mut self,
        _ctx: &SerializationContext<'_>,
        header: &ModelHeader,
    ) -> Result<Self::Writer, JsonError> {
        let mut object = Map::new();
        if let Some(type_path) = &header.type_path {
            object.insert(TYPE_KEY.into(), Json::String(type_path.clone()));
        }
        if let Some(id) = header.graph_id {
            object.insert(ID_KEY.into(), Json::from(id.get()));
        }
        Ok(object)
    }

    fn write_member(
        &mut self,
        _ctx: &SerializationContext<'_>,
        writer: &mut Self::Writer,
        member: &MemberValue,
        element: Json,
    ) -> Result<(), JsonError> {
        writer.insert(member.serialization_name.into(), element);
        Ok(())
    }

    fn end_model(
        &mut self,
        _ctx: &SerializationContext<'_>,
        writer: Self::Writer,
    ) -> Result<Json, JsonError> {
        Ok(Json::Object(writer))
    }

    fn encode_scalar(
        &mut self,
        _ctx: &SerializationContext<'_>,
        value: &Value,
    ) -> Result<Json, JsonError> {
        Ok(match value {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Int(v) => Json::from(*v),
            Value::UInt(v) => Json::from(*v),
            Value::Float(v) => match Number::from_f64(*v) {
                Some(number) => Json::Number(number),
                None if v.is_nan() => Json::String(NAN.into()),
                None if v.is_sign_positive() => Json::String(INFINITY.into()),
                None => Json::String(NEG_INFINITY.into()),
            },
            Value::Char(v) => Json::String(v.to_string()),
            Value::String(v) => Json::String(v.clone()),
            other => return Err(JsonError::NotScalar(other.kind_name())),
        })
    }

    fn encode_reference(
        &mut self,
        _ctx: &SerializationContext<'_>,
        id: GraphId,
    ) -> Result<Json, JsonError> {
        let mut object = Map::new();
        object.insert(REF_KEY.into(), Json::from(id.get()));
        Ok(Json::Object(object))
    }

    fn encode_sequence(
        &mut self,
        _ctx: &SerializationContext<'_>,
        items: Vec<Json>,
    ) -> Result<Json, JsonError> {
        Ok(Json::Array(items))
    }

    fn encode_dictionary(
        &mut self,
        _ctx: &SerializationContext<'_>,
        entries: Vec<(Json, Json)>,
    ) -> Result<Json, JsonError> {
        Ok(Json::Array(
            entries
                .into_iter()
                .map(|(key, value)| Json::Array(vec![key, value]))
                .collect(),
        ))
    }

    fn open_source(
        &mut self,
        ctx: &SerializationContext<'_>,
        source: &mut dyn io::Read,
    ) -> Result<Json, JsonError> {
        let mut de = serde_json::Deserializer::from_reader(io::BufReader::new(source));
        // Nesting is bounded by the seed instead.
        de.disable_recursion_limit();

        let seed = JsonSeed {
            remaining: nesting_limit(ctx),
        };
        let root = seed.deserialize(&mut de)?;
        de.end()?;
        Ok(root)
    }

    fn read_model(
        &mut self,
        _ctx: &SerializationContext<'_>,
        element: Json,
    ) -> Result<ModelElement<Self::Reader>, DecodeError> {
        let mut object = match element {
            Json::Object(object) => object,
            other => return Err(unexpected("object", &other)),
        };

        if let Some(id) = object.get(REF_KEY) {
            return parse_graph_id(id).map(ModelElement::Reference);
        }

        let type_path = match object.remove(TYPE_KEY) {
            Some(Json::String(type_path)) => Some(type_path),
            Some(other) => return Err(unexpected("type path", &other)),
            None => None,
        };
        let graph_id = object
            .remove(ID_KEY)
            .as_ref()
            .map(parse_graph_id)
            .transpose()?;

        Ok(ModelElement::Model {
            header: ModelHeader {
                type_path,
                graph_id,
            },
            reader: object,
        })
    }

    fn read_member(
        &mut self,
        _ctx: &SerializationContext<'_>,
        reader: &mut Self::Reader,
        name: &str,
    ) -> Option<Json> {
        reader.remove(name)
    }

    #[inline]
    fn is_null(&self, element: &Json) -> bool {
        element.is_null()
    }

    fn decode_scalar(
        &mut self,
        _ctx: &SerializationContext<'_>,
        element: Json,
        kind: ScalarKind,
    ) -> Result<Value, DecodeError> {
        let found = kind_of(&element);
        let mismatch = || DecodeError::UnexpectedElement {
            expected: kind.name(),
            found,
        };
        match (kind, element) {
            (ScalarKind::Bool, Json::Bool(v)) => Ok(Value::Bool(v)),
            (ScalarKind::Int, Json::Number(n)) => match n.as_i64() {
                Some(v) => Ok(Value::Int(v)),
                None if n.is_u64() => Err(out_of_range(&n, "i64")),
                None => Err(mismatch()),
            },
            (ScalarKind::UInt, Json::Number(n)) => match n.as_u64() {
                Some(v) => Ok(Value::UInt(v)),
                None if n.is_i64() => Err(out_of_range(&n, "u64")),
                None => Err(mismatch()),
            },
            (ScalarKind::Float, Json::Number(n)) => n.as_f64().map(Value::Float).ok_or_else(mismatch),
            (ScalarKind::Float, Json::String(text)) => match text.as_str() {
                NAN => Ok(Value::Float(f64::NAN)),
                INFINITY => Ok(Value::Float(f64::INFINITY)),
                NEG_INFINITY => Ok(Value::Float(f64::NEG_INFINITY)),
                _ => Err(mismatch()),
            },
            (ScalarKind::Char, Json::String(text)) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(mismatch()),
                }
            }
            (ScalarKind::String, Json::String(text)) => Ok(Value::String(text)),
            _ => Err(mismatch()),
        }
    }

    fn decode_sequence(
        &mut self,
        _ctx: &SerializationContext<'_>,
        element: Json,
    ) -> Result<Vec<Json>, DecodeError> {
        match element {
            Json::Array(items) => Ok(items),
            other => Err(unexpected("array", &other)),
        }
    }

    fn decode_dictionary(
        &mut self,
        _ctx: &SerializationContext<'_>,
        element: Json,
    ) -> Result<Vec<(Json, Json)>, DecodeError> {
        match element {
            Json::Array(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    Json::Array(pair) => match <[Json; 2]>::try_from(pair) {
                        Ok([key, value]) => Ok((key, value)),
                        Err(pair) => Err(unexpected("[key, value] pair", &Json::Array(pair))),
                    },
                    other => Err(unexpected("[key, value] pair", &other)),
                })
                .collect(),
            // Hand-written documents may use plain objects for string-keyed maps.
            Json::Object(object) => Ok(object
                .into_iter()
                .map(|(key, value)| (Json::String(key), value))
                .collect()),
            other => Err(unexpected("array of pairs", &other)),
        }
    }
}

// -----------------------------------------------------------------------------
// Reading

/// Reads one JSON value, allowing `remaining` more array or object levels.
#[derive(Clone, Copy)]
struct JsonSeed {
    remaining: usize,
}

impl JsonSeed {
    fn nested<E: de::Error>(self) -> Result<Self, E> {
        match self.remaining.checked_sub(1) {
            Some(remaining) => Ok(JsonSeed { remaining }),
            None => Err(E::custom("element nesting is too deep")),
        }
    }
}

impl<'de> DeserializeSeed<'de> for JsonSeed {
    type Value = Json;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Json, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for JsonSeed {
    type Value = Json;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Json, E> {
        Ok(Json::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Json, E> {
        Ok(Json::Number(v.into()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Json, E> {
        Ok(Json::Number(v.into()))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Json, E> {
        Ok(Number::from_f64(v).map_or(Json::Null, Json::Number))
    }

    fn visit_str<E>(self, v: &str) -> Result<Json, E> {
        Ok(Json::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Json, E> {
        Ok(Json::String(v))
    }

    fn visit_unit<E>(self) -> Result<Json, E> {
        Ok(Json::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Json, A::Error> {
        let child = self.nested::<A::Error>()?;
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(child)? {
            items.push(item);
        }
        Ok(Json::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Json, A::Error> {
        let child = self.nested::<A::Error>()?;
        let mut object = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(child)?;
            object.insert(key, value);
        }
        Ok(Json::Object(object))
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{JsonBackend, JsonError};
    use crate::backend::{Backend, ModelElement, ModelHeader};
    use crate::config::SerializationConfiguration;
    use crate::context::{SerializationContext, SerializationMode};
    use crate::error::DecodeError;
    use crate::reference::GraphId;
    use crate::value::{ScalarKind, Value};

    #[test]
    fn non_finite_floats_round_trip_as_text() {
        let config = SerializationConfiguration::default();
        let ctx = SerializationContext::new(SerializationMode::Serialize, &config);
        let mut backend = JsonBackend::new();

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let element = backend.encode_scalar(&ctx, &Value::Float(value)).unwrap();
            assert!(element.is_string());
            let Value::Float(back) = backend
                .decode_scalar(&ctx, element, ScalarKind::Float)
                .unwrap()
            else {
                panic!("not a float");
            };
            assert_eq!(back.is_nan(), value.is_nan());
            if !value.is_nan() {
                assert_eq!(back, value);
            }
        }
    }

    #[test]
    fn header_and_reference_framing() {
        let config = SerializationConfiguration::default();
        let ctx = SerializationContext::new(SerializationMode::Deserialize, &config);
        let mut backend = JsonBackend::new();

        let element = json!({ "$type": "app::Node", "$id": 3, "name": "n" });
        let ModelElement::Model { header, mut reader } =
            backend.read_model(&ctx, element).unwrap()
        else {
            panic!("expected a model");
        };
        assert_eq!(
            header,
            ModelHeader {
                type_path: Some("app::Node".into()),
                graph_id: Some(GraphId::from_raw(3)),
            }
        );
        assert_eq!(backend.read_member(&ctx, &mut reader, "name"), Some(json!("n")));
        assert_eq!(backend.read_member(&ctx, &mut reader, "name"), None);

        let reference = backend.read_model(&ctx, json!({ "$ref": 3 })).unwrap();
        assert!(matches!(reference, ModelElement::Reference(id) if id.get() == 3));

        assert!(matches!(
            backend.read_model(&ctx, json!([1, 2])),
            Err(DecodeError::UnexpectedElement { expected: "object", found: "array" })
        ));
    }

    #[test]
    fn scalar_kind_mismatch_is_a_decode_error() {
        let config = SerializationConfiguration::default();
        let ctx = SerializationContext::new(SerializationMode::Deserialize, &config);
        let mut backend = JsonBackend::new();

        assert!(backend.decode_scalar(&ctx, json!("12"), ScalarKind::Int).is_err());
        assert!(backend.decode_scalar(&ctx, json!(-1), ScalarKind::UInt).is_err());
        assert_eq!(
            backend.decode_scalar(&ctx, json!("x"), ScalarKind::Char).unwrap(),
            Value::Char('x')
        );
    }

    fn nested_arrays(levels: usize) -> String {
        format!("{}{}", "[".repeat(levels), "]".repeat(levels))
    }

    #[test]
    fn nesting_is_bounded_by_max_depth() {
        let config = SerializationConfiguration::default().with_max_depth(1);
        let ctx = SerializationContext::new(SerializationMode::Deserialize, &config);
        let mut backend = JsonBackend::new();

        let shallow = nested_arrays(10);
        assert!(backend.open_source(&ctx, &mut shallow.as_bytes()).is_ok());

        let deep = nested_arrays(40);
        let result = backend.open_source(&ctx, &mut deep.as_bytes());
        assert!(matches!(result, Err(JsonError::Json(_))));
    }

    fn on_large_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn nesting_beyond_the_parser_default_is_accepted() {
        let levels = on_large_stack(|| {
            let config = SerializationConfiguration::default();
            let ctx = SerializationContext::new(SerializationMode::Deserialize, &config);

            let document = nested_arrays(300);
            let mut root = JsonBackend::new()
                .open_source(&ctx, &mut document.as_bytes())
                .unwrap();
            let mut levels = 0;
            while let serde_json::Value::Array(mut items) = root {
                levels += 1;
                root = items.pop().unwrap_or(serde_json::Value::Null);
            }
            levels
        });
        assert_eq!(levels, 300);
    }

    #[test]
    fn hostile_nesting_is_an_error() {
        let rejected = on_large_stack(|| {
            let config = SerializationConfiguration::default();
            let ctx = SerializationContext::new(SerializationMode::Deserialize, &config);

            let document = "[".repeat(100_000);
            let result = JsonBackend::new().open_source(&ctx, &mut document.as_bytes());
            matches!(result, Err(JsonError::Json(_)))
        });
        assert!(rejected);
    }
}

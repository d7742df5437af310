use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::backend::{Backend, ModelElement};
use crate::catalog::{CatalogEntry, CatalogMember};
use crate::context::{Frame, SerializationContext};
use crate::error::{DecodeError, SerializeError};
use crate::model::{EnumInfo, Model, ModelInfo, SharedAny};
use crate::modifier::ModifierPipeline;
use crate::serializer::{MemberValue, SerializationServices, classify};
use crate::value::{EnumValue, ScalarKind, Shape, Value, ValueError};

/// Where a decoded member value goes.
#[derive(Clone, Copy)]
enum Target {
    Custom,
    Member(CatalogMember),
}

// -----------------------------------------------------------------------------
// ReadDriver

/// Rebuilds a graph from backend elements.
///
/// Children are decoded while no lock is held on the parent; the parent is
/// then locked once to store every decoded value. A back-reference to a
/// parent still being read therefore never blocks.
pub(crate) struct ReadDriver<'s, B: Backend> {
    pub backend: &'s mut B,
    pub services: &'s SerializationServices,
}

impl<B: Backend> ReadDriver<'_, B> {
    /// Reads a model element into a new instance, or resolves a back-reference.
    ///
    /// `declared` is `Shape::Model` or `Shape::AnyModel`.
    pub fn read_model(
        &mut self,
        ctx: &mut SerializationContext<'_>,
        element: B::Element,
        declared: Shape,
        slot: Option<&MemberValue>,
    ) -> Result<Result<SharedAny, DecodeError>, SerializeError> {
        let (header, mut reader) = match self.backend.read_model(ctx, element) {
            Ok(ModelElement::Reference(id)) => {
                let instance = ctx
                    .references()
                    .instance(id)
                    .cloned()
                    .ok_or(SerializeError::UnknownReference(id))?;
                return Ok(fits(declared, instance));
            }
            Ok(ModelElement::Model { header, reader }) => (header, reader),
            Err(reason) => return Ok(Err(reason)),
        };

        let info = match self.resolve(declared, header.type_path.as_deref()) {
            Ok(info) => info,
            Err(reason) => return Ok(Err(reason)),
        };

        let mut scope = ctx.enter(Frame::model(info, header.graph_id))?;
        let ctx = &mut *scope;

        let Some(instance) = self.backend.create_model_instance(ctx, info) else {
            return Ok(Err(DecodeError::Activation(info.type_path())));
        };
        if let Some(id) = header.graph_id {
            ctx.references_mut().register_manually(id, instance.clone())?;
        }

        let pipeline = self.services.modifiers().pipeline(info);
        let entry = self.services.catalog().entry(info);

        let plan = instance.write_with(|model| -> Result<Vec<(Target, MemberValue)>, SerializeError> {
            if let Some(callbacks) = model.callbacks_mut() {
                callbacks.start_deserialization();
            }
            pipeline.on_deserializing(ctx, model)?;
            Ok(plan_members(ctx, &pipeline, &entry, model, slot))
        })?;

        let mut decoded = Vec::with_capacity(plan.len());
        for (target, mut member) in plan {
            let Some(element) = self
                .backend
                .read_member(ctx, &mut reader, member.serialization_name)
            else {
                continue;
            };

            match self.decode(ctx, &pipeline, &member, member.shape, element)? {
                Ok(value) => {
                    member.set_value(value);
                    pipeline.deserialize_member(ctx, &mut member)?;
                    member.refresh_actual_type();
                    decoded.push((target, member));
                }
                Err(reason) => {
                    ctx.record_failure(info.type_path(), member.serialization_name, reason);
                }
            }
        }

        instance.write_with(|model| -> Result<(), SerializeError> {
            for (target, member) in &decoded {
                let stored = match target {
                    Target::Custom => match model.custom_serialization_mut() {
                        Some(custom) => custom.load(member.value.clone()),
                        None => Ok(()),
                    },
                    Target::Member(catalog_member) => catalog_member.write(model, member.value.clone()),
                };
                match stored {
                    Ok(()) => pipeline.member_deserialized(ctx, member)?,
                    Err(error) => {
                        ctx.record_failure(info.type_path(), member.serialization_name, error.into());
                    }
                }
            }
            pipeline.on_deserialized(ctx, model)?;
            if let Some(callbacks) = model.callbacks_mut() {
                callbacks.finish_deserialization();
            }
            Ok(())
        })?;

        log::trace!("read `{}` with {} members", info.type_path(), decoded.len());
        Ok(Ok(instance))
    }

    /// Reads the single member of a root value. Any failure is fatal, since
    /// there is nothing to return without it.
    pub fn read_root_value(
        &mut self,
        ctx: &mut SerializationContext<'_>,
        element: B::Element,
        member: &MemberValue,
    ) -> Result<Value, SerializeError> {
        let mut scope = ctx.enter(Frame::value(member.model_type))?;
        let ctx = &mut *scope;

        let mut reader = match self
            .backend
            .read_model(ctx, element)
            .map_err(SerializeError::MalformedRoot)?
        {
            ModelElement::Model { reader, .. } => reader,
            ModelElement::Reference(id) => return Err(SerializeError::UnknownReference(id)),
        };

        let Some(element) = self
            .backend
            .read_member(ctx, &mut reader, member.serialization_name)
        else {
            return Err(SerializeError::MalformedRoot(DecodeError::Custom(format!(
                "root value has no `{}` member",
                member.serialization_name
            ))));
        };

        let pipeline = ModifierPipeline::default();
        self.decode(ctx, &pipeline, member, member.shape, element)?
            .map_err(SerializeError::MalformedRoot)
    }

    /// Picks the concrete type of a model element.
    fn resolve(
        &self,
        declared: Shape,
        type_path: Option<&str>,
    ) -> Result<&'static ModelInfo, DecodeError> {
        let expected = match declared {
            Shape::Model(info) => Some(info),
            _ => None,
        };

        let Some(type_path) = type_path else {
            return expected
                .ok_or_else(|| DecodeError::Custom("model element carries no type path".into()));
        };

        if let Some(expected) = expected
            && expected.type_path() == type_path
        {
            return Ok(expected);
        }

        let found = self
            .services
            .registry()
            .read()
            .resolve(type_path)
            .ok_or_else(|| DecodeError::UnknownType(type_path.into()))?;

        match expected {
            Some(expected) if !found.is_subtype_of(expected) => Err(DecodeError::TypeMismatch {
                expected: expected.type_path(),
                found: found.type_path().into(),
            }),
            _ => Ok(found),
        }
    }

    /// Decodes one element of `member` according to `shape`.
    fn decode(
        &mut self,
        ctx: &mut SerializationContext<'_>,
        pipeline: &ModifierPipeline,
        member: &MemberValue,
        shape: Shape,
        element: B::Element,
    ) -> Result<Result<Value, DecodeError>, SerializeError> {
        if self.backend.is_null(&element) {
            return Ok(match shape {
                Shape::Option(_) => Ok(Value::Null),
                _ => Err(DecodeError::UnexpectedElement {
                    expected: shape.describe(),
                    found: "null",
                }),
            });
        }

        Ok(match shape.unwrap_option() {
            Shape::Scalar(kind) => {
                if classify::using_parse(ctx, pipeline, member) {
                    self.text(ctx, member, element)
                        .and_then(|text| {
                            kind.parse_text(&text, &ctx.configuration().culture)
                                .map_err(DecodeError::from)
                        })
                } else {
                    self.backend.decode_scalar(ctx, element, kind)
                }
            }
            Shape::Text => self.text(ctx, member, element).map(Value::String),
            Shape::Enum(info) => self.decode_enum(ctx, pipeline, member, info, element),
            Shape::List(item) => {
                let item = item();
                let items = match self.backend.decode_sequence(ctx, element) {
                    Ok(items) => items,
                    Err(reason) => return Ok(Err(reason)),
                };
                let mut values = Vec::with_capacity(items.len());
                for (index, element) in items.into_iter().enumerate() {
                    match self.decode(ctx, pipeline, member, item, element)? {
                        Ok(value) => values.push(value),
                        Err(reason) => ctx.record_failure(
                            member.model_type,
                            format!("{}[{index}]", member.serialization_name),
                            reason,
                        ),
                    }
                }
                Ok(Value::List(values))
            }
            Shape::Map(key, value) => {
                let (key_shape, value_shape) = (key(), value());
                let entries = match self.backend.decode_dictionary(ctx, element) {
                    Ok(entries) => entries,
                    Err(reason) => return Ok(Err(reason)),
                };
                let mut values = Vec::with_capacity(entries.len());
                for (index, (key, value)) in entries.into_iter().enumerate() {
                    let key = self.decode(ctx, pipeline, member, key_shape, key)?;
                    let value = self.decode(ctx, pipeline, member, value_shape, value)?;
                    match key.and_then(|key| value.map(|value| (key, value))) {
                        Ok(entry) => values.push(entry),
                        Err(reason) => ctx.record_failure(
                            member.model_type,
                            format!("{}[{index}]", member.serialization_name),
                            reason,
                        ),
                    }
                }
                Ok(Value::Map(values))
            }
            declared @ (Shape::Model(_) | Shape::AnyModel) => self
                .read_model(ctx, element, declared, Some(member))?
                .map(Value::Model),
            Shape::Option(_) => unreachable!("option layers are unwrapped"),
        })
    }

    fn text(
        &mut self,
        ctx: &SerializationContext<'_>,
        member: &MemberValue,
        element: B::Element,
    ) -> Result<String, DecodeError> {
        match self.backend.decode_scalar(ctx, element, ScalarKind::String) {
            Ok(Value::String(text)) => Ok(text),
            _ => Err(DecodeError::MissingText(member.serialization_name)),
        }
    }

    fn decode_enum(
        &mut self,
        ctx: &SerializationContext<'_>,
        pipeline: &ModifierPipeline,
        member: &MemberValue,
        info: &'static EnumInfo,
        element: B::Element,
    ) -> Result<Value, DecodeError> {
        if classify::enum_as_string(ctx, pipeline, member, info) {
            let name = self.text(ctx, member, element)?;
            return match EnumValue::from_name(info, &name) {
                Some(variant) => Ok(Value::Enum(variant)),
                None => Err(ValueError::UnknownVariant {
                    name,
                    enum_name: info.type_path(),
                }
                .into()),
            };
        }

        let index = match self.backend.decode_scalar(ctx, element, ScalarKind::Int)? {
            Value::Int(index) => index,
            other => return Err(ValueError::mismatch("integer", &other).into()),
        };
        usize::try_from(index)
            .ok()
            .and_then(|index| EnumValue::new(info, index))
            .map(Value::Enum)
            .ok_or_else(|| {
                ValueError::OutOfRange {
                    value: index.to_string(),
                    target: info.type_path(),
                }
                .into()
            })
    }
}

// -----------------------------------------------------------------------------
// Planning

/// Checks that an already materialized instance fits the declared slot.
fn fits(declared: Shape, instance: SharedAny) -> Result<SharedAny, DecodeError> {
    match declared {
        Shape::Model(expected) if !instance.info().is_subtype_of(expected) => {
            Err(DecodeError::TypeMismatch {
                expected: expected.type_path(),
                found: instance.info().type_path().into(),
            })
        }
        _ => Ok(instance),
    }
}

/// The members to read into `model`, with their current values.
fn plan_members(
    ctx: &SerializationContext<'_>,
    pipeline: &ModifierPipeline,
    entry: &CatalogEntry,
    model: &dyn Model,
    slot: Option<&MemberValue>,
) -> Vec<(Target, MemberValue)> {
    let info = entry.info();

    if let Some(custom) = model.custom_serialization() {
        return vec![(Target::Custom, MemberValue::custom(info, custom.shape(), Value::Null))];
    }

    let members: Vec<(Target, MemberValue)> = match classify::items_member(ctx, entry, pipeline, slot) {
        Some((items, group)) => vec![(
            Target::Member(*items),
            MemberValue::from_catalog(info, items, items.read(model)).with_group(group),
        )],
        None => entry
            .members_to_serialize()
            .map(|member| {
                (
                    Target::Member(*member),
                    MemberValue::from_catalog(info, member, member.read(model)),
                )
            })
            .collect(),
    };

    members
        .into_iter()
        .filter(|(_, member)| !pipeline.should_ignore_member(ctx, model, member))
        .collect()
}

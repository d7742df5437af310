use alloc::format;
use alloc::vec::Vec;

use crate::backend::{Backend, ModelHeader};
use crate::catalog::CatalogEntry;
use crate::context::{Frame, SerializationContext};
use crate::error::{DecodeError, SerializeError};
use crate::model::{Model, SharedAny};
use crate::modifier::ModifierPipeline;
use crate::serializer::{MemberValue, SerializationServices, VALUE_MEMBER, classify};
use crate::value::{ScalarKind, Shape, Value};

// -----------------------------------------------------------------------------
// WriteDriver

/// Walks a graph and feeds it to a backend.
///
/// Instance locks are held only while member values are collected and while
/// lifecycle hooks run, never across recursion into children.
pub(crate) struct WriteDriver<'s, B: Backend> {
    pub backend: &'s mut B,
    pub services: &'s SerializationServices,
}

impl<B: Backend> WriteDriver<'_, B> {
    /// Writes `model`, or a back-reference if it was already written.
    ///
    /// `slot` is the member holding the model, `None` at the root.
    pub fn write_model(
        &mut self,
        ctx: &mut SerializationContext<'_>,
        model: &SharedAny,
        slot: Option<&MemberValue>,
    ) -> Result<B::Element, SerializeError> {
        let reference = ctx.references_mut().get_or_assign(model);
        if !reference.is_first_usage {
            return self
                .backend
                .encode_reference(ctx, reference.id)
                .map_err(SerializeError::backend);
        }

        let info = model.info();
        let mut scope = ctx.enter(Frame::model(info, Some(reference.id)))?;
        let ctx = &mut *scope;
        let pipeline = self.services.modifiers().pipeline(info);
        let entry = self.services.catalog().entry(info);

        let members = model.read_with(|instance| -> Result<Vec<MemberValue>, SerializeError> {
            if let Some(callbacks) = instance.callbacks() {
                callbacks.start_serialization();
            }
            pipeline.on_serializing(ctx, instance)?;
            Ok(enumerate(ctx, &pipeline, &entry, instance, slot))
        })?;

        let header = ModelHeader {
            type_path: Some(info.type_path().into()),
            graph_id: Some(reference.id),
        };
        let mut writer = self
            .backend
            .begin_model(ctx, &header)
            .map_err(SerializeError::backend)?;

        for mut member in members {
            pipeline.serialize_member(ctx, &mut member)?;
            member.refresh_actual_type();

            match self.encode(ctx, &pipeline, &member, member.shape, &member.value)? {
                Ok(element) => {
                    self.backend
                        .write_member(ctx, &mut writer, &member, element)
                        .map_err(SerializeError::backend)?;
                    pipeline.member_serialized(ctx, &member)?;
                }
                Err(reason) => {
                    ctx.record_failure(info.type_path(), member.serialization_name, reason);
                }
            }
        }

        model.read_with(|instance| -> Result<(), SerializeError> {
            pipeline.on_serialized(ctx, instance)?;
            if let Some(callbacks) = instance.callbacks() {
                callbacks.finish_serialization();
            }
            Ok(())
        })?;

        log::trace!("wrote `{}` as graph id {}", info.type_path(), reference.id);
        self.backend
            .end_model(ctx, writer)
            .map_err(SerializeError::backend)
    }

    /// Writes a root value that is not a model: a header-less model element
    /// with a single member.
    pub fn write_root_value(
        &mut self,
        ctx: &mut SerializationContext<'_>,
        member: &MemberValue,
    ) -> Result<B::Element, SerializeError> {
        let mut scope = ctx.enter(Frame::value(member.model_type))?;
        let ctx = &mut *scope;
        let pipeline = ModifierPipeline::default();

        let mut writer = self
            .backend
            .begin_model(ctx, &ModelHeader::default())
            .map_err(SerializeError::backend)?;

        match self.encode(ctx, &pipeline, member, member.shape, &member.value)? {
            Ok(element) => self
                .backend
                .write_member(ctx, &mut writer, member, element)
                .map_err(SerializeError::backend)?,
            Err(reason) => ctx.record_failure(member.model_type, member.serialization_name, reason),
        }

        self.backend
            .end_model(ctx, writer)
            .map_err(SerializeError::backend)
    }

    /// Encodes one value of `member`.
    ///
    /// The value drives the structure; `shape` only refines it (text types,
    /// element shapes of collections).
    fn encode(
        &mut self,
        ctx: &mut SerializationContext<'_>,
        pipeline: &ModifierPipeline,
        member: &MemberValue,
        shape: Shape,
        value: &Value,
    ) -> Result<Result<B::Element, DecodeError>, SerializeError> {
        let element = match value {
            Value::Model(model) => self.write_model(ctx, model, Some(member))?,
            Value::List(items) => {
                let item_shape = shape.item();
                let mut elements = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_shape = item_shape.unwrap_or_else(|| Shape::infer(item));
                    match self.encode(ctx, pipeline, member, item_shape, item)? {
                        Ok(element) => elements.push(element),
                        Err(reason) => ctx.record_failure(
                            member.model_type,
                            format!("{}[{index}]", member.serialization_name),
                            reason,
                        ),
                    }
                }
                self.backend
                    .encode_sequence(ctx, elements)
                    .map_err(SerializeError::backend)?
            }
            Value::Map(entries) => {
                let entry_shape = shape.entry();
                let mut elements = Vec::with_capacity(entries.len());
                for (index, (key, value)) in entries.iter().enumerate() {
                    let (key_shape, value_shape) =
                        entry_shape.unwrap_or_else(|| (Shape::infer(key), Shape::infer(value)));
                    let key = self.encode(ctx, pipeline, member, key_shape, key)?;
                    let value = self.encode(ctx, pipeline, member, value_shape, value)?;
                    match key.and_then(|key| value.map(|value| (key, value))) {
                        Ok(pair) => elements.push(pair),
                        Err(reason) => ctx.record_failure(
                            member.model_type,
                            format!("{}[{index}]", member.serialization_name),
                            reason,
                        ),
                    }
                }
                self.backend
                    .encode_dictionary(ctx, elements)
                    .map_err(SerializeError::backend)?
            }
            Value::Enum(variant) => {
                let scalar = if classify::enum_as_string(ctx, pipeline, member, variant.info()) {
                    Value::String(variant.name().into())
                } else {
                    Value::Int(variant.index() as i64)
                };
                self.scalar(ctx, &scalar)?
            }
            scalar => match ScalarKind::of(scalar) {
                Some(kind)
                    if !matches!(shape.unwrap_option(), Shape::Text)
                        && classify::using_parse(ctx, pipeline, member) =>
                {
                    match kind.format_text(scalar, &ctx.configuration().culture) {
                        Ok(text) => self.scalar(ctx, &Value::String(text))?,
                        Err(error) => return Ok(Err(error.into())),
                    }
                }
                _ => self.scalar(ctx, scalar)?,
            },
        };
        Ok(Ok(element))
    }

    #[inline]
    fn scalar(
        &mut self,
        ctx: &SerializationContext<'_>,
        value: &Value,
    ) -> Result<B::Element, SerializeError> {
        self.backend
            .encode_scalar(ctx, value)
            .map_err(SerializeError::backend)
    }
}

// -----------------------------------------------------------------------------
// Enumeration

/// Collects the members to write for `instance`, in order, with their values.
fn enumerate(
    ctx: &mut SerializationContext<'_>,
    pipeline: &ModifierPipeline,
    entry: &CatalogEntry,
    instance: &dyn Model,
    slot: Option<&MemberValue>,
) -> Vec<MemberValue> {
    let info = entry.info();

    if let Some(custom) = instance.custom_serialization() {
        return match custom.save() {
            Ok(value) => vec![MemberValue::custom(info, custom.shape(), value)],
            Err(error) => {
                ctx.record_failure(info.type_path(), VALUE_MEMBER, error.into());
                Vec::new()
            }
        };
    }

    let members: Vec<MemberValue> = match classify::items_member(ctx, entry, pipeline, slot) {
        Some((items, group)) => {
            vec![MemberValue::from_catalog(info, items, items.read(instance)).with_group(group)]
        }
        None => entry
            .members_to_serialize()
            .map(|member| MemberValue::from_catalog(info, member, member.read(instance)))
            .collect(),
    };

    members
        .into_iter()
        .filter(|member| !pipeline.should_ignore_member(ctx, instance, member))
        .collect()
}

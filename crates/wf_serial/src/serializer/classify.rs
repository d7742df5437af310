//! Representation decisions.
//!
//! Each decision takes the first answer from, in order: the member's own
//! hint, the modifier pipeline, the type's default, the configuration. Both
//! directions call the same functions, so a document is read with the
//! representation it was written with.

use crate::catalog::{CatalogEntry, CatalogMember};
use crate::context::SerializationContext;
use crate::model::{EnumInfo, MemberGroup};
use crate::modifier::ModifierPipeline;
use crate::serializer::MemberValue;
use crate::value::Shape;

/// The items member of a model written as a collection or dictionary.
///
/// `pipeline` belongs to the model's own type; `slot` is the member holding
/// the model, `None` at the root.
pub(crate) fn items_member<'e>(
    ctx: &SerializationContext<'_>,
    entry: &'e CatalogEntry,
    pipeline: &ModifierPipeline,
    slot: Option<&MemberValue>,
) -> Option<(&'e CatalogMember, MemberGroup)> {
    let items = entry.items_member()?;
    let hints = slot.map(MemberValue::hints).unwrap_or_default();

    let (decided, group) = match items.info().shape().unwrap_option() {
        Shape::Map(..) => (
            hints
                .as_dictionary
                .or_else(|| pipeline.should_serialize_as_dictionary(ctx, slot)),
            MemberGroup::RootDictionary,
        ),
        _ => (
            hints
                .as_collection
                .or_else(|| pipeline.should_serialize_as_collection(ctx, slot)),
            MemberGroup::RootCollection,
        ),
    };

    decided
        .unwrap_or_else(|| entry.info().items_by_default())
        .then_some((items, group))
}

/// Whether an enum value of `member` is written by name.
///
/// `pipeline` belongs to the model owning the member.
pub(crate) fn enum_as_string(
    ctx: &SerializationContext<'_>,
    pipeline: &ModifierPipeline,
    member: &MemberValue,
    info: &EnumInfo,
) -> bool {
    member
        .hints()
        .enum_as_string
        .or_else(|| pipeline.should_serialize_enum_as_string(ctx, member))
        .unwrap_or_else(|| info.as_string() || ctx.configuration().enum_as_string)
}

/// Whether scalars of `member` travel as culture-formatted text.
pub(crate) fn using_parse(
    ctx: &SerializationContext<'_>,
    pipeline: &ModifierPipeline,
    member: &MemberValue,
) -> bool {
    member
        .hints()
        .parse
        .or_else(|| pipeline.should_serialize_using_parse(ctx, member))
        .unwrap_or(false)
}

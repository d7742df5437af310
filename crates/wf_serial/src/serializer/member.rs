use core::any::type_name;

use crate::catalog::CatalogMember;
use crate::model::{MemberGroup, MemberInfo, ModelInfo, RepresentationHints, SharedAny};
use crate::value::{MemberType, Shape, Value};

/// Serialization name of the single member of a custom or simple root value.
pub const VALUE_MEMBER: &str = "Value";
/// Serialization name of the single member of a root collection or dictionary.
pub const ITEMS_MEMBER: &str = "Items";

/// One member on its way to or from a backend.
///
/// Modifiers receive it in their member hooks and may replace
/// [`value`](Self::value); the engine always uses the value as left by the
/// last hook.
#[derive(Debug, Clone)]
pub struct MemberValue {
    pub group: MemberGroup,
    /// Type path of the model being written or read.
    pub model_type: &'static str,
    pub name: &'static str,
    pub serialization_name: &'static str,
    /// Declared shape of the member.
    pub shape: Shape,
    pub declared_type_name: &'static str,
    /// Runtime type of a model value, when it is one.
    pub actual_type: Option<&'static ModelInfo>,
    /// Static description; `None` for synthesized members.
    pub info: Option<&'static MemberInfo>,
    pub value: Value,
}

impl MemberValue {
    /// A declared member of `model`.
    pub fn from_info(model: &'static ModelInfo, info: &'static MemberInfo, value: Value) -> Self {
        Self {
            group: info.group(),
            model_type: model.type_path(),
            name: info.name(),
            serialization_name: info.serialization_name(),
            shape: info.shape(),
            declared_type_name: info.type_name(),
            actual_type: value.as_model().map(SharedAny::info),
            info: Some(info),
            value,
        }
    }

    #[inline]
    pub(crate) fn from_catalog(model: &'static ModelInfo, member: &CatalogMember, value: Value) -> Self {
        Self::from_info(model, member.info(), value)
    }

    /// The single member of a self-serializing model.
    pub(crate) fn custom(model: &'static ModelInfo, shape: Shape, value: Value) -> Self {
        Self {
            group: MemberGroup::SimpleRootValue,
            model_type: model.type_path(),
            name: VALUE_MEMBER,
            serialization_name: VALUE_MEMBER,
            shape,
            declared_type_name: model.type_path(),
            actual_type: None,
            info: None,
            value,
        }
    }

    /// The single member of a root value of type `T`.
    pub(crate) fn root<T: MemberType>(value: Value) -> Self {
        let shape = T::shape();
        let (group, name) = match shape.unwrap_option() {
            Shape::List(_) => (MemberGroup::RootCollection, ITEMS_MEMBER),
            Shape::Map(..) => (MemberGroup::RootDictionary, ITEMS_MEMBER),
            _ => (MemberGroup::SimpleRootValue, VALUE_MEMBER),
        };
        Self {
            group,
            model_type: type_name::<T>(),
            name,
            serialization_name: name,
            shape,
            declared_type_name: type_name::<T>(),
            actual_type: value.as_model().map(SharedAny::info),
            info: None,
            value,
        }
    }

    pub(crate) fn with_group(mut self, group: MemberGroup) -> Self {
        self.group = group;
        self
    }

    /// Member-level representation hints; empty for synthesized members.
    #[inline]
    pub fn hints(&self) -> RepresentationHints {
        self.info.map(|info| *info.hints()).unwrap_or_default()
    }

    /// Replaces the value and refreshes [`actual_type`](Self::actual_type).
    pub fn set_value(&mut self, value: Value) {
        self.actual_type = value.as_model().map(SharedAny::info);
        self.value = value;
    }

    #[inline]
    pub(crate) fn refresh_actual_type(&mut self) {
        self.actual_type = self.value.as_model().map(SharedAny::info);
    }
}

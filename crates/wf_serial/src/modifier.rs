//! Serializer modifiers.
//!
//! A [`SerializerModifier`] is registered for one model type and applies to
//! that type and every type deriving from it. The modifiers that apply to a
//! concrete type form its [`ModifierPipeline`], ordered from the most-base
//! level to the most-derived one, each level in registration order.
//!
//! Hooks run in pipeline order. Representation queries are answered in
//! reverse: the most-derived, latest-registered modifier with an opinion wins.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::TypeId;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use wf_utils::TypeIdMap;

use crate::context::SerializationContext;
use crate::error::{BoxedError, SerializeError};
use crate::model::{Model, ModelInfo, TypedModel};
use crate::serializer::MemberValue;

/// The error a modifier hook may return. It aborts the operation unchanged.
pub type ModifierError = BoxedError;

// -----------------------------------------------------------------------------
// SerializerModifier

/// An interceptor for one model type and its derived types.
///
/// Every method has a neutral default, so implementations override only what
/// they need. Representation queries return `None` when the modifier has no
/// opinion.
///
/// # Examples
///
/// ```
/// use wf_serial::context::SerializationContext;
/// use wf_serial::modifier::{ModifierError, SerializerModifier};
/// use wf_serial::prelude::*;
/// use wf_serial::serializer::MemberValue;
///
/// struct Redact;
///
/// impl SerializerModifier for Redact {
///     fn serialize_member(
///         &self,
///         _ctx: &SerializationContext<'_>,
///         member: &mut MemberValue,
///     ) -> Result<(), ModifierError> {
///         if member.name == "password" {
///             member.value = Value::from("***");
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait SerializerModifier: Send + Sync {
    /// Returns `true` to skip `member` on this instance.
    fn should_ignore_member(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &dyn Model,
        _member: &MemberValue,
    ) -> bool {
        false
    }

    /// Whether a model is written as its items collection. `member` is the
    /// slot holding the model, `None` at the root.
    fn should_serialize_as_collection(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: Option<&MemberValue>,
    ) -> Option<bool> {
        None
    }

    /// Whether a model is written as its items dictionary.
    fn should_serialize_as_dictionary(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: Option<&MemberValue>,
    ) -> Option<bool> {
        None
    }

    fn should_serialize_enum_as_string(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: &MemberValue,
    ) -> Option<bool> {
        None
    }

    /// Whether scalars of `member` travel as culture-formatted text.
    fn should_serialize_using_parse(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: &MemberValue,
    ) -> Option<bool> {
        None
    }

    fn on_serializing(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &dyn Model,
    ) -> Result<(), ModifierError> {
        Ok(())
    }

    fn on_serialized(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &dyn Model,
    ) -> Result<(), ModifierError> {
        Ok(())
    }

    fn on_deserializing(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &mut dyn Model,
    ) -> Result<(), ModifierError> {
        Ok(())
    }

    fn on_deserialized(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &mut dyn Model,
    ) -> Result<(), ModifierError> {
        Ok(())
    }

    /// Runs before a member is written; may replace `member.value`.
    fn serialize_member(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: &mut MemberValue,
    ) -> Result<(), ModifierError> {
        Ok(())
    }

    fn member_serialized(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: &MemberValue,
    ) -> Result<(), ModifierError> {
        Ok(())
    }

    /// Runs after a member is read and before it is stored; may replace
    /// `member.value`.
    fn deserialize_member(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: &mut MemberValue,
    ) -> Result<(), ModifierError> {
        Ok(())
    }

    fn member_deserialized(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: &MemberValue,
    ) -> Result<(), ModifierError> {
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ModifierPipeline

/// The ordered modifiers applying to one concrete type.
#[derive(Default, Clone)]
pub struct ModifierPipeline {
    modifiers: Vec<Arc<dyn SerializerModifier>>,
}

/// Forwards a hook to every modifier in order, stopping at the first error.
/// `shared` hooks take their target by `&`, `exclusive` hooks by `&mut`.
macro_rules! run_hooks {
    (
        shared { $($name:ident($target:ty);)* }
        exclusive { $($name_mut:ident($target_mut:ty);)* }
    ) => {
        $(
            pub fn $name(
                &self,
                ctx: &SerializationContext<'_>,
                target: $target,
            ) -> Result<(), SerializeError> {
                for modifier in &self.modifiers {
                    modifier.$name(ctx, target).map_err(SerializeError::Modifier)?;
                }
                Ok(())
            }
        )*
        $(
            pub fn $name_mut(
                &self,
                ctx: &SerializationContext<'_>,
                target: $target_mut,
            ) -> Result<(), SerializeError> {
                for modifier in &self.modifiers {
                    modifier.$name_mut(ctx, &mut *target).map_err(SerializeError::Modifier)?;
                }
                Ok(())
            }
        )*
    };
}

impl ModifierPipeline {
    #[inline]
    pub fn new(modifiers: Vec<Arc<dyn SerializerModifier>>) -> Self {
        Self { modifiers }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// The modifiers, base first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Arc<dyn SerializerModifier>> {
        self.modifiers.iter()
    }

    #[inline]
    fn decide(
        &self,
        f: impl FnMut(&Arc<dyn SerializerModifier>) -> Option<bool>,
    ) -> Option<bool> {
        self.modifiers.iter().rev().find_map(f)
    }

    /// `true` if any modifier vetoes the member.
    pub fn should_ignore_member(
        &self,
        ctx: &SerializationContext<'_>,
        model: &dyn Model,
        member: &MemberValue,
    ) -> bool {
        self.modifiers
            .iter()
            .any(|modifier| modifier.should_ignore_member(ctx, model, member))
    }

    pub fn should_serialize_as_collection(
        &self,
        ctx: &SerializationContext<'_>,
        member: Option<&MemberValue>,
    ) -> Option<bool> {
        self.decide(|modifier| modifier.should_serialize_as_collection(ctx, member))
    }

    pub fn should_serialize_as_dictionary(
        &self,
        ctx: &SerializationContext<'_>,
        member: Option<&MemberValue>,
    ) -> Option<bool> {
        self.decide(|modifier| modifier.should_serialize_as_dictionary(ctx, member))
    }

    pub fn should_serialize_enum_as_string(
        &self,
        ctx: &SerializationContext<'_>,
        member: &MemberValue,
    ) -> Option<bool> {
        self.decide(|modifier| modifier.should_serialize_enum_as_string(ctx, member))
    }

    pub fn should_serialize_using_parse(
        &self,
        ctx: &SerializationContext<'_>,
        member: &MemberValue,
    ) -> Option<bool> {
        self.decide(|modifier| modifier.should_serialize_using_parse(ctx, member))
    }

    run_hooks! {
        shared {
            on_serializing(&dyn Model);
            on_serialized(&dyn Model);
            member_serialized(&MemberValue);
            member_deserialized(&MemberValue);
        }
        exclusive {
            on_deserializing(&mut dyn Model);
            on_deserialized(&mut dyn Model);
            serialize_member(&mut MemberValue);
            deserialize_member(&mut MemberValue);
        }
    }
}

// -----------------------------------------------------------------------------
// ModifierRegistry

/// Registered modifiers and the pipelines built from them.
///
/// Pipelines are cached per concrete type. Any registration change drops
/// every cached pipeline, since derived pipelines embed their base levels.
/// A pipeline built concurrently with a registration change is returned to
/// its caller but not published.
#[derive(Default)]
pub struct ModifierRegistry {
    registered: RwLock<TypeIdMap<Vec<Arc<dyn SerializerModifier>>>>,
    pipelines: RwLock<TypeIdMap<Arc<ModifierPipeline>>>,
    generation: AtomicU64,
}

impl ModifierRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn registered(&self) -> RwLockReadGuard<'_, TypeIdMap<Vec<Arc<dyn SerializerModifier>>>> {
        self.registered.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn registered_mut(
        &self,
    ) -> RwLockWriteGuard<'_, TypeIdMap<Vec<Arc<dyn SerializerModifier>>>> {
        self.registered.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn pipelines(&self) -> RwLockReadGuard<'_, TypeIdMap<Arc<ModifierPipeline>>> {
        self.pipelines.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn pipelines_mut(&self) -> RwLockWriteGuard<'_, TypeIdMap<Arc<ModifierPipeline>>> {
        self.pipelines.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `modifier` to the modifiers of `type_id`.
    pub fn register(&self, type_id: TypeId, modifier: Arc<dyn SerializerModifier>) {
        self.registered_mut()
            .get_or_insert(type_id, Vec::new)
            .push(modifier);
        self.invalidate();
    }

    #[inline]
    pub fn register_for<T: TypedModel>(&self, modifier: Arc<dyn SerializerModifier>) {
        self.register(TypeId::of::<T>(), modifier);
    }

    /// Removes `modifier`, matched by pointer identity. Returns `false` if it
    /// was not registered for `type_id`.
    pub fn unregister(&self, type_id: TypeId, modifier: &Arc<dyn SerializerModifier>) -> bool {
        let removed = {
            let mut registered = self.registered_mut();
            let Some(list) = registered.get_mut(&type_id) else {
                return false;
            };
            let before = list.len();
            list.retain(|existing| !Arc::ptr_eq(existing, modifier));
            let removed = list.len() != before;
            if list.is_empty() {
                registered.remove(&type_id);
            }
            removed
        };
        if removed {
            self.invalidate();
        }
        removed
    }

    /// The modifiers registered for exactly `type_id`, in registration order.
    pub fn modifiers_for(&self, type_id: TypeId) -> Vec<Arc<dyn SerializerModifier>> {
        self.registered()
            .get(&type_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the pipeline of `info`, building it on first use.
    pub fn pipeline(&self, info: &'static ModelInfo) -> Arc<ModifierPipeline> {
        if let Some(pipeline) = self.pipelines().get(&info.type_id()) {
            return pipeline.clone();
        }

        let generation = self.generation.load(Ordering::Acquire);
        let built = Arc::new(self.build(info));

        let mut pipelines = self.pipelines_mut();
        if self.generation.load(Ordering::Acquire) != generation {
            return built;
        }
        pipelines.get_or_insert(info.type_id(), || built).clone()
    }

    fn build(&self, info: &'static ModelInfo) -> ModifierPipeline {
        let mut levels = Vec::new();
        let mut current = Some(info);
        while let Some(level) = current {
            levels.push(level.type_id());
            current = level.base();
        }

        let registered = self.registered();
        let modifiers: Vec<_> = levels
            .iter()
            .rev()
            .filter_map(|type_id| registered.get(type_id))
            .flatten()
            .cloned()
            .collect();

        if !modifiers.is_empty() {
            log::debug!(
                "built modifier pipeline of `{}` with {} modifiers",
                info.type_path(),
                modifiers.len()
            );
        }
        ModifierPipeline::new(modifiers)
    }

    /// Drops every cached pipeline.
    pub fn invalidate(&self) {
        let mut pipelines = self.pipelines_mut();
        self.generation.fetch_add(1, Ordering::AcqRel);
        pipelines.clear();
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use std::sync::Mutex;

    use super::{ModifierError, ModifierRegistry, SerializerModifier};
    use crate::config::SerializationConfiguration;
    use crate::context::{SerializationContext, SerializationMode};
    use crate::error::SerializeError;
    use crate::model::{Model, TypedModel};
    use crate::serializer::MemberValue;
    use crate::value::Value;

    #[derive(crate::Model, Default)]
    struct Base {
        id: u32,
    }

    #[derive(crate::Model, Default)]
    struct Derived {
        #[model(base)]
        base: Base,
    }

    struct Answer(Option<bool>);

    impl SerializerModifier for Answer {
        fn should_serialize_as_collection(
            &self,
            _ctx: &SerializationContext<'_>,
            _member: Option<&MemberValue>,
        ) -> Option<bool> {
            self.0
        }
    }

    #[test]
    fn pipeline_orders_base_first() {
        let registry = ModifierRegistry::new();
        let base: Arc<dyn SerializerModifier> = Arc::new(Answer(Some(true)));
        let derived: Arc<dyn SerializerModifier> = Arc::new(Answer(Some(false)));
        registry.register_for::<Derived>(derived.clone());
        registry.register_for::<Base>(base.clone());

        let pipeline = registry.pipeline(Derived::type_info());
        let order: Vec<_> = pipeline.iter().collect();
        assert_eq!(order.len(), 2);
        assert!(Arc::ptr_eq(order[0], &base));
        assert!(Arc::ptr_eq(order[1], &derived));

        assert_eq!(registry.pipeline(Base::type_info()).len(), 1);
    }

    #[test]
    fn most_derived_answer_wins_and_none_never_overrides() {
        let config = SerializationConfiguration::default();
        let ctx = SerializationContext::new(SerializationMode::Serialize, &config);

        let registry = ModifierRegistry::new();
        registry.register_for::<Base>(Arc::new(Answer(Some(true))));
        registry.register_for::<Derived>(Arc::new(Answer(Some(false))));
        registry.register_for::<Derived>(Arc::new(Answer(None)));

        let derived = registry.pipeline(Derived::type_info());
        assert_eq!(derived.should_serialize_as_collection(&ctx, None), Some(false));

        let base = registry.pipeline(Base::type_info());
        assert_eq!(base.should_serialize_as_collection(&ctx, None), Some(true));
    }

    #[test]
    fn registration_changes_invalidate_cached_pipelines() {
        let registry = ModifierRegistry::new();
        let first = registry.pipeline(Derived::type_info());
        assert!(first.is_empty());
        assert!(Arc::ptr_eq(&first, &registry.pipeline(Derived::type_info())));

        let modifier: Arc<dyn SerializerModifier> = Arc::new(Answer(None));
        registry.register_for::<Base>(modifier.clone());
        assert_eq!(registry.pipeline(Derived::type_info()).len(), 1);
        assert_eq!(registry.modifiers_for(core::any::TypeId::of::<Base>()).len(), 1);

        assert!(registry.unregister(core::any::TypeId::of::<Base>(), &modifier));
        assert!(!registry.unregister(core::any::TypeId::of::<Base>(), &modifier));
        assert!(registry.pipeline(Derived::type_info()).is_empty());
    }

    /// Records every hook it sees; fails the hooks named in `fail`.
    struct Journal {
        label: &'static str,
        fail: &'static [&'static str],
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Journal {
        fn note(&self, hook: &'static str) -> Result<(), ModifierError> {
            self.log.lock().unwrap().push(format!("{}.{hook}", self.label));
            if self.fail.contains(&hook) {
                return Err(format!("{} rejects {hook}", self.label).into());
            }
            Ok(())
        }
    }

    impl SerializerModifier for Journal {
        fn on_serializing(&self, _: &SerializationContext<'_>, _: &dyn Model) -> Result<(), ModifierError> {
            self.note("on_serializing")
        }

        fn on_serialized(&self, _: &SerializationContext<'_>, _: &dyn Model) -> Result<(), ModifierError> {
            self.note("on_serialized")
        }

        fn on_deserializing(
            &self,
            _: &SerializationContext<'_>,
            model: &mut dyn Model,
        ) -> Result<(), ModifierError> {
            if let Some(base) = model.downcast_mut::<Base>() {
                base.id += 1;
            }
            self.note("on_deserializing")
        }

        fn on_deserialized(&self, _: &SerializationContext<'_>, _: &mut dyn Model) -> Result<(), ModifierError> {
            self.note("on_deserialized")
        }

        fn serialize_member(
            &self,
            _: &SerializationContext<'_>,
            member: &mut MemberValue,
        ) -> Result<(), ModifierError> {
            if let Value::UInt(v) = &mut member.value {
                *v *= 10;
            }
            self.note("serialize_member")
        }

        fn member_serialized(&self, _: &SerializationContext<'_>, _: &MemberValue) -> Result<(), ModifierError> {
            self.note("member_serialized")
        }

        fn deserialize_member(
            &self,
            _: &SerializationContext<'_>,
            _: &mut MemberValue,
        ) -> Result<(), ModifierError> {
            self.note("deserialize_member")
        }

        fn member_deserialized(&self, _: &SerializationContext<'_>, _: &MemberValue) -> Result<(), ModifierError> {
            self.note("member_deserialized")
        }
    }

    #[test]
    fn every_hook_runs_in_pipeline_order() {
        let config = SerializationConfiguration::default();
        let ctx = SerializationContext::new(SerializationMode::Serialize, &config);
        let log = Arc::new(Mutex::new(Vec::new()));

        let registry = ModifierRegistry::new();
        for label in ["first", "second"] {
            registry.register_for::<Base>(Arc::new(Journal {
                label,
                fail: &[],
                log: log.clone(),
            }));
        }
        let pipeline = registry.pipeline(Base::type_info());

        let mut model = Base { id: 1 };
        let info = Base::type_info();
        let mut member = MemberValue::from_info(info, info.member("id").unwrap(), Value::UInt(1));

        pipeline.on_serializing(&ctx, &model).unwrap();
        pipeline.serialize_member(&ctx, &mut member).unwrap();
        pipeline.member_serialized(&ctx, &member).unwrap();
        pipeline.on_serialized(&ctx, &model).unwrap();
        pipeline.on_deserializing(&ctx, &mut model).unwrap();
        pipeline.deserialize_member(&ctx, &mut member).unwrap();
        pipeline.member_deserialized(&ctx, &member).unwrap();
        pipeline.on_deserialized(&ctx, &mut model).unwrap();

        assert!(matches!(member.value, Value::UInt(100)));
        assert_eq!(model.id, 3);

        let log = log.lock().unwrap();
        let hooks = [
            "on_serializing",
            "serialize_member",
            "member_serialized",
            "on_serialized",
            "on_deserializing",
            "deserialize_member",
            "member_deserialized",
            "on_deserialized",
        ];
        let expected: Vec<String> = hooks
            .iter()
            .flat_map(|hook| [format!("first.{hook}"), format!("second.{hook}")])
            .collect();
        assert_eq!(*log, expected);
    }

    #[test]
    fn first_hook_error_stops_the_pipeline() {
        let config = SerializationConfiguration::default();
        let ctx = SerializationContext::new(SerializationMode::Serialize, &config);
        let log = Arc::new(Mutex::new(Vec::new()));

        let registry = ModifierRegistry::new();
        registry.register_for::<Base>(Arc::new(Journal {
            label: "strict",
            fail: &["member_serialized", "on_deserialized"],
            log: log.clone(),
        }));
        registry.register_for::<Base>(Arc::new(Journal {
            label: "lenient",
            fail: &[],
            log: log.clone(),
        }));
        let pipeline = registry.pipeline(Base::type_info());

        let mut model = Base::default();
        let info = Base::type_info();
        let member = MemberValue::from_info(info, info.member("id").unwrap(), Value::UInt(0));

        let err = pipeline.member_serialized(&ctx, &member).unwrap_err();
        assert!(matches!(err, SerializeError::Modifier(_)));
        let err = pipeline.on_deserialized(&ctx, &mut model).unwrap_err();
        assert!(matches!(err, SerializeError::Modifier(_)));

        assert_eq!(
            *log.lock().unwrap(),
            ["strict.member_serialized", "strict.on_deserialized"]
        );
    }
}

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::TypeId;

use crate::catalog::MemberCatalog;
use crate::model::TypedModel;
use crate::modifier::{ModifierPipeline, ModifierRegistry, SerializerModifier};
use crate::registry::ModelRegistryArc;

/// The shared caches an operation reads from.
///
/// Cloning is cheap and shares the caches. Tests and independent subsystems
/// create their own instance instead of relying on process-wide state.
#[derive(Clone, Default)]
pub struct SerializationServices {
    registry: ModelRegistryArc,
    catalog: Arc<MemberCatalog>,
    modifiers: Arc<ModifierRegistry>,
}

impl SerializationServices {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn registry(&self) -> &ModelRegistryArc {
        &self.registry
    }

    #[inline]
    pub fn catalog(&self) -> &MemberCatalog {
        &self.catalog
    }

    #[inline]
    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    /// Registers `T` and the models it depends on for polymorphic lookup.
    pub fn register_model<T: TypedModel>(&self) {
        self.registry.write().register::<T>();
    }

    /// Adds a modifier for `T` and every type deriving from it.
    pub fn register_modifier<T: TypedModel>(&self, modifier: Arc<dyn SerializerModifier>) {
        self.modifiers.register_for::<T>(modifier);
        self.catalog.invalidate(TypeId::of::<T>());
    }

    /// Removes a modifier previously registered for `T`, matched by pointer.
    pub fn unregister_modifier<T: TypedModel>(&self, modifier: &Arc<dyn SerializerModifier>) -> bool {
        let removed = self.modifiers.unregister(TypeId::of::<T>(), modifier);
        if removed {
            self.catalog.invalidate(TypeId::of::<T>());
        }
        removed
    }

    /// The modifiers registered for exactly `T`.
    #[inline]
    pub fn modifiers_for<T: TypedModel>(&self) -> Vec<Arc<dyn SerializerModifier>> {
        self.modifiers.modifiers_for(TypeId::of::<T>())
    }

    /// The full pipeline applying to `T`, base modifiers included.
    #[inline]
    pub fn pipeline<T: TypedModel>(&self) -> Arc<ModifierPipeline> {
        self.modifiers.pipeline(T::type_info())
    }

    /// Drops cached catalog entries and pipelines involving `T`.
    pub fn invalidate<T: TypedModel>(&self) {
        self.catalog.invalidate(TypeId::of::<T>());
        self.modifiers.invalidate();
    }
}

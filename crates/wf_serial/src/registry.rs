//! Type lookup for models.
//!
//! A [`ModelRegistry`] maps type ids, full type paths and short names to
//! [`ModelInfo`]s. Deserialization consults it whenever the declared type of a
//! slot does not fix the concrete model type, e.g. a [`SharedAny`] member.
//!
//! [`SharedAny`]: crate::model::SharedAny

use alloc::sync::Arc;
use core::any::TypeId;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use wf_utils::TypeIdMap;
use wf_utils::hash::{HashMap, HashSet};

use crate::model::{ModelInfo, TypedModel};
use crate::value::Shape;

// -----------------------------------------------------------------------------
// ModelRegistry

/// A registry of model descriptors.
///
/// Registering a type also registers every model reachable from it: its base
/// chain and the model types appearing in member shapes.
///
/// # Examples
///
/// ```
/// use wf_serial::registry::ModelRegistry;
/// use wf_serial::prelude::*;
///
/// #[derive(Model, Default)]
/// struct Leaf;
///
/// #[derive(Model, Default)]
/// struct Tree {
///     leaves: Vec<Shared<Leaf>>,
/// }
///
/// let mut registry = ModelRegistry::new();
/// registry.register::<Tree>();
///
/// assert!(registry.contains::<Leaf>());
/// assert!(registry.get_with_name("Tree").is_some());
/// ```
#[derive(Default)]
pub struct ModelRegistry {
    models: TypeIdMap<&'static ModelInfo>,
    type_path_to_id: HashMap<&'static str, TypeId>,
    type_name_to_id: HashMap<&'static str, TypeId>,
    ambiguous_names: HashSet<&'static str>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` and its dependencies.
    #[inline]
    pub fn register<T: TypedModel>(&mut self) {
        self.register_info(T::type_info());
    }

    /// Registers a descriptor and its dependencies. Already known types are skipped.
    pub fn register_info(&mut self, info: &'static ModelInfo) {
        if !self.add(info) {
            return;
        }
        if let Some(base) = info.base() {
            self.register_info(base);
        }
        for member in info.members() {
            self.register_shape(member.shape());
        }
    }

    fn register_shape(&mut self, shape: Shape) {
        match shape {
            Shape::Model(info) => self.register_info(info),
            Shape::Option(inner) | Shape::List(inner) => self.register_shape(inner()),
            Shape::Map(key, value) => {
                self.register_shape(key());
                self.register_shape(value());
            }
            Shape::Scalar(_) | Shape::Text | Shape::Enum(_) | Shape::AnyModel => {}
        }
    }

    fn add(&mut self, info: &'static ModelInfo) -> bool {
        let type_id = info.type_id();
        if !self.models.try_insert(type_id, || info) {
            return false;
        }

        self.type_path_to_id.insert(info.type_path(), type_id);

        let name = info.type_name();
        if !self.ambiguous_names.contains(name) {
            match self.type_name_to_id.get(name) {
                Some(&other) if other != type_id => {
                    self.type_name_to_id.remove(name);
                    self.ambiguous_names.insert(name);
                }
                Some(_) => {}
                None => {
                    self.type_name_to_id.insert(name, type_id);
                }
            }
        }

        log::debug!("registered model `{}`", info.type_path());
        true
    }

    #[inline]
    pub fn get(&self, type_id: TypeId) -> Option<&'static ModelInfo> {
        self.models.get(&type_id).copied()
    }

    /// Looks a model up by its full type path.
    pub fn get_with_type_path(&self, type_path: &str) -> Option<&'static ModelInfo> {
        self.type_path_to_id
            .get(type_path)
            .and_then(|id| self.get(*id))
    }

    /// Looks a model up by its short name. Ambiguous names resolve to nothing.
    pub fn get_with_name(&self, name: &str) -> Option<&'static ModelInfo> {
        self.type_name_to_id.get(name).and_then(|id| self.get(*id))
    }

    /// Tries the full type path first, then the short name.
    pub fn resolve(&self, name: &str) -> Option<&'static ModelInfo> {
        self.get_with_type_path(name)
            .or_else(|| self.get_with_name(name))
    }

    #[inline]
    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous_names.contains(name)
    }

    #[inline]
    pub fn contains<T: TypedModel>(&self) -> bool {
        self.models.contains_type::<T>()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'static ModelInfo> {
        self.models.values().copied()
    }

    /// Registers every model annotated with `#[model(auto_register)]` in the
    /// final binary. Returns the number of submitted registrations.
    #[cfg(feature = "auto_register")]
    pub fn auto_register(&mut self) -> usize {
        crate::__macro_exports::auto_register::register_submitted(self)
    }
}

// -----------------------------------------------------------------------------
// ModelRegistryArc

/// A [`ModelRegistry`] shared between threads.
#[derive(Clone, Default)]
pub struct ModelRegistryArc {
    internal: Arc<RwLock<ModelRegistry>>,
}

impl ModelRegistryArc {
    /// Takes a read lock, recovering from poisoning.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, ModelRegistry> {
        self.internal.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a write lock, recovering from poisoning.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, ModelRegistry> {
        self.internal.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::ModelRegistry;
    use crate::model::{Shared, SharedAny, WeakShared};

    mod left {
        #[derive(crate::Model, Default)]
        pub struct Item;
    }

    mod right {
        #[derive(crate::Model, Default)]
        pub struct Item;
    }

    #[derive(crate::Model, Default)]
    struct Entity {
        id: u32,
    }

    #[derive(crate::Model, Default)]
    struct Folder {
        #[model(base)]
        entity: Entity,
        parent: WeakShared<Folder>,
        files: Vec<Shared<left::Item>>,
        extra: Option<SharedAny>,
    }

    #[test]
    fn dependencies_are_registered() {
        let mut registry = ModelRegistry::new();
        registry.register::<Folder>();

        assert!(registry.contains::<Entity>());
        assert!(registry.contains::<left::Item>());
        assert!(!registry.contains::<right::Item>());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn duplicate_short_names_become_ambiguous() {
        let mut registry = ModelRegistry::new();
        registry.register::<left::Item>();
        registry.register::<right::Item>();

        assert!(registry.is_ambiguous("Item"));
        assert!(registry.get_with_name("Item").is_none());

        let path = <right::Item as crate::model::TypedModel>::type_info().type_path();
        let info = registry.resolve(path).unwrap();
        assert_eq!(info.type_path(), path);
    }
}

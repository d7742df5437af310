//! Graph identity tracking.
//!
//! During one operation every distinct model instance gets a [`GraphId`].
//! The first encounter writes the full model and its id; later encounters
//! write only a back-reference. On read, ids are bound to the instances as
//! they are created so that back-references, including ones pointing to a
//! model still being populated, resolve to the same instance.

use core::fmt;

use wf_utils::hash::HashMap;

use crate::error::SerializeError;
use crate::model::SharedAny;

// -----------------------------------------------------------------------------
// GraphId

/// An operation-scoped instance identifier. Writers assign ids from 1 in
/// discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u32);

impl GraphId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The result of [`ReferenceManager::get_or_assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceInfo {
    pub id: GraphId,
    /// `true` only on the instance's first encounter in this operation.
    pub is_first_usage: bool,
}

// -----------------------------------------------------------------------------
// ReferenceManager

/// Maps instance identity to graph ids for one operation.
///
/// Identity is the allocation address of the shared handle; equal contents
/// never make two instances the same. The manager keeps every instance it has
/// seen alive until it is dropped, so an address cannot be reused for another
/// instance mid-operation.
#[derive(Default)]
pub struct ReferenceManager {
    ids: HashMap<usize, GraphId>,
    instances: HashMap<GraphId, SharedAny>,
    last: u32,
}

impl ReferenceManager {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `instance`, assigning the next one on first encounter.
    pub fn get_or_assign(&mut self, instance: &SharedAny) -> ReferenceInfo {
        let identity = instance.identity();
        if let Some(&id) = self.ids.get(&identity) {
            return ReferenceInfo {
                id,
                is_first_usage: false,
            };
        }

        self.last += 1;
        let id = GraphId(self.last);
        self.ids.insert(identity, id);
        self.instances.insert(id, instance.clone());
        log::trace!("assigned graph id {id} to `{}`", instance.info().type_path());

        ReferenceInfo {
            id,
            is_first_usage: true,
        }
    }

    /// The instance bound to `id`, if any.
    #[inline]
    pub fn instance(&self, id: GraphId) -> Option<&SharedAny> {
        self.instances.get(&id)
    }

    /// Binds an id read from the wire to a freshly created instance.
    ///
    /// Binding the same pair twice is a no-op. Binding an id that already
    /// names another instance fails.
    pub fn register_manually(
        &mut self,
        id: GraphId,
        instance: SharedAny,
    ) -> Result<(), SerializeError> {
        match self.instances.get(&id) {
            Some(existing) if existing.ptr_eq(&instance) => Ok(()),
            Some(_) => Err(SerializeError::DuplicateGraphId(id)),
            None => {
                self.ids.insert(instance.identity(), id);
                self.instances.insert(id, instance);
                self.last = self.last.max(id.0);
                Ok(())
            }
        }
    }

    /// Number of tracked instances.
    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{GraphId, ReferenceManager};
    use crate::error::SerializeError;
    use crate::model::SharedAny;

    #[derive(crate::Model, Default, PartialEq)]
    struct Point {
        x: i32,
    }

    #[test]
    fn identity_not_equality() {
        let mut manager = ReferenceManager::new();
        let a = SharedAny::new(Point { x: 1 });
        let b = SharedAny::new(Point { x: 1 });

        let first = manager.get_or_assign(&a);
        assert_eq!(first.id, GraphId::from_raw(1));
        assert!(first.is_first_usage);

        let again = manager.get_or_assign(&a.clone());
        assert_eq!(again.id, first.id);
        assert!(!again.is_first_usage);

        let other = manager.get_or_assign(&b);
        assert_eq!(other.id, GraphId::from_raw(2));
        assert!(other.is_first_usage);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn manual_registration_resolves_and_rejects_conflicts() {
        let mut manager = ReferenceManager::new();
        let a = SharedAny::new(Point::default());
        let b = SharedAny::new(Point::default());

        manager.register_manually(GraphId::from_raw(5), a.clone()).unwrap();
        manager.register_manually(GraphId::from_raw(5), a.clone()).unwrap();
        assert!(manager.instance(GraphId::from_raw(5)).unwrap().ptr_eq(&a));
        assert!(manager.instance(GraphId::from_raw(6)).is_none());

        assert!(matches!(
            manager.register_manually(GraphId::from_raw(5), b.clone()),
            Err(SerializeError::DuplicateGraphId(id)) if id.get() == 5
        ));

        // fresh ids continue after the highest registered one
        assert_eq!(manager.get_or_assign(&b).id, GraphId::from_raw(6));
    }
}

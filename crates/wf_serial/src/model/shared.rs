use alloc::sync::{Arc, Weak};
use core::any::{Any, TypeId};
use core::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{Model, ModelInfo, TypedModel};

// -----------------------------------------------------------------------------
// Shared

/// A shared, lockable model instance.
///
/// Identity is the allocation: two handles are the same instance exactly when
/// [`ptr_eq`](Shared::ptr_eq) holds, regardless of the contents.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T: Model> Shared<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Locks for reading. A poisoned lock is recovered.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks for writing. A poisoned lock is recovered.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The address identifying this instance.
    #[inline]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    #[inline]
    pub fn downgrade(&self) -> WeakShared<T> {
        WeakShared(Arc::downgrade(&self.0))
    }

    #[inline]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl<T: TypedModel> Shared<T> {
    /// Erases the concrete type.
    #[inline]
    pub fn to_any(&self) -> SharedAny {
        SharedAny {
            cell: self.0.clone(),
            info: T::type_info(),
        }
    }
}

impl<T> Clone for Shared<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// A fresh instance of `T::default()`.
impl<T: Model + Default> Default for Shared<T> {
    #[inline]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Model> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared<{}>({:#x})", core::any::type_name::<T>(), self.identity())
    }
}

// -----------------------------------------------------------------------------
// WeakShared

/// A non-owning handle, typically a back pointer to a parent.
pub struct WeakShared<T>(Weak<RwLock<T>>);

impl<T: Model> WeakShared<T> {
    /// A handle that never upgrades.
    #[inline]
    pub fn new() -> Self {
        Self(Weak::new())
    }

    #[inline]
    pub fn upgrade(&self) -> Option<Shared<T>> {
        self.0.upgrade().map(Shared)
    }
}

impl<T: Model> Default for WeakShared<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for WeakShared<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Model> fmt::Debug for WeakShared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(shared) => write!(f, "Weak({shared:?})"),
            None => f.write_str("Weak(<dangling>)"),
        }
    }
}

// -----------------------------------------------------------------------------
// SharedAny

trait ModelCell: Send + Sync {
    fn read_model(&self, f: &mut dyn FnMut(&dyn Model));

    fn write_model(&self, f: &mut dyn FnMut(&mut dyn Model));

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Model> ModelCell for RwLock<T> {
    fn read_model(&self, f: &mut dyn FnMut(&dyn Model)) {
        let guard = self.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard);
    }

    fn write_model(&self, f: &mut dyn FnMut(&mut dyn Model)) {
        let mut guard = self.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A type-erased [`Shared`] handle.
///
/// Shares the allocation, and therefore the identity, of the `Shared<T>` it
/// was made from.
#[derive(Clone)]
pub struct SharedAny {
    cell: Arc<dyn ModelCell>,
    info: &'static ModelInfo,
}

impl SharedAny {
    #[inline]
    pub fn new<T: TypedModel>(value: T) -> Self {
        Shared::new(value).to_any()
    }

    /// The descriptor of the concrete type.
    #[inline]
    pub fn info(&self) -> &'static ModelInfo {
        self.info
    }

    #[inline]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const () as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &SharedAny) -> bool {
        self.identity() == other.identity()
    }

    #[inline]
    pub fn is<T: Model>(&self) -> bool {
        self.info.type_id() == TypeId::of::<T>()
    }

    /// Recovers the typed handle.
    pub fn downcast<T: Model>(&self) -> Option<Shared<T>> {
        self.cell.clone().into_any().downcast::<RwLock<T>>().ok().map(Shared)
    }

    /// Runs `f` under a read lock.
    pub fn read_with<R>(&self, f: impl FnOnce(&dyn Model) -> R) -> R {
        let mut f = Some(f);
        let mut result = None;
        self.cell.read_model(&mut |model: &dyn Model| {
            if let Some(f) = f.take() {
                result = Some(f(model));
            }
        });
        match result {
            Some(result) => result,
            None => unreachable!("model cell did not run the reader"),
        }
    }

    /// Runs `f` under a write lock.
    pub fn write_with<R>(&self, f: impl FnOnce(&mut dyn Model) -> R) -> R {
        let mut f = Some(f);
        let mut result = None;
        self.cell.write_model(&mut |model: &mut dyn Model| {
            if let Some(f) = f.take() {
                result = Some(f(model));
            }
        });
        match result {
            Some(result) => result,
            None => unreachable!("model cell did not run the writer"),
        }
    }
}

impl<T: TypedModel> From<Shared<T>> for SharedAny {
    #[inline]
    fn from(value: Shared<T>) -> Self {
        SharedAny {
            cell: value.0,
            info: T::type_info(),
        }
    }
}

impl fmt::Debug for SharedAny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedAny<{}>({:#x})", self.info.type_path(), self.identity())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use crate::model::{Shared, SharedAny};

    #[derive(crate::Model, Default)]
    struct Tag {
        label: String,
    }

    #[derive(crate::Model, Default)]
    struct Other;

    #[test]
    fn erased_handle_keeps_identity() {
        let tag = Shared::new(Tag { label: "a".into() });
        let any = tag.to_any();

        assert_eq!(tag.identity(), any.identity());
        assert!(any.is::<Tag>());

        let back = any.downcast::<Tag>().unwrap();
        assert!(back.ptr_eq(&tag));
        assert!(any.downcast::<Other>().is_none());
    }

    #[test]
    fn equal_contents_are_distinct_instances() {
        let a = SharedAny::new(Tag { label: "x".into() });
        let b = SharedAny::new(Tag { label: "x".into() });
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn closures_see_the_model() {
        let any = SharedAny::new(Tag { label: "x".into() });
        any.write_with(|model| model.downcast_mut::<Tag>().unwrap().label.push('y'));
        let label = any.read_with(|model| model.downcast_ref::<Tag>().unwrap().label.clone());
        assert_eq!(label, "xy");
    }

    #[test]
    fn weak_handle_dangles_after_drop() {
        let tag = Shared::new(Tag::default());
        let weak = tag.downgrade();
        assert!(weak.upgrade().is_some());
        drop(tag);
        assert!(weak.upgrade().is_none());
    }
}

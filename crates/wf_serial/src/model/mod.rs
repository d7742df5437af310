//! Models and their static descriptors.
//!
//! A model is any `'static` type implementing [`Model`], usually through
//! `#[derive(Model)]`. Its layout is described once by a static
//! [`ModelInfo`]; instances are shared through [`Shared`] so the engine can
//! tell identical instances from equal ones.

// -----------------------------------------------------------------------------
// Modules

mod bag;
mod info;
mod shared;

// -----------------------------------------------------------------------------
// Exports

pub use bag::PropertyBag;
pub use info::{EnumInfo, EnumType, ModelInfo, ModelInfoCell};
pub use info::{MemberFlags, MemberGroup, MemberInfo, RepresentationHints};
pub use shared::{Shared, SharedAny, WeakShared};

// -----------------------------------------------------------------------------
// Model

use core::any::Any;

use crate::value::{Shape, Value, ValueError};

/// An object the engine can serialize.
///
/// Only [`model_info`](Model::model_info) is required. The other methods
/// expose optional capabilities and default to "not supported".
pub trait Model: Any + Send + Sync {
    /// The static descriptor of the runtime type.
    fn model_info(&self) -> &'static ModelInfo;

    /// The embedded base model, if the descriptor declares one.
    fn base(&self) -> Option<&dyn Model> {
        None
    }

    fn base_mut(&mut self) -> Option<&mut dyn Model> {
        None
    }

    /// Storage for dynamic properties.
    fn property_bag(&self) -> Option<&PropertyBag> {
        None
    }

    fn property_bag_mut(&mut self) -> Option<&mut PropertyBag> {
        None
    }

    /// Lifecycle notifications.
    fn callbacks(&self) -> Option<&dyn SerializationCallbacks> {
        None
    }

    fn callbacks_mut(&mut self) -> Option<&mut dyn SerializationCallbacks> {
        None
    }

    /// Self-serialization, bypassing member enumeration.
    fn custom_serialization(&self) -> Option<&dyn CustomSerialization> {
        None
    }

    fn custom_serialization_mut(&mut self) -> Option<&mut dyn CustomSerialization> {
        None
    }
}

impl dyn Model {
    /// Returns `true` if the concrete type is `T`.
    #[inline]
    pub fn is<T: Model>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Model>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    #[inline]
    pub fn downcast_mut<T: Model>(&mut self) -> Option<&mut T> {
        (self as &mut dyn Any).downcast_mut::<T>()
    }
}

// -----------------------------------------------------------------------------
// TypedModel

/// A model type with a statically known descriptor.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a model type",
    note = "consider annotating `{Self}` with `#[derive(Model)]`"
)]
pub trait TypedModel: Model + Sized {
    fn type_info() -> &'static ModelInfo;
}

// -----------------------------------------------------------------------------
// Capabilities

/// Lifecycle callbacks a model may opt into.
///
/// Serialization callbacks run while the engine holds a read lock on the
/// instance, deserialization callbacks while it holds the write lock.
pub trait SerializationCallbacks {
    fn start_serialization(&self) {}

    fn finish_serialization(&self) {}

    fn start_deserialization(&mut self) {}

    fn finish_deserialization(&mut self) {}
}

/// A model that serializes itself as a single value.
///
/// The engine still frames the model (type header, graph id), but writes one
/// member named `Value` instead of the catalog's members.
pub trait CustomSerialization {
    /// The shape of the value produced by [`save`](Self::save).
    fn shape(&self) -> Shape;

    fn save(&self) -> Result<Value, ValueError>;

    fn load(&mut self, value: Value) -> Result<(), ValueError>;
}

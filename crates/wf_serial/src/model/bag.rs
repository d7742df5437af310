use wf_utils::hash::HashMap;

use crate::value::{MemberType, Value};

/// Backing storage for dynamic properties.
///
/// A model declares its dynamic properties in its [`ModelInfo`](crate::model::ModelInfo)
/// and exposes the bag through [`Model::property_bag`](crate::model::Model::property_bag).
/// Undeclared keys may be stored but are never serialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: HashMap<&'static str, Value>,
}

impl PropertyBag {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Reads and converts a property. Returns `None` if it is absent or of
    /// another type.
    pub fn get_as<T: MemberType>(&self, name: &str) -> Option<T> {
        self.values
            .get(name)
            .and_then(|value| T::from_value(value.clone()).ok())
    }

    pub fn set<T: MemberType>(&mut self, name: &'static str, value: T) -> Option<Value> {
        self.set_value(name, value.to_value())
    }

    pub fn set_value(&mut self, name: &'static str, value: Value) -> Option<Value> {
        self.values.insert(name, value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }
}

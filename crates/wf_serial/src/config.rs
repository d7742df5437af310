//! Per-operation configuration.

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

use serde::{Deserialize, Serialize};
use wf_utils::TypeIdMap;

use crate::value::Culture;

/// Default limit on model nesting.
pub const DEFAULT_MAX_DEPTH: usize = 128;

// -----------------------------------------------------------------------------
// SerializationConfiguration

/// Settings passed through every serialize and deserialize call.
///
/// Everything except [`extensions`](Self::extensions) can be loaded from a
/// configuration file; missing fields take their defaults.
///
/// ```
/// use wf_serial::config::SerializationConfiguration;
///
/// let config: SerializationConfiguration =
///     serde_json::from_str(r#"{ "max_depth": 16, "enum_as_string": true }"#).unwrap();
/// assert_eq!(config.max_depth, 16);
/// assert_eq!(config.culture.decimal_separator, '.');
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationConfiguration {
    /// Used when scalars are written as text.
    pub culture: Culture,
    /// Nesting limit; exceeding it aborts the operation.
    pub max_depth: usize,
    /// Write enums by name unless a member, modifier or enum type decides.
    pub enum_as_string: bool,
    /// Backend-specific settings, opaque to the core.
    #[serde(skip)]
    pub extensions: Extensions,
}

impl SerializationConfiguration {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.culture = culture;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_enum_as_string(mut self, enabled: bool) -> Self {
        self.enum_as_string = enabled;
        self
    }

    pub fn with_extension<T: Any + Send + Sync>(mut self, extension: T) -> Self {
        self.extensions.insert(extension);
        self
    }

    #[inline]
    pub fn extension<T: Any>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }
}

impl Default for SerializationConfiguration {
    fn default() -> Self {
        Self {
            culture: Culture::invariant(),
            max_depth: DEFAULT_MAX_DEPTH,
            enum_as_string: false,
            extensions: Extensions::default(),
        }
    }
}

// -----------------------------------------------------------------------------
// Extensions

/// Type-keyed backend settings.
#[derive(Clone, Default)]
pub struct Extensions(TypeIdMap<Arc<dyn Any + Send + Sync>>);

impl Extensions {
    /// Stores `extension`, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, extension: T) {
        self.0.insert_type::<T>(Arc::new(extension));
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0
            .get_type::<T>()
            .and_then(|extension| (**extension).downcast_ref::<T>())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.0.len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::SerializationConfiguration;

    #[derive(Debug, PartialEq)]
    struct Indent(usize);

    #[test]
    fn loads_from_ron() {
        let config: SerializationConfiguration = ron::from_str(
            "(culture: (name: \"de-DE\", decimal_separator: ','), max_depth: 12)",
        )
        .unwrap();

        assert_eq!(config.max_depth, 12);
        assert_eq!(config.culture.decimal_separator, ',');
        assert!(!config.enum_as_string);
        assert!(config.extensions.is_empty());
    }

    #[test]
    fn extensions_are_typed() {
        let config = SerializationConfiguration::new().with_extension(Indent(4));
        assert_eq!(config.extension::<Indent>(), Some(&Indent(4)));
        assert_eq!(config.extension::<u8>(), None);
    }
}

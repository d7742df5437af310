//! Error taxonomy.
//!
//! Two severities exist:
//!
//! - [`SerializeError`] aborts the whole operation. Backend failures, broken
//!   framing, unresolved references, depth overflow and modifier errors are
//!   fatal.
//! - [`DecodeError`] concerns one member. It is wrapped in a
//!   [`MemberFailure`], appended to the operation report, and the walk goes on.

use alloc::boxed::Box;
use alloc::string::String;
use core::error::Error;
use core::fmt;

use thiserror::Error;

use crate::reference::GraphId;
use crate::value::ValueError;

/// A boxed, thread-safe error from a backend or modifier.
pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

// -----------------------------------------------------------------------------
// SerializeError

/// A failure that aborts a serialize or deserialize operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SerializeError {
    /// The backend could not read or write.
    #[error("backend failure: {0}")]
    Backend(#[source] BoxedError),
    /// The root element is missing, unreadable, or not a model of the requested type.
    #[error("malformed root element: {0}")]
    MalformedRoot(#[source] DecodeError),
    /// A back-reference names a graph id no instance was materialized for.
    #[error("reference to graph id `{0}` has no materialized instance")]
    UnknownReference(GraphId),
    /// The same graph id was bound to two different instances.
    #[error("graph id `{0}` is bound to two different instances")]
    DuplicateGraphId(GraphId),
    /// Nesting went deeper than the configured limit.
    #[error("maximum depth of {max} exceeded while entering `{type_path}`")]
    DepthExceeded { max: usize, type_path: &'static str },
    /// The root header names a type that is not registered.
    #[error("no model type registered under `{0}`")]
    UnknownRootType(String),
    /// The root model could not be instantiated.
    #[error("cannot create an instance of root model `{0}`")]
    RootActivation(&'static str),
    /// A serializer modifier failed; surfaced unchanged.
    #[error(transparent)]
    Modifier(BoxedError),
}

impl SerializeError {
    /// Wraps a backend error.
    #[inline]
    pub fn backend(error: impl Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(error))
    }
}

// -----------------------------------------------------------------------------
// DecodeError

/// A failure confined to one member.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The element has a different structure than the declared shape needs.
    #[error("expected {expected}, found {found}")]
    UnexpectedElement {
        expected: &'static str,
        found: &'static str,
    },
    /// Conversion between a value and its member type failed.
    #[error(transparent)]
    Value(#[from] ValueError),
    /// A header names a type the registry does not know.
    #[error("unknown model type `{0}`")]
    UnknownType(String),
    /// A header names a type that cannot fill the declared slot.
    #[error("model type `{found}` cannot be stored as `{expected}`")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    /// No instance of the resolved type could be created.
    #[error("cannot create an instance of `{0}`")]
    Activation(&'static str),
    /// A text representation was required but the element was not text.
    #[error("member `{0}` is not valid text")]
    MissingText(&'static str),
    /// Free-form backend message.
    #[error("{0}")]
    Custom(String),
}

// -----------------------------------------------------------------------------
// MemberFailure

/// A per-member failure recorded during an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberFailure {
    /// Type path of the model that owns the member.
    pub model_type: &'static str,
    /// Serialization name of the member, with an `[index]` suffix for elements.
    pub member: String,
    pub reason: DecodeError,
}

impl fmt::Display for MemberFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}.{}`: {}", self.model_type, self.member, self.reason)
    }
}

impl Error for MemberFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.reason)
    }
}

//! The orchestration core.
//!
//! A [`Serializer`] binds a [`Backend`] to a set of [`SerializationServices`]
//! and a [`SerializationConfiguration`]. Every call opens a fresh
//! [`SerializationContext`], so reference ids and recorded failures never
//! leak from one operation into the next.
//!
//! Failures come in two severities. A [`SerializeError`] aborts the call. A
//! member that cannot be converted is recorded as a [`MemberFailure`] and the
//! walk goes on; callers find those in [`SerializeReport::failures`] and
//! [`Deserialized::failures`].

pub(crate) mod classify;

mod de;
mod member;
mod ser;
mod services;

#[cfg(test)]
mod tests;

pub use member::{ITEMS_MEMBER, MemberValue, VALUE_MEMBER};
pub use services::SerializationServices;

use alloc::vec::Vec;
use std::io;

use crate::backend::Backend;
use crate::config::SerializationConfiguration;
use crate::context::{SerializationContext, SerializationMode};
use crate::error::{DecodeError, MemberFailure, SerializeError};
use crate::model::{Shared, SharedAny, TypedModel};
use crate::value::{MemberType, Shape, Value, ValueError};

use de::ReadDriver;
use ser::WriteDriver;

// -----------------------------------------------------------------------------
// Reports

/// The outcome of a successful serialize call.
#[derive(Debug, Default)]
pub struct SerializeReport {
    /// Members that could not be written.
    pub failures: Vec<MemberFailure>,
}

impl SerializeReport {
    /// Returns `true` if every member was written.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The outcome of a successful deserialize call.
#[derive(Debug)]
pub struct Deserialized<T> {
    pub value: T,
    /// Members that could not be read. They keep their default value.
    pub failures: Vec<MemberFailure>,
}

impl<T> Deserialized<T> {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Serializer

/// Serializes model graphs with one backend.
///
/// # Examples
///
/// ```
/// use wf_serial::prelude::*;
///
/// #[derive(Model, Default)]
/// struct Tag {
///     label: String,
/// }
///
/// #[derive(Model, Default)]
/// struct Post {
///     first: Option<Shared<Tag>>,
///     second: Option<Shared<Tag>>,
/// }
///
/// let tag = Shared::new(Tag { label: "rust".into() });
/// let post = Shared::new(Post { first: Some(tag.clone()), second: Some(tag) });
///
/// let mut serializer = Serializer::new(JsonBackend::new(), SerializationServices::new());
/// let mut out = Vec::new();
/// serializer.serialize(&post, &mut out).unwrap();
///
/// let back = serializer.deserialize::<Post>(out.as_slice()).unwrap().value;
/// let back = back.read();
/// assert!(back.first.as_ref().unwrap().ptr_eq(back.second.as_ref().unwrap()));
/// ```
pub struct Serializer<B: Backend> {
    backend: B,
    services: SerializationServices,
    configuration: SerializationConfiguration,
}

impl<B: Backend> Serializer<B> {
    /// Creates a serializer with the default configuration.
    pub fn new(backend: B, services: SerializationServices) -> Self {
        Self::with_configuration(backend, services, SerializationConfiguration::default())
    }

    pub fn with_configuration(
        backend: B,
        services: SerializationServices,
        configuration: SerializationConfiguration,
    ) -> Self {
        Self {
            backend,
            services,
            configuration,
        }
    }

    #[inline]
    pub fn configuration(&self) -> &SerializationConfiguration {
        &self.configuration
    }

    #[inline]
    pub fn configuration_mut(&mut self) -> &mut SerializationConfiguration {
        &mut self.configuration
    }

    #[inline]
    pub fn services(&self) -> &SerializationServices {
        &self.services
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Writes the graph rooted at `root` to `sink`.
    pub fn serialize<T: TypedModel>(
        &mut self,
        root: &Shared<T>,
        sink: impl io::Write,
    ) -> Result<SerializeReport, SerializeError> {
        self.serialize_any(&root.to_any(), sink)
    }

    /// Writes the graph rooted at a type-erased model.
    pub fn serialize_any(
        &mut self,
        root: &SharedAny,
        mut sink: impl io::Write,
    ) -> Result<SerializeReport, SerializeError> {
        let mut ctx = SerializationContext::new(SerializationMode::Serialize, &self.configuration);
        self.backend
            .open_sink(&ctx)
            .map_err(SerializeError::backend)?;

        let element = WriteDriver {
            backend: &mut self.backend,
            services: &self.services,
        }
        .write_model(&mut ctx, root, None)?;

        self.backend
            .close_sink(&ctx, element, &mut sink)
            .map_err(SerializeError::backend)?;

        let report = SerializeReport {
            failures: ctx.take_failures(),
        };
        log::debug!(
            "serialized `{}` with {} member failures",
            root.info().type_path(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Writes a value that is not a model: a collection, a dictionary or a
    /// single scalar.
    pub fn serialize_value<T: MemberType>(
        &mut self,
        value: &T,
        mut sink: impl io::Write,
    ) -> Result<SerializeReport, SerializeError> {
        let member = MemberValue::root::<T>(value.to_value());

        let mut ctx = SerializationContext::new(SerializationMode::Serialize, &self.configuration);
        self.backend
            .open_sink(&ctx)
            .map_err(SerializeError::backend)?;

        let element = WriteDriver {
            backend: &mut self.backend,
            services: &self.services,
        }
        .write_root_value(&mut ctx, &member)?;

        self.backend
            .close_sink(&ctx, element, &mut sink)
            .map_err(SerializeError::backend)?;

        Ok(SerializeReport {
            failures: ctx.take_failures(),
        })
    }

    /// Reads a graph whose root is a `T`.
    pub fn deserialize<T: TypedModel>(
        &mut self,
        source: impl io::Read,
    ) -> Result<Deserialized<Shared<T>>, SerializeError> {
        let Deserialized { value, failures } =
            self.deserialize_root(source, Shape::Model(T::type_info()))?;

        match value.downcast::<T>() {
            Some(value) => Ok(Deserialized { value, failures }),
            None => Err(SerializeError::MalformedRoot(DecodeError::TypeMismatch {
                expected: T::type_info().type_path(),
                found: value.info().type_path().into(),
            })),
        }
    }

    /// Reads a graph whose root type is resolved through the registry.
    pub fn deserialize_any(
        &mut self,
        source: impl io::Read,
    ) -> Result<Deserialized<SharedAny>, SerializeError> {
        self.deserialize_root(source, Shape::AnyModel)
    }

    /// Reads a value written by [`serialize_value`](Self::serialize_value).
    pub fn deserialize_value<T: MemberType>(
        &mut self,
        mut source: impl io::Read,
    ) -> Result<Deserialized<T>, SerializeError> {
        let member = MemberValue::root::<T>(Value::Null);

        let mut ctx = SerializationContext::new(SerializationMode::Deserialize, &self.configuration);
        let element = self
            .backend
            .open_source(&ctx, &mut source)
            .map_err(SerializeError::backend)?;

        let value = ReadDriver {
            backend: &mut self.backend,
            services: &self.services,
        }
        .read_root_value(&mut ctx, element, &member)?;

        let value = T::from_value(value)
            .map_err(|error: ValueError| SerializeError::MalformedRoot(error.into()))?;
        Ok(Deserialized {
            value,
            failures: ctx.take_failures(),
        })
    }

    fn deserialize_root(
        &mut self,
        mut source: impl io::Read,
        declared: Shape,
    ) -> Result<Deserialized<SharedAny>, SerializeError> {
        let mut ctx = SerializationContext::new(SerializationMode::Deserialize, &self.configuration);
        let element = self
            .backend
            .open_source(&ctx, &mut source)
            .map_err(SerializeError::backend)?;

        let root = ReadDriver {
            backend: &mut self.backend,
            services: &self.services,
        }
        .read_model(&mut ctx, element, declared, None)?;

        let value = match root {
            Ok(value) => value,
            Err(DecodeError::UnknownType(path)) => return Err(SerializeError::UnknownRootType(path)),
            Err(DecodeError::Activation(path)) => return Err(SerializeError::RootActivation(path)),
            Err(reason) => return Err(SerializeError::MalformedRoot(reason)),
        };

        let failures = ctx.take_failures();
        log::debug!(
            "deserialized `{}` with {} member failures",
            value.info().type_path(),
            failures.len()
        );
        Ok(Deserialized { value, failures })
    }
}

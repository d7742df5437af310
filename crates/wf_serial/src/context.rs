//! Per-operation state.
//!
//! One [`SerializationContext`] lives for one serialize or deserialize call.
//! It owns the operation's [`ReferenceManager`], the stack of models being
//! visited and the failures recorded so far. Nested models are visited
//! through [`ContextScope`] guards, which pop their frame when dropped, on
//! error paths included.

use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::ops::{Deref, DerefMut};

use crate::config::SerializationConfiguration;
use crate::error::{DecodeError, MemberFailure, SerializeError};
use crate::model::{ModelInfo, TypedModel};
use crate::reference::{GraphId, ReferenceManager};

/// Direction of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationMode {
    Serialize,
    Deserialize,
}

// -----------------------------------------------------------------------------
// Frame

/// One entry of the visit stack.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub type_path: &'static str,
    /// `None` for root values that are not models.
    pub info: Option<&'static ModelInfo>,
    pub graph_id: Option<GraphId>,
}

impl Frame {
    #[inline]
    pub fn model(info: &'static ModelInfo, graph_id: Option<GraphId>) -> Self {
        Self {
            type_path: info.type_path(),
            info: Some(info),
            graph_id,
        }
    }

    #[inline]
    pub fn value(type_path: &'static str) -> Self {
        Self {
            type_path,
            info: None,
            graph_id: None,
        }
    }
}

// -----------------------------------------------------------------------------
// SerializationContext

/// The state of one operation.
pub struct SerializationContext<'a> {
    mode: SerializationMode,
    configuration: &'a SerializationConfiguration,
    references: ReferenceManager,
    frames: Vec<Frame>,
    failures: Vec<MemberFailure>,
}

impl<'a> SerializationContext<'a> {
    /// Creates the root context with an empty reference manager.
    pub fn new(mode: SerializationMode, configuration: &'a SerializationConfiguration) -> Self {
        Self {
            mode,
            configuration,
            references: ReferenceManager::new(),
            frames: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[inline]
    pub fn mode(&self) -> SerializationMode {
        self.mode
    }

    #[inline]
    pub fn configuration(&self) -> &'a SerializationConfiguration {
        self.configuration
    }

    /// Shorthand for a configuration extension.
    #[inline]
    pub fn extension<T: Any>(&self) -> Option<&'a T> {
        self.configuration.extension::<T>()
    }

    #[inline]
    pub fn references(&self) -> &ReferenceManager {
        &self.references
    }

    #[inline]
    pub fn references_mut(&mut self) -> &mut ReferenceManager {
        &mut self.references
    }

    /// Number of frames currently entered.
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// The frame enclosing the current one.
    pub fn parent(&self) -> Option<&Frame> {
        self.frames.len().checked_sub(2).map(|index| &self.frames[index])
    }

    /// Type paths of the entered frames, root first.
    pub fn type_stack(&self) -> impl ExactSizeIterator<Item = &'static str> + '_ {
        self.frames.iter().map(|frame| frame.type_path)
    }

    /// Whether a frame of `info`, or of a type deriving from it, is entered.
    pub fn is_inside(&self, info: &ModelInfo) -> bool {
        self.frames
            .iter()
            .filter_map(|frame| frame.info)
            .any(|entered| entered.is_subtype_of(info))
    }

    #[inline]
    pub fn is_inside_type<T: TypedModel>(&self) -> bool {
        self.is_inside(T::type_info())
    }

    /// Pushes `frame` and returns a guard that pops it.
    ///
    /// Fails without pushing once the configured depth limit is reached.
    pub fn enter(&mut self, frame: Frame) -> Result<ContextScope<'_, 'a>, SerializeError> {
        let max = self.configuration.max_depth;
        if self.frames.len() >= max {
            log::warn!(
                "depth limit {max} reached entering `{}`",
                frame.type_path
            );
            return Err(SerializeError::DepthExceeded {
                max,
                type_path: frame.type_path,
            });
        }
        self.frames.push(frame);
        Ok(ContextScope { context: self })
    }

    /// Records a member-level failure and keeps going.
    pub fn record_failure(
        &mut self,
        model_type: &'static str,
        member: impl Into<String>,
        reason: DecodeError,
    ) {
        let failure = MemberFailure {
            model_type,
            member: member.into(),
            reason,
        };
        log::debug!("member failure: {failure}");
        self.failures.push(failure);
    }

    #[inline]
    pub fn failures(&self) -> &[MemberFailure] {
        &self.failures
    }

    #[inline]
    pub fn take_failures(&mut self) -> Vec<MemberFailure> {
        core::mem::take(&mut self.failures)
    }
}

// -----------------------------------------------------------------------------
// ContextScope

/// A frame of the visit stack, popped on drop.
pub struct ContextScope<'c, 'a> {
    context: &'c mut SerializationContext<'a>,
}

impl<'a> Deref for ContextScope<'_, 'a> {
    type Target = SerializationContext<'a>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for ContextScope<'_, '_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl Drop for ContextScope<'_, '_> {
    fn drop(&mut self) {
        self.context.frames.pop();
    }
}

// -----------------------------------------------------------------------------
// Tests

//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use cog_core::prelude::*;
//! ```

pub use crate::cog::{Cog, CogFlags, CogId, CogState};
pub use crate::component::{Component, ComponentInfo, ComponentRegistry, TypeKey};
pub use crate::config::{EmptyBatchPolicy, OperationQueueConfig, SpaceConfig};
pub use crate::error::{CogError, DependencyError};
pub use crate::event::CogEvent;
pub use crate::hierarchy::{ancestors, children, entire_tree, roots, sub_tree};
pub use crate::impl_component;
pub use crate::observer::{Observer, RecordingObserver};
pub use crate::operation::{
    Operation, OperationContext, OperationId, OperationQueue, QueueEvent, QueueObserver,
};
pub use crate::property::{MutationContext, PropertyValue};
pub use crate::snapshot::CogSnapshot;
pub use crate::space::Space;
pub use crate::undo_map::UndoObjectId;

//! Prelude module for Horizon Stack.
//!
//! This module re-exports the most commonly used types for convenient importing:
//!
//! ```ignore
//! use horizon_stack::prelude::*;
//! ```

// ============================================================================
// Hosting
// ============================================================================

pub use crate::{Controller, ControllerBuilder, ControllerConfig};

// ============================================================================
// Components and Models
// ============================================================================

pub use crate::component::{Component, MutationPhase};
pub use crate::model::{ComponentKind, ComponentModel, Item, ItemChanges, Layout};

// ============================================================================
// Rendering Adapters
// ============================================================================

pub use crate::interface::{Animation, Completion, HeadlessInterface, UserInterface};
pub use crate::view::{ItemView, ViewRegistry};

// ============================================================================
// Geometry, Errors and Execution
// ============================================================================

pub use crate::error::{Result, StackError};
pub use crate::geometry::{Insets, Rect, Size};
pub use horizon_stack_core::{Dispatcher, Signal};

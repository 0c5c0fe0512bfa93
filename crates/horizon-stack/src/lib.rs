//! Horizon Stack - stacked, data-driven component views.
//!
//! A [`Controller`] hosts an ordered list of [`Component`]s (lists, grids,
//! carousels), each backed by a declarative [`ComponentModel`](model::ComponentModel)
//! and rendered through a platform adapter implementing [`UserInterface`].
//! The [`ComponentManager`] turns data mutations into model changes plus
//! the minimal adapter calls, on the main context provided by a
//! [`Dispatcher`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_stack::{Animation, Controller, HeadlessInterface, Size, UserInterface};
//! use horizon_stack::model::{ComponentKind, ComponentModel, Item};
//!
//! let controller = Controller::builder()
//!     .model(ComponentModel::new(ComponentKind::List))
//!     .interface_factory(|_| Arc::new(HeadlessInterface::new()) as Arc<dyn UserInterface>)
//!     .build()?;
//! controller.setup(Size::new(375.0, 667.0));
//!
//! controller.append_items(
//!     0,
//!     vec![Item::new("Inbox"), Item::new("Drafts")],
//!     Animation::Automatic,
//!     None,
//! );
//! controller.dispatcher().run_until_idle();
//!
//! assert_eq!(controller.component_at(0).unwrap().item_count(), 2);
//! # Ok::<(), horizon_stack::StackError>(())
//! ```

pub mod component;
pub mod config;
pub mod controller;
pub mod debug;
mod error;
pub mod geometry;
pub mod interface;
pub mod manager;
pub mod model;
pub mod prelude;
pub mod view;

pub use component::{Component, ComponentSignals, MutationPhase};
pub use config::ControllerConfig;
pub use controller::{Controller, ControllerBuilder, ControllerSignals, InterfaceFactory};
pub use debug::{ComponentTreeDebug, TreeFormatOptions, TreeStyle};
pub use error::{Result, StackError};
pub use geometry::{Insets, Rect, Size};
pub use interface::{
    Animation, Completion, HeadlessInterface, InterfaceCall, UpdateTransaction, UserInterface,
};
pub use manager::{ComponentManager, CompositeReconciler, DEFAULT_COMPOSITE_KIND};
pub use view::{FixedSizeView, ItemView, ViewRegistry};

pub use horizon_stack_core::{Dispatcher, DispatcherConfig, PerfSpan, Signal};

//! Declarative models for components.
//!
//! # Core Types
//!
//! - `Item`: one row or cell, compared structurally for diffing
//! - `ComponentModel`: ordered items plus layout metadata
//! - `Layout` / `ComponentKind`: how a component arranges its items
//! - `ItemChanges`: classified difference between two item collections
//!
//! Models are plain values. Components own them and the mutation engine is
//! the only writer once a component is live.
//!
//! ```text
//! ┌────────────────┐   diff    ┌─────────────┐   apply   ┌─────────────┐
//! │ ComponentModel │ ────────> │ ItemChanges │ ────────> │  Component  │
//! │   (old, new)   │           │             │           │ + interface │
//! └────────────────┘           └─────────────┘           └─────────────┘
//! ```

mod changes;
mod component_model;
mod item;
mod layout;

pub use changes::ItemChanges;
pub use component_model::{ComponentModel, ComponentModelDiff};
pub use item::{Item, ItemDiff};
pub use layout::{ComponentKind, Layout};

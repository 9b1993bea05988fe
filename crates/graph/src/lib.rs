//! Scene-graph store: typed objects by id, parent/child relationships, and
//! per-object/per-component mutable properties.
//!
//! # Invariants
//! - All mutations flow through explicit operations and produce an event
//!   record plus a signal invalidation.
//! - Setters return the prior value so callers can build inverse edits.
//! - Iteration order is deterministic (BTreeMap).
//! - Object creation is two-step: `stage_create` then `commit_properties`,
//!   so references between objects created in one batch resolve in any
//!   creation order.

pub mod graph;
pub mod object;
pub mod registry;

pub use graph::{SceneEvent, SceneGraph, Staged};
pub use object::{Component, SceneObject};
pub use registry::{ComponentRegistry, ComponentSchema};

pub fn crate_info() -> &'static str {
    "sceneforge-graph v0.1.0"
}

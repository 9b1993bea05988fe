//! Scene document export/import.
//!
//! Export serializes the full current graph configuration to a JSON text
//! blob. Import parses the same format back into a [`SceneDocument`] and can
//! hand the caller one large add-edit; parsing never touches a graph, and
//! nothing is applied implicitly.
//!
//! # Invariants
//! - Export captures sparse configurations: overrides only, never registry
//!   defaults.
//! - A parsed document is validated (no dangling parents, active page known)
//!   before it can be turned into an edit.

pub mod document;

pub use document::{PageEntry, PersistError, SceneDocument, export, parse};

pub fn crate_info() -> &'static str {
    "sceneforge-persist v0.1.0"
}

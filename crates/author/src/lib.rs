//! Authoring core: reversible edits, undo/redo transactions, selection, and
//! fractional sibling ordering.
//!
//! # Invariants
//! - Every applied edit yields its exact inverse; apply-then-invert leaves
//!   the store observationally unchanged.
//! - Edits sharing a session id coalesce into one undo step.
//! - Undo/redo restore ancillary UI state (active page, selection,
//!   expansion) captured before the original mutation.

pub mod applier;
pub mod edit;
pub mod editor;
pub mod order;
pub mod selection;

pub use applier::{EditApplier, EditError};
pub use edit::{ComponentPatch, Edit, ObjectPatch};
pub use editor::{Editor, UiSnapshot};
pub use selection::Selection;

pub fn crate_info() -> &'static str {
    "sceneforge-author v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("author"));
    }
}

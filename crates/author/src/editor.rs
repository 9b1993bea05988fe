use crate::applier::{EditApplier, EditError};
use crate::edit::{ComponentPatch, Edit, ObjectPatch};
use crate::selection::Selection;
use sceneforge_common::{ObjectConfig, ObjectId, SessionId};
use sceneforge_graph::SceneGraph;
use std::collections::BTreeSet;
use std::collections::btree_map::Entry;

/// Ancillary UI state captured alongside every undo entry and restored
/// before the entry's edit is re-applied.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSnapshot {
    pub active_page: Option<ObjectId>,
    pub selection: BTreeSet<ObjectId>,
    pub expanded: BTreeSet<ObjectId>,
}

impl UiSnapshot {
    pub fn capture(graph: &SceneGraph, selection: &Selection) -> Self {
        Self {
            active_page: graph.active_page(),
            selection: selection.selected().clone(),
            expanded: selection.expanded().clone(),
        }
    }

    pub fn restore(&self, graph: &mut SceneGraph, selection: &mut Selection) {
        graph.set_active_page(self.active_page);
        selection.replace(self.selection.clone());
        selection.replace_expanded(self.expanded.clone());
    }
}

/// One undo (or redo) step: an inverse edit, the gesture that produced it,
/// and the UI state from just before the original mutation.
#[derive(Debug, Clone)]
struct UndoEntry {
    edit: Edit,
    session: SessionId,
    ui: UiSnapshot,
}

/// The transaction manager: owns the undo/redo stacks and the selection
/// model, and decides whether an incoming edit coalesces into the newest
/// undo entry.
///
/// Constructed once per editor session; there is no ambient state.
#[derive(Debug, Default)]
pub struct Editor {
    undo_stack: Vec<UndoEntry>,
    redo_stack: Vec<UndoEntry>,
    selection: Selection,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// Apply an edit as one atomic step.
    ///
    /// Edits sharing the newest entry's session id merge into it, so a whole
    /// gesture (one drag, one slider scrub) undoes in a single step. Any
    /// fresh edit clears the redo stack.
    pub fn apply_edit(
        &mut self,
        graph: &mut SceneGraph,
        edit: &Edit,
        session: SessionId,
    ) -> Result<(), EditError> {
        let snapshot = UiSnapshot::capture(graph, &self.selection);
        let reverse = EditApplier::apply(graph, edit)?;
        match self.undo_stack.last_mut() {
            Some(top) if top.session == session => merge_edit(&mut top.edit, reverse),
            _ => self.undo_stack.push(UndoEntry {
                edit: reverse,
                session,
                ui: snapshot,
            }),
        }
        self.redo_stack.clear();
        tracing::debug!(
            session = session.0,
            depth = self.undo_stack.len(),
            "edit recorded"
        );
        Ok(())
    }

    /// Undo the newest entry. Calling this while [`can_undo`] is false is a
    /// programming error and fails loudly.
    ///
    /// [`can_undo`]: Editor::can_undo
    pub fn undo(&mut self, graph: &mut SceneGraph) -> Result<(), EditError> {
        let entry = match self.undo_stack.pop() {
            Some(entry) => entry,
            None => panic!("undo called with an empty undo stack"),
        };
        let snapshot = UiSnapshot::capture(graph, &self.selection);
        // Restore the pre-edit UI state before mutating, so observers of the
        // selection never see it pointing at objects mid-restoration.
        entry.ui.restore(graph, &mut self.selection);
        let reverse = EditApplier::apply(graph, &entry.edit)?;
        self.redo_stack.push(UndoEntry {
            edit: reverse,
            session: entry.session,
            ui: snapshot,
        });
        tracing::debug!(depth = self.undo_stack.len(), "undo");
        Ok(())
    }

    /// Redo the newest undone entry. Calling this while [`can_redo`] is
    /// false is a programming error and fails loudly.
    ///
    /// [`can_redo`]: Editor::can_redo
    pub fn redo(&mut self, graph: &mut SceneGraph) -> Result<(), EditError> {
        let entry = match self.redo_stack.pop() {
            Some(entry) => entry,
            None => panic!("redo called with an empty redo stack"),
        };
        let snapshot = UiSnapshot::capture(graph, &self.selection);
        entry.ui.restore(graph, &mut self.selection);
        let reverse = EditApplier::apply(graph, &entry.edit)?;
        self.undo_stack.push(UndoEntry {
            edit: reverse,
            session: entry.session,
            ui: snapshot,
        });
        tracing::debug!(depth = self.undo_stack.len(), "redo");
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop all history, e.g. on full scene reset.
    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Merge a fresh inverse into the newest undo entry (same gesture).
///
/// `top` is the older inverse: during undo the merged edit must behave as if
/// `incoming` were applied first and `top` second, so wherever both touch the
/// same slot, `top`'s value wins.
fn merge_edit(top: &mut Edit, incoming: Edit) {
    for (id, mut config) in incoming.add {
        if let Some(patch) = top.edit.remove(&id) {
            fold_patch(&mut config, patch);
            top.add.insert(id, config);
        } else if top.remove.remove(&id) {
            // Removed and re-added within one gesture: nothing to undo.
        } else {
            // An existing entry holds the pre-gesture configuration; a
            // later removal's capture must not displace it.
            top.add.entry(id).or_insert(config);
        }
    }
    for (id, patch) in incoming.edit {
        // Ids the older entry already removes or wholesale-restores need no
        // patch; applying one on top of the restored configuration would
        // write back mid-gesture values.
        if top.remove.contains(&id) || top.add.contains_key(&id) {
            continue;
        }
        match top.edit.entry(id) {
            Entry::Occupied(mut entry) => merge_patch(entry.get_mut(), patch),
            Entry::Vacant(entry) => {
                entry.insert(patch);
            }
        }
    }
    for id in incoming.remove {
        if !top.add.contains_key(&id) {
            top.remove.insert(id);
        }
    }
}

/// Apply the older entry's pending patch on top of a re-add configuration.
fn fold_patch(config: &mut ObjectConfig, patch: ObjectPatch) {
    if let Some(parent) = patch.parent {
        config.parent = parent;
    }
    if let Some(order) = patch.order {
        config.order = order;
    }
    for (name, value) in patch.fields {
        if value.is_null() {
            config.fields.remove(&name);
        } else {
            config.fields.insert(name, value);
        }
    }
    for (name, cpatch) in patch.components {
        match cpatch {
            ComponentPatch::Patch(props) => {
                let slot = config.components.entry(name).or_default();
                for (property, value) in props {
                    if value.is_null() {
                        slot.remove(&property);
                    } else {
                        slot.insert(property, value);
                    }
                }
            }
            ComponentPatch::Add(props) => {
                config.components.insert(name, props);
            }
            ComponentPatch::Remove => {
                config.components.remove(&name);
            }
        }
    }
}

/// Merge two patches of the same object; `top`'s slots win.
fn merge_patch(top: &mut ObjectPatch, incoming: ObjectPatch) {
    if top.parent.is_none() {
        top.parent = incoming.parent;
    }
    if top.order.is_none() {
        top.order = incoming.order;
    }
    for (name, value) in incoming.fields {
        top.fields.entry(name).or_insert(value);
    }
    for (name, cpatch) in incoming.components {
        let merged = match (top.components.remove(&name), cpatch) {
            (None, fresh) => Some(fresh),
            (Some(ComponentPatch::Patch(mut top_props)), ComponentPatch::Patch(props)) => {
                for (property, value) in props {
                    top_props.entry(property).or_insert(value);
                }
                Some(ComponentPatch::Patch(top_props))
            }
            // The component is re-attached first, then refined by the older
            // entry's property restorations.
            (Some(ComponentPatch::Patch(top_props)), ComponentPatch::Add(mut props)) => {
                for (property, value) in top_props {
                    if value.is_null() {
                        props.remove(&property);
                    } else {
                        props.insert(property, value);
                    }
                }
                Some(ComponentPatch::Add(props))
            }
            // Attached and detached again within one gesture: cancels out.
            (Some(ComponentPatch::Remove), ComponentPatch::Add(_)) => None,
            // An older Add or Remove already decides the outcome.
            (Some(existing), _) => Some(existing),
        };
        if let Some(patch) = merged {
            top.components.insert(name, patch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneforge_common::{ComponentConfig, Value};
    use sceneforge_graph::ComponentRegistry;

    fn setup() -> (SceneGraph, Editor, ObjectId) {
        let mut graph = SceneGraph::new(ComponentRegistry::standard());
        let page = graph.add_page("Main");
        (graph, Editor::new(), page)
    }

    fn spawn(
        graph: &mut SceneGraph,
        editor: &mut Editor,
        parent: ObjectId,
        order: f64,
    ) -> ObjectId {
        let id = ObjectId::new();
        let config = ObjectConfig::at(Some(parent), order)
            .with_component("shape", ComponentConfig::new());
        editor
            .apply_edit(graph, &Edit::new().add_object(id, config), SessionId(0))
            .unwrap();
        id
    }

    #[test]
    fn rename_undo_redo_scenario() {
        let (mut graph, mut editor, page) = setup();
        let a = spawn(&mut graph, &mut editor, page, 0.0);
        let _b = spawn(&mut graph, &mut editor, page, 1.0);

        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(a, ObjectPatch::new().field("name", "Foo")),
                SessionId(1),
            )
            .unwrap();
        assert_eq!(graph.field(a, "name"), Value::from("Foo"));

        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.field(a, "name"), Value::Null);
        assert!(editor.can_redo());

        editor.redo(&mut graph).unwrap();
        assert_eq!(graph.field(a, "name"), Value::from("Foo"));
    }

    #[test]
    fn undo_then_redo_reproduces_forward_effect() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);

        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().property("shape", "size", 7.0)),
                SessionId(1),
            )
            .unwrap();
        let after = graph.full_config(id);

        editor.undo(&mut graph).unwrap();
        editor.redo(&mut graph).unwrap();
        assert_eq!(graph.full_config(id), after);
    }

    #[test]
    fn same_session_edits_coalesce_into_one_step() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);
        let before = graph.full_config(id);
        let depth = editor.undo_count();

        // One drag: a run of order updates sharing a session id.
        let drag = SessionId(42);
        for order in [0.5, 0.25, 0.125] {
            editor
                .apply_edit(
                    &mut graph,
                    &Edit::new().patch(id, ObjectPatch::new().reorder(order)),
                    drag,
                )
                .unwrap();
        }
        assert_eq!(editor.undo_count(), depth + 1);
        assert_eq!(graph.require(id).order(), 0.125);

        // A single undo lands back before the whole drag.
        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.full_config(id), before);
    }

    #[test]
    fn distinct_sessions_do_not_coalesce() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);
        let depth = editor.undo_count();

        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().reorder(0.5)),
                SessionId(1),
            )
            .unwrap();
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().reorder(0.25)),
                SessionId(2),
            )
            .unwrap();
        assert_eq!(editor.undo_count(), depth + 2);

        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.require(id).order(), 0.5);
    }

    #[test]
    fn coalesced_add_and_patch_undo_together() {
        let (mut graph, mut editor, page) = setup();
        let session = SessionId(7);
        let id = ObjectId::new();
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().add_object(id, ObjectConfig::at(Some(page), 0.0)),
                session,
            )
            .unwrap();
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().field("name", "Fresh")),
                session,
            )
            .unwrap();
        assert_eq!(editor.undo_count(), 1);

        editor.undo(&mut graph).unwrap();
        assert!(!graph.contains(id));
    }

    #[test]
    fn remove_and_readd_in_one_gesture_cancel_out() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().field("name", "Original")),
                SessionId(1),
            )
            .unwrap();
        let before = graph.full_config(id);

        let session = SessionId(9);
        editor
            .apply_edit(&mut graph, &Edit::new().remove_object(id), session)
            .unwrap();
        let readd = ObjectConfig::at(Some(page), 0.0).with_field("name", "Replacement");
        editor
            .apply_edit(&mut graph, &Edit::new().add_object(id, readd), session)
            .unwrap();
        assert_eq!(graph.field(id, "name"), Value::from("Replacement"));

        // One undo restores the pre-gesture object.
        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.full_config(id), before);

        // And redo brings the replacement back, not a deletion.
        editor.redo(&mut graph).unwrap();
        assert!(graph.contains(id));
        assert_eq!(graph.field(id, "name"), Value::from("Replacement"));
    }

    #[test]
    fn repeated_remove_and_readd_keeps_pre_gesture_state() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().field("name", "Original")),
                SessionId(1),
            )
            .unwrap();
        let before = graph.full_config(id);

        // One gesture churns the object twice; only the oldest capture may
        // survive the merge.
        let session = SessionId(11);
        for name in ["First", "Second"] {
            editor
                .apply_edit(&mut graph, &Edit::new().remove_object(id), session)
                .unwrap();
            editor
                .apply_edit(
                    &mut graph,
                    &Edit::new()
                        .add_object(id, ObjectConfig::at(Some(page), 0.0).with_field("name", name)),
                    session,
                )
                .unwrap();
        }
        assert_eq!(graph.field(id, "name"), Value::from("Second"));

        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.full_config(id), before);
    }

    #[test]
    fn patch_after_readd_in_one_gesture_is_subsumed() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().field("name", "Original")),
                SessionId(1),
            )
            .unwrap();
        let before = graph.full_config(id);

        let session = SessionId(12);
        editor
            .apply_edit(&mut graph, &Edit::new().remove_object(id), session)
            .unwrap();
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().add_object(id, ObjectConfig::at(Some(page), 0.0)),
                session,
            )
            .unwrap();
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().field("name", "Mid")),
                session,
            )
            .unwrap();

        // The merged entry restores the object wholesale; the later patch
        // must not smear mid-gesture values over it.
        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.full_config(id), before);
    }

    #[test]
    fn component_remove_and_readd_in_one_gesture() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().property("shape", "size", 9.0)),
                SessionId(1),
            )
            .unwrap();

        let session = SessionId(13);
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().remove_component("shape")),
                session,
            )
            .unwrap();
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(
                    id,
                    ObjectPatch::new().add_component(
                        "shape",
                        ComponentConfig::from([("kind".to_owned(), Value::from("sphere"))]),
                    ),
                ),
                session,
            )
            .unwrap();

        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.property(id, "shape", "size"), Value::from(9.0));
        assert_eq!(graph.property(id, "shape", "kind"), Value::from("box"));

        editor.redo(&mut graph).unwrap();
        assert_eq!(graph.property(id, "shape", "kind"), Value::from("sphere"));
        assert_eq!(graph.property(id, "shape", "size"), Value::from(1.0));
    }

    #[test]
    fn component_add_then_remove_in_one_gesture_cancels() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);

        let session = SessionId(14);
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().property("light", "intensity", 2.0)),
                session,
            )
            .unwrap();
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().remove_component("light")),
                session,
            )
            .unwrap();
        assert!(!graph.has_component(id, "light"));

        // The gesture's net effect on the component is nothing; undo must
        // neither re-attach it nor fail trying to detach it twice.
        editor.undo(&mut graph).unwrap();
        assert!(!graph.has_component(id, "light"));
    }

    #[test]
    fn subtree_removal_round_trips() {
        let (mut graph, mut editor, page) = setup();
        let root = spawn(&mut graph, &mut editor, page, 0.0);
        let child = spawn(&mut graph, &mut editor, root, 0.0);
        let grandchild = spawn(&mut graph, &mut editor, child, 0.0);

        let edit = Edit::remove_subtree(&graph, root);
        editor.apply_edit(&mut graph, &edit, SessionId(3)).unwrap();
        assert!(!graph.contains(root));
        assert!(!graph.contains(child));
        assert!(!graph.contains(grandchild));

        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.require(grandchild).parent(), Some(child));
        assert_eq!(graph.require(child).parent(), Some(root));
        assert_eq!(graph.require(root).parent(), Some(page));
    }

    #[test]
    fn undo_restores_selection_and_expansion() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);

        editor.selection_mut().select_only(id);
        editor.selection_mut().expand(page);
        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().field("name", "Foo")),
                SessionId(5),
            )
            .unwrap();
        editor.selection_mut().clear();
        editor.selection_mut().collapse(page);

        editor.undo(&mut graph).unwrap();
        assert!(editor.selection().is_selected(id));
        assert!(editor.selection().is_expanded(page));

        // Redo restores the post-edit UI state captured at undo time.
        editor.redo(&mut graph).unwrap();
        assert!(editor.selection().selected().is_empty());
        assert!(!editor.selection().is_expanded(page));
    }

    #[test]
    fn undo_restores_active_page() {
        let (mut graph, mut editor, page) = setup();
        let id = spawn(&mut graph, &mut editor, page, 0.0);
        let other = graph.add_page("Other");

        editor
            .apply_edit(
                &mut graph,
                &Edit::new().patch(id, ObjectPatch::new().field("name", "Foo")),
                SessionId(5),
            )
            .unwrap();
        graph.set_active_page(Some(other));

        editor.undo(&mut graph).unwrap();
        assert_eq!(graph.active_page(), Some(page));
    }

    #[test]
    fn fresh_edit_clears_redo() {
        let (mut graph, mut editor, page) = setup();
        let _first = spawn(&mut graph, &mut editor, page, 0.0);
        editor.undo(&mut graph).unwrap();
        assert!(editor.can_redo());

        let _second = spawn(&mut graph, &mut editor, page, 1.0);
        assert!(!editor.can_redo());
    }

    #[test]
    fn clear_history_empties_both_stacks() {
        let (mut graph, mut editor, page) = setup();
        let _ = spawn(&mut graph, &mut editor, page, 0.0);
        editor.undo(&mut graph).unwrap();
        editor.clear_history();
        assert!(!editor.can_undo());
        assert!(!editor.can_redo());
    }

    #[test]
    #[should_panic(expected = "empty undo stack")]
    fn undo_on_empty_stack_panics() {
        let (mut graph, mut editor, _page) = setup();
        let _ = editor.undo(&mut graph);
    }

    #[test]
    #[should_panic(expected = "empty redo stack")]
    fn redo_on_empty_stack_panics() {
        let (mut graph, mut editor, _page) = setup();
        let _ = editor.redo(&mut graph);
    }
}

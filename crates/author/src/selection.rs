use sceneforge_common::ObjectId;
use sceneforge_graph::SceneGraph;
use std::collections::BTreeSet;

/// Mutable id sets for multi-selection and tree expansion.
///
/// Plain data: the transaction layer snapshots and restores these sets
/// wholesale around undo/redo.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    selected: BTreeSet<ObjectId>,
    expanded: BTreeSet<ObjectId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Selected ids ---

    pub fn selected(&self) -> &BTreeSet<ObjectId> {
        &self.selected
    }

    pub fn is_selected(&self, id: ObjectId) -> bool {
        self.selected.contains(&id)
    }

    pub fn select(&mut self, id: ObjectId) {
        self.selected.insert(id);
    }

    pub fn deselect(&mut self, id: ObjectId) {
        self.selected.remove(&id);
    }

    pub fn toggle(&mut self, id: ObjectId) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// Replace the selection with a single id.
    pub fn select_only(&mut self, id: ObjectId) {
        self.selected.clear();
        self.selected.insert(id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn replace(&mut self, selected: BTreeSet<ObjectId>) {
        self.selected = selected;
    }

    /// Add `root` and every transitive child to the selection.
    pub fn select_subtree(&mut self, graph: &SceneGraph, root: ObjectId) {
        self.selected.extend(graph.subtree_ids(root));
    }

    // --- Expanded ids ---

    pub fn expanded(&self) -> &BTreeSet<ObjectId> {
        &self.expanded
    }

    pub fn is_expanded(&self, id: ObjectId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn expand(&mut self, id: ObjectId) {
        self.expanded.insert(id);
    }

    pub fn collapse(&mut self, id: ObjectId) {
        self.expanded.remove(&id);
    }

    pub fn replace_expanded(&mut self, expanded: BTreeSet<ObjectId>) {
        self.expanded = expanded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneforge_common::ObjectConfig;
    use sceneforge_graph::ComponentRegistry;

    #[test]
    fn toggle_flips_membership() {
        let mut selection = Selection::new();
        let id = ObjectId::new();
        selection.toggle(id);
        assert!(selection.is_selected(id));
        selection.toggle(id);
        assert!(!selection.is_selected(id));
    }

    #[test]
    fn select_only_replaces() {
        let mut selection = Selection::new();
        let a = ObjectId::new();
        let b = ObjectId::new();
        selection.select(a);
        selection.select_only(b);
        assert!(!selection.is_selected(a));
        assert!(selection.is_selected(b));
        assert_eq!(selection.selected().len(), 1);
    }

    #[test]
    fn select_subtree_covers_descendants() {
        let mut graph = SceneGraph::new(ComponentRegistry::standard());
        let page = graph.add_page("Main");
        let root = ObjectId::new();
        let child = ObjectId::new();
        let staged = graph.stage_create(root, &ObjectConfig::default());
        graph.commit_properties(staged, page, &ObjectConfig::at(Some(page), 0.0));
        let staged = graph.stage_create(child, &ObjectConfig::default());
        graph.commit_properties(staged, root, &ObjectConfig::at(Some(root), 0.0));

        let mut selection = Selection::new();
        selection.select_subtree(&graph, root);
        assert!(selection.is_selected(root));
        assert!(selection.is_selected(child));
    }

    #[test]
    fn expansion_independent_of_selection() {
        let mut selection = Selection::new();
        let id = ObjectId::new();
        selection.expand(id);
        assert!(selection.is_expanded(id));
        assert!(!selection.is_selected(id));
        selection.collapse(id);
        assert!(!selection.is_expanded(id));
    }
}

use crate::edit::{ComponentPatch, Edit, ObjectPatch};
use sceneforge_common::{ComponentConfig, ObjectId, ValueKind};
use sceneforge_graph::{ComponentSchema, SceneGraph};

/// A malformed edit, rejected before any mutation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EditError {
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
    #[error("page {0} cannot be structurally edited")]
    PageEdit(ObjectId),
    #[error("unknown parent {parent} for object {object}")]
    UnknownParent { object: ObjectId, parent: ObjectId },
    #[error("reparenting {object} under {parent} would create a cycle")]
    ParentCycle { object: ObjectId, parent: ObjectId },
    #[error("no active page to root object {0} under")]
    NoActivePage(ObjectId),
    #[error("unregistered component kind {0}")]
    UnknownComponentKind(String),
    #[error("component {component} not present on object {object}")]
    UnknownComponent {
        object: ObjectId,
        component: String,
    },
    #[error("unknown property {component}.{property}")]
    UnknownProperty {
        component: String,
        property: String,
    },
    #[error("type mismatch for {component}.{property}: expected {expected}, got {got}")]
    TypeMismatch {
        component: String,
        property: String,
        expected: ValueKind,
        got: ValueKind,
    },
}

/// Applies edits to the store and returns the exact inverse edit.
///
/// The whole edit is validated up front, so a rejected edit leaves the store
/// untouched and an accepted edit cannot fail midway: every call is
/// observably atomic.
pub struct EditApplier;

impl EditApplier {
    /// Apply `edit`, mutating the graph in place. Returns the edit that
    /// restores the prior state when applied.
    pub fn apply(graph: &mut SceneGraph, edit: &Edit) -> Result<Edit, EditError> {
        validate(graph, edit)?;
        let mut inverse = Edit::new();

        // Removals first. Capture the full configuration so undo recreates
        // the object in place. Children are not cascaded here; the edit is
        // expected to carry the whole subtree.
        for &id in &edit.remove {
            inverse.add.insert(id, graph.full_config(id));
            graph.remove_object(id);
        }

        // Additions, pass 1: shallow objects only. Every new id exists
        // before any value is written, so references between objects added
        // together resolve in any creation order. Re-adding an id that is
        // still present (a coalesced remove-then-add being undone) replaces
        // it; capture its configuration instead of scheduling a removal.
        let mut staged = Vec::with_capacity(edit.add.len());
        for (&id, config) in &edit.add {
            if graph.contains(id) {
                inverse.add.insert(id, graph.full_config(id));
            } else {
                inverse.remove.insert(id);
            }
            staged.push(graph.stage_create(id, config));
        }

        // Additions, pass 2: parents and values.
        for token in staged {
            let id = token.id();
            let config = &edit.add[&id];
            let parent = resolve_parent(graph, id, config.parent)?;
            graph.commit_properties(token, parent, config);
        }

        // Patches last, capturing the prior value of every touched slot.
        for (&id, patch) in &edit.edit {
            let mut inv = ObjectPatch::new();
            if let Some(target) = patch.parent {
                let parent = resolve_parent(graph, id, target)?;
                let old = graph.set_parent(id, parent);
                inv.parent = Some(Some(old));
            }
            if let Some(order) = patch.order {
                inv.order = Some(graph.set_order(id, order));
            }
            for (name, value) in &patch.fields {
                let old = graph.set_field(id, name, value.clone());
                inv.fields.insert(name.clone(), old);
            }
            for (name, cpatch) in &patch.components {
                let inv_patch = match cpatch {
                    ComponentPatch::Patch(props) if graph.has_component(id, name) => {
                        let mut priors = ComponentConfig::new();
                        for (property, value) in props {
                            let old = graph.set_property(id, name, property, value.clone());
                            priors.insert(property.clone(), old);
                        }
                        ComponentPatch::Patch(priors)
                    }
                    // Re-attaching over a live component (a coalesced
                    // remove-then-re-add being undone) replaces it; the
                    // replaced overrides go into the inverse.
                    ComponentPatch::Add(props) if graph.has_component(id, name) => {
                        let replaced = graph.remove_component(id, name);
                        graph.add_component(id, name);
                        for (property, value) in props {
                            graph.set_property(id, name, property, value.clone());
                        }
                        ComponentPatch::Add(replaced)
                    }
                    // Patching a component the object does not yet have
                    // creates it; either way undo detaches it again.
                    ComponentPatch::Patch(props) | ComponentPatch::Add(props) => {
                        graph.add_component(id, name);
                        for (property, value) in props {
                            graph.set_property(id, name, property, value.clone());
                        }
                        ComponentPatch::Remove
                    }
                    ComponentPatch::Remove => {
                        ComponentPatch::Add(graph.remove_component(id, name))
                    }
                };
                inv.components.insert(name.clone(), inv_patch);
            }
            // An id that is also being (re)created in this edit has its whole
            // prior existence captured by the add phase already; a patch
            // inverse on top of that would restore stale values.
            if !edit.add.contains_key(&id) {
                inverse.edit.insert(id, inv);
            }
        }

        tracing::debug!(
            removed = edit.remove.len(),
            added = edit.add.len(),
            patched = edit.edit.len(),
            "edit applied"
        );
        Ok(inverse)
    }
}

fn resolve_parent(
    graph: &SceneGraph,
    object: ObjectId,
    parent: Option<ObjectId>,
) -> Result<ObjectId, EditError> {
    match parent {
        Some(parent) => Ok(parent),
        None => graph.active_page().ok_or(EditError::NoActivePage(object)),
    }
}

/// Reject every malformed aspect of `edit` before anything mutates.
fn validate(graph: &SceneGraph, edit: &Edit) -> Result<(), EditError> {
    let registry = graph.registry();

    let exists = |id: ObjectId| -> bool {
        edit.add.contains_key(&id) || (graph.contains(id) && !edit.remove.contains(&id))
    };

    for &id in &edit.remove {
        if !graph.contains(id) {
            return Err(EditError::UnknownObject(id));
        }
        if graph.is_page(id) {
            return Err(EditError::PageEdit(id));
        }
    }

    for (&id, config) in &edit.add {
        check_parent_target(graph, edit, &exists, id, config.parent)?;
        for (name, props) in &config.components {
            let schema = registry
                .schema(name)
                .ok_or_else(|| EditError::UnknownComponentKind(name.clone()))?;
            check_props(name, schema, props)?;
        }
    }

    for (&id, patch) in &edit.edit {
        if !exists(id) {
            return Err(EditError::UnknownObject(id));
        }
        if graph.is_page(id) && (patch.parent.is_some() || patch.order.is_some()) {
            return Err(EditError::PageEdit(id));
        }
        if let Some(target) = patch.parent {
            check_parent_target(graph, edit, &exists, id, target)?;
        }
        for (name, cpatch) in &patch.components {
            let schema = registry
                .schema(name)
                .ok_or_else(|| EditError::UnknownComponentKind(name.clone()))?;
            match cpatch {
                ComponentPatch::Patch(props) | ComponentPatch::Add(props) => {
                    check_props(name, schema, props)?;
                }
                ComponentPatch::Remove => {
                    if !component_present(graph, edit, id, name) {
                        return Err(EditError::UnknownComponent {
                            object: id,
                            component: name.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

/// Component presence as it will stand when the edit phase runs: an id being
/// (re)added carries exactly the components of its add configuration.
fn component_present(graph: &SceneGraph, edit: &Edit, id: ObjectId, name: &str) -> bool {
    if let Some(config) = edit.add.get(&id) {
        return config.components.contains_key(name);
    }
    graph
        .object(id)
        .is_some_and(|object| object.component(name).is_some())
}

fn check_parent_target(
    graph: &SceneGraph,
    edit: &Edit,
    exists: &dyn Fn(ObjectId) -> bool,
    object: ObjectId,
    target: Option<ObjectId>,
) -> Result<(), EditError> {
    match target {
        Some(parent) => {
            if !exists(parent) {
                return Err(EditError::UnknownParent { object, parent });
            }
            check_acyclic(graph, edit, object, parent)
        }
        None => {
            if graph.active_page().is_none() {
                return Err(EditError::NoActivePage(object));
            }
            Ok(())
        }
    }
}

/// Walk the ancestor chain `object` would have after the edit and reject the
/// edit if the chain leads back to `object`.
fn check_acyclic(
    graph: &SceneGraph,
    edit: &Edit,
    object: ObjectId,
    parent: ObjectId,
) -> Result<(), EditError> {
    let bound = graph.object_count() + edit.add.len() + 1;
    let mut current = Some(parent);
    for _ in 0..bound {
        let Some(id) = current else {
            return Ok(());
        };
        if id == object {
            return Err(EditError::ParentCycle { object, parent });
        }
        current = effective_parent(graph, edit, id);
    }
    // The walk exceeding the object count is itself a cycle among others.
    Err(EditError::ParentCycle { object, parent })
}

/// The parent an object will have once the edit applies.
fn effective_parent(graph: &SceneGraph, edit: &Edit, id: ObjectId) -> Option<ObjectId> {
    if let Some(config) = edit.add.get(&id) {
        return config.parent.or_else(|| graph.active_page());
    }
    if let Some(patch) = edit.edit.get(&id) {
        if let Some(target) = patch.parent {
            return target.or_else(|| graph.active_page());
        }
    }
    graph.object(id).and_then(|object| object.parent())
}

fn check_props(
    component: &str,
    schema: &ComponentSchema,
    props: &ComponentConfig,
) -> Result<(), EditError> {
    for (property, value) in props {
        let Some(expected) = schema.kind_of(property) else {
            return Err(EditError::UnknownProperty {
                component: component.to_owned(),
                property: property.clone(),
            });
        };
        if !value.is_null() && value.kind() != expected {
            return Err(EditError::TypeMismatch {
                component: component.to_owned(),
                property: property.clone(),
                expected,
                got: value.kind(),
            });
        }
    }
    Ok(())
}

use sceneforge_common::{ComponentConfig, ObjectConfig, ObjectId, Value};
use sceneforge_graph::SceneGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A change to one component of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentPatch {
    /// Write property overrides. Creates the component first when absent.
    /// `Value::Null` clears an override back to its registry default.
    Patch(ComponentConfig),
    /// Attach a component (must be absent) with the given overrides.
    Add(ComponentConfig),
    /// Detach the component entirely.
    Remove,
}

/// A patch to one existing object: any combination of reparenting,
/// reordering, object-level field writes, and component changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatch {
    /// Reparent. The inner `None` roots the object under the active page.
    pub parent: Option<Option<ObjectId>>,
    /// Replace the sibling order key.
    pub order: Option<f64>,
    /// Object-level field writes (`Null` clears).
    pub fields: BTreeMap<String, Value>,
    /// Component changes keyed by component name.
    pub components: BTreeMap<String, ComponentPatch>,
}

impl ObjectPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_none()
            && self.order.is_none()
            && self.fields.is_empty()
            && self.components.is_empty()
    }

    pub fn reparent(mut self, parent: Option<ObjectId>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn reorder(mut self, order: f64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_owned(), value.into());
        self
    }

    pub fn component(mut self, name: &str, props: ComponentConfig) -> Self {
        self.components
            .insert(name.to_owned(), ComponentPatch::Patch(props));
        self
    }

    pub fn property(mut self, component: &str, property: &str, value: impl Into<Value>) -> Self {
        match self
            .components
            .entry(component.to_owned())
            .or_insert_with(|| ComponentPatch::Patch(ComponentConfig::new()))
        {
            ComponentPatch::Patch(props) | ComponentPatch::Add(props) => {
                props.insert(property.to_owned(), value.into());
            }
            ComponentPatch::Remove => {}
        }
        self
    }

    pub fn add_component(mut self, name: &str, props: ComponentConfig) -> Self {
        self.components
            .insert(name.to_owned(), ComponentPatch::Add(props));
        self
    }

    pub fn remove_component(mut self, name: &str) -> Self {
        self.components
            .insert(name.to_owned(), ComponentPatch::Remove);
        self
    }
}

/// A self-describing, invertible mutation of the scene graph.
///
/// The three parts apply in fixed order: removals, then additions (two-phase:
/// every object is created in shallow form before any values are written, so
/// references between objects added together resolve in any order), then
/// patches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    pub add: BTreeMap<ObjectId, ObjectConfig>,
    pub edit: BTreeMap<ObjectId, ObjectPatch>,
    pub remove: BTreeSet<ObjectId>,
}

impl Edit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.edit.is_empty() && self.remove.is_empty()
    }

    pub fn add_object(mut self, id: ObjectId, config: ObjectConfig) -> Self {
        self.add.insert(id, config);
        self
    }

    pub fn patch(mut self, id: ObjectId, patch: ObjectPatch) -> Self {
        self.edit.insert(id, patch);
        self
    }

    pub fn remove_object(mut self, id: ObjectId) -> Self {
        self.remove.insert(id);
        self
    }

    /// An edit removing `root` and every transitive child, so no orphan is
    /// left referencing a deleted parent.
    pub fn remove_subtree(graph: &SceneGraph, root: ObjectId) -> Self {
        Self {
            remove: graph.subtree_ids(root),
            ..Self::default()
        }
    }
}

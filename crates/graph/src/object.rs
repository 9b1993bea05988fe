use sceneforge_common::{Cell, ComponentConfig, ObjectConfig, ObjectId, Value};
use std::collections::BTreeMap;

/// Sparse property overrides for one component instance.
///
/// Only explicitly written properties are stored; everything else takes its
/// registry default. Writing `Value::Null` clears the override again, so a
/// write followed by its captured inverse restores the exact storage state.
#[derive(Debug, Clone, Default)]
pub struct Component {
    properties: BTreeMap<String, Cell<Value>>,
}

impl Component {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a property override, returning the prior override (`Null` if
    /// there was none). `Null` removes the override.
    pub fn set(&mut self, property: &str, value: Value) -> Value {
        if value.is_null() {
            return self
                .properties
                .remove(property)
                .map(Cell::into_inner)
                .unwrap_or(Value::Null);
        }
        match self.properties.get_mut(property) {
            Some(cell) => {
                let prior = cell.get().clone();
                cell.set(value);
                prior
            }
            None => {
                self.properties.insert(property.to_owned(), Cell::new(value));
                Value::Null
            }
        }
    }

    /// The current override for a property (`Null` if unset).
    pub fn value(&self, property: &str) -> Value {
        self.properties
            .get(property)
            .map(|cell| cell.get().clone())
            .unwrap_or(Value::Null)
    }

    /// The observable cell backing a property override, if one is set.
    pub fn cell(&self, property: &str) -> Option<&Cell<Value>> {
        self.properties.get(property)
    }

    /// Snapshot all overrides.
    pub fn config(&self) -> ComponentConfig {
        self.properties
            .iter()
            .map(|(name, cell)| (name.clone(), cell.get().clone()))
            .collect()
    }
}

/// One object in the scene graph.
///
/// Pages are objects too: they are the only objects with no parent.
#[derive(Debug, Clone)]
pub struct SceneObject {
    id: ObjectId,
    parent: Option<ObjectId>,
    order: f64,
    fields: BTreeMap<String, Cell<Value>>,
    components: BTreeMap<String, Component>,
}

impl SceneObject {
    pub(crate) fn new(id: ObjectId, parent: Option<ObjectId>, order: f64) -> Self {
        Self {
            id,
            parent,
            order,
            fields: BTreeMap::new(),
            components: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ObjectId>) -> Option<ObjectId> {
        std::mem::replace(&mut self.parent, parent)
    }

    pub fn order(&self) -> f64 {
        self.order
    }

    pub(crate) fn set_order(&mut self, order: f64) -> f64 {
        std::mem::replace(&mut self.order, order)
    }

    /// Write an object-level field, returning the prior value (`Null` if
    /// unset). `Null` removes the field.
    pub(crate) fn set_field(&mut self, name: &str, value: Value) -> Value {
        if value.is_null() {
            return self
                .fields
                .remove(name)
                .map(Cell::into_inner)
                .unwrap_or(Value::Null);
        }
        match self.fields.get_mut(name) {
            Some(cell) => {
                let prior = cell.get().clone();
                cell.set(value);
                prior
            }
            None => {
                self.fields.insert(name.to_owned(), Cell::new(value));
                Value::Null
            }
        }
    }

    /// The current value of an object-level field (`Null` if unset).
    pub fn field(&self, name: &str) -> Value {
        self.fields
            .get(name)
            .map(|cell| cell.get().clone())
            .unwrap_or(Value::Null)
    }

    /// The observable cell backing a field, if one is set.
    pub fn field_cell(&self, name: &str) -> Option<&Cell<Value>> {
        self.fields.get(name)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub(crate) fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.get_mut(name)
    }

    pub(crate) fn insert_component(&mut self, name: &str, component: Component) {
        self.components.insert(name.to_owned(), component);
    }

    pub(crate) fn remove_component(&mut self, name: &str) -> Option<Component> {
        self.components.remove(name)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Snapshot the full sparse configuration: parent, order, fields, and
    /// every component's overrides.
    pub fn config(&self) -> ObjectConfig {
        ObjectConfig {
            parent: self.parent,
            order: self.order,
            fields: self
                .fields
                .iter()
                .map(|(name, cell)| (name.clone(), cell.get().clone()))
                .collect(),
            components: self
                .components
                .iter()
                .map(|(name, component)| (name.clone(), component.config()))
                .collect(),
        }
    }
}

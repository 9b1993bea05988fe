use crate::object::{Component, SceneObject};
use crate::registry::ComponentRegistry;
use sceneforge_common::{
    Cell, ComponentConfig, ObjectConfig, ObjectId, SignalGraph, SignalId, Value,
};
use std::collections::{BTreeMap, BTreeSet};

/// An event record produced by every mutation to the scene graph.
///
/// Events carry the prior value where one exists, so observers can diff
/// without re-reading the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    PageAdded {
        id: ObjectId,
    },
    ActivePageChanged {
        old: Option<ObjectId>,
        new: Option<ObjectId>,
    },
    /// Object staged into existence. Its configuration follows separately;
    /// creation surfaces as this single event.
    ObjectCreated {
        id: ObjectId,
    },
    ObjectRemoved {
        id: ObjectId,
    },
    ParentChanged {
        id: ObjectId,
        old: ObjectId,
        new: ObjectId,
    },
    OrderChanged {
        id: ObjectId,
        old: f64,
        new: f64,
    },
    FieldChanged {
        id: ObjectId,
        name: String,
        old: Value,
        new: Value,
    },
    ComponentAdded {
        id: ObjectId,
        name: String,
    },
    ComponentRemoved {
        id: ObjectId,
        name: String,
    },
    PropertyChanged {
        id: ObjectId,
        component: String,
        property: String,
        old: Value,
        new: Value,
    },
    Reset,
}

/// Token returned by [`SceneGraph::stage_create`].
///
/// Holding one proves the object exists in shallow form; passing it to
/// [`SceneGraph::commit_properties`] consumes it, so an object cannot be
/// committed twice and a staged object cannot be forgotten silently.
#[must_use = "staged objects must be committed"]
#[derive(Debug)]
pub struct Staged(ObjectId);

impl Staged {
    pub fn id(&self) -> ObjectId {
        self.0
    }
}

/// The scene-graph store.
///
/// Owns all objects (pages included), the component registry, the active
/// page, an append-only event log, and the signal graph used to drive
/// deterministic UI invalidation. Setters return the prior value; the edit
/// layer builds inverse edits from those returns.
#[derive(Debug)]
pub struct SceneGraph {
    registry: ComponentRegistry,
    objects: BTreeMap<ObjectId, SceneObject>,
    pages: Vec<ObjectId>,
    active_page: Cell<Option<ObjectId>>,
    events: Vec<SceneEvent>,
    signals: SignalGraph,
    sig_structure: SignalId,
    sig_properties: SignalId,
    sig_pages: SignalId,
    sig_active_page: SignalId,
    dirty: Vec<SignalId>,
}

impl SceneGraph {
    pub fn new(registry: ComponentRegistry) -> Self {
        let mut signals = SignalGraph::new();
        let sig_structure = signals.node("structure");
        let sig_properties = signals.node("properties");
        let sig_pages = signals.node("pages");
        let sig_active_page = signals.node("active_page");
        Self {
            registry,
            objects: BTreeMap::new(),
            pages: Vec::new(),
            active_page: Cell::new(None),
            events: Vec::new(),
            signals,
            sig_structure,
            sig_properties,
            sig_pages,
            sig_active_page,
            dirty: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // --- Pages ---

    /// Create a page and return its id. The first page becomes active.
    pub fn add_page(&mut self, name: &str) -> ObjectId {
        let id = ObjectId::new();
        self.add_page_with_id(id, name);
        id
    }

    /// Create a page under a caller-chosen id (document import).
    pub fn add_page_with_id(&mut self, id: ObjectId, name: &str) {
        assert!(!self.objects.contains_key(&id), "duplicate page id {id}");
        let mut page = SceneObject::new(id, None, self.pages.len() as f64);
        page.set_field("name", Value::from(name));
        self.objects.insert(id, page);
        self.pages.push(id);
        self.events.push(SceneEvent::PageAdded { id });
        self.mark(self.sig_pages);
        tracing::debug!(%id, name, "page added");
        if self.active_page.get().is_none() {
            self.set_active_page(Some(id));
        }
    }

    pub fn pages(&self) -> &[ObjectId] {
        &self.pages
    }

    pub fn is_page(&self, id: ObjectId) -> bool {
        self.pages.contains(&id)
    }

    pub fn active_page(&self) -> Option<ObjectId> {
        *self.active_page.get()
    }

    /// The observable cell backing the active-page selection.
    pub fn active_page_cell(&self) -> &Cell<Option<ObjectId>> {
        &self.active_page
    }

    pub fn set_active_page(&mut self, page: Option<ObjectId>) {
        if let Some(id) = page {
            assert!(self.is_page(id), "active page {id} is not a page");
        }
        let old = *self.active_page.get();
        if self.active_page.set(page) {
            self.events
                .push(SceneEvent::ActivePageChanged { old, new: page });
            self.mark(self.sig_active_page);
        }
    }

    // --- Object access ---

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Fetch an object that the caller asserts exists. A miss is a
    /// programming error, not a recoverable condition.
    pub fn require(&self, id: ObjectId) -> &SceneObject {
        match self.objects.get(&id) {
            Some(object) => object,
            None => panic!("unknown object id {id}"),
        }
    }

    fn require_mut(&mut self, id: ObjectId) -> &mut SceneObject {
        match self.objects.get_mut(&id) {
            Some(object) => object,
            None => panic!("unknown object id {id}"),
        }
    }

    /// Total number of objects, pages included.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    // --- Creation (two-step) ---

    /// Create an object in shallow form: listed components exist but hold no
    /// overrides, parent is unset, order is zero. Replaces any object already
    /// stored under the id. Values come later via [`commit_properties`];
    /// splitting the two lets a batch of new objects reference each other in
    /// any creation order.
    ///
    /// [`commit_properties`]: SceneGraph::commit_properties
    pub fn stage_create(&mut self, id: ObjectId, shape: &ObjectConfig) -> Staged {
        if self.objects.remove(&id).is_some() {
            self.events.push(SceneEvent::ObjectRemoved { id });
        }
        let mut object = SceneObject::new(id, None, 0.0);
        for name in shape.components.keys() {
            debug_assert!(self.registry.contains(name), "unregistered component {name}");
            object.insert_component(name, Component::new());
        }
        self.objects.insert(id, object);
        self.events.push(SceneEvent::ObjectCreated { id });
        self.mark(self.sig_structure);
        tracing::debug!(%id, "object staged");
        Staged(id)
    }

    /// Second creation step: attach the object under its (resolved) parent
    /// and write the configured fields and component property overrides.
    pub fn commit_properties(&mut self, staged: Staged, parent: ObjectId, config: &ObjectConfig) {
        assert!(
            self.objects.contains_key(&parent),
            "commit under unknown parent {parent}"
        );
        let id = staged.0;
        let object = self.require_mut(id);
        object.set_parent(Some(parent));
        object.set_order(config.order);
        for (name, value) in &config.fields {
            object.set_field(name, value.clone());
        }
        for (name, props) in &config.components {
            if let Some(component) = object.component_mut(name) {
                for (property, value) in props {
                    component.set(property, value.clone());
                }
            }
        }
        self.mark(self.sig_properties);
        tracing::debug!(%id, %parent, "object committed");
    }

    // --- Structural and property mutation ---

    /// Reparent an object. Returns the prior parent.
    pub fn set_parent(&mut self, id: ObjectId, parent: ObjectId) -> ObjectId {
        assert!(!self.is_page(id), "pages cannot be reparented");
        assert!(
            self.objects.contains_key(&parent),
            "unknown parent {parent}"
        );
        let old = self
            .require_mut(id)
            .set_parent(Some(parent))
            .expect("non-page object always has a parent");
        if old != parent {
            self.events.push(SceneEvent::ParentChanged {
                id,
                old,
                new: parent,
            });
            self.mark(self.sig_structure);
        }
        old
    }

    /// Change an object's sibling order key. Returns the prior key.
    pub fn set_order(&mut self, id: ObjectId, order: f64) -> f64 {
        let old = self.require_mut(id).set_order(order);
        if old != order {
            self.events.push(SceneEvent::OrderChanged {
                id,
                old,
                new: order,
            });
            self.mark(self.sig_structure);
        }
        old
    }

    /// Write an object-level field. Returns the prior value (`Null` if
    /// unset); writing `Null` clears the field.
    pub fn set_field(&mut self, id: ObjectId, name: &str, value: Value) -> Value {
        let old = self.require_mut(id).set_field(name, value.clone());
        if old != value {
            self.events.push(SceneEvent::FieldChanged {
                id,
                name: name.to_owned(),
                old: old.clone(),
                new: value,
            });
            self.mark(self.sig_properties);
        }
        old
    }

    pub fn field(&self, id: ObjectId, name: &str) -> Value {
        self.require(id).field(name)
    }

    pub fn has_component(&self, id: ObjectId, name: &str) -> bool {
        self.require(id).component(name).is_some()
    }

    /// Attach an empty component (all properties at registry defaults).
    pub fn add_component(&mut self, id: ObjectId, name: &str) {
        debug_assert!(self.registry.contains(name), "unregistered component {name}");
        let object = self.require_mut(id);
        assert!(
            object.component(name).is_none(),
            "component {name} already present on {id}"
        );
        object.insert_component(name, Component::new());
        self.events.push(SceneEvent::ComponentAdded {
            id,
            name: name.to_owned(),
        });
        self.mark(self.sig_properties);
    }

    /// Detach a component, returning its overrides for inverse capture.
    pub fn remove_component(&mut self, id: ObjectId, name: &str) -> ComponentConfig {
        let object = self.require_mut(id);
        let component = match object.remove_component(name) {
            Some(component) => component,
            None => panic!("component {name} not present on {id}"),
        };
        self.events.push(SceneEvent::ComponentRemoved {
            id,
            name: name.to_owned(),
        });
        self.mark(self.sig_properties);
        component.config()
    }

    pub fn component_config(&self, id: ObjectId, name: &str) -> Option<ComponentConfig> {
        self.require(id).component(name).map(Component::config)
    }

    /// Write a component property override. Returns the prior override
    /// (`Null` if unset); writing `Null` clears the override.
    pub fn set_property(&mut self, id: ObjectId, component: &str, property: &str, value: Value) -> Value {
        let object = self.require_mut(id);
        let slot = match object.component_mut(component) {
            Some(slot) => slot,
            None => panic!("component {component} not present on {id}"),
        };
        let old = slot.set(property, value.clone());
        if old != value {
            self.events.push(SceneEvent::PropertyChanged {
                id,
                component: component.to_owned(),
                property: property.to_owned(),
                old: old.clone(),
                new: value,
            });
            self.mark(self.sig_properties);
        }
        old
    }

    /// The resolved value of a component property: the stored override, or
    /// the registry default, or `Null` for an unknown slot.
    pub fn property(&self, id: ObjectId, component: &str, property: &str) -> Value {
        let object = self.require(id);
        match object.component(component) {
            Some(slot) => {
                let value = slot.value(property);
                if !value.is_null() {
                    return value;
                }
                self.registry
                    .schema(component)
                    .and_then(|schema| schema.default_of(property))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            None => Value::Null,
        }
    }

    // --- Removal ---

    /// Remove one object. Children are untouched: callers expand a subtree
    /// removal into the full descendant id set first.
    pub fn remove_object(&mut self, id: ObjectId) {
        assert!(!self.is_page(id), "pages cannot be removed");
        if self.objects.remove(&id).is_none() {
            panic!("unknown object id {id}");
        }
        self.events.push(SceneEvent::ObjectRemoved { id });
        self.mark(self.sig_structure);
        tracing::debug!(%id, "object removed");
    }

    /// Drop everything: objects, pages, active page. History is the edit
    /// layer's to clear.
    pub fn reset(&mut self) {
        self.objects.clear();
        self.pages.clear();
        self.active_page.set(None);
        self.events.push(SceneEvent::Reset);
        self.mark(self.sig_structure);
        self.mark(self.sig_properties);
        self.mark(self.sig_pages);
        self.mark(self.sig_active_page);
        tracing::debug!("scene reset");
    }

    /// Snapshot an object's full sparse configuration.
    pub fn full_config(&self, id: ObjectId) -> ObjectConfig {
        self.require(id).config()
    }

    // --- Traversal ---

    /// Direct children of an object, ordered by (order key, id).
    pub fn children(&self, parent: ObjectId) -> Vec<ObjectId> {
        let mut children: Vec<&SceneObject> = self
            .objects
            .values()
            .filter(|object| object.parent() == Some(parent))
            .collect();
        children.sort_by(|a, b| {
            a.order()
                .total_cmp(&b.order())
                .then_with(|| a.id().cmp(&b.id()))
        });
        children.into_iter().map(SceneObject::id).collect()
    }

    /// The order keys of an object's children, in sibling order.
    pub fn child_orders(&self, parent: ObjectId) -> Vec<f64> {
        self.children(parent)
            .into_iter()
            .map(|id| self.require(id).order())
            .collect()
    }

    /// An object plus all of its transitive children.
    pub fn subtree_ids(&self, root: ObjectId) -> BTreeSet<ObjectId> {
        assert!(self.contains(root), "unknown object id {root}");
        let mut ids = BTreeSet::new();
        let mut queue = vec![root];
        while let Some(id) = queue.pop() {
            if ids.insert(id) {
                queue.extend(self.children(id));
            }
        }
        ids
    }

    // --- Events and signals ---

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only access to the pending event log.
    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }

    pub fn structure_signal(&self) -> SignalId {
        self.sig_structure
    }

    pub fn properties_signal(&self) -> SignalId {
        self.sig_properties
    }

    pub fn pages_signal(&self) -> SignalId {
        self.sig_pages
    }

    pub fn active_page_signal(&self) -> SignalId {
        self.sig_active_page
    }

    /// Register a derived view recomputed whenever any source invalidates.
    pub fn watch(&mut self, label: &str, sources: &[SignalId]) -> SignalId {
        let id = self.signals.node(label);
        for &source in sources {
            self.signals.connect(source, id);
        }
        id
    }

    /// Drain the signals invalidated since the last drain, in first-marked
    /// breadth-first order.
    pub fn take_dirty(&mut self) -> Vec<SignalId> {
        std::mem::take(&mut self.dirty)
    }

    fn mark(&mut self, origin: SignalId) {
        for id in self.signals.invalidate(origin) {
            if !self.dirty.contains(&id) {
                self.dirty.push(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_page() -> (SceneGraph, ObjectId) {
        let mut graph = SceneGraph::new(ComponentRegistry::standard());
        let page = graph.add_page("Main");
        (graph, page)
    }

    fn spawn(graph: &mut SceneGraph, parent: ObjectId, order: f64) -> ObjectId {
        let id = ObjectId::new();
        let config = ObjectConfig::at(Some(parent), order)
            .with_component("transform", ComponentConfig::new());
        let staged = graph.stage_create(id, &config);
        graph.commit_properties(staged, parent, &config);
        id
    }

    #[test]
    fn graph_starts_empty() {
        let graph = SceneGraph::new(ComponentRegistry::standard());
        assert_eq!(graph.object_count(), 0);
        assert!(graph.pages().is_empty());
        assert_eq!(graph.active_page(), None);
    }

    #[test]
    fn first_page_becomes_active() {
        let (graph, page) = graph_with_page();
        assert_eq!(graph.active_page(), Some(page));
        assert!(graph.is_page(page));
        assert_eq!(graph.field(page, "name"), Value::from("Main"));
    }

    #[test]
    fn staged_object_holds_defaults_until_commit() {
        let (mut graph, page) = graph_with_page();
        let id = ObjectId::new();
        let config = ObjectConfig::at(Some(page), 0.0)
            .with_component("shape", ComponentConfig::from([(
                "size".to_owned(),
                Value::from(3.0),
            )]));

        let staged = graph.stage_create(id, &config);
        assert!(graph.has_component(id, "shape"));
        assert_eq!(graph.property(id, "shape", "size"), Value::from(1.0));

        graph.commit_properties(staged, page, &config);
        assert_eq!(graph.property(id, "shape", "size"), Value::from(3.0));
        assert_eq!(graph.require(id).parent(), Some(page));
    }

    #[test]
    fn setters_return_priors() {
        let (mut graph, page) = graph_with_page();
        let id = spawn(&mut graph, page, 0.0);

        assert_eq!(graph.set_field(id, "name", Value::from("Foo")), Value::Null);
        assert_eq!(
            graph.set_field(id, "name", Value::from("Bar")),
            Value::from("Foo")
        );
        assert_eq!(graph.set_order(id, 5.0), 0.0);
        assert_eq!(
            graph.set_property(id, "transform", "position", Value::from(glam::Vec3::X)),
            Value::Null
        );
    }

    #[test]
    fn property_falls_back_to_registry_default() {
        let (mut graph, page) = graph_with_page();
        let id = spawn(&mut graph, page, 0.0);
        assert_eq!(
            graph.property(id, "transform", "scale"),
            Value::Vec3(glam::Vec3::ONE)
        );
        graph.set_property(id, "transform", "scale", Value::Vec3(glam::Vec3::ZERO));
        assert_eq!(
            graph.property(id, "transform", "scale"),
            Value::Vec3(glam::Vec3::ZERO)
        );
        // Clearing the override restores the default.
        graph.set_property(id, "transform", "scale", Value::Null);
        assert_eq!(
            graph.property(id, "transform", "scale"),
            Value::Vec3(glam::Vec3::ONE)
        );
    }

    #[test]
    fn children_sorted_by_order_key() {
        let (mut graph, page) = graph_with_page();
        let c = spawn(&mut graph, page, 2.0);
        let a = spawn(&mut graph, page, 0.0);
        let b = spawn(&mut graph, page, 1.0);
        assert_eq!(graph.children(page), vec![a, b, c]);
        assert_eq!(graph.child_orders(page), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn subtree_collects_transitive_children() {
        let (mut graph, page) = graph_with_page();
        let root = spawn(&mut graph, page, 0.0);
        let child = spawn(&mut graph, root, 0.0);
        let grandchild = spawn(&mut graph, child, 0.0);
        let sibling = spawn(&mut graph, page, 1.0);

        let subtree = graph.subtree_ids(root);
        assert!(subtree.contains(&root));
        assert!(subtree.contains(&child));
        assert!(subtree.contains(&grandchild));
        assert!(!subtree.contains(&sibling));
        assert_eq!(subtree.len(), 3);
    }

    #[test]
    fn remove_does_not_cascade() {
        let (mut graph, page) = graph_with_page();
        let root = spawn(&mut graph, page, 0.0);
        let child = spawn(&mut graph, root, 0.0);

        graph.remove_object(root);
        assert!(!graph.contains(root));
        // The child remains; subtree expansion is the caller's job.
        assert!(graph.contains(child));
    }

    #[test]
    fn events_are_recorded() {
        let (mut graph, page) = graph_with_page();
        graph.drain_events();
        let id = spawn(&mut graph, page, 0.0);
        graph.set_field(id, "name", Value::from("Foo"));
        graph.remove_object(id);

        let events = graph.drain_events();
        assert!(events.contains(&SceneEvent::ObjectCreated { id }));
        assert!(events.contains(&SceneEvent::ObjectRemoved { id }));
        assert!(events.iter().any(|event| matches!(
            event,
            SceneEvent::FieldChanged { name, .. } if name == "name"
        )));
        assert!(graph.events().is_empty());
    }

    #[test]
    fn unchanged_write_emits_no_event() {
        let (mut graph, page) = graph_with_page();
        let id = spawn(&mut graph, page, 0.0);
        graph.set_field(id, "name", Value::from("Foo"));
        graph.drain_events();
        graph.set_field(id, "name", Value::from("Foo"));
        assert!(graph.drain_events().is_empty());
    }

    #[test]
    fn derived_signals_invalidate_deterministically() {
        let (mut graph, page) = graph_with_page();
        let structure = graph.structure_signal();
        let outline = graph.watch("outline", &[structure]);
        graph.take_dirty();

        let _ = spawn(&mut graph, page, 0.0);
        let dirty = graph.take_dirty();
        let structure_pos = dirty.iter().position(|&s| s == structure);
        let outline_pos = dirty.iter().position(|&s| s == outline);
        assert!(structure_pos.is_some());
        assert!(outline_pos.is_some());
        assert!(structure_pos < outline_pos);
        // Drained; a second drain is empty until the next mutation.
        assert!(graph.take_dirty().is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let (mut graph, page) = graph_with_page();
        let _ = spawn(&mut graph, page, 0.0);
        graph.reset();
        assert_eq!(graph.object_count(), 0);
        assert!(graph.pages().is_empty());
        assert_eq!(graph.active_page(), None);
    }

    #[test]
    #[should_panic(expected = "unknown object id")]
    fn require_unknown_id_fails_loudly() {
        let graph = SceneGraph::new(ComponentRegistry::standard());
        let _ = graph.require(ObjectId::new());
    }
}

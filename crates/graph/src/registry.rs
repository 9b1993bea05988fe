use glam::Vec3;
use sceneforge_common::{Value, ValueKind};
use std::collections::BTreeMap;

/// Typed property schema for one component.
///
/// Each property's default value also defines its expected kind; writes are
/// checked against it. Defaults may not be `Null` (that would leave the
/// property untyped).
#[derive(Debug, Clone, Default)]
pub struct ComponentSchema {
    defaults: BTreeMap<String, Value>,
}

impl ComponentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, name: &str, default: impl Into<Value>) -> Self {
        let default = default.into();
        assert!(
            !default.is_null(),
            "schema default for {name} may not be null"
        );
        self.defaults.insert(name.to_owned(), default);
        self
    }

    pub fn default_of(&self, property: &str) -> Option<&Value> {
        self.defaults.get(property)
    }

    pub fn kind_of(&self, property: &str) -> Option<ValueKind> {
        self.defaults.get(property).map(Value::kind)
    }

    pub fn contains(&self, property: &str) -> bool {
        self.defaults.contains_key(property)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.defaults.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Maps component names to their property schemas.
///
/// Edits naming an unknown component or property are rejected before any
/// mutation happens.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    schemas: BTreeMap<String, ComponentSchema>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, schema: ComponentSchema) {
        self.schemas.insert(name.to_owned(), schema);
    }

    pub fn schema(&self, name: &str) -> Option<&ComponentSchema> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// The built-in component set used by the demo tooling and tests.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            "transform",
            ComponentSchema::new()
                .with_property("position", Vec3::ZERO)
                .with_property("rotation", Vec3::ZERO)
                .with_property("scale", Vec3::ONE),
        );
        registry.register(
            "shape",
            ComponentSchema::new()
                .with_property("kind", "box")
                .with_property("size", 1.0),
        );
        registry.register(
            "light",
            ComponentSchema::new()
                .with_property("color", Vec3::ONE)
                .with_property("intensity", 1.0),
        );
        registry.register(
            "script",
            ComponentSchema::new().with_property("source", ""),
        );
        registry
    }
}

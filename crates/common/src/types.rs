use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for an object in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token identifying one logical user gesture (e.g. a single drag).
///
/// Consecutive edits sharing a session id collapse into one undo step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// A typed property value.
///
/// `Null` doubles as the unset sentinel: writing it to a field or component
/// property clears the slot, and reading a slot that was never written yields
/// it. Inverse edits rely on this to restore absence exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Vec3(Vec3),
    Ref(ObjectId),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// The kind of a [`Value`], used for schema checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Vec3,
    Ref,
    List,
    Map,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::Vec3 => "vec3",
            ValueKind::Ref => "ref",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Ref(_) => ValueKind::Ref,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vec3(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::Ref(v)
    }
}

/// Property overrides for one component, keyed by property name.
///
/// Sparse: a property absent from the map takes its registry default.
pub type ComponentConfig = BTreeMap<String, Value>;

/// The full sparse configuration of one scene object.
///
/// This is the shape shared by add-edits, full-config snapshots (captured
/// when an object is removed, so undo can recreate it), and the exported
/// scene document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Parent object. `None` means "root of the active page" when the config
    /// is applied; captured snapshots always carry the resolved parent.
    pub parent: Option<ObjectId>,
    /// Sibling sort key.
    pub order: f64,
    /// Object-level fields (e.g. `name`). Sparse; `Value::Null` never stored.
    pub fields: BTreeMap<String, Value>,
    /// Component property overrides keyed by component name. A component
    /// present with an empty map exists with all defaults.
    pub components: BTreeMap<String, ComponentConfig>,
}

impl ObjectConfig {
    /// A config with the given parent and order and nothing else.
    pub fn at(parent: Option<ObjectId>, order: f64) -> Self {
        Self {
            parent,
            order,
            ..Self::default()
        }
    }

    /// Set an object-level field.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_owned(), value.into());
        self
    }

    /// Add a component with the given property overrides.
    pub fn with_component(mut self, name: &str, props: ComponentConfig) -> Self {
        self.components.insert(name.to_owned(), props);
        self
    }
}

use sceneforge_author::Edit;
use sceneforge_common::{ObjectConfig, ObjectId, Value};
use sceneforge_graph::SceneGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors from document export/import.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("object {object} references missing parent {parent}")]
    DanglingParent { object: ObjectId, parent: ObjectId },
    #[error("active page {0} is not in the document's page list")]
    UnknownActivePage(ObjectId),
}

/// One page in a scene document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    pub id: ObjectId,
    pub name: String,
}

/// The full sparse configuration of a scene: pages, the active page, and
/// every object keyed by id. Serializes to the export JSON format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub pages: Vec<PageEntry>,
    pub active_page: Option<ObjectId>,
    pub objects: BTreeMap<ObjectId, ObjectConfig>,
}

impl SceneDocument {
    /// Snapshot the whole graph.
    pub fn capture(graph: &SceneGraph) -> Self {
        let pages = graph
            .pages()
            .iter()
            .map(|&id| PageEntry {
                id,
                name: match graph.field(id, "name") {
                    Value::Str(name) => name,
                    _ => String::new(),
                },
            })
            .collect();
        let objects = graph
            .object_ids()
            .filter(|&id| !graph.is_page(id))
            .map(|id| (id, graph.full_config(id)))
            .collect();
        Self {
            pages,
            active_page: graph.active_page(),
            objects,
        }
    }

    /// Check internal consistency: every parent reference lands on a page or
    /// another object in the document, and the active page is listed.
    pub fn validate(&self) -> Result<(), PersistError> {
        if let Some(active) = self.active_page {
            if !self.pages.iter().any(|page| page.id == active) {
                return Err(PersistError::UnknownActivePage(active));
            }
        }
        for (&object, config) in &self.objects {
            if let Some(parent) = config.parent {
                let known = self.objects.contains_key(&parent)
                    || self.pages.iter().any(|page| page.id == parent);
                if !known {
                    return Err(PersistError::DanglingParent { object, parent });
                }
            }
        }
        Ok(())
    }

    /// Create the document's pages on a graph and select its active page.
    /// Call before applying [`into_edit`] to a fresh graph.
    ///
    /// [`into_edit`]: SceneDocument::into_edit
    pub fn create_pages(&self, graph: &mut SceneGraph) {
        for page in &self.pages {
            graph.add_page_with_id(page.id, &page.name);
        }
        if self.active_page.is_some() {
            graph.set_active_page(self.active_page);
        }
    }

    /// The whole document as one large add-edit. Applying it is the
    /// caller's explicit step; pages must exist first.
    pub fn into_edit(self) -> Edit {
        Edit {
            add: self.objects,
            ..Edit::default()
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, PersistError> {
        let document: Self = serde_json::from_str(text)?;
        document.validate()?;
        Ok(document)
    }
}

/// Serialize the full current graph configuration to a JSON blob.
pub fn export(graph: &SceneGraph) -> Result<String, PersistError> {
    let document = SceneDocument::capture(graph);
    tracing::debug!(
        pages = document.pages.len(),
        objects = document.objects.len(),
        "scene exported"
    );
    document.to_json()
}

/// Parse an exported blob back into a validated document.
pub fn parse(text: &str) -> Result<SceneDocument, PersistError> {
    SceneDocument::from_json(text)
}

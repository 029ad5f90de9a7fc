//! Typed structs representing the relational-model JSON document.
//!
//! These types cover the fields consumed by facet-core (entity shapes,
//! keys) and facet-analyze (navigation names for path validation).
//! The document is produced by an external model-description step; this
//! crate only reads it.

use serde::{Deserialize, Serialize};

/// A navigation (relationship) declaration on a model entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelNavigation {
    /// Member name of the navigation on the declaring entity.
    pub name: String,
    /// Name of the entity the navigation points at. May name an entity
    /// absent from the document; such targets are treated as opaque.
    pub target: String,
    /// True for collection-valued navigations.
    pub is_collection: bool,
}

/// A scalar property declaration on a model entity.
///
/// Properties are optional in the document: an entity described only by
/// keys and navigations is valid, and its scalar members can be supplied
/// programmatically instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelProperty {
    pub name: String,
    /// Semantic type name ("Int", "Text", ...). Names that do not match
    /// a known scalar kind pass through as opaque type names.
    pub type_name: String,
    pub nullable: bool,
}

/// An entity declaration within a model context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelEntity {
    pub name: String,
    /// Host-language type name, when the model was derived from one.
    pub clr: Option<String>,
    /// Composite key descriptors: each inner list is one key tuple of
    /// member names. Empty means the entity declares no key.
    pub keys: Vec<Vec<String>>,
    pub properties: Vec<ModelProperty>,
    pub navigations: Vec<ModelNavigation>,
}

/// A single context (one model scope) within the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelContext {
    pub context: String,
    pub entities: Vec<ModelEntity>,
}

/// Top-level relational-model document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelDocument {
    pub contexts: Vec<ModelContext>,
}

impl ModelDocument {
    /// Iterate over every entity across all contexts, in document order.
    pub fn entities(&self) -> impl Iterator<Item = &ModelEntity> {
        self.contexts.iter().flat_map(|c| c.entities.iter())
    }

    /// Look up an entity by name across all contexts.
    pub fn entity(&self, name: &str) -> Option<&ModelEntity> {
        self.entities().find(|e| e.name == name)
    }
}

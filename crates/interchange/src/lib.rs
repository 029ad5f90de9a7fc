//! facet-interchange: Shared relational-model document types and deserialization.
//!
//! Provides typed structs for the external model document (contexts,
//! entities, keys, properties, navigations) and a single
//! [`from_model_json()`] entry point that deserializes a
//! `serde_json::Value` document into a [`ModelDocument`].
//!
//! The document is a read-only input: facet-core builds its semantic
//! schema from these types, and facet-analyze consults them for
//! navigation validation. Neither consumer ever mutates the document.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_model_json, ModelError};
pub use types::*;

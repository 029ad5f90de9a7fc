//! Deserialization from model-document JSON into typed structs.
//!
//! The main entry point is [`from_model_json`], which takes a
//! `&serde_json::Value` and produces a [`ModelDocument`]. A malformed
//! document is a hard error for the whole run; the caller decides what
//! an *absent* document means (navigation validation is disabled, the
//! run continues).

use crate::types::*;
use thiserror::Error;

/// Errors during model-document deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The document is missing a required top-level field.
    #[error("model document missing required field: '{field}'")]
    MissingField { field: String },
    /// An entity declaration is missing a required field or is malformed.
    #[error("entity '{entity}': {message}")]
    EntityError { entity: String, message: String },
    /// The document structure is invalid.
    #[error("invalid model document: {0}")]
    InvalidDocument(String),
}

/// Deserialize a relational-model JSON document into typed structs.
///
/// Walks the `Contexts` array and each context's `Entities` array.
/// Unknown fields are ignored for forward compatibility; missing
/// required fields fail the document.
pub fn from_model_json(doc: &serde_json::Value) -> Result<ModelDocument, ModelError> {
    let contexts_arr = doc
        .get("Contexts")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ModelError::MissingField {
            field: "Contexts".to_string(),
        })?;

    let mut contexts = Vec::with_capacity(contexts_arr.len());
    for obj in contexts_arr {
        contexts.push(parse_context(obj)?);
    }

    Ok(ModelDocument { contexts })
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn required_str(obj: &serde_json::Value, field: &str) -> Result<String, ModelError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ModelError::InvalidDocument(format!("missing '{}' field", field)))
}

fn parse_context(obj: &serde_json::Value) -> Result<ModelContext, ModelError> {
    let context = required_str(obj, "Context")?;

    let entities_arr = obj
        .get("Entities")
        .and_then(|e| e.as_array())
        .ok_or_else(|| ModelError::InvalidDocument(format!(
            "context '{}' missing 'Entities' array",
            context
        )))?;

    let mut entities = Vec::with_capacity(entities_arr.len());
    for entity_obj in entities_arr {
        entities.push(parse_entity(entity_obj)?);
    }

    Ok(ModelContext { context, entities })
}

fn parse_entity(obj: &serde_json::Value) -> Result<ModelEntity, ModelError> {
    let name = required_str(obj, "Name")?;

    let clr = obj
        .get("Clr")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let keys = parse_keys(obj, &name)?;

    let properties = match obj.get("Properties") {
        Some(props) => parse_properties(props, &name)?,
        None => Vec::new(),
    };

    let navigations = match obj.get("Navigations") {
        Some(navs) => parse_navigations(navs, &name)?,
        None => Vec::new(),
    };

    Ok(ModelEntity {
        name,
        clr,
        keys,
        properties,
        navigations,
    })
}

fn parse_keys(obj: &serde_json::Value, entity: &str) -> Result<Vec<Vec<String>>, ModelError> {
    let arr = match obj.get("Keys") {
        Some(k) => k.as_array().ok_or_else(|| ModelError::EntityError {
            entity: entity.to_string(),
            message: "'Keys' must be an array of arrays".to_string(),
        })?,
        None => return Ok(Vec::new()),
    };

    let mut keys = Vec::with_capacity(arr.len());
    for tuple in arr {
        let parts = tuple.as_array().ok_or_else(|| ModelError::EntityError {
            entity: entity.to_string(),
            message: "each key tuple must be an array of member names".to_string(),
        })?;
        let mut key = Vec::with_capacity(parts.len());
        for part in parts {
            let part = part.as_str().ok_or_else(|| ModelError::EntityError {
                entity: entity.to_string(),
                message: "key tuple members must be strings".to_string(),
            })?;
            key.push(part.to_string());
        }
        keys.push(key);
    }
    Ok(keys)
}

fn parse_properties(
    props: &serde_json::Value,
    entity: &str,
) -> Result<Vec<ModelProperty>, ModelError> {
    let arr = props.as_array().ok_or_else(|| ModelError::EntityError {
        entity: entity.to_string(),
        message: "'Properties' must be an array".to_string(),
    })?;

    let mut out = Vec::with_capacity(arr.len());
    for obj in arr {
        let name = required_str(obj, "Name").map_err(|_| ModelError::EntityError {
            entity: entity.to_string(),
            message: "property missing 'Name' field".to_string(),
        })?;
        let type_name = required_str(obj, "Type").map_err(|_| ModelError::EntityError {
            entity: entity.to_string(),
            message: format!("property '{}' missing 'Type' field", name),
        })?;
        let nullable = obj
            .get("Nullable")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        out.push(ModelProperty {
            name,
            type_name,
            nullable,
        });
    }
    Ok(out)
}

fn parse_navigations(
    navs: &serde_json::Value,
    entity: &str,
) -> Result<Vec<ModelNavigation>, ModelError> {
    let arr = navs.as_array().ok_or_else(|| ModelError::EntityError {
        entity: entity.to_string(),
        message: "'Navigations' must be an array".to_string(),
    })?;

    let mut out = Vec::with_capacity(arr.len());
    for obj in arr {
        let name = required_str(obj, "Name").map_err(|_| ModelError::EntityError {
            entity: entity.to_string(),
            message: "navigation missing 'Name' field".to_string(),
        })?;
        let target = required_str(obj, "Target").map_err(|_| ModelError::EntityError {
            entity: entity.to_string(),
            message: format!("navigation '{}' missing 'Target' field", name),
        })?;
        let is_collection = obj
            .get("IsCollection")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        out.push(ModelNavigation {
            name,
            target,
            is_collection,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_document() -> serde_json::Value {
        json!({
            "Contexts": [
                {
                    "Context": "ShopContext",
                    "Entities": [
                        {
                            "Name": "Order",
                            "Clr": "Shop.Domain.Order",
                            "Keys": [["Id"]],
                            "Properties": [
                                {"Name": "Id", "Type": "Int"},
                                {"Name": "Total", "Type": "Decimal", "Nullable": true}
                            ],
                            "Navigations": [
                                {"Name": "Customer", "Target": "Customer", "IsCollection": false},
                                {"Name": "Lines", "Target": "OrderLine", "IsCollection": true}
                            ]
                        },
                        {
                            "Name": "Customer",
                            "Keys": [["Id"]],
                            "Navigations": []
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_parse_full_document() {
        let doc = from_model_json(&order_document()).unwrap();
        assert_eq!(doc.contexts.len(), 1);
        assert_eq!(doc.contexts[0].context, "ShopContext");
        assert_eq!(doc.contexts[0].entities.len(), 2);

        let order = doc.entity("Order").unwrap();
        assert_eq!(order.clr.as_deref(), Some("Shop.Domain.Order"));
        assert_eq!(order.keys, vec![vec!["Id".to_string()]]);
        assert_eq!(order.properties.len(), 2);
        assert!(order.properties[1].nullable);
        assert_eq!(order.navigations.len(), 2);
        assert!(order.navigations[1].is_collection);
    }

    #[test]
    fn test_absent_properties_and_keys_are_empty() {
        let doc = from_model_json(&json!({
            "Contexts": [
                {"Context": "C", "Entities": [{"Name": "Tag", "Navigations": []}]}
            ]
        }))
        .unwrap();
        let tag = doc.entity("Tag").unwrap();
        assert!(tag.keys.is_empty());
        assert!(tag.properties.is_empty());
    }

    #[test]
    fn test_missing_contexts_fails() {
        let err = from_model_json(&json!({})).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingField {
                field: "Contexts".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_navigation_fails() {
        let err = from_model_json(&json!({
            "Contexts": [
                {
                    "Context": "C",
                    "Entities": [
                        {"Name": "Order", "Navigations": [{"Name": "Customer"}]}
                    ]
                }
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, ModelError::EntityError { ref entity, .. } if entity == "Order"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let doc = from_model_json(&json!({
            "Contexts": [
                {
                    "Context": "C",
                    "FutureField": true,
                    "Entities": [{"Name": "Order", "Shadow": 1}]
                }
            ]
        }))
        .unwrap();
        assert!(doc.entity("Order").is_some());
    }

    #[test]
    fn test_entity_lookup_across_contexts() {
        let doc = from_model_json(&json!({
            "Contexts": [
                {"Context": "A", "Entities": [{"Name": "Order"}]},
                {"Context": "B", "Entities": [{"Name": "Invoice"}]}
            ]
        }))
        .unwrap();
        assert!(doc.entity("Invoice").is_some());
        assert!(doc.entity("Missing").is_none());
        assert_eq!(doc.entities().count(), 2);
    }
}

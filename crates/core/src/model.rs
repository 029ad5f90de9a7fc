//! Semantic model shared across the engine.
//!
//! These types describe the source side (entities, members, navigations)
//! and the rule side (projection rules). They live here so that the
//! resolver, the cycle controller, and the rewriter can import them
//! without depending on the document layer.

use crate::error::EngineError;
use facet_interchange::ModelDocument;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ──────────────────────────────────────────────
// Scalar kinds and type references
// ──────────────────────────────────────────────

/// The scalar kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Date,
    DateTime,
    Uuid,
    Bytes,
}

impl ScalarKind {
    /// Map a model-document type name to a scalar kind.
    /// Unrecognized names are opaque pass-through, not errors.
    pub fn from_type_name(name: &str) -> Option<ScalarKind> {
        match name {
            "Bool" | "Boolean" => Some(ScalarKind::Bool),
            "Int" | "Long" => Some(ScalarKind::Int),
            "Float" | "Double" => Some(ScalarKind::Float),
            "Decimal" => Some(ScalarKind::Decimal),
            "Text" | "String" => Some(ScalarKind::Text),
            "Date" => Some(ScalarKind::Date),
            "DateTime" => Some(ScalarKind::DateTime),
            "Uuid" | "Guid" => Some(ScalarKind::Uuid),
            "Bytes" | "Binary" => Some(ScalarKind::Bytes),
            _ => None,
        }
    }
}

/// A semantic type descriptor: scalar kind, named entity/projection,
/// collection of another type, or an opaque pass-through name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeRef {
    Scalar(ScalarKind),
    /// Reference to an entity or a projection by name; resolved against
    /// the schema model or the type environment.
    Named(String),
    Collection(Box<TypeRef>),
    /// A type name the engine cannot resolve. Tolerated and carried
    /// through unchanged.
    Opaque(String),
}

impl TypeRef {
    pub fn collection_of(inner: TypeRef) -> TypeRef {
        TypeRef::Collection(Box::new(inner))
    }

    /// The name carried by a Named reference, if this is one.
    pub fn named(&self) -> Option<&str> {
        match self {
            TypeRef::Named(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            TypeRef::Scalar(k) => format!("{:?}", k),
            TypeRef::Named(n) => n.clone(),
            TypeRef::Collection(inner) => format!("Collection<{}>", inner.display_name()),
            TypeRef::Opaque(n) => n.clone(),
        }
    }
}

/// True when a value of `from` can stand where `to` is expected.
///
/// Identity plus the widening ladder Int -> Float -> Decimal and
/// Date -> DateTime. The rewriter checks both directions before
/// reconstructing an operator over retyped operands.
pub fn assignable(from: &TypeRef, to: &TypeRef) -> bool {
    if from == to {
        return true;
    }
    match (from, to) {
        (TypeRef::Scalar(f), TypeRef::Scalar(t)) => matches!(
            (f, t),
            (ScalarKind::Int, ScalarKind::Float)
                | (ScalarKind::Int, ScalarKind::Decimal)
                | (ScalarKind::Float, ScalarKind::Decimal)
                | (ScalarKind::Date, ScalarKind::DateTime)
        ),
        _ => false,
    }
}

// ──────────────────────────────────────────────
// Entities
// ──────────────────────────────────────────────

/// A scalar member of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub declared_type: TypeRef,
    pub nullable: bool,
}

/// A navigation (relationship) member of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    pub name: String,
    pub target_entity: String,
    pub is_collection: bool,
}

/// A named data shape: scalar members, navigations, composite keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub scalar_members: Vec<Member>,
    pub navigations: Vec<Navigation>,
    /// Composite key descriptors; each inner vec is one key tuple.
    pub key_parts: Vec<Vec<String>>,
}

impl Entity {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.scalar_members.iter().find(|m| m.name == name)
    }

    pub fn navigation(&self, name: &str) -> Option<&Navigation> {
        self.navigations.iter().find(|n| n.name == name)
    }

    /// True when `name` is a scalar member or a navigation of this entity.
    pub fn has_member_name(&self, name: &str) -> bool {
        self.member(name).is_some() || self.navigation(name).is_some()
    }

    /// True when the entity declares at least one non-empty key tuple.
    pub fn has_key(&self) -> bool {
        self.key_parts.iter().any(|k| !k.is_empty())
    }

    /// True when the entity has no navigations of its own.
    pub fn is_scalar_only(&self) -> bool {
        self.navigations.is_empty()
    }

    fn validate_member_names(&self) -> Result<(), EngineError> {
        let mut seen = BTreeSet::new();
        for name in self
            .scalar_members
            .iter()
            .map(|m| m.name.as_str())
            .chain(self.navigations.iter().map(|n| n.name.as_str()))
        {
            if !seen.insert(name) {
                return Err(EngineError::DuplicateMemberName {
                    entity: self.name.clone(),
                    member: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Schema model
// ──────────────────────────────────────────────

/// Immutable description of all known entities, loaded once per run.
///
/// Built from a parsed [`ModelDocument`], or [`SchemaModel::empty`] when
/// no document is available -- in that case navigation validation is
/// disabled but nothing fails.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaModel {
    entities: BTreeMap<String, Entity>,
}

impl SchemaModel {
    pub fn empty() -> SchemaModel {
        SchemaModel {
            entities: BTreeMap::new(),
        }
    }

    /// Build the schema from a model document, merging entities across
    /// contexts. Duplicate entity names or duplicate member names within
    /// an entity are errors.
    pub fn from_document(doc: &ModelDocument) -> Result<SchemaModel, EngineError> {
        let mut schema = SchemaModel::empty();
        for e in doc.entities() {
            let scalar_members = e
                .properties
                .iter()
                .map(|p| Member {
                    name: p.name.clone(),
                    declared_type: match ScalarKind::from_type_name(&p.type_name) {
                        Some(kind) => TypeRef::Scalar(kind),
                        None => TypeRef::Opaque(p.type_name.clone()),
                    },
                    nullable: p.nullable,
                })
                .collect();
            let navigations = e
                .navigations
                .iter()
                .map(|n| Navigation {
                    name: n.name.clone(),
                    target_entity: n.target.clone(),
                    is_collection: n.is_collection,
                })
                .collect();
            schema.insert(Entity {
                name: e.name.clone(),
                scalar_members,
                navigations,
                key_parts: e.keys.clone(),
            })?;
        }
        Ok(schema)
    }

    pub fn insert(&mut self, entity: Entity) -> Result<(), EngineError> {
        entity.validate_member_names()?;
        if self.entities.contains_key(&entity.name) {
            return Err(EngineError::DuplicateEntity {
                entity: entity.name,
            });
        }
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ──────────────────────────────────────────────
// Projection rules
// ──────────────────────────────────────────────

/// The generation purposes a rule can request projections for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IncludeKind {
    Create,
    Update,
    Response,
    Query,
    Upsert,
}

impl IncludeKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            IncludeKind::Create => "Create",
            IncludeKind::Update => "Update",
            IncludeKind::Response => "Response",
            IncludeKind::Query => "Query",
            IncludeKind::Upsert => "Upsert",
        }
    }
}

/// Declarative rule set for deriving a projection from a source entity.
/// Owned by the configuration loader; consumed read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionRule {
    pub source_entity: String,
    pub include_kinds: BTreeSet<IncludeKind>,
    pub excluded_members: BTreeSet<String>,
    pub rename_map: BTreeMap<String, String>,
    pub naming_prefix: Option<String>,
    pub naming_suffix: Option<String>,
    pub flatten_nested_scalars: bool,
    pub include_collections_verbatim: bool,
    pub max_depth: u32,
    pub preserve_reference_identity: bool,
}

impl ProjectionRule {
    pub const DEFAULT_MAX_DEPTH: u32 = 3;

    pub fn new(source_entity: impl Into<String>) -> ProjectionRule {
        ProjectionRule {
            source_entity: source_entity.into(),
            include_kinds: BTreeSet::new(),
            excluded_members: BTreeSet::new(),
            rename_map: BTreeMap::new(),
            naming_prefix: None,
            naming_suffix: None,
            flatten_nested_scalars: false,
            include_collections_verbatim: false,
            max_depth: Self::DEFAULT_MAX_DEPTH,
            preserve_reference_identity: false,
        }
    }

    /// The rule restricted to a single include kind. The pipeline runs
    /// one generation pass per (rule, kind).
    pub fn for_kind(&self, kind: IncludeKind) -> ProjectionRule {
        let mut rule = self.clone();
        rule.include_kinds = BTreeSet::from([kind]);
        rule
    }

    /// True when this rule generates partial-match filter shapes, which
    /// force every scalar member nullable.
    pub fn is_query(&self) -> bool {
        self.include_kinds.contains(&IncludeKind::Query)
    }

    /// Final target name for a source member: explicit rename wins,
    /// otherwise prefix + name + suffix.
    pub fn target_name_for(&self, member_name: &str) -> String {
        if let Some(renamed) = self.rename_map.get(member_name) {
            return renamed.clone();
        }
        format!(
            "{}{}{}",
            self.naming_prefix.as_deref().unwrap_or(""),
            member_name,
            self.naming_suffix.as_deref().unwrap_or("")
        )
    }

    /// Name of the projection this rule derives for `entity` under `kind`.
    /// Affixes win when configured; the kind name is the fallback suffix.
    pub fn projection_name(&self, entity: &str, kind: IncludeKind) -> String {
        if self.naming_prefix.is_some() || self.naming_suffix.is_some() {
            format!(
                "{}{}{}",
                self.naming_prefix.as_deref().unwrap_or(""),
                entity,
                self.naming_suffix.as_deref().unwrap_or("")
            )
        } else {
            format!("{}{}", entity, kind.suffix())
        }
    }

    /// Rule applied to a nested entity reached through a navigation:
    /// naming flags and depth carry over, entity-specific exclusions and
    /// renames do not.
    pub fn derived_for(&self, entity: &str) -> ProjectionRule {
        ProjectionRule {
            source_entity: entity.to_string(),
            include_kinds: self.include_kinds.clone(),
            excluded_members: BTreeSet::new(),
            rename_map: BTreeMap::new(),
            naming_prefix: self.naming_prefix.clone(),
            naming_suffix: self.naming_suffix.clone(),
            flatten_nested_scalars: self.flatten_nested_scalars,
            include_collections_verbatim: self.include_collections_verbatim,
            max_depth: self.max_depth,
            preserve_reference_identity: self.preserve_reference_identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_entity() -> Entity {
        Entity {
            name: "Order".to_string(),
            scalar_members: vec![
                Member {
                    name: "Id".to_string(),
                    declared_type: TypeRef::Scalar(ScalarKind::Int),
                    nullable: false,
                },
                Member {
                    name: "Total".to_string(),
                    declared_type: TypeRef::Scalar(ScalarKind::Decimal),
                    nullable: true,
                },
            ],
            navigations: vec![Navigation {
                name: "Customer".to_string(),
                target_entity: "Customer".to_string(),
                is_collection: false,
            }],
            key_parts: vec![vec!["Id".to_string()]],
        }
    }

    #[test]
    fn test_entity_lookups() {
        let e = order_entity();
        assert!(e.member("Total").is_some());
        assert!(e.navigation("Customer").is_some());
        assert!(e.has_member_name("Customer"));
        assert!(!e.has_member_name("Missing"));
        assert!(e.has_key());
        assert!(!e.is_scalar_only());
    }

    #[test]
    fn test_schema_rejects_duplicate_entity() {
        let mut schema = SchemaModel::empty();
        schema.insert(order_entity()).unwrap();
        let err = schema.insert(order_entity()).unwrap_err();
        assert_eq!(
            err,
            EngineError::DuplicateEntity {
                entity: "Order".to_string()
            }
        );
    }

    #[test]
    fn test_schema_rejects_duplicate_member_name() {
        let mut e = order_entity();
        e.navigations.push(Navigation {
            name: "Total".to_string(),
            target_entity: "X".to_string(),
            is_collection: false,
        });
        let mut schema = SchemaModel::empty();
        let err = schema.insert(e).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateMemberName { ref member, .. } if member == "Total"));
    }

    #[test]
    fn test_schema_from_document() {
        let doc = facet_interchange::from_model_json(&serde_json::json!({
            "Contexts": [
                {
                    "Context": "Shop",
                    "Entities": [
                        {
                            "Name": "Order",
                            "Keys": [["Id"]],
                            "Properties": [
                                {"Name": "Id", "Type": "Int"},
                                {"Name": "Region", "Type": "ZipArea"}
                            ],
                            "Navigations": [
                                {"Name": "Customer", "Target": "Customer", "IsCollection": false}
                            ]
                        }
                    ]
                }
            ]
        }))
        .unwrap();
        let schema = SchemaModel::from_document(&doc).unwrap();
        let order = schema.entity("Order").unwrap();
        assert_eq!(
            order.member("Id").unwrap().declared_type,
            TypeRef::Scalar(ScalarKind::Int)
        );
        // Unknown type names pass through as opaque.
        assert_eq!(
            order.member("Region").unwrap().declared_type,
            TypeRef::Opaque("ZipArea".to_string())
        );
    }

    #[test]
    fn test_target_name_precedence() {
        let mut rule = ProjectionRule::new("Order");
        rule.naming_prefix = Some("Dto".to_string());
        rule.naming_suffix = Some("Field".to_string());
        rule.rename_map
            .insert("Email".to_string(), "ContactEmail".to_string());
        assert_eq!(rule.target_name_for("Email"), "ContactEmail");
        assert_eq!(rule.target_name_for("Id"), "DtoIdField");
    }

    #[test]
    fn test_projection_name_affixes_and_kind_fallback() {
        let mut rule = ProjectionRule::new("Order");
        assert_eq!(
            rule.projection_name("Order", IncludeKind::Response),
            "OrderResponse"
        );
        rule.naming_suffix = Some("Dto".to_string());
        assert_eq!(
            rule.projection_name("Order", IncludeKind::Response),
            "OrderDto"
        );
    }

    #[test]
    fn test_derived_rule_drops_entity_specific_maps() {
        let mut rule = ProjectionRule::new("Order");
        rule.excluded_members.insert("Secret".to_string());
        rule.rename_map.insert("A".to_string(), "B".to_string());
        rule.naming_suffix = Some("Dto".to_string());
        rule.max_depth = 5;
        let derived = rule.derived_for("Customer");
        assert_eq!(derived.source_entity, "Customer");
        assert!(derived.excluded_members.is_empty());
        assert!(derived.rename_map.is_empty());
        assert_eq!(derived.naming_suffix.as_deref(), Some("Dto"));
        assert_eq!(derived.max_depth, 5);
    }

    #[test]
    fn test_assignability_widening() {
        let int = TypeRef::Scalar(ScalarKind::Int);
        let float = TypeRef::Scalar(ScalarKind::Float);
        let text = TypeRef::Scalar(ScalarKind::Text);
        assert!(assignable(&int, &int));
        assert!(assignable(&int, &float));
        assert!(!assignable(&float, &int));
        assert!(!assignable(&int, &text));
    }
}

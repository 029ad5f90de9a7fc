//! Correspondence resolver: source-member to target-member mapping.
//!
//! `resolve()` computes the ordered member list of a projection from an
//! entity and a rule. [`CorrespondenceTable`] adds the forward/reverse
//! index the expression rewriter consumes, and [`ResolverCache`] memoizes
//! tables per (source entity, target projection) pair so concurrent
//! generation passes share resolution work.

use crate::error::EngineError;
use crate::model::{Entity, ProjectionRule, SchemaModel, TypeRef};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// One resolved projection member: final target name, path back to the
/// source member, and the carried semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMember {
    pub target_name: String,
    pub source_path: Vec<String>,
    pub semantic_type: TypeRef,
    pub nullable: bool,
}

impl ResolvedMember {
    pub fn source_display(&self) -> String {
        self.source_path.join(".")
    }
}

/// Compute the ordered (target, source path, type) list for `entity`
/// under `rule`.
///
/// Output order is deterministic: scalar members in declaration order,
/// then navigation-derived members in navigation declaration order.
/// Configuration errors (bad rename source, unknown excluded member,
/// colliding target names) are fatal to this entity's pass.
pub fn resolve(
    entity: &Entity,
    rule: &ProjectionRule,
    schema: &SchemaModel,
) -> Result<Vec<ResolvedMember>, EngineError> {
    for excluded in &rule.excluded_members {
        if !entity.has_member_name(excluded) {
            return Err(EngineError::UnknownExcludedMember {
                entity: entity.name.clone(),
                member: excluded.clone(),
            });
        }
    }
    for rename_source in rule.rename_map.keys() {
        if !entity.has_member_name(rename_source) {
            return Err(EngineError::UnresolvableMember {
                entity: entity.name.clone(),
                member: rename_source.clone(),
            });
        }
    }

    let force_nullable = rule.is_query();
    let mut members = Vec::new();

    for m in &entity.scalar_members {
        if rule.excluded_members.contains(&m.name) {
            continue;
        }
        members.push(ResolvedMember {
            target_name: rule.target_name_for(&m.name),
            source_path: vec![m.name.clone()],
            semantic_type: m.declared_type.clone(),
            nullable: m.nullable || force_nullable,
        });
    }

    for nav in &entity.navigations {
        if rule.excluded_members.contains(&nav.name) {
            continue;
        }
        if nav.is_collection {
            if !rule.include_collections_verbatim {
                continue;
            }
            let element = if schema.is_empty() || schema.entity(&nav.target_entity).is_some() {
                TypeRef::Named(nav.target_entity.clone())
            } else {
                TypeRef::Opaque(nav.target_entity.clone())
            };
            members.push(ResolvedMember {
                target_name: rule.target_name_for(&nav.name),
                source_path: vec![nav.name.clone()],
                semantic_type: TypeRef::collection_of(element),
                nullable: false,
            });
            continue;
        }
        if rule.flatten_nested_scalars {
            if let Some(target) = schema.entity(&nav.target_entity) {
                if target.is_scalar_only() {
                    for nested in &target.scalar_members {
                        let combined = format!("{}{}", nav.name, nested.name);
                        members.push(ResolvedMember {
                            target_name: rule.target_name_for(&combined),
                            source_path: vec![nav.name.clone(), nested.name.clone()],
                            semantic_type: nested.declared_type.clone(),
                            nullable: nested.nullable || force_nullable,
                        });
                    }
                }
            }
        }
        // Remaining non-collection navigations belong to the cycle
        // controller, which attaches nested projections instead of
        // flat members.
    }

    let mut seen: BTreeMap<&str, &ResolvedMember> = BTreeMap::new();
    for m in &members {
        if let Some(first) = seen.insert(m.target_name.as_str(), m) {
            return Err(EngineError::DuplicateTargetName {
                entity: entity.name.clone(),
                target: m.target_name.clone(),
                first_source: first.source_display(),
                second_source: m.source_display(),
            });
        }
    }

    Ok(members)
}

// ──────────────────────────────────────────────
// Correspondence table
// ──────────────────────────────────────────────

/// Forward and reverse member index over one (entity, projection) pair.
///
/// Single-segment source paths feed the rewriter's member remapping;
/// flattened two-segment paths are carried in `members` but are not
/// remappable as direct accesses.
#[derive(Debug, Clone, Serialize)]
pub struct CorrespondenceTable {
    pub source_entity: String,
    pub target_name: String,
    pub members: Vec<ResolvedMember>,
    target_by_source: BTreeMap<String, String>,
    source_by_target: BTreeMap<String, String>,
}

impl CorrespondenceTable {
    pub fn from_members(
        source_entity: impl Into<String>,
        target_name: impl Into<String>,
        members: Vec<ResolvedMember>,
    ) -> CorrespondenceTable {
        let mut target_by_source = BTreeMap::new();
        let mut source_by_target = BTreeMap::new();
        for m in &members {
            if let [source] = m.source_path.as_slice() {
                target_by_source.insert(source.clone(), m.target_name.clone());
                source_by_target.insert(m.target_name.clone(), source.clone());
            }
        }
        CorrespondenceTable {
            source_entity: source_entity.into(),
            target_name: target_name.into(),
            members,
            target_by_source,
            source_by_target,
        }
    }

    /// Resolve and index in one step.
    pub fn build(
        entity: &Entity,
        rule: &ProjectionRule,
        schema: &SchemaModel,
        target_name: &str,
    ) -> Result<CorrespondenceTable, EngineError> {
        let members = resolve(entity, rule, schema)?;
        Ok(CorrespondenceTable::from_members(
            entity.name.clone(),
            target_name,
            members,
        ))
    }

    /// Record an identity correspondence for a navigation that survives
    /// into the projection as a nested member under its own name.
    pub fn add_navigation(&mut self, navigation: &str) {
        self.target_by_source
            .insert(navigation.to_string(), navigation.to_string());
        self.source_by_target
            .insert(navigation.to_string(), navigation.to_string());
    }

    pub fn target_for_source(&self, source: &str) -> Option<&str> {
        self.target_by_source.get(source).map(String::as_str)
    }

    pub fn source_for_target(&self, target: &str) -> Option<&str> {
        self.source_by_target.get(target).map(String::as_str)
    }
}

// ──────────────────────────────────────────────
// Memoization
// ──────────────────────────────────────────────

/// Read-mostly memo of correspondence tables keyed by
/// (source entity, target projection name). Safe to share across
/// concurrent generation passes.
#[derive(Debug, Default)]
pub struct ResolverCache {
    inner: RwLock<HashMap<(String, String), Arc<CorrespondenceTable>>>,
}

impl ResolverCache {
    pub fn new() -> ResolverCache {
        ResolverCache::default()
    }

    /// Fetch or build the table for one pair.
    pub fn table(
        &self,
        entity: &Entity,
        rule: &ProjectionRule,
        schema: &SchemaModel,
        target_name: &str,
    ) -> Result<Arc<CorrespondenceTable>, EngineError> {
        let key = (entity.name.clone(), target_name.to_string());
        {
            let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = map.get(&key) {
                return Ok(Arc::clone(hit));
            }
        }
        let built = Arc::new(CorrespondenceTable::build(entity, rule, schema, target_name)?);
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(map.entry(key).or_insert(built)))
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

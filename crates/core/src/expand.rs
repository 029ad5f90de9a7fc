//! Cycle & depth controller: recursive projection expansion.
//!
//! Self-referential and mutually-referential entity graphs are expanded
//! into an arena of projection nodes indexed by (projection name, depth)
//! instead of a naively recursive structure, so diamonds share nodes and
//! the graph stays bounded. Depth capping and cycle breaking are soft
//! policy: omitted navigations are recorded as diagnostics, never errors.

use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::error::EngineError;
use crate::model::{Entity, IncludeKind, ProjectionRule, SchemaModel};
use crate::resolve::{resolve, ResolvedMember};
use serde::Serialize;
use std::collections::BTreeMap;

/// Index of a node within a [`ProjectionGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ProjectionId(pub usize);

/// One projection in the graph: resolved members plus nested projection
/// references keyed by navigation name. `nested` is always present --
/// empty at the depth cap, never absent.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionNode {
    pub name: String,
    pub source_entity: String,
    pub depth: u32,
    pub members: Vec<ResolvedMember>,
    pub nested: BTreeMap<String, ProjectionId>,
    /// Declares that the runtime copy step must track source-to-target
    /// identity; the engine only tags.
    pub preserve_reference_identity: bool,
}

/// Arena of projection nodes produced by one expansion pass.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionGraph {
    nodes: Vec<ProjectionNode>,
    root: ProjectionId,
}

impl ProjectionGraph {
    pub fn root_id(&self) -> ProjectionId {
        self.root
    }

    pub fn root(&self) -> &ProjectionNode {
        &self.nodes[self.root.0]
    }

    pub fn node(&self, id: ProjectionId) -> &ProjectionNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ProjectionNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The set of expanded navigation edges, keyed by
    /// (source entity, depth, navigation name). Depth-cap monotonicity
    /// is stated over this set.
    pub fn navigation_edges(&self) -> std::collections::BTreeSet<(String, u32, String)> {
        let mut edges = std::collections::BTreeSet::new();
        for node in &self.nodes {
            for nav in node.nested.keys() {
                edges.insert((node.source_entity.clone(), node.depth, nav.clone()));
            }
        }
        edges
    }
}

/// Registry of cycle-breaking variant rules, keyed by the entity whose
/// re-entry they break. Supplied by configuration.
#[derive(Debug, Clone, Default)]
pub struct VariantRegistry {
    variants: BTreeMap<String, ProjectionRule>,
}

impl VariantRegistry {
    pub fn new() -> VariantRegistry {
        VariantRegistry::default()
    }

    pub fn register(&mut self, entity: impl Into<String>, rule: ProjectionRule) {
        self.variants.insert(entity.into(), rule);
    }

    pub fn get(&self, entity: &str) -> Option<&ProjectionRule> {
        self.variants.get(entity)
    }
}

/// Expand `entity` into a projection graph under `rule`.
///
/// Nested entities reached through navigations use the rule derived from
/// the parent (naming flags and depth carry over, entity-specific maps
/// do not). See [`expand_with_rules`] to supply per-entity rules.
pub fn expand(
    entity_name: &str,
    rule: &ProjectionRule,
    schema: &SchemaModel,
    variants: &VariantRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<ProjectionGraph, EngineError> {
    expand_with_rules(entity_name, rule, schema, &BTreeMap::new(), variants, diagnostics)
}

/// Expand with a per-entity rule map consulted for nested entities.
pub fn expand_with_rules(
    entity_name: &str,
    rule: &ProjectionRule,
    schema: &SchemaModel,
    rules_by_entity: &BTreeMap<String, ProjectionRule>,
    variants: &VariantRegistry,
    diagnostics: &mut Diagnostics,
) -> Result<ProjectionGraph, EngineError> {
    let entity = schema
        .entity(entity_name)
        .ok_or_else(|| EngineError::UnknownEntity {
            entity: entity_name.to_string(),
        })?;
    let kind = effective_kind(rule);

    let mut expander = Expander {
        schema,
        rules_by_entity,
        variants,
        kind,
        nodes: Vec::new(),
        index: BTreeMap::new(),
    };
    let mut path = Vec::new();
    let root = expander.expand_at(entity, rule, 0, &mut path, diagnostics)?;

    Ok(ProjectionGraph {
        nodes: expander.nodes,
        root,
    })
}

fn effective_kind(rule: &ProjectionRule) -> IncludeKind {
    rule.include_kinds
        .iter()
        .next()
        .copied()
        .unwrap_or(IncludeKind::Response)
}

struct Expander<'a> {
    schema: &'a SchemaModel,
    rules_by_entity: &'a BTreeMap<String, ProjectionRule>,
    variants: &'a VariantRegistry,
    kind: IncludeKind,
    nodes: Vec<ProjectionNode>,
    index: BTreeMap<(String, u32), ProjectionId>,
}

impl Expander<'_> {
    fn expand_at(
        &mut self,
        entity: &Entity,
        rule: &ProjectionRule,
        depth: u32,
        path: &mut Vec<String>,
        diagnostics: &mut Diagnostics,
    ) -> Result<ProjectionId, EngineError> {
        let name = rule.projection_name(&entity.name, self.kind);
        if let Some(&existing) = self.index.get(&(name.clone(), depth)) {
            return Ok(existing);
        }

        let members = resolve(entity, rule, self.schema)?;

        path.push(entity.name.clone());
        let mut nested = BTreeMap::new();
        for nav in &entity.navigations {
            if rule.excluded_members.contains(&nav.name) || nav.is_collection {
                continue;
            }
            let child_depth = depth + 1;
            if child_depth >= rule.max_depth {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::DepthCapOmitted,
                        vec![
                            entity.name.clone(),
                            nav.name.clone(),
                            rule.max_depth.to_string(),
                        ],
                    )
                    .with_entity(entity.name.clone()),
                );
                continue;
            }
            let target = match self.schema.entity(&nav.target_entity) {
                Some(target) => target,
                None => {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::UnresolvedNavigationTarget,
                            vec![
                                entity.name.clone(),
                                nav.name.clone(),
                                nav.target_entity.clone(),
                            ],
                        )
                        .with_entity(entity.name.clone()),
                    );
                    continue;
                }
            };
            let child_rule = if path.contains(&target.name) {
                match self.variants.get(&target.name) {
                    Some(variant) => variant.for_kind(self.kind),
                    None => {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticCode::CycleOmitted,
                                vec![
                                    entity.name.clone(),
                                    nav.name.clone(),
                                    target.name.clone(),
                                ],
                            )
                            .with_entity(entity.name.clone()),
                        );
                        continue;
                    }
                }
            } else {
                self.rules_by_entity
                    .get(&target.name)
                    .cloned()
                    .unwrap_or_else(|| rule.derived_for(&target.name))
                    .for_kind(self.kind)
            };
            let child = self.expand_at(target, &child_rule, child_depth, path, diagnostics)?;
            nested.insert(nav.name.clone(), child);
        }
        path.pop();

        let id = ProjectionId(self.nodes.len());
        self.nodes.push(ProjectionNode {
            name: name.clone(),
            source_entity: entity.name.clone(),
            depth,
            members,
            nested,
            preserve_reference_identity: rule.preserve_reference_identity,
        });
        self.index.insert((name, depth), id);
        Ok(id)
    }
}

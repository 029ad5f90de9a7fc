//! Per-entity generation passes and the fan-in merge.
//!
//! Each (rule, kind) pair is one unit of work, a pure function of the
//! schema and configuration. A failing unit is converted to an
//! error-severity diagnostic at the unit boundary and excluded from the
//! merge; sibling units are unaffected. The merge itself is a pure
//! reduce, so units can run on worker threads with a fan-in barrier.

use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::expand::{expand_with_rules, ProjectionGraph, VariantRegistry};
use crate::model::{IncludeKind, ProjectionRule, SchemaModel};
use serde::Serialize;
use std::collections::BTreeMap;

/// Merged output of one generation run: the assembled projection graphs
/// keyed by projection name, plus every diagnostic raised on the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutput {
    pub projections: BTreeMap<String, ProjectionGraph>,
    pub diagnostics: Diagnostics,
}

/// Run one generation pass per (rule, include kind) and merge.
pub fn expand_all(
    schema: &SchemaModel,
    rules: &[ProjectionRule],
    variants: &VariantRegistry,
) -> RunOutput {
    let mut rules_by_entity: BTreeMap<String, ProjectionRule> = BTreeMap::new();
    for rule in rules {
        rules_by_entity
            .entry(rule.source_entity.clone())
            .or_insert_with(|| rule.clone());
    }

    let mut output = RunOutput::default();
    for rule in rules {
        let kinds: Vec<IncludeKind> = if rule.include_kinds.is_empty() {
            vec![IncludeKind::Response]
        } else {
            rule.include_kinds.iter().copied().collect()
        };
        for kind in kinds {
            let effective = rule.for_kind(kind);
            let name = effective.projection_name(&rule.source_entity, kind);
            let mut unit_diagnostics = Diagnostics::new();
            let result = expand_with_rules(
                &rule.source_entity,
                &effective,
                schema,
                &rules_by_entity,
                variants,
                &mut unit_diagnostics,
            );
            output.diagnostics.merge(unit_diagnostics);
            match result {
                Ok(graph) => {
                    if output.projections.contains_key(&name) {
                        output.diagnostics.push(
                            Diagnostic::new(
                                DiagnosticCode::DuplicateProjectionName,
                                vec![name.clone()],
                            )
                            .with_entity(rule.source_entity.clone()),
                        );
                    } else {
                        output.projections.insert(name, graph);
                    }
                }
                Err(error) => {
                    output.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::GenerationFailed,
                            vec![name, error.to_string()],
                        )
                        .with_entity(rule.source_entity.clone()),
                    );
                }
            }
        }
    }
    output.diagnostics.sort();
    output
}

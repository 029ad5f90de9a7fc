//! Navigation-chain discovery over call-site expression trees.
//!
//! Walks backward from each terminal invocation through the selector
//! chain to the anchoring query opener, collects nested chains from
//! single-parameter lambda arguments, merges per-entity path sets across
//! the corpus, enforces the chain depth cap with one truncation
//! diagnostic per offending original path, and validates retained paths
//! against the schema model when one is available.

use crate::corpus::{anchor_entity, chain_segment, is_terminal, CallSite, ChainUse};
use facet_core::{
    CancelToken, Diagnostic, DiagnosticCode, Diagnostics, EngineError, Expr, SchemaModel,
};
use std::collections::{BTreeMap, BTreeSet};

/// Scan one corpus unit for recognized call sites.
///
/// The only failure is cooperative cancellation; unrecognized shapes
/// are simply skipped.
pub fn scan_call_site(site: &CallSite, cancel: &CancelToken) -> Result<Vec<ChainUse>, EngineError> {
    let mut uses = Vec::new();
    scan_expr(&site.expr, cancel, &mut uses)?;
    Ok(uses)
}

fn scan_expr(
    expr: &Expr,
    cancel: &CancelToken,
    out: &mut Vec<ChainUse>,
) -> Result<(), EngineError> {
    cancel.check()?;

    if let Expr::Call {
        receiver: Some(receiver),
        method,
        args,
        ..
    } = expr
    {
        if is_terminal(method) {
            if let Some((entity_name, main_segments)) = walk_chain(receiver) {
                let mut paths = BTreeSet::new();
                let main = main_segments.join("/");
                if !main.is_empty() {
                    paths.insert(main.clone());
                }
                for arg in args {
                    if let Expr::Lambda { params, body } = arg {
                        if params.len() == 1 {
                            let mut nested = Vec::new();
                            collect_nested_chains(body, &mut nested);
                            for nested_path in nested {
                                if !main.is_empty() {
                                    paths.insert(format!("{}/{}", main, nested_path));
                                }
                                paths.insert(nested_path);
                            }
                        }
                    }
                }
                out.push(ChainUse { entity_name, paths });
            }
        }
    }

    match expr {
        Expr::Member { receiver, .. } => scan_expr(receiver, cancel, out)?,
        Expr::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                scan_expr(receiver, cancel, out)?;
            }
            for arg in args {
                scan_expr(arg, cancel, out)?;
            }
        }
        Expr::Lambda { body, .. } => scan_expr(body, cancel, out)?,
        Expr::Binary { left, right, .. } => {
            scan_expr(left, cancel, out)?;
            scan_expr(right, cancel, out)?;
        }
        Expr::Unary { operand, .. } | Expr::Convert { operand, .. } => {
            scan_expr(operand, cancel, out)?;
        }
        Expr::Parameter(_) | Expr::Constant { .. } => {}
    }
    Ok(())
}

/// Walk backward from a terminal invocation's receiver: selector calls
/// contribute segments (prepended, so the final path keeps left-to-right
/// call order) until the anchoring opener names the entity.
fn walk_chain(receiver: &Expr) -> Option<(String, Vec<String>)> {
    let mut segments = Vec::new();
    let mut current = receiver;
    loop {
        match current {
            Expr::Call {
                receiver: Some(inner),
                method,
                ..
            } => match chain_segment(method) {
                Some(segment) => {
                    segments.push(segment.to_string());
                    current = inner;
                }
                None => break,
            },
            _ => break,
        }
    }
    let entity = anchor_entity(current)?;
    segments.reverse();
    Some((entity.to_string(), segments))
}

/// Collect every maximal selector chain inside a lambda body. Each chain
/// becomes one slash path; traversal continues below the chain's base
/// receiver and through the outermost call's arguments.
fn collect_nested_chains(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Call {
            receiver: Some(receiver),
            method,
            args,
            ..
        } => {
            if chain_segment(method).is_some() {
                let mut segments = Vec::new();
                let mut current = expr;
                while let Expr::Call {
                    receiver: Some(inner),
                    method,
                    ..
                } = current
                {
                    match chain_segment(method) {
                        Some(segment) => {
                            segments.push(segment.to_string());
                            current = inner;
                        }
                        None => break,
                    }
                }
                segments.reverse();
                out.push(segments.join("/"));
                collect_nested_chains(current, out);
                for arg in args {
                    collect_nested_chains(arg, out);
                }
            } else {
                collect_nested_chains(receiver, out);
                for arg in args {
                    collect_nested_chains(arg, out);
                }
            }
        }
        Expr::Call { receiver: None, args, .. } => {
            for arg in args {
                collect_nested_chains(arg, out);
            }
        }
        Expr::Member { receiver, .. } => collect_nested_chains(receiver, out),
        Expr::Lambda { body, .. } => collect_nested_chains(body, out),
        Expr::Binary { left, right, .. } => {
            collect_nested_chains(left, out);
            collect_nested_chains(right, out);
        }
        Expr::Unary { operand, .. } | Expr::Convert { operand, .. } => {
            collect_nested_chains(operand, out);
        }
        Expr::Parameter(_) | Expr::Constant { .. } => {}
    }
}

/// Union all chain uses into one per-entity path map. Pure reduce:
/// associative, commutative, duplicates collapse.
pub fn merge_uses(uses: impl IntoIterator<Item = ChainUse>) -> BTreeMap<String, BTreeSet<String>> {
    let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for chain_use in uses {
        let entry = merged.entry(chain_use.entity_name).or_default();
        entry.extend(chain_use.paths.into_iter().filter(|p| !p.is_empty()));
    }
    merged
}

/// Truncate paths beyond `max_depth` segments, keeping the truncated
/// path and emitting one diagnostic per (entity, original path).
pub fn cap_paths(
    chains: &mut BTreeMap<String, BTreeSet<String>>,
    max_depth: u32,
    diagnostics: &mut Diagnostics,
) {
    for (entity, paths) in chains.iter_mut() {
        let mut capped = BTreeSet::new();
        for path in paths.iter() {
            let segments: Vec<&str> = path.split('/').collect();
            if segments.len() as u32 > max_depth {
                let truncated = segments[..max_depth as usize].join("/");
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::ChainDepthExceeded,
                        vec![
                            path.clone(),
                            entity.clone(),
                            max_depth.to_string(),
                            truncated.clone(),
                        ],
                    )
                    .with_entity(entity.clone()),
                );
                capped.insert(truncated);
            } else {
                capped.insert(path.clone());
            }
        }
        *paths = capped;
    }
}

/// Validate retained paths segment by segment against the schema.
/// An empty schema means no document was supplied; validation is
/// disabled entirely.
pub fn validate_chains(
    chains: &BTreeMap<String, BTreeSet<String>>,
    schema: &SchemaModel,
    diagnostics: &mut Diagnostics,
) {
    if schema.is_empty() {
        return;
    }
    for (entity_name, paths) in chains {
        let entity = match schema.entity(entity_name) {
            Some(entity) => entity,
            None => {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::UnknownChainEntity,
                        vec![entity_name.clone()],
                    )
                    .with_entity(entity_name.clone()),
                );
                continue;
            }
        };
        if !entity.has_key() {
            diagnostics.push(
                Diagnostic::new(DiagnosticCode::MissingKeyTuple, vec![entity_name.clone()])
                    .with_entity(entity_name.clone()),
            );
        }
        for path in paths {
            let mut current = entity;
            for segment in path.split('/') {
                let nav = match current.navigation(segment) {
                    Some(nav) => nav,
                    None => {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticCode::UnknownNavigation,
                                vec![current.name.clone(), segment.to_string(), path.clone()],
                            )
                            .with_entity(entity_name.clone()),
                        );
                        break;
                    }
                };
                match schema.entity(&nav.target_entity) {
                    Some(next) => current = next,
                    None => {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticCode::UnresolvedNavigationTarget,
                                vec![
                                    current.name.clone(),
                                    nav.name.clone(),
                                    nav.target_entity.clone(),
                                ],
                            )
                            .with_entity(entity_name.clone()),
                        );
                        break;
                    }
                }
            }
        }
    }
}

//! Call-site corpus types and recognition constants.
//!
//! Discovery is name-based over expression trees: a fixed set of
//! materializing method names terminates a chain, a fixed prefix marks
//! path-selector calls, and a fixed opener anchors the chain on an
//! entity type argument. All matching is case-insensitive; segment
//! casing is preserved from the call site.

use facet_core::{Expr, TypeRef};
use serde::Serialize;
use std::collections::BTreeSet;

/// Materializing method names (lowercased) that terminate a chain.
pub const TERMINAL_METHODS: &[&str] = &[
    "first",
    "firstasync",
    "single",
    "singleasync",
    "tolist",
    "tolistasync",
    "bykey",
    "bykeyasync",
];

/// Prefix of path-selector calls.
pub const CHAIN_PREFIX: &str = "with";

/// Name of the call that opens a projected query over an entity.
pub const ANCHOR_METHOD: &str = "facet";

/// True when `method` is a materializing terminal invocation.
pub fn is_terminal(method: &str) -> bool {
    let lowered = method.to_ascii_lowercase();
    TERMINAL_METHODS.contains(&lowered.as_str())
}

/// The path segment contributed by a selector call, if `method` carries
/// the chain prefix in any casing with a non-empty remainder.
pub fn chain_segment(method: &str) -> Option<&str> {
    if method.len() <= CHAIN_PREFIX.len() || !method.is_char_boundary(CHAIN_PREFIX.len()) {
        return None;
    }
    let (prefix, segment) = method.split_at(CHAIN_PREFIX.len());
    if prefix.eq_ignore_ascii_case(CHAIN_PREFIX) {
        Some(segment)
    } else {
        None
    }
}

/// The anchored entity name, when `expr` is the query-opening call with
/// an entity type argument.
pub fn anchor_entity(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Call {
            method, type_args, ..
        } if method.eq_ignore_ascii_case(ANCHOR_METHOD) => match type_args.first() {
            Some(TypeRef::Named(entity)) => Some(entity.as_str()),
            _ => None,
        },
        _ => None,
    }
}

/// One unit of the scanned corpus: a labelled call-site expression tree.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Unit label for error context, typically a file name.
    pub source: String,
    pub expr: Expr,
}

impl CallSite {
    pub fn new(source: impl Into<String>, expr: Expr) -> CallSite {
        CallSite {
            source: source.into(),
            expr,
        }
    }
}

/// The paths one recognized call site dereferences on one entity.
/// Ephemeral; merged into the per-entity path map by the discovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainUse {
    pub entity_name: String,
    pub paths: BTreeSet<String>,
}

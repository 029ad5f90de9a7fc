//! facet-core: Facet projection engine core library.
//!
//! Derives target shapes ("projections") from source entities under
//! declarative rules, and rewrites expression trees written against a
//! source entity into equivalent trees against its projection.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`resolve()`] -- compute the member correspondence for one entity
//! - [`expand()`] -- expand an entity into a projection graph
//! - [`rewrite()`] -- rewrite a source expression against the target shape
//! - [`expand_all()`] -- run every configured generation pass and merge
//! - [`SchemaModel`] -- immutable entity descriptions
//! - [`ProjectionRule`] -- declarative rule set per source entity
//! - [`Diagnostics`] -- explicit per-pass diagnostics collector
//! - [`EngineError`] -- engine error type
//!
//! Individual modules are public for selective use.

pub mod cancel;
pub mod diagnostics;
pub mod error;
pub mod expand;
pub mod expr;
pub mod model;
pub mod options;
pub mod pipeline;
pub mod resolve;
pub mod rewrite;

// ── Convenience re-exports: key types ────────────────────────────────

pub use cancel::CancelToken;
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use error::EngineError;
pub use expand::{ProjectionGraph, ProjectionId, ProjectionNode, VariantRegistry};
pub use expr::{BinaryOp, Expr, Literal, MethodSig, Parameter, TypeEnv, UnaryOp};
pub use model::{
    assignable, Entity, IncludeKind, Member, Navigation, ProjectionRule, ScalarKind, SchemaModel,
    TypeRef,
};
pub use options::EngineOptions;
pub use pipeline::RunOutput;
pub use resolve::{CorrespondenceTable, ResolvedMember, ResolverCache};
pub use rewrite::{register_projection_shapes, Rewriter, TypeMap};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use expand::{expand, expand_with_rules};
pub use pipeline::expand_all;
pub use resolve::resolve;
pub use rewrite::rewrite;

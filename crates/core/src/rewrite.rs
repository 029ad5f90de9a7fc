//! Expression rewriter: source-entity trees to projection trees.
//!
//! A single-pass walk with no backtracking. The rewritten tree is
//! structurally isomorphic to the input except at parameter, member,
//! and method substitution points; operand order and short-circuit
//! semantics are untouched.

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::expand::ProjectionGraph;
use crate::expr::{Expr, Parameter, TypeEnv};
use crate::model::{assignable, TypeRef};
use crate::resolve::CorrespondenceTable;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ──────────────────────────────────────────────
// Source-to-target type map
// ──────────────────────────────────────────────

/// The set of (source entity -> target projection) pairs active during a
/// rewrite, with the correspondence table for each pair.
#[derive(Debug, Clone, Default)]
pub struct TypeMap {
    pairs: BTreeMap<String, String>,
    tables: BTreeMap<String, Arc<CorrespondenceTable>>,
}

impl TypeMap {
    pub fn new() -> TypeMap {
        TypeMap::default()
    }

    pub fn insert(&mut self, table: CorrespondenceTable) {
        self.pairs
            .insert(table.source_entity.clone(), table.target_name.clone());
        self.tables
            .insert(table.source_entity.clone(), Arc::new(table));
    }

    /// Build the map from an expanded projection graph: one pair per
    /// arena node, nested navigations kept under their own names.
    /// The first node wins when an entity appears at several depths.
    pub fn from_graph(graph: &ProjectionGraph) -> TypeMap {
        let mut map = TypeMap::new();
        for node in graph.nodes() {
            if map.pairs.contains_key(&node.source_entity) {
                continue;
            }
            let mut table = CorrespondenceTable::from_members(
                node.source_entity.clone(),
                node.name.clone(),
                node.members.clone(),
            );
            for nav in node.nested.keys() {
                table.add_navigation(nav);
            }
            map.insert(table);
        }
        map
    }

    pub fn target_of(&self, source: &str) -> Option<&str> {
        self.pairs.get(source).map(String::as_str)
    }

    pub fn table_for(&self, source: &str) -> Option<&CorrespondenceTable> {
        self.tables.get(source).map(Arc::as_ref)
    }
}

/// Register every projection shape of `graph` in `env` so `type_of`
/// can answer queries against rewritten receivers.
pub fn register_projection_shapes(graph: &ProjectionGraph, env: &mut TypeEnv) {
    for node in graph.nodes() {
        let mut members: Vec<(String, TypeRef)> = node
            .members
            .iter()
            .map(|m| (m.target_name.clone(), m.semantic_type.clone()))
            .collect();
        for (nav, child) in &node.nested {
            members.push((nav.clone(), TypeRef::Named(graph.node(*child).name.clone())));
        }
        env.insert_shape(node.name.clone(), members);
    }
}

// ──────────────────────────────────────────────
// Rewriter
// ──────────────────────────────────────────────

/// One rewrite unit. Parameter substitution is memoized per original
/// parameter id, so every reference to one parameter resolves to the
/// identical replacement -- including inside nested lambdas, which share
/// this map with the enclosing expression.
pub struct Rewriter<'a> {
    env: &'a TypeEnv,
    map: &'a TypeMap,
    cancel: CancelToken,
    params: HashMap<u32, Parameter>,
    next_param_id: u32,
}

impl<'a> Rewriter<'a> {
    pub fn new(env: &'a TypeEnv, map: &'a TypeMap, cancel: CancelToken) -> Rewriter<'a> {
        Rewriter {
            env,
            map,
            cancel,
            params: HashMap::new(),
            next_param_id: 0,
        }
    }

    /// Rewrite `expr` against the target shapes in the type map.
    pub fn rewrite(&mut self, expr: &Expr) -> Result<Expr, EngineError> {
        if self.next_param_id == 0 {
            self.next_param_id = expr.max_param_id() + 1;
        }
        self.visit(expr)
    }

    fn fresh_param(&mut self, original: &Parameter, target: &str) -> Parameter {
        if let Some(existing) = self.params.get(&original.id) {
            return existing.clone();
        }
        let replacement = Parameter {
            id: self.next_param_id,
            name: original.name.clone(),
            ty: TypeRef::Named(target.to_string()),
        };
        self.next_param_id += 1;
        self.params.insert(original.id, replacement.clone());
        replacement
    }

    fn substitute_param(&mut self, param: &Parameter) -> Parameter {
        if let TypeRef::Named(source) = &param.ty {
            if let Some(target) = self.map.target_of(source).map(str::to_string) {
                return self.fresh_param(param, &target);
            }
        }
        param.clone()
    }

    fn map_type(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Named(source) => match self.map.target_of(source) {
                Some(target) => TypeRef::Named(target.to_string()),
                None => ty.clone(),
            },
            TypeRef::Collection(inner) => TypeRef::collection_of(self.map_type(inner)),
            other => other.clone(),
        }
    }

    fn visit(&mut self, expr: &Expr) -> Result<Expr, EngineError> {
        self.cancel.check()?;
        match expr {
            Expr::Parameter(param) => Ok(Expr::Parameter(self.substitute_param(param))),
            Expr::Constant { .. } => Ok(expr.clone()),
            Expr::Member { receiver, member } => self.visit_member(receiver, member),
            Expr::Call {
                receiver: Some(receiver),
                method,
                type_args,
                args,
            } => self.visit_call(receiver, method, type_args, args),
            Expr::Call {
                receiver: None,
                method,
                type_args,
                args,
            } => {
                let new_args = self.visit_all(args)?;
                let new_type_args: Vec<TypeRef> =
                    type_args.iter().map(|t| self.map_type(t)).collect();
                // Identity short-circuit: reuse the original static call
                // when nothing underneath changed.
                if new_args == *args && new_type_args == *type_args {
                    Ok(expr.clone())
                } else {
                    Ok(Expr::Call {
                        receiver: None,
                        method: method.clone(),
                        type_args: new_type_args,
                        args: new_args,
                    })
                }
            }
            Expr::Lambda { params, body } => {
                // Parameters are substituted before the body so that the
                // body's references hit the memoized replacements.
                let new_params: Vec<Parameter> =
                    params.iter().map(|p| self.substitute_param(p)).collect();
                let new_body = self.visit(body)?;
                Ok(Expr::Lambda {
                    params: new_params,
                    body: Box::new(new_body),
                })
            }
            Expr::Binary { op, left, right } => {
                let original_left = self.env.type_of(left);
                let original_right = self.env.type_of(right);
                let new_left = self.visit(left)?;
                let new_right = self.visit(right)?;
                let (new_left, new_right) = self.coerce_operands(
                    original_left,
                    original_right,
                    new_left,
                    new_right,
                );
                Ok(Expr::binary(*op, new_left, new_right))
            }
            Expr::Unary { op, operand } => Ok(Expr::unary(*op, self.visit(operand)?)),
            Expr::Convert { ty, operand } => {
                Ok(Expr::convert(self.map_type(ty), self.visit(operand)?))
            }
        }
    }

    fn visit_all(&mut self, exprs: &[Expr]) -> Result<Vec<Expr>, EngineError> {
        exprs.iter().map(|e| self.visit(e)).collect()
    }

    fn visit_member(&mut self, receiver: &Expr, member: &str) -> Result<Expr, EngineError> {
        let original_ty = self.env.type_of(receiver);
        let new_receiver = self.visit(receiver)?;
        let rewritten_ty = self.env.type_of(&new_receiver);

        if let (Some(TypeRef::Named(source)), Some(TypeRef::Named(rewritten))) =
            (&original_ty, &rewritten_ty)
        {
            if self.map.target_of(source) == Some(rewritten.as_str()) {
                let table = self.map.table_for(source);
                let remapped = table.and_then(|t| t.target_for_source(member));
                return match remapped {
                    Some(remapped) => Ok(Expr::member(new_receiver, remapped)),
                    None => Err(EngineError::UnmappableProperty {
                        member: member.to_string(),
                        source_type: source.clone(),
                        target_type: rewritten.clone(),
                    }),
                };
            }
        }

        Ok(Expr::Member {
            receiver: Box::new(new_receiver),
            member: member.to_string(),
        })
    }

    fn visit_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        type_args: &[TypeRef],
        args: &[Expr],
    ) -> Result<Expr, EngineError> {
        let original_ty = self.env.type_of(receiver);
        let new_receiver = self.visit(receiver)?;
        let rewritten_ty = self.env.type_of(&new_receiver);
        let new_args = self.visit_all(args)?;
        let new_type_args: Vec<TypeRef> = type_args.iter().map(|t| self.map_type(t)).collect();

        if original_ty != rewritten_ty {
            if let Some(TypeRef::Named(target)) = &rewritten_ty {
                let arg_types: Option<Vec<TypeRef>> =
                    new_args.iter().map(|a| self.env.type_of(a)).collect();
                let exact = arg_types
                    .as_deref()
                    .and_then(|types| self.env.find_method(target, method, types));
                let resolved = exact.is_some()
                    || self
                        .env
                        .find_method_by_arity(target, method, new_args.len())
                        .is_some();
                if !resolved {
                    return Err(EngineError::UnresolvableMethod {
                        method: method.to_string(),
                        receiver_type: original_ty
                            .map(|t| t.display_name())
                            .unwrap_or_else(|| "<unknown>".to_string()),
                        target_type: target.clone(),
                    });
                }
            }
        }

        Ok(Expr::Call {
            receiver: Some(Box::new(new_receiver)),
            method: method.to_string(),
            type_args: new_type_args,
            args: new_args,
        })
    }

    /// Reinsert type validity after operand rewriting: when operands
    /// agreed before and disagree now, widen whichever side the
    /// assignability check permits.
    fn coerce_operands(
        &self,
        original_left: Option<TypeRef>,
        original_right: Option<TypeRef>,
        left: Expr,
        right: Expr,
    ) -> (Expr, Expr) {
        if original_left != original_right {
            return (left, right);
        }
        let left_ty = self.env.type_of(&left);
        let right_ty = self.env.type_of(&right);
        if left_ty == right_ty {
            return (left, right);
        }
        match (left_ty, right_ty) {
            (Some(lt), Some(rt)) if assignable(&lt, &rt) => {
                (Expr::convert(rt, left), right)
            }
            (Some(lt), Some(rt)) if assignable(&rt, &lt) => {
                (left, Expr::convert(lt, right))
            }
            _ => (left, right),
        }
    }
}

/// One-shot convenience over [`Rewriter`].
pub fn rewrite(
    expr: &Expr,
    env: &TypeEnv,
    map: &TypeMap,
    cancel: CancelToken,
) -> Result<Expr, EngineError> {
    Rewriter::new(env, map, cancel).rewrite(expr)
}

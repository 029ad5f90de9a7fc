//! Expression trees and the type environment.
//!
//! Node kinds are a tagged union with an exhaustive match everywhere
//! they are consumed; structural equality (derived `PartialEq`) is the
//! equality notion used by rewriter tests. Parameters carry an explicit
//! numeric id so that repeated references to one parameter stay
//! distinguishable from equal-looking siblings.

use crate::model::{Entity, TypeRef};
use serde::Serialize;
use std::collections::BTreeMap;

// ──────────────────────────────────────────────
// Nodes
// ──────────────────────────────────────────────

/// A lambda or query parameter. `id` is the identity used for
/// substitution memoization; names are for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub id: u32,
    pub name: String,
    pub ty: TypeRef,
}

/// A constant literal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    /// Kept textual so trees stay `Eq`-comparable.
    Float(String),
    Text(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide
        )
    }
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Expr {
    Parameter(Parameter),
    Constant {
        value: Literal,
        ty: TypeRef,
    },
    Member {
        receiver: Box<Expr>,
        member: String,
    },
    Call {
        /// None for static (receiverless) calls.
        receiver: Option<Box<Expr>>,
        method: String,
        type_args: Vec<TypeRef>,
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<Parameter>,
        body: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Convert {
        ty: TypeRef,
        operand: Box<Expr>,
    },
}

impl Expr {
    pub fn parameter(param: &Parameter) -> Expr {
        Expr::Parameter(param.clone())
    }

    pub fn member(receiver: Expr, member: impl Into<String>) -> Expr {
        Expr::Member {
            receiver: Box::new(receiver),
            member: member.into(),
        }
    }

    pub fn call(receiver: Expr, method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            receiver: Some(Box::new(receiver)),
            method: method.into(),
            type_args: Vec::new(),
            args,
        }
    }

    pub fn call_with_types(
        receiver: Expr,
        method: impl Into<String>,
        type_args: Vec<TypeRef>,
        args: Vec<Expr>,
    ) -> Expr {
        Expr::Call {
            receiver: Some(Box::new(receiver)),
            method: method.into(),
            type_args,
            args,
        }
    }

    pub fn static_call(method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            receiver: None,
            method: method.into(),
            type_args: Vec::new(),
            args,
        }
    }

    pub fn lambda(params: Vec<Parameter>, body: Expr) -> Expr {
        Expr::Lambda {
            params,
            body: Box::new(body),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn convert(ty: TypeRef, operand: Expr) -> Expr {
        Expr::Convert {
            ty,
            operand: Box::new(operand),
        }
    }

    pub fn text(value: impl Into<String>) -> Expr {
        Expr::Constant {
            value: Literal::Text(value.into()),
            ty: TypeRef::Scalar(crate::model::ScalarKind::Text),
        }
    }

    pub fn int(value: i64) -> Expr {
        Expr::Constant {
            value: Literal::Int(value),
            ty: TypeRef::Scalar(crate::model::ScalarKind::Int),
        }
    }

    pub fn bool_lit(value: bool) -> Expr {
        Expr::Constant {
            value: Literal::Bool(value),
            ty: TypeRef::Scalar(crate::model::ScalarKind::Bool),
        }
    }

    /// Largest parameter id anywhere in the tree; fresh substitution
    /// parameters are allocated above this.
    pub fn max_param_id(&self) -> u32 {
        match self {
            Expr::Parameter(p) => p.id,
            Expr::Constant { .. } => 0,
            Expr::Member { receiver, .. } => receiver.max_param_id(),
            Expr::Call { receiver, args, .. } => {
                let mut max = receiver.as_ref().map_or(0, |r| r.max_param_id());
                for arg in args {
                    max = max.max(arg.max_param_id());
                }
                max
            }
            Expr::Lambda { params, body } => {
                let mut max = body.max_param_id();
                for p in params {
                    max = max.max(p.id);
                }
                max
            }
            Expr::Binary { left, right, .. } => left.max_param_id().max(right.max_param_id()),
            Expr::Unary { operand, .. } | Expr::Convert { operand, .. } => operand.max_param_id(),
        }
    }
}

// ──────────────────────────────────────────────
// Type environment
// ──────────────────────────────────────────────

/// A method signature registered on a named type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

/// Name-to-shape map for entities and projections, plus registered
/// method signatures, answering `type_of` queries during rewriting.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    shapes: BTreeMap<String, BTreeMap<String, TypeRef>>,
    methods: BTreeMap<String, Vec<MethodSig>>,
}

impl TypeEnv {
    pub fn new() -> TypeEnv {
        TypeEnv::default()
    }

    /// Register an entity's shape: scalar members plus navigations as
    /// named (or collection-of-named) references.
    pub fn insert_entity(&mut self, entity: &Entity) {
        let mut members = BTreeMap::new();
        for m in &entity.scalar_members {
            members.insert(m.name.clone(), m.declared_type.clone());
        }
        for n in &entity.navigations {
            let target = TypeRef::Named(n.target_entity.clone());
            let ty = if n.is_collection {
                TypeRef::collection_of(target)
            } else {
                target
            };
            members.insert(n.name.clone(), ty);
        }
        self.shapes.insert(entity.name.clone(), members);
    }

    /// Register an arbitrary named shape (used for projections).
    pub fn insert_shape(
        &mut self,
        name: impl Into<String>,
        members: impl IntoIterator<Item = (String, TypeRef)>,
    ) {
        self.shapes.insert(name.into(), members.into_iter().collect());
    }

    pub fn register_method(&mut self, type_name: impl Into<String>, sig: MethodSig) {
        self.methods.entry(type_name.into()).or_default().push(sig);
    }

    pub fn has_shape(&self, name: &str) -> bool {
        self.shapes.contains_key(name)
    }

    pub fn member_type(&self, type_name: &str, member: &str) -> Option<&TypeRef> {
        self.shapes.get(type_name).and_then(|s| s.get(member))
    }

    /// Exact-signature method lookup: same name, same parameter types.
    pub fn find_method(
        &self,
        type_name: &str,
        name: &str,
        arg_types: &[TypeRef],
    ) -> Option<&MethodSig> {
        self.methods.get(type_name).and_then(|sigs| {
            sigs.iter()
                .find(|s| s.name == name && s.params.as_slice() == arg_types)
        })
    }

    /// Fallback lookup: same name, same arity.
    pub fn find_method_by_arity(
        &self,
        type_name: &str,
        name: &str,
        arity: usize,
    ) -> Option<&MethodSig> {
        self.methods
            .get(type_name)
            .and_then(|sigs| sigs.iter().find(|s| s.name == name && s.params.len() == arity))
    }

    /// Static type of an expression, when the environment can determine
    /// one. Unknowable types (static calls, lambdas, unregistered
    /// members) are `None`, and the rewriter leaves such nodes alone.
    pub fn type_of(&self, expr: &Expr) -> Option<TypeRef> {
        match expr {
            Expr::Parameter(p) => Some(p.ty.clone()),
            Expr::Constant { ty, .. } => Some(ty.clone()),
            Expr::Member { receiver, member } => {
                let receiver_ty = self.type_of(receiver)?;
                let name = receiver_ty.named()?;
                self.member_type(name, member).cloned()
            }
            Expr::Call {
                receiver: Some(receiver),
                method,
                args,
                ..
            } => {
                let receiver_ty = self.type_of(receiver)?;
                let name = receiver_ty.named()?;
                let arg_types: Option<Vec<TypeRef>> =
                    args.iter().map(|a| self.type_of(a)).collect();
                match arg_types {
                    Some(arg_types) => self
                        .find_method(name, method, &arg_types)
                        .or_else(|| self.find_method_by_arity(name, method, args.len()))
                        .map(|s| s.ret.clone()),
                    None => self
                        .find_method_by_arity(name, method, args.len())
                        .map(|s| s.ret.clone()),
                }
            }
            Expr::Call { receiver: None, .. } => None,
            Expr::Lambda { .. } => None,
            Expr::Binary { op, left, .. } => {
                if op.is_comparison() || op.is_logical() {
                    Some(TypeRef::Scalar(crate::model::ScalarKind::Bool))
                } else {
                    self.type_of(left)
                }
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => Some(TypeRef::Scalar(crate::model::ScalarKind::Bool)),
                UnaryOp::Negate => self.type_of(operand),
            },
            Expr::Convert { ty, .. } => Some(ty.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Member, Navigation, ScalarKind};

    fn order_entity() -> Entity {
        Entity {
            name: "Order".to_string(),
            scalar_members: vec![Member {
                name: "Total".to_string(),
                declared_type: TypeRef::Scalar(ScalarKind::Decimal),
                nullable: false,
            }],
            navigations: vec![
                Navigation {
                    name: "Customer".to_string(),
                    target_entity: "Customer".to_string(),
                    is_collection: false,
                },
                Navigation {
                    name: "Lines".to_string(),
                    target_entity: "OrderLine".to_string(),
                    is_collection: true,
                },
            ],
            key_parts: vec![vec!["Id".to_string()]],
        }
    }

    #[test]
    fn test_entity_shape_registration() {
        let mut env = TypeEnv::new();
        env.insert_entity(&order_entity());
        assert_eq!(
            env.member_type("Order", "Customer"),
            Some(&TypeRef::Named("Customer".to_string()))
        );
        assert_eq!(
            env.member_type("Order", "Lines"),
            Some(&TypeRef::collection_of(TypeRef::Named(
                "OrderLine".to_string()
            )))
        );
    }

    #[test]
    fn test_type_of_member_chain() {
        let mut env = TypeEnv::new();
        env.insert_entity(&order_entity());
        env.insert_shape(
            "Customer",
            [("Email".to_string(), TypeRef::Scalar(ScalarKind::Text))],
        );

        let o = Parameter {
            id: 1,
            name: "o".to_string(),
            ty: TypeRef::Named("Order".to_string()),
        };
        let email = Expr::member(Expr::member(Expr::parameter(&o), "Customer"), "Email");
        assert_eq!(env.type_of(&email), Some(TypeRef::Scalar(ScalarKind::Text)));
    }

    #[test]
    fn test_type_of_binary_and_unary() {
        let env = TypeEnv::new();
        let cmp = Expr::binary(BinaryOp::Eq, Expr::int(1), Expr::int(2));
        assert_eq!(env.type_of(&cmp), Some(TypeRef::Scalar(ScalarKind::Bool)));
        let add = Expr::binary(BinaryOp::Add, Expr::int(1), Expr::int(2));
        assert_eq!(env.type_of(&add), Some(TypeRef::Scalar(ScalarKind::Int)));
        let neg = Expr::unary(UnaryOp::Negate, Expr::int(1));
        assert_eq!(env.type_of(&neg), Some(TypeRef::Scalar(ScalarKind::Int)));
    }

    #[test]
    fn test_method_lookup_exact_then_arity() {
        let mut env = TypeEnv::new();
        env.register_method(
            "Text",
            MethodSig {
                name: "StartsWith".to_string(),
                params: vec![TypeRef::Scalar(ScalarKind::Text)],
                ret: TypeRef::Scalar(ScalarKind::Bool),
            },
        );
        let exact = env.find_method(
            "Text",
            "StartsWith",
            &[TypeRef::Scalar(ScalarKind::Text)],
        );
        assert!(exact.is_some());
        assert!(env
            .find_method("Text", "StartsWith", &[TypeRef::Scalar(ScalarKind::Int)])
            .is_none());
        assert!(env.find_method_by_arity("Text", "StartsWith", 1).is_some());
    }

    #[test]
    fn test_max_param_id() {
        let p1 = Parameter {
            id: 3,
            name: "a".to_string(),
            ty: TypeRef::Scalar(ScalarKind::Int),
        };
        let p2 = Parameter {
            id: 7,
            name: "b".to_string(),
            ty: TypeRef::Scalar(ScalarKind::Int),
        };
        let expr = Expr::lambda(
            vec![p1.clone()],
            Expr::binary(BinaryOp::Add, Expr::parameter(&p1), Expr::parameter(&p2)),
        );
        assert_eq!(expr.max_param_id(), 7);
    }
}

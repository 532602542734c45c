//! Expression normalization and stable hashing.
//!
//! Normalization rewrites a tree bottom-up and repeats until nothing changes:
//! - `true AND x` and `false OR x` become `x`
//! - `false AND x` becomes `false`, `true OR x` becomes `true`
//! - repeated AND/OR operands are dropped
//! - `NOT NOT x` becomes `x`
//! - operands of commutative operators are sorted by their rendering
//!
//! AND/OR chains are flattened before these rules apply and rebuilt
//! left-deep afterwards, so `(c AND (b AND a))` and `((a AND b) AND c)`
//! share one canonical form. The stable hash is computed over the canonical
//! JSON encoding of the normalized tree.

use crate::canonicalization::canonicalize_expression;
use crate::expression::{BinaryOp, Expression, UnaryOp};
use crate::hash::{digest_u64, hash_hex};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use tracing::trace;

const MAX_PASSES: usize = 64;

/// An expression in canonical form together with its stable hash.
#[derive(Clone)]
pub struct NormalizedExpression {
    expr: Expression,
    hash: u64,
}

impl NormalizedExpression {
    fn new(expr: Expression) -> Self {
        let hash = structural_hash(&expr);
        Self { expr, hash }
    }

    /// The canonical tree.
    pub fn inner_expression(&self) -> &Expression {
        &self.expr
    }

    pub fn into_inner(self) -> Expression {
        self.expr
    }

    pub fn stable_hash(&self) -> u64 {
        self.hash
    }

    /// `0x`-prefixed, fixed-width hex form of [`stable_hash`](Self::stable_hash).
    pub fn stable_hash_hex(&self) -> String {
        hash_hex(self.hash)
    }
}

impl PartialEq for NormalizedExpression {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl Eq for NormalizedExpression {}

impl std::hash::Hash for NormalizedExpression {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for NormalizedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl fmt::Debug for NormalizedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedExpression")
            .field("expr", &self.expr.to_string())
            .field("hash", &self.stable_hash_hex())
            .finish()
    }
}

impl Expression {
    /// Rewrites the expression into canonical form.
    pub fn normalize(&self) -> NormalizedExpression {
        NormalizedExpression::new(normalize_tree(self))
    }

    /// Two expressions are equivalent when their canonical forms are equal.
    pub fn is_equivalent(&self, other: &Expression) -> bool {
        normalize_tree(self) == normalize_tree(other)
    }

    /// Stable hash of the canonical form.
    pub fn stable_hash(&self) -> u64 {
        self.normalize().stable_hash()
    }

    pub fn stable_hash_hex(&self) -> String {
        self.normalize().stable_hash_hex()
    }
}

/// Normalizes to a fixed point.
pub fn normalize_tree(expr: &Expression) -> Expression {
    let mut current = rewrite(expr);
    for pass in 1..MAX_PASSES {
        let next = rewrite(&current);
        if next == current {
            trace!(passes = pass, "normalization reached fixed point");
            return current;
        }
        current = next;
    }
    current
}

fn structural_hash(expr: &Expression) -> u64 {
    let encoded = canonicalize_expression(expr).unwrap_or_else(|_| expr.to_string());
    digest_u64(encoded.as_bytes())
}

/// Total order used for commutative operands.
fn canonical_order(a: &Expression, b: &Expression) -> Ordering {
    a.to_string().cmp(&b.to_string()).then_with(|| {
        let ka = serde_json::to_string(a).unwrap_or_default();
        let kb = serde_json::to_string(b).unwrap_or_default();
        ka.cmp(&kb)
    })
}

fn rewrite(expr: &Expression) -> Expression {
    match expr {
        Expression::Binary { op, left, right } if op.is_logical() => {
            rewrite_logical(*op, rewrite(left), rewrite(right))
        }
        Expression::Binary { op, left, right } => {
            let mut left = rewrite(left);
            let mut right = rewrite(right);
            if op.is_commutative() && canonical_order(&left, &right) == Ordering::Greater {
                std::mem::swap(&mut left, &mut right);
            }
            Expression::binary(*op, left, right)
        }
        Expression::Unary { op, operand } => {
            let operand = rewrite(operand);
            match (op, operand) {
                (
                    UnaryOp::Not,
                    Expression::Unary {
                        op: UnaryOp::Not,
                        operand: inner,
                    },
                ) => *inner,
                (
                    UnaryOp::Negate,
                    Expression::Unary {
                        op: UnaryOp::Negate,
                        operand: inner,
                    },
                ) => *inner,
                (UnaryOp::Not, Expression::Literal(Value::Bool(b))) => Expression::boolean(!b),
                (op, operand) => Expression::unary(*op, operand),
            }
        }
        Expression::QuantityLiteral { value, unit } => Expression::QuantityLiteral {
            value: value.normalize(),
            unit: unit.clone(),
        },
        Expression::Cast { operand, target_type } => {
            Expression::cast(rewrite(operand), target_type.clone())
        }
        Expression::Quantifier {
            quantifier,
            variable,
            collection,
            condition,
        } => Expression::quantifier(
            *quantifier,
            variable.clone(),
            rewrite(collection),
            rewrite(condition),
        ),
        Expression::Aggregation {
            function,
            collection,
            field,
            filter,
            having,
            window,
        } => Expression::Aggregation {
            function: *function,
            collection: Box::new(rewrite(collection)),
            field: field.clone(),
            filter: filter.as_ref().map(|f| Box::new(rewrite(f))),
            having: having.as_ref().map(|h| Box::new(rewrite(h))),
            window: window.clone(),
        },
        Expression::Literal(_)
        | Expression::TimeLiteral(_)
        | Expression::IntervalLiteral { .. }
        | Expression::Variable(_)
        | Expression::MemberAccess { .. } => expr.clone(),
    }
}

fn flatten(op: BinaryOp, expr: Expression, out: &mut Vec<Expression>) {
    match expr {
        Expression::Binary {
            op: inner,
            left,
            right,
        } if inner == op => {
            flatten(op, *left, out);
            flatten(op, *right, out);
        }
        other => out.push(other),
    }
}

/// Applies identity, annihilation, idempotence and ordering to an AND/OR chain.
fn rewrite_logical(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    // AND: identity true, annihilator false. OR: the reverse.
    let identity = op == BinaryOp::And;

    let mut flat = Vec::new();
    flatten(op, left, &mut flat);
    flatten(op, right, &mut flat);

    let mut operands: Vec<Expression> = Vec::with_capacity(flat.len());
    for operand in flat {
        match operand.as_bool_literal() {
            Some(b) if b == identity => continue,
            Some(_) => return Expression::boolean(!identity),
            None => {}
        }
        if !operands.contains(&operand) {
            operands.push(operand);
        }
    }
    operands.sort_by(canonical_order);

    let mut iter = operands.into_iter();
    match iter.next() {
        None => Expression::boolean(identity),
        Some(first) => iter.fold(first, |acc, next| Expression::binary(op, acc, next)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn var(name: &str) -> Expression {
        Expression::variable(name)
    }

    #[test]
    fn test_commutative_ordering() {
        let ba = Expression::and(var("b"), var("a"));
        let ab = Expression::and(var("a"), var("b"));
        assert_eq!(ba.normalize().to_string(), "(a AND b)");
        assert_eq!(ba.normalize(), ab.normalize());
        assert_eq!(ba.stable_hash(), ab.stable_hash());
        assert!(ba.is_equivalent(&ab));
    }

    #[test]
    fn test_identity_rules() {
        let x = var("x");
        assert_eq!(Expression::and(Expression::boolean(true), x.clone()).normalize().into_inner(), x);
        assert_eq!(Expression::or(Expression::boolean(false), x.clone()).normalize().into_inner(), x);
        assert_eq!(
            Expression::and(Expression::boolean(false), x.clone()).normalize().into_inner(),
            Expression::boolean(false)
        );
        assert_eq!(
            Expression::or(x.clone(), Expression::boolean(true)).normalize().into_inner(),
            Expression::boolean(true)
        );
    }

    #[test]
    fn test_idempotence_and_double_negation() {
        let x = var("x");
        assert_eq!(Expression::and(x.clone(), x.clone()).normalize().into_inner(), x);
        assert_eq!(Expression::or(x.clone(), x.clone()).normalize().into_inner(), x);
        assert_eq!(Expression::not(Expression::not(x.clone())).normalize().into_inner(), x);
        assert_eq!(
            Expression::not(Expression::boolean(true)).normalize().into_inner(),
            Expression::boolean(false)
        );
    }

    #[test]
    fn test_associative_chains_share_form() {
        let left = Expression::and(Expression::and(var("c"), var("a")), var("b"));
        let right = Expression::and(var("b"), Expression::and(var("a"), var("c")));
        assert_eq!(left.normalize(), right.normalize());
        assert_eq!(left.normalize().to_string(), "((a AND b) AND c)");
    }

    #[test]
    fn test_nested_rules_reach_fixed_point() {
        // NOT NOT (true AND (y OR y)) -> y
        let e = Expression::not(Expression::not(Expression::and(
            Expression::boolean(true),
            Expression::or(var("y"), var("y")),
        )));
        let n = e.normalize();
        assert_eq!(n.inner_expression(), &var("y"));
        assert_eq!(n.inner_expression().normalize(), n);
    }

    #[test]
    fn test_comparison_operands_sorted() {
        let a = Expression::eq(var("b"), var("a"));
        let b = Expression::eq(var("a"), var("b"));
        assert_eq!(a.normalize(), b.normalize());
        // Non-commutative operators keep their order.
        let gt = Expression::gt(var("b"), var("a"));
        assert_eq!(gt.normalize().to_string(), "(b > a)");
    }

    #[test]
    fn test_quantity_scale_is_canonical() {
        let a = Expression::quantity(Decimal::new(1000, 1), "USD");
        let b = Expression::quantity(Decimal::from(100), "USD");
        assert_eq!(a.stable_hash(), b.stable_hash());
    }

    #[test]
    fn test_hash_hex_and_debug() {
        let n = Expression::and(var("a"), var("b")).normalize();
        let hex = n.stable_hash_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 18);
        assert!(hex[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        let dbg = format!("{:?}", n);
        assert!(dbg.contains("NormalizedExpression"));
        assert!(dbg.contains("hash"));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let e = Expression::or(var("p"), Expression::not(var("q")));
        assert_eq!(e.stable_hash(), e.clone().stable_hash());
        assert_ne!(e.stable_hash(), var("p").stable_hash());
    }
}

//! Policy evaluation engine.
//!
//! Expressions are walked against a [`Graph`] under the graph's evaluation
//! mode:
//!
//! - three-valued (default): anything that cannot be resolved (a missing
//!   object, a null attribute, quantities in different units) evaluates to
//!   `Unknown`, which propagates through Kleene AND/OR/NOT.
//! - two-valued: the same condition halts the evaluation and the policy is
//!   reported as definitely violated.
//!
//! Type errors (arithmetic in a boolean position, unbound variables, unknown
//! collections) fail the call in both modes.

use crate::aggregate;
use crate::context::{decimal_to_value, EvaluationContext};
use crate::decision::{EvaluationResult, Severity, Tristate, ValidationReport, Violation};
use crate::error::{Result, SeaError};
use crate::expression::{BinaryOp, Expression, Quantifier, UnaryOp};
use crate::graph::Graph;
use crate::policy::{Policy, PolicyPack};
use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::debug;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Unknown,
    Bool(bool),
    Number(Decimal),
    Quantity { value: Decimal, unit: String },
    Text(String),
    Time(DateTime<FixedOffset>),
    Interval(DateTime<FixedOffset>, DateTime<FixedOffset>),
    List(Vec<Value>),
    Record(Value),
}

impl EvalValue {
    pub fn from_json(value: &Value) -> EvalValue {
        match value {
            Value::Null => EvalValue::Unknown,
            Value::Bool(b) => EvalValue::Bool(*b),
            Value::Number(n) => number_to_decimal(n)
                .map(EvalValue::Number)
                .unwrap_or(EvalValue::Unknown),
            Value::String(s) => EvalValue::Text(s.clone()),
            Value::Array(items) => EvalValue::List(items.clone()),
            Value::Object(_) => EvalValue::Record(value.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            EvalValue::Unknown => Value::Null,
            EvalValue::Bool(b) => Value::Bool(*b),
            EvalValue::Number(n) => decimal_to_value(*n),
            EvalValue::Quantity { value, .. } => decimal_to_value(*value),
            EvalValue::Text(s) => Value::String(s.clone()),
            EvalValue::Time(t) => Value::String(t.to_rfc3339()),
            EvalValue::Interval(start, end) => serde_json::json!({
                "start": start.to_rfc3339(),
                "end": end.to_rfc3339(),
            }),
            EvalValue::List(items) => Value::Array(items.clone()),
            EvalValue::Record(record) => record.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EvalValue::Unknown => "unknown",
            EvalValue::Bool(_) => "boolean",
            EvalValue::Number(_) => "number",
            EvalValue::Quantity { .. } => "quantity",
            EvalValue::Text(_) => "string",
            EvalValue::Time(_) => "time",
            EvalValue::Interval(..) => "interval",
            EvalValue::List(_) => "collection",
            EvalValue::Record(_) => "record",
        }
    }
}

/// Converts a JSON number to a decimal.
pub fn number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        Some(Decimal::from(i))
    } else if let Some(u) = n.as_u64() {
        Some(Decimal::from(u))
    } else {
        n.as_f64().and_then(Decimal::from_f64)
    }
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_time(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s.trim()) {
        return Some(t);
    }
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset())
}

/// Why an evaluation stopped early.
pub(crate) enum Halt {
    /// Unresolvable input under two-valued logic.
    Unresolved(String),
    Failed(SeaError),
}

impl From<SeaError> for Halt {
    fn from(err: SeaError) -> Self {
        Halt::Failed(err)
    }
}

pub(crate) type Eval<T> = std::result::Result<T, Halt>;

pub(crate) fn eval_error(message: impl Into<String>) -> Halt {
    Halt::Failed(SeaError::Evaluation(message.into()))
}

/// Walks expressions against one graph.
#[derive(Debug)]
pub struct Evaluator<'g> {
    pub(crate) ctx: EvaluationContext<'g>,
    three_valued: bool,
}

impl<'g> Evaluator<'g> {
    /// Creates an evaluator using the graph's evaluation mode.
    pub fn new(graph: &'g Graph) -> Self {
        Self::with_mode(graph, graph.use_three_valued_logic())
    }

    pub fn with_mode(graph: &'g Graph, three_valued: bool) -> Self {
        Self {
            ctx: EvaluationContext::new(graph),
            three_valued,
        }
    }

    pub fn is_three_valued(&self) -> bool {
        self.three_valued
    }

    /// Evaluates a condition. In two-valued mode an unresolvable input yields `False`.
    pub fn evaluate(&mut self, expr: &Expression) -> Result<Tristate> {
        match self.truth(expr) {
            Ok(t) => Ok(t),
            Err(Halt::Unresolved(reason)) => {
                debug!(%reason, "unresolved input under two-valued logic");
                Ok(Tristate::False)
            }
            Err(Halt::Failed(err)) => Err(err),
        }
    }

    /// Evaluates an expression to a value. In two-valued mode an unresolvable input is an error.
    pub fn value_of(&mut self, expr: &Expression) -> Result<EvalValue> {
        match self.value(expr) {
            Ok(v) => Ok(v),
            Err(Halt::Unresolved(reason)) => Err(SeaError::Evaluation(reason)),
            Err(Halt::Failed(err)) => Err(err),
        }
    }

    /// `Unknown` in three-valued mode, a halt otherwise.
    pub(crate) fn unresolved(&self, reason: String) -> Eval<EvalValue> {
        if self.three_valued {
            debug!(%reason, "resolved to unknown");
            Ok(EvalValue::Unknown)
        } else {
            Err(Halt::Unresolved(reason))
        }
    }

    /// Converts a resolved JSON value. `null` and numbers outside the
    /// decimal range are unresolved.
    fn resolved(&self, value: &Value, origin: &str) -> Eval<EvalValue> {
        match value {
            Value::Null => self.unresolved(format!("'{}' is null", origin)),
            Value::Number(n) => match number_to_decimal(n) {
                Some(d) => Ok(EvalValue::Number(d)),
                None => self.unresolved(format!("'{}' = {} is outside the decimal range", origin, n)),
            },
            other => Ok(EvalValue::from_json(other)),
        }
    }

    pub(crate) fn truth(&mut self, expr: &Expression) -> Eval<Tristate> {
        match expr {
            Expression::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let (l, r) = self.both(left, right)?;
                Ok(l.and(r))
            }
            Expression::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let (l, r) = self.both(left, right)?;
                Ok(l.or(r))
            }
            Expression::Unary {
                op: UnaryOp::Not,
                operand,
            } => Ok(self.truth(operand)?.not()),
            Expression::Quantifier {
                quantifier,
                variable,
                collection,
                condition,
            } => self.quantify(*quantifier, variable, collection, condition),
            Expression::Aggregation { .. } => Err(eval_error(format!(
                "aggregation '{}' used as a condition",
                expr
            ))),
            other => match self.value(other)? {
                EvalValue::Bool(b) => Ok(Tristate::from(b)),
                EvalValue::Unknown => Ok(Tristate::Unknown),
                v => Err(eval_error(format!(
                    "expected a boolean from '{}', found {}",
                    other,
                    v.type_name()
                ))),
            },
        }
    }

    /// Evaluates both operands of AND/OR, always. A failure beats an
    /// unresolved input; between two of a kind the left one is reported.
    fn both(&mut self, left: &Expression, right: &Expression) -> Eval<(Tristate, Tristate)> {
        let l = self.truth(left);
        let r = self.truth(right);
        match (l, r) {
            (Ok(l), Ok(r)) => Ok((l, r)),
            (Err(Halt::Failed(err)), _) | (_, Err(Halt::Failed(err))) => Err(Halt::Failed(err)),
            (Err(halt), _) | (_, Err(halt)) => Err(halt),
        }
    }

    pub(crate) fn value(&mut self, expr: &Expression) -> Eval<EvalValue> {
        match expr {
            Expression::Literal(value) => self.resolved(value, "literal"),
            Expression::QuantityLiteral { value, unit } => Ok(EvalValue::Quantity {
                value: *value,
                unit: unit.clone(),
            }),
            Expression::TimeLiteral(ts) => parse_time(ts)
                .map(EvalValue::Time)
                .ok_or_else(|| eval_error(format!("invalid time literal '{}'", ts))),
            Expression::IntervalLiteral { start, end } => {
                let s = parse_time(start)
                    .ok_or_else(|| eval_error(format!("invalid interval start '{}'", start)))?;
                let e = parse_time(end)
                    .ok_or_else(|| eval_error(format!("invalid interval end '{}'", end)))?;
                Ok(EvalValue::Interval(s, e))
            }
            Expression::Variable(name) => match self.ctx.resolve_variable(name) {
                Some(value) => self.resolved(&value, name),
                None => match self.ctx.collection(name) {
                    Some(items) => Ok(EvalValue::List(items)),
                    None => Err(eval_error(format!("unbound variable '{}'", name))),
                },
            },
            Expression::MemberAccess { object, member } => {
                match self.ctx.resolve_member(object, member) {
                    None => self.unresolved(format!("'{}' does not exist", object)),
                    Some(value) => self.resolved(&value, &format!("{}.{}", object, member)),
                }
            }
            Expression::Binary { op, .. } if op.is_logical() => Ok(tristate_value(self.truth(expr)?)),
            Expression::Unary { op: UnaryOp::Not, .. } | Expression::Quantifier { .. } => {
                Ok(tristate_value(self.truth(expr)?))
            }
            Expression::Binary { op, left, right } => {
                let l = self.value(left)?;
                let r = self.value(right)?;
                self.apply(*op, l, r)
            }
            Expression::Unary {
                op: UnaryOp::Negate,
                operand,
            } => match self.value(operand)? {
                EvalValue::Unknown => Ok(EvalValue::Unknown),
                EvalValue::Number(n) => Ok(EvalValue::Number(-n)),
                EvalValue::Quantity { value, unit } => Ok(EvalValue::Quantity { value: -value, unit }),
                v => Err(eval_error(format!("cannot negate a {}", v.type_name()))),
            },
            Expression::Cast {
                operand,
                target_type,
            } => {
                let v = self.value(operand)?;
                self.cast(v, target_type)
            }
            Expression::Aggregation {
                function,
                collection,
                field,
                filter,
                having,
                window,
            } => aggregate::aggregate(
                self,
                *function,
                collection,
                field.as_deref(),
                filter.as_deref(),
                having.as_deref(),
                window.as_ref(),
            ),
        }
    }

    /// Items of a collection expression, or `None` when it is unknown.
    pub(crate) fn items_of(&mut self, collection: &Expression) -> Eval<Option<Vec<Value>>> {
        match self.value(collection)? {
            EvalValue::List(items) => Ok(Some(items)),
            EvalValue::Unknown => Ok(None),
            v => Err(eval_error(format!(
                "'{}' is a {}, not a collection",
                collection,
                v.type_name()
            ))),
        }
    }

    fn quantify(
        &mut self,
        quantifier: Quantifier,
        variable: &str,
        collection: &Expression,
        condition: &Expression,
    ) -> Eval<Tristate> {
        let items = match self.items_of(collection)? {
            Some(items) => items,
            None => return Ok(Tristate::Unknown),
        };

        let mut trues = 0usize;
        let mut unknown = false;
        for item in items {
            self.ctx.push_binding(variable, item);
            let outcome = self.truth(condition);
            self.ctx.pop_binding();
            match outcome? {
                Tristate::True => trues += 1,
                Tristate::False if quantifier == Quantifier::ForAll => return Ok(Tristate::False),
                Tristate::False => {}
                Tristate::Unknown => unknown = true,
            }
            match quantifier {
                Quantifier::Exists if trues > 0 => return Ok(Tristate::True),
                Quantifier::ExistsUnique if trues > 1 => return Ok(Tristate::False),
                _ => {}
            }
        }

        Ok(match quantifier {
            Quantifier::ForAll | Quantifier::Exists if unknown => Tristate::Unknown,
            Quantifier::ForAll => Tristate::True,
            Quantifier::Exists => Tristate::False,
            Quantifier::ExistsUnique => match (trues, unknown) {
                (_, true) => Tristate::Unknown,
                (1, false) => Tristate::True,
                _ => Tristate::False,
            },
        })
    }

    fn apply(&self, op: BinaryOp, l: EvalValue, r: EvalValue) -> Eval<EvalValue> {
        if l == EvalValue::Unknown || r == EvalValue::Unknown {
            return Ok(EvalValue::Unknown);
        }
        match op {
            BinaryOp::And | BinaryOp::Or => Err(eval_error("logical operator on values")),
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let equal = match (&l, &r) {
                    (EvalValue::Record(_), _)
                    | (_, EvalValue::Record(_))
                    | (EvalValue::List(_), _)
                    | (_, EvalValue::List(_)) => l.to_json() == r.to_json(),
                    _ => match order(&l, &r) {
                        Ok(Some(o)) => o == Ordering::Equal,
                        Ok(None) => {
                            return self.unresolved(format!("cannot compare {:?} with {:?}", l, r))
                        }
                        Err(_) => false,
                    },
                };
                Ok(EvalValue::Bool(if op == BinaryOp::Equal { equal } else { !equal }))
            }
            BinaryOp::GreaterThan
            | BinaryOp::LessThan
            | BinaryOp::GreaterThanOrEqual
            | BinaryOp::LessThanOrEqual => {
                let o = match order(&l, &r).map_err(eval_error)? {
                    Some(o) => o,
                    None => {
                        return self.unresolved(format!("cannot compare {:?} with {:?}", l, r))
                    }
                };
                Ok(EvalValue::Bool(match op {
                    BinaryOp::GreaterThan => o == Ordering::Greater,
                    BinaryOp::LessThan => o == Ordering::Less,
                    BinaryOp::GreaterThanOrEqual => o != Ordering::Less,
                    _ => o != Ordering::Greater,
                }))
            }
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide => {
                self.arithmetic(op, l, r)
            }
            BinaryOp::Contains => match (&l, &r) {
                (EvalValue::Text(a), EvalValue::Text(b)) => Ok(EvalValue::Bool(a.contains(b.as_str()))),
                (EvalValue::List(items), needle) => {
                    let needle = needle.to_json();
                    Ok(EvalValue::Bool(items.iter().any(|i| *i == needle)))
                }
                _ => Err(type_mismatch(op, &l, &r)),
            },
            BinaryOp::StartsWith | BinaryOp::EndsWith => match (&l, &r) {
                (EvalValue::Text(a), EvalValue::Text(b)) => Ok(EvalValue::Bool(if op == BinaryOp::StartsWith {
                    a.starts_with(b.as_str())
                } else {
                    a.ends_with(b.as_str())
                })),
                _ => Err(type_mismatch(op, &l, &r)),
            },
            BinaryOp::Matches => match (&l, &r) {
                (EvalValue::Text(text), EvalValue::Text(pattern)) => {
                    let regex = Regex::new(pattern).map_err(SeaError::from)?;
                    Ok(EvalValue::Bool(regex.is_match(text)))
                }
                _ => Err(type_mismatch(op, &l, &r)),
            },
            BinaryOp::Before | BinaryOp::After => match (as_time(&l), as_time(&r)) {
                (Some(a), Some(b)) => Ok(EvalValue::Bool(if op == BinaryOp::Before { a < b } else { a > b })),
                _ => Err(type_mismatch(op, &l, &r)),
            },
            BinaryOp::During => match (as_time(&l), &r) {
                (Some(t), EvalValue::Interval(start, end)) => Ok(EvalValue::Bool(*start <= t && t <= *end)),
                _ => Err(type_mismatch(op, &l, &r)),
            },
        }
    }

    fn arithmetic(&self, op: BinaryOp, l: EvalValue, r: EvalValue) -> Eval<EvalValue> {
        match (l, r) {
            (EvalValue::Number(a), EvalValue::Number(b)) => Ok(EvalValue::Number(checked(op, a, b)?)),
            (EvalValue::Quantity { value: a, unit: ua }, EvalValue::Quantity { value: b, unit: ub }) => {
                if ua != ub {
                    return self.unresolved(format!("incompatible units {} and {}", ua, ub));
                }
                match op {
                    BinaryOp::Plus | BinaryOp::Minus => Ok(EvalValue::Quantity {
                        value: checked(op, a, b)?,
                        unit: ua,
                    }),
                    BinaryOp::Divide => Ok(EvalValue::Number(checked(op, a, b)?)),
                    _ => Err(eval_error(format!("cannot multiply {} by {}", ua, ub))),
                }
            }
            (EvalValue::Quantity { value, unit }, EvalValue::Number(n))
                if matches!(op, BinaryOp::Multiply | BinaryOp::Divide) =>
            {
                Ok(EvalValue::Quantity {
                    value: checked(op, value, n)?,
                    unit,
                })
            }
            (EvalValue::Number(n), EvalValue::Quantity { value, unit }) if op == BinaryOp::Multiply => {
                Ok(EvalValue::Quantity {
                    value: checked(op, n, value)?,
                    unit,
                })
            }
            (EvalValue::Text(a), EvalValue::Text(b)) if op == BinaryOp::Plus => Ok(EvalValue::Text(a + &b)),
            (l, r) => Err(type_mismatch(op, &l, &r)),
        }
    }

    fn cast(&self, v: EvalValue, target: &str) -> Eval<EvalValue> {
        if v == EvalValue::Unknown {
            return Ok(EvalValue::Unknown);
        }
        match target.to_ascii_lowercase().as_str() {
            "number" | "decimal" | "integer" => match v {
                EvalValue::Number(_) => Ok(v),
                EvalValue::Quantity { value, .. } => Ok(EvalValue::Number(value)),
                EvalValue::Bool(b) => Ok(EvalValue::Number(if b { Decimal::ONE } else { Decimal::ZERO })),
                EvalValue::Text(ref s) => Decimal::from_str(s.trim())
                    .map(EvalValue::Number)
                    .map_err(|_| eval_error(format!("cannot cast '{}' to {}", s, target))),
                other => Err(eval_error(format!("cannot cast {} to {}", other.type_name(), target))),
            },
            "string" | "text" => Ok(EvalValue::Text(match v {
                EvalValue::Text(s) => s,
                EvalValue::Time(t) => t.to_rfc3339(),
                other => other.to_json().to_string(),
            })),
            "boolean" | "bool" => match v {
                EvalValue::Bool(_) => Ok(v),
                EvalValue::Text(ref s) if s == "true" || s == "false" => Ok(EvalValue::Bool(s == "true")),
                other => Err(eval_error(format!("cannot cast {} to {}", other.type_name(), target))),
            },
            "time" | "datetime" | "timestamp" => as_time(&v)
                .map(EvalValue::Time)
                .ok_or_else(|| eval_error(format!("cannot cast {} to {}", v.type_name(), target))),
            _ => match v {
                EvalValue::Number(value) => Ok(EvalValue::Quantity {
                    value,
                    unit: target.to_string(),
                }),
                EvalValue::Quantity { value, unit } if unit == target => {
                    Ok(EvalValue::Quantity { value, unit })
                }
                EvalValue::Quantity { unit, .. } => {
                    self.unresolved(format!("no conversion from {} to {}", unit, target))
                }
                other => Err(eval_error(format!("cannot cast {} to {}", other.type_name(), target))),
            },
        }
    }
}

fn tristate_value(t: Tristate) -> EvalValue {
    match t.to_option() {
        Some(b) => EvalValue::Bool(b),
        None => EvalValue::Unknown,
    }
}

fn type_mismatch(op: BinaryOp, l: &EvalValue, r: &EvalValue) -> Halt {
    eval_error(format!(
        "operator {} does not apply to {} and {}",
        op.as_str(),
        l.type_name(),
        r.type_name()
    ))
}

fn checked(op: BinaryOp, a: Decimal, b: Decimal) -> Eval<Decimal> {
    let result = match op {
        BinaryOp::Plus => a.checked_add(b),
        BinaryOp::Minus => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::Divide if b.is_zero() => return Err(eval_error("division by zero")),
        BinaryOp::Divide => a.checked_div(b),
        _ => None,
    };
    result.ok_or_else(|| eval_error(format!("arithmetic overflow in {} {} {}", a, op.as_str(), b)))
}

fn as_time(v: &EvalValue) -> Option<DateTime<FixedOffset>> {
    match v {
        EvalValue::Time(t) => Some(*t),
        EvalValue::Text(s) => parse_time(s),
        _ => None,
    }
}

/// Orders two values. `Ok(None)` means the values are of one kind but
/// incomparable (quantities in different units).
fn order(l: &EvalValue, r: &EvalValue) -> std::result::Result<Option<Ordering>, String> {
    match (l, r) {
        (EvalValue::Number(a), EvalValue::Number(b)) => Ok(Some(a.cmp(b))),
        (EvalValue::Quantity { value: a, unit: ua }, EvalValue::Quantity { value: b, unit: ub }) => {
            Ok((ua == ub).then(|| a.cmp(b)))
        }
        (EvalValue::Quantity { value: a, .. }, EvalValue::Number(b))
        | (EvalValue::Number(a), EvalValue::Quantity { value: b, .. }) => Ok(Some(a.cmp(b))),
        (EvalValue::Time(a), EvalValue::Time(b)) => Ok(Some(a.cmp(b))),
        (EvalValue::Time(a), EvalValue::Text(s)) => parse_time(s)
            .map(|b| Some(a.cmp(&b)))
            .ok_or_else(|| format!("'{}' is not a time", s)),
        (EvalValue::Text(s), EvalValue::Time(b)) => parse_time(s)
            .map(|a| Some(a.cmp(b)))
            .ok_or_else(|| format!("'{}' is not a time", s)),
        (EvalValue::Text(a), EvalValue::Text(b)) => Ok(Some(a.cmp(b))),
        (EvalValue::Bool(a), EvalValue::Bool(b)) => Ok(Some(a.cmp(b))),
        _ => Err(format!("cannot compare {} with {}", l.type_name(), r.type_name())),
    }
}

/// Evaluates a policy against a graph and maps the outcome to a result.
pub fn evaluate_policy(graph: &Graph, policy: &Policy) -> Result<EvaluationResult> {
    let severity = Severity::for_modality(policy.modality);
    let expr = policy.normalized_expression().inner_expression();
    let mut evaluator = Evaluator::new(graph);

    let result = match evaluator.truth(expr) {
        Ok(Tristate::True) => EvaluationResult::satisfied(),
        Ok(Tristate::False) => EvaluationResult::violated(Violation::new(
            &policy.name,
            format!("Policy '{}' was violated", policy.name),
            severity,
        )),
        Ok(Tristate::Unknown) => EvaluationResult::unknown(Violation::new(
            &policy.name,
            format!("Policy '{}' evaluation is UNKNOWN (NULL)", policy.name),
            severity,
        )),
        Err(Halt::Unresolved(reason)) => EvaluationResult::violated(Violation::new(
            &policy.name,
            format!("Policy '{}' was violated: {}", policy.name, reason),
            severity,
        )),
        Err(Halt::Failed(err)) => {
            debug!(policy = %policy.name, error = %err, "policy evaluation failed");
            return Err(err);
        }
    };

    debug!(
        policy = %policy.name,
        three_valued = evaluator.is_three_valued(),
        outcome = %result.tristate(),
        "evaluated policy"
    );
    Ok(result)
}

/// Evaluates every policy of a pack, highest priority first.
///
/// A policy that fails to evaluate is reported as an error violation.
pub fn validate_pack(graph: &Graph, pack: &PolicyPack) -> ValidationReport {
    let mut report = ValidationReport::default();
    for policy in pack.sorted_policies() {
        report.evaluated += 1;
        match evaluate_policy(graph, policy) {
            Ok(result) => report.violations.extend(result.violations),
            Err(err) => report.violations.push(Violation::new(
                &policy.name,
                format!("Policy '{}' could not be evaluated: {}", policy.name, err),
                Severity::Error,
            )),
        }
    }
    report
}

//! Policy expression AST.
//!
//! Expressions are immutable trees built with the factory functions on
//! [`Expression`]. They serialize as externally tagged unions keyed by
//! variant name, e.g. `{"Literal": true}` or
//! `{"MemberAccess": {"object": "Warehouse", "member": "capacity"}}`.
//!
//! `Display` produces the canonical rendering used for operand ordering
//! during normalization: binary nodes print as `(<left> <OP> <right>)`.

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Before,
    After,
    During,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Contains => "CONTAINS",
            BinaryOp::StartsWith => "STARTS_WITH",
            BinaryOp::EndsWith => "ENDS_WITH",
            BinaryOp::Matches => "MATCHES",
            BinaryOp::Before => "BEFORE",
            BinaryOp::After => "AFTER",
            BinaryOp::During => "DURING",
        }
    }

    /// Operators whose operands may be reordered freely.
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Plus
                | BinaryOp::Multiply
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Quantifier kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantifier {
    ForAll,
    Exists,
    ExistsUnique,
}

impl Quantifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantifier::ForAll => "FORALL",
            Quantifier::Exists => "EXISTS",
            Quantifier::ExistsUnique => "EXISTS_UNIQUE",
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// Time window for streaming-style aggregations: the last `duration` `unit`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub duration: u64,
    pub unit: String,
}

impl WindowSpec {
    pub fn new(duration: u64, unit: impl Into<String>) -> Self {
        Self {
            duration,
            unit: unit.into(),
        }
    }

    /// Window length, or `None` for an unknown unit or an out-of-range duration.
    pub fn as_duration(&self) -> Option<TimeDelta> {
        let n = i64::try_from(self.duration).ok()?;
        match self.unit.to_ascii_lowercase().trim_end_matches('s') {
            "second" => TimeDelta::try_seconds(n),
            "minute" => TimeDelta::try_minutes(n),
            "hour" => TimeDelta::try_hours(n),
            "day" => TimeDelta::try_days(n),
            "week" => TimeDelta::try_weeks(n),
            _ => None,
        }
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    /// Boolean, number, string or null literal.
    Literal(Value),
    QuantityLiteral {
        value: Decimal,
        unit: String,
    },
    /// RFC 3339 timestamp.
    TimeLiteral(String),
    IntervalLiteral {
        start: String,
        end: String,
    },
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    MemberAccess {
        object: String,
        member: String,
    },
    Cast {
        operand: Box<Expression>,
        target_type: String,
    },
    Quantifier {
        quantifier: Quantifier,
        variable: String,
        collection: Box<Expression>,
        condition: Box<Expression>,
    },
    Aggregation {
        function: AggregateFunction,
        collection: Box<Expression>,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        filter: Option<Box<Expression>>,
        #[serde(default)]
        having: Option<Box<Expression>>,
        #[serde(default)]
        window: Option<WindowSpec>,
    },
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Value::Bool(value))
    }

    pub fn number(value: impl Into<serde_json::Number>) -> Self {
        Expression::Literal(Value::Number(value.into()))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Value::String(value.into()))
    }

    pub fn quantity(value: Decimal, unit: impl Into<String>) -> Self {
        Expression::QuantityLiteral {
            value,
            unit: unit.into(),
        }
    }

    pub fn time(timestamp: impl Into<String>) -> Self {
        Expression::TimeLiteral(timestamp.into())
    }

    pub fn interval(start: impl Into<String>, end: impl Into<String>) -> Self {
        Expression::IntervalLiteral {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Or, left, right)
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::Equal, left, right)
    }

    pub fn gt(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::GreaterThan, left, right)
    }

    pub fn lt(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOp::LessThan, left, right)
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn not(operand: Expression) -> Self {
        Self::unary(UnaryOp::Not, operand)
    }

    pub fn negate(operand: Expression) -> Self {
        Self::unary(UnaryOp::Negate, operand)
    }

    pub fn member_access(object: impl Into<String>, member: impl Into<String>) -> Self {
        Expression::MemberAccess {
            object: object.into(),
            member: member.into(),
        }
    }

    pub fn cast(operand: Expression, target_type: impl Into<String>) -> Self {
        Expression::Cast {
            operand: Box::new(operand),
            target_type: target_type.into(),
        }
    }

    pub fn quantifier(
        quantifier: Quantifier,
        variable: impl Into<String>,
        collection: Expression,
        condition: Expression,
    ) -> Self {
        Expression::Quantifier {
            quantifier,
            variable: variable.into(),
            collection: Box::new(collection),
            condition: Box::new(condition),
        }
    }

    pub fn forall(variable: impl Into<String>, collection: Expression, condition: Expression) -> Self {
        Self::quantifier(Quantifier::ForAll, variable, collection, condition)
    }

    pub fn exists(variable: impl Into<String>, collection: Expression, condition: Expression) -> Self {
        Self::quantifier(Quantifier::Exists, variable, collection, condition)
    }

    pub fn exists_unique(variable: impl Into<String>, collection: Expression, condition: Expression) -> Self {
        Self::quantifier(Quantifier::ExistsUnique, variable, collection, condition)
    }

    /// Aggregation over a collection, optionally of one field, optionally filtered.
    pub fn aggregation(
        function: AggregateFunction,
        collection: Expression,
        field: Option<&str>,
        filter: Option<Expression>,
    ) -> Self {
        Self::aggregation_with(function, collection, field, filter, None, None)
    }

    /// Aggregation with every optional part.
    pub fn aggregation_with(
        function: AggregateFunction,
        collection: Expression,
        field: Option<&str>,
        filter: Option<Expression>,
        having: Option<Expression>,
        window: Option<WindowSpec>,
    ) -> Self {
        Expression::Aggregation {
            function,
            collection: Box::new(collection),
            field: field.map(str::to_string),
            filter: filter.map(Box::new),
            having: having.map(Box::new),
            window,
        }
    }

    /// Returns the boolean value of a boolean literal.
    pub fn as_bool_literal(&self) -> Option<bool> {
        match self {
            Expression::Literal(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(s)) => write!(f, "{:?}", s),
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::QuantityLiteral { value, unit } => write!(f, "{} {:?}", value, unit),
            Expression::TimeLiteral(ts) => write!(f, "@{:?}", ts),
            Expression::IntervalLiteral { start, end } => {
                write!(f, "interval({:?}, {:?})", start, end)
            }
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }
            Expression::Unary { op: UnaryOp::Not, operand } => write!(f, "NOT {}", operand),
            Expression::Unary { op: UnaryOp::Negate, operand } => write!(f, "-{}", operand),
            Expression::MemberAccess { object, member } => write!(f, "{}.{}", object, member),
            Expression::Cast { operand, target_type } => {
                write!(f, "{} as {:?}", operand, target_type)
            }
            Expression::Quantifier {
                quantifier,
                variable,
                collection,
                condition,
            } => write!(
                f,
                "({} {} IN {}: {})",
                quantifier.as_str(),
                variable,
                collection,
                condition
            ),
            Expression::Aggregation {
                function,
                collection,
                field,
                filter,
                having,
                window,
            } => {
                match field {
                    Some(field) => write!(f, "{}({}.{})", function.as_str(), collection, field)?,
                    None => write!(f, "{}({})", function.as_str(), collection)?,
                }
                if let Some(filter) = filter {
                    write!(f, " WHERE {}", filter)?;
                }
                if let Some(having) = having {
                    write!(f, " HAVING {}", having)?;
                }
                if let Some(window) = window {
                    write!(f, " OVER LAST {} {:?}", window.duration, window.unit)?;
                }
                Ok(())
            }
        }
    }
}

//! SEA Engine
//!
//! An in-memory business model store with a deterministic policy engine.
//!
//! Models are graphs of entities, resources, flows, instances, roles and
//! relations, built through the typed API or parsed from the SEA DSL.
//! Policies are boolean expressions that are normalized into a canonical
//! form with a stable hash, then evaluated against a graph in three-valued
//! (Kleene) or strict boolean mode. A glob-based registry assigns source
//! files to namespaces.

mod aggregate;
pub mod canonicalization;
pub mod context;
pub mod decision;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod graph;
pub mod hash;
pub mod id;
pub mod normalize;
pub mod parser;
pub mod policy;
pub mod printer;
pub mod registry;
pub mod types;

pub use decision::{EvaluationResult, Severity, Tristate, ValidationReport, Violation};
pub use error::{Result, SeaError};
pub use expression::Expression;
pub use graph::Graph;
pub use id::Id;
pub use normalize::NormalizedExpression;
pub use policy::{Policy, PolicyPack};
pub use registry::{NamespaceBinding, NamespaceRegistry};

/// Version of the engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::decision::{EvaluationResult, Severity, Tristate, ValidationReport, Violation};
    pub use crate::error::{Result, SeaError};
    pub use crate::evaluator::Evaluator;
    pub use crate::expression::{AggregateFunction, BinaryOp, Expression, Quantifier, UnaryOp};
    pub use crate::graph::Graph;
    pub use crate::id::Id;
    pub use crate::normalize::NormalizedExpression;
    pub use crate::policy::{Policy, PolicyKind, PolicyModality, PolicyPack};
    pub use crate::registry::{NamespaceBinding, NamespaceRegistry};
    pub use crate::types::*;
}

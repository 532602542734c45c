//! Policy definitions and policy documents.

use crate::error::{Result, SeaError};
use crate::expression::Expression;
use crate::id::Id;
use crate::normalize::NormalizedExpression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Deontic classification of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyModality {
    Obligation,
    Prohibition,
    Permission,
}

/// What a policy is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PolicyKind {
    #[default]
    Constraint,
    Derivation,
    Obligation,
}

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SemanticVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemanticVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl Default for SemanticVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A compliance policy: an expression plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: Id,

    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub version: SemanticVersion,

    expression: Expression,

    pub modality: PolicyModality,

    #[serde(default)]
    pub kind: PolicyKind,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub rationale: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(skip)]
    normalized: OnceLock<NormalizedExpression>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl Policy {
    /// Creates an obligation with a fresh id in the default namespace.
    pub fn new(name: impl Into<String>, expression: Expression) -> Self {
        Self {
            id: Id::generate(),
            name: name.into(),
            namespace: default_namespace(),
            version: SemanticVersion::default(),
            expression,
            modality: PolicyModality::Obligation,
            kind: PolicyKind::default(),
            priority: 0,
            rationale: None,
            tags: Vec::new(),
            normalized: OnceLock::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_modality(mut self, modality: PolicyModality) -> Self {
        self.modality = modality;
        self
    }

    pub fn with_kind(mut self, kind: PolicyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_version(mut self, version: SemanticVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Replaces the expression and drops the cached normal form.
    pub fn set_expression(&mut self, expression: Expression) {
        self.expression = expression;
        self.normalized = OnceLock::new();
    }

    /// The normalized expression, computed once per policy.
    pub fn normalized_expression(&self) -> &NormalizedExpression {
        self.normalized.get_or_init(|| self.expression.normalize())
    }

    /// Parses a policy from YAML. Expression variants are written as
    /// single-key maps (`Literal: true`), the same shape as in JSON.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let policy: Policy =
            serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(yaml))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Parses a policy from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: Policy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SeaError::Serialization(e.to_string()))
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SeaError::Validation("Policy name is required".to_string()));
        }
        if self.namespace.trim().is_empty() {
            return Err(SeaError::Validation(format!(
                "Policy '{}' has an empty namespace",
                self.name
            )));
        }
        Ok(())
    }
}

/// Supported policy document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Yaml,
    Json,
}

impl PolicyFormat {
    /// Detects format from content.
    pub fn detect(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            PolicyFormat::Json
        } else {
            PolicyFormat::Yaml
        }
    }
}

/// Parses a policy document, auto-detecting the format.
pub fn parse_policy(content: &str) -> Result<Policy> {
    parse_policy_with_format(content, PolicyFormat::detect(content))
}

pub fn parse_policy_with_format(content: &str, format: PolicyFormat) -> Result<Policy> {
    match format {
        PolicyFormat::Yaml => Policy::from_yaml(content),
        PolicyFormat::Json => Policy::from_json(content),
    }
}

/// A named, versioned set of policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyPack {
    pub id: String,

    #[serde(default)]
    pub version: SemanticVersion,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub policies: Vec<Policy>,

    #[serde(default)]
    pub metadata: std::collections::HashMap<String, serde_json::Value>,
}

impl PolicyPack {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: SemanticVersion::default(),
            name: name.into(),
            description: None,
            policies: Vec::new(),
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Policies ordered by priority, highest first. Ties keep pack order.
    pub fn sorted_policies(&self) -> Vec<&Policy> {
        let mut policies: Vec<&Policy> = self.policies.iter().collect();
        policies.sort_by(|a, b| b.priority.cmp(&a.priority));
        policies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LITERAL_TRUE: &str = r#"{
        "id": "00000000-0000-0000-0000-000000000001",
        "name": "Always",
        "namespace": "test",
        "version": {"major": 1, "minor": 0, "patch": 0},
        "expression": {"Literal": true},
        "modality": "Obligation",
        "kind": "Constraint",
        "priority": 0,
        "rationale": null,
        "tags": []
    }"#;

    #[test]
    fn test_format_detection() {
        assert_eq!(PolicyFormat::detect(r#"{"id": "x"}"#), PolicyFormat::Json);
        assert_eq!(PolicyFormat::detect("id: x"), PolicyFormat::Yaml);
    }

    #[test]
    fn test_parse_json_document() {
        let policy = parse_policy(LITERAL_TRUE).unwrap();
        assert_eq!(policy.name, "Always");
        assert_eq!(policy.namespace, "test");
        assert_eq!(policy.version.to_string(), "1.0.0");
        assert_eq!(policy.expression(), &Expression::boolean(true));
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let yaml = r#"
id: 00000000-0000-0000-0000-000000000002
name: Capacity
expression:
  MemberAccess:
    object: Warehouse
    member: capacity
modality: Prohibition
"#;
        let policy = parse_policy(yaml).unwrap();
        assert_eq!(policy.namespace, "default");
        assert_eq!(policy.kind, PolicyKind::Constraint);
        assert_eq!(policy.modality, PolicyModality::Prohibition);
        assert!(policy.tags.is_empty());
    }

    #[test]
    fn test_malformed_document_fails() {
        let err = parse_policy(r#"{"id": "nope", "name": "x"}"#).unwrap_err();
        assert!(matches!(err, SeaError::Serialization(_)));
        let err = parse_policy(r#"{"id": "00000000-0000-0000-0000-000000000001", "name": "x", "expression": {"Bogus": 1}, "modality": "Obligation"}"#).unwrap_err();
        assert!(matches!(err, SeaError::Serialization(_)));
    }

    #[test]
    fn test_normalized_expression_is_cached() {
        let policy = Policy::new(
            "p",
            Expression::and(Expression::variable("b"), Expression::variable("a")),
        );
        let first = policy.normalized_expression() as *const NormalizedExpression;
        let second = policy.normalized_expression() as *const NormalizedExpression;
        assert_eq!(first, second);
        assert_eq!(policy.normalized_expression().to_string(), "(a AND b)");
    }

    #[test]
    fn test_yaml_expressions_use_single_key_maps() {
        let yaml = r#"
id: 00000000-0000-0000-0000-000000000003
name: Rated
expression:
  Binary:
    op: And
    left: {Literal: true}
    right:
      Binary:
        op: GreaterThan
        left:
          MemberAccess: {object: Supplier, member: rating}
        right: {Literal: 3}
modality: Obligation
"#;
        let policy = Policy::from_yaml(yaml).unwrap();
        let expected = Expression::and(
            Expression::boolean(true),
            Expression::gt(Expression::member_access("Supplier", "rating"), Expression::number(3)),
        );
        assert_eq!(policy.expression(), &expected);
        assert_eq!(policy.modality, PolicyModality::Obligation);
    }

    #[test]
    fn test_set_expression_resets_normal_form() {
        let graph = crate::graph::Graph::new();
        let mut policy = Policy::new("p", Expression::boolean(true));
        assert!(crate::evaluator::evaluate_policy(&graph, &policy).unwrap().is_satisfied);

        policy.set_expression(Expression::boolean(false));
        assert_eq!(policy.normalized_expression().to_string(), "false");
        let result = crate::evaluator::evaluate_policy(&graph, &policy).unwrap();
        assert!(!result.is_satisfied);
        assert_eq!(result.is_satisfied_tristate, Some(false));
    }

    #[test]
    fn test_pack_priority_order() {
        let pack = PolicyPack::new("pack", "Pack")
            .with_policy(Policy::new("low", Expression::boolean(true)).with_priority(1))
            .with_policy(Policy::new("high", Expression::boolean(true)).with_priority(9));
        let names: Vec<&str> = pack.sorted_policies().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }
}

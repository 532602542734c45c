//! Evaluation outcome types.

use crate::policy::PolicyModality;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A truth value of three-valued logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    True,
    False,
    Unknown,
}

impl Tristate {
    pub fn and(self, other: Tristate) -> Tristate {
        match (self, other) {
            (Tristate::False, _) | (_, Tristate::False) => Tristate::False,
            (Tristate::True, Tristate::True) => Tristate::True,
            _ => Tristate::Unknown,
        }
    }

    pub fn or(self, other: Tristate) -> Tristate {
        match (self, other) {
            (Tristate::True, _) | (_, Tristate::True) => Tristate::True,
            (Tristate::False, Tristate::False) => Tristate::False,
            _ => Tristate::Unknown,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Tristate {
        match self {
            Tristate::True => Tristate::False,
            Tristate::False => Tristate::True,
            Tristate::Unknown => Tristate::Unknown,
        }
    }

    /// `Some(bool)` for definite values, `None` for unknown.
    pub fn to_option(self) -> Option<bool> {
        match self {
            Tristate::True => Some(true),
            Tristate::False => Some(false),
            Tristate::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        self == Tristate::Unknown
    }
}

impl From<bool> for Tristate {
    fn from(b: bool) -> Self {
        if b {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        value.map(Tristate::from).unwrap_or(Tristate::Unknown)
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tristate::True => write!(f, "true"),
            Tristate::False => write!(f, "false"),
            Tristate::Unknown => write!(f, "unknown"),
        }
    }
}

/// Violation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Severity of a violated policy, by modality.
    pub fn for_modality(modality: PolicyModality) -> Severity {
        match modality {
            PolicyModality::Obligation => Severity::Error,
            PolicyModality::Prohibition => Severity::Error,
            PolicyModality::Permission => Severity::Info,
        }
    }
}

/// A single policy violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Name of the violated policy.
    pub name: String,
    pub message: String,
    pub severity: Severity,
}

impl Violation {
    pub fn new(name: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Outcome of evaluating one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// `false` whenever the outcome is not definitely true.
    pub is_satisfied: bool,

    /// Definite outcome, or `None` when the expression was indeterminate.
    pub is_satisfied_tristate: Option<bool>,

    pub violations: Vec<Violation>,
}

impl EvaluationResult {
    pub fn satisfied() -> Self {
        Self {
            is_satisfied: true,
            is_satisfied_tristate: Some(true),
            violations: Vec::new(),
        }
    }

    pub fn violated(violation: Violation) -> Self {
        Self {
            is_satisfied: false,
            is_satisfied_tristate: Some(false),
            violations: vec![violation],
        }
    }

    pub fn unknown(violation: Violation) -> Self {
        Self {
            is_satisfied: false,
            is_satisfied_tristate: None,
            violations: vec![violation],
        }
    }

    pub fn tristate(&self) -> Tristate {
        Tristate::from(self.is_satisfied_tristate)
    }

    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::Error)
    }
}

/// Violations collected across a policy pack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub evaluated: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kleene_tables() {
        use Tristate::*;
        assert_eq!(Unknown.and(False), False);
        assert_eq!(Unknown.and(True), Unknown);
        assert_eq!(Unknown.or(True), True);
        assert_eq!(Unknown.or(False), Unknown);
        assert_eq!(Unknown.not(), Unknown);
        assert_eq!(True.not(), False);
    }

    #[test]
    fn test_severity_table() {
        assert_eq!(Severity::for_modality(PolicyModality::Obligation), Severity::Error);
        assert_eq!(Severity::for_modality(PolicyModality::Prohibition), Severity::Error);
        assert_eq!(Severity::for_modality(PolicyModality::Permission), Severity::Info);
    }

    #[test]
    fn test_result_constructors() {
        let ok = EvaluationResult::satisfied();
        assert!(ok.is_satisfied && ok.violations.is_empty());

        let unknown = EvaluationResult::unknown(Violation::new("p", "unknown", Severity::Error));
        assert!(!unknown.is_satisfied);
        assert_eq!(unknown.is_satisfied_tristate, None);
        assert_eq!(unknown.tristate(), Tristate::Unknown);
        assert!(unknown.has_errors());
    }
}

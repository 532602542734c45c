//! Error types for the SEA engine.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SeaError>;

/// Errors that can occur while building graphs, parsing sources,
/// evaluating policies or resolving namespaces.
#[derive(Debug, Error)]
pub enum SeaError {
    /// Identifier string is not a well-formed UUID.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A required field is empty or a value is out of range.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An id is already present in the graph.
    #[error("Duplicate id {id} (already used by a {existing})")]
    DuplicateId { id: String, existing: String },

    /// DSL token or grammar mismatch.
    #[error("Syntax error at line {line}, column {column}: {message} in '{text}'")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
        text: String,
    },

    /// A DSL statement names something that was not declared earlier.
    #[error("Unresolved {kind} reference \"{name}\" at line {line}")]
    UnresolvedReference {
        kind: String,
        name: String,
        line: usize,
    },

    /// A DSL statement declares the same kind and name twice in one namespace.
    #[error("Duplicate {kind} declaration \"{name}\" at line {line}")]
    DuplicateDeclaration {
        kind: String,
        name: String,
        line: usize,
    },

    /// Policy document or other structured input could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Expression could not be evaluated (type mismatch, unbound variable, ...).
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Namespace resolution tie that could not be broken.
    #[error("Ambiguous namespace for '{path}': candidates {candidates:?}")]
    Ambiguity {
        path: String,
        candidates: Vec<String>,
    },

    /// Namespace registry file is invalid.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Filesystem access failed.
    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
}

impl SeaError {
    /// Creates an I/O error for the given path.
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        SeaError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    /// Returns true for the validation family of errors.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SeaError::InvalidIdentifier(_)
                | SeaError::Validation(_)
                | SeaError::DuplicateId { .. }
                | SeaError::UnresolvedReference { .. }
                | SeaError::DuplicateDeclaration { .. }
        )
    }
}

impl From<serde_json::Error> for SeaError {
    fn from(err: serde_json::Error) -> Self {
        SeaError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for SeaError {
    fn from(err: serde_yaml::Error) -> Self {
        SeaError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SeaError {
    fn from(err: toml::de::Error) -> Self {
        SeaError::Registry(err.to_string())
    }
}

impl From<globset::Error> for SeaError {
    fn from(err: globset::Error) -> Self {
        SeaError::Registry(format!("Invalid glob: {}", err))
    }
}

impl From<regex::Error> for SeaError {
    fn from(err: regex::Error) -> Self {
        SeaError::Evaluation(format!("Invalid regex: {}", err))
    }
}

impl From<walkdir::Error> for SeaError {
    fn from(err: walkdir::Error) -> Self {
        SeaError::Io {
            path: err
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_family() {
        assert!(SeaError::InvalidIdentifier("x".into()).is_validation());
        assert!(SeaError::UnresolvedReference {
            kind: "entity".into(),
            name: "Nope".into(),
            line: 3
        }
        .is_validation());
        assert!(!SeaError::Evaluation("x".into()).is_validation());
    }

    #[test]
    fn test_syntax_message_includes_text() {
        let err = SeaError::Syntax {
            line: 1,
            column: 1,
            message: "unknown statement".into(),
            text: "Invalid syntax here".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 1"));
        assert!(msg.contains("Invalid syntax here"));
    }
}

use serde::Serialize;
use thiserror::Error;

/// Result type alias using TokenTreeError
pub type Result<T> = std::result::Result<T, TokenTreeError>;

/// A single validation finding, tagged with the location it was found at
///
/// For document-load findings `path` is the stringified `TreePath` of the
/// offending node; for mutation-payload findings it is the JSON pointer
/// into the payload. A full load reports every violation found, not just
/// the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Where the violation was found (tree path or payload pointer)
    pub path: String,
    /// What is wrong at that location
    pub message: String,
}

impl Violation {
    /// Create a violation tagged with its location
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Comprehensive error taxonomy for token-tree operations
///
/// Alias unresolvability is deliberately absent from this taxonomy: it is
/// a modeled node state (`UnresolvableToken`, `modes_resolvability`), not
/// an error. Only the resolved-value surfaces, which cannot produce a
/// value for an unresolvable pair, report it as `Unresolvable`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenTreeError {
    // ===== Validation Errors =====
    /// Aggregated, path-tagged schema/naming violations.
    /// Raised by document load or mutation-payload validation; the state
    /// is never partially applied when this is returned.
    #[error("validation failed with {} violation(s): {}", violations.len(), join_violations(violations))]
    SchemaValidation { violations: Vec<Violation> },

    /// Structurally invalid query AST (e.g. a collection clause nested
    /// inside another collection clause)
    #[error("invalid query: {reason}")]
    QueryStructure { reason: String },

    /// Engine metadata violates the view invariants
    #[error("invalid engine metadata: {reason}")]
    InvalidMetadata { reason: String },

    /// A semantically invalid mutation payload (schema-valid, but the
    /// referenced state cannot legally be transformed this way)
    #[error("mutation '{name}' rejected: {reason}")]
    InvalidMutation { name: String, reason: String },

    // ===== Reference Errors =====
    /// A mutation or lookup referenced a path with no registered node
    #[error("no node registered at path: {path}")]
    ReferenceNotFound { path: String },

    /// A mutation was dispatched under an unknown name
    #[error("unknown mutation: {name}")]
    UnknownMutation { name: String },

    /// A token declared a type absent from the type registry
    #[error("unknown token type: {type_name}")]
    UnknownType { type_name: String },

    /// A node already occupies the target path
    #[error("a node is already registered at path: {path}")]
    DuplicateNode { path: String },

    /// A view with this name is not registered
    #[error("view not found: {name}")]
    ViewNotFound { name: String },

    /// A view with this name is already registered
    #[error("view already registered: {name}")]
    DuplicateView { name: String },

    // ===== Resolution Errors =====
    /// A resolved value was requested for an unresolvable (token, mode)
    /// pair
    #[error("token {path} is not resolvable for mode '{mode}'")]
    Unresolvable { path: String, mode: String },

    // ===== Internal Errors =====
    /// Programmer-error guard (e.g. writing to the tree root directly, or
    /// deep-setting through a scalar)
    #[error("internal design error: {message}")]
    InternalDesign { message: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl TokenTreeError {
    /// Get the stable error code for this error
    ///
    /// Codes are part of the external contract and never change meaning.
    pub fn code(&self) -> &'static str {
        match self {
            TokenTreeError::SchemaValidation { .. } => "ERR_SCHEMA_VALIDATION",
            TokenTreeError::QueryStructure { .. } => "ERR_QUERY_STRUCTURE",
            TokenTreeError::InvalidMetadata { .. } => "ERR_INVALID_METADATA",
            TokenTreeError::InvalidMutation { .. } => "ERR_INVALID_MUTATION",
            TokenTreeError::ReferenceNotFound { .. } => "ERR_REFERENCE_NOT_FOUND",
            TokenTreeError::UnknownMutation { .. } => "ERR_UNKNOWN_MUTATION",
            TokenTreeError::UnknownType { .. } => "ERR_UNKNOWN_TYPE",
            TokenTreeError::DuplicateNode { .. } => "ERR_DUPLICATE_NODE",
            TokenTreeError::ViewNotFound { .. } => "ERR_VIEW_NOT_FOUND",
            TokenTreeError::DuplicateView { .. } => "ERR_DUPLICATE_VIEW",
            TokenTreeError::Unresolvable { .. } => "ERR_UNRESOLVABLE",
            TokenTreeError::InternalDesign { .. } => "ERR_INTERNAL_DESIGN",
            TokenTreeError::Serialization { .. } => "ERR_SERIALIZATION",
        }
    }

    /// Shorthand for the aggregated validation error
    pub fn schema_validation(violations: Vec<Violation>) -> Self {
        TokenTreeError::SchemaValidation { violations }
    }
}

/// Conversion from serde_json::Error to TokenTreeError
impl From<serde_json::Error> for TokenTreeError {
    fn from(err: serde_json::Error) -> Self {
        TokenTreeError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let cases = [
            (
                TokenTreeError::SchemaValidation { violations: vec![] },
                "ERR_SCHEMA_VALIDATION",
            ),
            (
                TokenTreeError::ReferenceNotFound {
                    path: "a.b".to_string(),
                },
                "ERR_REFERENCE_NOT_FOUND",
            ),
            (
                TokenTreeError::UnknownMutation {
                    name: "frobnicate".to_string(),
                },
                "ERR_UNKNOWN_MUTATION",
            ),
            (
                TokenTreeError::Unresolvable {
                    path: "a".to_string(),
                    mode: "light".to_string(),
                },
                "ERR_UNRESOLVABLE",
            ),
        ];
        for (err, expected_code) in cases {
            assert_eq!(err.code(), expected_code, "wrong code for {:?}", err);
        }
    }

    #[test]
    fn test_schema_validation_display_lists_every_violation() {
        let err = TokenTreeError::schema_validation(vec![
            Violation::new("a.b", "name contains the path separator"),
            Violation::new("c", "unknown token type"),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("2 violation(s)"));
        assert!(rendered.contains("a.b: name contains the path separator"));
        assert!(rendered.contains("c: unknown token type"));
    }
}

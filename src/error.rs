//! Error types for query binding.

use thiserror::Error;

/// Result type alias using [`BinderError`].
pub type Result<T> = std::result::Result<T, BinderError>;

/// Errors raised while translating a query AST into an expression graph.
///
/// Translation is deterministic: a failed bind fails identically on retry and
/// never yields a partial expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BinderError {
    /// A required AST or context argument was missing.
    #[error("Value cannot be null: {0}")]
    ArgumentNull(&'static str),

    /// The AST node has no translation rule.
    #[error("Unsupported node kind: {0}")]
    UnsupportedNodeKind(String),

    /// No summation/averaging operator exists for the bound value type.
    #[error("Aggregation '{method}' not supported for type '{ty}'")]
    AggregationNotSupportedForType { method: String, ty: String },

    /// A custom aggregation method could not be resolved.
    #[error("Aggregation method '{method}' is not supported for expression '{expression}' of type '{ty}'")]
    AggregationNotSupported {
        method: String,
        expression: String,
        ty: String,
    },

    /// The produced lambda does not have the expected shape.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A run-time record type has no entry in the model.
    #[error("Resource type '{0}' is not in the model")]
    ResourceTypeNotInModel(String),

    /// A range variable is referenced outside of any scope binding it.
    #[error("Unknown range variable: {0}")]
    UnknownRangeVariable(String),

    /// A property is not declared on the logical type.
    #[error("Property '{property}' not found on type '{type_name}'")]
    PropertyNotFound { type_name: String, property: String },

    /// A logical type reference cannot be mapped to a host type.
    #[error("Type '{0}' is not in the model")]
    TypeNotInModel(String),

    /// The collection type does not expose a single element type.
    #[error("Unsupported collection type: {0}")]
    UnsupportedCollectionType(String),

    /// A literal cannot be converted to the enum type.
    #[error("Value '{value}' is not a member of enum '{enum_type}'")]
    InvalidEnumValue { enum_type: String, value: String },

    /// The function name has no built-in mapping.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// The function was called with the wrong arguments.
    #[error("Invalid arguments for function '{name}': {reason}")]
    InvalidFunctionArguments { name: String, reason: String },

    /// The AST is nested deeper than the configured limit.
    #[error("Query nesting depth {depth} exceeds the limit of {max}")]
    NestingTooDeep { depth: usize, max: usize },

    /// Binder settings could not be parsed.
    #[error("Invalid binder settings: {0}")]
    InvalidSettings(String),

    /// Failure while interpreting a produced expression.
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl BinderError {
    pub fn unsupported(kind: impl Into<String>) -> Self {
        BinderError::UnsupportedNodeKind(kind.into())
    }

    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        BinderError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        BinderError::Evaluation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BinderError::UnsupportedNodeKind("SearchTerm".to_string());
        assert_eq!(err.to_string(), "Unsupported node kind: SearchTerm");

        let err = BinderError::AggregationNotSupported {
            method: "StdDev".to_string(),
            expression: "$it.Price".to_string(),
            ty: "String".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("StdDev"));
        assert!(msg.contains("$it.Price"));
        assert!(msg.contains("String"));

        let err = BinderError::NestingTooDeep { depth: 300, max: 256 };
        assert!(err.to_string().contains("256"));
    }
}

//! Error types for resource names and filter expressions.

use thiserror::Error;

/// Errors returned when a fully-qualified resource name fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The string does not follow the expected collection/id layout.
    #[error("invalid {kind} name: {value}")]
    Invalid { kind: &'static str, value: String },
}

/// Errors returned while building, parsing, or evaluating filters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A token appeared where the grammar does not allow it.
    #[error("unexpected token at offset {offset}: {found}")]
    UnexpectedToken { offset: usize, found: String },
    /// The input ended in the middle of an expression.
    #[error("unexpected end of filter")]
    UnexpectedEnd,
    /// A string literal was opened but never closed.
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),
    /// The field is not one of the filterable system fields.
    #[error("unknown filter field: {0}")]
    UnknownField(String),
    /// The operator cannot be applied to the field.
    #[error("operator {op} is not supported for field {field}")]
    UnsupportedOperator { field: String, op: String },
    /// The comparison value has the wrong shape for the field.
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
    /// A regex operand failed to compile.
    #[error("invalid regex: {0}")]
    Regex(String),
}

//! Codec error kinds.

use serde_json::Value;

/// Failure raised while casting, constructing, encoding or decoding a tensor.
///
/// Every failure is reported to the immediate caller; nothing is coerced or
/// replaced by a default.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorError {
    /// Unrecognized dtype string, or a dtype the payload kind cannot hold
    #[error("invalid dtype: {0}")]
    InvalidDType(String),

    /// Shape sequence contains a non-integral element
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Input is of a fundamentally unsupported kind
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    /// Declared shape does not match the payload extents
    #[error("shape mismatch: declared {declared}, actual {actual}")]
    ShapeMismatch { declared: String, actual: String },

    /// Buffer content cannot be decoded per its declared encoding
    #[error("decode failure: {0}")]
    DecodeFailure(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Short name of a JSON value's kind, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

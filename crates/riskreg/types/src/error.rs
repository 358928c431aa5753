//! Validation errors for domain values.

use thiserror::Error;

/// Errors raised while constructing or parsing domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A probability or impact outside `1..=5`.
    #[error("score out of range: {0} (expected 1..=5)")]
    ScoreOutOfRange(i64),

    /// A value that could not be parsed for the given field.
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// A field key that no editable field answers to.
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Result type for domain validation.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            ModelError::ScoreOutOfRange(7).to_string(),
            "score out of range: 7 (expected 1..=5)"
        );
        let err = ModelError::InvalidValue {
            field: "controlType".into(),
            value: "sideways".into(),
        };
        assert_eq!(err.to_string(), "invalid value for controlType: sideways");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelError>();
    }
}

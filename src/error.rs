use thiserror::Error;

/// Error types for the paraxial-rs library.
#[derive(Error, Debug)]
pub enum ParaxialError {
    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    ParameterError(#[from] crate::parameters::ParameterError),

    /// Error during expression parsing or evaluation.
    #[error("Expression error: {0}")]
    ExpressionError(#[from] crate::parameters::ExpressionError),

    /// Error in the formula registry.
    #[error("Formula error: {0}")]
    FormulaError(#[from] crate::parameters::FormulaError),

    /// Unknown element type tag.
    #[error("Unknown element type: {0}")]
    UnknownElementType(String),

    /// Unknown unit label.
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// Invalid state in the engine or a data structure.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic error for cases that don't fit the other categories.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for paraxial-rs operations.
pub type Result<T> = std::result::Result<T, ParaxialError>;

impl From<String> for ParaxialError {
    fn from(s: String) -> Self {
        ParaxialError::Other(s)
    }
}

impl From<&str> for ParaxialError {
    fn from(s: &str) -> Self {
        ParaxialError::Other(s.to_string())
    }
}

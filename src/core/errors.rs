// src/core/errors.rs
use thiserror::Error;

/// Errors raised by the explainers and the background generator.
///
/// Search non-convergence is not an error: it is reported through
/// `CounterfactualResult::is_valid`.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// Missing domains or background data, invalid link type, bad sizes.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Raised by a prediction provider and propagated as-is.
    #[error("Prediction provider error: {0}")]
    Provider(String),

    /// Goal and criteria both absent, or a goal that cannot be matched to the outputs.
    #[error("{0}")]
    InvalidGoal(String),

    #[error("Incompatible dimensions: {0}")]
    IncompatibleDimensions(String),

    /// A value that violates its domain or cannot be used numerically.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Ndarray error: {0}")]
    Ndarray(#[from] ndarray::ShapeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExplainError {
    /// Shorthand for providers reporting a failure.
    pub fn provider(msg: impl Into<String>) -> Self {
        ExplainError::Provider(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        ExplainError::Configuration(msg.into())
    }
}

// Convenience type alias for Result
pub type Result<T> = std::result::Result<T, ExplainError>;

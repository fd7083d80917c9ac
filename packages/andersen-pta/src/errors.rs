//! Error types for andersen-pta
//!
//! Only the module-building surface is recoverable. Contract violations
//! inside the analysis itself (wrong-kind accessors, out-of-range children)
//! panic instead of returning an error.

use thiserror::Error;

/// Main error type for andersen-pta operations
#[derive(Debug, Error)]
pub enum AndersenError {
    /// Malformed IR module (dangling operand, type mismatch)
    #[error("model error: {0}")]
    Model(String),

    /// Analysis-level error
    #[error("analysis error: {0}")]
    Analysis(String),
}

impl AndersenError {
    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        AndersenError::Model(msg.into())
    }

    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        AndersenError::Analysis(msg.into())
    }
}

/// Result type alias for andersen-pta operations
pub type Result<T> = std::result::Result<T, AndersenError>;

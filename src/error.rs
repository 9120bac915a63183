use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for bumper operations
#[derive(Error, Debug)]
pub enum BumpError {
    /// A precondition failed before anything was mutated
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A manifest, changelog or README exists but could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    /// The document exists but has no section for the requested heading
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    /// A git operation or hosted API call failed
    #[error("{operation} failed: {message}")]
    ExternalCall { operation: String, message: String },

    /// The operator declined; not a failure
    #[error("Bump cancelled: {0}")]
    Cancelled(String),

    /// Failure after the confirmation gate; nothing is compensated automatically
    #[error("Release partially completed (last completed step: {stage}): {source}")]
    PartiallyCompleted {
        stage: String,
        source: Box<BumpError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in bumper
pub type Result<T> = std::result::Result<T, BumpError>;

impl BumpError {
    /// Create a validation error with context
    pub fn validation(msg: impl Into<String>) -> Self {
        BumpError::Validation(msg.into())
    }

    /// Create a parse error with context
    pub fn parse(msg: impl Into<String>) -> Self {
        BumpError::Parse(msg.into())
    }

    /// Create an external call error naming the attempted operation
    pub fn external(operation: impl Into<String>, msg: impl std::fmt::Display) -> Self {
        BumpError::ExternalCall {
            operation: operation.into(),
            message: msg.to_string(),
        }
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        BumpError::Config(msg.into())
    }

    /// Whether this outcome should be reported as a failure.
    ///
    /// A cancellation is an operator decision, so callers report it
    /// separately and exit successfully.
    pub fn is_failure(&self) -> bool {
        !matches!(self, BumpError::Cancelled(_))
    }
}

/// Maps lower-level errors into [`BumpError::ExternalCall`] tagged with the operation name.
pub trait OperationContext<T> {
    fn operation(self, operation: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> OperationContext<T> for std::result::Result<T, E> {
    fn operation(self, operation: &str) -> Result<T> {
        self.map_err(|e| BumpError::external(operation, e))
    }
}

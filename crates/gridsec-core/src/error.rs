//! Unified error type for the gridsec crates.
//!
//! Configuration mistakes (bad filter sets, non-positive limit reductions,
//! inverted voltage limits) surface as [`GridSecError::Config`] at construction
//! time. Solver divergence is never an error: it is reported through result
//! statuses instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridSecError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed case, contingency list or report input
    #[error("cannot parse input: {0}")]
    Parse(String),

    #[error("invalid data: {0}")]
    Validation(String),

    /// Rejected at construction, before any computation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Linear algebra failure; divergence is a status, not this
    #[error("linear solver failure: {0}")]
    Solver(String),

    /// Unknown ids or dangling references
    #[error("network inconsistency: {0}")]
    Network(String),

    #[error("variant manager: {0}")]
    Variant(String),

    #[error("contingency '{id}' failed: {message}")]
    Contingency { id: String, message: String },

    /// Call made out of order, e.g. results read before the run ended
    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("security analysis cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type GridSecResult<T> = Result<T, GridSecError>;

impl GridSecError {
    pub fn contingency(id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        GridSecError::Contingency {
            id: id.into(),
            message: message.to_string(),
        }
    }
}

impl From<anyhow::Error> for GridSecError {
    fn from(err: anyhow::Error) -> Self {
        GridSecError::Other(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for GridSecError {
    fn from(err: serde_json::Error) -> Self {
        GridSecError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridSecError::Config("limit reduction must be > 0".into());
        assert!(err.to_string().starts_with("invalid configuration"));
        assert!(err.to_string().contains("limit reduction"));
    }

    #[test]
    fn test_contingency_error_names_the_contingency() {
        let err = GridSecError::contingency("N-1_L1", "unknown element 'L9'");
        assert_eq!(err.to_string(), "contingency 'N-1_L1' failed: unknown element 'L9'");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GridSecError = io_err.into();
        assert!(matches!(err, GridSecError::Io(_)));
    }

    #[test]
    fn test_anyhow_conversion_keeps_context_chain() {
        let inner = anyhow::anyhow!("root cause").context("loading case");
        let err: GridSecError = inner.into();
        assert_eq!(err.to_string(), "loading case: root cause");
    }
}

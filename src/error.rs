//! Error types for the fireline routing engine
//!
//! Only genuine failures live here. An unreachable target is a normal, empty
//! [`RouteResult`](crate::route::RouteResult), and a repair that escalated to a
//! full rebuild is reported through [`UpdateOutcome`](crate::ch::repair::UpdateOutcome).

use thiserror::Error;

/// Main error type for fireline operations
#[derive(Debug, Error)]
pub enum Error {
    /// A node identifier that the graph does not know
    #[error("invalid reference: unknown node '{0}'")]
    InvalidReference(String),

    /// A closure command naming an edge that does not exist
    #[error("invalid reference: no edge {from} -> {to}")]
    UnknownEdge { from: String, to: String },

    #[error("node '{0}' already exists")]
    DuplicateNode(String),

    #[error("edge {from} -> {to} already exists")]
    DuplicateEdge { from: String, to: String },

    /// Weights must be finite and non-negative
    #[error("invalid weight {weight} on edge {from} -> {to}")]
    InvalidWeight { from: String, to: String, weight: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Preprocessing was cancelled between two contraction steps
    #[error("preprocessing cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for the errors that point at an id the caller supplied
    pub fn is_invalid_reference(&self) -> bool {
        matches!(self, Error::InvalidReference(_) | Error::UnknownEdge { .. })
    }
}

/// Convenience result type for fireline operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_reference_classification() {
        assert!(Error::InvalidReference("Z".into()).is_invalid_reference());
        assert!(Error::UnknownEdge { from: "A".into(), to: "Z".into() }.is_invalid_reference());
        assert!(!Error::Cancelled.is_invalid_reference());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::UnknownEdge { from: "C".into(), to: "D".into() };
        assert_eq!(err.to_string(), "invalid reference: no edge C -> D");

        let err = Error::InvalidWeight { from: "A".into(), to: "B".into(), weight: -1.0 };
        assert_eq!(err.to_string(), "invalid weight -1 on edge A -> B");
    }
}

//! Error types for the RL core library

use thiserror::Error;

/// Core error type for RL operations
#[derive(Error, Debug)]
pub enum RLError {
    /// Environment-related errors
    #[error("Environment error: {0}")]
    Environment(String),

    /// Invalid action
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The environment was closed and can no longer be used
    #[error("Environment is closed")]
    Closed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend errors (oracle transport, image decoding, ...).
    ///
    /// The source is kept intact so callers can `downcast_ref` to the backend's own error type.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("backend exploded")]
    struct Backend;

    #[test]
    fn test_other_keeps_source_for_downcast() {
        let err = RLError::from(anyhow::Error::new(Backend));
        assert_eq!(err.to_string(), "backend exploded");

        let RLError::Other(inner) = err else {
            panic!("expected RLError::Other");
        };
        assert!(inner.downcast_ref::<Backend>().is_some());
    }
}

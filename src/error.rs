//! Error types shared by configuration loading and training entry points.
//!
//! Kernels themselves never return errors: scratch buffers are reallocated
//! when their size changes and malformed external buffers fail fast with an
//! index panic. Errors are reserved for inputs that come from outside the
//! crate (files, JSON, minibatches handed to the trainer).

use thiserror::Error;

/// Errors reported by the public entry points of this crate.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A buffer supplied by a caller has a different length than the
    /// layer and minibatch sizes require.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

pub type Result<T> = std::result::Result<T, NetworkError>;

/// Checks that a caller supplied buffer has the expected length.
pub(crate) fn ensure_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(NetworkError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_len_accepts_equal_lengths() {
        assert!(ensure_len(6, 6).is_ok());
    }

    #[test]
    fn test_ensure_len_reports_mismatch() {
        let err = ensure_len(6, 4).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::DimensionMismatch {
                expected: 6,
                actual: 4
            }
        ));
        assert_eq!(err.to_string(), "dimension mismatch: expected 6, got 4");
    }
}

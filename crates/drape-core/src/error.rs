//! Error type shared by all drape crates.

use thiserror::Error;

/// Root error type for drape.
///
/// Structural problems (bad indices, mismatched widths) are fatal and
/// abort a forward pass. [`DrapeError::NumericInstability`] is raised only
/// when the caller asked for non-finite values to be treated as failures.
///
/// # Example
///
/// ```
/// use drape_core::DrapeError;
///
/// let err = DrapeError::ShapeMismatch {
///     message: "cell 4 references node 9 but the mesh has 5 nodes".to_string(),
/// };
/// assert!(err.to_string().starts_with("shape mismatch"));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrapeError {
    /// A structural invariant was violated: out-of-range index,
    /// mismatched feature width or row count between stages.
    #[error("shape mismatch: {message}")]
    ShapeMismatch { message: String },

    /// The model was configured with values it cannot run with.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// NaN or Inf appeared in the output of a pipeline stage.
    #[error("numeric instability after {stage}: {message}")]
    NumericInstability { stage: String, message: String },

    /// A node type id outside the known enumeration.
    #[error("invalid node type id {id}")]
    InvalidNodeType { id: u32 },

    /// A parameter checkpoint could not be written or read back.
    #[error("checkpoint error: {message}")]
    Checkpoint { message: String },

    /// A tensor backend (candle) operation failed.
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl DrapeError {
    /// Shorthand for building a [`DrapeError::ShapeMismatch`].
    pub fn shape(message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            message: message.into(),
        }
    }

    /// Shorthand for building a [`DrapeError::InvalidConfiguration`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Returns `true` for the advisory NaN/Inf condition.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::NumericInstability { .. })
    }
}

/// Convenience alias used throughout drape.
pub type DrapeResult<T> = Result<T, DrapeError>;

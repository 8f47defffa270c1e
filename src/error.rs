//! Error types for Voronoi fracturing

use thiserror::Error;

use crate::shatter::Stage;

/// Errors that can occur while fracturing a mesh
///
/// Only `GenerationFailed` and `Cancelled` abort a whole generation call.
/// A `ClipFailure` in a single cell drops that cell and is reported through
/// [`Shatter::dropped`](crate::Shatter::dropped).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShatterError {
    /// Configuration or host-supplied data failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Seeds cannot span a 3D Voronoi diagram (too few, coplanar, ...)
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Clipping the source mesh against one cell produced a broken mesh
    #[error("clip failure in cell {cell}: {reason}")]
    ClipFailure {
        /// Seed index of the failing cell
        cell: usize,
        /// Human-readable cause
        reason: String,
    },

    /// No fragment could be produced at all
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Generation was cancelled through a [`CancelToken`](crate::CancelToken)
    #[error("generation cancelled during {stage}")]
    Cancelled {
        /// Pipeline stage that observed the cancellation
        stage: Stage,
    },
}

/// Result type alias for fracturing operations
pub type Result<T> = std::result::Result<T, ShatterError>;

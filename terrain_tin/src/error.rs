//! Error types shared by every mesh operation.

use thiserror::Error;

/// Result type alias using [`TinError`].
pub type Result<T> = std::result::Result<T, TinError>;

/// Errors raised by the terrain model.
#[derive(Error, Debug)]
pub enum TinError {
    /// Bad or degenerate arguments, or the mesh is in the wrong state.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The mesh carries a zero point tolerance and predates tolerance tracking.
    #[error("legacy mesh with zero point tolerance; convert it before editing")]
    LegacyFormat,

    /// Two geometries that must overlap do not.
    #[error("geometries do not overlap")]
    DisjointGeometry,

    /// An internal invariant failed. Not recoverable by the caller.
    #[error("topology corruption: {0}")]
    TopologyCorruption(String),

    /// An arena partition could not be allocated.
    #[error("memory exhausted: {0}")]
    MemoryExhaustion(String),

    /// A tolerant loop gave up after too many individual failures.
    #[error("{failures} failures exceeded the limit of {limit}")]
    PartialFailureThreshold {
        /// Failures counted when the operation aborted.
        failures: usize,
        /// Configured limit.
        limit: usize,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file could be read but not understood.
    #[error("parse error: {0}")]
    Parse(String),
}

impl TinError {
    /// True for errors that indicate a defect rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TinError::TopologyCorruption(_))
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        TinError::TopologyCorruption(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TinError::Validation(message.into())
    }
}

impl From<serde_json::Error> for TinError {
    fn from(e: serde_json::Error) -> Self {
        TinError::Parse(e.to_string())
    }
}

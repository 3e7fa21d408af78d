//! Error types for GPU resource creation.

use ember_rhi::RhiError;
use thiserror::Error;

/// Error type for resource operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A model needs at least one full triangle.
    #[error("Model needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    /// Buffer creation or upload failed.
    #[error(transparent)]
    Gpu(#[from] RhiError),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

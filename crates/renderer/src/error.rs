//! Renderer error types.

use ember_rhi::RhiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// GPU-side failure, including incompatible rebuilds and device loss.
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Window or surface failure from the platform layer.
    #[error("Platform error: {0}")]
    Platform(#[from] ember_core::Error),

    /// A fatal error was already reported; no further frames are produced.
    #[error("Renderer halted after a fatal error")]
    Halted,
}

pub type RenderResult<T> = Result<T, RenderError>;

//! Render error types.

use spinview_gpu::GpuError;
use thiserror::Error;

/// Rendering errors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Error from the Vulkan layer.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// Mesh rejected before upload.
    #[error(transparent)]
    Mesh(#[from] spinview_core::Error),

    /// A slot or image index outside the allocated range.
    #[error("Index {index} out of range for {len} {what}")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;

//! GPU error types.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be opened.
    #[error("Failed to load Vulkan: {0}")]
    EntryLoad(String),

    /// The Vulkan loader reported no physical devices at all.
    #[error("Failed to find GPUs with Vulkan support")]
    NoDevices,

    /// No physical device met the requirements.
    #[error("Failed to find a suitable GPU")]
    NoSuitableDevice,

    /// Validation was requested but the layer is not installed.
    #[error("Validation layers requested, but not supported: {0}")]
    ValidationLayerMissing(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// A shader binary could not be read or is malformed.
    #[error("Failed to load shader {}: {reason}", .path.display())]
    ShaderLoad { path: PathBuf, reason: String },

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// No memory type satisfies a buffer's requirements.
    #[error("No memory type in mask {type_bits:#b} has properties {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

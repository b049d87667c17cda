//! Vulkan layer for spinview.
//!
//! This crate provides:
//! - Instance creation with optional validation and a tracing-backed debug messenger
//! - Presentation surface queries and physical device selection
//! - Swapchain selection rules and construction
//! - Render pass, framebuffer and graphics pipeline creation
//! - Buffer memory via gpu-allocator
//! - Command pools, one-shot submission, descriptors and frame synchronization
//!
//! Selection logic (formats, present modes, extents, queue families, memory
//! types) is written as plain functions over `ash::vk` values so it can be
//! exercised without a device.

pub mod command;
pub mod context;
pub mod debug;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder};
pub use device::QueueFamilyIndices;
pub use error::{GpuError, Result};
pub use memory::{find_memory_type, GpuAllocator, GpuBuffer, MemoryClass};
pub use pipeline::{
    ColorBlend, GraphicsPipeline, GraphicsPipelineConfig, InputAssembly, Multisample,
    Rasterization,
};
pub use shader::{bytes_to_spirv, load_shader};
pub use surface::{SurfaceContext, SurfaceSupport};
pub use swapchain::{Acquire, PresentStatus, Swapchain};
pub use sync::FrameSync;

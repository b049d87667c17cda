//! Rendering for spinview.
//!
//! - [`FrameScheduler`] drives the acquire, record, submit, present and advance
//!   cycle over a fixed ring of frame slots. It talks to the GPU only through
//!   the [`FrameBackend`] trait, so it runs unchanged against a mock.
//! - [`TriangleRenderer`] is the Vulkan backend: it owns the swapchain and
//!   everything built on it, the per-slot buffers and synchronization, and
//!   rebuilds presentation resources on demand.

pub mod error;
pub mod frame;
pub mod renderer;
pub mod upload;

pub use error::{RenderError, Result};
pub use frame::{
    AcquireOutcome, FrameBackend, FrameOutcome, FrameScheduler, FrameStats, PresentOutcome,
    SlotState,
};
pub use renderer::{RendererConfig, TriangleRenderer};

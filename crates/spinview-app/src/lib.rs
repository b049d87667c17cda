//! Application runner for spinview.
//!
//! Opens a window, builds the [`TriangleRenderer`](spinview_render::TriangleRenderer)
//! and drives its [`FrameScheduler`](spinview_render::FrameScheduler) from the
//! winit event loop:
//! - every redraw runs one frame iteration
//! - resizes request a swapchain rebuild after the next present
//! - a minimized window pauses rendering until it has area again
//! - frame failures follow the configured [`FailurePolicy`]
//!
//! # Example
//!
//! ```no_run
//! use spinview_app::{run, AppConfig};
//! use spinview_core::Mesh;
//!
//! fn main() -> anyhow::Result<()> {
//!     run(AppConfig::default().with_size(1024, 768), Mesh::triangle())
//! }
//! ```

mod runner;

pub use runner::{run, AppConfig, FailurePolicy};

pub use spinview_core::Mesh;
pub use spinview_render::FrameStats;

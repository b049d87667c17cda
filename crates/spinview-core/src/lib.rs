//! Core types for spinview.
//!
//! This crate holds everything that does not touch the graphics backend:
//! - Vertex and mesh data
//! - The per-frame spin transform and its uniform layout
//! - Common error types and constants

pub mod error;
pub mod geometry;
pub mod transform;

pub use error::{Error, Result};
pub use geometry::{Mesh, Vertex};
pub use transform::{Extent, SpinTransform, TransformUniform};

/// Renderer-wide constants
pub mod constants {
    /// Number of frame slots cycled by the scheduler
    pub const FRAMES_IN_FLIGHT: usize = 3;
    /// Rotation added to the spin angle on every rendered frame, in degrees
    pub const ROTATION_STEP_DEGREES: f32 = 1.0;
    /// Color the render pass clears to (RGBA)
    pub const CLEAR_COLOR: [f32; 4] = [0.2, 0.2, 0.2, 1.0];
}

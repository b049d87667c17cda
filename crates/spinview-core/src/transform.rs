//! Per-frame spin transform.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::constants::ROTATION_STEP_DEGREES;

/// Width and height of a render target, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (a minimized window).
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height. An empty extent reports 1.0.
    pub fn aspect_ratio(self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Uniform block read by the vertex stage: a single column-major 4x4 matrix.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TransformUniform {
    pub mvp: [[f32; 4]; 4],
}

impl TransformUniform {
    /// Size of the uniform block in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn from_matrix(matrix: Mat4) -> Self {
        Self {
            mvp: matrix.to_cols_array_2d(),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.mvp)
    }
}

/// Rotation accumulator owned by whoever drives the frame loop.
///
/// Every call to [`SpinTransform::advance`] adds one step to the angle and
/// rebuilds the matrix from scratch. The stored angle is kept in `[0, 360)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinTransform {
    angle_degrees: f32,
    step_degrees: f32,
}

impl Default for SpinTransform {
    fn default() -> Self {
        Self::new(ROTATION_STEP_DEGREES)
    }
}

impl SpinTransform {
    pub const fn new(step_degrees: f32) -> Self {
        Self {
            angle_degrees: 0.0,
            step_degrees,
        }
    }

    /// Current accumulated angle in degrees.
    pub const fn angle_degrees(&self) -> f32 {
        self.angle_degrees
    }

    /// Step the angle and return the uniform for a target of `extent`.
    pub fn advance(&mut self, extent: Extent) -> TransformUniform {
        self.angle_degrees = (self.angle_degrees + self.step_degrees).rem_euclid(360.0);
        TransformUniform::from_matrix(Self::matrix(self.angle_degrees, extent))
    }

    /// Identity, scaled on Y by the aspect ratio, then rotated about Z.
    pub fn matrix(angle_degrees: f32, extent: Extent) -> Mat4 {
        Mat4::from_scale(Vec3::new(1.0, extent.aspect_ratio(), 1.0))
            * Mat4::from_rotation_z(angle_degrees.to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn angle_counts_frames() {
        let mut spin = SpinTransform::default();
        let extent = Extent::new(800, 600);
        for _ in 0..10 {
            spin.advance(extent);
        }
        assert_relative_eq!(spin.angle_degrees(), 10.0);
    }

    #[test]
    fn angle_wraps_at_full_turn() {
        let mut spin = SpinTransform::default();
        let extent = Extent::new(800, 600);
        for _ in 0..725 {
            spin.advance(extent);
        }
        assert_relative_eq!(spin.angle_degrees(), 5.0);
    }

    #[test]
    fn first_frame_is_already_rotated() {
        let mut spin = SpinTransform::default();
        let uniform = spin.advance(Extent::new(100, 100));
        let expected = Mat4::from_rotation_z(1.0_f32.to_radians());
        assert!(uniform.matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn y_axis_scaled_by_aspect_ratio() {
        // A quarter turn maps +X onto +Y, where the aspect scale applies.
        let m = SpinTransform::matrix(90.0, Extent::new(800, 600));
        let p = m.transform_point3(Vec3::X);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 800.0 / 600.0, epsilon = 1e-6);

        let m = SpinTransform::matrix(0.0, Extent::new(1024, 768));
        let p = m.transform_point3(Vec3::Y);
        assert_relative_eq!(p.y, 1024.0 / 768.0, epsilon = 1e-6);
    }

    #[test]
    fn empty_extent_does_not_scale() {
        assert_relative_eq!(Extent::new(0, 600).aspect_ratio(), 1.0);
        assert!(Extent::new(800, 0).is_empty());
        assert!(!Extent::new(1, 1).is_empty());
    }

    #[test]
    fn uniform_is_one_matrix() {
        assert_eq!(TransformUniform::SIZE, 64);
    }
}

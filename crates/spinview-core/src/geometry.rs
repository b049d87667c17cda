//! Vertex and mesh data.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::{Error, Result};

/// A single vertex: position followed by an RGB color.
///
/// The layout is `#[repr(C)]` and tightly packed so the pipeline can read both
/// attributes from one interleaved binding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Position in normalized device space before the spin transform
    pub position: Vec3,
    /// Linear RGB color
    pub color: Vec3,
}

impl Vertex {
    /// Byte stride between consecutive vertices.
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;
    /// Byte offset of [`Vertex::position`].
    pub const POSITION_OFFSET: u32 = std::mem::offset_of!(Self, position) as u32;
    /// Byte offset of [`Vertex::color`].
    pub const COLOR_OFFSET: u32 = std::mem::offset_of!(Self, color) as u32;

    /// Create a vertex from raw components.
    pub const fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position: Vec3::from_array(position),
            color: Vec3::from_array(color),
        }
    }
}

/// An indexed triangle list.
///
/// Built once and handed to the renderer, which uploads it and never reads it
/// again.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh, checking that the indices describe whole triangles over
    /// the given vertices.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(Error::InvalidMesh("mesh has no geometry".to_string()));
        }
        if indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(Error::InvalidMesh(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }

        Ok(Self { vertices, indices })
    }

    /// The single red/green/blue triangle the viewer draws.
    pub fn triangle() -> Self {
        Self {
            vertices: vec![
                Vertex::new([0.0, 0.0, 0.1], [1.0, 0.0, 0.0]),
                Vertex::new([0.75, -0.489, 0.1], [0.0, 1.0, 0.0]),
                Vertex::new([0.2, -0.489, 0.1], [0.0, 0.0, 1.0]),
            ],
            indices: vec![0, 1, 2],
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of indices, as passed to an indexed draw.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Vertex data as raw bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_packed() {
        assert_eq!(Vertex::STRIDE, 24);
        assert_eq!(Vertex::POSITION_OFFSET, 0);
        assert_eq!(Vertex::COLOR_OFFSET, 12);
    }

    #[test]
    fn triangle_mesh() {
        let mesh = Mesh::triangle();
        assert_eq!(mesh.vertices().len(), 3);
        assert_eq!(mesh.indices(), &[0, 1, 2]);
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.vertex_bytes().len(), 3 * 24);
        assert_eq!(mesh.index_bytes().len(), 3 * 4);
        assert_eq!(mesh.vertices()[1].color, Vec3::Y);
    }

    #[test]
    fn rejects_partial_triangles() {
        let vertices = Mesh::triangle().vertices().to_vec();
        let err = Mesh::new(vertices, vec![0, 1]).unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let vertices = Mesh::triangle().vertices().to_vec();
        assert!(Mesh::new(vertices, vec![0, 1, 3]).is_err());
    }

    #[test]
    fn rejects_empty_mesh() {
        assert!(Mesh::new(Vec::new(), Vec::new()).is_err());
    }

    #[test]
    fn accepts_shared_indices() {
        let vertices = Mesh::triangle().vertices().to_vec();
        let mesh = Mesh::new(vertices, vec![0, 1, 2, 2, 1, 0]).unwrap();
        assert_eq!(mesh.index_count(), 6);
    }
}

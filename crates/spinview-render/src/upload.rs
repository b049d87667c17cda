//! Per-slot GPU buffers.
//!
//! Vertex and index data go through a host-coherent staging buffer into
//! device-local memory, once per slot, at startup. Uniform buffers stay
//! host-coherent and are rewritten every frame.
//!
//! Geometry is immutable once uploaded. The per-slot copies leave room for
//! per-frame vertex updates, which are not implemented.

use ash::vk;
use spinview_core::{Mesh, TransformUniform};
use spinview_gpu::command::execute_single_time_commands;
use spinview_gpu::{
    write_uniform_buffer, CommandPool, DescriptorPool, GpuBuffer, GpuContext, MemoryClass,
};

use crate::error::{RenderError, Result};

/// Copy `bytes` into a new device-local buffer through a staging buffer.
///
/// The staging buffer is freed before returning, whether or not the copy
/// succeeded.
pub fn upload_device_local(
    gpu: &GpuContext,
    pool: &CommandPool,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
    name: &str,
) -> Result<GpuBuffer> {
    let size = bytes.len() as u64;
    let mut allocator = gpu.allocator().lock();

    let mut staging = allocator.create_buffer(
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryClass::HostCoherent,
        &format!("{name} staging"),
    )?;

    let copied = staging.write_bytes(bytes).and_then(|()| {
        let mut target = allocator.create_buffer(
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryClass::DeviceLocal,
            name,
        )?;

        let region = vk::BufferCopy::default().size(size);
        let result = unsafe {
            execute_single_time_commands(gpu.device(), pool, gpu.graphics_queue(), |cmd| {
                gpu.device()
                    .cmd_copy_buffer(cmd, staging.buffer, target.buffer, &[region]);
            })
        };

        match result {
            Ok(()) => Ok(target),
            Err(e) => {
                allocator.free_buffer(&mut target)?;
                Err(e)
            }
        }
    });

    allocator.free_buffer(&mut staging)?;
    Ok(copied?)
}

/// Everything indexed by frame slot: geometry copies, uniform buffers and the
/// descriptor sets pointing at them.
pub struct SlotResources {
    pub vertex_buffers: Vec<GpuBuffer>,
    pub index_buffers: Vec<GpuBuffer>,
    pub uniform_buffers: Vec<GpuBuffer>,
    pub descriptor_pool: DescriptorPool,
    pub descriptor_sets: Vec<vk::DescriptorSet>,
    pub index_count: u32,
}

impl SlotResources {
    /// Upload `mesh` once per slot and create one uniform buffer and
    /// descriptor set per slot.
    pub fn new(
        gpu: &GpuContext,
        pool: &CommandPool,
        mesh: &Mesh,
        set_layout: vk::DescriptorSetLayout,
        slots: usize,
    ) -> Result<Self> {
        let descriptor_pool =
            unsafe { DescriptorPool::for_uniform_buffers(gpu.device(), slots as u32)? };

        let mut resources = Self {
            vertex_buffers: Vec::with_capacity(slots),
            index_buffers: Vec::with_capacity(slots),
            uniform_buffers: Vec::with_capacity(slots),
            descriptor_pool,
            descriptor_sets: Vec::new(),
            index_count: mesh.index_count(),
        };

        if let Err(e) = resources.populate(gpu, pool, mesh, set_layout, slots) {
            resources.destroy(gpu);
            return Err(e);
        }

        tracing::debug!(
            "Uploaded {} vertices and {} indices to {slots} slots",
            mesh.vertices().len(),
            mesh.index_count()
        );

        Ok(resources)
    }

    fn populate(
        &mut self,
        gpu: &GpuContext,
        pool: &CommandPool,
        mesh: &Mesh,
        set_layout: vk::DescriptorSetLayout,
        slots: usize,
    ) -> Result<()> {
        for slot in 0..slots {
            self.vertex_buffers.push(upload_device_local(
                gpu,
                pool,
                mesh.vertex_bytes(),
                vk::BufferUsageFlags::VERTEX_BUFFER,
                &format!("vertices[{slot}]"),
            )?);
            self.index_buffers.push(upload_device_local(
                gpu,
                pool,
                mesh.index_bytes(),
                vk::BufferUsageFlags::INDEX_BUFFER,
                &format!("indices[{slot}]"),
            )?);
            self.uniform_buffers.push(gpu.allocator().lock().create_buffer(
                TransformUniform::SIZE,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryClass::HostCoherent,
                &format!("transform[{slot}]"),
            )?);
        }

        let layouts = vec![set_layout; slots];
        self.descriptor_sets = unsafe { self.descriptor_pool.allocate(gpu.device(), &layouts)? };

        for (&set, uniform) in self.descriptor_sets.iter().zip(&self.uniform_buffers) {
            unsafe {
                write_uniform_buffer(gpu.device(), set, 0, uniform.buffer, TransformUniform::SIZE);
            }
        }

        Ok(())
    }

    /// Overwrite slot `slot`'s uniform buffer.
    pub fn write_uniform(&self, slot: usize, uniform: &TransformUniform) -> Result<()> {
        let buffer = self.uniform_buffers.get(slot).ok_or(RenderError::OutOfRange {
            what: "uniform buffers",
            index: slot,
            len: self.uniform_buffers.len(),
        })?;
        buffer.write(std::slice::from_ref(uniform))?;
        Ok(())
    }

    /// Release the descriptor pool, then every buffer.
    ///
    /// The device must be idle.
    pub fn destroy(&mut self, gpu: &GpuContext) {
        unsafe { self.descriptor_pool.destroy(gpu.device()) };
        self.descriptor_sets.clear();

        let mut allocator = gpu.allocator().lock();
        for buffer in self
            .uniform_buffers
            .iter_mut()
            .chain(&mut self.vertex_buffers)
            .chain(&mut self.index_buffers)
        {
            if let Err(e) = allocator.free_buffer(buffer) {
                tracing::warn!("Failed to free buffer: {e}");
            }
        }
        self.uniform_buffers.clear();
        self.vertex_buffers.clear();
        self.index_buffers.clear();
    }
}

//! Vulkan backend for the frame scheduler.

use std::path::PathBuf;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use spinview_core::constants::{CLEAR_COLOR, FRAMES_IN_FLIGHT};
use spinview_core::{Extent, Mesh, TransformUniform, Vertex};
use spinview_gpu::command::{record, submit, SubmitSync};
use spinview_gpu::render_pass::{create_framebuffers, create_render_pass, destroy_framebuffers};
use spinview_gpu::{
    load_shader, Acquire, CommandPool, DescriptorSetLayoutBuilder, FrameSync, GpuContext,
    GpuContextBuilder, GpuError, GraphicsPipeline, GraphicsPipelineConfig, Swapchain,
};

use crate::error::{RenderError, Result};
use crate::frame::{AcquireOutcome, FrameBackend, PresentOutcome};
use crate::upload::SlotResources;

/// Renderer settings.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Name reported to the driver.
    pub app_name: String,
    /// Enable the Khronos validation layer and debug messenger.
    pub validation: bool,
    /// Force FIFO presentation.
    pub vsync: bool,
    /// Compiled vertex stage.
    pub vertex_shader: PathBuf,
    /// Compiled fragment stage.
    pub fragment_shader: PathBuf,
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "spinview".to_string(),
            validation: cfg!(debug_assertions),
            vsync: false,
            vertex_shader: PathBuf::from("shaders/shader.vert.spv"),
            fragment_shader: PathBuf::from("shaders/shader.frag.spv"),
            clear_color: CLEAR_COLOR,
        }
    }
}

/// Vertex buffer binding for [`Vertex`].
pub fn vertex_bindings() -> Vec<vk::VertexInputBindingDescription> {
    vec![vk::VertexInputBindingDescription {
        binding: 0,
        stride: Vertex::STRIDE,
        input_rate: vk::VertexInputRate::VERTEX,
    }]
}

/// Position at location 0, color at location 1.
pub fn vertex_attributes() -> Vec<vk::VertexInputAttributeDescription> {
    vec![
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: Vertex::POSITION_OFFSET,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: Vertex::COLOR_OFFSET,
        },
    ]
}

/// The swapchain and everything whose lifetime follows it.
struct PresentationTargets {
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    pipeline: GraphicsPipeline,
    framebuffers: Vec<vk::Framebuffer>,
    /// Indexed `[slot][swapchain image]`.
    command_buffers: Vec<Vec<vk::CommandBuffer>>,
}

impl PresentationTargets {
    /// Release in dependency order: command buffers, framebuffers, pipeline,
    /// pipeline layout, render pass, image views, swapchain.
    ///
    /// # Safety
    /// The device must be idle.
    unsafe fn destroy(&mut self, gpu: &GpuContext, pool: Option<&CommandPool>) {
        let device = gpu.device();
        unsafe {
            if let Some(pool) = pool {
                for buffers in &self.command_buffers {
                    pool.free(device, buffers);
                }
            }
            self.command_buffers.clear();

            destroy_framebuffers(device, &self.framebuffers);
            self.framebuffers.clear();

            self.pipeline.destroy(device);
            device.destroy_render_pass(self.render_pass, None);
            self.swapchain.destroy(device, gpu.swapchain_loader());
        }
    }
}

/// Renders one indexed mesh with a per-frame spin transform.
///
/// Owns every GPU object. Dropping it waits for the device to go idle and
/// releases presentation targets, per-slot buffers and descriptors, the
/// descriptor set layout, synchronization, and the command pool before the
/// [`GpuContext`] itself goes.
pub struct TriangleRenderer {
    targets: Option<PresentationTargets>,
    slots: Option<SlotResources>,
    frame_sync: Vec<FrameSync>,
    set_layout: vk::DescriptorSetLayout,
    command_pool: Option<CommandPool>,
    vertex_shader: Vec<u32>,
    fragment_shader: Vec<u32>,
    window_extent: Extent,
    vsync: bool,
    clear_color: [f32; 4],
    // Declared last so it outlives every field above
    gpu: GpuContext,
}

impl TriangleRenderer {
    /// Build the renderer for `window` and upload `mesh`.
    ///
    /// Construction order: device context and surface, shaders, command pool,
    /// descriptor set layout, swapchain with render pass, pipeline and
    /// framebuffers, per-slot buffers, synchronization, command recording.
    ///
    /// # Safety
    /// The window must outlive the renderer.
    pub unsafe fn new<W>(
        window: &W,
        window_extent: Extent,
        mesh: &Mesh,
        config: &RendererConfig,
    ) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let gpu = unsafe {
            GpuContextBuilder::new()
                .app_name(&config.app_name)
                .validation(config.validation)
                .build(window)?
        };

        let vertex_shader = load_shader(&config.vertex_shader)?;
        let fragment_shader = load_shader(&config.fragment_shader)?;

        // Anything created from here on is released by Drop if a later step fails.
        let mut renderer = Self {
            targets: None,
            slots: None,
            frame_sync: Vec::with_capacity(FRAMES_IN_FLIGHT),
            set_layout: vk::DescriptorSetLayout::null(),
            command_pool: None,
            vertex_shader,
            fragment_shader,
            window_extent,
            vsync: config.vsync,
            clear_color: config.clear_color,
            gpu,
        };

        let device = renderer.gpu.device();
        renderer.command_pool =
            Some(unsafe { CommandPool::new(device, renderer.gpu.graphics_queue_family())? });
        renderer.set_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
                .build(device)?
        };

        renderer.targets = Some(renderer.build_targets()?);

        let slots = {
            let pool = renderer
                .command_pool
                .as_ref()
                .ok_or_else(|| invalid_state("command pool not created"))?;
            SlotResources::new(&renderer.gpu, pool, mesh, renderer.set_layout, FRAMES_IN_FLIGHT)?
        };
        renderer.slots = Some(slots);

        for _ in 0..FRAMES_IN_FLIGHT {
            let sync = unsafe { FrameSync::new(renderer.gpu.device())? };
            renderer.frame_sync.push(sync);
        }

        renderer.record_all()?;

        tracing::info!(
            "Renderer ready: {} frames in flight, {} swapchain images",
            FRAMES_IN_FLIGHT,
            renderer.targets()?.swapchain.image_count()
        );

        Ok(renderer)
    }

    /// Update the window size used when the surface lets the swapchain pick
    /// its extent.
    pub fn set_window_extent(&mut self, extent: Extent) {
        self.window_extent = extent;
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    fn targets(&self) -> Result<&PresentationTargets> {
        self.targets
            .as_ref()
            .ok_or_else(|| invalid_state("presentation targets missing"))
    }

    fn slots(&self) -> Result<&SlotResources> {
        self.slots
            .as_ref()
            .ok_or_else(|| invalid_state("slot resources missing"))
    }

    fn sync(&self, slot: usize) -> Result<&FrameSync> {
        self.frame_sync.get(slot).ok_or(RenderError::OutOfRange {
            what: "frame slots",
            index: slot,
            len: self.frame_sync.len(),
        })
    }

    fn pipeline_config(&self, extent: vk::Extent2D) -> GraphicsPipelineConfig {
        GraphicsPipelineConfig {
            vertex_shader: self.vertex_shader.clone(),
            fragment_shader: self.fragment_shader.clone(),
            vertex_bindings: vertex_bindings(),
            vertex_attributes: vertex_attributes(),
            extent,
            ..Default::default()
        }
    }

    /// Swapchain, render pass, pipeline and framebuffers. Command buffers are
    /// recorded separately once slot resources exist.
    fn build_targets(&self) -> Result<PresentationTargets> {
        let support = self.gpu.surface_support()?;
        let swapchain = unsafe {
            Swapchain::new(
                self.gpu.device(),
                self.gpu.swapchain_loader(),
                self.gpu.surface().surface,
                &support,
                self.window_extent.width,
                self.window_extent.height,
                self.gpu.queue_families(),
                self.vsync,
            )?
        };

        let mut targets = PresentationTargets {
            swapchain,
            render_pass: vk::RenderPass::null(),
            pipeline: GraphicsPipeline {
                pipeline: vk::Pipeline::null(),
                layout: vk::PipelineLayout::null(),
            },
            framebuffers: Vec::new(),
            command_buffers: Vec::new(),
        };

        if let Err(e) = self.complete_targets(&mut targets) {
            unsafe { targets.destroy(&self.gpu, None) };
            return Err(e);
        }

        Ok(targets)
    }

    fn complete_targets(&self, targets: &mut PresentationTargets) -> Result<()> {
        let device = self.gpu.device();
        let extent = targets.swapchain.extent;
        unsafe {
            targets.render_pass = create_render_pass(device, targets.swapchain.format.format)?;
            targets.pipeline = GraphicsPipeline::new(
                device,
                &self.pipeline_config(extent),
                targets.render_pass,
                &[self.set_layout],
            )?;
            targets.framebuffers = create_framebuffers(
                device,
                targets.render_pass,
                &targets.swapchain.image_views,
                extent,
            )?;
        }
        Ok(())
    }

    /// Record one command buffer per slot and swapchain image.
    fn record_all(&mut self) -> Result<()> {
        let pool = self
            .command_pool
            .as_ref()
            .ok_or_else(|| invalid_state("command pool not created"))?;
        let slots = self
            .slots
            .as_ref()
            .ok_or_else(|| invalid_state("slot resources missing"))?;
        let targets = self
            .targets
            .as_mut()
            .ok_or_else(|| invalid_state("presentation targets missing"))?;

        record_commands(&self.gpu, pool, targets, slots, self.clear_color)
    }
}

fn invalid_state(what: &str) -> RenderError {
    RenderError::Gpu(GpuError::InvalidState(what.to_string()))
}

/// Fill `targets.command_buffers` with one pre-recorded draw per
/// `(slot, image)` pair.
fn record_commands(
    gpu: &GpuContext,
    pool: &CommandPool,
    targets: &mut PresentationTargets,
    slots: &SlotResources,
    clear_color: [f32; 4],
) -> Result<()> {
    let device = gpu.device();
    let image_count = targets.framebuffers.len();
    let extent = targets.swapchain.extent;

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: clear_color,
        },
    }];

    for slot in 0..slots.descriptor_sets.len() {
        let buffers = unsafe { pool.allocate(device, image_count as u32)? };
        targets.command_buffers.push(buffers.clone());

        for (&cmd, &framebuffer) in buffers.iter().zip(&targets.framebuffers) {
            let render_pass_info = vk::RenderPassBeginInfo::default()
                .render_pass(targets.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);

            unsafe {
                record(
                    device,
                    cmd,
                    vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
                    |cmd| {
                        device.cmd_begin_render_pass(
                            cmd,
                            &render_pass_info,
                            vk::SubpassContents::INLINE,
                        );
                        device.cmd_bind_pipeline(
                            cmd,
                            vk::PipelineBindPoint::GRAPHICS,
                            targets.pipeline.pipeline,
                        );
                        device.cmd_bind_vertex_buffers(
                            cmd,
                            0,
                            &[slots.vertex_buffers[slot].buffer],
                            &[0],
                        );
                        device.cmd_bind_index_buffer(
                            cmd,
                            slots.index_buffers[slot].buffer,
                            0,
                            vk::IndexType::UINT32,
                        );
                        device.cmd_bind_descriptor_sets(
                            cmd,
                            vk::PipelineBindPoint::GRAPHICS,
                            targets.pipeline.layout,
                            0,
                            &[slots.descriptor_sets[slot]],
                            &[],
                        );
                        device.cmd_draw_indexed(cmd, slots.index_count, 1, 0, 0, 0);
                        device.cmd_end_render_pass(cmd);
                    },
                )?;
            }
        }
    }

    tracing::debug!(
        "Recorded {} command buffers ({} slots x {image_count} images)",
        slots.descriptor_sets.len() * image_count,
        slots.descriptor_sets.len()
    );

    Ok(())
}

impl FrameBackend for TriangleRenderer {
    type Error = RenderError;

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        unsafe { self.sync(slot)?.wait(self.gpu.device())? };
        Ok(())
    }

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let semaphore = self.sync(slot)?.image_available;
        let acquired = unsafe {
            self.targets()?
                .swapchain
                .acquire_next_image(self.gpu.swapchain_loader(), semaphore)?
        };

        Ok(match acquired {
            Acquire::Image { index, suboptimal } => AcquireOutcome::Acquired {
                image_index: index,
                suboptimal,
            },
            Acquire::OutOfDate => AcquireOutcome::OutOfDate,
        })
    }

    fn extent(&self) -> Extent {
        self.targets
            .as_ref()
            .map_or(self.window_extent, |targets| {
                Extent::new(targets.swapchain.extent.width, targets.swapchain.extent.height)
            })
    }

    fn write_uniform(&mut self, slot: usize, uniform: &TransformUniform) -> Result<()> {
        self.slots()?.write_uniform(slot, uniform)
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        unsafe { self.sync(slot)?.reset(self.gpu.device())? };
        Ok(())
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let sync = *self.sync(slot)?;
        let buffers = self.targets()?.command_buffers.get(slot).ok_or(
            RenderError::OutOfRange {
                what: "command buffer slots",
                index: slot,
                len: FRAMES_IN_FLIGHT,
            },
        )?;
        let cmd = *buffers
            .get(image_index as usize)
            .ok_or(RenderError::OutOfRange {
                what: "swapchain images",
                index: image_index as usize,
                len: buffers.len(),
            })?;

        let wait = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal = [sync.render_finished];

        unsafe {
            submit(
                self.gpu.device(),
                self.gpu.graphics_queue(),
                &[cmd],
                &SubmitSync {
                    wait: &wait,
                    wait_stages: &wait_stages,
                    signal: &signal,
                    fence: sync.in_flight,
                },
            )?;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let render_finished = self.sync(slot)?.render_finished;
        let status = unsafe {
            self.targets()?.swapchain.present(
                self.gpu.swapchain_loader(),
                self.gpu.present_queue(),
                image_index,
                &[render_finished],
            )?
        };

        Ok(if status.is_stale() {
            PresentOutcome::Stale
        } else {
            PresentOutcome::Presented
        })
    }

    fn rebuild(&mut self) -> Result<()> {
        if self.window_extent.is_empty() {
            tracing::debug!("Window has no area; keeping the current swapchain");
            return Ok(());
        }

        self.gpu.wait_idle()?;

        if let Some(mut targets) = self.targets.take() {
            unsafe { targets.destroy(&self.gpu, self.command_pool.as_ref()) };
        }

        self.targets = Some(self.build_targets()?);
        self.record_all()?;

        let extent = self.extent();
        tracing::info!("Swapchain rebuilt: {}x{}", extent.width, extent.height);
        Ok(())
    }
}

impl Drop for TriangleRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.gpu.wait_idle() {
            tracing::error!("Failed to wait idle: {e}");
        }

        unsafe {
            if let Some(mut targets) = self.targets.take() {
                targets.destroy(&self.gpu, self.command_pool.as_ref());
            }

            if let Some(mut slots) = self.slots.take() {
                slots.destroy(&self.gpu);
            }

            let device = self.gpu.device();
            device.destroy_descriptor_set_layout(self.set_layout, None);

            for sync in self.frame_sync.drain(..) {
                sync.destroy(device);
            }

            if let Some(pool) = self.command_pool.take() {
                pool.destroy(device);
            }
        }

        tracing::debug!("Renderer resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_input_matches_vertex_layout() {
        let bindings = vertex_bindings();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].stride, 24);
        assert_eq!(bindings[0].input_rate, vk::VertexInputRate::VERTEX);

        let attributes = vertex_attributes();
        assert_eq!(
            attributes
                .iter()
                .map(|a| (a.location, a.offset, a.format))
                .collect::<Vec<_>>(),
            vec![
                (0, 0, vk::Format::R32G32B32_SFLOAT),
                (1, 12, vk::Format::R32G32B32_SFLOAT),
            ]
        );
    }

    #[test]
    fn default_config_uses_bundled_shader_paths() {
        let config = RendererConfig::default();
        assert_eq!(config.vertex_shader, PathBuf::from("shaders/shader.vert.spv"));
        assert_eq!(config.fragment_shader, PathBuf::from("shaders/shader.frag.spv"));
        assert_eq!(config.clear_color, [0.2, 0.2, 0.2, 1.0]);
        assert!(!config.vsync);
    }
}

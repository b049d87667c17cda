//! Graphics pipeline creation.
//!
//! Fixed-function state is described by one small value type per stage. Each
//! type's `Default` is the configuration the renderer actually uses, so a
//! config only spells out what differs.

use crate::error::{GpuError, Result};
use ash::vk;

/// How vertices are assembled into primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputAssembly {
    /// Primitive topology. Default: triangle list.
    pub topology: vk::PrimitiveTopology,
    /// Whether a special index value restarts strips. Default: off.
    pub primitive_restart: bool,
}

impl Default for InputAssembly {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart: false,
        }
    }
}

/// Rasterizer state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rasterization {
    /// Default: filled polygons.
    pub polygon_mode: vk::PolygonMode,
    /// Default: back faces are culled.
    pub cull_mode: vk::CullModeFlags,
    /// Default: counter-clockwise winding is front-facing.
    pub front_face: vk::FrontFace,
    /// Only meaningful for line modes. Default: 1.0.
    pub line_width: f32,
}

impl Default for Rasterization {
    fn default() -> Self {
        Self {
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: 1.0,
        }
    }
}

/// Multisample state. Default: one sample, no sample shading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Multisample {
    pub samples: vk::SampleCountFlags,
}

impl Default for Multisample {
    fn default() -> Self {
        Self {
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }
}

/// Color blend state for the single color attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorBlend {
    /// Default: off, fragments overwrite the attachment.
    pub enabled: bool,
    /// Default: all four channels written.
    pub write_mask: vk::ColorComponentFlags,
}

impl Default for ColorBlend {
    fn default() -> Self {
        Self {
            enabled: false,
            write_mask: vk::ColorComponentFlags::RGBA,
        }
    }
}

/// Everything needed to build the graphics pipeline for one swapchain
/// configuration.
#[derive(Clone, Debug, Default)]
pub struct GraphicsPipelineConfig {
    pub vertex_shader: Vec<u32>,
    pub fragment_shader: Vec<u32>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub input_assembly: InputAssembly,
    pub rasterization: Rasterization,
    pub multisample: Multisample,
    pub color_blend: ColorBlend,
    /// Viewport and scissor cover this extent in full.
    pub extent: vk::Extent2D,
}

impl GraphicsPipelineConfig {
    /// Viewport spanning the whole extent with a 0..1 depth range.
    pub fn viewport(&self) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Scissor spanning the whole extent.
    pub fn scissor(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }
}

/// Graphics pipeline and its layout.
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Create a graphics pipeline for subpass 0 of `render_pass`.
    ///
    /// Shader modules only live for the duration of this call.
    ///
    /// # Safety
    /// The device and render pass must be valid and shader code must be valid SPIR-V.
    pub unsafe fn new(
        device: &ash::Device,
        config: &GraphicsPipelineConfig,
        render_pass: vk::RenderPass,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Self> {
        let vert_module = unsafe { create_shader_module(device, &config.vertex_shader) }
            .map_err(|e| GpuError::PipelineCreation(format!("Vertex module: {e}")))?;
        let frag_module = match unsafe { create_shader_module(device, &config.fragment_shader) } {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.destroy_shader_module(vert_module, None) };
                return Err(GpuError::PipelineCreation(format!("Fragment module: {e}")));
            }
        };

        let result = unsafe {
            Self::link(device, config, render_pass, descriptor_set_layouts, vert_module, frag_module)
        };

        unsafe {
            device.destroy_shader_module(vert_module, None);
            device.destroy_shader_module(frag_module, None);
        }

        result
    }

    unsafe fn link(
        device: &ash::Device,
        config: &GraphicsPipelineConfig,
        render_pass: vk::RenderPass,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        vert_module: vk::ShaderModule,
        frag_module: vk::ShaderModule,
    ) -> Result<Self> {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module)
                .name(c"main"),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&config.vertex_bindings)
            .vertex_attribute_descriptions(&config.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(config.input_assembly.topology)
            .primitive_restart_enable(config.input_assembly.primitive_restart);

        let viewports = [config.viewport()];
        let scissors = [config.scissor()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(config.rasterization.polygon_mode)
            .cull_mode(config.rasterization.cull_mode)
            .front_face(config.rasterization.front_face)
            .depth_bias_enable(false)
            .line_width(config.rasterization.line_width);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(config.multisample.samples)
            .sample_shading_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(config.color_blend.enabled)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ZERO)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(config.color_blend.write_mask)];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let layout_info =
            vk::PipelineLayoutCreateInfo::default().set_layouts(descriptor_set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| GpuError::PipelineCreation(e.to_string()))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        match pipelines {
            Ok(pipelines) => Ok(Self {
                pipeline: pipelines[0],
                layout,
            }),
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(GpuError::PipelineCreation(e.to_string()))
            }
        }
    }

    /// Destroy the pipeline, then its layout.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    let module = unsafe { device.create_shader_module(&info, None)? };
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_opaque_triangles() {
        let config = GraphicsPipelineConfig::default();
        assert_eq!(
            config.input_assembly.topology,
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
        assert!(!config.input_assembly.primitive_restart);
        assert_eq!(config.rasterization.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(
            config.rasterization.front_face,
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(config.multisample.samples, vk::SampleCountFlags::TYPE_1);
        assert!(!config.color_blend.enabled);
        assert_eq!(config.color_blend.write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn viewport_covers_extent() {
        let config = GraphicsPipelineConfig {
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let viewport = config.viewport();
        assert_eq!((viewport.width, viewport.height), (800.0, 600.0));
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
        assert_eq!(config.scissor().extent, config.extent);
        assert_eq!(config.scissor().offset, vk::Offset2D { x: 0, y: 0 });
    }
}

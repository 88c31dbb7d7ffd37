use super::render_pass::VulkanRenderPass;
use super::{context::VulkanContext, device::VulkanDevice, error::SetupError};
use crate::file;
use anyhow::Result;
use log::*;
use std::path::Path;
use vulkanalia::bytecode::Bytecode;
use vulkanalia::vk::{self, DeviceV1_0, Handle, HasBuilder};

#[derive(Debug)]
pub struct VulkanPipeline;

impl VulkanPipeline {
    /// Builds the render pass, the empty pipeline layout and the graphics
    /// pipeline. Shader modules only live for the duration of this call.
    pub unsafe fn create(
        device: &VulkanDevice,
        context: &mut VulkanContext,
        vertex_shader: &Path,
        fragment_shader: &Path,
    ) -> Result<()> {
        // Render pass
        VulkanRenderPass::create(device, context)?;

        let vert = file::read_binary(vertex_shader)?;
        let frag = file::read_binary(fragment_shader)?;

        let vertex_shader_module = create_shader_module(device, vertex_shader, &vert)?;
        let fragment_shader_module = match create_shader_module(device, fragment_shader, &frag)
        {
            Ok(module) => module,
            Err(error) => {
                device
                    .vk_device
                    .destroy_shader_module(vertex_shader_module, None);
                return Err(error);
            }
        };

        let result = VulkanPipeline::create_pipeline(
            device,
            context,
            vertex_shader_module,
            fragment_shader_module,
        );

        // destroy shader modules
        device
            .vk_device
            .destroy_shader_module(vertex_shader_module, None);
        device
            .vk_device
            .destroy_shader_module(fragment_shader_module, None);

        result
    }

    unsafe fn create_pipeline(
        device: &VulkanDevice,
        context: &mut VulkanContext,
        vertex_shader_module: vk::ShaderModule,
        fragment_shader_module: vk::ShaderModule,
    ) -> Result<()> {
        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_shader_module)
            .name(b"main\0");

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_shader_module)
            .name(b"main\0");

        // vertices are generated in the vertex shader
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder();
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Overridden every frame through dynamic state.
        let viewport = full_viewport(context.swapchain_extent);
        let scissor = full_scissor(context.swapchain_extent);

        let viewports = &[viewport];
        let scissors = &[scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        let dynamic_states = &[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(dynamic_states);

        // rasterizer
        let rasterization_state = rasterization_state();

        // multisampling
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::_1);

        // color blending
        let attachment = color_blend_attachment();

        let attachments = &[attachment];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        // layout
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        context.pipeline_layout = device
            .vk_device
            .create_pipeline_layout(&layout_info, None)
            .map_err(SetupError::creation("pipeline layout"))?;
        info!("Created pipeline layout.");

        let stages = &[vert_stage, frag_stage];
        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(context.pipeline_layout)
            .render_pass(context.render_pass)
            .subpass(0)
            .base_pipeline_index(-1);

        context.pipeline = device
            .vk_device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
            .map_err(SetupError::creation("graphics pipeline"))?
            .0[0];
        info!("Created graphics pipeline.");

        Ok(())
    }

    /// Destroys the pipeline, its layout and the render pass.
    pub unsafe fn destroy(device: &VulkanDevice, context: &mut VulkanContext) {
        device.vk_device.destroy_pipeline(context.pipeline, None);
        device
            .vk_device
            .destroy_pipeline_layout(context.pipeline_layout, None);
        context.pipeline = vk::Pipeline::default();
        context.pipeline_layout = vk::PipelineLayout::default();
        VulkanRenderPass::destroy(device, context);
    }
}

unsafe fn create_shader_module(
    device: &VulkanDevice,
    path: &Path,
    bytecode: &[u8],
) -> Result<vk::ShaderModule> {
    let bytecode = parse_bytecode(path, bytecode)?;
    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(bytecode.code_size())
        .code(bytecode.code());

    Ok(device
        .vk_device
        .create_shader_module(&info, None)
        .map_err(SetupError::creation("shader module"))?)
}

fn parse_bytecode(path: &Path, bytecode: &[u8]) -> Result<Bytecode, SetupError> {
    Bytecode::new(bytecode).map_err(|e| SetupError::Shader {
        path: path.display().to_string(),
        reason: format!("{:?}", e),
    })
}

pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport::builder()
        .x(0.0)
        .y(0.0)
        .width(extent.width as f32)
        .height(extent.height as f32)
        .min_depth(0.0)
        .max_depth(1.0)
        .build()
}

pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D::builder()
        .offset(vk::Offset2D { x: 0, y: 0 })
        .extent(extent)
        .build()
}

fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
        .build()
}

fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::all())
        .blend_enable(false)
        .build()
}

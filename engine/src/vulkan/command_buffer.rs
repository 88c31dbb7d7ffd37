use super::constants::{CLEAR_COLOR, TRIANGLE_VERTEX_COUNT};
use super::pipeline::{full_scissor, full_viewport};
use super::{context::VulkanContext, device::VulkanDevice, error::SetupError};
use anyhow::Result;
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};

#[derive(Debug)]
pub struct VulkanCommandBuffer;

impl VulkanCommandBuffer {
    /// The pool lives on the graphics family and allows individual resets,
    /// so the single command buffer can be re-recorded every frame.
    pub unsafe fn create_command_pool(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(context.queue_families.graphics);

        context.command_pool = device
            .vk_device
            .create_command_pool(&info, None)
            .map_err(SetupError::creation("command pool"))?;
        info!("Created command pool.");

        Ok(())
    }

    pub unsafe fn create_command_buffer(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(context.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        context.command_buffer = device
            .vk_device
            .allocate_command_buffers(&allocate_info)
            .map_err(SetupError::creation("command buffer"))?[0];
        info!("Allocated command buffer.");

        Ok(())
    }

    /// Records the clear and the triangle draw into the framebuffer of
    /// `image_index`. The buffer must already be reset.
    pub unsafe fn record(
        device: &VulkanDevice,
        context: &VulkanContext,
        image_index: usize,
    ) -> Result<()> {
        let command_buffer = context.command_buffer;
        let info = vk::CommandBufferBeginInfo::builder();

        device
            .vk_device
            .begin_command_buffer(command_buffer, &info)?;

        let render_area = full_scissor(context.swapchain_extent);

        let clear_values = &[clear_value()];
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(context.render_pass)
            .framebuffer(context.framebuffers[image_index])
            .render_area(render_area)
            .clear_values(clear_values);

        device
            .vk_device
            .cmd_begin_render_pass(command_buffer, &info, vk::SubpassContents::INLINE);

        device.vk_device.cmd_bind_pipeline(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            context.pipeline,
        );

        device.vk_device.cmd_set_viewport(
            command_buffer,
            0,
            &[full_viewport(context.swapchain_extent)],
        );
        device.vk_device.cmd_set_scissor(
            command_buffer,
            0,
            &[full_scissor(context.swapchain_extent)],
        );

        device
            .vk_device
            .cmd_draw(command_buffer, TRIANGLE_VERTEX_COUNT, 1, 0, 0);
        device.vk_device.cmd_end_render_pass(command_buffer);

        device.vk_device.end_command_buffer(command_buffer)?;

        Ok(())
    }

    /// Destroying the pool frees the command buffer allocated from it.
    pub unsafe fn destroy(device: &VulkanDevice, context: &mut VulkanContext) {
        device
            .vk_device
            .destroy_command_pool(context.command_pool, None);
        context.command_pool = vk::CommandPool::default();
        context.command_buffer = vk::CommandBuffer::default();
    }
}

fn clear_value() -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue {
            float32: CLEAR_COLOR,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_to_opaque_black() {
        let value = clear_value();

        assert_eq!(unsafe { value.color.float32 }, [0.0, 0.0, 0.0, 1.0]);
    }
}

use super::{context::VulkanContext, device::VulkanDevice, error::SetupError};
use anyhow::Result;
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};

pub struct VulkanFramebuffer;

impl VulkanFramebuffer {
    /// One framebuffer per swapchain image view, sized to the swapchain extent.
    pub unsafe fn create(device: &VulkanDevice, context: &mut VulkanContext) -> Result<()> {
        let mut framebuffers = Vec::with_capacity(context.swapchain_image_views.len());

        for view in &context.swapchain_image_views {
            let attachments = &[*view];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(context.render_pass)
                .attachments(attachments)
                .width(context.swapchain_extent.width)
                .height(context.swapchain_extent.height)
                .layers(1);

            match device.vk_device.create_framebuffer(&create_info, None) {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(code) => {
                    framebuffers
                        .iter()
                        .for_each(|f| device.vk_device.destroy_framebuffer(*f, None));
                    return Err(SetupError::creation("framebuffer")(code).into());
                }
            }
        }

        info!("Created {} framebuffers.", framebuffers.len());
        context.framebuffers = framebuffers;

        Ok(())
    }

    pub unsafe fn destroy(device: &VulkanDevice, context: &mut VulkanContext) {
        context
            .framebuffers
            .drain(..)
            .for_each(|f| device.vk_device.destroy_framebuffer(f, None));
    }
}

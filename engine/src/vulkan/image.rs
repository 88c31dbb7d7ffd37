use anyhow::Result;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};

use super::{context::VulkanContext, device::VulkanDevice, error::SetupError};

#[derive(Debug)]
pub struct VulkanImage;

impl VulkanImage {
    /// Builds one 2D color view per swapchain image: identity swizzle, a
    /// single mip level and a single array layer.
    pub unsafe fn create_swapchain_views(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let mut views = Vec::with_capacity(context.swapchain_images.len());

        for image in &context.swapchain_images {
            let info = color_view_info(*image, context.swapchain_format);
            match device.vk_device.create_image_view(&info, None) {
                Ok(view) => views.push(view),
                Err(code) => {
                    views
                        .iter()
                        .for_each(|v| device.vk_device.destroy_image_view(*v, None));
                    return Err(SetupError::creation("image view")(code).into());
                }
            }
        }

        context.swapchain_image_views = views;
        Ok(())
    }

    pub unsafe fn destroy_swapchain_views(device: &VulkanDevice, context: &mut VulkanContext) {
        context
            .swapchain_image_views
            .drain(..)
            .for_each(|v| device.vk_device.destroy_image_view(v, None));
    }
}

fn color_view_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo {
    let components = vk::ComponentMapping::builder()
        .r(vk::ComponentSwizzle::IDENTITY)
        .g(vk::ComponentSwizzle::IDENTITY)
        .b(vk::ComponentSwizzle::IDENTITY)
        .a(vk::ComponentSwizzle::IDENTITY);

    let subresource_range = vk::ImageSubresourceRange::builder()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1);

    vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::_2D)
        .format(format)
        .components(components)
        .subresource_range(subresource_range)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_view_covers_one_mip_and_one_layer() {
        let info = color_view_info(vk::Image::default(), vk::Format::B8G8R8A8_SRGB);

        assert_eq!(info.view_type, vk::ImageViewType::_2D);
        assert_eq!(info.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(info.components.r, vk::ComponentSwizzle::IDENTITY);
        assert_eq!(info.components.a, vk::ComponentSwizzle::IDENTITY);
        assert_eq!(
            info.subresource_range.aspect_mask,
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(info.subresource_range.level_count, 1);
        assert_eq!(info.subresource_range.layer_count, 1);
    }
}

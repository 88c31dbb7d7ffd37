use anyhow::Result;
use log::*;
use vulkanalia::vk::{self, Handle, HasBuilder, KhrSurfaceExtension, KhrSwapchainExtension};
use vulkanalia::window as vk_window;
use winit::window::Window;

use super::constants;
use super::error::SetupError;
use super::image::VulkanImage;
use super::{context::VulkanContext, device::VulkanDevice, instance::VulkanInstance};

#[derive(Debug)]
pub struct VulkanSwapchain;

impl VulkanSwapchain {
    /// Creates the window-bound presentation surface. Done once per run.
    pub unsafe fn new(
        window: &Window,
        instance: &VulkanInstance,
        context: &mut VulkanContext,
    ) -> Result<()> {
        context.surface = vk_window::create_surface(&instance.vk_instance, window, window)
            .map_err(SetupError::creation("window surface"))?;
        info!("Created window surface.");
        Ok(())
    }

    /// Negotiates format, present mode, extent and image count, then creates
    /// the swapchain and fetches its images.
    pub unsafe fn create(
        window: &Window,
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let support =
            SwapchainSupport::get(instance, context.surface, context.physical_device)?;
        let size = window.inner_size();
        let properties = support.negotiate(vk::Extent2D {
            width: size.width,
            height: size.height,
        })?;

        debug!(
            "Creating swapchain. Format: {:?}, ColorSpace: {:?}, PresentMode: {:?}, Extent: {}x{}, ImageCount: {}",
            properties.format.format,
            properties.format.color_space,
            properties.present_mode,
            properties.extent.width,
            properties.extent.height,
            properties.image_count,
        );

        let (image_sharing_mode, queue_family_indices) = context.queue_families.image_sharing();

        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface)
            .min_image_count(properties.image_count)
            .image_format(properties.format.format)
            .image_color_space(properties.format.color_space)
            .image_extent(properties.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(image_sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(properties.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = device
            .vk_device
            .create_swapchain_khr(&info, None)
            .map_err(SetupError::creation("swapchain"))?;

        let images = match device.vk_device.get_swapchain_images_khr(swapchain) {
            Ok(images) => images,
            Err(code) => {
                device.vk_device.destroy_swapchain_khr(swapchain, None);
                return Err(code.into());
            }
        };
        info!("Created swapchain with {} image(s).", images.len());

        context.swapchain = swapchain;
        context.swapchain_format = properties.format.format;
        context.swapchain_color_space = properties.format.color_space;
        context.swapchain_present_mode = properties.present_mode;
        context.swapchain_extent = properties.extent;
        context.swapchain_images = images;

        Ok(())
    }

    pub unsafe fn create_image_views(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        VulkanImage::create_swapchain_views(device, context)?;
        info!(
            "Created {} swapchain image view(s).",
            context.swapchain_image_views.len()
        );
        Ok(())
    }

    /// Destroys the image views and the swapchain. Images are owned by the
    /// swapchain and go with it.
    pub unsafe fn destroy(device: &VulkanDevice, context: &mut VulkanContext) {
        VulkanImage::destroy_swapchain_views(device, context);
        if !context.swapchain.is_null() {
            device
                .vk_device
                .destroy_swapchain_khr(context.swapchain, None);
            context.swapchain = vk::SwapchainKHR::null();
        }
        context.swapchain_images.clear();
    }
}

/// What a surface supports on a given physical device.
#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn get(
        instance: &VulkanInstance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let instance = &instance.vk_instance;
        Ok(Self {
            capabilities: instance
                .get_physical_device_surface_capabilities_khr(physical_device, surface)?,
            formats: instance.get_physical_device_surface_formats_khr(physical_device, surface)?,
            present_modes: instance
                .get_physical_device_surface_present_modes_khr(physical_device, surface)?,
        })
    }

    /// Picks every swapchain property from this support report.
    /// `framebuffer_size` is only consulted when the surface leaves the
    /// extent to the application.
    pub fn negotiate(
        &self,
        framebuffer_size: vk::Extent2D,
    ) -> Result<SwapchainProperties, SetupError> {
        Ok(SwapchainProperties {
            format: choose_surface_format(&self.formats)?,
            present_mode: choose_present_mode(&self.present_modes),
            extent: choose_extent(&self.capabilities, framebuffer_size),
            image_count: choose_image_count(&self.capabilities),
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SwapchainProperties {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

/// The sRGB BGRA8 / sRGB-nonlinear pair when offered, the first format otherwise.
/// The surface may report no formats at all when queried again on recreation.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, SetupError> {
    formats
        .iter()
        .cloned()
        .find(|f| {
            f.format == constants::PREFERRED_SURFACE_FORMAT
                && f.color_space == constants::PREFERRED_COLOR_SPACE
        })
        .or_else(|| formats.first().cloned())
        .ok_or_else(|| SetupError::CapabilityMissing("surface formats".into()))
}

/// MAILBOX when offered, FIFO otherwise (FIFO is always supported).
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .cloned()
        .find(|m| *m == constants::PREFERRED_PRESENT_MODE)
        .unwrap_or(constants::FALLBACK_PRESENT_MODE)
}

/// The surface's current extent, unless its width is `u32::MAX`, in which
/// case the framebuffer size clamped into the surface's extent bounds.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: framebuffer_size.width.max(min.width).min(max.width),
        height: framebuffer_size.height.max(min.height).min(max.height),
    }
}

/// One more than the minimum, capped by the maximum when there is one
/// (a maximum of zero means unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && preferred > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        preferred
    }
}

/// Image index from an acquire result, or `None` when the swapchain is out
/// of date and must be recreated before drawing.
pub fn acquired_image(
    result: Result<(u32, vk::SuccessCode), vk::ErrorCode>,
) -> Result<Option<u32>, vk::ErrorCode> {
    match result {
        Ok((image_index, _)) => Ok(Some(image_index)),
        Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(None),
        Err(code) => Err(code),
    }
}

/// Whether a present result asks for the swapchain to be recreated.
pub fn present_needs_recreation(
    result: Result<vk::SuccessCode, vk::ErrorCode>,
) -> Result<bool, vk::ErrorCode> {
    match result {
        Ok(vk::SuccessCode::SUBOPTIMAL_KHR) | Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(true),
        Ok(_) => Ok(false),
        Err(code) => Err(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn image_counts(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn surface_format_prefers_srgb_pair() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        assert_eq!(
            choose_surface_format(&formats).unwrap(),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)
        );
    }

    #[test]
    fn surface_format_requires_matching_color_space() {
        let formats = [
            format(
                vk::Format::R16G16B16A16_SFLOAT,
                vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            ),
            format(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
            ),
        ];

        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn surface_format_falls_back_to_first_entry() {
        let only = format(
            vk::Format::A2B10G10R10_UNORM_PACK32,
            vk::ColorSpaceKHR::HDR10_ST2084_EXT,
        );

        assert_eq!(choose_surface_format(&[only]).unwrap(), only);
    }

    #[test]
    fn surface_format_from_empty_list_is_missing_capability() {
        let error = choose_surface_format(&[]).unwrap_err();

        assert!(matches!(error, SetupError::CapabilityMissing(_)));
        assert!(error.to_string().contains("surface formats"));
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO_RELAXED,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_current_extent_when_defined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(800, 600),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };

        assert_eq!(
            choose_extent(&capabilities, extent(1920, 1080)),
            extent(800, 600)
        );
    }

    #[test]
    fn extent_clamps_framebuffer_size_when_undefined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(1024, 768),
            ..Default::default()
        };

        assert_eq!(
            choose_extent(&capabilities, extent(1920, 1080)),
            extent(1024, 768)
        );
    }

    #[test]
    fn extent_clamps_each_dimension_independently() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(64, 64),
            max_image_extent: extent(1024, 768),
            ..Default::default()
        };

        assert_eq!(
            choose_extent(&capabilities, extent(10, 500)),
            extent(64, 500)
        );
        assert_eq!(
            choose_extent(&capabilities, extent(2000, 0)),
            extent(1024, 64)
        );
    }

    #[test]
    fn image_count_is_capped_by_maximum() {
        assert_eq!(choose_image_count(&image_counts(2, 4)), 3);
        assert_eq!(choose_image_count(&image_counts(2, 2)), 2);
    }

    #[test]
    fn image_count_is_unbounded_when_maximum_is_zero() {
        assert_eq!(choose_image_count(&image_counts(3, 0)), 4);
    }

    #[test]
    fn negotiate_combines_every_choice() {
        let support = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: extent(640, 480),
                ..Default::default()
            },
            formats: vec![format(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            )],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        let properties = support.negotiate(extent(1, 1)).unwrap();
        assert_eq!(
            properties,
            SwapchainProperties {
                format: format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
                present_mode: vk::PresentModeKHR::FIFO,
                extent: extent(640, 480),
                image_count: 3,
            }
        );
    }

    #[test]
    fn negotiate_fails_when_formats_disappear() {
        let support = SwapchainSupport {
            capabilities: image_counts(2, 0),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        assert!(matches!(
            support.negotiate(extent(800, 600)),
            Err(SetupError::CapabilityMissing(_))
        ));
    }

    #[test]
    fn out_of_date_acquire_skips_the_frame() {
        assert_eq!(
            acquired_image(Err(vk::ErrorCode::OUT_OF_DATE_KHR)),
            Ok(None)
        );
    }

    #[test]
    fn acquire_keeps_the_index_even_when_suboptimal() {
        assert_eq!(acquired_image(Ok((2, vk::SuccessCode::SUCCESS))), Ok(Some(2)));
        assert_eq!(
            acquired_image(Ok((1, vk::SuccessCode::SUBOPTIMAL_KHR))),
            Ok(Some(1))
        );
    }

    #[test]
    fn other_acquire_errors_propagate() {
        assert_eq!(
            acquired_image(Err(vk::ErrorCode::DEVICE_LOST)),
            Err(vk::ErrorCode::DEVICE_LOST)
        );
    }

    #[test]
    fn present_asks_for_recreation_when_out_of_date_or_suboptimal() {
        assert_eq!(
            present_needs_recreation(Err(vk::ErrorCode::OUT_OF_DATE_KHR)),
            Ok(true)
        );
        assert_eq!(
            present_needs_recreation(Ok(vk::SuccessCode::SUBOPTIMAL_KHR)),
            Ok(true)
        );
        assert_eq!(present_needs_recreation(Ok(vk::SuccessCode::SUCCESS)), Ok(false));
    }

    #[test]
    fn other_present_errors_propagate() {
        assert_eq!(
            present_needs_recreation(Err(vk::ErrorCode::SURFACE_LOST_KHR)),
            Err(vk::ErrorCode::SURFACE_LOST_KHR)
        );
    }
}

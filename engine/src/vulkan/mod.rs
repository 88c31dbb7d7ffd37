use anyhow::{anyhow, Result};
use command_buffer::VulkanCommandBuffer;
use context::VulkanContext;
use device::VulkanDevice;
use error::SetupError;
use framebuffer::VulkanFramebuffer;
use instance::VulkanInstance;
use log::*;
use pipeline::VulkanPipeline;
use swapchain::{acquired_image, present_needs_recreation, VulkanSwapchain};
use sync::{FramePhase, FrameSync};
use vulkanalia::{
    loader::{LibloadingLoader, LIBRARY},
    vk::{self, DeviceV1_0, Handle, HasBuilder, KhrSwapchainExtension},
    Entry,
};
use winit::window::Window;

use crate::config::EngineConfig;

mod command_buffer;
mod constants;
mod context;
mod device;
mod error;
mod framebuffer;
mod image;
mod instance;
mod pipeline;
mod render_pass;
mod swapchain;
mod sync;

pub struct VulkanRenderer {
    // Keeps the Vulkan library loaded for as long as the instance lives.
    _entry: Entry,
    instance: VulkanInstance,
    device: VulkanDevice,
    context: VulkanContext,
    resized: bool,
}

impl VulkanRenderer {
    /// Brings up every Vulkan object in dependency order. Any failure tears
    /// down what was already created before the error is returned.
    pub unsafe fn new(window: &Window, config: &EngineConfig) -> Result<VulkanRenderer> {
        let loader = LibloadingLoader::new(LIBRARY)?;
        let entry = Entry::new(loader).map_err(|b| anyhow!("{}", b))?;

        let mut context = VulkanContext::default();
        let mut instance = VulkanInstance::new(window, &entry, &mut context)?;

        let device = match VulkanRenderer::create_device(window, &entry, &instance, &mut context)
        {
            Ok(device) => device,
            Err(error) => {
                instance.destroy(&mut context);
                return Err(error);
            }
        };

        let mut renderer = VulkanRenderer {
            _entry: entry,
            instance,
            device,
            context,
            resized: false,
        };

        if let Err(error) = renderer.create_resources(window, config) {
            renderer.destroy();
            return Err(error);
        }

        Ok(renderer)
    }

    unsafe fn create_device(
        window: &Window,
        entry: &Entry,
        instance: &VulkanInstance,
        context: &mut VulkanContext,
    ) -> Result<VulkanDevice> {
        VulkanSwapchain::new(window, instance, context)?;
        VulkanDevice::new(entry, instance, context)
    }

    unsafe fn create_resources(&mut self, window: &Window, config: &EngineConfig) -> Result<()> {
        let (instance, device, context) = (&self.instance, &self.device, &mut self.context);

        VulkanSwapchain::create(window, instance, device, context)?;
        VulkanSwapchain::create_image_views(device, context)?;

        VulkanPipeline::create(
            device,
            context,
            &config.vertex_shader,
            &config.fragment_shader,
        )?;
        VulkanFramebuffer::create(device, context)?;

        VulkanCommandBuffer::create_command_pool(device, context)?;
        VulkanCommandBuffer::create_command_buffer(device, context)?;

        context.sync = FrameSync::create(device)?;

        Ok(())
    }

    /// Marks the swapchain for recreation before the next frame.
    pub fn request_resize(&mut self) {
        self.resized = true;
    }

    /// Renders a frame, recreating the swapchain first if a resize is
    /// pending. Nothing is drawn while the window is minimized.
    pub unsafe fn render(&mut self, window: &Window) -> Result<()> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            trace!("Window minimized, skipping frame.");
            return Ok(());
        }

        if self.resized {
            self.resized = false;
            self.recreate_swapchain(window)?;
        }

        if self.draw_frame()? {
            debug!("Swapchain out of date, recreating before the next frame.");
            self.resized = true;
        }

        Ok(())
    }

    /// One iteration of the frame loop. Only synchronization state changes;
    /// every other object is read. Returns `true` when the swapchain no
    /// longer matches the surface.
    unsafe fn draw_frame(&self) -> Result<bool> {
        let device = &self.device.vk_device;
        let context = &self.context;
        let sync = &context.sync;

        trace!("Frame phase: {:?}", FramePhase::Wait);
        device.wait_for_fences(&[sync.in_flight], true, u64::MAX)?;

        trace!("Frame phase: {:?}", FramePhase::Acquire);
        let acquired = acquired_image(device.acquire_next_image_khr(
            context.swapchain,
            u64::MAX,
            sync.image_available,
            vk::Fence::null(),
        ))?;
        let image_index = match acquired {
            Some(image_index) => image_index as usize,
            // The fence is still signaled, so the next wait returns.
            None => return Ok(true),
        };

        device.reset_fences(&[sync.in_flight])?;

        trace!("Frame phase: {:?}", FramePhase::Record);
        device.reset_command_buffer(context.command_buffer, vk::CommandBufferResetFlags::empty())?;
        VulkanCommandBuffer::record(&self.device, context, image_index)?;

        trace!("Frame phase: {:?}", FramePhase::Submit);
        let wait_semaphores = &[sync.image_available];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[context.command_buffer];
        let signal_semaphores = &[sync.render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        device.queue_submit(context.graphics_queue, &[submit_info], sync.in_flight)?;

        trace!("Frame phase: {:?}", FramePhase::Present);
        let swapchains = &[context.swapchain];
        let image_indices = &[image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        let presented = device.queue_present_khr(context.present_queue, &present_info);

        Ok(present_needs_recreation(presented)?)
    }

    /// Rebuilds the swapchain, its image views and the framebuffers for the
    /// current window size. The render pass and pipeline are kept, so the
    /// negotiated format must not change.
    unsafe fn recreate_swapchain(&mut self, window: &Window) -> Result<()> {
        self.device.wait_idle()?;

        let previous_format = self.context.swapchain_format;
        VulkanFramebuffer::destroy(&self.device, &mut self.context);
        VulkanSwapchain::destroy(&self.device, &mut self.context);

        VulkanSwapchain::create(window, &self.instance, &self.device, &mut self.context)?;
        if self.context.swapchain_format != previous_format {
            return Err(SetupError::FormatChanged {
                old: previous_format,
                new: self.context.swapchain_format,
            }
            .into());
        }

        VulkanSwapchain::create_image_views(&self.device, &mut self.context)?;
        VulkanFramebuffer::create(&self.device, &mut self.context)?;
        info!(
            "Recreated swapchain ({}x{}, {:?}, {:?}).",
            self.context.swapchain_extent.width,
            self.context.swapchain_extent.height,
            self.context.swapchain_color_space,
            self.context.swapchain_present_mode,
        );

        Ok(())
    }

    /// Destroys everything in reverse creation order. Objects that were never
    /// created hold null handles, which the destroy calls ignore.
    pub unsafe fn destroy(&mut self) {
        if let Err(error) = self.device.wait_idle() {
            warn!("Failed to wait for device idle before teardown: {}", error);
        }

        self.context.sync.destroy(&self.device);
        VulkanCommandBuffer::destroy(&self.device, &mut self.context);
        VulkanFramebuffer::destroy(&self.device, &mut self.context);
        VulkanPipeline::destroy(&self.device, &mut self.context);
        VulkanSwapchain::destroy(&self.device, &mut self.context);
        self.device.destroy();
        self.instance.destroy(&mut self.context);
        info!("Renderer destroyed.");
    }
}

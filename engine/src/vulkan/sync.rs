use anyhow::Result;
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, Handle, HasBuilder};

use super::{device::VulkanDevice, error::SetupError};

/// The synchronization objects of the single frame in flight.
#[derive(Clone, Debug, Default)]
pub struct FrameSync {
    /// Signaled once the acquired image may be rendered to.
    pub image_available: vk::Semaphore,
    /// Signaled when the submitted work has finished, waited on by present.
    pub render_finished: vk::Semaphore,
    /// Created signaled so the very first frame does not block forever.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub unsafe fn create(device: &VulkanDevice) -> Result<FrameSync> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let mut sync = FrameSync::default();
        let created = (|| {
            sync.image_available = device.vk_device.create_semaphore(&semaphore_info, None)?;
            sync.render_finished = device.vk_device.create_semaphore(&semaphore_info, None)?;
            sync.in_flight = device.vk_device.create_fence(&fence_info, None)?;
            Ok::<(), vk::ErrorCode>(())
        })();

        if let Err(code) = created {
            sync.destroy(device);
            return Err(SetupError::Synchronization(code).into());
        }
        info!("Created frame synchronization objects.");

        Ok(sync)
    }

    pub unsafe fn destroy(&mut self, device: &VulkanDevice) {
        if !self.in_flight.is_null() {
            device.vk_device.destroy_fence(self.in_flight, None);
        }
        if !self.render_finished.is_null() {
            device.vk_device.destroy_semaphore(self.render_finished, None);
        }
        if !self.image_available.is_null() {
            device.vk_device.destroy_semaphore(self.image_available, None);
        }
        *self = FrameSync::default();
    }
}

/// The steps of one frame, in the order they happen. Used to label trace output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Wait,
    Acquire,
    Record,
    Submit,
    Present,
}

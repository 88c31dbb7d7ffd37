use anyhow::Result;
use log::*;
use std::collections::HashSet;
use vulkanalia::{
    vk::{self, DeviceV1_0, HasBuilder, InstanceV1_0, KhrSurfaceExtension},
    Device, Entry,
};

use super::error::{SetupError, SuitabilityError};
use super::swapchain::SwapchainSupport;
use super::{constants, context::VulkanContext, instance::VulkanInstance};

#[derive(Debug)]
pub struct VulkanDevice {
    pub vk_device: Device,
}

impl VulkanDevice {
    /// Selects the first suitable physical device and stores it, with its
    /// resolved queue families, in `context`.
    unsafe fn pick_physical_device(
        instance: &VulkanInstance,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let physical_devices = instance.vk_instance.enumerate_physical_devices()?;

        let (physical_device, families) =
            select_first_suitable(&physical_devices, |physical_device| {
                let properties = instance
                    .vk_instance
                    .get_physical_device_properties(physical_device);

                match VulkanDevice::check_physical_device(instance, context, physical_device) {
                    Err(error) => {
                        warn!(
                            "Skipping physical device (`{}`): {}",
                            properties.device_name, error
                        );
                        None
                    }
                    Ok(families) => {
                        info!("Selected physical device (`{}`).", properties.device_name);
                        Some(families)
                    }
                }
            })?;

        context.physical_device = physical_device;
        context.queue_families = families;

        Ok(())
    }

    unsafe fn check_physical_device(
        instance: &VulkanInstance,
        context: &VulkanContext,
        physical_device: vk::PhysicalDevice,
    ) -> Result<QueueFamilies> {
        let indices = QueueFamilyIndices::get(instance, context, physical_device)?;

        let extensions = instance
            .vk_instance
            .enumerate_device_extension_properties(physical_device, None)?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>();

        let support = SwapchainSupport::get(instance, context.surface, physical_device)?;

        Ok(check_suitability(&indices, &extensions, &support)?)
    }

    pub unsafe fn new(
        entry: &Entry,
        instance: &VulkanInstance,
        context: &mut VulkanContext,
    ) -> Result<VulkanDevice> {
        VulkanDevice::pick_physical_device(instance, context)?;

        let families = context.queue_families;
        let queue_priorities = &[1.0];
        let queue_infos = families
            .unique()
            .iter()
            .map(|i| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*i)
                    .queue_priorities(queue_priorities)
            })
            .collect::<Vec<_>>();

        let layers = if constants::VALIDATION_ENABLED {
            vec![constants::VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = constants::DEVICE_EXTENSIONS
            .iter()
            .map(|n| n.as_ptr())
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        if cfg!(target_os = "macos") && entry.version()? >= constants::PORTABILITY_MACOS_VERSION {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }

        let features = vk::PhysicalDeviceFeatures::builder();

        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = instance
            .vk_instance
            .create_device(context.physical_device, &info, None)
            .map_err(SetupError::creation("logical device"))?;
        info!(
            "Created logical device ({} queue create info(s)).",
            queue_infos.len()
        );

        context.graphics_queue = device.get_device_queue(families.graphics, 0);
        context.present_queue = device.get_device_queue(families.present, 0);
        debug!(
            "Retrieved graphics queue (family {}) and present queue (family {}).",
            families.graphics, families.present
        );

        Ok(VulkanDevice { vk_device: device })
    }

    pub unsafe fn wait_idle(&self) -> Result<()> {
        self.vk_device.device_wait_idle()?;
        Ok(())
    }

    pub unsafe fn destroy(&mut self) {
        self.vk_device.destroy_device(None);
        info!("Destroyed logical device.");
    }
}

/// Queue family roles of one physical device. A role is `None` until a
/// family qualifying for it has been found.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    unsafe fn get(
        instance: &VulkanInstance,
        context: &VulkanContext,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let properties = instance
            .vk_instance
            .get_physical_device_queue_family_properties(physical_device);

        let indices = QueueFamilyIndices::find(&properties, |index| {
            instance.vk_instance.get_physical_device_surface_support_khr(
                physical_device,
                index,
                context.surface,
            )
        })?;

        Ok(indices)
    }

    /// Scans every family. The first family with the graphics bit takes the
    /// graphics role; the first family `supports_present` accepts takes the
    /// present role. Both roles may land on the same family.
    pub fn find<F>(
        properties: &[vk::QueueFamilyProperties],
        mut supports_present: F,
    ) -> Result<Self, vk::ErrorCode>
    where
        F: FnMut(u32) -> Result<bool, vk::ErrorCode>,
    {
        let mut indices = QueueFamilyIndices::default();

        for (index, family) in properties.iter().enumerate() {
            let index = index as u32;

            if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics = Some(index);
            }

            if indices.present.is_none() && supports_present(index)? {
                indices.present = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn resolve(&self) -> Option<QueueFamilies> {
        match (self.graphics, self.present) {
            (Some(graphics), Some(present)) => Some(QueueFamilies { graphics, present }),
            _ => None,
        }
    }
}

/// Resolved queue families of the selected device.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, one entry per device queue to request.
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Swapchain image sharing: concurrent across both families when they
    /// differ, exclusive otherwise.
    pub fn image_sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.graphics != self.present {
            (vk::SharingMode::CONCURRENT, self.unique())
        } else {
            (vk::SharingMode::EXCLUSIVE, vec![])
        }
    }
}

/// The first device `check` accepts, in enumeration order. Devices after it
/// are never checked.
pub fn select_first_suitable<D, F>(
    devices: &[D],
    mut check: F,
) -> Result<(D, QueueFamilies), SetupError>
where
    D: Copy,
    F: FnMut(D) -> Option<QueueFamilies>,
{
    if devices.is_empty() {
        return Err(SetupError::CapabilityMissing(
            "GPU with Vulkan support".into(),
        ));
    }

    devices
        .iter()
        .find_map(|device| check(*device).map(|families| (*device, families)))
        .ok_or_else(|| SetupError::CapabilityMissing("suitable physical device".into()))
}

/// A device qualifies when both queue roles resolve, every required device
/// extension is present and the surface reports at least one format and one
/// present mode.
pub fn check_suitability(
    indices: &QueueFamilyIndices,
    extensions: &HashSet<vk::ExtensionName>,
    support: &SwapchainSupport,
) -> Result<QueueFamilies, SuitabilityError> {
    let families = indices
        .resolve()
        .ok_or(SuitabilityError("required queue families"))?;

    if !constants::DEVICE_EXTENSIONS
        .iter()
        .all(|e| extensions.contains(e))
    {
        return Err(SuitabilityError("required device extensions"));
    }

    if support.formats.is_empty() || support.present_modes.is_empty() {
        return Err(SuitabilityError("swapchain formats or present modes"));
    }

    Ok(families)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn usable_support() -> SwapchainSupport {
        SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    fn swapchain_extension() -> HashSet<vk::ExtensionName> {
        constants::DEVICE_EXTENSIONS.iter().copied().collect()
    }

    #[test]
    fn find_aliases_roles_on_one_family() {
        let properties = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::find(&properties, |_| Ok(true)).unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
        assert!(indices.is_complete());
    }

    #[test]
    fn find_splits_roles_across_families() {
        let properties = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::find(&properties, |i| Ok(i == 2)).unwrap();

        assert_eq!(
            indices.resolve(),
            Some(QueueFamilies {
                graphics: 1,
                present: 2
            })
        );
    }

    #[test]
    fn find_keeps_first_qualifying_family() {
        let properties = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let indices = QueueFamilyIndices::find(&properties, |_| Ok(true)).unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
    }

    #[test]
    fn find_stops_querying_once_both_roles_resolve() {
        let properties = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut queried = Vec::new();
        QueueFamilyIndices::find(&properties, |i| {
            queried.push(i);
            Ok(true)
        })
        .unwrap();

        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn find_without_present_support_is_incomplete() {
        let properties = [family(vk::QueueFlags::GRAPHICS)];
        let indices = QueueFamilyIndices::find(&properties, |_| Ok(false)).unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, None);
        assert!(!indices.is_complete());
        assert_eq!(indices.resolve(), None);
    }

    #[test]
    fn find_propagates_surface_query_errors() {
        let properties = [family(vk::QueueFlags::GRAPHICS)];
        let result =
            QueueFamilyIndices::find(&properties, |_| Err(vk::ErrorCode::SURFACE_LOST_KHR));

        assert_eq!(result, Err(vk::ErrorCode::SURFACE_LOST_KHR));
    }

    #[test]
    fn unique_requests_one_queue_per_distinct_family() {
        let same = QueueFamilies {
            graphics: 0,
            present: 0,
        };
        let split = QueueFamilies {
            graphics: 0,
            present: 1,
        };

        assert_eq!(same.unique(), vec![0]);
        assert_eq!(split.unique(), vec![0, 1]);
    }

    #[test]
    fn sharing_is_concurrent_only_when_families_differ() {
        let same = QueueFamilies {
            graphics: 3,
            present: 3,
        };
        let split = QueueFamilies {
            graphics: 0,
            present: 2,
        };

        assert_eq!(same.image_sharing(), (vk::SharingMode::EXCLUSIVE, vec![]));
        assert_eq!(
            split.image_sharing(),
            (vk::SharingMode::CONCURRENT, vec![0, 2])
        );
    }

    #[test]
    fn suitable_device_is_accepted() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(1),
        };

        let families =
            check_suitability(&indices, &swapchain_extension(), &usable_support()).unwrap();
        assert_eq!(
            families,
            QueueFamilies {
                graphics: 0,
                present: 1
            }
        );
    }

    #[test]
    fn device_missing_a_queue_role_is_rejected() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: None,
        };

        let error =
            check_suitability(&indices, &swapchain_extension(), &usable_support()).unwrap_err();
        assert_eq!(error.0, "required queue families");
    }

    #[test]
    fn device_missing_swapchain_extension_is_rejected() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };

        let error = check_suitability(&indices, &HashSet::new(), &usable_support()).unwrap_err();
        assert_eq!(error.0, "required device extensions");
    }

    #[test]
    fn device_without_formats_or_present_modes_is_rejected() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };

        let mut no_formats = usable_support();
        no_formats.formats.clear();
        let mut no_modes = usable_support();
        no_modes.present_modes.clear();

        assert!(check_suitability(&indices, &swapchain_extension(), &no_formats).is_err());
        assert!(check_suitability(&indices, &swapchain_extension(), &no_modes).is_err());
    }

    #[test]
    fn selection_without_devices_reports_missing_gpu() {
        let error = select_first_suitable::<u32, _>(&[], |_| None).unwrap_err();

        assert!(error.to_string().contains("GPU with Vulkan support"));
    }

    #[test]
    fn selection_takes_first_accepted_device_and_stops() {
        let families = QueueFamilies {
            graphics: 0,
            present: 1,
        };
        let mut checked = Vec::new();

        let selected = select_first_suitable(&[10u32, 11, 12], |device| {
            checked.push(device);
            (device != 10).then_some(families)
        })
        .unwrap();

        assert_eq!(selected, (11, families));
        assert_eq!(checked, vec![10, 11]);
    }

    #[test]
    fn selection_fails_when_every_device_is_rejected() {
        let error = select_first_suitable(&[1u32, 2, 3], |_| None).unwrap_err();

        assert!(matches!(error, SetupError::CapabilityMissing(_)));
        assert!(error.to_string().contains("suitable physical device"));
    }
}

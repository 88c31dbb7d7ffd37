use anyhow::Result;
use log::*;
use std::collections::HashSet;
use std::ffi::CStr;
use std::os::raw::c_void;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk;
use vulkanalia::vk::ExtDebugUtilsExtension;
use vulkanalia::vk::Handle;
use vulkanalia::vk::KhrSurfaceExtension;
use vulkanalia::window as vk_window;
use vulkanalia::Entry;
use vulkanalia::Instance;
use winit::window::Window;

use super::constants;
use super::context::VulkanContext;
use super::error::SetupError;

#[derive(Debug)]
pub struct VulkanInstance {
    pub vk_instance: Instance,
}

impl VulkanInstance {
    pub unsafe fn new(
        window: &Window,
        entry: &Entry,
        context: &mut VulkanContext,
    ) -> Result<VulkanInstance> {
        // Application Info
        let application_info = vk::ApplicationInfo::builder()
            .application_name(b"Boreal\0")
            .application_version(vk::make_version(1, 0, 0))
            .engine_name(b"No Engine\0")
            .engine_version(vk::make_version(1, 0, 0))
            .api_version(vk::make_version(1, 0, 0));

        if constants::VALIDATION_ENABLED {
            VulkanInstance::log_available_extensions(entry)?;
        }

        // Layers
        let available_layers = entry
            .enumerate_instance_layer_properties()?
            .iter()
            .map(|l| l.layer_name)
            .collect::<HashSet<_>>();

        if constants::VALIDATION_ENABLED {
            check_layers(&available_layers, &[constants::VALIDATION_LAYER])?;
            info!("Validation layer found ({}).", constants::VALIDATION_LAYER);
        }

        let layers = if constants::VALIDATION_ENABLED {
            vec![constants::VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        // Extensions
        let mut extensions = vk_window::get_required_instance_extensions(window)
            .iter()
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        let flags = if cfg!(target_os = "macos")
            && entry.version()? >= constants::PORTABILITY_MACOS_VERSION
        {
            info!("Enabling extensions for macOS portability.");
            extensions.push(
                vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION
                    .name
                    .as_ptr(),
            );
            extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        if constants::VALIDATION_ENABLED {
            extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
        }

        // Create
        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        let mut debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .user_callback(Some(debug_callback));

        if constants::VALIDATION_ENABLED {
            info = info.push_next(&mut debug_info);
        }

        let instance = entry
            .create_instance(&info, None)
            .map_err(SetupError::creation("instance"))?;
        info!("Created instance.");

        // Messenger
        if constants::VALIDATION_ENABLED {
            match instance.create_debug_utils_messenger_ext(&debug_info, None) {
                Ok(messenger) => context.messenger = messenger,
                Err(code) => {
                    instance.destroy_instance(None);
                    return Err(SetupError::creation("debug messenger")(code).into());
                }
            }
        }

        Ok(VulkanInstance {
            vk_instance: instance,
        })
    }

    unsafe fn log_available_extensions(entry: &Entry) -> Result<()> {
        let names = entry
            .enumerate_instance_extension_properties(None)?
            .iter()
            .map(|e| e.extension_name.to_string())
            .collect::<Vec<_>>();
        debug!("Available instance extensions: {}", names.join(", "));
        Ok(())
    }

    /// Destroys the surface, the messenger and the instance, in that order.
    pub unsafe fn destroy(&mut self, context: &mut VulkanContext) {
        if !context.surface.is_null() {
            self.vk_instance.destroy_surface_khr(context.surface, None);
            context.surface = vk::SurfaceKHR::null();
        }
        if !context.messenger.is_null() {
            self.vk_instance
                .destroy_debug_utils_messenger_ext(context.messenger, None);
            context.messenger = vk::DebugUtilsMessengerEXT::null();
        }
        self.vk_instance.destroy_instance(None);
        info!("Destroyed instance.");
    }
}

/// Fails with the first requested layer that is not available.
pub fn check_layers(
    available: &HashSet<vk::ExtensionName>,
    requested: &[vk::ExtensionName],
) -> Result<(), SetupError> {
    match requested.iter().find(|layer| !available.contains(layer)) {
        Some(layer) => Err(SetupError::CapabilityMissing(format!(
            "validation layer `{}`",
            layer
        ))),
        None => Ok(()),
    }
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut c_void,
) -> vk::Bool32 {
    let data = unsafe { *data };
    let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();

    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({:?}) {}", type_, message);
    } else {
        trace!("({:?}) {}", type_, message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_layers_accepts_available_layer() {
        let available = [constants::VALIDATION_LAYER]
            .into_iter()
            .collect::<HashSet<_>>();
        assert!(check_layers(&available, &[constants::VALIDATION_LAYER]).is_ok());
    }

    #[test]
    fn check_layers_reports_missing_layer() {
        let available = HashSet::new();
        let error = check_layers(&available, &[constants::VALIDATION_LAYER]).unwrap_err();
        assert!(matches!(error, SetupError::CapabilityMissing(_)));
        assert!(error.to_string().contains("VK_LAYER_KHRONOS_validation"));
    }

    #[test]
    fn check_layers_with_nothing_requested() {
        assert!(check_layers(&HashSet::new(), &[]).is_ok());
    }
}

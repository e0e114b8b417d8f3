//! Physical device (GPU) selection.
//!
//! The presenter drives a single queue for both rendering and presentation, so
//! an adapter qualifies only if one of its queue families supports graphics
//! and can present to the target surface. Among qualifying adapters, discrete
//! GPUs are preferred.

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Device extensions every selected adapter must support.
pub const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Capabilities of a single queue family relevant to adapter selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyCaps {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    pub supports_present: bool,
}

impl QueueFamilyCaps {
    #[inline]
    fn is_usable(&self) -> bool {
        self.queue_count > 0
            && self.flags.contains(vk::QueueFlags::GRAPHICS)
            && self.supports_present
    }
}

/// Information about a selected physical device (GPU).
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    /// Family whose queue is used for graphics submission and presentation.
    pub queue_family: u32,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_family", &self.queue_family)
            .finish()
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

/// Selects the most suitable physical device for presenting to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no adapter exposes a queue family
/// supporting both graphics and presentation, or none supports the swapchain
/// extension.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let selected = devices
        .into_iter()
        .filter_map(|device| check_device_suitability(instance, device, surface, surface_loader))
        .map(|info| {
            let score = rate_device_type(info.properties.device_type);
            debug!(
                "GPU '{}' ({}) - Score: {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            (info, score)
        })
        .max_by_key(|(_, score)| *score);

    let Some((selected, score)) = selected else {
        warn!("No GPU exposes a queue family with graphics and present support");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, queue family {}, score {}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        selected.queue_family,
        score
    );

    Ok(selected)
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown".to_string());

    if !supports_device_extensions(instance, device) {
        debug!("GPU '{}' skipped: swapchain extension not supported", name);
        return None;
    }

    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let caps: Vec<QueueFamilyCaps> = families
        .iter()
        .enumerate()
        .map(|(i, family)| QueueFamilyCaps {
            flags: family.queue_flags,
            queue_count: family.queue_count,
            supports_present: unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i as u32, surface)
                    .unwrap_or(false)
            },
        })
        .collect();

    let Some(queue_family) = find_present_queue_family(&caps) else {
        debug!(
            "GPU '{}' skipped: no queue family supports both graphics and present",
            name
        );
        return None;
    };

    Some(PhysicalDeviceInfo {
        device,
        properties,
        queue_family,
    })
}

fn supports_device_extensions(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let Ok(available) = (unsafe { instance.enumerate_device_extension_properties(device) }) else {
        return false;
    };

    DEVICE_EXTENSIONS.iter().all(|required| {
        available
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *required))
    })
}

/// Returns the first queue family that supports graphics and presentation.
pub fn find_present_queue_family(families: &[QueueFamilyCaps]) -> Option<u32> {
    families
        .iter()
        .position(QueueFamilyCaps::is_usable)
        .map(|i| i as u32)
}

/// Higher scores indicate more desirable devices.
fn rate_device_type(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    }
}

//! Vulkan logical device and queue management.
//!
//! The [`Device`] owns the logical device and the single queue used for both
//! command submission and presentation.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{DEVICE_EXTENSIONS, PhysicalDeviceInfo};

/// Vulkan logical device wrapper.
///
/// Shared via `Arc` by every object created from it. Dropping the last
/// reference waits for the device to go idle and destroys it.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue: vk::Queue,
}

impl Device {
    /// Creates a logical device with one queue from the adapter's
    /// graphics+present family and the swapchain extension enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation fails.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_family = physical_device_info.queue_family;
        let queue_priorities = [1.0f32];

        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)];

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            DEVICE_EXTENSIONS.len()
        );

        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        debug!("Graphics/present queue retrieved from family {}", queue_family);

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            queue,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the queue used for submission and presentation.
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Blocks until all outstanding work on the device has completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails (e.g. device lost).
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits command buffers to the queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and recorded
    /// - The fence (if not null) is unsignaled and not in use
    /// - No other thread accesses the queue concurrently
    pub unsafe fn submit(
        &self,
        submit_infos: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device.queue_submit(self.queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send + Sync, the remaining fields are plain handles.
// Queue access is externally synchronized by the `unsafe` submit contract.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

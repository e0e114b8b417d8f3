//! Presentation surface bound to an OS window.

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::debug;

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Vulkan surface created from raw window handles.
///
/// The surface must be dropped before the [`Instance`] it was created from
/// and before the window whose handles it wraps.
pub struct PresentationSurface {
    handle: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
}

impl PresentationSurface {
    /// Creates a surface for the window identified by `display` and `window`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceError`] if the handles are unsupported or
    /// surface creation fails.
    pub fn new(
        instance: &Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> RhiResult<Self> {
        // SAFETY: the handles come from a live window that outlives the surface.
        let handle = unsafe {
            ash_window::create_surface(instance.entry(), instance.handle(), display, window, None)
        }
        .map_err(|e| RhiError::SurfaceError(format!("Failed to create surface: {e}")))?;

        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        debug!("Vulkan surface created");

        Ok(Self {
            handle,
            surface_loader,
        })
    }

    /// Get the raw Vulkan surface handle.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Get a reference to the surface loader.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Queries what `physical_device` supports when presenting to this surface.
    pub fn support(&self, physical_device: vk::PhysicalDevice) -> RhiResult<SurfaceSupport> {
        SurfaceSupport::query(physical_device, self.handle, &self.surface_loader)
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        debug!("Vulkan surface destroyed");
    }
}

/// Surface capabilities, formats and present modes for one adapter.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Surface support: {} formats, {} present modes, image count: {}-{}, current extent {}x{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            },
            capabilities.current_extent.width,
            capabilities.current_extent.height
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

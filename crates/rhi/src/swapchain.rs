//! Swapchain construction, image acquisition and presentation.
//!
//! A [`Swapchain`] is immutable once built. Resizing builds a new one with
//! the old one passed as `previous`; the caller drops the old one afterwards.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::backend::{PresentSwapchain, SwapchainDesc};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::surface::PresentationSurface;

/// Usage every swapchain image is created with.
pub const SWAPCHAIN_IMAGE_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | vk::ImageUsageFlags::TRANSFER_DST.as_raw(),
);

/// A swapchain image together with its color view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainImage {
    image: vk::Image,
    view: vk::ImageView,
}

impl SwapchainImage {
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }
}

/// Vulkan swapchain wrapper.
///
/// Holds the surface it presents to so the surface cannot be destroyed
/// while the swapchain is alive.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<SwapchainImage>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    _surface: Arc<PresentationSurface>,
}

impl Swapchain {
    /// Builds a swapchain for `surface`.
    ///
    /// Requests at least `desc.min_image_count` images (clamped to the
    /// surface limits), the identity-or-current transform, opaque
    /// composition and clipping. `previous`, if any, is passed to the driver
    /// as the old swapchain.
    ///
    /// Returns `Ok(None)` if the surface reports a zero extent.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface has no formats or present modes, offers
    /// no 8-bit BGRA non-linear format, does not support the required image
    /// usage, or creation fails.
    pub fn build(
        device: Arc<Device>,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: Arc<PresentationSurface>,
        desc: &SwapchainDesc,
        previous: Option<&Swapchain>,
    ) -> RhiResult<Option<Self>> {
        let support = surface.support(device.physical_device())?;

        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let extent = choose_extent(&support.capabilities, desc.width, desc.height);
        if extent.width == 0 || extent.height == 0 {
            debug!("Surface has zero extent, skipping swapchain build");
            return Ok(None);
        }

        if !support
            .capabilities
            .supported_usage_flags
            .contains(SWAPCHAIN_IMAGE_USAGE)
        {
            return Err(RhiError::SwapchainError(format!(
                "Surface does not support image usage {:?}",
                SWAPCHAIN_IMAGE_USAGE
            )));
        }

        let surface_format = choose_surface_format(&support.formats, desc.format)?;
        let present_mode = choose_present_mode(&support.present_modes, desc.present_mode);
        let image_count = determine_image_count(&support.capabilities, desc.min_image_count);

        info!(
            "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images requested",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        let old_swapchain = previous.map_or(vk::SwapchainKHR::null(), Swapchain::handle);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(SWAPCHAIN_IMAGE_USAGE)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        let images = match create_images(&device, swapchain_loader, swapchain, surface_format.format)
        {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        info!("Swapchain created with {} images", images.len());

        Ok(Some(Self {
            device,
            swapchain_loader: swapchain_loader.clone(),
            swapchain,
            images,
            format: surface_format,
            extent,
            _surface: surface,
        }))
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// Returns `(image_index, suboptimal)`. Out-of-date and timeout
    /// conditions are returned as the raw `vk::Result`.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout: u64,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Queues `image_index` for presentation after `wait_semaphore` fires.
    ///
    /// Returns true if the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

}

impl PresentSwapchain for Swapchain {
    type RenderTarget = SwapchainImage;

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn format(&self) -> vk::Format {
        self.format.format
    }

    fn render_target(&self, image_index: u32) -> Option<&SwapchainImage> {
        self.images.get(image_index as usize)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        for image in &self.images {
            unsafe {
                self.device.handle().destroy_image_view(image.view, None);
            }
        }

        unsafe {
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Chooses the surface format closest to `preferred`.
///
/// Exact match first, then the sRGB-encoded variant of 8-bit BGRA in the
/// same color space. A single `UNDEFINED` entry means the surface accepts
/// anything.
///
/// # Errors
///
/// Returns [`RhiError::SwapchainError`] if the surface offers neither.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> RhiResult<vk::SurfaceFormatKHR> {
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return Ok(preferred);
    }

    if formats.contains(&preferred) {
        debug!(
            "Selected preferred surface format: {:?} with {:?}",
            preferred.format, preferred.color_space
        );
        return Ok(preferred);
    }

    let alternative = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == preferred.color_space
    });

    match alternative {
        Some(&format) => {
            warn!("Using fallback surface format: B8G8R8A8_SRGB with {:?}", format.color_space);
            Ok(format)
        }
        None => Err(RhiError::SwapchainError(format!(
            "Surface offers no 8-bit BGRA format in {:?} (available: {:?})",
            preferred.color_space,
            formats.iter().map(|f| f.format).collect::<Vec<_>>()
        ))),
    }
}

/// Chooses `preferred` if the surface lists it, FIFO otherwise.
///
/// FIFO is the only mode every surface must support.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if present_modes.contains(&preferred) {
        debug!("Selected {:?} present mode", preferred);
        return preferred;
    }

    warn!("{:?} present mode unavailable, using FIFO", preferred);
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// Uses the surface's current extent when it is defined (not `u32::MAX`);
/// otherwise clamps the requested size to the surface's limits. A zero
/// result means the surface is minimized.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Number of images to request: `requested`, raised to the surface minimum
/// and lowered to the surface maximum (0 means unbounded).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let count = requested.max(capabilities.min_image_count);

    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

fn create_images(
    device: &Device,
    swapchain_loader: &ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
) -> RhiResult<Vec<SwapchainImage>> {
    let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };
    let mut created: Vec<SwapchainImage> = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => created.push(SwapchainImage { image, view }),
            Err(e) => {
                for image in &created {
                    unsafe { device.handle().destroy_image_view(image.view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {}: {:?}",
                    i, e
                )));
            }
        }
    }

    debug!("Created {} image views", created.len());
    Ok(created)
}

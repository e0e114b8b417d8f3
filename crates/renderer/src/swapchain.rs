//! Swapchain ownership and rebuilds.
//!
//! The [`SwapchainManager`] owns the current swapchain and one
//! render-complete signal per swapchain image. Submissions that render into
//! image `i` raise signal `i`, and presenting image `i` waits on it. Tying
//! the signal to the image instead of the frame slot guarantees a signal is
//! never re-raised while a pending present still waits on it, whatever the
//! relation between slot count and image count.

use tracing::{debug, info};

use vkpresent_core::{PresentConfig, PresentMode, SurfaceFormat};
use vkpresent_rhi::{PresentDevice, PresentSwapchain, RhiResult, SwapchainDesc, vk};

/// Builds the swapchain request for a drawable of `width` x `height`.
pub fn swapchain_desc(config: &PresentConfig, width: u32, height: u32) -> SwapchainDesc {
    let format = match config.surface_format {
        SurfaceFormat::Bgra8Unorm => vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
    };
    let present_mode = match config.present_mode {
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
    };

    SwapchainDesc {
        width,
        height,
        min_image_count: config.min_image_count,
        format,
        present_mode,
    }
}

/// Current swapchain plus its per-image render-complete signals.
pub struct SwapchainManager<D: PresentDevice> {
    // Signals before the swapchain: they are released first on drop.
    render_complete: Vec<D::Semaphore>,
    swapchain: Option<D::Swapchain>,
    generation: u64,
}

impl<D: PresentDevice> Default for SwapchainManager<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: PresentDevice> SwapchainManager<D> {
    /// Creates an empty manager. Call [`rebuild`](Self::rebuild) to build
    /// the first swapchain.
    pub fn new() -> Self {
        Self {
            render_complete: Vec::new(),
            swapchain: None,
            generation: 0,
        }
    }

    /// Builds a new swapchain, retiring the current one.
    ///
    /// The current swapchain is passed to the driver as the previous one and
    /// dropped once the new one exists. The per-image signals are recreated
    /// to match the new image count. Returns `Ok(false)` and keeps the
    /// current swapchain if the surface has zero area.
    ///
    /// The caller must guarantee that no submission or present referencing
    /// the current swapchain or its signals is still pending.
    pub fn rebuild(&mut self, device: &D, desc: &SwapchainDesc) -> RhiResult<bool> {
        let Some(swapchain) = device.build_swapchain(desc, self.swapchain.as_ref())? else {
            debug!("Swapchain rebuild deferred: zero-area surface");
            return Ok(false);
        };

        let image_count = swapchain.image_count();
        let signals = (0..image_count)
            .map(|_| device.create_semaphore())
            .collect::<RhiResult<Vec<_>>>()?;

        let previous_images = self.render_complete.len();

        // Old signals go first, then the retired swapchain.
        self.render_complete = signals;
        self.swapchain = Some(swapchain);
        self.generation += 1;

        let extent = self.swapchain.as_ref().map(PresentSwapchain::extent).unwrap_or_default();
        info!(
            "Swapchain generation {}: {}x{}, {} image(s) (was {})",
            self.generation, extent.width, extent.height, image_count, previous_images
        );

        Ok(true)
    }

    #[inline]
    pub fn swapchain(&self) -> Option<&D::Swapchain> {
        self.swapchain.as_ref()
    }

    /// Render-complete signal of image `image_index`.
    #[inline]
    pub fn render_complete(&self, image_index: u32) -> Option<&D::Semaphore> {
        self.render_complete.get(image_index as usize)
    }

    /// Number of per-image signals. Always equals the image count.
    #[inline]
    pub fn signal_count(&self) -> usize {
        self.render_complete.len()
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.as_ref().map_or(0, PresentSwapchain::image_count)
    }

    /// Number of successful builds so far.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.swapchain.as_ref().map(PresentSwapchain::extent)
    }

    /// Drops the swapchain and its signals.
    pub fn release(&mut self) {
        self.render_complete.clear();
        self.swapchain = None;
    }
}

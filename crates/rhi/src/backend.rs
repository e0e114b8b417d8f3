//! Device seam used by the frame protocol.
//!
//! [`PresentDevice`] is the set of GPU operations the presenter needs:
//! signal and marker creation, submission, swapchain construction, image
//! acquisition and presentation. [`DeviceContext`](crate::context::DeviceContext)
//! implements it on Vulkan; tests implement it with an instrumented fake.

use ash::vk;

use crate::error::RhiResult;

/// Parameters for building a swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    /// Drawable width in physical pixels. Used only when the surface leaves
    /// the extent up to the swapchain.
    pub width: u32,
    pub height: u32,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
}

/// Result of asking the swapchain for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired and the acquire signal will fire when it is
    /// ready. `suboptimal` asks for a rebuild once this frame is presented.
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface. Nothing was acquired.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// True if the swapchain should be rebuilt before the next frame.
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// One queue submission.
pub struct SubmitBatch<'a, D: PresentDevice + ?Sized> {
    pub command_buffer: &'a D::CommandBuffer,
    /// Signal waited on before the commands touch the swapchain image.
    pub wait: Option<&'a D::Semaphore>,
    /// Signal raised when the commands complete on the GPU.
    pub signal: Option<&'a D::Semaphore>,
    /// Completion marker raised when the whole batch completes.
    pub fence: Option<&'a D::Fence>,
}

/// Images owned by a built swapchain.
pub trait PresentSwapchain {
    /// What a frame renders into.
    type RenderTarget;

    fn image_count(&self) -> usize;
    fn extent(&self) -> vk::Extent2D;
    fn format(&self) -> vk::Format;
    /// Render target of the image at `image_index`, or `None` if out of range.
    fn render_target(&self, image_index: u32) -> Option<&Self::RenderTarget>;
}

/// GPU operations driven by the presenter.
///
/// All methods take `&self`; the presenter is the only caller and drives
/// them from a single thread.
pub trait PresentDevice {
    type Semaphore;
    type Fence;
    type CommandBuffer;
    type Swapchain: PresentSwapchain;

    fn create_semaphore(&self) -> RhiResult<Self::Semaphore>;

    /// Creates a completion marker, optionally already signaled.
    fn create_fence(&self, signaled: bool) -> RhiResult<Self::Fence>;

    fn create_command_buffer(&self) -> RhiResult<Self::CommandBuffer>;

    /// Blocks until every fence is signaled or `timeout_ns` elapses.
    ///
    /// Returns [`RhiError::Timeout`](crate::RhiError::Timeout) on expiry.
    fn wait_for_fences(&self, fences: &[&Self::Fence], timeout_ns: u64) -> RhiResult<()>;

    /// Returns a signaled fence to the unsignaled state. The fence must not
    /// be pending on any submission.
    fn reset_fence(&self, fence: &Self::Fence) -> RhiResult<()>;

    /// Resets `command_buffer` and begins recording into it.
    fn begin_commands(&self, command_buffer: &Self::CommandBuffer) -> RhiResult<()>;

    fn end_commands(&self, command_buffer: &Self::CommandBuffer) -> RhiResult<()>;

    fn submit(&self, batch: SubmitBatch<'_, Self>) -> RhiResult<()>;

    /// Builds a swapchain for the current surface, handing `previous` to the
    /// driver for resource reuse.
    ///
    /// Returns `Ok(None)` when the surface currently has zero area. The
    /// caller keeps `previous` alive until this call returns and drops it
    /// afterwards.
    fn build_swapchain(
        &self,
        desc: &SwapchainDesc,
        previous: Option<&Self::Swapchain>,
    ) -> RhiResult<Option<Self::Swapchain>>;

    fn acquire_next_image(
        &self,
        swapchain: &Self::Swapchain,
        signal: &Self::Semaphore,
        timeout_ns: u64,
    ) -> RhiResult<AcquireOutcome>;

    /// Queues `image_index` for presentation once `wait` fires.
    fn present(
        &self,
        swapchain: &Self::Swapchain,
        image_index: u32,
        wait: &Self::Semaphore,
    ) -> RhiResult<PresentOutcome>;

    fn wait_idle(&self) -> RhiResult<()>;
}

//! Per-frame state visible to the caller.

use vkpresent_rhi::{PresentDevice, PresentSwapchain, vk};

/// Phase of the presenter's frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames.
    Idle,
    /// Waiting for the current slot's previous submission to complete.
    WaitSlot,
    /// Asking the swapchain for an image.
    Acquire,
    /// An image is acquired and the caller is recording into the slot.
    Recording { slot: usize, image_index: u32 },
    /// Submitting the recorded commands.
    Submit,
    /// Queueing the image for presentation.
    Present,
    /// Draining in-flight frames and rebuilding the swapchain.
    ResizeRequested,
    /// The drawable has zero area; ticks are skipped.
    Minimized,
    /// Quit was requested; no further frames are produced.
    Stopped,
}

impl FrameState {
    /// True in the states a new frame may start from.
    pub fn can_begin_frame(self) -> bool {
        matches!(self, FrameState::Idle | FrameState::Minimized)
    }
}

/// A frame that has acquired a swapchain image and is ready for recording.
///
/// Record into `command_buffer`, targeting `target`, then hand the frame
/// back with [`Presenter::submit_frame`](crate::Presenter::submit_frame).
pub struct AcquiredFrame<'a, D: PresentDevice> {
    pub command_buffer: &'a D::CommandBuffer,
    pub target: &'a <D::Swapchain as PresentSwapchain>::RenderTarget,
    pub image_index: u32,
    /// Frame slot this frame runs in.
    pub slot: usize,
    pub extent: vk::Extent2D,
}

/// Counters reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub swapchain_rebuilds: u64,
    /// Ticks skipped because the surface had zero area or the swapchain was
    /// out of date at acquire time.
    pub skipped_ticks: u64,
}

//! Frame pacing and presentation.
//!
//! This crate runs the frames-in-flight loop on top of any
//! [`PresentDevice`](vkpresent_rhi::PresentDevice):
//! - [`FrameSynchronizer`]: N reusable frame slots
//! - [`SwapchainManager`]: the swapchain and its per-image signals
//! - [`Presenter`]: the state machine tying them together

pub mod frame;
pub mod frame_sync;
pub mod presenter;
pub mod swapchain;
pub mod vulkan;

pub use frame::{AcquiredFrame, FrameState, FrameStats};
pub use frame_sync::{FrameSlot, FrameSynchronizer};
pub use presenter::Presenter;
pub use swapchain::{SwapchainManager, swapchain_desc};
pub use vulkan::{VulkanPresenter, create_presenter};

//! Synchronization primitives for Vulkan.
//!
//! - [`Semaphore`] - GPU-to-GPU synchronization (acquire -> render -> present)
//! - [`Fence`] - GPU-to-CPU synchronization (host waits on frame completion)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkpresent_rhi::device::Device;
//! use vkpresent_rhi::sync::{Fence, Semaphore};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkpresent_rhi::RhiError> {
//! let image_acquired = Semaphore::new(device.clone())?;
//!
//! // Signaled initially so the first wait returns immediately
//! let frame_complete = Fence::new(device.clone(), true)?;
//!
//! vkpresent_rhi::sync::wait_for_fences(&device, &[&frame_complete], 1_000_000_000)?;
//! frame_complete.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::trace;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan binary semaphore wrapper.
///
/// Used for the image-acquired signal of each frame slot and the
/// render-complete signal of each swapchain image.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        trace!("Created semaphore {:?}", semaphore);

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        trace!("Destroyed semaphore {:?}", self.semaphore);
    }
}

/// Vulkan fence wrapper.
///
/// Each frame slot owns one fence, signaled by the GPU when that slot's
/// submission completes.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - If true, creates the fence in the signaled state so the
    ///   first wait on it does not block.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        trace!(
            "Created fence {:?} ({})",
            fence,
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be pending on any queue submission.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
        trace!("Destroyed fence {:?}", self.fence);
    }
}

/// Waits until every fence in `fences` is signaled.
///
/// # Errors
///
/// Returns [`RhiError::Timeout`] if `timeout` nanoseconds elapse first.
pub fn wait_for_fences(device: &Device, fences: &[&Fence], timeout: u64) -> RhiResult<()> {
    if fences.is_empty() {
        return Ok(());
    }

    let handles: Vec<vk::Fence> = fences.iter().map(|f| f.handle()).collect();
    match unsafe { device.handle().wait_for_fences(&handles, true, timeout) } {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(RhiError::Timeout(format!(
            "{} fence(s) after {} ms",
            handles.len(),
            timeout / 1_000_000
        ))),
        Err(e) => Err(e.into()),
    }
}

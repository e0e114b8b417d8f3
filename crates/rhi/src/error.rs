//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
///
/// Out-of-date and suboptimal swapchain conditions are not errors; they are
/// reported through [`AcquireOutcome`](crate::backend::AcquireOutcome) and
/// [`PresentOutcome`](crate::backend::PresentOutcome) instead.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// No adapter with a queue family that supports both graphics and presentation
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// A GPU wait exceeded the configured hard timeout
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// The frame protocol was driven out of order
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

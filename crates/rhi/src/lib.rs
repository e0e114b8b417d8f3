//! Vulkan abstraction layer (Render Hardware Interface) for presentation.
//!
//! This crate provides a safe abstraction over the parts of Vulkan a
//! presenter needs, using the `ash` crate:
//! - Instance creation with validation routed to a [`DiagnosticSink`]
//! - Adapter selection and logical device creation
//! - Presentation surface and swapchain management
//! - Command buffer recording and synchronization primitives
//! - The [`PresentDevice`] seam implemented by [`DeviceContext`]

mod error;

pub mod backend;
pub mod command;
pub mod context;
pub mod device;
pub mod diagnostics;
pub mod instance;
pub mod physical_device;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use backend::{
    AcquireOutcome, PresentDevice, PresentOutcome, PresentSwapchain, SubmitBatch, SwapchainDesc,
};
pub use context::DeviceContext;
pub use diagnostics::{DiagnosticSink, Severity, TracingSink};
pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;

//! Presenter wired to the Vulkan device context.

use std::sync::Arc;

use vkpresent_core::PresentConfig;
use vkpresent_platform::Window;
use vkpresent_rhi::{DeviceContext, DiagnosticSink, RhiError, RhiResult};

use crate::presenter::Presenter;

/// A presenter driving a real Vulkan device.
pub type VulkanPresenter = Presenter<DeviceContext>;

/// Creates the device context for `window` and a presenter on top of it.
///
/// The window must outlive the returned presenter.
pub fn create_presenter(
    window: &Window,
    config: &PresentConfig,
    sink: Arc<dyn DiagnosticSink>,
) -> RhiResult<VulkanPresenter> {
    let (display, handle) = window
        .raw_handles()
        .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

    let context = DeviceContext::new(display, handle, config.enable_validation, sink)?;

    Presenter::new(context, config.clone(), window.drawable_size())
}

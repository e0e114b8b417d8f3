//! Window management using winit.
//!
//! The window owns the OS drawable the presentation surface is bound to. It
//! tracks the drawable size in physical pixels; a size of 0x0 means the window
//! is minimized and nothing should be presented.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vkpresent_core::{Error, Result};

/// A window wrapper that provides access to the underlying winit window
/// and raw handles for Vulkan surface creation.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Create a new resizable window with the given dimensions and title.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        // The compositor may have picked a different size than requested.
        let size = window.inner_size();
        tracing::info!("Window created: {}x{}", size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
        })
    }

    /// Last known drawable size in physical pixels.
    pub fn drawable_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Re-read the drawable size from the OS. Some platforms stop sending
    /// resize events while the window is minimized, so the frame loop polls
    /// this every tick.
    pub fn poll_drawable_size(&mut self) -> (u32, u32) {
        let size = self.window.inner_size();
        self.width = size.width;
        self.height = size.height;
        (self.width, self.height)
    }

    /// Update the stored dimensions (call this when handling resize events).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Raw display and window handles for Vulkan surface creation.
    ///
    /// The handles are valid for as long as this window is alive; the
    /// presentation surface created from them must be destroyed first.
    pub fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle)> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        Ok((display_handle.as_raw(), window_handle.as_raw()))
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        tracing::debug!("Window destroyed");
    }
}

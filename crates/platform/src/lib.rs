//! Platform abstraction layer for the presentation subsystem.
//!
//! This crate provides the windowing side the presenter consumes:
//! - Window management via winit
//! - Translation of window events into [`SurfaceEvent`]s
//! - Raw window handles for Vulkan surface creation

mod event;
mod window;

pub use event::{SurfaceEvent, SurfaceEventTranslator};
pub use window::Window;

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;

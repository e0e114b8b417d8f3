//! Structured window events consumed by the presenter.

use winit::event::WindowEvent;

/// Window state changes the presenter reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The drawable changed to a new non-zero size.
    Resize { width: u32, height: u32 },
    /// The drawable has no visible area; presentation must stop.
    Minimize,
    /// The drawable became visible again with the given size.
    Restore { width: u32, height: u32 },
    /// The user asked to close the window.
    Quit,
}

/// Turns raw winit window events into [`SurfaceEvent`]s.
///
/// winit has no dedicated minimize event: minimization shows up as a resize
/// to 0x0 on some platforms and as an occlusion change on others. The
/// translator remembers whether the window is currently minimized so it can
/// report the matching restore.
#[derive(Debug, Default)]
pub struct SurfaceEventTranslator {
    minimized: bool,
    width: u32,
    height: u32,
}

impl SurfaceEventTranslator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            minimized: width == 0 || height == 0,
            width,
            height,
        }
    }

    /// Translates one window event, returning `None` for events the presenter ignores.
    pub fn translate(&mut self, event: &WindowEvent) -> Option<SurfaceEvent> {
        match event {
            WindowEvent::CloseRequested => Some(SurfaceEvent::Quit),
            WindowEvent::Resized(size) => self.observe_size(size.width, size.height),
            WindowEvent::Occluded(true) => {
                if self.minimized {
                    None
                } else {
                    self.minimized = true;
                    Some(SurfaceEvent::Minimize)
                }
            }
            WindowEvent::Occluded(false) => {
                if self.minimized && self.width > 0 && self.height > 0 {
                    self.minimized = false;
                    Some(SurfaceEvent::Restore {
                        width: self.width,
                        height: self.height,
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Reports a drawable size observed outside the event stream, e.g. by
    /// polling the window. Unchanged sizes produce no event.
    pub fn observe_size(&mut self, width: u32, height: u32) -> Option<SurfaceEvent> {
        let unchanged = width == self.width && height == self.height;
        self.width = width;
        self.height = height;

        if width == 0 || height == 0 {
            if self.minimized {
                return None;
            }
            self.minimized = true;
            return Some(SurfaceEvent::Minimize);
        }

        if self.minimized {
            self.minimized = false;
            return Some(SurfaceEvent::Restore { width, height });
        }

        if unchanged {
            None
        } else {
            Some(SurfaceEvent::Resize { width, height })
        }
    }
}

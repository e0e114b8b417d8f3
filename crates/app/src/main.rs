//! vkpresent demo
//!
//! Opens a window and presents a solid color through the frame loop until the
//! window is closed. Resizing and minimizing exercise swapchain rebuilds and
//! skipped ticks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use vkpresent_core::{PresentConfig, Timer};
use vkpresent_platform::{SurfaceEvent, SurfaceEventTranslator, Window};
use vkpresent_renderer::{VulkanPresenter, create_presenter};
use vkpresent_rhi::TracingSink;

const CLEAR_COLOR: [f32; 4] = [0.4, 0.1, 0.6, 1.0];

const FPS_INTERVAL: Duration = Duration::from_secs(5);

struct App {
    config: PresentConfig,
    sink: Arc<TracingSink>,
    // Presenter before window: the surface must go before the OS window.
    presenter: Option<VulkanPresenter>,
    window: Option<Window>,
    translator: SurfaceEventTranslator,
    timer: Timer,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: PresentConfig) -> Self {
        let translator = SurfaceEventTranslator::new(config.width, config.height);
        Self {
            config,
            sink: Arc::new(TracingSink::new()),
            presenter: None,
            window: None,
            translator,
            timer: Timer::new(),
            fatal: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(
            event_loop,
            self.config.width,
            self.config.height,
            &self.config.title,
        )?;
        let (width, height) = window.drawable_size();
        self.translator = SurfaceEventTranslator::new(width, height);

        let presenter = create_presenter(&window, &self.config, self.sink.clone())?;
        info!(
            "Initialization complete on '{}', entering main loop",
            presenter.device().adapter().device_name()
        );

        self.presenter = Some(presenter);
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("Fatal: {:#}", err);
        self.fatal.get_or_insert(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        // Drains the GPU and releases every Vulkan object.
        self.presenter = None;
        self.window = None;
        event_loop.exit();
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(presenter), Some(window)) = (self.presenter.as_mut(), self.window.as_mut())
        else {
            return Ok(());
        };

        // Minimized windows may stop delivering resize events.
        let (width, height) = window.poll_drawable_size();
        if let Some(surface_event) = self.translator.observe_size(width, height) {
            debug!("Polled surface event: {:?}", surface_event);
            presenter.handle_event(surface_event)?;
        }

        let presented = presenter.render_frame(|frame| {
            frame
                .command_buffer
                .clear_swapchain_image(frame.target.image(), CLEAR_COLOR);
            Ok(())
        })?;

        if self.config.strict_validation && self.sink.error_count() > 0 {
            return Err(anyhow!(
                "{} validation error(s) reported with strict validation enabled",
                self.sink.error_count()
            ));
        }

        if presented {
            self.timer.tick();
            if let Some(fps) = self.timer.fps_every(FPS_INTERVAL) {
                info!("{:.1} fps ({} frames)", fps, self.timer.total_frames());
            }
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none()
            && self.fatal.is_none()
            && let Err(e) = self.init(event_loop)
        {
            self.fail(event_loop, e.context("failed to initialize presenter"));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::Resized(size) = &event
            && let Some(window) = self.window.as_mut()
        {
            window.resize(size.width, size.height);
        }

        if let Some(surface_event) = self.translator.translate(&event) {
            debug!("Surface event: {:?}", surface_event);
            if let Some(presenter) = self.presenter.as_mut()
                && let Err(e) = presenter.handle_event(surface_event)
            {
                self.fail(event_loop, e.into());
                return;
            }
            if surface_event == SurfaceEvent::Quit {
                info!("Close requested, shutting down");
                self.shutdown(event_loop);
                return;
            }
        }

        if let WindowEvent::RedrawRequested = event
            && let Err(e) = self.redraw()
        {
            self.fail(event_loop, e.context("frame failed"));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    vkpresent_core::init_logging();

    let config = PresentConfig::from_env()?;
    info!(
        "Starting vkpresent: {} frame(s) in flight, {:?}, validation {}",
        config.frames_in_flight,
        config.present_mode,
        if config.enable_validation { "on" } else { "off" }
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    info!(
        "Exited with {} validation error(s), {} warning(s)",
        app.sink.error_count(),
        app.sink.warning_count()
    );

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

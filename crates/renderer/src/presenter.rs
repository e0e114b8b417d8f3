//! The frame loop state machine.
//!
//! Each tick runs:
//!
//! ```text
//! WaitSlot -> Acquire -> (rearm) -> Recording -> Submit -> Present -> Idle
//! ```
//!
//! 1. Wait for the current slot's completion marker.
//! 2. Acquire the next swapchain image, raising the slot's acquire signal.
//! 3. Reset the slot's marker. This happens only after an image was
//!    acquired, so a tick that bails out never leaves an unsignaled marker.
//! 4. The caller records into the slot's command buffer.
//! 5. Submit: wait on the acquire signal, raise the image's render-complete
//!    signal, raise the slot's marker.
//! 6. Present the image once its render-complete signal fires.
//! 7. Advance `current = (current + 1) % N`.
//!
//! Resize requests are latched and serviced at the top of the next tick,
//! after draining every in-flight frame. A zero-area drawable skips ticks
//! without touching the swapchain.

use tracing::{debug, error, info, trace};

use vkpresent_core::PresentConfig;
use vkpresent_platform::SurfaceEvent;
use vkpresent_rhi::{
    AcquireOutcome, PresentDevice, PresentOutcome, PresentSwapchain, RhiError, RhiResult,
    SubmitBatch, vk,
};

use crate::frame::{AcquiredFrame, FrameState, FrameStats};
use crate::frame_sync::FrameSynchronizer;
use crate::swapchain::{SwapchainManager, swapchain_desc};

/// Drives frames through a [`PresentDevice`].
///
/// Fields drop in declaration order after [`Drop`] has drained the GPU:
/// swapchain and per-image signals, then frame slots, then the device.
pub struct Presenter<D: PresentDevice> {
    swapchains: SwapchainManager<D>,
    frames: FrameSynchronizer<D>,
    device: D,
    config: PresentConfig,
    state: FrameState,
    resize_requested: bool,
    minimized: bool,
    drawable: (u32, u32),
    stats: FrameStats,
}

impl<D: PresentDevice> Presenter<D> {
    /// Creates the frame slots and, if the drawable has area, the first
    /// swapchain.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidState`] for a zero slot count, or any
    /// device error raised while creating slots or the swapchain.
    pub fn new(device: D, config: PresentConfig, drawable: (u32, u32)) -> RhiResult<Self> {
        let frames =
            FrameSynchronizer::new(&device, config.frames_in_flight, config.gpu_timeout_ns())?;

        let mut presenter = Self {
            swapchains: SwapchainManager::new(),
            frames,
            device,
            config,
            state: FrameState::Idle,
            resize_requested: true,
            minimized: false,
            drawable,
            stats: FrameStats::default(),
        };

        if presenter.has_area() {
            presenter.rebuild()?;
        } else {
            presenter.enter(FrameState::Minimized);
        }

        info!(
            "Presenter ready: {} frame slot(s), {} swapchain image(s)",
            presenter.frames.slot_count(),
            presenter.swapchains.image_count()
        );

        Ok(presenter)
    }

    /// Applies a surface event.
    ///
    /// Resize and restore latch a rebuild for the next tick. Minimize stops
    /// frame production until a restore. Quit drains the GPU and stops the
    /// presenter for good.
    pub fn handle_event(&mut self, event: SurfaceEvent) -> RhiResult<()> {
        match event {
            SurfaceEvent::Resize { width, height } | SurfaceEvent::Restore { width, height } => {
                self.drawable = (width, height);
                if self.has_area() {
                    self.minimized = false;
                    self.request_resize();
                    if self.state == FrameState::Minimized {
                        self.enter(FrameState::Idle);
                    }
                } else {
                    self.minimized = true;
                }
            }
            SurfaceEvent::Minimize => {
                self.minimized = true;
            }
            SurfaceEvent::Quit => self.stop()?,
        }
        Ok(())
    }

    /// Latches a swapchain rebuild for the top of the next tick.
    pub fn request_resize(&mut self) {
        if !self.resize_requested {
            debug!("Swapchain rebuild requested");
        }
        self.resize_requested = true;
    }

    /// Starts a frame.
    ///
    /// Returns `Ok(None)` when this tick produces no frame: the drawable has
    /// zero area, the swapchain was out of date at acquire time, or the
    /// presenter was stopped.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidState`] if the previous frame was not
    /// submitted, [`RhiError::Timeout`] if a GPU wait expires, or any device
    /// error. All errors are fatal to the presenter.
    pub fn begin_frame(&mut self) -> RhiResult<Option<AcquiredFrame<'_, D>>> {
        if self.state == FrameState::Stopped {
            return Ok(None);
        }
        if !self.state.can_begin_frame() {
            return Err(RhiError::InvalidState(format!(
                "begin_frame called while {:?}",
                self.state
            )));
        }

        if self.minimized || !self.has_area() {
            self.skip_tick(FrameState::Minimized);
            return Ok(None);
        }

        if (self.resize_requested || self.swapchains.swapchain().is_none()) && !self.rebuild()? {
            self.skip_tick(FrameState::Minimized);
            return Ok(None);
        }

        self.enter(FrameState::WaitSlot);
        self.frames.wait_current(&self.device)?;

        self.enter(FrameState::Acquire);
        let outcome = {
            let swapchain = self.current_swapchain()?;
            self.device.acquire_next_image(
                swapchain,
                self.frames.current().image_acquired(),
                self.config.gpu_timeout_ns(),
            )?
        };

        let image_index = match outcome {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    debug!("Acquired image {} from a suboptimal swapchain", image_index);
                    self.request_resize();
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date at acquire");
                self.request_resize();
                self.skip_tick(FrameState::Idle);
                return Ok(None);
            }
        };

        self.frames.rearm_current(&self.device)?;
        self.device
            .begin_commands(self.frames.current().command_buffer())?;

        let slot = self.frames.current_index();
        self.enter(FrameState::Recording { slot, image_index });

        let swapchain = self.current_swapchain()?;
        let target = swapchain.render_target(image_index).ok_or_else(|| {
            RhiError::InvalidState(format!(
                "acquired image {} out of range ({} images)",
                image_index,
                swapchain.image_count()
            ))
        })?;

        Ok(Some(AcquiredFrame {
            command_buffer: self.frames.current().command_buffer(),
            target,
            image_index,
            slot,
            extent: swapchain.extent(),
        }))
    }

    /// Submits the frame started by [`begin_frame`](Self::begin_frame) and
    /// presents it, then advances to the next slot.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidState`] if no frame is being recorded, or
    /// any device error.
    pub fn submit_frame(&mut self) -> RhiResult<()> {
        let FrameState::Recording { slot, image_index } = self.state else {
            return Err(RhiError::InvalidState(format!(
                "submit_frame called while {:?}",
                self.state
            )));
        };

        self.enter(FrameState::Submit);
        {
            let frame = self.frames.current();
            let signal = self.render_complete(image_index)?;

            self.device.end_commands(frame.command_buffer())?;
            self.device.submit(SubmitBatch {
                command_buffer: frame.command_buffer(),
                wait: Some(frame.image_acquired()),
                signal: Some(signal),
                fence: Some(frame.frame_complete()),
            })?;
        }
        self.frames.mark_submitted()?;

        self.enter(FrameState::Present);
        let outcome = {
            let swapchain = self.current_swapchain()?;
            let signal = self.render_complete(image_index)?;
            self.device.present(swapchain, image_index, signal)?
        };

        if outcome != PresentOutcome::OutOfDate {
            self.stats.frames_presented += 1;
        }
        if outcome.needs_rebuild() {
            debug!("Present reported {:?}", outcome);
            self.request_resize();
        }

        trace!("Frame submitted on slot {}, image {}", slot, image_index);

        self.frames.advance();
        self.enter(FrameState::Idle);
        Ok(())
    }

    /// Runs one tick: begin a frame, let `record` fill the command buffer,
    /// submit and present. Returns whether a frame was presented.
    ///
    /// # Errors
    ///
    /// Any error from [`begin_frame`](Self::begin_frame) or
    /// [`submit_frame`](Self::submit_frame), or the error returned by
    /// `record`. A failed `record` leaves the frame unsubmitted: the
    /// presenter stays in [`FrameState::Recording`] with the slot's marker
    /// reset and its acquire signal raised, so every later `begin_frame` and
    /// `rebuild` returns [`RhiError::InvalidState`]. Treat it as fatal and
    /// drop the presenter.
    pub fn render_frame<F>(&mut self, record: F) -> RhiResult<bool>
    where
        F: FnOnce(&AcquiredFrame<'_, D>) -> RhiResult<()>,
    {
        let Some(frame) = self.begin_frame()? else {
            return Ok(false);
        };
        record(&frame)?;
        self.submit_frame()?;
        Ok(true)
    }

    /// Drains every in-flight frame and rebuilds the swapchain now.
    ///
    /// Returns `Ok(false)` if the surface has zero area; the rebuild stays
    /// latched. On success the slot cycle restarts at 0.
    pub fn rebuild(&mut self) -> RhiResult<bool> {
        if !self.state.can_begin_frame() {
            return Err(RhiError::InvalidState(format!(
                "swapchain rebuild requested while {:?}",
                self.state
            )));
        }

        self.enter(FrameState::ResizeRequested);
        self.drain()?;

        let desc = swapchain_desc(&self.config, self.drawable.0, self.drawable.1);
        let built = self.swapchains.rebuild(&self.device, &desc)?;
        if built {
            self.frames.reset_cycle();
            self.resize_requested = false;
        }

        self.enter(FrameState::Idle);
        Ok(built)
    }

    /// Waits for every submitted frame and for the device to go idle.
    pub fn drain(&mut self) -> RhiResult<()> {
        self.frames.wait_all(&self.device)?;
        self.device.wait_idle()
    }

    /// Drains the GPU and stops producing frames.
    pub fn stop(&mut self) -> RhiResult<()> {
        if self.state == FrameState::Stopped {
            return Ok(());
        }
        self.drain()?;
        self.enter(FrameState::Stopped);
        info!("Presenter stopped");
        Ok(())
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Extent of the current swapchain, or `None` while minimized or before
    /// the first successful build.
    pub fn current_extent(&self) -> Option<vk::Extent2D> {
        if self.minimized || !self.has_area() {
            return None;
        }
        self.swapchains.extent()
    }

    #[inline]
    pub fn is_resize_pending(&self) -> bool {
        self.resize_requested
    }

    /// Number of frame slots (N).
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames.slot_count()
    }

    /// Slot the next frame will use.
    #[inline]
    pub fn current_slot(&self) -> usize {
        self.frames.current_index()
    }

    /// Submitted frames not yet observed complete.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.frames.in_flight()
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchains.image_count()
    }

    /// Number of per-image render-complete signals.
    #[inline]
    pub fn signal_count(&self) -> usize {
        self.swapchains.signal_count()
    }

    /// Number of swapchains built so far.
    #[inline]
    pub fn swapchain_generation(&self) -> u64 {
        self.swapchains.generation()
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            swapchain_rebuilds: self.swapchains.generation().saturating_sub(1),
            ..self.stats
        }
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    fn has_area(&self) -> bool {
        self.drawable.0 > 0 && self.drawable.1 > 0
    }

    fn current_swapchain(&self) -> RhiResult<&D::Swapchain> {
        self.swapchains
            .swapchain()
            .ok_or_else(|| RhiError::InvalidState("no swapchain".to_string()))
    }

    fn render_complete(&self, image_index: u32) -> RhiResult<&D::Semaphore> {
        self.swapchains.render_complete(image_index).ok_or_else(|| {
            RhiError::InvalidState(format!("no render-complete signal for image {image_index}"))
        })
    }

    fn skip_tick(&mut self, next: FrameState) {
        self.stats.skipped_ticks += 1;
        self.enter(next);
    }

    fn enter(&mut self, next: FrameState) {
        if self.state != next {
            trace!("Presenter {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

impl<D: PresentDevice> Drop for Presenter<D> {
    fn drop(&mut self) {
        if let Err(e) = self.drain() {
            error!("Failed to drain in-flight frames during teardown: {}", e);
        }

        let stats = self.stats();
        info!(
            "Presenter shut down: {} frame(s) presented, {} swapchain rebuild(s), {} skipped tick(s)",
            stats.frames_presented, stats.swapchain_rebuilds, stats.skipped_ticks
        );

        self.swapchains.release();
    }
}

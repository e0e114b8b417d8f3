//! Frame slots and the bounded frames-in-flight protocol.
//!
//! A [`FrameSynchronizer`] owns N frame slots. Each slot holds the signal the
//! swapchain raises when an image is acquired, the marker the GPU raises when
//! the slot's submission completes, and the command buffer the slot records
//! into. Slot `current` may be reused only after its marker has been observed
//! signaled, which bounds the number of unfinished submissions to N.
//!
//! ```text
//! Ready --rearm--> Armed --submit--> InFlight --wait--> Ready
//! ```

use tracing::{debug, trace};

use vkpresent_rhi::{PresentDevice, RhiError, RhiResult};

/// Where a slot is in its reuse cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// Marker signaled (or never used) and observed; resources reusable.
    Ready,
    /// Marker reset, waiting for the submission that will signal it.
    Armed,
    /// Submitted; the GPU may still be using the slot's resources.
    InFlight,
}

/// Per-slot synchronization objects and recording context.
pub struct FrameSlot<D: PresentDevice> {
    image_acquired: D::Semaphore,
    frame_complete: D::Fence,
    command_buffer: D::CommandBuffer,
    state: SlotState,
}

impl<D: PresentDevice> FrameSlot<D> {
    fn new(device: &D) -> RhiResult<Self> {
        Ok(Self {
            image_acquired: device.create_semaphore()?,
            // Signaled so the first wait on a fresh slot returns immediately
            frame_complete: device.create_fence(true)?,
            command_buffer: device.create_command_buffer()?,
            state: SlotState::Ready,
        })
    }

    #[inline]
    pub fn image_acquired(&self) -> &D::Semaphore {
        &self.image_acquired
    }

    #[inline]
    pub fn frame_complete(&self) -> &D::Fence {
        &self.frame_complete
    }

    #[inline]
    pub fn command_buffer(&self) -> &D::CommandBuffer {
        &self.command_buffer
    }
}

/// Ring of N frame slots with a current index.
pub struct FrameSynchronizer<D: PresentDevice> {
    slots: Vec<FrameSlot<D>>,
    current: usize,
    timeout_ns: u64,
}

impl<D: PresentDevice> FrameSynchronizer<D> {
    /// Creates `frames_in_flight` slots, each with a pre-signaled marker.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidState`] if `frames_in_flight` is zero, or
    /// any creation error from the device.
    pub fn new(device: &D, frames_in_flight: usize, timeout_ns: u64) -> RhiResult<Self> {
        if frames_in_flight == 0 {
            return Err(RhiError::InvalidState(
                "at least one frame slot is required".to_string(),
            ));
        }

        let slots = (0..frames_in_flight)
            .map(|_| FrameSlot::new(device))
            .collect::<RhiResult<Vec<_>>>()?;

        debug!("Created {} frame slot(s)", frames_in_flight);

        Ok(Self {
            slots,
            current: 0,
            timeout_ns,
        })
    }

    /// Number of slots (N).
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Index of the slot the next frame uses.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn current(&self) -> &FrameSlot<D> {
        &self.slots[self.current]
    }

    /// Number of slots whose submission has not been observed complete.
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::InFlight)
            .count()
    }

    /// Blocks until the current slot's marker is signaled.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::Timeout`] if the GPU does not finish the slot's
    /// previous submission within the configured timeout.
    pub fn wait_current(&mut self, device: &D) -> RhiResult<()> {
        let index = self.current;
        let slot = &mut self.slots[index];

        if slot.state == SlotState::Armed {
            return Err(RhiError::InvalidState(format!(
                "frame slot {index} was rearmed but never submitted"
            )));
        }

        device
            .wait_for_fences(&[&slot.frame_complete], self.timeout_ns)
            .map_err(|e| match e {
                RhiError::Timeout(what) => RhiError::Timeout(format!("frame slot {index}: {what}")),
                other => other,
            })?;

        slot.state = SlotState::Ready;
        trace!("Frame slot {} ready", index);
        Ok(())
    }

    /// Resets the current slot's marker ahead of the submission that will
    /// signal it. The slot must be `Ready`.
    pub fn rearm_current(&mut self, device: &D) -> RhiResult<()> {
        let index = self.current;
        let slot = &mut self.slots[index];

        if slot.state != SlotState::Ready {
            return Err(RhiError::InvalidState(format!(
                "frame slot {index} rearmed while {:?}",
                slot.state
            )));
        }

        device.reset_fence(&slot.frame_complete)?;
        slot.state = SlotState::Armed;
        Ok(())
    }

    /// Records that the current slot's marker was handed to a submission.
    pub fn mark_submitted(&mut self) -> RhiResult<()> {
        let index = self.current;
        let slot = &mut self.slots[index];

        if slot.state != SlotState::Armed {
            return Err(RhiError::InvalidState(format!(
                "frame slot {index} submitted while {:?}",
                slot.state
            )));
        }

        slot.state = SlotState::InFlight;
        Ok(())
    }

    /// Moves to the next slot: `current = (current + 1) % N`.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Restarts the cycle at slot 0.
    pub fn reset_cycle(&mut self) {
        self.current = 0;
    }

    /// Blocks until every slot's marker that will ever be signaled is
    /// signaled, leaving all such slots `Ready`.
    ///
    /// Armed slots are skipped: their marker was reset and no submission
    /// will signal it. They stay armed.
    pub fn wait_all(&mut self, device: &D) -> RhiResult<()> {
        let fences: Vec<&D::Fence> = self
            .slots
            .iter()
            .filter(|slot| slot.state != SlotState::Armed)
            .map(|slot| &slot.frame_complete)
            .collect();

        device.wait_for_fences(&fences, self.timeout_ns)?;

        for slot in &mut self.slots {
            if slot.state == SlotState::InFlight {
                slot.state = SlotState::Ready;
            }
        }

        trace!("All frame slots drained");
        Ok(())
    }
}

//! Instrumented in-memory [`PresentDevice`] for driving the presenter
//! without a GPU.
//!
//! The fake models fence and semaphore state closely enough to flag protocol
//! violations: resetting a pending fence, submitting with a fence that was
//! not reset, raising a semaphore that is already raised, rebuilding while
//! work is in flight, or touching a retired swapchain. GPU work completes
//! when a fence wait observes it, unless the device is marked hung.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use vkpresent_core::PresentConfig;
use vkpresent_rhi::{
    AcquireOutcome, PresentDevice, PresentOutcome, PresentSwapchain, RhiError, RhiResult,
    SubmitBatch, SwapchainDesc, vk,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateSemaphore(u32),
    CreateFence { id: u32, signaled: bool },
    CreateCommandBuffer(u32),
    WaitFences(Vec<u32>),
    ResetFence(u32),
    BeginCommands(u32),
    EndCommands(u32),
    Submit {
        command_buffer: u32,
        wait: Option<u32>,
        signal: Option<u32>,
        fence: Option<u32>,
    },
    BuildSwapchain {
        id: Option<u32>,
        previous: Option<u32>,
    },
    Acquire {
        swapchain: u32,
        semaphore: u32,
        outcome: AcquireOutcome,
    },
    Present {
        swapchain: u32,
        image_index: u32,
        wait: u32,
    },
    WaitIdle,
    DestroySemaphore(u32),
    DestroyFence(u32),
    DestroySwapchain(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
    Pending,
}

#[derive(Debug, Default)]
pub struct DeviceState {
    pub calls: Vec<Call>,
    pub violations: Vec<String>,
    pub fences: HashMap<u32, FenceState>,
    /// Live semaphores and whether each is currently raised.
    pub semaphores: HashMap<u32, bool>,
    pub live_swapchains: Vec<u32>,
    pub retired_swapchains: Vec<u32>,
    pub max_in_flight: usize,
    /// Frames-in-flight bound checked on every submit.
    pub flight_limit: usize,
    /// Image counts handed out by successive builds; the default is used
    /// once the queue is empty.
    pub image_counts: VecDeque<usize>,
    pub default_image_count: usize,
    pub surface_extent: vk::Extent2D,
    pub acquire_script: VecDeque<AcquireOutcome>,
    pub present_script: VecDeque<PresentOutcome>,
    /// Pending work never completes; fence waits on it time out.
    pub hung: bool,
    next_id: u32,
    next_image: HashMap<u32, u32>,
}

impl DeviceState {
    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn violation(&mut self, message: String) {
        self.violations.push(message);
    }

    fn pending_count(&self) -> usize {
        self.fences
            .values()
            .filter(|state| **state == FenceState::Pending)
            .count()
    }
}

/// Shared handle to the fake's state. Survives the presenter.
pub type Shared = Rc<RefCell<DeviceState>>;

pub struct FakeDevice {
    state: Shared,
}

impl FakeDevice {
    pub fn new(flight_limit: usize, image_count: usize) -> (Self, Shared) {
        let state = Rc::new(RefCell::new(DeviceState {
            flight_limit,
            default_image_count: image_count,
            surface_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        }));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }
}

pub struct FakeSemaphore {
    pub id: u32,
    state: Shared,
}

impl Drop for FakeSemaphore {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.semaphores.remove(&self.id);
        state.calls.push(Call::DestroySemaphore(self.id));
    }
}

pub struct FakeFence {
    pub id: u32,
    state: Shared,
}

impl Drop for FakeFence {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.fences.get(&self.id) == Some(&FenceState::Pending) {
            let id = self.id;
            state.violation(format!("fence {id} destroyed while pending"));
        }
        state.fences.remove(&self.id);
        state.calls.push(Call::DestroyFence(self.id));
    }
}

pub struct FakeCommandBuffer {
    pub id: u32,
}

pub struct FakeSwapchain {
    pub id: u32,
    extent: vk::Extent2D,
    targets: Vec<u32>,
    state: Shared,
}

impl PresentSwapchain for FakeSwapchain {
    type RenderTarget = u32;

    fn image_count(&self) -> usize {
        self.targets.len()
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn format(&self) -> vk::Format {
        vk::Format::B8G8R8A8_UNORM
    }

    fn render_target(&self, image_index: u32) -> Option<&u32> {
        self.targets.get(image_index as usize)
    }
}

impl Drop for FakeSwapchain {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live_swapchains.retain(|id| *id != self.id);
        state.calls.push(Call::DestroySwapchain(self.id));
    }
}

impl PresentDevice for FakeDevice {
    type Semaphore = FakeSemaphore;
    type Fence = FakeFence;
    type CommandBuffer = FakeCommandBuffer;
    type Swapchain = FakeSwapchain;

    fn create_semaphore(&self) -> RhiResult<FakeSemaphore> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        state.semaphores.insert(id, false);
        state.calls.push(Call::CreateSemaphore(id));
        Ok(FakeSemaphore {
            id,
            state: Rc::clone(&self.state),
        })
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<FakeFence> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        let initial = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        state.fences.insert(id, initial);
        state.calls.push(Call::CreateFence { id, signaled });
        Ok(FakeFence {
            id,
            state: Rc::clone(&self.state),
        })
    }

    fn create_command_buffer(&self) -> RhiResult<FakeCommandBuffer> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc_id();
        state.calls.push(Call::CreateCommandBuffer(id));
        Ok(FakeCommandBuffer { id })
    }

    fn wait_for_fences(&self, fences: &[&FakeFence], _timeout_ns: u64) -> RhiResult<()> {
        let mut state = self.state.borrow_mut();
        let ids: Vec<u32> = fences.iter().map(|f| f.id).collect();
        state.calls.push(Call::WaitFences(ids.clone()));

        for id in ids {
            match state.fences.get(&id).copied() {
                Some(FenceState::Signaled) => {}
                Some(FenceState::Pending) if !state.hung => {
                    state.fences.insert(id, FenceState::Signaled);
                }
                Some(FenceState::Pending) => {
                    return Err(RhiError::Timeout(format!("fence {id}")));
                }
                Some(FenceState::Unsignaled) => {
                    // Nothing will ever signal it: a real wait would hang.
                    state.violation(format!("wait on fence {id} that was never submitted"));
                    return Err(RhiError::Timeout(format!("fence {id}")));
                }
                None => return Err(RhiError::InvalidState(format!("unknown fence {id}"))),
            }
        }
        Ok(())
    }

    fn reset_fence(&self, fence: &FakeFence) -> RhiResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::ResetFence(fence.id));
        if state.fences.get(&fence.id) == Some(&FenceState::Pending) {
            state.violation(format!("fence {} reset while pending", fence.id));
        }
        state.fences.insert(fence.id, FenceState::Unsignaled);
        Ok(())
    }

    fn begin_commands(&self, command_buffer: &FakeCommandBuffer) -> RhiResult<()> {
        self.state
            .borrow_mut()
            .calls
            .push(Call::BeginCommands(command_buffer.id));
        Ok(())
    }

    fn end_commands(&self, command_buffer: &FakeCommandBuffer) -> RhiResult<()> {
        self.state
            .borrow_mut()
            .calls
            .push(Call::EndCommands(command_buffer.id));
        Ok(())
    }

    fn submit(&self, batch: SubmitBatch<'_, Self>) -> RhiResult<()> {
        let mut state = self.state.borrow_mut();
        let wait = batch.wait.map(|s| s.id);
        let signal = batch.signal.map(|s| s.id);
        let fence = batch.fence.map(|f| f.id);

        state.calls.push(Call::Submit {
            command_buffer: batch.command_buffer.id,
            wait,
            signal,
            fence,
        });

        if let Some(wait) = wait {
            if state.semaphores.get(&wait) != Some(&true) {
                state.violation(format!("submit waits on semaphore {wait} that is not raised"));
            }
            state.semaphores.insert(wait, false);
        }
        if let Some(signal) = signal {
            if state.semaphores.get(&signal) == Some(&true) {
                state.violation(format!("submit raises semaphore {signal} that is already raised"));
            }
            state.semaphores.insert(signal, true);
        }
        if let Some(fence) = fence {
            if state.fences.get(&fence) != Some(&FenceState::Unsignaled) {
                state.violation(format!("submit with fence {fence} that was not reset"));
            }
            state.fences.insert(fence, FenceState::Pending);
        }

        let pending = state.pending_count();
        state.max_in_flight = state.max_in_flight.max(pending);
        if pending > state.flight_limit {
            let limit = state.flight_limit;
            state.violation(format!("{pending} frames in flight, limit {limit}"));
        }
        Ok(())
    }

    fn build_swapchain(
        &self,
        _desc: &SwapchainDesc,
        previous: Option<&FakeSwapchain>,
    ) -> RhiResult<Option<FakeSwapchain>> {
        let mut state = self.state.borrow_mut();
        let previous_id = previous.map(|p| p.id);

        if state.pending_count() > 0 {
            let pending = state.pending_count();
            state.violation(format!("swapchain built with {pending} frame(s) in flight"));
        }

        let extent = state.surface_extent;
        if extent.width == 0 || extent.height == 0 {
            state.calls.push(Call::BuildSwapchain {
                id: None,
                previous: previous_id,
            });
            return Ok(None);
        }

        let image_count = state
            .image_counts
            .pop_front()
            .unwrap_or(state.default_image_count);
        let id = state.alloc_id();
        let targets = (0..image_count as u32).map(|i| id * 100 + i).collect();

        if let Some(previous_id) = previous_id {
            state.retired_swapchains.push(previous_id);
        }
        state.live_swapchains.push(id);
        state.calls.push(Call::BuildSwapchain {
            id: Some(id),
            previous: previous_id,
        });

        Ok(Some(FakeSwapchain {
            id,
            extent,
            targets,
            state: Rc::clone(&self.state),
        }))
    }

    fn acquire_next_image(
        &self,
        swapchain: &FakeSwapchain,
        signal: &FakeSemaphore,
        _timeout_ns: u64,
    ) -> RhiResult<AcquireOutcome> {
        let mut state = self.state.borrow_mut();

        if state.retired_swapchains.contains(&swapchain.id) {
            state.violation(format!("acquire on retired swapchain {}", swapchain.id));
        }

        let outcome = match state.acquire_script.pop_front() {
            Some(AcquireOutcome::OutOfDate) => AcquireOutcome::OutOfDate,
            scripted => {
                let suboptimal = matches!(
                    scripted,
                    Some(AcquireOutcome::Acquired {
                        suboptimal: true,
                        ..
                    })
                );
                let count = swapchain.targets.len() as u32;
                let next = state.next_image.entry(swapchain.id).or_insert(0);
                let image_index = *next;
                *next = (*next + 1) % count;
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                }
            }
        };

        if matches!(outcome, AcquireOutcome::Acquired { .. }) {
            if state.semaphores.get(&signal.id) == Some(&true) {
                state.violation(format!(
                    "acquire raises semaphore {} that is already raised",
                    signal.id
                ));
            }
            state.semaphores.insert(signal.id, true);
        }

        state.calls.push(Call::Acquire {
            swapchain: swapchain.id,
            semaphore: signal.id,
            outcome,
        });
        Ok(outcome)
    }

    fn present(
        &self,
        swapchain: &FakeSwapchain,
        image_index: u32,
        wait: &FakeSemaphore,
    ) -> RhiResult<PresentOutcome> {
        let mut state = self.state.borrow_mut();

        if state.retired_swapchains.contains(&swapchain.id) {
            state.violation(format!("present on retired swapchain {}", swapchain.id));
        }
        if state.semaphores.get(&wait.id) != Some(&true) {
            state.violation(format!("present waits on semaphore {} that is not raised", wait.id));
        }
        state.semaphores.insert(wait.id, false);

        state.calls.push(Call::Present {
            swapchain: swapchain.id,
            image_index,
            wait: wait.id,
        });

        Ok(state
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&self) -> RhiResult<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::WaitIdle);
        if state.hung && state.pending_count() > 0 {
            return Err(RhiError::Timeout("device idle".to_string()));
        }
        for fence in state.fences.values_mut() {
            if *fence == FenceState::Pending {
                *fence = FenceState::Signaled;
            }
        }
        Ok(())
    }
}

pub fn config(frames_in_flight: usize) -> PresentConfig {
    PresentConfig {
        frames_in_flight,
        enable_validation: false,
        ..Default::default()
    }
}

/// Position of the last call matching `pred`.
pub fn last_position(calls: &[Call], pred: impl Fn(&Call) -> bool) -> Option<usize> {
    calls.iter().rposition(pred)
}

pub fn count(calls: &[Call], pred: impl Fn(&Call) -> bool) -> usize {
    calls.iter().filter(|c| pred(c)).count()
}

//! The Vulkan implementation of [`PresentDevice`].
//!
//! A [`DeviceContext`] owns the instance, the presentation surface, the
//! logical device and the command pool. Everything the presenter creates
//! through it (signals, markers, command buffers, swapchains) holds a shared
//! reference to the device and must be dropped before the context.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{error, info};

use crate::backend::{AcquireOutcome, PresentDevice, PresentOutcome, SubmitBatch, SwapchainDesc};
use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::diagnostics::DiagnosticSink;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, select_physical_device};
use crate::surface::PresentationSurface;
use crate::swapchain::Swapchain;
use crate::sync::{self, Fence, Semaphore};

/// Stage at which a submission waits for its swapchain image.
const ACQUIRE_WAIT_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;

/// Instance, surface, adapter, device and queue for one window.
///
/// Fields are torn down in reverse creation order: command pool, device,
/// surface, instance (and with it the diagnostic sink).
pub struct DeviceContext {
    command_pool: ManuallyDrop<CommandPool>,
    swapchain_loader: ash::khr::swapchain::Device,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Arc<PresentationSurface>>,
    adapter: PhysicalDeviceInfo,
    instance: ManuallyDrop<Instance>,
}

impl DeviceContext {
    /// Creates the instance, surface and device for the window identified
    /// by `display` and `window`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoSuitableGpu`] if no adapter has a queue family
    /// that supports both graphics and presentation to the surface, or any
    /// error from instance, surface or device creation.
    pub fn new(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        enable_validation: bool,
        sink: Arc<dyn DiagnosticSink>,
    ) -> RhiResult<Self> {
        let instance = Instance::new(display, enable_validation, sink)?;
        let surface = Arc::new(PresentationSurface::new(&instance, display, window)?);

        let adapter =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &adapter)?;
        let command_pool = CommandPool::new(device.clone(), adapter.queue_family)?;
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        info!("Device context ready on '{}'", adapter.device_name());

        Ok(Self {
            command_pool: ManuallyDrop::new(command_pool),
            swapchain_loader,
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            adapter,
            instance: ManuallyDrop::new(instance),
        })
    }

    #[inline]
    pub fn adapter(&self) -> &PhysicalDeviceInfo {
        &self.adapter
    }
}

impl PresentDevice for DeviceContext {
    type Semaphore = Semaphore;
    type Fence = Fence;
    type CommandBuffer = CommandBuffer;
    type Swapchain = Swapchain;

    fn create_semaphore(&self) -> RhiResult<Semaphore> {
        Semaphore::new(Arc::clone(&self.device))
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<Fence> {
        Fence::new(Arc::clone(&self.device), signaled)
    }

    fn create_command_buffer(&self) -> RhiResult<CommandBuffer> {
        CommandBuffer::new(Arc::clone(&self.device), &self.command_pool)
    }

    fn wait_for_fences(&self, fences: &[&Fence], timeout_ns: u64) -> RhiResult<()> {
        sync::wait_for_fences(&self.device, fences, timeout_ns)
    }

    fn reset_fence(&self, fence: &Fence) -> RhiResult<()> {
        fence.reset()
    }

    fn begin_commands(&self, command_buffer: &CommandBuffer) -> RhiResult<()> {
        command_buffer.reset()?;
        command_buffer.begin()
    }

    fn end_commands(&self, command_buffer: &CommandBuffer) -> RhiResult<()> {
        command_buffer.end()
    }

    fn submit(&self, batch: SubmitBatch<'_, Self>) -> RhiResult<()> {
        let command_buffers = [batch.command_buffer.handle()];
        let wait_semaphores: Vec<vk::Semaphore> =
            batch.wait.map(Semaphore::handle).into_iter().collect();
        let wait_stages: Vec<vk::PipelineStageFlags> =
            wait_semaphores.iter().map(|_| ACQUIRE_WAIT_STAGE).collect();
        let signal_semaphores: Vec<vk::Semaphore> =
            batch.signal.map(Semaphore::handle).into_iter().collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let fence = batch.fence.map_or(vk::Fence::null(), Fence::handle);

        // SAFETY: the presenter drives the queue from one thread and resets
        // the fence only after observing it signaled.
        unsafe { self.device.submit(&[submit_info], fence) }
    }

    fn build_swapchain(
        &self,
        desc: &SwapchainDesc,
        previous: Option<&Swapchain>,
    ) -> RhiResult<Option<Swapchain>> {
        Swapchain::build(
            Arc::clone(&self.device),
            &self.swapchain_loader,
            Arc::clone(&self.surface),
            desc,
            previous,
        )
    }

    fn acquire_next_image(
        &self,
        swapchain: &Swapchain,
        signal: &Semaphore,
        timeout_ns: u64,
    ) -> RhiResult<AcquireOutcome> {
        match swapchain.acquire_next_image(signal.handle(), timeout_ns) {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Err(RhiError::Timeout(
                format!("swapchain image after {} ms", timeout_ns / 1_000_000),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn present(
        &self,
        swapchain: &Swapchain,
        image_index: u32,
        wait: &Semaphore,
    ) -> RhiResult<PresentOutcome> {
        match swapchain.present(self.device.queue(), image_index, wait.handle()) {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during teardown: {}", e);
        }

        unsafe {
            ManuallyDrop::drop(&mut self.command_pool);
        }

        // Anything still holding the device or surface would dangle once the
        // instance is gone. Leak the instance instead of destroying it.
        let device = unsafe { ManuallyDrop::take(&mut self.device) };
        let surface = unsafe { ManuallyDrop::take(&mut self.surface) };

        let device_refs = Arc::strong_count(&device);
        let surface_refs = Arc::strong_count(&surface);
        if device_refs > 1 || surface_refs > 1 {
            error!(
                "Device context dropped while {} device and {} surface reference(s) are still alive; leaking Vulkan instance",
                device_refs - 1,
                surface_refs - 1
            );
            std::mem::forget(device);
            std::mem::forget(surface);
            return;
        }

        drop(device);
        drop(surface);

        unsafe {
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Device context destroyed");
    }
}

//! Vulkan implementation of the renderer seams.
//!
//! [`VulkanBackend`] owns the instance, window surface, logical device and
//! the command pool the frame slots are allocated from. The swapchain it
//! builds is the [`PresentationSurface`].
//!
//! # Resource Destruction Order
//!
//! 1. Command pool
//! 2. Device (once every other `Arc<Device>` holder is gone)
//! 3. Window surface
//! 4. Instance
//!
//! Swapchains and frame syncs are owned by the orchestrator and dropped
//! before the backend.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ember_core::{PresentModePreference, RendererConfig};
use ember_platform::{Surface, Window};
use ember_rhi::command::{CommandBuffer, CommandPool};
use ember_rhi::depth::find_depth_format;
use ember_rhi::device::Device;
use ember_rhi::instance::Instance;
use ember_rhi::physical_device::select_physical_device;
use ember_rhi::swapchain::{AcquireOutcome, PresentOutcome, Swapchain, SwapchainDesc};
use ember_rhi::sync::FrameSync;
use ember_rhi::{RhiResult, vk};
use tracing::{info, warn};

use crate::backend::{ClearValues, PresentationSurface, RenderBackend, SurfaceConfig};
use crate::error::RenderResult;

pub struct VulkanBackend {
    command_pool: ManuallyDrop<CommandPool>,
    device: ManuallyDrop<Arc<Device>>,
    depth_format: vk::Format,
    present_mode: vk::PresentModeKHR,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
}

impl VulkanBackend {
    /// Creates the instance, a surface for `window`, picks a GPU and creates
    /// the logical device and command pool.
    ///
    /// # Errors
    ///
    /// Returns an error if any of those steps fail, including when no GPU can
    /// present to the window.
    pub fn new(window: &Window, config: &RendererConfig) -> RenderResult<Self> {
        let surface_extensions = window.required_extensions()?;
        let instance = Instance::new(config.validation, &surface_extensions)?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        info!(
            "Using GPU: {} ({})",
            physical_device_info.device_name(),
            physical_device_info.device_type_name()
        );

        let device = Device::new(&instance, &physical_device_info)?;
        let depth_format = find_depth_format(&instance, physical_device_info.device)?;
        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;

        Ok(Self {
            command_pool: ManuallyDrop::new(command_pool),
            device: ManuallyDrop::new(device),
            depth_format,
            present_mode: present_mode_for(config.present_mode),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        })
    }

    /// Shared logical device, for creating pipelines and buffers.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    fn recorder(&self, command_buffer: vk::CommandBuffer) -> CommandBuffer {
        CommandBuffer::from_handle(Arc::clone(&*self.device), command_buffer)
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        // Besides ours, the command pool holds one reference.
        let outstanding = Arc::strong_count(&*self.device).saturating_sub(2);
        if outstanding > 0 {
            warn!(
                "{} device references outlive the backend; device destruction is deferred",
                outstanding
            );
        }

        // SAFETY: each field is dropped exactly once, in dependency order,
        // and never touched again.
        unsafe {
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Vulkan backend destroyed");
    }
}

impl RenderBackend for VulkanBackend {
    type CommandBuffer = vk::CommandBuffer;
    type FrameSync = FrameSync;
    type Surface = Swapchain;

    fn build_surface(
        &self,
        extent: vk::Extent2D,
        previous: Option<Swapchain>,
    ) -> RhiResult<Swapchain> {
        let desc = SwapchainDesc {
            surface: self.surface.handle(),
            extent,
            preferred_present_mode: self.present_mode,
            depth_format: self.depth_format,
        };
        Swapchain::new(&self.instance, Arc::clone(&*self.device), &desc, previous)
    }

    fn allocate_command_buffers(&self, count: usize) -> RhiResult<Vec<vk::CommandBuffer>> {
        self.command_pool.allocate_command_buffers(count as u32)
    }

    fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        self.command_pool.free_command_buffers(command_buffers);
    }

    fn create_frame_sync(&self) -> RhiResult<FrameSync> {
        FrameSync::new(Arc::clone(&*self.device))
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.recorder(command_buffer).begin()
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.recorder(command_buffer).end()
    }

    fn begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        surface: &Swapchain,
        image_index: u32,
        clear: &ClearValues,
    ) {
        let extent = surface.extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = render_pass_clear_values(clear);

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(surface.render_pass())
            .framebuffer(surface.framebuffer(image_index))
            .render_area(render_area)
            .clear_values(&clear_values);

        let cmd = self.recorder(command_buffer);
        cmd.begin_render_pass(&begin_info);
        cmd.set_viewport(&full_viewport(extent));
        cmd.set_scissor(&render_area);
    }

    fn end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.recorder(command_buffer).end_render_pass();
    }
}

impl PresentationSurface for Swapchain {
    type CommandBuffer = vk::CommandBuffer;
    type FrameSync = FrameSync;

    fn config(&self) -> SurfaceConfig {
        SurfaceConfig {
            extent: self.extent(),
            image_count: self.image_count(),
            image_format: self.format(),
            depth_format: self.depth_format(),
        }
    }

    fn render_pass(&self) -> vk::RenderPass {
        Swapchain::render_pass(self)
    }

    fn acquire_next_image(&mut self, sync: &FrameSync) -> RhiResult<AcquireOutcome> {
        Swapchain::acquire_next_image(self, sync)
    }

    fn submit(
        &mut self,
        command_buffer: vk::CommandBuffer,
        sync: &FrameSync,
        image_index: u32,
    ) -> RhiResult<PresentOutcome> {
        Swapchain::submit(self, command_buffer, sync, image_index)
    }
}

/// Present mode to request for a configured preference.
pub fn present_mode_for(preference: PresentModePreference) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
        PresentModePreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

/// Color then depth/stencil, matching the render pass attachment order.
fn render_pass_clear_values(clear: &ClearValues) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear.color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: clear.depth,
                stencil: clear.stencil,
            },
        },
    ]
}

fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

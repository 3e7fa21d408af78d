//! Seams between frame orchestration and the graphics API.
//!
//! [`FrameOrchestrator`](crate::FrameOrchestrator) drives a [`RenderBackend`]
//! and the [`PresentationSurface`] it builds. The Vulkan implementation lives
//! in [`crate::vulkan`]; tests plug in a scripted backend instead.

use std::fmt;

use ember_core::RendererConfig;
use ember_rhi::swapchain::{AcquireOutcome, PresentOutcome};
use ember_rhi::{RhiError, RhiResult, vk};

/// Shape of a built presentation surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub extent: vk::Extent2D,
    pub image_count: usize,
    pub image_format: vk::Format,
    pub depth_format: vk::Format,
}

impl SurfaceConfig {
    pub fn aspect_ratio(&self) -> f32 {
        if self.extent.height == 0 {
            return 1.0;
        }
        self.extent.width as f32 / self.extent.height as f32
    }
}

/// Checks that a rebuilt surface can stand in for its predecessor.
///
/// Frame slots and pipelines are created once against the first surface, so
/// only the extent may change.
///
/// # Errors
///
/// Returns [`RhiError::IncompatibleSurface`] if the image count, color format
/// or depth format differ.
pub fn ensure_compatible(previous: &SurfaceConfig, next: &SurfaceConfig) -> RhiResult<()> {
    if previous.image_count != next.image_count {
        return Err(RhiError::IncompatibleSurface(format!(
            "image count changed from {} to {}",
            previous.image_count, next.image_count
        )));
    }
    if previous.image_format != next.image_format {
        return Err(RhiError::IncompatibleSurface(format!(
            "image format changed from {:?} to {:?}",
            previous.image_format, next.image_format
        )));
    }
    if previous.depth_format != next.depth_format {
        return Err(RhiError::IncompatibleSurface(format!(
            "depth format changed from {:?} to {:?}",
            previous.depth_format, next.depth_format
        )));
    }
    Ok(())
}

/// Clear values for the swapchain render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.01, 0.01, 0.01, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl From<&RendererConfig> for ClearValues {
    fn from(config: &RendererConfig) -> Self {
        Self {
            color: config.clear_color,
            depth: config.clear_depth,
            stencil: 0,
        }
    }
}

/// A set of presentable images plus the render pass that targets them.
pub trait PresentationSurface {
    type CommandBuffer: Copy;
    type FrameSync;

    fn config(&self) -> SurfaceConfig;

    fn render_pass(&self) -> vk::RenderPass;

    /// Waits for `sync`'s previous submission, then acquires an image.
    fn acquire_next_image(&mut self, sync: &Self::FrameSync) -> RhiResult<AcquireOutcome>;

    /// Submits recorded work for `image_index` and queues it for presentation.
    fn submit(
        &mut self,
        command_buffer: Self::CommandBuffer,
        sync: &Self::FrameSync,
        image_index: u32,
    ) -> RhiResult<PresentOutcome>;
}

/// Device-level operations the orchestrator needs.
pub trait RenderBackend {
    type CommandBuffer: Copy + PartialEq + fmt::Debug;
    type FrameSync;
    type Surface: PresentationSurface<
            CommandBuffer = Self::CommandBuffer,
            FrameSync = Self::FrameSync,
        >;

    /// Builds a surface of `extent`. `previous`, if any, is consumed and
    /// destroyed once the new surface exists.
    ///
    /// Returns [`RhiError::ZeroExtent`] if the surface has no drawable area
    /// by the time it is built; `previous` is destroyed regardless.
    fn build_surface(
        &self,
        extent: vk::Extent2D,
        previous: Option<Self::Surface>,
    ) -> RhiResult<Self::Surface>;

    fn allocate_command_buffers(&self, count: usize) -> RhiResult<Vec<Self::CommandBuffer>>;

    fn free_command_buffers(&self, command_buffers: &[Self::CommandBuffer]);

    fn create_frame_sync(&self) -> RhiResult<Self::FrameSync>;

    fn wait_idle(&self) -> RhiResult<()>;

    fn begin_command_buffer(&self, command_buffer: Self::CommandBuffer) -> RhiResult<()>;

    fn end_command_buffer(&self, command_buffer: Self::CommandBuffer) -> RhiResult<()>;

    /// Begins the surface's render pass on framebuffer `image_index`, clearing
    /// with `clear`, and sets viewport and scissor to the full extent.
    fn begin_render_pass(
        &self,
        command_buffer: Self::CommandBuffer,
        surface: &Self::Surface,
        image_index: u32,
        clear: &ClearValues,
    );

    fn end_render_pass(&self, command_buffer: Self::CommandBuffer);
}

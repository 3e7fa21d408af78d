//! Frame orchestration.
//!
//! [`FrameOrchestrator`] owns the presentation surface, the frame slots and
//! the viewport, and turns the begin/end protocol into acquire, record,
//! submit and present calls:
//!
//! ```text
//! loop {
//!     if let Some(cmd) = orchestrator.begin_frame()? {
//!         orchestrator.begin_swap_chain_render_pass(cmd);
//!         // record draws into cmd
//!         orchestrator.end_swap_chain_render_pass(cmd);
//!         orchestrator.end_frame()?;
//!     }
//! }
//! ```
//!
//! `begin_frame` returns `None` when the frame has to be skipped: the window
//! is minimized, the surface was stale and had to be rebuilt, or the last
//! rebuild found nothing to draw to and is being retried. Stale,
//! suboptimal and resized surfaces are rebuilt internally and never surface
//! as errors. Any other error is fatal: it is returned once and every later
//! `begin_frame` returns [`RenderError::Halted`].
//!
//! Calling the protocol out of order (two begins, an end without a begin, a
//! render pass outside a frame or on another command buffer) is a programming
//! error and panics.

use ember_platform::{ViewportSource, is_zero_extent};
use ember_rhi::swapchain::{AcquireOutcome, PresentOutcome};
use ember_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use ember_rhi::{RhiError, vk};
use tracing::{debug, error, info};

use crate::backend::{
    ClearValues, PresentationSurface, RenderBackend, SurfaceConfig, ensure_compatible,
};
use crate::error::{RenderError, RenderResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameState {
    Idle,
    Started,
    Halted,
}

/// One of the [`MAX_FRAMES_IN_FLIGHT`] command buffer + sync sets.
struct FrameSlot<B: RenderBackend> {
    command_buffer: B::CommandBuffer,
    sync: B::FrameSync,
}

/// Drives frames through a [`RenderBackend`] onto the window behind a
/// [`ViewportSource`].
pub struct FrameOrchestrator<B: RenderBackend, V: ViewportSource> {
    // Field order is drop order: the surface and slots go before the backend
    // that created them, and the window goes last.
    /// `None` while a rebuild is pending or after a fatal error.
    surface: Option<B::Surface>,
    slots: Vec<FrameSlot<B>>,
    backend: B,
    viewport: V,
    clear_values: ClearValues,
    /// Shape of the first surface; every rebuild must match it.
    surface_config: SurfaceConfig,
    current_frame: usize,
    image_index: u32,
    state: FrameState,
    /// Acquire reported the surface as suboptimal for the frame in progress.
    suboptimal: bool,
    rebuild_count: u64,
}

impl<B: RenderBackend, V: ViewportSource> FrameOrchestrator<B, V> {
    /// Builds the first surface at the viewport's size and allocates the
    /// frame slots. Blocks while the window is minimized.
    ///
    /// # Errors
    ///
    /// Returns an error if the window is closed before it ever has a
    /// drawable size, or if surface or slot creation fails.
    pub fn new(backend: B, mut viewport: V, clear_values: ClearValues) -> RenderResult<Self> {
        let extent = wait_for_drawable_extent(&mut viewport).ok_or_else(|| {
            ember_core::Error::Window("Window closed before it could be drawn to".to_string())
        })?;
        viewport.reset_resized_flag();

        let surface = backend.build_surface(extent, None)?;
        let slots = create_frame_slots(&backend)?;

        let surface_config = surface.config();
        info!(
            "Frame orchestrator ready: {}x{}, {} images, {} frames in flight",
            surface_config.extent.width,
            surface_config.extent.height,
            surface_config.image_count,
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            surface: Some(surface),
            slots,
            backend,
            viewport,
            clear_values,
            surface_config,
            current_frame: 0,
            image_index: 0,
            state: FrameState::Idle,
            suboptimal: false,
            rebuild_count: 0,
        })
    }

    /// Starts a frame and returns the command buffer to record into, or
    /// `None` if this frame is skipped.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already in progress.
    pub fn begin_frame(&mut self) -> RenderResult<Option<B::CommandBuffer>> {
        assert!(
            self.state != FrameState::Started,
            "begin_frame called while a frame is already in progress"
        );
        if self.state == FrameState::Halted {
            return Err(RenderError::Halted);
        }

        let result = self.try_begin_frame();
        self.halt_on_error(result)
    }

    fn try_begin_frame(&mut self) -> RenderResult<Option<B::CommandBuffer>> {
        if is_zero_extent(self.viewport.extent()) {
            debug!("Viewport has zero extent, waiting");
            self.rebuild_surface()?;
            return Ok(None);
        }
        if self.surface.is_none() {
            debug!("No presentation surface, retrying rebuild");
            self.rebuild_surface()?;
            return Ok(None);
        }

        let slot = &self.slots[self.current_frame];
        let surface = self.surface.as_mut().ok_or(RenderError::Halted)?;

        let image_index = match surface.acquire_next_image(&slot.sync)? {
            AcquireOutcome::Ready(index) => {
                self.suboptimal = false;
                index
            }
            AcquireOutcome::Suboptimal(index) => {
                self.suboptimal = true;
                index
            }
            AcquireOutcome::Stale => {
                debug!("Surface out of date on acquire, skipping frame");
                self.rebuild_surface()?;
                return Ok(None);
            }
        };

        self.backend.begin_command_buffer(slot.command_buffer)?;
        self.image_index = image_index;
        self.state = FrameState::Started;
        Ok(Some(slot.command_buffer))
    }

    /// Submits and presents the frame started by the last successful
    /// [`begin_frame`](Self::begin_frame), rebuilding the surface afterwards
    /// if it went stale, was suboptimal or the window was resized.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn end_frame(&mut self) -> RenderResult<()> {
        assert!(
            self.state == FrameState::Started,
            "end_frame called without a frame in progress"
        );
        self.state = FrameState::Idle;

        let result = self.try_end_frame();
        self.halt_on_error(result)
    }

    fn try_end_frame(&mut self) -> RenderResult<()> {
        let slot = &self.slots[self.current_frame];
        self.backend.end_command_buffer(slot.command_buffer)?;

        let surface = self.surface.as_mut().ok_or(RenderError::Halted)?;
        let outcome = surface.submit(slot.command_buffer, &slot.sync, self.image_index)?;

        let resized = self.viewport.was_resized();
        if outcome == PresentOutcome::Stale || self.suboptimal || resized {
            debug!(
                "Rebuilding after present (stale: {}, suboptimal: {}, resized: {})",
                outcome == PresentOutcome::Stale,
                self.suboptimal,
                resized
            );
            self.suboptimal = false;
            self.rebuild_surface()?;
        }

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(())
    }

    /// Begins the surface's render pass on the acquired image, clearing it
    /// and setting viewport and scissor to the surface extent.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress or `command_buffer` is not the one
    /// returned by `begin_frame`.
    pub fn begin_swap_chain_render_pass(&mut self, command_buffer: B::CommandBuffer) {
        self.assert_active(command_buffer, "begin_swap_chain_render_pass");
        if let Some(surface) = self.surface.as_ref() {
            self.backend.begin_render_pass(
                command_buffer,
                surface,
                self.image_index,
                &self.clear_values,
            );
        }
    }

    /// # Panics
    ///
    /// Same conditions as
    /// [`begin_swap_chain_render_pass`](Self::begin_swap_chain_render_pass).
    pub fn end_swap_chain_render_pass(&mut self, command_buffer: B::CommandBuffer) {
        self.assert_active(command_buffer, "end_swap_chain_render_pass");
        self.backend.end_render_pass(command_buffer);
    }

    fn assert_active(&self, command_buffer: B::CommandBuffer, operation: &str) {
        assert!(
            self.state == FrameState::Started,
            "{} called without a frame in progress",
            operation
        );
        assert!(
            command_buffer == self.slots[self.current_frame].command_buffer,
            "{} called with {:?}, which is not the active command buffer",
            operation,
            command_buffer
        );
    }

    /// Waits for a drawable size, then replaces the surface.
    ///
    /// If the surface shrinks to nothing during the build the old surface is
    /// gone and no new one exists; the next `begin_frame` retries.
    fn rebuild_surface(&mut self) -> RenderResult<()> {
        let Some(extent) = wait_for_drawable_extent(&mut self.viewport) else {
            debug!("Close requested while minimized, not rebuilding");
            return Ok(());
        };
        self.viewport.reset_resized_flag();
        self.backend.wait_idle()?;

        let previous = self.surface.take();
        let surface = match self.backend.build_surface(extent, previous) {
            Ok(surface) => surface,
            Err(RhiError::ZeroExtent) => {
                debug!("Surface collapsed to zero extent during rebuild, retrying next frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let config = surface.config();
        ensure_compatible(&self.surface_config, &config)?;

        self.rebuild_count += 1;
        info!(
            "Presentation surface rebuilt: {}x{}, {} images (rebuild #{})",
            config.extent.width, config.extent.height, config.image_count, self.rebuild_count
        );

        self.surface = Some(surface);
        Ok(())
    }

    fn halt_on_error<T>(&mut self, result: RenderResult<T>) -> RenderResult<T> {
        if let Err(e) = &result
            && !matches!(e, RenderError::Halted)
        {
            error!("Fatal rendering error, halting: {}", e);
            self.state = FrameState::Halted;
        }
        result
    }

    /// Render pass of the current surface, or null while there is none.
    /// Pipelines built against it stay valid across rebuilds.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.surface
            .as_ref()
            .map_or(vk::RenderPass::null(), |surface| surface.render_pass())
    }

    pub fn surface_config(&self) -> Option<SurfaceConfig> {
        self.surface.as_ref().map(|surface| surface.config())
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.surface_config()
            .map_or(1.0, |config| config.aspect_ratio())
    }

    /// Slot that the next `begin_frame` (or the frame in progress) uses.
    #[inline]
    pub fn current_frame_index(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    #[inline]
    pub fn is_frame_in_progress(&self) -> bool {
        self.state == FrameState::Started
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.state == FrameState::Halted
    }

    #[inline]
    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    #[inline]
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Blocks until the GPU has finished all submitted work.
    pub fn wait_idle(&self) -> RenderResult<()> {
        self.backend.wait_idle()?;
        Ok(())
    }
}

impl<B: RenderBackend, V: ViewportSource> Drop for FrameOrchestrator<B, V> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            error!("Failed to wait for device idle during drop: {}", e);
        }

        let command_buffers: Vec<B::CommandBuffer> =
            self.slots.iter().map(|slot| slot.command_buffer).collect();
        self.backend.free_command_buffers(&command_buffers);

        debug!("Frame orchestrator destroyed after {} rebuilds", self.rebuild_count);
    }
}

/// Pumps events until the viewport has a non-zero size. `None` if the window
/// was closed first.
fn wait_for_drawable_extent<V: ViewportSource>(viewport: &mut V) -> Option<vk::Extent2D> {
    loop {
        let extent = viewport.extent();
        if !is_zero_extent(extent) {
            return Some(extent);
        }
        if viewport.should_close() {
            return None;
        }
        viewport.wait_events();
    }
}

fn create_frame_slots<B: RenderBackend>(backend: &B) -> RenderResult<Vec<FrameSlot<B>>> {
    let command_buffers = backend.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT)?;

    let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    for &command_buffer in &command_buffers {
        match backend.create_frame_sync() {
            Ok(sync) => slots.push(FrameSlot {
                command_buffer,
                sync,
            }),
            Err(e) => {
                backend.free_command_buffers(&command_buffers);
                return Err(e.into());
            }
        }
    }

    debug!("Created {} frame slots", slots.len());
    Ok(slots)
}

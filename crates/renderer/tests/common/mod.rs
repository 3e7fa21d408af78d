//! Scripted backend and viewport for driving `FrameOrchestrator` without a GPU.
//!
//! The mock keeps a logical clock: every submission completes `latency` ticks
//! after it was made, waiting on a frame fence advances the clock to that
//! fence's completion, and recording into a command buffer whose last
//! submission has not completed counts as a reuse violation.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ember_platform::ViewportSource;
use ember_renderer::{
    ClearValues, FrameOrchestrator, PresentationSurface, RenderBackend, RenderResult,
    SurfaceConfig,
};
use ember_rhi::swapchain::{AcquireOutcome, PresentOutcome};
use ember_rhi::{RhiError, RhiResult, vk};

pub type Shared = Rc<RefCell<GpuState>>;
pub type Orchestrator = FrameOrchestrator<MockBackend, MockViewport>;

pub const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MockCommandBuffer(pub u64);

#[derive(Debug)]
pub struct MockSync {
    id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Built { id: u32, previous: Option<u32> },
    Dropped(u32),
    WaitIdle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitRecord {
    pub surface: u32,
    pub command_buffer: MockCommandBuffer,
    pub image_index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassRecord {
    pub surface: u32,
    pub extent: vk::Extent2D,
    pub image_index: u32,
    pub command_buffer: MockCommandBuffer,
    pub clear: ClearValues,
}

#[derive(Default)]
pub struct GpuState {
    pub tick: u64,
    pub latency: u64,
    fence_ready_at: HashMap<u32, u64>,
    buffer_ready_at: HashMap<MockCommandBuffer, u64>,
    pub reuse_violations: u32,

    /// Image count of the n-th built surface; the last entry repeats.
    pub image_counts: Vec<usize>,
    /// Acquire call indices that report the surface out of date.
    pub stale_acquires: HashSet<u64>,
    pub suboptimal_acquires: HashSet<u64>,
    /// Submit call indices whose present reports the surface out of date.
    pub stale_presents: HashSet<u64>,
    pub device_lost_on_submit: Option<u64>,
    /// Build call indices that find the surface minimized.
    pub zero_extent_builds: HashSet<u32>,

    pub acquire_calls: u64,
    pub submit_calls: u64,
    pub builds: u32,
    next_sync: u32,

    pub events: Vec<Event>,
    pub begun: Vec<MockCommandBuffer>,
    pub ended: Vec<MockCommandBuffer>,
    pub submits: Vec<SubmitRecord>,
    pub render_passes: Vec<RenderPassRecord>,
    pub render_pass_ends: usize,
    pub allocated: Vec<MockCommandBuffer>,
    pub freed: Vec<MockCommandBuffer>,
}

impl GpuState {
    pub fn new() -> Shared {
        Rc::new(RefCell::new(Self {
            latency: 3,
            image_counts: vec![3],
            ..Default::default()
        }))
    }

    pub fn rebuild_events(&self) -> Vec<Event> {
        self.events
            .iter()
            .copied()
            .filter(|event| !matches!(event, Event::WaitIdle))
            .collect()
    }

    fn image_count_for_build(&self, build: u32) -> usize {
        self.image_counts
            .get(build as usize)
            .or(self.image_counts.last())
            .copied()
            .unwrap_or(3)
    }
}

pub struct MockSurface {
    id: u32,
    config: SurfaceConfig,
    next_image: u32,
    state: Shared,
}

impl MockSurface {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for MockSurface {
    fn drop(&mut self) {
        self.state.borrow_mut().events.push(Event::Dropped(self.id));
    }
}

impl PresentationSurface for MockSurface {
    type CommandBuffer = MockCommandBuffer;
    type FrameSync = MockSync;

    fn config(&self) -> SurfaceConfig {
        self.config
    }

    fn render_pass(&self) -> vk::RenderPass {
        vk::RenderPass::null()
    }

    fn acquire_next_image(&mut self, sync: &MockSync) -> RhiResult<AcquireOutcome> {
        let mut state = self.state.borrow_mut();
        let call = state.acquire_calls;
        state.acquire_calls += 1;

        let ready_at = state.fence_ready_at.get(&sync.id).copied().unwrap_or(0);
        state.tick = state.tick.max(ready_at);

        if state.stale_acquires.contains(&call) {
            return Ok(AcquireOutcome::Stale);
        }

        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.config.image_count as u32;

        if state.suboptimal_acquires.contains(&call) {
            Ok(AcquireOutcome::Suboptimal(image))
        } else {
            Ok(AcquireOutcome::Ready(image))
        }
    }

    fn submit(
        &mut self,
        command_buffer: MockCommandBuffer,
        sync: &MockSync,
        image_index: u32,
    ) -> RhiResult<PresentOutcome> {
        let mut state = self.state.borrow_mut();
        let call = state.submit_calls;
        state.submit_calls += 1;

        if state.device_lost_on_submit == Some(call) {
            return Err(RhiError::DeviceLost);
        }

        let ready_at = state.tick + state.latency;
        state.fence_ready_at.insert(sync.id, ready_at);
        state.buffer_ready_at.insert(command_buffer, ready_at);
        state.submits.push(SubmitRecord {
            surface: self.id,
            command_buffer,
            image_index,
        });
        state.tick += 1;

        if state.stale_presents.contains(&call) {
            Ok(PresentOutcome::Stale)
        } else {
            Ok(PresentOutcome::Presented)
        }
    }
}

pub struct MockBackend {
    state: Shared,
}

impl MockBackend {
    pub fn new(state: &Shared) -> Self {
        Self {
            state: Rc::clone(state),
        }
    }
}

impl RenderBackend for MockBackend {
    type CommandBuffer = MockCommandBuffer;
    type FrameSync = MockSync;
    type Surface = MockSurface;

    fn build_surface(
        &self,
        extent: vk::Extent2D,
        previous: Option<MockSurface>,
    ) -> RhiResult<MockSurface> {
        let surface = {
            let mut state = self.state.borrow_mut();
            let id = state.builds;
            state.builds += 1;

            if state.zero_extent_builds.contains(&id) {
                None
            } else {
                state.events.push(Event::Built {
                    id,
                    previous: previous.as_ref().map(MockSurface::id),
                });

                Some(MockSurface {
                    id,
                    config: SurfaceConfig {
                        extent,
                        image_count: state.image_count_for_build(id),
                        image_format: vk::Format::B8G8R8A8_SRGB,
                        depth_format: vk::Format::D32_SFLOAT,
                    },
                    next_image: 0,
                    state: Rc::clone(&self.state),
                })
            }
        };

        drop(previous);
        surface.ok_or(RhiError::ZeroExtent)
    }

    fn allocate_command_buffers(&self, count: usize) -> RhiResult<Vec<MockCommandBuffer>> {
        let mut state = self.state.borrow_mut();
        let start = state.allocated.len() as u64;
        let buffers: Vec<_> = (0..count as u64)
            .map(|i| MockCommandBuffer(100 + start + i))
            .collect();
        state.allocated.extend_from_slice(&buffers);
        Ok(buffers)
    }

    fn free_command_buffers(&self, command_buffers: &[MockCommandBuffer]) {
        self.state
            .borrow_mut()
            .freed
            .extend_from_slice(command_buffers);
    }

    fn create_frame_sync(&self) -> RhiResult<MockSync> {
        let mut state = self.state.borrow_mut();
        let id = state.next_sync;
        state.next_sync += 1;
        Ok(MockSync { id })
    }

    fn wait_idle(&self) -> RhiResult<()> {
        let mut state = self.state.borrow_mut();
        let drained = state.fence_ready_at.values().copied().max().unwrap_or(0);
        state.tick = state.tick.max(drained);
        state.events.push(Event::WaitIdle);
        Ok(())
    }

    fn begin_command_buffer(&self, command_buffer: MockCommandBuffer) -> RhiResult<()> {
        let mut state = self.state.borrow_mut();
        let ready_at = state
            .buffer_ready_at
            .get(&command_buffer)
            .copied()
            .unwrap_or(0);
        if ready_at > state.tick {
            state.reuse_violations += 1;
        }
        state.begun.push(command_buffer);
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: MockCommandBuffer) -> RhiResult<()> {
        self.state.borrow_mut().ended.push(command_buffer);
        Ok(())
    }

    fn begin_render_pass(
        &self,
        command_buffer: MockCommandBuffer,
        surface: &MockSurface,
        image_index: u32,
        clear: &ClearValues,
    ) {
        self.state.borrow_mut().render_passes.push(RenderPassRecord {
            surface: surface.id,
            extent: surface.config.extent,
            image_index,
            command_buffer,
            clear: *clear,
        });
    }

    fn end_render_pass(&self, _command_buffer: MockCommandBuffer) {
        self.state.borrow_mut().render_pass_ends += 1;
    }
}

/// Window stand-in. `wait_events` counts down a minimized period and then
/// restores the window size as a resize.
pub struct MockViewport {
    pub extent: vk::Extent2D,
    pub resized: bool,
    pub wait_calls: u32,
    pub close_requested: bool,
    /// Close the window on this many-th call to `wait_events`.
    pub close_after_waits: Option<u32>,
    minimized_waits: u32,
    restore_extent: vk::Extent2D,
}

impl MockViewport {
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            resized: false,
            wait_calls: 0,
            close_requested: false,
            close_after_waits: None,
            minimized_waits: 0,
            restore_extent: extent,
        }
    }

    /// Reports a zero size until `wait_events` has been called `waits` times.
    pub fn minimize(&mut self, waits: u32, restore: vk::Extent2D) {
        self.extent = vk::Extent2D {
            width: 0,
            height: 0,
        };
        self.minimized_waits = waits;
        self.restore_extent = restore;
    }

    pub fn resize(&mut self, extent: vk::Extent2D) {
        self.extent = extent;
        self.resized = true;
    }
}

impl ViewportSource for MockViewport {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        self.wait_calls += 1;

        if self.minimized_waits > 0 {
            self.minimized_waits -= 1;
            if self.minimized_waits == 0 {
                let restore = self.restore_extent;
                self.resize(restore);
            }
        }

        if self.close_after_waits == Some(self.wait_calls) {
            self.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }
}

pub fn orchestrator(state: &Shared) -> Orchestrator {
    orchestrator_with(state, MockViewport::new(EXTENT))
}

pub fn orchestrator_with(state: &Shared, viewport: MockViewport) -> Orchestrator {
    FrameOrchestrator::new(MockBackend::new(state), viewport, ClearValues::default())
        .expect("mock orchestrator")
}

/// Runs one frame with an empty render pass. `Ok(false)` if it was skipped.
pub fn run_frame(orchestrator: &mut Orchestrator) -> RenderResult<bool> {
    let Some(cmd) = orchestrator.begin_frame()? else {
        return Ok(false);
    };
    orchestrator.begin_swap_chain_render_pass(cmd);
    orchestrator.end_swap_chain_render_pass(cmd);
    orchestrator.end_frame()?;
    Ok(true)
}

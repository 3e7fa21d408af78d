//! Frame orchestration against a scripted backend.

mod common;

use common::{
    EXTENT, Event, GpuState, MockBackend, MockCommandBuffer, MockViewport, orchestrator,
    orchestrator_with, run_frame,
};
use ember_renderer::{ClearValues, FrameOrchestrator, MAX_FRAMES_IN_FLIGHT, RenderError};
use ember_rhi::{RhiError, vk};

const LARGE: vk::Extent2D = vk::Extent2D {
    width: 1280,
    height: 720,
};

#[test]
fn test_steady_state_alternates_frame_slots() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);

    for _ in 0..100 {
        assert!(run_frame(&mut orchestrator).unwrap());
    }

    assert_eq!(orchestrator.rebuild_count(), 0);
    assert_eq!(orchestrator.current_frame_index(), 0);
    drop(orchestrator);

    let state = state.borrow();
    assert_eq!(state.allocated.len(), MAX_FRAMES_IN_FLIGHT);
    assert_eq!(state.submits.len(), 100);
    assert_eq!(state.ended.len(), 100);
    assert_eq!(state.render_pass_ends, 100);
    assert_eq!(state.reuse_violations, 0);
    assert_eq!(state.builds, 1);

    for (i, begun) in state.begun.iter().enumerate() {
        assert_eq!(*begun, state.allocated[i % MAX_FRAMES_IN_FLIGHT]);
    }
    for (i, submit) in state.submits.iter().enumerate() {
        assert_eq!(submit.surface, 0);
        assert_eq!(submit.image_index, (i % 3) as u32);
    }
}

#[test]
fn test_slow_gpu_never_reuses_a_busy_command_buffer() {
    let state = GpuState::new();
    state.borrow_mut().latency = 10;
    let mut orchestrator = orchestrator(&state);

    for _ in 0..50 {
        run_frame(&mut orchestrator).unwrap();
    }

    assert_eq!(state.borrow().reuse_violations, 0);
}

#[test]
fn test_render_pass_uses_surface_extent_and_clear_values() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);
    run_frame(&mut orchestrator).unwrap();

    let state = state.borrow();
    let pass = state.render_passes[0];
    assert_eq!(pass.surface, 0);
    assert_eq!(pass.extent, EXTENT);
    assert_eq!(pass.command_buffer, state.allocated[0]);
    assert_eq!(pass.image_index, state.submits[0].image_index);
    assert_eq!(pass.clear, ClearValues::default());
}

#[test]
fn test_stale_acquire_skips_frame_and_rebuilds() {
    let state = GpuState::new();
    state.borrow_mut().stale_acquires.insert(37);
    let mut orchestrator = orchestrator(&state);

    let mut skipped = Vec::new();
    for frame in 0..100 {
        if !run_frame(&mut orchestrator).unwrap() {
            skipped.push(frame);
        }
    }

    assert_eq!(skipped, vec![37]);
    assert_eq!(orchestrator.rebuild_count(), 1);

    let state = state.borrow();
    assert_eq!(state.submits.len(), 99);
    assert_eq!(state.submits[36].surface, 0);
    assert_eq!(state.submits[37].surface, 1);
    assert_eq!(state.reuse_violations, 0);
}

#[test]
fn test_old_surface_is_handed_over_and_dropped_after_rebuild() {
    let state = GpuState::new();
    state.borrow_mut().stale_acquires.insert(2);
    let mut orchestrator = orchestrator(&state);

    for _ in 0..4 {
        run_frame(&mut orchestrator).unwrap();
    }

    let state = state.borrow();
    assert_eq!(
        state.rebuild_events(),
        vec![
            Event::Built {
                id: 0,
                previous: None
            },
            Event::Built {
                id: 1,
                previous: Some(0)
            },
            Event::Dropped(0),
        ]
    );

    let idle = state.events.iter().position(|e| *e == Event::WaitIdle);
    let rebuilt = state
        .events
        .iter()
        .position(|e| matches!(e, Event::Built { id: 1, .. }));
    assert!(idle.unwrap() < rebuilt.unwrap());
}

#[test]
fn test_minimized_window_waits_without_acquiring() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);
    for _ in 0..3 {
        run_frame(&mut orchestrator).unwrap();
    }

    let restored = vk::Extent2D {
        width: 1024,
        height: 768,
    };
    orchestrator.viewport_mut().minimize(50, restored);
    let acquires_before = state.borrow().acquire_calls;

    assert!(!run_frame(&mut orchestrator).unwrap());
    assert_eq!(orchestrator.viewport().wait_calls, 50);
    assert_eq!(state.borrow().acquire_calls, acquires_before);
    assert_eq!(orchestrator.rebuild_count(), 1);
    assert_eq!(orchestrator.surface_config().unwrap().extent, restored);

    // The restore counted as the resize that was just handled
    assert!(run_frame(&mut orchestrator).unwrap());
    assert_eq!(orchestrator.rebuild_count(), 1);
}

#[test]
fn test_resize_rebuilds_after_present() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);

    let cmd = orchestrator.begin_frame().unwrap().unwrap();
    orchestrator.begin_swap_chain_render_pass(cmd);
    orchestrator.viewport_mut().resize(LARGE);
    orchestrator.end_swap_chain_render_pass(cmd);
    orchestrator.end_frame().unwrap();

    assert_eq!(orchestrator.rebuild_count(), 1);
    assert!((orchestrator.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);

    run_frame(&mut orchestrator).unwrap();

    let state = state.borrow();
    assert_eq!(state.submits[0].surface, 0);
    assert_eq!(state.render_passes[0].extent, EXTENT);
    assert_eq!(state.render_passes[1].surface, 1);
    assert_eq!(state.render_passes[1].extent, LARGE);
}

#[test]
fn test_suboptimal_acquire_presents_then_rebuilds() {
    let state = GpuState::new();
    state.borrow_mut().suboptimal_acquires.insert(5);
    let mut orchestrator = orchestrator(&state);

    for _ in 0..10 {
        assert!(run_frame(&mut orchestrator).unwrap());
    }

    assert_eq!(orchestrator.rebuild_count(), 1);
    let state = state.borrow();
    assert_eq!(state.submits[5].surface, 0);
    assert_eq!(state.submits[6].surface, 1);
}

#[test]
fn test_stale_present_rebuilds_without_skipping() {
    let state = GpuState::new();
    state.borrow_mut().stale_presents.insert(10);
    let mut orchestrator = orchestrator(&state);

    for _ in 0..20 {
        assert!(run_frame(&mut orchestrator).unwrap());
    }

    assert_eq!(orchestrator.rebuild_count(), 1);
    let state = state.borrow();
    assert_eq!(state.submits.len(), 20);
    assert_eq!(state.submits[10].surface, 0);
    assert_eq!(state.submits[11].surface, 1);
}

#[test]
fn test_image_count_change_is_fatal() {
    let state = GpuState::new();
    state.borrow_mut().image_counts = vec![3, 2];
    let mut orchestrator = orchestrator(&state);

    run_frame(&mut orchestrator).unwrap();
    orchestrator.viewport_mut().resize(LARGE);

    let err = run_frame(&mut orchestrator).unwrap_err();
    assert!(matches!(
        err,
        RenderError::Rhi(RhiError::IncompatibleSurface(_))
    ));
    assert!(err.to_string().contains("image count changed from 3 to 2"));

    assert!(orchestrator.is_halted());
    assert_eq!(orchestrator.rebuild_count(), 0);
    assert_eq!(orchestrator.render_pass(), vk::RenderPass::null());
    assert!(matches!(orchestrator.begin_frame(), Err(RenderError::Halted)));
    assert!(matches!(orchestrator.begin_frame(), Err(RenderError::Halted)));

    let state = state.borrow();
    assert_eq!(state.submits.len(), 2);
    assert!(state.events.ends_with(&[Event::Dropped(0), Event::Dropped(1)]));
}

#[test]
fn test_device_lost_is_fatal() {
    let state = GpuState::new();
    state.borrow_mut().device_lost_on_submit = Some(3);
    let mut orchestrator = orchestrator(&state);

    for _ in 0..3 {
        run_frame(&mut orchestrator).unwrap();
    }

    let err = run_frame(&mut orchestrator).unwrap_err();
    assert!(matches!(err, RenderError::Rhi(RhiError::DeviceLost)));
    assert!(orchestrator.is_halted());
    assert!(!orchestrator.is_frame_in_progress());
    assert!(matches!(orchestrator.begin_frame(), Err(RenderError::Halted)));
    assert_eq!(state.borrow().submits.len(), 3);
}

#[test]
fn test_surface_collapsing_during_rebuild_is_retried() {
    let state = GpuState::new();
    {
        let mut state = state.borrow_mut();
        state.stale_acquires.insert(3);
        state.zero_extent_builds.insert(1);
    }
    let mut orchestrator = orchestrator(&state);

    let mut skipped = Vec::new();
    for frame in 0..10 {
        if !run_frame(&mut orchestrator).unwrap() {
            skipped.push(frame);
        }
    }

    // Frame 3 loses the old surface without getting a new one, frame 4
    // builds it from scratch.
    assert_eq!(skipped, vec![3, 4]);
    assert!(!orchestrator.is_halted());
    assert_eq!(orchestrator.rebuild_count(), 1);
    assert_eq!(orchestrator.surface_config().unwrap().extent, EXTENT);

    let state = state.borrow();
    assert_eq!(
        state.rebuild_events(),
        vec![
            Event::Built {
                id: 0,
                previous: None
            },
            Event::Dropped(0),
            Event::Built {
                id: 2,
                previous: None
            },
        ]
    );
    assert_eq!(state.submits.len(), 8);
    assert_eq!(state.submits[3].surface, 2);
    assert_eq!(state.reuse_violations, 0);
}

#[test]
fn test_close_while_minimized_stops_waiting() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);
    run_frame(&mut orchestrator).unwrap();

    orchestrator.viewport_mut().minimize(u32::MAX, EXTENT);
    orchestrator.viewport_mut().close_after_waits = Some(3);

    assert!(!run_frame(&mut orchestrator).unwrap());
    assert_eq!(orchestrator.viewport().wait_calls, 3);
    assert_eq!(orchestrator.rebuild_count(), 0);

    // Closed: no further waiting
    assert!(!run_frame(&mut orchestrator).unwrap());
    assert_eq!(orchestrator.viewport().wait_calls, 3);
    assert_eq!(state.borrow().acquire_calls, 1);
}

#[test]
fn test_startup_waits_for_drawable_size() {
    let state = GpuState::new();
    let mut viewport = MockViewport::new(EXTENT);
    viewport.minimize(5, LARGE);

    let orchestrator = orchestrator_with(&state, viewport);
    assert_eq!(orchestrator.viewport().wait_calls, 5);
    assert!(!orchestrator.viewport().resized);
    assert_eq!(orchestrator.surface_config().unwrap().extent, LARGE);
    assert_eq!(orchestrator.rebuild_count(), 0);
}

#[test]
fn test_startup_fails_if_closed_before_drawable() {
    let state = GpuState::new();
    let mut viewport = MockViewport::new(EXTENT);
    viewport.minimize(u32::MAX, EXTENT);
    viewport.close_requested = true;

    let result = FrameOrchestrator::new(MockBackend::new(&state), viewport, ClearValues::default());
    let Err(err) = result else {
        panic!("expected startup to fail");
    };
    assert!(matches!(err, RenderError::Platform(_)));
    assert_eq!(state.borrow().builds, 0);
}

#[test]
fn test_drop_frees_command_buffers_then_surface() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);
    for _ in 0..3 {
        run_frame(&mut orchestrator).unwrap();
    }
    drop(orchestrator);

    let state = state.borrow();
    assert_eq!(state.freed, state.allocated);
    assert_eq!(state.freed.len(), 2);
    assert!(state.events.ends_with(&[Event::WaitIdle, Event::Dropped(0)]));
}

#[test]
#[should_panic(expected = "already in progress")]
fn test_begin_frame_twice_panics() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);
    orchestrator.begin_frame().unwrap();
    let _ = orchestrator.begin_frame();
}

#[test]
#[should_panic(expected = "without a frame in progress")]
fn test_end_frame_without_begin_panics() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);
    let _ = orchestrator.end_frame();
}

#[test]
#[should_panic(expected = "without a frame in progress")]
fn test_end_frame_after_skipped_frame_panics() {
    let state = GpuState::new();
    state.borrow_mut().stale_acquires.insert(0);
    let mut orchestrator = orchestrator(&state);
    assert!(orchestrator.begin_frame().unwrap().is_none());
    let _ = orchestrator.end_frame();
}

#[test]
#[should_panic(expected = "without a frame in progress")]
fn test_render_pass_outside_frame_panics() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);
    orchestrator.begin_swap_chain_render_pass(MockCommandBuffer(100));
}

#[test]
#[should_panic(expected = "not the active command buffer")]
fn test_render_pass_on_wrong_command_buffer_panics() {
    let state = GpuState::new();
    let mut orchestrator = orchestrator(&state);
    orchestrator.begin_frame().unwrap();
    orchestrator.begin_swap_chain_render_pass(MockCommandBuffer(999));
}

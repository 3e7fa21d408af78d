//! Ember - Main Entry Point
//!
//! Opens a window and spins a fan of colored triangles, rendered through the
//! frame orchestrator with push constants. The keyboard pans and turns an
//! orthographic camera over the fan.

use std::f32::consts::{PI, TAU};
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use tracing::info;

use ember_core::{EngineConfig, Timer, init_logging};
use ember_platform::{KeyboardMovementController, Platform, ViewportSource};
use ember_renderer::{ClearValues, FrameOrchestrator, SimpleRenderSystem, VulkanBackend};
use ember_resources::{Model, triangle};
use ember_scene::{Camera, GameObjectRegistry, TransformComponent};

const CONFIG_PATH: &str = "ember.toml";
const TRIANGLE_COUNT: usize = 40;

/// Pastel palette, given in sRGB.
const PALETTE: [[f32; 3]; 5] = [
    [1.0, 0.7, 0.73],
    [1.0, 0.87, 0.73],
    [1.0, 1.0, 0.73],
    [0.73, 1.0, 0.8],
    [0.73, 0.88, 1.0],
];

fn main() -> Result<()> {
    let config = EngineConfig::load(CONFIG_PATH).context("Failed to load configuration")?;
    init_logging(&config.log.filter);
    info!("Starting Ember");

    let platform = Platform::new(&config.window).context("Failed to open window")?;
    let backend = VulkanBackend::new(platform.window(), &config.renderer)
        .context("Failed to initialize Vulkan")?;
    let device = backend.device().clone();

    // Declared first so it drops last: everything below holds the device.
    let mut orchestrator =
        FrameOrchestrator::new(backend, platform, ClearValues::from(&config.renderer))?;

    let render_system = SimpleRenderSystem::new(
        device.clone(),
        orchestrator.render_pass(),
        &config.renderer.shader_dir,
    )
    .context("Failed to create render system")?;

    let model = Arc::new(Model::new(device, &triangle())?);
    let mut registry = spawn_triangles(&model);

    let controller = KeyboardMovementController::new();
    let mut viewer = TransformComponent::default();
    let mut camera = Camera::new();

    info!("Initialization complete, entering main loop");

    let mut timer = Timer::new();
    loop {
        orchestrator.viewport_mut().poll_events();
        if orchestrator.viewport().should_close() {
            info!("Close requested, shutting down");
            break;
        }

        let dt = timer.delta_secs();
        for (i, object) in registry.objects_mut().iter_mut().enumerate() {
            let speed = 0.00002 * i as f32;
            object.transform2d.rotation =
                (object.transform2d.rotation + speed * dt * 60.0).rem_euclid(TAU);
        }
        controller.move_in_plane_xz(orchestrator.viewport().input(), dt, &mut viewer);
        camera.set_view_yxz(viewer.translation, viewer.rotation);

        let Some(cmd) = orchestrator.begin_frame()? else {
            continue;
        };
        // After begin_frame, which may have rebuilt the surface at a new size
        let aspect = orchestrator.aspect_ratio();
        camera.set_orthographic_projection(-aspect, aspect, -1.0, 1.0, -1.0, 1.0);

        orchestrator.begin_swap_chain_render_pass(cmd);
        render_system.render_game_objects(cmd, registry.objects(), &camera);
        orchestrator.end_swap_chain_render_pass(cmd);
        orchestrator.end_frame()?;
    }

    orchestrator.wait_idle()?;
    info!(
        "Rendered {} frames, {:.1} fps average, {} surface rebuilds",
        timer.frame_count(),
        timer.average_fps(),
        orchestrator.rebuild_count()
    );

    Ok(())
}

fn spawn_triangles(model: &Arc<Model>) -> GameObjectRegistry<Model> {
    let colors: Vec<Vec3> = PALETTE
        .iter()
        .map(|&[r, g, b]| Vec3::new(r, g, b).powf(2.2))
        .collect();

    let mut registry = GameObjectRegistry::new();
    for i in 0..TRIANGLE_COUNT {
        let object = registry.spawn();
        object.model = Some(Arc::clone(model));
        object.color = colors[i % colors.len()];
        object.transform2d.scale = Vec2::splat(0.5 + i as f32 * 0.025);
        object.transform2d.rotation = i as f32 * PI * 0.025;
    }
    registry
}

//! Draws game objects with the simple 2D pipeline.

use std::path::Path;
use std::sync::Arc;

use ember_resources::Model;
use ember_rhi::RhiResult;
use ember_rhi::command::CommandBuffer;
use ember_rhi::device::Device;
use ember_rhi::pipeline::{Pipeline, PipelineConfig, PipelineLayout};
use ember_rhi::vertex::Vertex;
use ember_rhi::vk;
use ember_scene::{Camera, GameObject};
use tracing::info;

use crate::push_constants::SimplePushConstantData;

pub const VERTEX_SHADER: &str = "simple_shader.vert.spv";
pub const FRAGMENT_SHADER: &str = "simple_shader.frag.spv";

/// Owns the pipeline for [`SimplePushConstantData`]-driven 2D objects.
///
/// Records into a command buffer whose swapchain render pass is already
/// begun, and leaves the pass open.
pub struct SimpleRenderSystem {
    device: Arc<Device>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
}

impl SimpleRenderSystem {
    /// Builds the pipeline against `render_pass`, loading compiled shaders
    /// from `shader_dir`.
    pub fn new(device: Arc<Device>, render_pass: vk::RenderPass, shader_dir: &Path) -> RhiResult<Self> {
        let push_constant_ranges = [SimplePushConstantData::range()];
        let pipeline_layout = PipelineLayout::new(device.clone(), &[], &push_constant_ranges)?;

        let mut config = PipelineConfig::default_config();
        config.render_pass = render_pass;
        config.pipeline_layout = pipeline_layout.handle();

        let pipeline = Pipeline::from_spirv_files(
            device.clone(),
            &shader_dir.join(VERTEX_SHADER),
            &shader_dir.join(FRAGMENT_SHADER),
            &[Vertex::binding_description()],
            &Vertex::attribute_descriptions(),
            &config,
        )?;

        info!("Simple render system ready (shaders from {})", shader_dir.display());

        Ok(Self {
            device,
            pipeline,
            pipeline_layout,
        })
    }

    /// Binds the pipeline and draws every object that has a model, seen
    /// through `camera`.
    pub fn render_game_objects(
        &self,
        command_buffer: vk::CommandBuffer,
        objects: &[GameObject<Model>],
        camera: &Camera,
    ) {
        let projection_view = camera.view_projection();
        let cmd = CommandBuffer::from_handle(self.device.clone(), command_buffer);
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());

        for object in objects {
            let Some(model) = object.model.as_deref() else {
                continue;
            };

            cmd.push_constants(
                self.pipeline_layout.handle(),
                SimplePushConstantData::STAGES,
                0,
                &SimplePushConstantData::for_object(object, projection_view),
            );
            model.bind(&cmd);
            model.draw(&cmd);
        }
    }
}

//! Vertex-buffer backed models.

use std::sync::Arc;

use ember_rhi::buffer::{Buffer, BufferDesc};
use ember_rhi::command::CommandBuffer;
use ember_rhi::device::Device;
use ember_rhi::vertex::Vertex;
use glam::{Vec2, Vec3};
use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Non-indexed geometry uploaded once into a host-visible vertex buffer.
pub struct Model {
    vertex_buffer: Buffer,
    vertex_count: u32,
}

impl Model {
    /// Uploads `vertices`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TooFewVertices`] for fewer than 3 vertices,
    /// or [`ResourceError::Gpu`] if the buffer cannot be created.
    pub fn new(device: Arc<Device>, vertices: &[Vertex]) -> ResourceResult<Self> {
        let vertex_count = validate_vertex_count(vertices.len())?;

        let vertex_buffer = Buffer::new_with_data(
            device,
            BufferDesc::VERTEX,
            bytemuck::cast_slice(vertices),
        )?;

        debug!(
            "Model created: {} vertices, {} bytes",
            vertex_count,
            vertex_buffer.size()
        );

        Ok(Self {
            vertex_buffer,
            vertex_count,
        })
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Binds the vertex buffer at binding 0.
    pub fn bind(&self, command_buffer: &CommandBuffer) {
        command_buffer.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
    }

    pub fn draw(&self, command_buffer: &CommandBuffer) {
        command_buffer.draw(self.vertex_count, 1, 0, 0);
    }
}

/// Checks that `count` vertices form at least one triangle and fit a draw
/// call's `u32` vertex count.
pub fn validate_vertex_count(count: usize) -> ResourceResult<u32> {
    if count < 3 {
        return Err(ResourceError::TooFewVertices(count));
    }
    u32::try_from(count).map_err(|_| ResourceError::TooFewVertices(count))
}

/// Red, green and blue corners of a triangle centered on the origin.
pub fn triangle() -> [Vertex; 3] {
    [
        Vertex::new(Vec2::new(0.0, -0.5), Vec3::new(1.0, 0.0, 0.0)),
        Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 1.0, 0.0)),
        Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
    ]
}

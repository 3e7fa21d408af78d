//! Push-constant block of the simple 2D shader.
//!
//! Must match `shaders/simple_shader.{vert,frag}`:
//!
//! ```glsl
//! layout(push_constant) uniform Push {
//!     mat2 transform;  // offset 0
//!     vec2 offset;     // offset 16
//!     vec3 color;      // offset 32
//! } push;
//! ```

use bytemuck::{Pod, Zeroable};
use ember_rhi::vk;
use ember_scene::GameObject;
use glam::{Mat2, Mat4, Vec2, Vec3};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SimplePushConstantData {
    pub transform: Mat2,
    pub offset: Vec2,
    _pad0: [f32; 2],
    pub color: Vec3,
    _pad1: f32,
}

impl SimplePushConstantData {
    pub const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
        vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
    );

    pub fn new(transform: Mat2, offset: Vec2, color: Vec3) -> Self {
        Self {
            transform,
            offset,
            color,
            ..Self::default()
        }
    }

    /// Places `object` on the z = 0 plane and folds `projection_view` into
    /// the 2D transform. Only affine projections (orthographic) survive the
    /// fold exactly.
    pub fn for_object<M>(object: &GameObject<M>, projection_view: Mat4) -> Self {
        let linear = Mat2::from_cols(
            projection_view.x_axis.truncate().truncate(),
            projection_view.y_axis.truncate().truncate(),
        );
        let offset = projection_view
            .project_point3(object.transform2d.translation.extend(0.0))
            .truncate();

        Self::new(linear * object.transform2d.mat2(), offset, object.color)
    }

    /// The range to declare in the pipeline layout.
    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: Self::STAGES,
            offset: 0,
            size: std::mem::size_of::<Self>() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_scene::Camera;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_layout_matches_shader_block() {
        assert_eq!(size_of::<SimplePushConstantData>(), 48);
        assert_eq!(offset_of!(SimplePushConstantData, transform), 0);
        assert_eq!(offset_of!(SimplePushConstantData, offset), 16);
        assert_eq!(offset_of!(SimplePushConstantData, color), 32);
    }

    #[test]
    fn test_range_covers_both_stages() {
        let range = SimplePushConstantData::range();
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 48);
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::VERTEX));
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::FRAGMENT));
    }

    #[test]
    fn test_bytes_carry_fields_at_their_offsets() {
        let data = SimplePushConstantData::new(
            Mat2::from_cols(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)),
            Vec2::new(5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
        );
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&data));
        assert_eq!(&floats[0..4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(&floats[4..6], &[5.0, 6.0]);
        assert_eq!(&floats[8..11], &[7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_for_object() {
        let mut registry: ember_scene::GameObjectRegistry<()> =
            ember_scene::GameObjectRegistry::new();
        let object = registry.spawn();
        object.color = Vec3::new(0.1, 0.2, 0.3);
        object.transform2d.translation = Vec2::new(0.5, -0.5);
        object.transform2d.scale = Vec2::splat(2.0);

        let data = SimplePushConstantData::for_object(object, Mat4::IDENTITY);
        assert_eq!(data.offset, Vec2::new(0.5, -0.5));
        assert_eq!(data.color, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(data.transform, Mat2::from_diagonal(Vec2::splat(2.0)));
    }

    #[test]
    fn test_for_object_applies_camera() {
        let mut registry: ember_scene::GameObjectRegistry<()> =
            ember_scene::GameObjectRegistry::new();
        let object = registry.spawn();
        object.transform2d.translation = Vec2::new(1.0, 0.5);

        // Wide viewport, camera panned half a unit to the right
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, -1.0, 1.0);
        camera.set_view_yxz(Vec3::new(0.5, 0.0, 0.0), Vec3::ZERO);

        let data = SimplePushConstantData::for_object(object, camera.view_projection());
        assert!((data.offset - Vec2::new(0.25, 0.5)).length() < 1e-6);
        assert!(
            data.transform
                .abs_diff_eq(Mat2::from_diagonal(Vec2::new(0.5, 1.0)), 1e-6)
        );
    }
}

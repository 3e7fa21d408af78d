//! Camera projection and view matrices.
//!
//! Conventions match the Vulkan clip space the pipeline renders into: depth
//! maps to `0..1`, +Y points down the screen and the camera looks along +Z.

use glam::{Mat4, Vec3, Vec4};

/// Default up vector: -Y, since +Y points down in Vulkan clip space.
pub const DEFAULT_UP: Vec3 = Vec3::NEG_Y;

/// Projection and view matrices for rendering a scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps the box `left..right`, `top..bottom`, `near..far` onto clip space.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = Mat4::from_cols(
            Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (bottom - top), 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0 / (far - near), 0.0),
            Vec4::new(
                -(right + left) / (right - left),
                -(bottom + top) / (bottom - top),
                -near / (far - near),
                1.0,
            ),
        );
    }

    /// Perspective frustum with vertical field of view `fov_y` (radians).
    ///
    /// # Panics
    ///
    /// Panics if `aspect` is zero.
    pub fn set_perspective_projection(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        assert!(
            aspect.abs() > f32::EPSILON,
            "perspective projection needs a non-zero aspect ratio"
        );
        let tan_half_fov = (fov_y / 2.0).tan();

        self.projection = Mat4::from_cols(
            Vec4::new(1.0 / (aspect * tan_half_fov), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / tan_half_fov, 0.0, 0.0),
            Vec4::new(0.0, 0.0, far / (far - near), 1.0),
            Vec4::new(0.0, 0.0, -(far * near) / (far - near), 0.0),
        );
    }

    /// Places the camera at `position` looking along `direction`.
    ///
    /// # Panics
    ///
    /// Panics if `direction` is zero or parallel to `up`.
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(up).normalize();
        assert!(
            w.is_finite() && u.is_finite(),
            "view direction must be non-zero and not parallel to up"
        );
        let v = w.cross(u);

        self.view = view_from_basis(position, u, v, w);
    }

    /// Places the camera at `position` looking at `target`.
    ///
    /// # Panics
    ///
    /// Panics if `target` equals `position`, or the line between them is
    /// parallel to `up`.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Places the camera at `position` oriented by Tait-Bryan angles applied
    /// Y, X, Z: the inverse of a `TransformComponent` with the same values.
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let (s3, c3) = rotation.z.sin_cos();
        let (s2, c2) = rotation.x.sin_cos();
        let (s1, c1) = rotation.y.sin_cos();

        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);

        self.view = view_from_basis(position, u, v, w);
    }

    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// `projection * view`, ready to multiply world-space positions.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// World-to-camera matrix for an orthonormal basis (`u` right, `v` down,
/// `w` forward) at `position`.
fn view_from_basis(position: Vec3, u: Vec3, v: Vec3, w: Vec3) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(u.x, v.x, w.x, 0.0),
        Vec4::new(u.y, v.y, w.y, 0.0),
        Vec4::new(u.z, v.z, w.z, 0.0),
        Vec4::new(-u.dot(position), -v.dot(position), -w.dot(position), 1.0),
    )
}

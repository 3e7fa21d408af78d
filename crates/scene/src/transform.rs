//! Object transforms.
//!
//! - [`Transform2d`]: rotation and scale in the plane plus a translation,
//!   fed to the 2D shader as a `mat2` and an offset
//! - [`TransformComponent`]: full 3D transform using Tait-Bryan angles
//!   applied in Y, X, Z order
//!
//! # Example
//!
//! ```
//! use ember_scene::Transform2d;
//! use glam::Vec2;
//!
//! let transform = Transform2d {
//!     translation: Vec2::new(0.2, 0.0),
//!     scale: Vec2::splat(0.5),
//!     rotation: std::f32::consts::FRAC_PI_2,
//! };
//! let rotated = transform.mat2() * Vec2::X;
//! assert!((rotated - Vec2::new(0.0, 0.5)).length() < 1e-6);
//! ```

use glam::{Mat2, Mat4, Vec2, Vec3};

/// Planar transform: `mat2() * p + translation`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2d {
    pub translation: Vec2,
    pub scale: Vec2,
    /// Radians, counter-clockwise in a y-up frame.
    pub rotation: f32,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform2d {
    /// Rotation times scale; translation is applied separately.
    pub fn mat2(&self) -> Mat2 {
        Mat2::from_angle(self.rotation) * Mat2::from_diagonal(self.scale)
    }
}

/// 3D transform. Rotation angles are in radians and applied Y, then X, then Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformComponent {
    pub translation: Vec3,
    pub scale: Vec3,
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl TransformComponent {
    /// `translate * Ry * Rx * Rz * scale`.
    pub fn mat4(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx_eq_vec2(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_transform2d_default_is_identity() {
        assert_eq!(Transform2d::default().mat2(), Mat2::IDENTITY);
    }

    #[test]
    fn test_transform2d_scales_before_rotating() {
        let transform = Transform2d {
            translation: Vec2::ZERO,
            scale: Vec2::new(2.0, 0.5),
            rotation: FRAC_PI_2,
        };
        // x is doubled first, then turned onto +y
        assert!(approx_eq_vec2(
            transform.mat2() * Vec2::X,
            Vec2::new(0.0, 2.0)
        ));
        assert!(approx_eq_vec2(
            transform.mat2() * Vec2::Y,
            Vec2::new(-0.5, 0.0)
        ));
    }

    #[test]
    fn test_transform_component_translation_and_scale() {
        let transform = TransformComponent {
            translation: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::splat(2.0),
            rotation: Vec3::ZERO,
        };
        let p = transform.mat4().transform_point3(Vec3::ONE);
        assert!(approx_eq_vec3(p, Vec3::new(3.0, 4.0, 5.0)));
    }

    #[test]
    fn test_transform_component_rotation_order() {
        let transform = TransformComponent {
            rotation: Vec3::new(FRAC_PI_2, FRAC_PI_2, 0.0),
            ..Default::default()
        };
        // Rx maps +z to -y, then Ry leaves -y unchanged
        let p = transform.mat4().transform_vector3(Vec3::Z);
        assert!(approx_eq_vec3(p, Vec3::new(0.0, -1.0, 0.0)));

        let expected = Mat4::from_rotation_y(FRAC_PI_2) * Mat4::from_rotation_x(FRAC_PI_2);
        assert!(transform.mat4().abs_diff_eq(expected, 1e-6));
    }
}

//! Keyboard fly-through controller.
//!
//! Drives a [`TransformComponent`] from the held keys: arrow keys turn it,
//! movement keys slide it parallel to the XZ plane relative to its yaw.

use std::f32::consts::TAU;

use ember_scene::TransformComponent;
use glam::Vec3;

use crate::input::{InputState, KeyCode};

/// Pitch limit in radians, short of straight up or down.
const MAX_PITCH: f32 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyMappings {
    pub move_left: KeyCode,
    pub move_right: KeyCode,
    pub move_forward: KeyCode,
    pub move_backward: KeyCode,
    pub move_up: KeyCode,
    pub move_down: KeyCode,
    pub look_left: KeyCode,
    pub look_right: KeyCode,
    pub look_up: KeyCode,
    pub look_down: KeyCode,
}

impl Default for KeyMappings {
    fn default() -> Self {
        Self {
            move_left: KeyCode::KeyA,
            move_right: KeyCode::KeyD,
            move_forward: KeyCode::KeyW,
            move_backward: KeyCode::KeyS,
            move_up: KeyCode::KeyE,
            move_down: KeyCode::KeyQ,
            look_left: KeyCode::ArrowLeft,
            look_right: KeyCode::ArrowRight,
            look_up: KeyCode::ArrowUp,
            look_down: KeyCode::ArrowDown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyboardMovementController {
    pub keys: KeyMappings,
    /// Units per second.
    pub move_speed: f32,
    /// Radians per second.
    pub look_speed: f32,
}

impl Default for KeyboardMovementController {
    fn default() -> Self {
        Self {
            keys: KeyMappings::default(),
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

impl KeyboardMovementController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `dt` seconds of the held keys to `transform`.
    ///
    /// Pitch stays within ±1.5 rad and yaw is wrapped into `[0, 2π)`.
    /// Diagonal input moves no faster than a single key.
    pub fn move_in_plane_xz(&self, input: &InputState, dt: f32, transform: &mut TransformComponent) {
        let axis = |positive: KeyCode, negative: KeyCode| {
            let mut value = 0.0;
            if input.is_key_pressed(positive) {
                value += 1.0;
            }
            if input.is_key_pressed(negative) {
                value -= 1.0;
            }
            value
        };

        let rotate = Vec3::new(
            axis(self.keys.look_up, self.keys.look_down),
            axis(self.keys.look_right, self.keys.look_left),
            0.0,
        );
        if rotate.length_squared() > f32::EPSILON {
            transform.rotation += self.look_speed * dt * rotate.normalize();
        }

        transform.rotation.x = transform.rotation.x.clamp(-MAX_PITCH, MAX_PITCH);
        transform.rotation.y = transform.rotation.y.rem_euclid(TAU);

        let yaw = transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::NEG_Y;

        let movement = forward * axis(self.keys.move_forward, self.keys.move_backward)
            + right * axis(self.keys.move_right, self.keys.move_left)
            + up * axis(self.keys.move_up, self.keys.move_down);
        if movement.length_squared() > f32::EPSILON {
            transform.translation += self.move_speed * dt * movement.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn holding(keys: &[KeyCode]) -> InputState {
        let mut input = InputState::new();
        for &key in keys {
            input.on_key_pressed(key);
        }
        input
    }

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_idle_keys_leave_transform_alone() {
        let controller = KeyboardMovementController::new();
        let mut transform = TransformComponent {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.2, 1.0, 0.0),
            ..Default::default()
        };
        let before = transform;

        controller.move_in_plane_xz(&InputState::new(), 0.5, &mut transform);
        assert_eq!(transform, before);
    }

    #[test]
    fn test_forward_follows_yaw() {
        let controller = KeyboardMovementController::new();
        let input = holding(&[KeyCode::KeyW]);

        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(&input, 0.5, &mut transform);
        assert_close(transform.translation, Vec3::new(0.0, 0.0, 1.5));

        // Facing +x, forward becomes +x and right becomes -z
        let mut transform = TransformComponent {
            rotation: Vec3::new(0.0, FRAC_PI_2, 0.0),
            ..Default::default()
        };
        controller.move_in_plane_xz(&holding(&[KeyCode::KeyD]), 1.0, &mut transform);
        assert_close(transform.translation, Vec3::new(0.0, 0.0, -3.0));
    }

    #[test]
    fn test_up_is_negative_y() {
        let controller = KeyboardMovementController::new();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(&holding(&[KeyCode::KeyE]), 1.0, &mut transform);
        assert_close(transform.translation, Vec3::new(0.0, -3.0, 0.0));
    }

    #[test]
    fn test_diagonal_is_not_faster() {
        let controller = KeyboardMovementController::new();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(&holding(&[KeyCode::KeyW, KeyCode::KeyD]), 1.0, &mut transform);

        assert!((transform.translation.length() - controller.move_speed).abs() < 1e-5);
        assert!(transform.translation.x > 0.0 && transform.translation.z > 0.0);
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let controller = KeyboardMovementController::new();
        let mut transform = TransformComponent::default();
        let input = holding(&[KeyCode::KeyW, KeyCode::KeyS, KeyCode::ArrowLeft, KeyCode::ArrowRight]);
        controller.move_in_plane_xz(&input, 1.0, &mut transform);
        assert_eq!(transform, TransformComponent::default());
    }

    #[test]
    fn test_pitch_is_clamped() {
        let controller = KeyboardMovementController::new();
        let mut transform = TransformComponent::default();
        let input = holding(&[KeyCode::ArrowUp]);
        for _ in 0..10 {
            controller.move_in_plane_xz(&input, 1.0, &mut transform);
        }
        assert_eq!(transform.rotation.x, MAX_PITCH);

        let input = holding(&[KeyCode::ArrowDown]);
        for _ in 0..10 {
            controller.move_in_plane_xz(&input, 1.0, &mut transform);
        }
        assert_eq!(transform.rotation.x, -MAX_PITCH);
    }

    #[test]
    fn test_yaw_wraps() {
        let controller = KeyboardMovementController::new();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(&holding(&[KeyCode::ArrowLeft]), 1.0, &mut transform);

        assert!((transform.rotation.y - (TAU - 1.5)).abs() < 1e-5);
    }
}

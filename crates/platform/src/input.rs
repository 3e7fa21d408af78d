//! Keyboard state fed by the window's key events.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Keys currently held down.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    /// Forgets every held key. Releases that happen while the window is
    /// unfocused are never delivered.
    pub fn release_all(&mut self) {
        self.pressed_keys.clear();
    }

    #[inline]
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }
}

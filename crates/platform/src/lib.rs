//! Platform layer: the winit window, its Vulkan surface, event pumping and
//! keyboard input.
//!
//! The renderer sees the window only through [`ViewportSource`].

mod controller;
mod event_loop;
mod input;
mod viewport;
mod window;

pub use controller::{KeyMappings, KeyboardMovementController};
pub use event_loop::Platform;
pub use input::{InputState, KeyCode};
pub use viewport::{ViewportSource, is_zero_extent};
pub use window::{Surface, Window};

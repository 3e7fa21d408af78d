//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Safe RAII wrappers over `ash`:
//! - Instance, physical device selection and logical device
//! - Swapchain with its framebuffers, depth buffer and render pass
//! - Command pools and recording helpers
//! - Buffers backed by `gpu-allocator`
//! - Shaders, pipeline layouts and graphics pipelines
//! - Per-frame synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod depth;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;

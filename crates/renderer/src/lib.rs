//! Frame orchestration and drawing.
//!
//! This crate ties the GPU layer to the window:
//! - [`FrameOrchestrator`]: begin/end frame protocol, frame slots and
//!   presentation-surface rebuilds
//! - [`RenderBackend`] / [`PresentationSurface`]: the seams it drives, with
//!   [`VulkanBackend`] as the real implementation
//! - [`SimpleRenderSystem`]: draws 2D game objects with push constants

pub mod backend;
pub mod error;
pub mod frame;
pub mod push_constants;
pub mod render_system;
pub mod vulkan;

pub use backend::{ClearValues, PresentationSurface, RenderBackend, SurfaceConfig, ensure_compatible};
pub use error::{RenderError, RenderResult};
pub use frame::FrameOrchestrator;
pub use push_constants::SimplePushConstantData;
pub use render_system::SimpleRenderSystem;
pub use vulkan::VulkanBackend;

pub use ember_rhi::sync::MAX_FRAMES_IN_FLIGHT;

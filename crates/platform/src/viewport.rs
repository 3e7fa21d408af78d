//! The view of the output window that frame orchestration depends on.

use ash::vk;

/// Size and resize notifications of the render target's window.
///
/// Implemented by [`Platform`](crate::Platform); tests substitute scripted
/// implementations.
pub trait ViewportSource {
    /// Current size in pixels. A zero dimension means the window is
    /// minimized and nothing can be presented.
    fn extent(&self) -> vk::Extent2D;

    /// Whether a resize happened since the flag was last reset.
    fn was_resized(&self) -> bool;

    fn reset_resized_flag(&mut self);

    /// Blocks until at least one window event has been processed.
    fn wait_events(&mut self);

    /// The user asked to close the window. Waits on a zero extent give up
    /// once this is set.
    fn should_close(&self) -> bool {
        false
    }

    fn aspect_ratio(&self) -> f32 {
        let extent = self.extent();
        if extent.height == 0 {
            return 1.0;
        }
        extent.width as f32 / extent.height as f32
    }
}

/// True if `extent` has a zero dimension.
#[inline]
pub fn is_zero_extent(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

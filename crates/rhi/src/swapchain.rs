//! Swapchain and the per-image resources that live and die with it.
//!
//! A [`Swapchain`] owns, next to the `VkSwapchainKHR` itself:
//! - one color view and one framebuffer per swapchain image
//! - the shared [`DepthBuffer`]
//! - the [`RenderPass`] the framebuffers were built against
//! - the image-ownership table mapping each image to the fence of the frame
//!   slot that last submitted work for it
//!
//! Rebuilding is done by constructing a new swapchain and handing the old one
//! in by value; its handle is passed as `old_swapchain` and it is destroyed
//! right after the replacement exists.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::depth::DepthBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::render_pass::RenderPass;
use crate::sync::{FrameSync, wait_for_fence};

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries what `surface` supports on `physical_device`.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count {}..{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Inputs to [`Swapchain::new`] that do not change between rebuilds except
/// for `extent`.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    /// Window size in pixels; overridden by the surface's current extent
    /// when the platform reports one.
    pub extent: vk::Extent2D,
    /// Used when supported, FIFO otherwise.
    pub preferred_present_mode: vk::PresentModeKHR,
    pub depth_format: vk::Format,
}

/// Result of [`Swapchain::acquire_next_image`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ready(u32),
    /// The image can be rendered and presented, but the swapchain no longer
    /// matches the surface exactly.
    Suboptimal(u32),
    /// Out of date; nothing was acquired.
    Stale,
}

/// Result of [`Swapchain::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presentation reported out-of-date or suboptimal; the frame's work was
    /// still submitted.
    Stale,
}

/// Vulkan swapchain plus framebuffers, depth and render pass.
///
/// Not thread-safe; one thread drives acquire and submit.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    /// Fence of the frame slot that last submitted work for each image, or
    /// null if none has.
    images_in_flight: Vec<vk::Fence>,
    depth_buffer: DepthBuffer,
    render_pass: RenderPass,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Builds a swapchain for `desc.surface`.
    ///
    /// When `previous` is given its handle is passed as `old_swapchain` and
    /// the previous swapchain is destroyed once the new one has been created.
    /// The caller must make sure the device is idle before rebuilding.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Surface queries fail or report no format/present mode
    /// - The surface has no drawable area ([`RhiError::ZeroExtent`]); `previous`
    ///   is still destroyed
    /// - Swapchain, view, depth, render pass or framebuffer creation fails
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        desc: &SwapchainDesc,
        previous: Option<Swapchain>,
    ) -> RhiResult<Self> {
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        let support =
            SwapchainSupportDetails::query(device.physical_device(), desc.surface, &surface_loader)?;

        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, desc.preferred_present_mode);
        let extent = choose_extent(&support.capabilities, desc.extent).ok_or(RhiError::ZeroExtent)?;
        let min_image_count = determine_image_count(&support.capabilities);

        let graphics_family = device.graphics_family();
        let present_family = device.present_family();
        let queue_family_indices = [graphics_family, present_family];
        let (sharing_mode, shared_families) = if graphics_family != present_family {
            (vk::SharingMode::CONCURRENT, &queue_family_indices[..])
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let old_swapchain = previous
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), |old| old.swapchain);

        info!(
            "Creating swapchain: {}x{}, {:?}, {:?}, min {} images{}",
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            min_image_count,
            if previous.is_some() { " (rebuild)" } else { "" }
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(desc.surface)
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        // The old swapchain has been retired by the create call
        drop(previous);

        // Dependent resources. Each step hands ownership to a guard so a
        // failure part-way destroys what already exists.
        let mut partial = Partial {
            device: &device,
            loader: &swapchain_loader,
            swapchain,
            views: Vec::new(),
            framebuffers: Vec::new(),
        };

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };
        for &image in &images {
            let view = create_color_view(&device, image, surface_format.format)?;
            partial.views.push(view);
        }

        let depth_buffer = DepthBuffer::new(device.clone(), extent, desc.depth_format)?;
        let render_pass = RenderPass::new(device.clone(), surface_format.format, desc.depth_format)?;

        for &view in &partial.views {
            let attachments = [view, depth_buffer.image_view()];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass.handle())
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe { device.handle().create_framebuffer(&framebuffer_info, None)? };
            partial.framebuffers.push(framebuffer);
        }

        let (swapchain, image_views, framebuffers) = partial.release();

        info!(
            "Swapchain ready with {} images ({}x{})",
            images.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            images_in_flight: vec![vk::Fence::null(); images.len()],
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            framebuffers,
            depth_buffer,
            render_pass,
            format: surface_format.format,
            extent,
        })
    }

    /// Waits until `sync`'s slot is free, then acquires the next image,
    /// signaling the slot's image-available semaphore.
    ///
    /// # Errors
    ///
    /// Out-of-date is reported as [`AcquireOutcome::Stale`]; any other
    /// failure is returned as an error.
    pub fn acquire_next_image(&self, sync: &FrameSync) -> RhiResult<AcquireOutcome> {
        sync.in_flight_fence().wait(u64::MAX)?;

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available_handle(),
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, false)) => Ok(AcquireOutcome::Ready(index)),
            Ok((index, true)) => {
                debug!("Acquired image {} from a suboptimal swapchain", index);
                Ok(AcquireOutcome::Suboptimal(index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Stale),
            Err(e) => Err(e.into()),
        }
    }

    /// Submits `command_buffer` for `image_index` and queues the image for
    /// presentation.
    ///
    /// If another slot still has work in flight on the same image, waits for
    /// that slot's fence first. The submission waits on `sync`'s
    /// image-available semaphore at color output, signals its
    /// render-finished semaphore and fence, and presentation waits on
    /// render-finished.
    ///
    /// # Errors
    ///
    /// Out-of-date and suboptimal presentation are reported as
    /// [`PresentOutcome::Stale`]; any other failure is returned as an error.
    pub fn submit(
        &mut self,
        command_buffer: vk::CommandBuffer,
        sync: &FrameSync,
        image_index: u32,
    ) -> RhiResult<PresentOutcome> {
        let slot = image_index as usize;
        let owner = *self.images_in_flight.get(slot).ok_or_else(|| {
            RhiError::InvalidHandle(format!(
                "Image index {} out of range ({} images)",
                image_index,
                self.images.len()
            ))
        })?;

        if owner != vk::Fence::null() {
            wait_for_fence(&self.device, owner, u64::MAX)?;
        }
        self.images_in_flight[slot] = sync.in_flight_fence_handle();

        let wait_semaphores = [sync.image_available_handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished_handle()];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        sync.in_flight_fence().reset()?;
        unsafe {
            self.device
                .submit_graphics(std::slice::from_ref(&submit_info), sync.in_flight_fence_handle())?;
        }

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.device.present_queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(e.into()),
        }
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_buffer.format()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Framebuffer for swapchain image `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn framebuffer(&self, index: u32) -> vk::Framebuffer {
        self.framebuffers[index as usize]
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.handle().destroy_framebuffer(framebuffer, None);
            }
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Owns the raw handles created so far while a swapchain is assembled.
struct Partial<'a> {
    device: &'a Device,
    loader: &'a ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Partial<'_> {
    fn release(mut self) -> (vk::SwapchainKHR, Vec<vk::ImageView>, Vec<vk::Framebuffer>) {
        let swapchain = std::mem::replace(&mut self.swapchain, vk::SwapchainKHR::null());
        let views = std::mem::take(&mut self.views);
        let framebuffers = std::mem::take(&mut self.framebuffers);
        (swapchain, views, framebuffers)
    }
}

impl Drop for Partial<'_> {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.handle().destroy_framebuffer(framebuffer, None);
            }
            for &view in &self.views {
                self.device.handle().destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                warn!("Destroying partially built swapchain");
                self.loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}

fn create_color_view(device: &Device, image: vk::Image, format: vk::Format) -> RhiResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    let view = unsafe { device.handle().create_image_view(&create_info, None)? };
    Ok(view)
}

/// Prefers B8G8R8A8_SRGB / SRGB_NONLINEAR, otherwise the first format.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match (preferred, formats.first()) {
        (Some(&format), _) => Ok(format),
        (None, Some(&first)) => {
            warn!("B8G8R8A8_SRGB unavailable, using {:?}", first.format);
            Ok(first)
        }
        (None, None) => Err(RhiError::SwapchainError(
            "Surface reports no formats".to_string(),
        )),
    }
}

/// Uses `preferred` if the surface supports it, else FIFO, which every
/// implementation must support.
fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if present_modes.contains(&preferred) {
        return preferred;
    }
    debug!("{:?} unsupported, falling back to FIFO", preferred);
    vk::PresentModeKHR::FIFO
}

/// The surface's current extent if defined, else `requested` clamped to the
/// surface limits. `None` if that leaves nothing to draw to, which happens
/// when the window is minimized after the caller last checked its size.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> Option<vk::Extent2D> {
    let extent = if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        clamp_extent(capabilities, requested)
    };

    (extent.width > 0 && extent.height > 0).then_some(extent)
}

fn clamp_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One above the minimum, capped by the maximum (0 means unbounded).
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 2048,
                height: 2048,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_surface_format_prefers_srgb() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(
            choose_surface_format(&formats).unwrap().format,
            vk::Format::B8G8R8A8_SRGB
        );
    }

    #[test]
    fn test_surface_format_falls_back_to_first() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(
            choose_surface_format(&formats).unwrap().format,
            vk::Format::R8G8B8A8_UNORM
        );
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn test_present_mode_uses_preference_when_available() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_prefers_current_surface_extent() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        )
        .unwrap();
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn test_zero_extent_has_nothing_to_build() {
        let mut caps = capabilities(2, 3);
        let requested = vk::Extent2D {
            width: 800,
            height: 600,
        };

        // Minimized between the caller's size check and the build
        caps.current_extent = vk::Extent2D {
            width: 0,
            height: 0,
        };
        assert_eq!(choose_extent(&caps, requested), None);

        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 0,
        };
        assert_eq!(choose_extent(&caps, requested), None);

        // Undefined current extent with a collapsed surface range
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        caps.min_image_extent = vk::Extent2D {
            width: 0,
            height: 0,
        };
        caps.max_image_extent = vk::Extent2D {
            width: 0,
            height: 0,
        };
        assert_eq!(choose_extent(&caps, requested), None);
    }

    #[test]
    fn test_extent_is_clamped_when_undefined() {
        let caps = capabilities(2, 3);
        let big = choose_extent(
            &caps,
            vk::Extent2D {
                width: 4000,
                height: 10,
            },
        )
        .unwrap();
        assert_eq!((big.width, big.height), (2048, 64));

        let fits = choose_extent(
            &caps,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        )
        .unwrap();
        assert_eq!((fits.width, fits.height), (800, 600));
    }

    #[test]
    fn test_image_count_is_min_plus_one_capped() {
        assert_eq!(determine_image_count(&capabilities(2, 3)), 3);
        assert_eq!(determine_image_count(&capabilities(2, 2)), 2);
        assert_eq!(determine_image_count(&capabilities(3, 8)), 4);
        assert_eq!(determine_image_count(&capabilities(2, 0)), 3);
    }

    #[test]
    fn test_support_details_adequacy() {
        let mut details = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![surface_format(vk::Format::B8G8R8A8_SRGB)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(details.is_adequate());

        details.present_modes.clear();
        assert!(!details.is_adequate());
    }
}

//! GPU buffers backed by `gpu-allocator` memory.
//!
//! Host-visible buffers (`MemoryLocation::CpuToGpu`) come back persistently
//! mapped, so [`Buffer::write_data`] is a plain memcpy.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// What a buffer is created for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferDesc {
    /// Allocation label shown in allocator reports.
    pub name: &'static str,
    pub usage: vk::BufferUsageFlags,
    pub location: MemoryLocation,
}

impl BufferDesc {
    /// Host-visible vertex buffer written once at creation.
    pub const VERTEX: Self = Self {
        name: "vertex",
        usage: vk::BufferUsageFlags::VERTEX_BUFFER,
        location: MemoryLocation::CpuToGpu,
    };
}

/// GPU buffer wrapper with managed memory.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    /// Taken in `Drop`.
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    desc: BufferDesc,
}

impl Buffer {
    /// Creates an uninitialized buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or buffer/memory creation fails.
    pub fn new(device: Arc<Device>, desc: BufferDesc, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let allocation = match allocate_and_bind(&device, buffer, desc) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        debug!("Created {} buffer: {} bytes", desc.name, size);

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            desc,
        })
    }

    /// Creates a buffer sized to `data` and copies `data` into it. The
    /// descriptor must name a host-visible location.
    pub fn new_with_data(device: Arc<Device>, desc: BufferDesc, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, desc, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Copies `data` into the mapped memory at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer memory is not mapped
    /// - The write would exceed the buffer size
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "Write exceeds buffer size: offset {} + data {} > buffer {}",
                offset,
                data.len(),
                self.size
            )));
        }

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst as *mut u8, data.len());
        }

        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.lock_allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} buffer allocation: {:?}", self.desc.name, e);
                    }
                }
                Err(e) => error!("Leaking {} buffer allocation: {}", self.desc.name, e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.desc.name);
    }
}

fn allocate_and_bind(
    device: &Device,
    buffer: vk::Buffer,
    desc: BufferDesc,
) -> RhiResult<Allocation> {
    let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

    let mut allocator = device.lock_allocator()?;
    let allocation = allocator.allocate(&AllocationCreateDesc {
        name: desc.name,
        requirements,
        location: desc.location,
        linear: true,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    })?;

    let bound = unsafe {
        device
            .handle()
            .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
    };
    if let Err(e) = bound {
        if let Err(free_err) = allocator.free(allocation) {
            error!("Failed to free {} allocation: {:?}", desc.name, free_err);
        }
        return Err(e.into());
    }

    Ok(allocation)
}

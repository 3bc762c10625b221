use voxstream_cache::LookupTable;
use voxstream_core::constants::LOOKUP_CHANNEL_COUNT;

/// Storage buffer mirroring the manager's lookup table for shader access.
pub struct GpuLookupBuffer {
    buffer: wgpu::Buffer,
    capacity: u32,
}

impl GpuLookupBuffer {
    /// Byte size of a lookup buffer with `capacity` entries.
    pub fn byte_size(capacity: u32) -> u64 {
        capacity as u64 * LOOKUP_CHANNEL_COUNT as u64 * 4
    }

    pub fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bucket-lookup"),
            size: Self::byte_size(capacity),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, capacity }
    }

    /// Upload the whole table. Called after each reconciliation or drain.
    pub fn upload(&self, queue: &wgpu::Queue, table: &LookupTable) {
        if table.capacity() != self.capacity {
            log::warn!(
                "GpuLookupBuffer: table has {} entries, buffer holds {}; skipping upload",
                table.capacity(),
                self.capacity
            );
            return;
        }
        queue.write_buffer(&self.buffer, 0, table.as_bytes());
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

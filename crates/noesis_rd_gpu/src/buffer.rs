//! Dynamic vertex and index rings
//!
//! The engine writes into a CPU staging copy of the ring; unmapping pushes the
//! written range to the GPU buffer through the queue.

use noesis_rd_core::{RenderError, Result, RingAllocator};

/// Copy alignment required by `Queue::write_buffer`
const WRITE_ALIGNMENT: u32 = wgpu::COPY_BUFFER_ALIGNMENT as u32;

/// One fixed-size GPU ring with its staging memory
pub struct DynamicBuffer {
    ring: RingAllocator,
    buffer: wgpu::Buffer,
    staging: Vec<u8>,
    mapped: Option<(u32, u32)>,
}

impl DynamicBuffer {
    pub fn new(
        device: &wgpu::Device,
        name: &'static str,
        capacity: u32,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let ring = RingAllocator::new(name, capacity, WRITE_ALIGNMENT);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(name),
            size: ring.capacity() as u64,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        tracing::debug!("{} ring: {} bytes", name, ring.capacity());

        Self {
            staging: vec![0; ring.capacity() as usize],
            ring,
            buffer,
            mapped: None,
        }
    }

    /// Reserve `size` bytes and expose them for writing
    pub fn map(&mut self, size: u32) -> Result<&mut [u8]> {
        if self.mapped.is_some() {
            return Err(RenderError::AlreadyMapped(self.ring.name()));
        }
        let offset = self.ring.allocate(size)?;
        self.mapped = Some((offset, size));
        let start = offset as usize;
        Ok(&mut self.staging[start..start + size as usize])
    }

    /// Upload the range written since `map`
    pub fn unmap(&mut self, queue: &wgpu::Queue) -> Result<()> {
        let (offset, size) = self
            .mapped
            .take()
            .ok_or(RenderError::NotMapped(self.ring.name()))?;

        // Offsets are aligned by the ring; pad the length, the ring end is aligned too
        let padded = size.next_multiple_of(WRITE_ALIGNMENT).min(self.ring.capacity() - offset);
        if padded > 0 {
            let range = offset as usize..(offset + padded) as usize;
            queue.write_buffer(&self.buffer, offset as u64, &self.staging[range]);
        }
        Ok(())
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Byte offset of the most recent allocation
    pub fn draw_pos(&self) -> u32 {
        self.ring.draw_pos()
    }

    pub fn capacity(&self) -> u32 {
        self.ring.capacity()
    }

    pub fn wraps(&self) -> u64 {
        self.ring.wraps()
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

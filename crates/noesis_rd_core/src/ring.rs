//! Ring allocation over a fixed-capacity buffer
//!
//! Allocations are handed out front to back. One that does not fit in the
//! remaining space restarts at offset 0, and anything written before the wrap
//! is considered consumed.

use crate::error::{RenderError, Result};

/// Offset bookkeeping for one dynamic buffer
#[derive(Clone, Debug)]
pub struct RingAllocator {
    name: &'static str,
    capacity: u32,
    alignment: u32,
    pos: u32,
    draw_pos: u32,
    last_size: u32,
    wraps: u64,
}

const fn align_up(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) / alignment * alignment
}

impl RingAllocator {
    /// Create an allocator; `capacity` is rounded down to `alignment`
    pub fn new(name: &'static str, capacity: u32, alignment: u32) -> Self {
        let alignment = alignment.max(1);
        Self {
            name,
            capacity: capacity / alignment * alignment,
            alignment,
            pos: 0,
            draw_pos: 0,
            last_size: 0,
            wraps: 0,
        }
    }

    /// Reserve `size` bytes and return their offset
    pub fn allocate(&mut self, size: u32) -> Result<u32> {
        if size > self.capacity {
            return Err(RenderError::AllocationTooLarge {
                buffer: self.name,
                requested: size,
                capacity: self.capacity,
            });
        }

        if self.pos + size > self.capacity {
            self.pos = 0;
            self.wraps += 1;
        }

        self.draw_pos = self.pos;
        self.last_size = size;
        self.pos = align_up(self.pos + size, self.alignment).min(self.capacity);
        Ok(self.draw_pos)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Offset of the most recent allocation
    pub fn draw_pos(&self) -> u32 {
        self.draw_pos
    }

    /// Size of the most recent allocation
    pub fn last_size(&self) -> u32 {
        self.last_size
    }

    /// Write cursor for the next allocation
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// How many times allocation restarted at offset 0
    pub fn wraps(&self) -> u64 {
        self.wraps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_advance_the_cursor() {
        let mut ring = RingAllocator::new("vertex", 64, 4);
        assert_eq!(ring.allocate(16).unwrap(), 0);
        assert_eq!(ring.allocate(10).unwrap(), 16);
        assert_eq!(ring.draw_pos(), 16);
        // 10 bytes round up to the next 4-byte boundary
        assert_eq!(ring.allocate(4).unwrap(), 28);
        assert_eq!(ring.wraps(), 0);
    }

    #[test]
    fn overflow_wraps_to_zero() {
        let mut ring = RingAllocator::new("vertex", 100, 4);
        let mut offsets = Vec::new();
        for size in [40u32, 40, 40, 12, 88, 100, 4] {
            let offset = ring.allocate(size).unwrap();
            assert!(offset + size <= ring.capacity());
            offsets.push(offset);
        }
        assert_eq!(offsets, vec![0, 40, 0, 40, 0, 0, 0]);
        assert_eq!(ring.wraps(), 4);
    }

    #[test]
    fn exact_fit_does_not_wrap() {
        let mut ring = RingAllocator::new("index", 32, 4);
        ring.allocate(16).unwrap();
        assert_eq!(ring.allocate(16).unwrap(), 16);
        assert_eq!(ring.wraps(), 0);
        assert_eq!(ring.allocate(1).unwrap(), 0);
        assert_eq!(ring.wraps(), 1);
    }

    #[test]
    fn oversized_request_is_an_error() {
        let mut ring = RingAllocator::new("index", 64, 4);
        assert!(matches!(
            ring.allocate(65),
            Err(RenderError::AllocationTooLarge {
                buffer: "index",
                requested: 65,
                capacity: 64
            })
        ));
    }
}

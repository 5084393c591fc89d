//! Recycled outbound buffers.
//!
//! The game thread encodes many small frames per tick; recycling the backing
//! allocations keeps the encode path allocation-free in steady state. The
//! pool is owned by the single game-logic thread, so it needs no locking.

/// Pool of reusable payload buffers.
#[derive(Debug)]
pub struct BufferPool {
    free: Vec<Vec<u8>>,
    /// Most buffers retained at once; extra releases drop the allocation.
    max_retained: usize,
    /// Capacity given to freshly allocated buffers.
    initial_capacity: usize,
}

impl BufferPool {
    pub fn new(max_retained: usize, initial_capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(max_retained),
            max_retained,
            initial_capacity,
        }
    }

    /// Take a cleared buffer from the pool, allocating if none is free.
    pub fn acquire(&mut self) -> Vec<u8> {
        match self.free.pop() {
            Some(buf) => buf,
            None => Vec::with_capacity(self.initial_capacity),
        }
    }

    /// Return a buffer for reuse. Cleared here so acquire is always clean.
    pub fn release(&mut self, mut buf: Vec<u8>) {
        if self.free.len() < self.max_retained {
            buf.clear();
            self.free.push(buf);
        }
    }

    /// Buffers currently held for reuse.
    pub fn idle(&self) -> usize {
        self.free.len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        // A session rarely batches more than a handful of frames per flush.
        Self::new(32, 1024)
    }
}

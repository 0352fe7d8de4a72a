//! Bounded output capture

use std::collections::VecDeque;

/// Default capture limit per stream (50 MiB)
pub const MAX_BUFFER_BYTES: usize = 50 * 1024 * 1024;

/// Ring buffer that keeps the last `capacity` bytes written to it
#[derive(Debug)]
pub struct OutputBuffer {
    bytes: VecDeque<u8>,
    capacity: usize,
    dropped: u64,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_BYTES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Append a chunk, evicting the oldest bytes on overflow
    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.capacity {
            self.dropped += (self.bytes.len() + chunk.len() - self.capacity) as u64;
            self.bytes.clear();
            self.bytes.extend(&chunk[chunk.len() - self.capacity..]);
            return;
        }

        let overflow = (self.bytes.len() + chunk.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.bytes.drain(..overflow);
            self.dropped += overflow as u64;
        }
        self.bytes.extend(chunk);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes evicted so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Captured text; invalid UTF-8 (e.g. a split code point at the cut) is replaced
    pub fn to_string_lossy(&self) -> String {
        let (front, back) = self.bytes.as_slices();
        if back.is_empty() {
            return String::from_utf8_lossy(front).into_owned();
        }
        let mut joined = Vec::with_capacity(self.bytes.len());
        joined.extend_from_slice(front);
        joined.extend_from_slice(back);
        String::from_utf8_lossy(&joined).into_owned()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

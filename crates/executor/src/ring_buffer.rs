use std::collections::VecDeque;

/// Default per-stream capture limit.
pub const OUTPUT_LIMIT: usize = 64 * 1024;

/// Bounded byte buffer that keeps the newest `capacity` bytes.
#[derive(Debug)]
pub struct RingBuffer {
    buf: VecDeque<u8>,
    capacity: usize,
    truncated: bool,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity.min(8 * 1024)),
            capacity,
            truncated: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if bytes.len() >= self.capacity {
            if bytes.len() > self.capacity || !self.buf.is_empty() {
                self.truncated = true;
            }
            self.buf.clear();
            self.buf.extend(&bytes[bytes.len() - self.capacity..]);
            return;
        }

        let overflow = (self.buf.len() + bytes.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.buf.drain(..overflow);
            self.truncated = true;
        }
        self.buf.extend(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Buffered text (lossy UTF-8) and whether older bytes were dropped.
    pub fn contents(&self) -> (String, bool) {
        let (front, back) = self.buf.as_slices();
        let mut bytes = Vec::with_capacity(self.buf.len());
        bytes.extend_from_slice(front);
        bytes.extend_from_slice(back);
        (String::from_utf8_lossy(&bytes).into_owned(), self.truncated)
    }
}

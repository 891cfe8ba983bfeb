//! Single-entry frame hand-off between the demux and the display.

use super::buffer::FixedBuffer;

/// Holds at most one complete frame awaiting display.
///
/// The producer only writes when the slot is empty, so an unconsumed frame
/// is never overwritten. The consumer clears the ready flag once it has
/// read the frame.
#[derive(Debug)]
pub struct FrameSlot {
    buffer: FixedBuffer,
    ready: bool,
}

impl FrameSlot {
    /// Creates an empty slot able to hold frames up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: FixedBuffer::new(capacity),
            ready: false,
        }
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Returns true if a frame is waiting to be consumed.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Stores a complete frame if the slot is empty.
    ///
    /// Returns false, leaving the slot untouched, when a frame is already
    /// waiting or the frame does not fit.
    pub fn offer(&mut self, frame: &[u8]) -> bool {
        if self.ready {
            return false;
        }
        if self.buffer.replace_with(frame).is_err() {
            self.buffer.clear();
            return false;
        }
        self.ready = true;
        true
    }

    /// The waiting frame, without consuming it.
    pub fn peek(&self) -> Option<&[u8]> {
        self.ready.then(|| self.buffer.as_slice())
    }

    /// Hands the waiting frame to `consumer`, then clears the ready flag.
    pub fn consume<R>(&mut self, consumer: impl FnOnce(&[u8]) -> R) -> Option<R> {
        if !self.ready {
            return None;
        }
        let result = consumer(self.buffer.as_slice());
        self.ready = false;
        Some(result)
    }

    /// Drops any waiting frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.ready = false;
    }
}

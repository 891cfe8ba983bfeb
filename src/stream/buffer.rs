//! Allocate-once byte buffer with an explicit length.

/// Returned when an append would exceed the buffer capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("buffer capacity of {capacity} bytes exceeded")]
pub struct BufferFull {
    /// Capacity of the buffer that rejected the write.
    pub capacity: usize,
}

/// Fixed-capacity byte buffer.
///
/// Storage is allocated once in [`FixedBuffer::new`] and never grows.
/// Appends are bounds-checked and fail instead of reallocating.
pub struct FixedBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl FixedBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bytes are held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if no more bytes can be appended.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Number of bytes that can still be appended.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.len
    }

    /// The valid bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Appends one byte.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<(), BufferFull> {
        if self.is_full() {
            return Err(BufferFull {
                capacity: self.capacity(),
            });
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Appends a slice, all or nothing.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), BufferFull> {
        if bytes.len() > self.remaining() {
            return Err(BufferFull {
                capacity: self.capacity(),
            });
        }
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Replaces the contents with `bytes`.
    pub fn replace_with(&mut self, bytes: &[u8]) -> Result<(), BufferFull> {
        self.clear();
        self.extend_from_slice(bytes)
    }

    /// The unused tail, for reading directly into the buffer.
    ///
    /// Call [`FixedBuffer::commit`] with the number of bytes written.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Marks `count` bytes of the spare tail as valid.
    pub fn commit(&mut self, count: usize) {
        self.len = (self.len + count).min(self.data.len());
    }

    /// Drops the contents. Capacity is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl std::fmt::Debug for FixedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedBuffer")
            .field("len", &self.len)
            .field("capacity", &self.data.len())
            .finish()
    }
}

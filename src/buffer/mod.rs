//! Accumulation buffer for process output

use bytes::{Buf, Bytes, BytesMut};

/// Initial capacity reserved for a session buffer
const INITIAL_CAPACITY: usize = 4096;

/// Holds the bytes read from the terminal that no match has consumed yet.
///
/// Nothing is ever discarded implicitly: bytes leave the buffer only through
/// [`take_match`](Self::take_match) or [`clear`](Self::clear).
#[derive(Debug)]
pub struct BufferManager {
    buffer: BytesMut,
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferManager {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append one byte read from the terminal
    pub fn push(&mut self, byte: u8) {
        self.buffer.extend_from_slice(&[byte]);
    }

    /// Append a run of bytes
    #[cfg(test)]
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Unconsumed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Unconsumed bytes decoded lossily
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// Copy out `start..end` and drop everything up to `end`.
    ///
    /// The returned bytes are a fresh allocation, independent of the buffer.
    pub fn take_match(&mut self, start: usize, end: usize) -> Bytes {
        let end = end.min(self.buffer.len());
        let start = start.min(end);
        let found = Bytes::copy_from_slice(&self.buffer[start..end]);
        self.buffer.advance(end);
        found
    }

    /// Number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard every unconsumed byte
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

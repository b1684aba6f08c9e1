//! Shared read/write buffer for seekable channels.
//!
//! A single fixed-capacity byte array serves both directions. In
//! [`BufferState::Reading`] the bytes `data[pos..filled]` are read-ahead not
//! yet handed to the caller; in [`BufferState::Writing`] the bytes
//! `data[..pos]` are pending output not yet handed to the OS. The buffer never
//! holds both at once: callers switch state only through
//! [`ChannelBuffer::begin_reading`] / [`ChannelBuffer::begin_writing`], which
//! require the other direction to be drained first.

use std::io::{self, Read};

/// Which direction the buffer currently serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Holding read-ahead bytes.
    Reading,
    /// Holding pending writes.
    Writing,
}

/// Fixed-capacity read/write buffer.
///
/// Invariants:
/// - `pos <= filled <= data.len()` while reading
/// - `filled == 0` while writing
/// - `data.len()` never changes after construction
#[derive(Debug)]
pub struct ChannelBuffer {
    data: Box<[u8]>,
    pos: usize,
    filled: usize,
    state: BufferState,
}

impl ChannelBuffer {
    /// Create an empty buffer in the reading state.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            state: BufferState::Reading,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn is_reading(&self) -> bool {
        self.state == BufferState::Reading
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    /// Read-ahead bytes not yet consumed (0 while writing).
    pub fn unread(&self) -> usize {
        match self.state {
            BufferState::Reading => self.filled - self.pos,
            BufferState::Writing => 0,
        }
    }

    /// Take one buffered byte, if any.
    pub fn next_byte(&mut self) -> Option<u8> {
        if self.unread() == 0 {
            return None;
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Some(b)
    }

    /// Move up to `max` buffered bytes onto `out`. Returns the count moved.
    pub fn drain_into(&mut self, out: &mut Vec<u8>, max: usize) -> usize {
        let take = max.min(self.unread());
        out.extend_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        take
    }

    /// Replace the buffer contents with one read from `src`.
    ///
    /// Returns the number of bytes read; 0 means end of stream.
    pub fn refill<R: Read + ?Sized>(&mut self, src: &mut R) -> io::Result<usize> {
        debug_assert!(self.is_reading());
        self.pos = 0;
        self.filled = 0;
        let n = loop {
            match src.read(&mut self.data) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.filled = n;
        Ok(n)
    }

    /// Drop read-ahead; returns how many unread bytes were discarded.
    pub fn discard_read_ahead(&mut self) -> usize {
        let unread = self.unread();
        self.pos = 0;
        self.filled = 0;
        unread
    }

    // -----------------------------------------------------------------------
    // Write side
    // -----------------------------------------------------------------------

    /// Pending output bytes (empty while reading).
    pub fn pending(&self) -> &[u8] {
        match self.state {
            BufferState::Writing => &self.data[..self.pos],
            BufferState::Reading => &[],
        }
    }

    /// Free space for pending output.
    pub fn write_space(&self) -> usize {
        match self.state {
            BufferState::Writing => self.data.len() - self.pos,
            BufferState::Reading => 0,
        }
    }

    /// Append to pending output. Caller guarantees `bytes.len() <= write_space()`.
    pub fn push(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.write_space());
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    /// Mark pending output as handed to the OS.
    pub fn mark_flushed(&mut self) {
        if self.state == BufferState::Writing {
            self.pos = 0;
        }
    }

    // -----------------------------------------------------------------------
    // State switches
    // -----------------------------------------------------------------------

    /// Enter the reading state with no read-ahead.
    ///
    /// Pending writes must have been flushed.
    pub fn begin_reading(&mut self) {
        debug_assert!(self.pending().is_empty());
        self.state = BufferState::Reading;
        self.pos = 0;
        self.filled = 0;
    }

    /// Forget everything, pending writes included, and return to reading.
    pub fn reset(&mut self) {
        self.state = BufferState::Reading;
        self.pos = 0;
        self.filled = 0;
    }

    /// Enter the writing state with nothing pending.
    ///
    /// Read-ahead must have been discarded.
    pub fn begin_writing(&mut self) {
        debug_assert_eq!(self.unread(), 0);
        self.state = BufferState::Writing;
        self.pos = 0;
        self.filled = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

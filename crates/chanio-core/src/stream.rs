//! The narrow byte-source contract the line/block reader is written against.

use crate::config::DEFAULT_BUFFER_CAPACITY;
use crate::error::Result;

/// Minimal pushback-capable byte source.
///
/// `Ok(None)` from any read means end of stream.
pub trait ByteStream {
    /// Read one byte.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Store `byte` so the next read returns it. Single slot: a second call
    /// before a read replaces the first byte.
    fn unread_byte(&mut self, byte: u8);

    /// Read up to `n` bytes. A short non-empty result is not an error;
    /// `Ok(None)` only when nothing at all could be read.
    fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>>;

    /// Read everything up to end of stream.
    fn read_to_end(&mut self) -> Result<Option<Vec<u8>>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read_block(DEFAULT_BUFFER_CAPACITY)? {
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        Ok((!out.is_empty()).then_some(out))
    }
}

impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn unread_byte(&mut self, byte: u8) {
        (**self).unread_byte(byte);
    }

    fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        (**self).read_block(n)
    }

    fn read_to_end(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).read_to_end()
    }
}

//! The null device: reads see end of file, writes vanish.
//!
//! Backs the platform names for the bit bucket (`/dev/null`, `nul`, `nul:`)
//! without touching the filesystem.

use crate::error::{ChannelError, Result};
use crate::mode::ModeDescriptor;
use crate::seekable::Whence;
use crate::stream::ByteStream;

/// Paths that resolve to a [`NullChannel`] instead of a real file.
pub const NULL_DEVICE_NAMES: [&str; 3] = ["/dev/null", "nul", "nul:"];

/// True when `path` names the null device (case-insensitive for the
/// DOS spellings).
pub fn is_null_device(path: &str) -> bool {
    path == NULL_DEVICE_NAMES[0]
        || NULL_DEVICE_NAMES[1..]
            .iter()
            .any(|name| path.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone)]
pub struct NullChannel {
    mode: ModeDescriptor,
    pushback: Option<u8>,
    open: bool,
}

impl NullChannel {
    pub fn new(mode: ModeDescriptor) -> Self {
        Self {
            mode,
            pushback: None,
            open: true,
        }
    }

    pub fn mode(&self) -> ModeDescriptor {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn check_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(ChannelError::ClosedHandle)
        }
    }

    fn check_readable(&self) -> Result<()> {
        self.check_open()?;
        if !self.mode.is_readable() {
            return Err(ChannelError::not_readable());
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if !self.mode.is_writable() {
            return Err(ChannelError::not_writable());
        }
        Ok(())
    }

    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_readable()?;
        Ok(self.pushback.take())
    }

    pub fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        self.check_readable()?;
        if n == 0 {
            return Ok(Some(Vec::new()));
        }
        Ok(self.pushback.take().map(|b| vec![b]))
    }

    pub fn read_partial(&mut self, n: usize) -> Result<Vec<u8>> {
        self.read_block(n)?.ok_or(ChannelError::EndOfFile)
    }

    pub fn read_all(&mut self) -> Result<Option<Vec<u8>>> {
        self.check_readable()?;
        Ok(self.pushback.take().map(|b| vec![b]))
    }

    pub fn unread_byte(&mut self, byte: u8) {
        self.pushback = Some(byte);
    }

    /// Accepts and discards `bytes`.
    pub fn write_block(&mut self, bytes: &[u8]) -> Result<usize> {
        self.check_writable()?;
        Ok(bytes.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.check_open()
    }

    pub fn sync(&mut self) -> Result<()> {
        self.check_open()
    }

    /// Every seek lands at 0.
    pub fn seek(&mut self, _offset: i64, _whence: Whence) -> Result<u64> {
        self.check_open()?;
        self.pushback = None;
        Ok(0)
    }

    pub fn current_position(&self) -> Result<u64> {
        self.check_open()?;
        Ok(0)
    }

    pub fn truncate(&mut self, _len: u64) -> Result<()> {
        self.check_writable()
    }

    pub fn is_at_end_of_file(&self) -> Result<bool> {
        self.check_readable()?;
        Ok(self.pushback.is_none())
    }

    pub fn ready(&self) -> Result<usize> {
        self.check_readable()?;
        Ok(usize::from(self.pushback.is_some()))
    }

    pub fn reset(&mut self, subset: ModeDescriptor) -> Result<()> {
        self.check_open()?;
        subset.check_subset_of(self.mode)
    }

    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        self.open = false;
        self.pushback = None;
        Ok(())
    }
}

impl ByteStream for NullChannel {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        NullChannel::read_byte(self)
    }

    fn unread_byte(&mut self, byte: u8) {
        NullChannel::unread_byte(self, byte);
    }

    fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        NullChannel::read_block(self, n)
    }

    fn read_to_end(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_all()
    }
}

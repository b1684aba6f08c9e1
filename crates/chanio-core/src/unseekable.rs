//! Unbuffered channel over pipes, sockets, and other unseekable streams.
//!
//! Reads and writes pass straight through to the underlying endpoints; the
//! only state kept here is a one-byte pushback slot and an end-of-stream
//! marker. Positioning operations fail with [`ChannelError::NotSeekable`].

use std::io;
use std::os::fd::RawFd;

use crate::config::DEFAULT_BUFFER_CAPACITY;
use crate::endpoint::{ByteSink, ByteSource, Sink, Source};
use crate::error::{ChannelError, Result};
use crate::mode::ModeDescriptor;
use crate::stream::ByteStream;
use crate::sys;

/// Channel over an optional readable end and an optional writable end.
pub struct UnseekableChannel {
    source: Option<Box<dyn ByteSource>>,
    sink: Option<Box<dyn ByteSink>>,
    mode: ModeDescriptor,
    pushback: Option<u8>,
    eof_seen: bool,
    open: bool,
}

impl std::fmt::Debug for UnseekableChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnseekableChannel")
            .field("mode", &self.mode)
            .field("has_source", &self.source.is_some())
            .field("has_sink", &self.sink.is_some())
            .field("open", &self.open)
            .finish()
    }
}

impl UnseekableChannel {
    /// Build a channel whose mode is derived from which ends are present.
    ///
    /// Fails with [`ChannelError::InvalidConfiguration`] when both are absent.
    pub fn new(
        source: Option<Box<dyn ByteSource>>,
        sink: Option<Box<dyn ByteSink>>,
    ) -> Result<Self> {
        let mode = ModeDescriptor::for_ends(source.is_some(), sink.is_some())?;
        Ok(Self {
            source,
            sink,
            mode,
            pushback: None,
            eof_seen: false,
            open: true,
        })
    }

    /// Like [`UnseekableChannel::new`], but restricted to `mode`, which must
    /// not ask for an end that is absent.
    pub fn with_mode(
        source: Option<Box<dyn ByteSource>>,
        sink: Option<Box<dyn ByteSink>>,
        mode: ModeDescriptor,
    ) -> Result<Self> {
        let mut channel = Self::new(source, sink)?;
        mode.check_subset_of(channel.mode)?;
        channel.mode = mode;
        Ok(channel)
    }

    pub fn from_source(source: impl ByteSource + 'static) -> Self {
        Self::with_ends(Some(Box::new(source)), None, ModeDescriptor::READ_ONLY)
    }

    pub fn from_sink(sink: impl ByteSink + 'static) -> Self {
        Self::with_ends(None, Some(Box::new(sink)), ModeDescriptor::WRITE_ONLY)
    }

    pub fn duplex(source: impl ByteSource + 'static, sink: impl ByteSink + 'static) -> Self {
        Self::with_ends(
            Some(Box::new(source)),
            Some(Box::new(sink)),
            ModeDescriptor::READ_WRITE,
        )
    }

    fn with_ends(
        source: Option<Box<dyn ByteSource>>,
        sink: Option<Box<dyn ByteSink>>,
        mode: ModeDescriptor,
    ) -> Self {
        Self {
            source,
            sink,
            mode,
            pushback: None,
            eof_seen: false,
            open: true,
        }
    }

    pub fn stdin() -> Self {
        Self::from_source(Source::stdin())
    }

    pub fn stdout() -> Self {
        Self::from_sink(Sink::stdout())
    }

    pub fn stderr() -> Self {
        Self::from_sink(Sink::stderr())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> ModeDescriptor {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Descriptor of the readable end, else of the writable end.
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.source
            .as_ref()
            .and_then(|s| s.raw_fd())
            .or_else(|| self.sink.as_ref().and_then(|s| s.raw_fd()))
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
        if !self.mode.is_readable() || self.source.is_none() {
            return Err(ChannelError::not_readable());
        }
        Ok(())
    }

    fn source_mut(&mut self) -> Result<&mut Box<dyn ByteSource>> {
        self.source.as_mut().ok_or_else(ChannelError::not_readable)
    }

    fn writable_sink(&mut self) -> Result<&mut Box<dyn ByteSink>> {
        self.check_open()?;
        if !self.mode.is_writable() {
            return Err(ChannelError::not_writable());
        }
        self.sink.as_mut().ok_or_else(ChannelError::not_writable)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read one byte; `Ok(None)` at end of stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_readable()?;
        if let Some(b) = self.pushback.take() {
            return Ok(Some(b));
        }
        let mut byte = [0u8; 1];
        if self.source_mut()?.read_into(&mut byte)? == 0 {
            self.eof_seen = true;
            return Ok(None);
        }
        Ok(Some(byte[0]))
    }

    /// Read at most `n` bytes with a single underlying read.
    ///
    /// A pending pushback byte is returned on its own rather than risk
    /// blocking for more.
    pub fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        self.check_readable()?;
        if n == 0 {
            return Ok(Some(Vec::new()));
        }
        if let Some(b) = self.pushback.take() {
            return Ok(Some(vec![b]));
        }
        let mut out = vec![0u8; n];
        let got = self.source_mut()?.read_into(&mut out)?;
        if got == 0 {
            self.eof_seen = true;
            return Ok(None);
        }
        out.truncate(got);
        Ok(Some(out))
    }

    /// [`UnseekableChannel::read_block`], but end of stream is
    /// [`ChannelError::EndOfFile`].
    pub fn read_partial(&mut self, n: usize) -> Result<Vec<u8>> {
        match self.read_block(n)? {
            Some(bytes) => Ok(bytes),
            None => Err(ChannelError::EndOfFile),
        }
    }

    /// Read until the writer side hangs up.
    pub fn read_all(&mut self) -> Result<Option<Vec<u8>>> {
        self.check_readable()?;
        let mut out: Vec<u8> = self.pushback.take().into_iter().collect();
        let mut chunk = vec![0u8; DEFAULT_BUFFER_CAPACITY];
        let source = self.source_mut()?;
        loop {
            let got = source.read_into(&mut chunk)?;
            if got == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..got]);
        }
        self.eof_seen = true;
        Ok((!out.is_empty()).then_some(out))
    }

    pub fn unread_byte(&mut self, byte: u8) {
        self.pushback = Some(byte);
        self.eof_seen = false;
    }

    /// True when the next read would hit end of stream.
    ///
    /// With nothing pushed back this reads one byte ahead into the pushback
    /// slot, so it may block until the writer produces a byte or hangs up.
    pub fn is_at_end_of_file(&mut self) -> Result<bool> {
        self.check_readable()?;
        if self.pushback.is_some() {
            return Ok(false);
        }
        if self.eof_seen {
            return Ok(true);
        }
        let mut byte = [0u8; 1];
        if self.source_mut()?.read_into(&mut byte)? == 0 {
            self.eof_seen = true;
            return Ok(true);
        }
        self.pushback = Some(byte[0]);
        Ok(false)
    }

    /// Bytes obtainable without blocking: pushback plus `FIONREAD`.
    /// Endpoints without a descriptor report only the pushback.
    pub fn ready(&self) -> Result<usize> {
        self.check_readable()?;
        let pending = usize::from(self.pushback.is_some());
        match self.source.as_ref().and_then(|s| s.raw_fd()) {
            Some(fd) => Ok(pending + sys::bytes_available(fd)?),
            None => Ok(pending),
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub fn write_byte(&mut self, byte: u8) -> Result<usize> {
        self.write_block(&[byte])
    }

    /// Write all of `bytes` straight to the sink. Empty writes are ignored.
    pub fn write_block(&mut self, bytes: &[u8]) -> Result<usize> {
        let sink = self.writable_sink()?;
        let mut rest = bytes;
        while !rest.is_empty() {
            match sink.write_from(rest)? {
                0 => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                n => rest = &rest[n..],
            }
        }
        Ok(bytes.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Flush, then fsync the writable end's descriptor when it has one.
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(fd) = self.sink.as_ref().and_then(|s| s.raw_fd()) {
            sys::sync_fd(fd)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Positioning
    // -----------------------------------------------------------------------

    pub fn seek(&mut self, _offset: i64, _whence: crate::seekable::Whence) -> Result<u64> {
        self.check_open()?;
        Err(ChannelError::NotSeekable)
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.check_open()?;
        Err(ChannelError::NotSeekable)
    }

    pub fn current_position(&self) -> Result<u64> {
        self.check_open()?;
        Err(ChannelError::NotSeekable)
    }

    pub fn truncate(&mut self, _len: u64) -> Result<()> {
        self.check_open()?;
        Err(ChannelError::NotSeekable)
    }

    /// Narrow to `subset`; streams have no position to reset.
    pub fn reset(&mut self, subset: ModeDescriptor) -> Result<()> {
        self.check_open()?;
        subset.check_subset_of(self.mode)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Flush and release both ends. Standard streams stay open underneath.
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        let flushed = match self.sink.as_mut() {
            Some(sink) => sink.flush().map_err(ChannelError::from),
            None => Ok(()),
        };
        if self.source.as_ref().is_some_and(|s| !s.is_standard()) {
            self.source = None;
        }
        if self.sink.as_ref().is_some_and(|s| !s.is_standard()) {
            self.sink = None;
        }
        self.pushback = None;
        self.open = false;
        flushed
    }

    /// Flush and drop only the writable end, so a peer reading from it sees
    /// end of stream. The channel stays open for reading.
    pub fn close_write(&mut self) -> Result<()> {
        let sink = self.writable_sink()?;
        sink.flush()?;
        if let Some(sink) = self.sink.take() {
            if sink.is_standard() {
                log::debug!("close_write on a standard stream leaves it open");
            }
        }
        self.mode = ModeDescriptor::for_ends(self.mode.is_readable(), false)
            .unwrap_or(ModeDescriptor::READ_ONLY);
        if !self.mode.is_readable() {
            self.open = false;
        }
        Ok(())
    }
}

impl Drop for UnseekableChannel {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.flush() {
                log::warn!("dropping stream channel with unflushed writes: {err}");
            }
        }
    }
}

impl ByteStream for UnseekableChannel {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        UnseekableChannel::read_byte(self)
    }

    fn unread_byte(&mut self, byte: u8) {
        UnseekableChannel::unread_byte(self, byte);
    }

    fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        UnseekableChannel::read_block(self, n)
    }

    fn read_to_end(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_all()
    }
}

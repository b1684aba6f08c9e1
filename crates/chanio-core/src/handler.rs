//! Descriptor-numbered handler over any channel kind.
//!
//! [`Channel`] is the closed set of channel implementations; [`Handler`]
//! pairs one with the descriptor number it was registered under and adds the
//! operations built on top of the byte primitives (line reads, readiness
//! waits, reopen).

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::mode::ModeDescriptor;
use crate::null::{NullChannel, is_null_device};
use crate::process::ProcessChannel;
use crate::reader::{LineAndBlockReader, LineSeparator};
use crate::seekable::{BufferedChannel, Whence};
use crate::stream::ByteStream;
use crate::unseekable::UnseekableChannel;

/// Interval between readiness probes in [`Handler::wait_until_ready`].
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub enum Channel {
    Buffered(BufferedChannel),
    Unseekable(UnseekableChannel),
    Process(ProcessChannel),
    Null(NullChannel),
}

/// Forward a call to whichever channel is inside. Process channels forward
/// to their pipe stream.
macro_rules! dispatch {
    ($channel:expr, $ch:ident => $call:expr) => {
        match $channel {
            Channel::Buffered($ch) => $call,
            Channel::Unseekable($ch) => $call,
            Channel::Process(p) => {
                let $ch = p.stream_mut();
                $call
            }
            Channel::Null($ch) => $call,
        }
    };
}

macro_rules! dispatch_ref {
    ($channel:expr, $ch:ident => $call:expr) => {
        match $channel {
            Channel::Buffered($ch) => $call,
            Channel::Unseekable($ch) => $call,
            Channel::Process(p) => {
                let $ch = p.stream();
                $call
            }
            Channel::Null($ch) => $call,
        }
    };
}

impl Channel {
    /// Open `path`, mapping the null device names to a [`NullChannel`].
    pub fn open(path: impl AsRef<Path>, mode: ModeDescriptor, config: ChannelConfig) -> Result<Self> {
        let path = path.as_ref();
        if path.to_str().is_some_and(is_null_device) {
            return Ok(Self::Null(NullChannel::new(mode)));
        }
        BufferedChannel::open_with_config(path, mode, config).map(Self::Buffered)
    }

    pub fn mode(&self) -> ModeDescriptor {
        dispatch_ref!(self, ch => ch.mode())
    }

    pub fn is_open(&self) -> bool {
        dispatch_ref!(self, ch => ch.is_open())
    }

    /// Channels that support positioning.
    pub fn is_seekable(&self) -> bool {
        matches!(self, Self::Buffered(_) | Self::Null(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Buffered(_) => "file",
            Self::Unseekable(_) => "stream",
            Self::Process(_) => "process",
            Self::Null(_) => "null",
        }
    }
}

impl ByteStream for Channel {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        dispatch!(self, ch => ch.read_byte())
    }

    fn unread_byte(&mut self, byte: u8) {
        dispatch!(self, ch => ch.unread_byte(byte))
    }

    fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        dispatch!(self, ch => ch.read_block(n))
    }

    fn read_to_end(&mut self) -> Result<Option<Vec<u8>>> {
        dispatch!(self, ch => ch.read_all())
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Handler {
    fileno: i32,
    channel: Channel,
}

impl Handler {
    pub fn new(fileno: i32, channel: Channel) -> Self {
        Self { fileno, channel }
    }

    #[must_use]
    pub fn fileno(&self) -> i32 {
        self.fileno
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    #[must_use]
    pub fn mode(&self) -> ModeDescriptor {
        self.channel.mode()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    #[must_use]
    pub fn is_seekable(&self) -> bool {
        self.channel.is_seekable()
    }

    /// Backing file path, for file channels.
    pub fn path(&self) -> Option<&Path> {
        match &self.channel {
            Channel::Buffered(ch) => Some(ch.path()),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.channel.read_byte()
    }

    pub fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        self.channel.read_block(n)
    }

    pub fn read_partial(&mut self, n: usize) -> Result<Vec<u8>> {
        dispatch!(&mut self.channel, ch => ch.read_partial(n))
    }

    pub fn read_all(&mut self) -> Result<Option<Vec<u8>>> {
        self.channel.read_to_end()
    }

    pub fn read_line(&mut self, separator: LineSeparator<'_>) -> Result<Option<Vec<u8>>> {
        LineAndBlockReader::new(&mut self.channel).read_line(separator)
    }

    pub fn read_exactly(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        LineAndBlockReader::new(&mut self.channel).read_exactly(n)
    }

    pub fn get_char(&mut self) -> Result<Option<u8>> {
        self.channel.read_byte()
    }

    /// Push back `c`; negative values are ignored.
    pub fn unget_char(&mut self, c: i32) {
        LineAndBlockReader::new(&mut self.channel).unget_char(c);
    }

    /// For unseekable channels this may read one byte ahead.
    pub fn is_at_end_of_file(&mut self) -> Result<bool> {
        dispatch!(&mut self.channel, ch => ch.is_at_end_of_file())
    }

    pub fn ready(&self) -> Result<usize> {
        dispatch_ref!(&self.channel, ch => ch.ready())
    }

    /// Poll [`Handler::ready`] until input is available or `timeout`
    /// elapses. Returns whether input became available.
    pub fn wait_until_ready(&self, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        loop {
            if self.ready()? > 0 {
                return Ok(true);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            thread::sleep(READY_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub fn write_byte(&mut self, byte: u8) -> Result<usize> {
        self.write_block(&[byte])
    }

    pub fn write_block(&mut self, bytes: &[u8]) -> Result<usize> {
        dispatch!(&mut self.channel, ch => ch.write_block(bytes))
    }

    pub fn flush(&mut self) -> Result<()> {
        dispatch!(&mut self.channel, ch => ch.flush())
    }

    pub fn sync(&mut self) -> Result<()> {
        dispatch!(&mut self.channel, ch => ch.sync())
    }

    /// Unbuffered channels already write through, so only file channels
    /// change behavior.
    pub fn set_sync(&mut self, sync: bool) {
        if let Channel::Buffered(ch) = &mut self.channel {
            ch.set_sync(sync);
        }
    }

    pub fn is_sync(&self) -> bool {
        match &self.channel {
            Channel::Buffered(ch) => ch.is_sync(),
            _ => true,
        }
    }

    // -----------------------------------------------------------------------
    // Positioning
    // -----------------------------------------------------------------------

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        dispatch!(&mut self.channel, ch => ch.seek(offset, whence))
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.seek(0, Whence::Start).map(|_| ())
    }

    pub fn current_position(&self) -> Result<u64> {
        dispatch_ref!(&self.channel, ch => ch.current_position())
    }

    pub fn truncate(&mut self, len: u64) -> Result<()> {
        dispatch!(&mut self.channel, ch => ch.truncate(len))
    }

    pub fn reset(&mut self, subset: ModeDescriptor) -> Result<()> {
        dispatch!(&mut self.channel, ch => ch.reset(subset))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Independent handler on the same file at the same logical position,
    /// registered as `fileno`. Streams cannot be cloned.
    pub fn try_clone(&mut self, fileno: i32) -> Result<Self> {
        let channel = match &mut self.channel {
            Channel::Buffered(ch) => Channel::Buffered(ch.try_clone()?),
            Channel::Null(ch) => {
                if !ch.is_open() {
                    return Err(ChannelError::ClosedHandle);
                }
                Channel::Null(NullChannel::new(ch.mode()))
            }
            Channel::Unseekable(_) | Channel::Process(_) => return Err(ChannelError::NotSeekable),
        };
        Ok(Self::new(fileno, channel))
    }

    /// Point this descriptor at `path` opened with `mode`, keeping the
    /// descriptor number.
    pub fn reopen(
        &mut self,
        path: impl AsRef<Path>,
        mode: ModeDescriptor,
        config: ChannelConfig,
    ) -> Result<()> {
        let path = path.as_ref();
        if let Channel::Buffered(ch) = &mut self.channel {
            if !path.to_str().is_some_and(is_null_device) {
                return ch.reopen(path, mode);
            }
        }
        let replacement = Channel::open(path, mode, config)?;
        if self.channel.is_open() {
            if let Err(err) = self.close() {
                log::warn!("fd {}: close before reopen failed: {err}", self.fileno);
            }
        }
        self.channel = replacement;
        Ok(())
    }

    /// Close only the write half where there is one; file channels just
    /// flush.
    pub fn close_write(&mut self) -> Result<()> {
        match &mut self.channel {
            Channel::Buffered(ch) => ch.flush(),
            Channel::Unseekable(ch) => ch.close_write(),
            Channel::Process(ch) => ch.close_write(),
            Channel::Null(ch) => ch.flush(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match &mut self.channel {
            Channel::Process(ch) => ch.close(),
            other => dispatch!(other, ch => ch.close()),
        }
    }
}

impl ByteStream for Handler {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.channel.read_byte()
    }

    fn unread_byte(&mut self, byte: u8) {
        self.channel.unread_byte(byte);
    }

    fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        self.channel.read_block(n)
    }

    fn read_to_end(&mut self) -> Result<Option<Vec<u8>>> {
        self.channel.read_to_end()
    }
}

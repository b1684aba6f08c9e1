//! Buffered channel over a seekable file.
//!
//! One [`ChannelBuffer`] serves both directions. The channel switches between
//! reading and writing lazily, on the first operation that needs the other
//! direction:
//! - reading after writing flushes pending output first;
//! - writing after reading backs the OS cursor up over unconsumed read-ahead.
//!
//! This keeps `OS cursor - unread` (reading) or `OS cursor + pending`
//! (writing) equal to the caller's logical position at all times.
//!
//! Not thread-safe: at most one operation may be in flight per channel.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::buffer::{BufferState, ChannelBuffer};
use crate::config::{ChannelConfig, ReopenPolicy, global_config};
use crate::error::{ChannelError, Result};
use crate::mode::ModeDescriptor;
use crate::stream::ByteStream;

// ---------------------------------------------------------------------------
// Whence
// ---------------------------------------------------------------------------

/// Reference point for a seek offset, numbered like `SEEK_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Whence {
    Start = 0,
    Current = 1,
    End = 2,
}

impl Whence {
    /// Convert from a POSIX `SEEK_*` value.
    pub fn from_raw(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Self::Start),
            1 => Ok(Self::Current),
            2 => Ok(Self::End),
            other => Err(ChannelError::InvalidWhence(other)),
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

/// Length and mtime of a file at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(meta: &fs::Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }

    fn differs(&self, other: &Self, policy: ReopenPolicy) -> bool {
        match policy {
            ReopenPolicy::Off => false,
            ReopenPolicy::Length => self.len != other.len,
            ReopenPolicy::LengthAndModified => {
                self.len != other.len || self.modified != other.modified
            }
        }
    }
}

/// Open `path` with the access, create, and truncate semantics of `mode`.
///
/// Does not position for append; callers do that.
pub(crate) fn open_file(path: &Path, mode: ModeDescriptor) -> Result<File> {
    if mode.is_writable() && path.is_dir() {
        return Err(ChannelError::IsADirectory {
            path: path.to_path_buf(),
        });
    }

    let mut opts = OpenOptions::new();
    opts.read(mode.is_readable()).write(mode.is_writable());
    if mode.is_writable() && mode.is_appendable() {
        opts.append(true);
    }

    let mut extra = 0;
    if mode.is_create() {
        if mode.is_writable() {
            if mode.is_exclusive() {
                opts.create_new(true);
            } else {
                opts.create(true);
            }
        } else {
            // std refuses create on read-only opens; open(2) does not.
            extra |= libc::O_CREAT;
            if mode.is_exclusive() {
                extra |= libc::O_EXCL;
            }
        }
    }
    if mode.is_nonblocking() {
        extra |= libc::O_NONBLOCK;
    }
    if extra != 0 {
        opts.custom_flags(extra);
    }

    let file = opts.open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound if !mode.is_create() => ChannelError::NotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::AlreadyExists if mode.is_exclusive() => ChannelError::FileExists {
            path: path.to_path_buf(),
        },
        _ if err.raw_os_error() == Some(libc::EISDIR) => ChannelError::IsADirectory {
            path: path.to_path_buf(),
        },
        _ => ChannelError::Io(err),
    })?;

    if mode.should_truncate() && mode.is_writable() {
        file.set_len(0)?;
    }
    Ok(file)
}

fn read_retry(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn as_io(err: ChannelError) -> ChannelError {
    match err {
        ChannelError::Io(_) => err,
        other => ChannelError::Io(io::Error::other(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Buffered, seekable channel over an exclusively owned file handle.
#[derive(Debug)]
pub struct BufferedChannel {
    path: PathBuf,
    file: Option<File>,
    mode: ModeDescriptor,
    buffer: ChannelBuffer,
    config: ChannelConfig,
    pushback: Option<u8>,
    stamp: FileStamp,
}

impl BufferedChannel {
    /// Open `path` using the process-wide config.
    pub fn open(path: impl AsRef<Path>, mode: ModeDescriptor) -> Result<Self> {
        Self::open_with_config(path, mode, global_config())
    }

    /// Open `path` with an explicit config.
    ///
    /// Append modes start positioned at end of file; every mode starts in the
    /// reading state with an empty buffer.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        mode: ModeDescriptor,
        config: ChannelConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = open_file(&path, mode)?;
        if mode.is_appendable() {
            file.seek(SeekFrom::End(0))?;
        }
        let stamp = FileStamp::of(&file.metadata()?);
        Ok(Self {
            path,
            file: Some(file),
            mode,
            buffer: ChannelBuffer::new(config.buffer_capacity),
            config,
            pushback: None,
            stamp,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> ModeDescriptor {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Buffer capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn is_sync(&self) -> bool {
        self.config.sync_on_write
    }

    /// Flush to the OS after every write when `sync` is true.
    pub fn set_sync(&mut self, sync: bool) {
        self.config.sync_on_write = sync;
    }

    /// Underlying descriptor, while open.
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(AsRawFd::as_raw_fd)
    }

    fn file_ref(&self) -> Result<&File> {
        self.file.as_ref().ok_or(ChannelError::ClosedHandle)
    }

    fn check_open(&self) -> Result<()> {
        self.file_ref().map(|_| ())
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

    // -----------------------------------------------------------------------
    // Buffer state machine
    // -----------------------------------------------------------------------

    fn observe(&mut self) -> Result<()> {
        if let Some(file) = &self.file {
            self.stamp = FileStamp::of(&file.metadata()?);
        }
        Ok(())
    }

    /// Hand pending writes to the OS. No-op while reading or when empty.
    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_reading() || self.buffer.pending().is_empty() {
            return Ok(());
        }
        let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
        file.write_all(self.buffer.pending())?;
        self.buffer.mark_flushed();
        self.observe()
    }

    fn ensure_reading(&mut self) -> Result<()> {
        if self.buffer.is_reading() {
            return Ok(());
        }
        self.flush_buffer()?;
        self.buffer.begin_reading();
        Ok(())
    }

    fn ensure_writing(&mut self) -> Result<()> {
        if !self.buffer.is_reading() {
            return Ok(());
        }
        let overrun = self.buffer.discard_read_ahead();
        if overrun > 0 {
            let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
            file.seek(SeekFrom::Current(-(overrun as i64)))?;
        }
        self.pushback = None;
        self.buffer.begin_writing();
        Ok(())
    }

    /// Drop buffered state ahead of a reposition: flush writes, or back the
    /// OS cursor up over unread read-ahead.
    fn invalidate_buffer(&mut self) -> Result<()> {
        match self.buffer.state() {
            BufferState::Writing => {
                self.flush_buffer()?;
                self.buffer.begin_reading();
            }
            BufferState::Reading => {
                let overrun = self.buffer.discard_read_ahead();
                if overrun > 0 {
                    let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
                    file.seek(SeekFrom::Current(-(overrun as i64)))?;
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read one byte; `Ok(None)` at end of file.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_readable()?;
        if let Some(b) = self.pushback.take() {
            return Ok(Some(b));
        }
        self.ensure_reading()?;
        if let Some(b) = self.buffer.next_byte() {
            return Ok(Some(b));
        }
        let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
        if self.buffer.refill(file)? == 0 {
            return Ok(None);
        }
        Ok(self.buffer.next_byte())
    }

    /// Read up to `n` bytes, short only at end of file.
    ///
    /// Requests larger than the buffer bypass it once buffered bytes are used
    /// up. `Ok(None)` when nothing at all was read.
    pub fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        self.check_readable()?;
        if n == 0 {
            return Ok(Some(Vec::new()));
        }
        let mut out = Vec::new();
        if let Some(b) = self.pushback.take() {
            out.push(b);
        }
        self.ensure_reading()?;
        let want = n - out.len();
        self.buffer.drain_into(&mut out, want);

        let capacity = self.buffer.capacity();
        let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
        while out.len() < n {
            let want = n - out.len();
            if want > capacity {
                let start = out.len();
                out.resize(start + want, 0);
                let got = read_retry(file, &mut out[start..])?;
                out.truncate(start + got);
                if got == 0 {
                    break;
                }
            } else {
                if self.buffer.refill(file)? == 0 {
                    break;
                }
                self.buffer.drain_into(&mut out, want);
            }
        }
        Ok((!out.is_empty()).then_some(out))
    }

    /// Read whatever one underlying read yields, at most `n` bytes.
    ///
    /// Fails with [`ChannelError::EndOfFile`] when nothing is left.
    pub fn read_partial(&mut self, n: usize) -> Result<Vec<u8>> {
        self.check_readable()?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        if let Some(b) = self.pushback.take() {
            out.push(b);
        }
        self.ensure_reading()?;
        let want = n - out.len();
        self.buffer.drain_into(&mut out, want);
        if out.is_empty() {
            let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
            if n > self.buffer.capacity() {
                out.resize(n, 0);
                let got = read_retry(file, &mut out)?;
                out.truncate(got);
            } else if self.buffer.refill(file)? > 0 {
                self.buffer.drain_into(&mut out, n);
            }
        }
        if out.is_empty() {
            return Err(ChannelError::EndOfFile);
        }
        Ok(out)
    }

    /// Read to end of file, first reopening the file if it changed
    /// underneath us (see [`ReopenPolicy`]).
    pub fn read_all(&mut self) -> Result<Option<Vec<u8>>> {
        self.check_readable()?;
        self.reopen_if_changed()?;

        let mut out = Vec::new();
        if let Some(b) = self.pushback.take() {
            out.push(b);
        }
        self.ensure_reading()?;
        let unread = self.buffer.unread();
        self.buffer.drain_into(&mut out, unread);
        let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
        file.read_to_end(&mut out)?;
        Ok((!out.is_empty()).then_some(out))
    }

    /// Store one byte for the next read, replacing any byte already stored.
    pub fn unread_byte(&mut self, byte: u8) {
        self.pushback = Some(byte);
    }

    fn reopen_if_changed(&mut self) -> Result<()> {
        let policy = self.config.reopen_policy;
        if !policy.enabled() {
            return Ok(());
        }
        let current = FileStamp::of(&fs::metadata(&self.path)?);
        if !self.stamp.differs(&current, policy) {
            return Ok(());
        }

        let position = self.current_position()?;
        self.flush_buffer()?;
        log::debug!(
            "{}: changed externally (len {} -> {}), reopening at {position}",
            self.path.display(),
            self.stamp.len,
            current.len
        );
        let mut file = open_file(&self.path, self.mode.for_reopen()).map_err(as_io)?;
        file.seek(SeekFrom::Start(position))?;
        self.file = Some(file);
        self.buffer.reset();
        self.observe()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub fn write_byte(&mut self, byte: u8) -> Result<usize> {
        self.write_block(&[byte])
    }

    /// Buffer `bytes` for output. Blocks larger than the buffer are written
    /// straight through after flushing anything pending. Empty writes are
    /// ignored.
    pub fn write_block(&mut self, bytes: &[u8]) -> Result<usize> {
        self.check_writable()?;
        if bytes.is_empty() {
            return Ok(0);
        }
        self.ensure_writing()?;

        if bytes.len() > self.buffer.capacity() {
            self.flush_buffer()?;
            let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
            file.write_all(bytes)?;
            self.observe()?;
        } else {
            if bytes.len() > self.buffer.write_space() {
                self.flush_buffer()?;
            }
            self.buffer.push(bytes);
        }

        if self.config.sync_on_write {
            log::trace!("{}: sync-on-write flush", self.path.display());
            self.flush_buffer()?;
        }
        Ok(bytes.len())
    }

    /// Hand pending writes to the OS. Idempotent.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        self.flush_buffer()
    }

    /// Flush, then force the file to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.check_open()?;
        self.flush_buffer()?;
        self.file_ref()?.sync_all()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Positioning
    // -----------------------------------------------------------------------

    /// Reposition; returns the new absolute position.
    ///
    /// Discards read-ahead and any pushed-back byte.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.check_open()?;
        self.invalidate_buffer()?;
        self.pushback = None;

        let file = self.file.as_mut().ok_or(ChannelError::ClosedHandle)?;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => file.stream_position()?,
            Whence::End => file.metadata()?.len(),
        };
        let target = i64::try_from(base)
            .ok()
            .and_then(|b| b.checked_add(offset))
            .filter(|t| *t >= 0)
            .ok_or(ChannelError::InvalidOffset { offset })?;
        Ok(file.seek(SeekFrom::Start(target as u64))?)
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.seek(0, Whence::Start).map(|_| ())
    }

    /// Logical position: the OS cursor corrected for buffered bytes.
    /// A pending pushback byte does not move the position.
    pub fn current_position(&self) -> Result<u64> {
        let mut file = self.file_ref()?;
        let os = file.stream_position()?;
        Ok(match self.buffer.state() {
            BufferState::Reading => os.saturating_sub(self.buffer.unread() as u64),
            BufferState::Writing => os + self.buffer.pending().len() as u64,
        })
    }

    /// True when nothing is buffered and the position has reached the file
    /// size. Consumes nothing.
    pub fn is_at_end_of_file(&self) -> Result<bool> {
        self.check_readable()?;
        if self.pushback.is_some() || self.buffer.unread() > 0 {
            return Ok(false);
        }
        let len = self.file_ref()?.metadata()?.len();
        Ok(self.current_position()? >= len)
    }

    /// Bytes obtainable without blocking.
    pub fn ready(&self) -> Result<usize> {
        self.check_readable()?;
        let mut file = self.file_ref()?;
        let os = file.stream_position()?;
        let remaining = file.metadata()?.len().saturating_sub(os);
        Ok(self.buffer.unread()
            + usize::from(self.pushback.is_some())
            + usize::try_from(remaining).unwrap_or(usize::MAX))
    }

    /// Resize the file. Growing pads with zero bytes; the position is kept.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.check_writable()?;
        self.invalidate_buffer()?;
        self.file_ref()?.set_len(len)?;
        self.observe()
    }

    /// Reposition for a narrower mode: end of file when `subset` appends,
    /// start of file when it writes.
    pub fn reset(&mut self, subset: ModeDescriptor) -> Result<()> {
        self.check_open()?;
        subset.check_subset_of(self.mode)?;
        if subset.is_appendable() {
            self.seek(0, Whence::End)?;
        } else if subset.is_writable() {
            self.rewind()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Flush and release the file. A second close fails with
    /// [`ChannelError::ClosedHandle`]. The handle is released even when the
    /// final flush fails.
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        let flushed = self.flush_buffer();
        self.file = None;
        self.pushback = None;
        self.buffer.reset();
        flushed
    }

    /// Open an independent handle on the same path, positioned at this
    /// channel's logical position.
    ///
    /// Pending writes are flushed first so the new handle sees them. The new
    /// handle never re-truncates or re-creates exclusively.
    pub fn try_clone(&mut self) -> Result<Self> {
        self.check_open()?;
        self.flush_buffer()?;
        let position = self.current_position()?;
        let mut file = open_file(&self.path, self.mode.for_reopen())?;
        file.seek(SeekFrom::Start(position))?;
        let stamp = FileStamp::of(&file.metadata()?);
        Ok(Self {
            path: self.path.clone(),
            file: Some(file),
            mode: self.mode,
            buffer: ChannelBuffer::new(self.buffer.capacity()),
            config: self.config,
            pushback: None,
            stamp,
        })
    }

    /// Replace the underlying file with `path` opened in `mode`.
    ///
    /// Works on closed channels too; the channel is open afterwards.
    pub fn reopen(&mut self, path: impl AsRef<Path>, mode: ModeDescriptor) -> Result<()> {
        if self.file.is_some() {
            self.flush_buffer()?;
        }
        let path = path.as_ref().to_path_buf();
        let mut file = open_file(&path, mode)?;
        if mode.is_appendable() {
            file.seek(SeekFrom::End(0))?;
        }
        self.path = path;
        self.mode = mode;
        self.file = Some(file);
        self.pushback = None;
        self.buffer.reset();
        self.observe()
    }
}

impl Drop for BufferedChannel {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(err) = self.flush_buffer() {
                log::warn!(
                    "{}: dropping channel with unflushed writes: {err}",
                    self.path.display()
                );
            }
        }
    }
}

impl ByteStream for BufferedChannel {
    fn read_byte(&mut self) -> Result<Option<u8>> {
        BufferedChannel::read_byte(self)
    }

    fn unread_byte(&mut self, byte: u8) {
        BufferedChannel::unread_byte(self, byte);
    }

    fn read_block(&mut self, n: usize) -> Result<Option<Vec<u8>>> {
        BufferedChannel::read_block(self, n)
    }

    fn read_to_end(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_all()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
    }

    fn mode(spec: &str) -> ModeDescriptor {
        ModeDescriptor::parse(spec).unwrap()
    }

    fn small() -> ChannelConfig {
        ChannelConfig::with_capacity(8)
    }

    #[test]
    fn whence_from_raw() {
        assert_eq!(Whence::from_raw(0).unwrap(), Whence::Start);
        assert_eq!(Whence::from_raw(1).unwrap(), Whence::Current);
        assert_eq!(Whence::from_raw(2).unwrap(), Whence::End);
        assert!(matches!(
            Whence::from_raw(3),
            Err(ChannelError::InvalidWhence(3))
        ));
        assert_eq!(Whence::End.as_raw(), 2);
    }

    #[test]
    fn read_only_missing_path_is_not_found() {
        let path = temp_path("chanio-missing");
        let err = BufferedChannel::open(&path, mode("r")).unwrap_err();
        assert!(matches!(err, ChannelError::NotFound { .. }));
        let err = BufferedChannel::open(&path, mode("r+")).unwrap_err();
        assert!(matches!(err, ChannelError::NotFound { .. }));
    }

    #[test]
    fn directory_opened_writable_is_rejected() {
        let dir = std::env::temp_dir();
        let err = BufferedChannel::open(&dir, mode("w")).unwrap_err();
        assert!(matches!(err, ChannelError::IsADirectory { .. }));
    }

    #[test]
    fn exclusive_create_on_existing_file() {
        let path = temp_path("chanio-excl");
        std::fs::write(&path, b"x").unwrap();
        let excl = ModeDescriptor::from_flags(crate::mode::WRONLY | crate::mode::CREAT | crate::mode::EXCL)
            .unwrap();
        let err = BufferedChannel::open(&path, excl).unwrap_err();
        assert!(matches!(err, ChannelError::FileExists { .. }));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_byte_walks_file_across_refills() {
        let path = temp_path("chanio-readbyte");
        std::fs::write(&path, b"abcdefghijkl").unwrap();
        let mut ch = BufferedChannel::open_with_config(&path, mode("r"), small()).unwrap();
        let mut got = Vec::new();
        while let Some(b) = ch.read_byte().unwrap() {
            got.push(b);
        }
        assert_eq!(got, b"abcdefghijkl");
        assert_eq!(ch.read_byte().unwrap(), None);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_block_short_at_end_and_none_after() {
        let path = temp_path("chanio-block");
        std::fs::write(&path, b"0123456789").unwrap();
        let mut ch = BufferedChannel::open_with_config(&path, mode("r"), small()).unwrap();
        assert_eq!(ch.read_block(3).unwrap().unwrap(), b"012");
        assert_eq!(ch.read_block(100).unwrap().unwrap(), b"3456789");
        assert_eq!(ch.read_block(4).unwrap(), None);
        assert_eq!(ch.read_block(0).unwrap().unwrap(), b"");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn position_tracks_buffered_reads_and_writes() {
        let path = temp_path("chanio-pos");
        std::fs::write(&path, b"0123456789").unwrap();
        let mut ch = BufferedChannel::open_with_config(&path, mode("r+"), small()).unwrap();
        ch.read_byte().unwrap();
        ch.read_byte().unwrap();
        assert_eq!(ch.current_position().unwrap(), 2);
        ch.write_block(b"AB").unwrap();
        assert_eq!(ch.current_position().unwrap(), 4);
        ch.flush().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"01AB456789");
        assert_eq!(ch.read_byte().unwrap(), Some(b'4'));
        assert_eq!(ch.current_position().unwrap(), 5);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn seek_variants_and_negative_target() {
        let path = temp_path("chanio-seek");
        std::fs::write(&path, b"0123456789").unwrap();
        let mut ch = BufferedChannel::open_with_config(&path, mode("r"), small()).unwrap();
        ch.read_byte().unwrap();
        assert_eq!(ch.seek(2, Whence::Current).unwrap(), 3);
        assert_eq!(ch.read_byte().unwrap(), Some(b'3'));
        assert_eq!(ch.seek(-1, Whence::End).unwrap(), 9);
        assert_eq!(ch.read_byte().unwrap(), Some(b'9'));
        assert!(matches!(
            ch.seek(-1, Whence::Start),
            Err(ChannelError::InvalidOffset { offset: -1 })
        ));
        ch.rewind().unwrap();
        assert_eq!(ch.read_byte().unwrap(), Some(b'0'));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn seek_discards_pushback() {
        let path = temp_path("chanio-seek-unget");
        std::fs::write(&path, b"abc").unwrap();
        let mut ch = BufferedChannel::open(&path, mode("r")).unwrap();
        ch.unread_byte(b'z');
        ch.rewind().unwrap();
        assert_eq!(ch.read_byte().unwrap(), Some(b'a'));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn block_reads_start_with_pushback() {
        let path = temp_path("chanio-block-unget");
        std::fs::write(&path, b"abcdefghij").unwrap();
        let mut ch = BufferedChannel::open_with_config(&path, mode("r"), small()).unwrap();
        assert_eq!(ch.read_byte().unwrap(), Some(b'a'));
        ch.unread_byte(b'z');
        assert_eq!(ch.read_block(4).unwrap().as_deref(), Some(&b"zbcd"[..]));
        ch.unread_byte(b'q');
        assert_eq!(ch.read_partial(3).unwrap(), b"qef");
        assert_eq!(ch.current_position().unwrap(), 6);
        ch.unread_byte(b'x');
        assert_eq!(ch.current_position().unwrap(), 6);
        assert_eq!(ch.read_byte().unwrap(), Some(b'x'));
        assert_eq!(ch.read_byte().unwrap(), Some(b'g'));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn eof_check_does_not_consume() {
        let path = temp_path("chanio-eof");
        std::fs::write(&path, b"ab").unwrap();
        let mut ch = BufferedChannel::open(&path, mode("r")).unwrap();
        assert!(!ch.is_at_end_of_file().unwrap());
        assert_eq!(ch.read_byte().unwrap(), Some(b'a'));
        assert!(!ch.is_at_end_of_file().unwrap());
        assert_eq!(ch.read_byte().unwrap(), Some(b'b'));
        assert!(ch.is_at_end_of_file().unwrap());
        ch.unread_byte(b'b');
        assert!(!ch.is_at_end_of_file().unwrap());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn permission_checks() {
        let path = temp_path("chanio-perm");
        std::fs::write(&path, b"data").unwrap();
        let mut r = BufferedChannel::open(&path, mode("r")).unwrap();
        assert!(matches!(
            r.write_block(b"x"),
            Err(ChannelError::PermissionViolation { .. })
        ));
        assert!(matches!(
            r.truncate(0),
            Err(ChannelError::PermissionViolation { .. })
        ));
        let mut w = BufferedChannel::open(&path, mode("a")).unwrap();
        assert!(matches!(
            w.read_byte(),
            Err(ChannelError::PermissionViolation { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn empty_write_is_noop() {
        let path = temp_path("chanio-empty");
        let mut ch = BufferedChannel::open(&path, mode("w")).unwrap();
        assert_eq!(ch.write_block(b"").unwrap(), 0);
        assert_eq!(ch.current_position().unwrap(), 0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn oversized_write_bypasses_buffer() {
        let path = temp_path("chanio-bigwrite");
        let mut ch = BufferedChannel::open_with_config(&path, mode("w"), small()).unwrap();
        ch.write_block(b"abc").unwrap();
        ch.write_block(b"0123456789").unwrap();
        // Both the pending bytes and the large block reached the OS.
        assert_eq!(std::fs::read(&path).unwrap(), b"abc0123456789");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn overflowing_write_flushes_first() {
        let path = temp_path("chanio-overflow");
        let mut ch = BufferedChannel::open_with_config(&path, mode("w"), small()).unwrap();
        ch.write_block(b"abcdef").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"");
        ch.write_block(b"ghi").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
        ch.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdefghi");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn sync_on_write_reaches_os_immediately() {
        let path = temp_path("chanio-syncwrite");
        let mut ch = BufferedChannel::open(&path, mode("w")).unwrap();
        ch.set_sync(true);
        assert!(ch.is_sync());
        ch.write_byte(b'q').unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"q");
        ch.sync().unwrap();
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn truncate_shrinks_and_grows() {
        let path = temp_path("chanio-trunc");
        std::fs::write(&path, b"0123456789").unwrap();
        let mut ch = BufferedChannel::open(&path, mode("r+")).unwrap();
        ch.read_byte().unwrap();
        ch.truncate(4).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"0123");
        assert_eq!(ch.current_position().unwrap(), 1);
        ch.truncate(6).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"0123\0\0");
        assert_eq!(ch.read_block(10).unwrap().unwrap(), b"123\0\0");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn close_twice_reports_closed_handle() {
        let path = temp_path("chanio-close");
        let mut ch = BufferedChannel::open(&path, mode("w")).unwrap();
        ch.write_block(b"bye").unwrap();
        ch.close().unwrap();
        assert!(!ch.is_open());
        assert!(matches!(ch.close(), Err(ChannelError::ClosedHandle)));
        assert!(matches!(ch.write_byte(b'x'), Err(ChannelError::ClosedHandle)));
        assert!(matches!(ch.current_position(), Err(ChannelError::ClosedHandle)));
        assert_eq!(std::fs::read(&path).unwrap(), b"bye");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn drop_flushes_pending_writes() {
        let path = temp_path("chanio-drop");
        {
            let mut ch = BufferedChannel::open(&path, mode("w")).unwrap();
            ch.write_block(b"kept").unwrap();
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"kept");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn ready_counts_remaining_bytes() {
        let path = temp_path("chanio-ready");
        std::fs::write(&path, b"abcdef").unwrap();
        let mut ch = BufferedChannel::open_with_config(&path, mode("r"), small()).unwrap();
        assert_eq!(ch.ready().unwrap(), 6);
        ch.read_byte().unwrap();
        assert_eq!(ch.ready().unwrap(), 5);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_partial_signals_end_of_file() {
        let path = temp_path("chanio-partial");
        std::fs::write(&path, b"abc").unwrap();
        let mut ch = BufferedChannel::open(&path, mode("r")).unwrap();
        assert_eq!(ch.read_partial(10).unwrap(), b"abc");
        assert!(ch.read_partial(10).unwrap_err().is_eof());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_all_reopens_after_external_truncation() {
        let path = temp_path("chanio-rotate");
        std::fs::write(&path, b"line one\nline two\n").unwrap();
        let mut ch = BufferedChannel::open_with_config(&path, mode("r"), small()).unwrap();
        assert_eq!(ch.read_block(9).unwrap().unwrap(), b"line one\n");

        // Rotate: replace the file wholesale with something longer.
        let replacement = temp_path("chanio-rotate-new");
        std::fs::write(&replacement, b"XXXXXXXXXnew tail data").unwrap();
        std::fs::rename(&replacement, &path).unwrap();

        assert_eq!(ch.read_all().unwrap().unwrap(), b"new tail data");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_all_without_reopen_keeps_old_handle() {
        let path = temp_path("chanio-noreopen");
        std::fs::write(&path, b"old contents").unwrap();
        let config = ChannelConfig {
            reopen_policy: ReopenPolicy::Off,
            ..small()
        };
        let mut ch = BufferedChannel::open_with_config(&path, mode("r"), config).unwrap();
        let replacement = temp_path("chanio-noreopen-new");
        std::fs::write(&replacement, b"brand new contents").unwrap();
        std::fs::rename(&replacement, &path).unwrap();
        assert_eq!(ch.read_all().unwrap().unwrap(), b"old contents");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn reopen_switches_file_and_mode() {
        let first = temp_path("chanio-freopen-a");
        let second = temp_path("chanio-freopen-b");
        std::fs::write(&first, b"first").unwrap();
        std::fs::write(&second, b"second").unwrap();
        let mut ch = BufferedChannel::open(&first, mode("r")).unwrap();
        ch.close().unwrap();
        ch.reopen(&second, mode("a")).unwrap();
        assert!(ch.is_open());
        assert_eq!(ch.path(), second.as_path());
        ch.write_block(b"!").unwrap();
        ch.close().unwrap();
        assert_eq!(std::fs::read(&second).unwrap(), b"second!");
        std::fs::remove_file(&first).unwrap();
        std::fs::remove_file(&second).unwrap();
    }

    #[test]
    fn reset_respects_subset_and_repositions() {
        let path = temp_path("chanio-reset");
        std::fs::write(&path, b"0123").unwrap();
        let mut ch = BufferedChannel::open(&path, mode("a+")).unwrap();
        ch.reset(mode("a")).unwrap();
        assert_eq!(ch.current_position().unwrap(), 4);
        ch.reset(mode("r+")).unwrap();
        assert_eq!(ch.current_position().unwrap(), 0);

        let mut ro = BufferedChannel::open(&path, mode("r")).unwrap();
        assert!(matches!(
            ro.reset(mode("r+")),
            Err(ChannelError::PermissionViolation { .. })
        ));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn read_only_create_from_flags() {
        let path = temp_path("chanio-rdcreat");
        let m = ModeDescriptor::from_flags(crate::mode::RDONLY | crate::mode::CREAT).unwrap();
        let mut ch = BufferedChannel::open(&path, m).unwrap();
        assert!(path.exists());
        assert_eq!(ch.read_byte().unwrap(), None);
        std::fs::remove_file(&path).unwrap();
    }
}

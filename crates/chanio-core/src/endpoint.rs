//! Byte sources and sinks consumed by unseekable channels.
//!
//! Collaborators (pipes, sockets, standard streams, subprocess pipes,
//! in-memory buffers) are adapted once at construction into trait objects.
//! Dropping a source or sink closes it.

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};

/// Readable end of a stream.
pub trait ByteSource: Send {
    /// Read into `buf`; 0 means end of stream.
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Backing descriptor, if any.
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }

    /// True for the process-wide standard streams, which are never closed.
    fn is_standard(&self) -> bool {
        false
    }
}

/// Writable end of a stream.
pub trait ByteSink: Send {
    /// Write from `buf`, returning the count accepted.
    fn write_from(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Push anything the sink itself buffers to the OS.
    fn flush(&mut self) -> io::Result<()>;

    /// Backing descriptor, if any.
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }

    /// True for the process-wide standard streams, which are never closed.
    fn is_standard(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// [`ByteSource`] over any [`Read`].
#[derive(Debug)]
pub struct Source<R> {
    inner: R,
    fd: Option<RawFd>,
    standard: bool,
}

impl<R: Read + Send> Source<R> {
    /// Wrap a reader with no descriptor (readiness probes report 0).
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            fd: None,
            standard: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + AsRawFd + Send> Source<R> {
    /// Wrap a descriptor-backed reader.
    pub fn with_fd(inner: R) -> Self {
        let fd = inner.as_raw_fd();
        Self {
            inner,
            fd: Some(fd),
            standard: false,
        }
    }
}

impl Source<io::Stdin> {
    /// The process's standard input.
    pub fn stdin() -> Self {
        Self {
            inner: io::stdin(),
            fd: Some(libc::STDIN_FILENO),
            standard: true,
        }
    }
}

impl<R: Read + Send> ByteSource for Source<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.fd
    }

    fn is_standard(&self) -> bool {
        self.standard
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// [`ByteSink`] over any [`Write`].
#[derive(Debug)]
pub struct Sink<W> {
    inner: W,
    fd: Option<RawFd>,
    standard: bool,
}

impl<W: Write + Send> Sink<W> {
    /// Wrap a writer with no descriptor (sync only flushes).
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            fd: None,
            standard: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + AsRawFd + Send> Sink<W> {
    /// Wrap a descriptor-backed writer.
    pub fn with_fd(inner: W) -> Self {
        let fd = inner.as_raw_fd();
        Self {
            inner,
            fd: Some(fd),
            standard: false,
        }
    }
}

impl Sink<io::Stdout> {
    /// The process's standard output.
    pub fn stdout() -> Self {
        Self {
            inner: io::stdout(),
            fd: Some(libc::STDOUT_FILENO),
            standard: true,
        }
    }
}

impl Sink<io::Stderr> {
    /// The process's standard error.
    pub fn stderr() -> Self {
        Self {
            inner: io::stderr(),
            fd: Some(libc::STDERR_FILENO),
            standard: true,
        }
    }
}

impl<W: Write + Send> ByteSink for Sink<W> {
    fn write_from(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.inner.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.fd
    }

    fn is_standard(&self) -> bool {
        self.standard
    }
}

//! Error taxonomy for channel operations.
//!
//! Every fallible operation in this crate returns [`Result`]. End-of-file on
//! ordinary buffered reads is reported as `Ok(None)`; the
//! [`ChannelError::EndOfFile`] variant is reserved for primitives that must
//! produce at least one byte.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by channels, handlers, and the descriptor table.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Malformed mode string or unrecognized flag combination.
    #[error("invalid access mode: {spec}")]
    InvalidModeSpec { spec: String },

    /// The operation needs a capability the handler was not opened with.
    #[error("permission violation: {operation}")]
    PermissionViolation { operation: &'static str },

    /// A non-creating open named a path that does not exist.
    #[error("no such file or directory: {}", path.display())]
    NotFound { path: PathBuf },

    /// Exclusive create requested for a path that already exists.
    #[error("file exists: {}", path.display())]
    FileExists { path: PathBuf },

    /// A directory was opened with a writable mode.
    #[error("is a directory: {}", path.display())]
    IsADirectory { path: PathBuf },

    /// Any underlying OS failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// Seek, position, or truncate requested on a stream.
    #[error("illegal seek on unseekable channel")]
    NotSeekable,

    /// Operation attempted after close.
    #[error("closed stream")]
    ClosedHandle,

    /// Seek target would be negative.
    #[error("invalid offset {offset}")]
    InvalidOffset { offset: i64 },

    /// Whence value outside `SEEK_SET..=SEEK_END`.
    #[error("invalid whence {0}")]
    InvalidWhence(i32),

    /// Channel constructed without any usable end.
    #[error("invalid channel configuration: {0}")]
    InvalidConfiguration(&'static str),

    /// End of stream reached by a read that must return data.
    #[error("end of file reached")]
    EndOfFile,
}

impl ChannelError {
    /// POSIX errno equivalent, for embedders that surface errno codes.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidModeSpec { .. }
            | Self::InvalidOffset { .. }
            | Self::InvalidWhence(_)
            | Self::InvalidConfiguration(_) => libc::EINVAL,
            Self::PermissionViolation { .. } => libc::EACCES,
            Self::NotFound { .. } => libc::ENOENT,
            Self::FileExists { .. } => libc::EEXIST,
            Self::IsADirectory { .. } => libc::EISDIR,
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::NotSeekable => libc::ESPIPE,
            Self::ClosedHandle => libc::EBADF,
            Self::EndOfFile => 0,
        }
    }

    /// True for the end-of-file signal.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::EndOfFile)
    }

    pub(crate) fn not_readable() -> Self {
        Self::PermissionViolation {
            operation: "not opened for reading",
        }
    }

    pub(crate) fn not_writable() -> Self {
        Self::PermissionViolation {
            operation: "not opened for writing",
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChannelError>;

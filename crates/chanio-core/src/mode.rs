//! Access-mode descriptors.
//!
//! Parses fopen-style mode strings (`"r"`, `"w+"`, `"ab"`, ...) and
//! open(2)-style integer flag sets into an immutable [`ModeDescriptor`].
//!
//! Reference: POSIX.1-2024 fopen, open

use std::fmt;

use crate::error::{ChannelError, Result};

// ---------------------------------------------------------------------------
// Flag bits
// ---------------------------------------------------------------------------

/// Open for reading only.
pub const RDONLY: i32 = 0;
/// Open for writing only.
pub const WRONLY: i32 = 1;
/// Open for reading and writing.
pub const RDWR: i32 = 2;
/// Create the file if it does not exist.
pub const CREAT: i32 = 64;
/// With `CREAT`, fail if the file exists.
pub const EXCL: i32 = 128;
/// Accepted for compatibility; has no effect here.
pub const NOCTTY: i32 = 256;
/// Truncate to zero length on open.
pub const TRUNC: i32 = 512;
/// Every write goes to end of file.
pub const APPEND: i32 = 1024;
/// Non-blocking open.
pub const NONBLOCK: i32 = 2048;
/// Binary marker, carried through for consumers.
pub const BINARY: i32 = 4096;

/// Mask selecting the access mode bits.
pub const ACCMODE: i32 = 3;

const KNOWN_FLAGS: i32 = ACCMODE | CREAT | EXCL | NOCTTY | TRUNC | APPEND | NONBLOCK | BINARY;

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Canonical set of capabilities a handler was opened with.
///
/// Invariant: at least one of `readable`/`writable` is set. Values are
/// immutable once built; derived handles get their own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeDescriptor {
    readable: bool,
    writable: bool,
    appendable: bool,
    truncate: bool,
    create: bool,
    exclusive: bool,
    binary: bool,
    nonblocking: bool,
}

impl ModeDescriptor {
    /// Read-only descriptor.
    pub const READ_ONLY: Self = Self::access(true, false);
    /// Write-only descriptor.
    pub const WRITE_ONLY: Self = Self::access(false, true);
    /// Read/write descriptor.
    pub const READ_WRITE: Self = Self::access(true, true);

    const fn access(readable: bool, writable: bool) -> Self {
        Self {
            readable,
            writable,
            appendable: false,
            truncate: false,
            create: false,
            exclusive: false,
            binary: false,
            nonblocking: false,
        }
    }

    /// Parse a mode string.
    ///
    /// Grammar: one of `r`, `w`, `a`, followed by at most one `b` and at most
    /// one `+`, in either order.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || ChannelError::InvalidModeSpec {
            spec: spec.to_owned(),
        };
        let bytes = spec.as_bytes();
        let Some((&base, rest)) = bytes.split_first() else {
            return Err(invalid());
        };

        let mut mode = match base {
            b'r' => Self::access(true, false),
            b'w' => Self {
                truncate: true,
                create: true,
                ..Self::access(false, true)
            },
            b'a' => Self {
                appendable: true,
                create: true,
                ..Self::access(false, true)
            },
            _ => return Err(invalid()),
        };

        let mut seen_plus = false;
        for &modifier in rest {
            match modifier {
                b'+' if !seen_plus => {
                    seen_plus = true;
                    mode.readable = true;
                    mode.writable = true;
                }
                b'b' if !mode.binary => mode.binary = true,
                _ => return Err(invalid()),
            }
        }

        Ok(mode)
    }

    /// Build a descriptor from an integer flag set.
    pub fn from_flags(flags: i32) -> Result<Self> {
        let invalid = || ChannelError::InvalidModeSpec {
            spec: format!("{flags:#o}"),
        };
        if flags < 0 || flags & !KNOWN_FLAGS != 0 {
            return Err(invalid());
        }
        let (readable, writable) = match flags & ACCMODE {
            RDONLY => (true, false),
            WRONLY => (false, true),
            RDWR => (true, true),
            _ => return Err(invalid()),
        };
        Ok(Self {
            readable,
            writable,
            appendable: flags & APPEND != 0,
            truncate: flags & TRUNC != 0,
            create: flags & CREAT != 0,
            exclusive: flags & EXCL != 0,
            binary: flags & BINARY != 0,
            nonblocking: flags & NONBLOCK != 0,
        })
    }

    /// Integer flag set equivalent to this descriptor.
    #[must_use]
    pub fn to_flags(self) -> i32 {
        let mut flags = match (self.readable, self.writable) {
            (true, true) => RDWR,
            (false, true) => WRONLY,
            _ => RDONLY,
        };
        for (set, bit) in [
            (self.create, CREAT),
            (self.exclusive, EXCL),
            (self.truncate, TRUNC),
            (self.appendable, APPEND),
            (self.nonblocking, NONBLOCK),
            (self.binary, BINARY),
        ] {
            if set {
                flags |= bit;
            }
        }
        flags
    }

    /// Descriptor for a stream whose ends are known up front.
    pub fn for_ends(readable: bool, writable: bool) -> Result<Self> {
        if !readable && !writable {
            return Err(ChannelError::InvalidConfiguration(
                "channel needs a readable source or a writable sink",
            ));
        }
        Ok(Self::access(readable, writable))
    }

    #[must_use]
    pub fn is_readable(self) -> bool {
        self.readable
    }

    #[must_use]
    pub fn is_writable(self) -> bool {
        self.writable
    }

    #[must_use]
    pub fn is_appendable(self) -> bool {
        self.appendable
    }

    /// True if opening must truncate the target.
    #[must_use]
    pub fn should_truncate(self) -> bool {
        self.truncate
    }

    #[must_use]
    pub fn is_create(self) -> bool {
        self.create
    }

    #[must_use]
    pub fn is_exclusive(self) -> bool {
        self.exclusive
    }

    #[must_use]
    pub fn is_binary(self) -> bool {
        self.binary
    }

    #[must_use]
    pub fn is_nonblocking(self) -> bool {
        self.nonblocking
    }

    /// True iff every capability held here is also held by `other`.
    #[must_use]
    pub fn is_subset_of(self, other: Self) -> bool {
        (!self.readable || other.readable)
            && (!self.writable || other.writable)
            && (!self.appendable || other.appendable)
    }

    /// Like [`is_subset_of`](Self::is_subset_of) but fails with
    /// [`ChannelError::PermissionViolation`].
    pub fn check_subset_of(self, other: Self) -> Result<()> {
        if self.is_subset_of(other) {
            Ok(())
        } else {
            Err(ChannelError::PermissionViolation {
                operation: "requested mode exceeds the granted mode",
            })
        }
    }

    /// Copy of this descriptor suitable for reopening an existing file
    /// without destroying its contents.
    #[must_use]
    pub fn for_reopen(self) -> Self {
        Self {
            truncate: false,
            exclusive: false,
            ..self
        }
    }
}

impl fmt::Display for ModeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = if self.appendable {
            "a"
        } else if self.truncate || !self.readable {
            "w"
        } else {
            "r"
        };
        f.write_str(base)?;
        if self.readable && self.writable {
            f.write_str("+")?;
        }
        if self.binary {
            f.write_str("b")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ModeDescriptor {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

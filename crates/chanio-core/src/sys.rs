//! Raw descriptor probes that std does not expose.
//!
//! # Safety
//!
//! Each call passes a caller-supplied descriptor straight to the kernel. A
//! stale descriptor yields `EBADF`, never memory unsafety, because no pointer
//! other than a local out-parameter crosses the boundary.

use std::io;
use std::os::fd::RawFd;

/// Bytes readable from `fd` without blocking (`FIONREAD`).
pub fn bytes_available(fd: RawFd) -> io::Result<usize> {
    let mut n: libc::c_int = 0;
    // SAFETY: `n` is a valid, writable c_int for the duration of the call.
    let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut n) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(usize::try_from(n).unwrap_or(0))
}

/// Force data written through `fd` to stable storage.
///
/// Descriptors that cannot be synced (pipes, ttys, sockets) report success.
pub fn sync_fd(fd: RawFd) -> io::Result<()> {
    // SAFETY: fsync takes no pointers.
    let rc = unsafe { libc::fsync(fd) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EINVAL) | Some(libc::EROFS) | Some(libc::ENOTSUP) => Ok(()),
        _ => Err(err),
    }
}

//! Move-only owner of a single OS handle.
//!
//! `Resource<R>` holds at most one raw handle and releases it exactly once,
//! when the owner is dropped. The release function is fixed at compile
//! time by the `Release` policy `R`.
//!
//! Ownership moves with the value. Assigning over a live resource drops
//! (and releases) the old handle first. `take()` moves the raw handle out
//! without releasing it and leaves the resource empty.
//!
//! Release failures are not reported to the owner: `Drop` cannot return
//! them. They are logged at `debug` level and otherwise discarded.

use core::fmt;
use core::marker::PhantomData;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use nix::errno::Errno;

use crate::syscall::try_call;

/// Release policy for a raw handle type.
pub trait Release {
    type Raw: Copy + fmt::Debug;

    fn release(raw: Self::Raw) -> Result<(), Errno>;
}

/// Releases a file descriptor with close(2).
#[derive(Debug)]
pub struct Close;

impl Release for Close {
    type Raw = RawFd;

    #[inline]
    fn release(fd: RawFd) -> Result<(), Errno> {
        nix::unistd::close(fd)
    }
}

/// Exclusive owner of one raw handle.
pub struct Resource<R: Release> {
    raw: Option<R::Raw>,
    _release: PhantomData<fn() -> R>,
}

/// An owned file descriptor.
pub type FileDescriptor = Resource<Close>;

impl<R: Release> Resource<R> {
    /// Take ownership of `raw`.
    #[inline]
    pub fn new(raw: R::Raw) -> Self {
        Self { raw: Some(raw), _release: PhantomData }
    }

    /// A resource that owns nothing.
    #[inline]
    pub fn empty() -> Self {
        Self { raw: None, _release: PhantomData }
    }

    /// Borrow the raw value. Ownership stays here.
    #[inline]
    pub fn get(&self) -> Option<R::Raw> {
        self.raw
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// Move the raw value out. The caller becomes responsible for it.
    #[inline]
    pub fn take(&mut self) -> Option<R::Raw> {
        self.raw.take()
    }
}

impl<R: Release> Default for Resource<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R: Release> Drop for Resource<R> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Err(errno) = R::release(raw) {
                tracing::debug!(?raw, %errno, "resource release failed");
            }
        }
    }
}

impl<R: Release> fmt::Debug for Resource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw {
            Some(raw) => write!(f, "Resource({:?})", raw),
            None => write!(f, "Resource(empty)"),
        }
    }
}

impl FileDescriptor {
    /// open(2) `path` with `flags` (O_CLOEXEC is always added) and `mode`.
    pub fn open(path: &Path, flags: libc::c_int, mode: libc::mode_t) -> Result<Self, Errno> {
        let path = CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::EINVAL)?;
        let fd = try_call(|| unsafe {
            libc::open(path.as_ptr(), flags | libc::O_CLOEXEC, mode as libc::c_uint)
        })?;
        Ok(Self::new(fd))
    }
}

impl AsRawFd for FileDescriptor {
    /// The descriptor, or -1 when empty.
    fn as_raw_fd(&self) -> RawFd {
        self.raw.unwrap_or(-1)
    }
}

//! ringside error types.
//!
//! Every boundary returns `Result<T>`; nothing panics or unwinds across the
//! reactor. Errors that originate at an awaited operation carry the call
//! site that built the operation.

use std::panic::Location;

use nix::errno::Errno;
use thiserror::Error;

use crate::entry::{Opcode, Token};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Ring initialization failed (bad capacity/flags or resource exhaustion).
    #[error("ring setup failed: {errno}")]
    Setup { errno: Errno },

    /// No submission slot available. Not retried.
    #[error("submission queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Handing the batch to the kernel failed.
    #[error("ring submit failed: {errno}")]
    Submit { errno: Errno },

    /// Waiting for a completion failed.
    #[error("ring wait failed: {errno}")]
    Wait { errno: Errno },

    /// A completion reported a negative status.
    #[error("{op} failed: {errno} (at {location})")]
    Operation {
        op: Opcode,
        errno: Errno,
        location: &'static Location<'static>,
    },

    /// A completion carried a token no live frame is armed with.
    #[error("stale completion token {0}")]
    StaleToken(Token),

    /// The current frame already has an operation in flight.
    #[error("frame {slot} already awaits an operation (at {location})")]
    FrameBusy {
        slot: u32,
        location: &'static Location<'static>,
    },

    /// An operation was awaited outside a frame driven by a reactor.
    #[error("operation awaited outside a reactor task (at {location})")]
    NoCurrentTask { location: &'static Location<'static> },

    /// An operation was built on an empty resource handle.
    #[error("operation on an empty handle (at {location})")]
    EmptyHandle { location: &'static Location<'static> },

    /// `execute()` was called with nothing outstanding.
    #[error("no operations outstanding")]
    Idle,

    /// A task was polled again after it completed.
    #[error("task polled after completion (created at {location})")]
    TaskCompleted { location: &'static Location<'static> },

    /// Plain OS error from a syscall outside the ring.
    #[error("os error: {0}")]
    Os(#[from] Errno),
}

impl Error {
    /// The OS error code, if this error carries one.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::Setup { errno }
            | Error::Submit { errno }
            | Error::Wait { errno }
            | Error::Operation { errno, .. } => Some(*errno),
            Error::Os(errno) => Some(*errno),
            Error::QueueFull { .. } => Some(Errno::EBUSY),
            _ => None,
        }
    }

    /// Source location that produced the error, when known.
    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            Error::Operation { location, .. }
            | Error::FrameBusy { location, .. }
            | Error::NoCurrentTask { location }
            | Error::EmptyHandle { location }
            | Error::TaskCompleted { location } => Some(location),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::QueueFull { capacity: 4 };
        assert_eq!(format!("{}", e), "submission queue full (capacity 4)");

        let e = Error::Setup { errno: Errno::ENOMEM };
        assert!(format!("{}", e).starts_with("ring setup failed"));
    }

    #[test]
    fn test_operation_error_keeps_location() {
        let here = Location::caller();
        let e = Error::Operation { op: Opcode::Read, errno: Errno::EBADF, location: here };
        assert_eq!(e.errno(), Some(Errno::EBADF));
        assert_eq!(e.location().map(|l| l.file()), Some(file!()));
        assert!(format!("{}", e).contains("read failed"));
    }

    #[test]
    fn test_errno_conversion() {
        let e: Error = Errno::ENOENT.into();
        assert_eq!(e, Error::Os(Errno::ENOENT));
        assert_eq!(Error::Idle.errno(), None);
    }
}

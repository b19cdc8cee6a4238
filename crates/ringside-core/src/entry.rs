//! Submission and completion entry types.
//!
//! These are the *lingua franca* between the reactor and a ring backend.
//! A backend translates `Submission` into its native format (an io_uring
//! SQE, or a queued userspace record) and hands back `Completion`s carrying
//! the same `Token`.

use core::fmt;
use std::os::unix::io::RawFd;

/// Completion token stored in the ring's `user_data` field.
///
/// Packs a frame slot index (low 32 bits) and that slot's arming generation
/// (high 32 bits). The generation changes every time a frame is armed, so a
/// token is valid for exactly one completion.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Token(u64);

impl Token {
    /// Build a token from a slot index and generation.
    #[inline]
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | slot as u64)
    }

    /// Reconstruct a token from the raw `user_data` value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value as stored in the ring.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn slot(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}#{})", self.slot(), self.generation())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.slot(), self.generation())
    }
}

/// Operation kind without its payload (for logs and errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Read,
    Write,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Nop => write!(f, "nop"),
            Opcode::Read => write!(f, "read"),
            Opcode::Write => write!(f, "write"),
        }
    }
}

/// A fully specified operation.
///
/// Buffers are raw pointers: whoever builds the operation guarantees the
/// memory outlives the matching completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Completes immediately with status 0.
    Nop,
    /// pread(2): read `len` bytes from `fd` at `offset` into `buf`.
    Read {
        fd: RawFd,
        buf: *mut u8,
        len: u32,
        offset: u64,
    },
    /// pwrite(2): write `len` bytes from `buf` to `fd` at `offset`.
    Write {
        fd: RawFd,
        buf: *const u8,
        len: u32,
        offset: u64,
    },
}

impl Operation {
    #[inline]
    pub fn opcode(&self) -> Opcode {
        match self {
            Operation::Nop => Opcode::Nop,
            Operation::Read { .. } => Opcode::Read,
            Operation::Write { .. } => Opcode::Write,
        }
    }
}

/// A queued request awaiting kernel pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub token: Token,
    pub op: Operation,
}

/// A finished operation reported by the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// The token attached at submission.
    pub token: Token,
    /// Result value, or negative errno.
    pub result: i32,
}

impl Completion {
    #[inline]
    pub fn is_error(&self) -> bool {
        self.result < 0
    }
}

//! # ringside-core - types and traits shared by every ringside crate
//!
//! This crate holds the vocabulary of the reactor: the completion token
//! carried through the kernel, the submission and completion entries, the
//! `Ring` trait that every submission/completion backend implements, the
//! error taxonomy, and the owned OS handle.
//!
//! It carries no ring implementation. `BasicIoUring` and `ScriptedRing`
//! live in `ringside-module`; the reactor itself lives in `ringside`.
//!
//! ## Modules
//!
//! - `entry` - completion token, operations, submission/completion entries
//! - `ring` - the submission/completion ring interface
//! - `error` - error taxonomy and `Result` alias
//! - `resource` - move-only owner of one OS handle
//! - `syscall` - sign-convention helpers for raw syscalls
//! - `env` - environment variable overrides

pub mod entry;
pub mod ring;
pub mod error;
pub mod resource;
pub mod syscall;
pub mod env;

// Re-exports for convenience
pub use entry::{Completion, Opcode, Operation, Submission, Token};
pub use error::{Error, Result};
pub use resource::{Close, FileDescriptor, Release, Resource};
pub use ring::Ring;
pub use syscall::{try_call, try_call_neg};

pub use nix::errno::Errno;

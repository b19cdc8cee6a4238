//! Submission/completion ring abstraction.
//!
//! A `Ring` is a fixed-capacity pair of queues: the reactor pushes
//! `Submission`s into slots, submits them as a batch, then blocks for one
//! `Completion` at a time.
//!
//! # Implementors
//!
//! - `BasicIoUring` (ringside-module): kernel io_uring through the
//!   `io-uring` crate. No SQPOLL by default, no fixed files or buffers.
//!
//! - `ScriptedRing` (ringside-module): userspace queues. Operations are
//!   performed with pread/pwrite when a completion is awaited, or completed
//!   by hand in any order. Used to drive the reactor deterministically.

use crate::entry::{Completion, Submission};
use crate::error::Result;

/// The five capabilities the reactor needs from a ring.
///
/// **Contract:** `push()` and `submit()` must never block. `wait()` is the
/// only blocking call.
pub trait Ring {
    /// Acquire a free submission slot and fill it. Queued, not submitted.
    ///
    /// Returns `Err(QueueFull)` if no slot is free; the caller decides
    /// whether to retry.
    fn push(&mut self, submission: Submission) -> Result<()>;

    /// Hand every queued submission to the kernel.
    ///
    /// Returns the number of entries submitted.
    fn submit(&mut self) -> Result<usize>;

    /// Block until one completion is available, acknowledge it, return it.
    fn wait(&mut self) -> Result<Completion>;

    /// Submissions queued but not yet picked up.
    fn sq_pending(&self) -> usize;

    /// Completions posted but not yet consumed.
    fn cq_ready(&self) -> usize;

    /// Number of submission slots.
    fn capacity(&self) -> usize;
}

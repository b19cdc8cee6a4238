//! # ringside - completion-queue reactor
//!
//! A single-threaded scheduler that submits I/O to a paired
//! submission/completion ring and resumes the suspended task whose token
//! comes back with each completion.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ringside::{FileDescriptor, Reactor, SetupFlags, Task};
//!
//! let reactor = Reactor::new(4, SetupFlags::NONE)?;
//! let io = reactor.handle();
//! let src = FileDescriptor::open("ahoy.txt".as_ref(), libc::O_RDONLY, 0)?;
//!
//! reactor.spawn(Task::new(async move {
//!     let (n, buf) = io.read(&src, vec![0u8; 9], 0).await?;
//!     assert_eq!(&buf[..n], b"Land AHOY");
//!     Ok(())
//! }))?;
//!
//! while reactor.outstanding() > 0 {
//!     reactor.execute()?;
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │         Task::new(async { io.read(..).await? ... })         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ spawn / await
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Reactor                               │
//! │   frame arena (slot + generation = token), execute() loop   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ push / submit / wait
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Ring (ringside-core)                       │
//! │       BasicIoUring (kernel)  │  ScriptedRing (userspace)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nested tasks never touch the ring: awaiting a `Task` runs it inside the
//! caller's frame, and its completion returns straight to the await point.
//!
//! ## Hazards
//!
//! There is no cancellation. Reads and writes own their buffers, and a
//! buffer stays parked in the reactor until its operation completes, even
//! when the task or `Op` that issued it is dropped first. Dropping the
//! `Reactor` waits for every in-flight completion, so on the kernel ring it
//! blocks for as long as any pending operation does, forever for a read on
//! a pipe that never becomes readable.

mod context;
mod frame;
mod op;
mod reactor;
mod task;
mod waker;

pub use op::{IoBuf, Op};
pub use reactor::{Handle, Reactor};
pub use task::{Precursor, Task, TaskState};

pub use ringside_core::{
    try_call, try_call_neg, Close, Completion, Errno, Error, FileDescriptor, Opcode, Operation,
    Release, Resource, Result, Ring, Submission, Token,
};
pub use ringside_module::{RingConfig, ScriptMode, ScriptedControl, ScriptedRing, SetupFlags};

#[cfg(target_os = "linux")]
pub use ringside_module::BasicIoUring;

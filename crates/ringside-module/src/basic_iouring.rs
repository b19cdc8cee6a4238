//! `BasicIoUring` - default `Ring` implementation.
//!
//! Wraps the `io-uring` crate. Submission pushes one SQE per call and is
//! kicked explicitly with `submit()`; `wait()` blocks in
//! `io_uring_enter(min_complete = 1)` until a CQE is posted.
//! No fixed files, no fixed buffers. Works on any kernel with io_uring (5.6+).

use std::os::unix::io::{AsRawFd, RawFd};

use io_uring::{opcode, squeue, types, IoUring};
use ringside_core::entry::{Completion, Operation, Submission, Token};
use ringside_core::error::{Error, Result};
use ringside_core::ring::Ring;
use ringside_core::syscall::errno_of;
use ringside_core::Errno;

use crate::config::{RingConfig, SetupFlags};

/// Kernel io_uring backend.
pub struct BasicIoUring {
    ring: IoUring,
}

impl BasicIoUring {
    /// Set up a ring with `sq_entries` submission slots and `flags`.
    pub fn new(sq_entries: u32, flags: SetupFlags) -> Result<Self> {
        Self::with_config(&RingConfig::new().sq_entries(sq_entries).flags(flags))
    }

    pub fn with_config(config: &RingConfig) -> Result<Self> {
        if let Err(reason) = config.validate() {
            tracing::warn!(reason, "rejecting ring config");
            return Err(Error::Setup { errno: Errno::EINVAL });
        }

        let mut builder = IoUring::builder();
        if config.flags.contains(SetupFlags::IOPOLL) {
            builder.setup_iopoll();
        }
        if config.flags.contains(SetupFlags::SQPOLL) {
            let idle = u32::try_from(config.sqpoll_idle.as_millis()).unwrap_or(u32::MAX);
            builder.setup_sqpoll(idle);
        }
        if config.flags.contains(SetupFlags::CLAMP) {
            builder.setup_clamp();
        }
        if config.flags.contains(SetupFlags::COOP_TASKRUN) {
            builder.setup_coop_taskrun();
        }
        if config.flags.contains(SetupFlags::SINGLE_ISSUER) {
            builder.setup_single_issuer();
        }
        if let Some(cq) = config.cq_entries {
            builder.setup_cqsize(cq);
        }

        let ring = builder
            .build(config.sq_entries)
            .map_err(|e| Error::Setup { errno: errno_of(&e) })?;

        tracing::debug!(
            sq = ring.params().sq_entries(),
            cq = ring.params().cq_entries(),
            flags = config.flags.bits(),
            "io_uring ready"
        );
        Ok(Self { ring })
    }

    /// The io_uring fd.
    pub fn fd(&self) -> RawFd {
        self.ring.as_raw_fd()
    }

    /// Translate a submission into an SQE stamped with its token.
    fn build_sqe(submission: &Submission) -> squeue::Entry {
        let sqe = match submission.op {
            Operation::Nop => opcode::Nop::new().build(),
            Operation::Read { fd, buf, len, offset } => {
                opcode::Read::new(types::Fd(fd), buf, len).offset(offset).build()
            }
            Operation::Write { fd, buf, len, offset } => {
                opcode::Write::new(types::Fd(fd), buf, len).offset(offset).build()
            }
        };
        sqe.user_data(submission.token.raw())
    }
}

impl Ring for BasicIoUring {
    fn push(&mut self, submission: Submission) -> Result<()> {
        let capacity = self.capacity();
        let sqe = Self::build_sqe(&submission);

        // Safety: the reactor keeps every buffer named by `submission` alive
        // until the matching completion has been consumed.
        unsafe {
            self.ring
                .submission()
                .push(&sqe)
                .map_err(|_| Error::QueueFull { capacity })?;
        }
        tracing::trace!(token = %submission.token, op = %submission.op.opcode(), "sqe queued");
        Ok(())
    }

    fn submit(&mut self) -> Result<usize> {
        self.ring
            .submit()
            .map_err(|e| Error::Submit { errno: errno_of(&e) })
    }

    fn wait(&mut self) -> Result<Completion> {
        loop {
            // Dropping the completion queue publishes the new head, which
            // acknowledges the CQE to the kernel.
            if let Some(cqe) = self.ring.completion().next() {
                return Ok(Completion {
                    token: Token::from_raw(cqe.user_data()),
                    result: cqe.result(),
                });
            }
            self.ring
                .submit_and_wait(1)
                .map_err(|e| Error::Wait { errno: errno_of(&e) })?;
        }
    }

    fn sq_pending(&self) -> usize {
        // Safety: single-threaded owner, and no other queue handle on this
        // ring is alive while `&self` is borrowed.
        unsafe { self.ring.submission_shared().len() }
    }

    fn cq_ready(&self) -> usize {
        // Safety: as above.
        unsafe { self.ring.completion_shared().len() }
    }

    fn capacity(&self) -> usize {
        self.ring.params().sq_entries() as usize
    }
}

// Note: no manual Drop. `io_uring::IoUring` closes the fd and unmaps the
// rings itself.

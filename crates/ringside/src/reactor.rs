//! The reactor: one ring, one flat completion loop.
//!
//! ```text
//!   spawn(task) ──► frame slot ──► NOP(token) ─┐
//!                                              ▼
//!   Op.await ──► arm frame ──► push ──► submit ──► ring
//!                                                   │
//!   execute(): wait ◄───────────────────────────────┘
//!        │ deferred submit error? ─► Err(Submit)
//!        │ resolve(token) ── stale? ─► Err(StaleToken)
//!        ▼
//!     poll frame (current frame = slot)
//!        ├─ Pending  ──► park until its next completion
//!        └─ Ready    ──► free slot, surface task error
//! ```
//!
//! Strictly single-threaded. `Reactor` and `Handle` are `!Send`; every
//! interior borrow is released before a frame is polled, so tasks may build
//! operations and spawn further tasks through a `Handle`.

use std::cell::{Cell, RefCell};
use std::os::unix::io::AsRawFd;
use std::panic::Location;
use std::rc::Rc;
use std::task::{Context, Poll};

use ringside_core::entry::{Opcode, Operation, Submission, Token};
use ringside_core::error::{Error, Result};
use ringside_core::ring::Ring;
use ringside_core::syscall::try_call_neg;

use crate::context;
use crate::frame::FrameArena;
use crate::op::Op;
use crate::task::{Precursor, Task};
use crate::waker::noop_waker;

/// State shared between the reactor, its handles and in-flight operations.
pub(crate) struct Core {
    ring: RefCell<Box<dyn Ring>>,
    frames: RefCell<FrameArena>,
    /// Pushed minus completed
    outstanding: Cell<usize>,
    /// First submit failure since the last `execute()`
    deferred: Cell<Option<Error>>,
}

impl Core {
    /// Arm `slot`, push `op` tagged with the new token and submit it.
    ///
    /// Once the push succeeds the entry is committed: a failing submit
    /// leaves the frame armed and the entry queued for the next submit or
    /// wait, and the error is reported by the next `execute()`.
    pub(crate) fn submit(
        &self,
        slot: u32,
        op: Operation,
        location: &'static Location<'static>,
        buffer: Option<Vec<u8>>,
    ) -> Result<Token> {
        let token = self.frames.borrow_mut().arm(slot, op.opcode(), location, buffer)?;
        let mut ring = self.ring.borrow_mut();

        if let Err(e) = ring.push(Submission { token, op }) {
            drop(ring);
            self.frames.borrow_mut().disarm(token);
            tracing::debug!(%token, op = %op.opcode(), error = %e, "push rejected");
            return Err(e);
        }
        self.outstanding.set(self.outstanding.get() + 1);

        match ring.submit() {
            Ok(_) => tracing::trace!(%token, op = %op.opcode(), at = %location, "submitted"),
            Err(e) => {
                tracing::warn!(%token, error = %e, "submit failed, entry left queued");
                self.defer(e);
            }
        }
        Ok(token)
    }

    fn defer(&self, error: Error) {
        let first = self.deferred.take().unwrap_or(error);
        self.deferred.set(Some(first));
    }

    pub(crate) fn take_status(&self, token: Token) -> Option<(i32, Option<Vec<u8>>)> {
        self.frames.borrow_mut().take_status(token)
    }

    pub(crate) fn in_flight(&self, token: Token) -> bool {
        self.frames.try_borrow().is_ok_and(|f| f.armed_with(token))
    }

    fn spawn<T: 'static>(&self, mut task: Task<T>) -> Result<Token> {
        task.set_precursor(Precursor::Reactor);
        let location = task.location();
        let slot = self
            .frames
            .borrow_mut()
            .insert(Box::pin(async move { task.await.map(drop) }));

        match self.submit(slot, Operation::Nop, location, None) {
            Ok(token) => {
                tracing::debug!(%token, created = %location, "task spawned");
                Ok(token)
            }
            Err(e) => {
                let future = self.frames.borrow_mut().release(slot);
                drop(future);
                Err(e)
            }
        }
    }

    /// Poll the frame in `slot` once.
    fn resume(&self, slot: u32) -> Result<()> {
        let Some(mut future) = self.frames.borrow_mut().take_future(slot) else {
            return Ok(());
        };
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        match context::enter(slot, || future.as_mut().poll(&mut cx)) {
            Poll::Pending => {
                let mut frames = self.frames.borrow_mut();
                if !frames.is_armed(slot) {
                    tracing::warn!(slot, "task parked with no operation in flight");
                }
                frames.restore(slot, future);
                Ok(())
            }
            Poll::Ready(outcome) => {
                let _ = self.frames.borrow_mut().release(slot);
                drop(future);
                if let Err(e) = &outcome {
                    tracing::debug!(slot, error = %e, "task finished with error");
                }
                outcome
            }
        }
    }
}

/// Cloneable access to a reactor from inside its tasks.
#[derive(Clone)]
pub struct Handle {
    core: Rc<Core>,
}

impl Handle {
    /// Read up to `buf.len()` bytes from `fd` at `offset`. Nothing is
    /// submitted until the returned `Op` is awaited, which yields the byte
    /// count and the buffer.
    #[track_caller]
    pub fn read<F>(&self, fd: &F, mut buf: Vec<u8>, offset: u64) -> Op<Vec<u8>>
    where
        F: AsRawFd + ?Sized,
    {
        let location = Location::caller();
        // The heap block does not move with the Vec.
        let request = raw_fd(fd, location).map(|fd| Operation::Read {
            fd,
            buf: buf.as_mut_ptr(),
            len: clamp_len(buf.len()),
            offset,
        });
        Op::new(Rc::clone(&self.core), request, Opcode::Read, location, buf)
    }

    /// Write `buf` to `fd` at `offset`.
    #[track_caller]
    pub fn write<F>(&self, fd: &F, buf: Vec<u8>, offset: u64) -> Op<Vec<u8>>
    where
        F: AsRawFd + ?Sized,
    {
        let location = Location::caller();
        let request = raw_fd(fd, location).map(|fd| Operation::Write {
            fd,
            buf: buf.as_ptr(),
            len: clamp_len(buf.len()),
            offset,
        });
        Op::new(Rc::clone(&self.core), request, Opcode::Write, location, buf)
    }

    /// A round trip through the ring that does no I/O.
    #[track_caller]
    pub fn nop(&self) -> Op<()> {
        Op::new(Rc::clone(&self.core), Ok(Operation::Nop), Opcode::Nop, Location::caller(), ())
    }

    /// Register a top-level task. It first runs when its bootstrap NOP
    /// completes.
    pub fn spawn<T: 'static>(&self, task: Task<T>) -> Result<Token> {
        self.core.spawn(task)
    }
}

fn raw_fd<F: AsRawFd + ?Sized>(fd: &F, location: &'static Location<'static>) -> Result<i32> {
    match fd.as_raw_fd() {
        raw if raw < 0 => Err(Error::EmptyHandle { location }),
        raw => Ok(raw),
    }
}

/// The ring's length field is 32 bits. Longer buffers see a short transfer.
#[inline]
fn clamp_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Single-threaded completion reactor.
///
/// Drive it with [`Reactor::execute`] (one completion per call) or
/// [`Reactor::run`] (until nothing is outstanding).
pub struct Reactor {
    handle: Handle,
}

impl Reactor {
    /// Kernel io_uring with `capacity` submission entries.
    #[cfg(target_os = "linux")]
    pub fn new(capacity: u32, flags: ringside_module::SetupFlags) -> Result<Self> {
        let ring = ringside_module::BasicIoUring::new(capacity, flags)?;
        Ok(Self::with_ring(Box::new(ring)))
    }

    #[cfg(target_os = "linux")]
    pub fn from_config(config: &ringside_module::RingConfig) -> Result<Self> {
        let ring = ringside_module::BasicIoUring::with_config(config)?;
        Ok(Self::with_ring(Box::new(ring)))
    }

    /// Kernel io_uring configured from `RINGSIDE_*` variables.
    #[cfg(target_os = "linux")]
    pub fn from_env() -> Result<Self> {
        Self::from_config(&ringside_module::RingConfig::from_env())
    }

    /// Drive any `Ring` implementation.
    pub fn with_ring(ring: Box<dyn Ring>) -> Self {
        let core = Core {
            ring: RefCell::new(ring),
            frames: RefCell::new(FrameArena::new()),
            outstanding: Cell::new(0),
            deferred: Cell::new(None),
        };
        Self { handle: Handle { core: Rc::new(core) } }
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    #[track_caller]
    pub fn read<F>(&self, fd: &F, buf: Vec<u8>, offset: u64) -> Op<Vec<u8>>
    where
        F: AsRawFd + ?Sized,
    {
        self.handle.read(fd, buf, offset)
    }

    #[track_caller]
    pub fn write<F>(&self, fd: &F, buf: Vec<u8>, offset: u64) -> Op<Vec<u8>>
    where
        F: AsRawFd + ?Sized,
    {
        self.handle.write(fd, buf, offset)
    }

    #[track_caller]
    pub fn nop(&self) -> Op<()> {
        self.handle.nop()
    }

    /// Register a top-level task and submit its bootstrap NOP.
    ///
    /// Returns the bootstrap token. Fails with `QueueFull` when no
    /// submission slot is free; the task is dropped in that case. A failed
    /// submit after a successful push is reported by the next `execute()`.
    pub fn spawn<T: 'static>(&self, task: Task<T>) -> Result<Token> {
        self.handle.core.spawn(task)
    }

    /// Block for one completion and resume the frame it belongs to.
    ///
    /// - a submit that failed since the last call: that `Error::Submit`,
    ///   returned before waiting; the entry is still queued and goes out
    ///   with the next call
    /// - a negative status resumes the frame with the error and returns
    ///   the same `Error::Operation`
    /// - a token no frame is armed with resumes nothing: `StaleToken`
    /// - a top-level task finishing with `Err(e)` returns `e`
    /// - nothing outstanding: `Idle`, instead of blocking forever
    ///
    /// The outstanding count drops by one for every completion consumed,
    /// whatever its outcome.
    pub fn execute(&self) -> Result<()> {
        let core = &self.handle.core;
        if let Some(e) = core.deferred.take() {
            return Err(e);
        }
        if core.outstanding.get() == 0 {
            return Err(Error::Idle);
        }

        let completion = core.ring.borrow_mut().wait()?;
        core.outstanding.set(core.outstanding.get() - 1);
        let (token, result) = (completion.token, completion.result);

        let Some(armed) = core.frames.borrow_mut().resolve(token, result) else {
            tracing::warn!(%token, result, "completion for unknown token");
            return Err(Error::StaleToken(token));
        };
        tracing::trace!(%token, op = %armed.opcode, result, "completion");

        let failure = try_call_neg(|| result).err().map(|errno| Error::Operation {
            op: armed.opcode,
            errno,
            location: armed.location,
        });
        let outcome = core.resume(token.slot());

        match failure {
            Some(e) => {
                tracing::debug!(%token, error = %e, "operation failed");
                Err(e)
            }
            None => outcome,
        }
    }

    /// Call `execute` until nothing is outstanding.
    ///
    /// Returns the number of completions processed, or the first error.
    pub fn run(&self) -> Result<usize> {
        let mut steps = 0;
        while self.outstanding() > 0 {
            self.execute()?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Submissions queued in the ring but not yet picked up.
    pub fn sq_count(&self) -> usize {
        self.handle.core.ring.borrow().sq_pending()
    }

    /// Completions posted but not yet consumed.
    pub fn cq_count(&self) -> usize {
        self.handle.core.ring.borrow().cq_ready()
    }

    /// Operations handed to the ring and not yet completed.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.handle.core.outstanding.get()
    }

    /// Tasks spawned and not yet finished.
    pub fn live_tasks(&self) -> usize {
        self.handle.core.frames.borrow().live()
    }

    pub fn capacity(&self) -> usize {
        self.handle.core.ring.borrow().capacity()
    }
}

impl Drop for Reactor {
    /// Wait out every completion still in flight, without resuming anyone,
    /// so no buffer is freed under the ring. Then drop the tasks.
    ///
    /// On the kernel ring this blocks until every in-flight operation
    /// completes. A read pending on a pipe or socket that never becomes
    /// readable blocks the drop forever. If the ring's `wait()` fails
    /// instead, buffers still in flight are leaked, not freed.
    fn drop(&mut self) {
        let core = &self.handle.core;
        while core.outstanding.get() > 0 {
            let Ok(mut ring) = core.ring.try_borrow_mut() else { break };
            match ring.wait() {
                Ok(c) => {
                    core.outstanding.set(core.outstanding.get() - 1);
                    drop(ring);
                    if let Ok(mut frames) = core.frames.try_borrow_mut() {
                        frames.resolve(c.token, c.result);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        outstanding = core.outstanding.get(),
                        error = %e,
                        "reactor dropped with operations in flight"
                    );
                    break;
                }
            }
        }

        // Tasks hold handles back to the core; dropping them breaks the cycle.
        let frames = match core.frames.try_borrow_mut() {
            Ok(mut frames) => {
                if core.outstanding.get() > 0 {
                    let leaked = frames.leak_in_flight();
                    tracing::warn!(leaked, "leaking buffers still owned by the ring");
                }
                std::mem::take(&mut *frames)
            }
            Err(_) => return,
        };
        drop(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use ringside_core::Errno;
    use ringside_module::{ScriptMode, ScriptedRing};

    fn scripted(capacity: usize) -> Reactor {
        Reactor::with_ring(Box::new(ScriptedRing::new(capacity)))
    }

    #[test]
    fn test_idle_reactor_does_not_block() {
        let reactor = scripted(4);
        assert_eq!(reactor.execute(), Err(Error::Idle));
        assert_eq!(reactor.run(), Ok(0));
    }

    #[test]
    fn test_spawn_bootstraps_with_one_nop() {
        let reactor = scripted(4);
        reactor.spawn(Task::new(async { Ok(()) })).unwrap();
        assert_eq!(reactor.outstanding(), 1);
        assert_eq!(reactor.live_tasks(), 1);
        assert_eq!(reactor.sq_count(), 0);

        reactor.execute().unwrap();
        assert_eq!(reactor.outstanding(), 0);
        assert_eq!(reactor.live_tasks(), 0);
    }

    #[test]
    fn test_op_outside_task_is_rejected() {
        let reactor = scripted(4);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut op = reactor.nop();
        let polled = std::pin::Pin::new(&mut op).poll(&mut cx);
        assert!(matches!(polled, Poll::Ready(Err(Error::NoCurrentTask { .. }))));
        assert_eq!(reactor.outstanding(), 0);
    }

    #[test]
    fn test_task_error_surfaces_from_execute() {
        let reactor = scripted(4);
        reactor
            .spawn(Task::new(async { Err::<(), _>(Error::Os(Errno::EINVAL)) }))
            .unwrap();
        assert_eq!(reactor.execute(), Err(Error::Os(Errno::EINVAL)));
        assert_eq!(reactor.live_tasks(), 0);
    }

    #[test]
    fn test_drop_with_manual_ring_in_flight() {
        let ring = ScriptedRing::with_mode(4, ScriptMode::Manual);
        let reactor = Reactor::with_ring(Box::new(ring));
        let h = reactor.handle();
        reactor
            .spawn(Task::new(async move {
                h.nop().await?;
                Ok(())
            }))
            .unwrap();
        // Nothing ever completes; dropping must not hang or leak the cycle.
        drop(reactor);
    }

    #[test]
    fn test_submit_failure_is_deferred_to_execute() {
        let ring = ScriptedRing::new(4);
        let ctl = ring.controller();
        let reactor = Reactor::with_ring(Box::new(ring));
        ctl.fail_next_submit(Errno::EBUSY);

        let token = reactor.spawn(Task::new(async { Ok(()) })).unwrap();
        assert_eq!(ctl.queued_tokens(), vec![token]);
        assert_eq!(reactor.outstanding(), 1);
        assert_eq!(reactor.execute(), Err(Error::Submit { errno: Errno::EBUSY }));
        assert_eq!(reactor.live_tasks(), 1);

        reactor.execute().unwrap();
        assert_eq!(reactor.live_tasks(), 0);
        assert_eq!(reactor.execute(), Err(Error::Idle));
    }
}

//! `ScriptedRing` - userspace `Ring` with scriptable completion order.
//!
//! Three queues stand in for the kernel's:
//!
//! ```text
//!  push()          submit()            wait()
//!  ──────► queued ─────────► inflight ───────► ready ──► Completion
//!                             │      ▲
//!              ScriptedControl└──────┘ complete() / perform()
//! ```
//!
//! A `wait()` with nothing ready or in flight first submits whatever is
//! still queued, like `io_uring_enter` with a wait count does. In
//! `ScriptMode::Auto` a `wait()` with nothing ready then performs the
//! oldest in-flight operation with pread/pwrite and posts its result. In
//! `ScriptMode::Manual` completions only appear when the test posts them
//! through a `ScriptedControl`, in whatever order it likes. A `wait()` that
//! would block forever fails with `EAGAIN` instead.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ringside_core::entry::{Completion, Operation, Submission, Token};
use ringside_core::error::{Error, Result};
use ringside_core::ring::Ring;
use ringside_core::syscall::try_call;
use ringside_core::Errno;

/// Who posts completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptMode {
    /// `wait()` performs in-flight operations in submission order.
    #[default]
    Auto,
    /// Completions are posted by a `ScriptedControl`.
    Manual,
}

#[derive(Debug)]
struct ScriptState {
    capacity: usize,
    mode: ScriptMode,
    queued: VecDeque<Submission>,
    inflight: Vec<Submission>,
    ready: VecDeque<Completion>,
    fail_submit: Option<Errno>,
    submitted: u64,
}

impl ScriptState {
    fn take_inflight(&mut self, token: Token) -> Option<Submission> {
        let pos = self.inflight.iter().position(|s| s.token == token)?;
        Some(self.inflight.remove(pos))
    }

    fn submit_queued(&mut self) -> Result<usize> {
        if let Some(errno) = self.fail_submit.take() {
            return Err(Error::Submit { errno });
        }
        let n = self.queued.len();
        let batch: Vec<Submission> = self.queued.drain(..).collect();
        self.inflight.extend(batch);
        self.submitted += n as u64;
        Ok(n)
    }
}

/// Run one operation to completion on the calling thread.
///
/// Returns the byte count, or the negated errno, in CQE convention.
fn perform(op: &Operation) -> i32 {
    let ret = match *op {
        Operation::Nop => Ok(0),
        // Safety: the submitter guarantees `buf` is valid for `len` bytes
        // until the completion is consumed.
        Operation::Read { fd, buf, len, offset } => try_call(|| unsafe {
            libc::pread(fd, buf.cast(), len as usize, offset as libc::off_t)
        }),
        Operation::Write { fd, buf, len, offset } => try_call(|| unsafe {
            libc::pwrite(fd, buf.cast(), len as usize, offset as libc::off_t)
        }),
    };
    match ret {
        Ok(n) => i32::try_from(n).unwrap_or(i32::MAX),
        Err(errno) => -(errno as i32),
    }
}

/// Deterministic userspace ring.
pub struct ScriptedRing {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedRing {
    pub fn new(capacity: usize) -> Self {
        Self::with_mode(capacity, ScriptMode::Auto)
    }

    pub fn with_mode(capacity: usize, mode: ScriptMode) -> Self {
        let state = ScriptState {
            capacity,
            mode,
            queued: VecDeque::with_capacity(capacity),
            inflight: Vec::with_capacity(capacity),
            ready: VecDeque::new(),
            fail_submit: None,
            submitted: 0,
        };
        Self { state: Rc::new(RefCell::new(state)) }
    }

    /// A handle for steering this ring after it has been moved into a reactor.
    pub fn controller(&self) -> ScriptedControl {
        ScriptedControl { state: Rc::clone(&self.state) }
    }
}

impl Ring for ScriptedRing {
    fn push(&mut self, submission: Submission) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.queued.len() >= st.capacity {
            return Err(Error::QueueFull { capacity: st.capacity });
        }
        tracing::trace!(token = %submission.token, op = %submission.op.opcode(), "scripted sqe queued");
        st.queued.push_back(submission);
        Ok(())
    }

    fn submit(&mut self) -> Result<usize> {
        self.state.borrow_mut().submit_queued()
    }

    fn wait(&mut self) -> Result<Completion> {
        let mut st = self.state.borrow_mut();
        if let Some(c) = st.ready.pop_front() {
            return Ok(c);
        }
        if st.inflight.is_empty() && !st.queued.is_empty() {
            st.submit_queued().map_err(|e| Error::Wait { errno: e.errno().unwrap_or(Errno::EIO) })?;
        }
        if st.mode == ScriptMode::Auto && !st.inflight.is_empty() {
            let sub = st.inflight.remove(0);
            return Ok(Completion { token: sub.token, result: perform(&sub.op) });
        }
        Err(Error::Wait { errno: Errno::EAGAIN })
    }

    fn sq_pending(&self) -> usize {
        self.state.borrow().queued.len()
    }

    fn cq_ready(&self) -> usize {
        self.state.borrow().ready.len()
    }

    fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }
}

/// Test-side handle onto a `ScriptedRing`.
#[derive(Clone)]
pub struct ScriptedControl {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedControl {
    pub fn set_mode(&self, mode: ScriptMode) {
        self.state.borrow_mut().mode = mode;
    }

    /// Tokens submitted but not yet completed, oldest first.
    pub fn inflight_tokens(&self) -> Vec<Token> {
        self.state.borrow().inflight.iter().map(|s| s.token).collect()
    }

    /// Tokens pushed but not yet submitted.
    pub fn queued_tokens(&self) -> Vec<Token> {
        self.state.borrow().queued.iter().map(|s| s.token).collect()
    }

    /// Total entries ever handed over by `submit()`.
    pub fn submitted(&self) -> u64 {
        self.state.borrow().submitted
    }

    /// Post `result` for the in-flight `token` without touching its buffers.
    ///
    /// Returns `false` if `token` is not in flight.
    pub fn complete(&self, token: Token, result: i32) -> bool {
        let mut st = self.state.borrow_mut();
        match st.take_inflight(token) {
            Some(_) => {
                st.ready.push_back(Completion { token, result });
                true
            }
            None => false,
        }
    }

    /// Perform the in-flight `token` now and post its real result.
    pub fn perform(&self, token: Token) -> bool {
        let mut st = self.state.borrow_mut();
        match st.take_inflight(token) {
            Some(sub) => {
                let result = perform(&sub.op);
                st.ready.push_back(Completion { token, result });
                true
            }
            None => false,
        }
    }

    /// Post an arbitrary completion, in flight or not.
    pub fn inject(&self, completion: Completion) {
        self.state.borrow_mut().ready.push_back(completion);
    }

    /// Make the next `submit()` fail with `errno`. Queued entries stay queued.
    pub fn fail_next_submit(&self, errno: Errno) {
        self.state.borrow_mut().fail_submit = Some(errno);
    }
}

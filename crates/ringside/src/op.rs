//! `Op` - an awaitable ring operation.
//!
//! Building an `Op` does not touch the ring. The first poll arms the current
//! frame, pushes the submission tagged with the fresh token and submits it,
//! then suspends unconditionally. The task is polled again only when the
//! matching completion arrives, and the `Op` then yields the byte count or
//! the operation error.
//!
//! Reads and writes own their buffer. On submission the buffer moves into
//! the frame and stays there until the ring reports the operation, even if
//! the `Op` (or the whole task) is dropped first. A successful completion
//! hands it back alongside the byte count.

use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use ringside_core::entry::{Opcode, Operation, Token};
use ringside_core::error::{Error, Result};
use ringside_core::syscall::try_call_neg;

use crate::context;
use crate::reactor::Core;

mod sealed {
    pub trait Sealed {}
    impl Sealed for () {}
    impl Sealed for Vec<u8> {}
}

/// Buffer an `Op` carries through the ring.
///
/// `()` for operations without data; `Vec<u8>` for reads and writes, which
/// yield `(bytes, buffer)`.
pub trait IoBuf: sealed::Sealed + 'static {
    type Output;

    #[doc(hidden)]
    fn park(self) -> Option<Vec<u8>>;

    #[doc(hidden)]
    fn finish(n: usize, parked: Option<Vec<u8>>) -> Self::Output;
}

impl IoBuf for () {
    type Output = usize;

    fn park(self) -> Option<Vec<u8>> {
        None
    }

    fn finish(n: usize, _parked: Option<Vec<u8>>) -> usize {
        n
    }
}

impl IoBuf for Vec<u8> {
    type Output = (usize, Vec<u8>);

    fn park(self) -> Option<Vec<u8>> {
        Some(self)
    }

    fn finish(n: usize, parked: Option<Vec<u8>>) -> (usize, Vec<u8>) {
        (n, parked.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpState {
    Unsubmitted,
    Submitted(Token),
    Done,
}

/// A deferred read, write or nop.
#[must_use = "operations do nothing unless awaited"]
pub struct Op<B: IoBuf> {
    core: Rc<Core>,
    /// `Err` when built on an empty handle; reported on first poll.
    request: Result<Operation>,
    opcode: Opcode,
    state: OpState,
    location: &'static Location<'static>,
    /// Held until submission, then parked in the frame.
    buffer: Option<B>,
}

impl<B: IoBuf> Op<B> {
    pub(crate) fn new(
        core: Rc<Core>,
        request: Result<Operation>,
        opcode: Opcode,
        location: &'static Location<'static>,
        buffer: B,
    ) -> Self {
        Self {
            core,
            request,
            opcode,
            state: OpState::Unsubmitted,
            location,
            buffer: Some(buffer),
        }
    }

    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Where the operation was built.
    #[inline]
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// The token attached at submission, until the operation resolves.
    pub fn token(&self) -> Option<Token> {
        match self.state {
            OpState::Submitted(token) => Some(token),
            _ => None,
        }
    }

    fn submit(&mut self) -> Result<Token> {
        let op = self.request.clone()?;
        let slot = context::current_frame().ok_or(Error::NoCurrentTask { location: self.location })?;
        let parked = self.buffer.take().and_then(IoBuf::park);
        self.core.submit(slot, op, self.location, parked)
    }
}

impl<B: IoBuf> Unpin for Op<B> {}

impl<B: IoBuf> Future for Op<B> {
    type Output = Result<B::Output>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.state {
            OpState::Unsubmitted => match this.submit() {
                Ok(token) => {
                    this.state = OpState::Submitted(token);
                    Poll::Pending
                }
                Err(e) => {
                    this.state = OpState::Done;
                    Poll::Ready(Err(e))
                }
            },
            OpState::Submitted(token) => {
                let Some((result, parked)) = this.core.take_status(token) else {
                    return Poll::Pending;
                };
                this.state = OpState::Done;
                let (op, location) = (this.opcode, this.location);
                Poll::Ready(match try_call_neg(|| result) {
                    Ok(n) => Ok(B::finish(n as usize, parked)),
                    Err(errno) => Err(Error::Operation { op, errno, location }),
                })
            }
            OpState::Done => Poll::Ready(Err(Error::TaskCompleted { location: this.location })),
        }
    }
}

impl<B: IoBuf> Drop for Op<B> {
    fn drop(&mut self) {
        if let OpState::Submitted(token) = self.state {
            if self.core.in_flight(token) {
                // The frame keeps the buffer; the frame stays busy until the
                // ring reports this token.
                tracing::debug!(%token, op = %self.opcode, at = %self.location, "operation dropped while in flight");
            }
        }
    }
}

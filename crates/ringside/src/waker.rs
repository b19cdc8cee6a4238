//! Waker for frames that are resumed only by completions.
//!
//! The reactor never keeps a ready queue: a frame runs again exactly when
//! the ring reports the completion it was armed for. Wakeups carry no
//! information, so the waker does nothing.

use std::task::{RawWaker, RawWakerVTable, Waker};

fn clone_raw(_: *const ()) -> RawWaker {
    RawWaker::new(std::ptr::null(), &VTABLE)
}

fn noop(_: *const ()) {}

const VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, noop, noop, noop);

pub(crate) fn noop_waker() -> Waker {
    // Safety: every vtable entry ignores the data pointer.
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}

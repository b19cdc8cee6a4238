//! Current-frame context.
//!
//! While the reactor polls a frame, the frame's slot is published in a
//! thread-local so that an `Op` awaited anywhere inside the task (even in a
//! nested `Task`) knows which frame to arm. The previous value is restored
//! when polling returns, including on unwind.

use std::cell::Cell;

thread_local! {
    static CURRENT_FRAME: Cell<Option<u32>> = const { Cell::new(None) };
}

struct Restore(Option<u32>);

impl Drop for Restore {
    fn drop(&mut self) {
        CURRENT_FRAME.with(|c| c.set(self.0));
    }
}

/// Run `f` with `slot` as the current frame.
pub(crate) fn enter<F, R>(slot: u32, f: F) -> R
where
    F: FnOnce() -> R,
{
    let previous = CURRENT_FRAME.with(|c| c.replace(Some(slot)));
    let _restore = Restore(previous);
    f()
}

/// The frame being polled on this thread, if any.
#[inline]
pub(crate) fn current_frame() -> Option<u32> {
    CURRENT_FRAME.with(Cell::get)
}

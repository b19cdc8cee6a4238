//! `Task<T>` - a lazily started asynchronous computation.
//!
//! A task does nothing until it is first polled, either by the reactor
//! (after `spawn`) or by a parent task awaiting it. Awaiting a child runs the
//! child in place, inside the parent's frame: the child's operations arm that
//! frame, and when the child finishes the parent continues from its await
//! point in the same `execute()` call. The reactor never sees the nesting.
//!
//! ```text
//!  SuspendedInitial ──► Running ──► SuspendedAwaiting
//!                          ▲  │            │
//!                          │  └──► Completed
//!                          └───────────────┘
//! ```

use core::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::task::{Context, Poll};

use ringside_core::error::{Error, Result};

use crate::context;

/// Lifecycle position of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Built, never polled.
    SuspendedInitial,
    /// Being polled right now.
    Running,
    /// Parked on an awaited operation.
    SuspendedAwaiting,
    /// Produced its result. Polling again is an error.
    Completed,
}

/// Who resumes when a task completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precursor {
    /// Not yet started.
    Unset,
    /// Spawned: completion returns to the reactor's `execute()`.
    Reactor,
    /// Awaited by a parent running in this frame slot.
    Frame(u32),
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>>>>;

/// An asynchronous computation producing `Result<T>`.
#[must_use = "tasks do nothing unless spawned or awaited"]
pub struct Task<T> {
    /// `None` once completed.
    future: Option<BoxFuture<T>>,
    state: TaskState,
    precursor: Precursor,
    location: &'static Location<'static>,
}

impl<T> Task<T> {
    /// Wrap `future`. Nothing runs until the task is spawned or awaited.
    #[track_caller]
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self {
            future: Some(Box::pin(future)),
            state: TaskState::SuspendedInitial,
            precursor: Precursor::Unset,
            location: Location::caller(),
        }
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    #[inline]
    pub fn precursor(&self) -> Precursor {
        self.precursor
    }

    /// Where the task was created.
    #[inline]
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    /// Record the precursor. Only the first call has an effect.
    pub(crate) fn set_precursor(&mut self, precursor: Precursor) {
        if self.precursor == Precursor::Unset {
            self.precursor = precursor;
        }
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(future) = this.future.as_mut() else {
            return Poll::Ready(Err(Error::TaskCompleted { location: this.location }));
        };

        if this.precursor == Precursor::Unset {
            if let Some(slot) = context::current_frame() {
                this.precursor = Precursor::Frame(slot);
            }
        }

        this.state = TaskState::Running;
        match future.as_mut().poll(cx) {
            Poll::Ready(out) => {
                this.state = TaskState::Completed;
                this.future = None;
                if let Err(e) = &out {
                    tracing::debug!(created = %this.location, error = %e, "task failed");
                }
                Poll::Ready(out)
            }
            Poll::Pending => {
                this.state = TaskState::SuspendedAwaiting;
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state)
            .field("precursor", &self.precursor)
            .field("location", &format_args!("{}", self.location))
            .finish()
    }
}

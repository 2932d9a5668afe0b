//! Resumable execution frames.
//!
//! A [`Continuation`] owns one task body as a boxed future and steps it by
//! hand: [`Continuation::start`] runs the body eagerly up to its first
//! suspension, [`Continuation::resume`] runs the next slice. There is no waker
//! plumbing; the frame is polled with a no-op waker and the queue decides
//! when to resume it by looking at the wait target registered during the
//! slice.
//!
//! Registration goes through a thread-local slot that is only live while a
//! slice is being polled. [`SuspendGate`](crate::SuspendGate) writes its
//! target there; the continuation reads it back once the poll returns.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;

use crate::counter::Counter;
use crate::error::{Result, TaskError, TaskFault};

/// Converts what a task body returns into success or a fault.
pub trait IntoOutcome: 'static {
    fn into_outcome(self) -> std::result::Result<(), TaskFault>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> std::result::Result<(), TaskFault> {
        Ok(())
    }
}

impl<E: fmt::Display + 'static> IntoOutcome for std::result::Result<(), E> {
    fn into_outcome(self) -> std::result::Result<(), TaskFault> {
        self.map_err(|err| TaskFault::Failed(err.to_string()))
    }
}

pub(crate) type Frame = BoxFuture<'static, std::result::Result<(), TaskFault>>;

/// Type-erased start function: builds the frame on first run.
pub(crate) type StartFn = Box<dyn FnOnce() -> Frame + Send + 'static>;

pub(crate) fn start_fn<F, Fut, O>(start: F) -> StartFn
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: IntoOutcome,
{
    Box::new(move || start().map(IntoOutcome::into_outcome).boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FrameState {
    /// Default-constructed, taken, or released.
    #[default]
    Invalid,
    Suspended,
    Done,
}

/// Paused or finished state of one task body.
#[derive(Default)]
pub struct Continuation {
    frame: Option<Frame>,
    state: FrameState,
    wait_target: Option<Counter>,
    fault: Option<TaskFault>,
}

impl Continuation {
    /// Invokes `start` and runs the resulting body until its first suspension
    /// or completion. Execution begins immediately.
    ///
    /// A panic in `start` or in the first slice finishes the continuation
    /// with a [`TaskFault::Panicked`].
    pub fn start<F, Fut, O>(start: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: IntoOutcome,
    {
        Self::launch(start_fn(start))
    }

    pub(crate) fn launch(start: StartFn) -> Self {
        let mut continuation = Self::default();
        match panic::catch_unwind(AssertUnwindSafe(start)) {
            Ok(frame) => {
                continuation.frame = Some(frame);
                continuation.state = FrameState::Suspended;
                continuation.step();
            }
            Err(payload) => continuation.finish(Some(TaskFault::from_panic(payload))),
        }
        continuation
    }

    /// Runs the next slice from the last suspension point.
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            FrameState::Invalid => Err(TaskError::InvalidContinuation),
            FrameState::Done => Err(TaskError::AlreadyComplete),
            FrameState::Suspended => {
                self.step();
                Ok(())
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state != FrameState::Invalid
    }

    /// True once the body ran to completion (or faulted).
    ///
    /// # Panics
    ///
    /// Panics if the continuation is not valid.
    pub fn is_done(&self) -> bool {
        self.assert_valid("is_done");
        self.state == FrameState::Done
    }

    /// True while suspended on a wait target whose value is still nonzero.
    ///
    /// Re-evaluated on every call: once the target reaches zero the
    /// continuation is no longer parked, even though it has not resumed.
    ///
    /// # Panics
    ///
    /// Panics if the continuation is not valid.
    pub fn is_parked(&self) -> bool {
        self.assert_valid("is_parked");
        self.state == FrameState::Suspended
            && self.wait_target.as_ref().is_some_and(|target| !target.is_zero())
    }

    /// Counter registered by the last slice, if it suspended on one.
    pub fn wait_target(&self) -> Option<&Counter> {
        self.wait_target.as_ref()
    }

    /// Fault captured when the body finished, if any.
    pub fn fault(&self) -> Option<&TaskFault> {
        self.fault.as_ref()
    }

    pub(crate) fn take_fault(&mut self) -> Option<TaskFault> {
        self.fault.take()
    }

    /// Drops the frame and invalidates the continuation. Idempotent.
    pub fn release(&mut self) {
        if self.state == FrameState::Suspended {
            tracing::trace!("releasing unfinished continuation");
        }
        self.frame = None;
        self.wait_target = None;
        self.fault = None;
        self.state = FrameState::Invalid;
    }

    fn step(&mut self) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };

        let slice = SliceScope::enter();
        let mut cx = Context::from_waker(noop_waker_ref());
        let polled = panic::catch_unwind(AssertUnwindSafe(|| frame.as_mut().poll(&mut cx)));
        self.wait_target = slice.take_target();
        drop(slice);

        match polled {
            Ok(Poll::Pending) => {}
            Ok(Poll::Ready(outcome)) => self.finish(outcome.err()),
            Err(payload) => self.finish(Some(TaskFault::from_panic(payload))),
        }
    }

    fn finish(&mut self, fault: Option<TaskFault>) {
        self.frame = None;
        self.wait_target = None;
        self.fault = fault;
        self.state = FrameState::Done;
    }

    fn assert_valid(&self, operation: &str) {
        if self.state == FrameState::Invalid {
            panic!("{operation} called on an invalid continuation");
        }
    }
}

impl Drop for Continuation {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("state", &self.state)
            .field("wait_target", &self.wait_target)
            .field("fault", &self.fault)
            .finish()
    }
}

#[derive(Default)]
struct Registration {
    target: Option<Counter>,
}

thread_local! {
    static ACTIVE_SLICE: RefCell<Option<Registration>> = const { RefCell::new(None) };
}

/// Marks the current thread as polling a slice. Restores the enclosing
/// slice (if a body steps a nested continuation inline) on drop.
struct SliceScope {
    previous: Option<Registration>,
}

impl SliceScope {
    fn enter() -> Self {
        let previous = ACTIVE_SLICE.with(|slot| slot.replace(Some(Registration::default())));
        Self { previous }
    }

    fn take_target(&self) -> Option<Counter> {
        ACTIVE_SLICE.with(|slot| {
            slot.borrow_mut()
                .as_mut()
                .and_then(|registration| registration.target.take())
        })
    }
}

impl Drop for SliceScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_SLICE.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Records `target` as the wait target of the slice being polled on this
/// thread. Returns `false` when no slice is active.
pub(crate) fn register_wait_target(target: Counter) -> bool {
    ACTIVE_SLICE.with(|slot| match slot.borrow_mut().as_mut() {
        Some(registration) => {
            registration.target = Some(target);
            true
        }
        None => false,
    })
}

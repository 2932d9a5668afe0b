//! The suspension primitive used inside task bodies.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::continuation::register_wait_target;
use crate::counter::Counter;

/// Suspends the current task until `target` reaches zero.
///
/// Awaiting a gate always suspends, even when the target is already zero.
/// On suspension the target is registered with the running continuation so
/// the queue can park the task against it; the queue resumes the task once
/// the target reaches zero, and the await completes with `()`.
///
/// # Panics
///
/// Polling a gate outside of a task slice (for example from another
/// executor) panics.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use core_tasks::{suspend_until, TaskQueue};
///
/// let queue = Arc::new(TaskQueue::new());
/// let inner = queue.clone();
/// let done = queue.submit(move || async move {
///     let children = inner.submit_many((0..4).map(|_| || async {}));
///     suspend_until(&children).await;
/// });
///
/// queue.run_pending();
/// assert!(done.is_zero());
/// ```
#[must_use = "a SuspendGate does nothing unless awaited"]
#[derive(Debug)]
pub struct SuspendGate {
    target: Counter,
    registered: bool,
}

impl SuspendGate {
    pub fn new(target: Counter) -> Self {
        Self {
            target,
            registered: false,
        }
    }

    pub fn target(&self) -> &Counter {
        &self.target
    }
}

impl Future for SuspendGate {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.registered {
            return Poll::Ready(());
        }

        if !register_wait_target(self.target.clone()) {
            panic!("SuspendGate awaited outside of a task slice");
        }
        self.registered = true;
        Poll::Pending
    }
}

/// Shorthand for `SuspendGate::new(target.clone())`.
pub fn suspend_until(target: &Counter) -> SuspendGate {
    SuspendGate::new(target.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::Continuation;

    #[test]
    fn gate_suspends_even_on_zero_target() {
        let target = Counter::new(0);
        let gate_target = target.clone();
        let mut continuation = Continuation::start(move || async move {
            suspend_until(&gate_target).await;
        });

        assert!(!continuation.is_done());
        assert!(!continuation.is_parked());

        continuation.resume().unwrap();
        assert!(continuation.is_done());
    }

    #[test]
    fn sequential_gates_register_their_own_targets() {
        let first = Counter::new(1);
        let second = Counter::new(1);
        let (a, b) = (first.clone(), second.clone());
        let mut continuation = Continuation::start(move || async move {
            suspend_until(&a).await;
            suspend_until(&b).await;
        });

        assert_eq!(continuation.wait_target(), Some(&first));
        first.decrement_and_check();
        continuation.resume().unwrap();

        assert_eq!(continuation.wait_target(), Some(&second));
        assert!(continuation.is_parked());
    }

    #[test]
    #[should_panic(expected = "SuspendGate awaited outside of a task slice")]
    fn gate_outside_slice_panics() {
        futures::executor::block_on(SuspendGate::new(Counter::new(1)));
    }
}

//! Shared countdown counter with wake-on-zero broadcast.
//!
//! A [`Counter`] is created per submitted batch, sized to the batch. Every
//! member task decrements it once when it retires. The decrement that drives
//! it from 1 to 0 wakes every OS thread blocked in [`Counter::wait`] and lets
//! the queue re-admit tasks parked on it.
//!
//! The value lives in an atomic; blocking waiters use a separate
//! `Mutex<()>` + `Condvar` pair so they never touch the scheduler lock.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, TaskError, TaskFault};

struct CounterInner {
    value: AtomicUsize,
    /// Signalled once, on the transition to zero.
    zero: (Mutex<()>, Condvar),
    faults: Mutex<Vec<TaskFault>>,
}

/// Shared handle to a batch countdown.
///
/// Cloning yields another handle to the same counter; equality compares
/// identity, not value. The value never increases.
#[derive(Clone)]
pub struct Counter {
    inner: Arc<CounterInner>,
}

impl Counter {
    /// Creates a counter starting at `initial` (the batch size).
    pub fn new(initial: usize) -> Self {
        Self {
            inner: Arc::new(CounterInner {
                value: AtomicUsize::new(initial),
                zero: (Mutex::new(()), Condvar::new()),
                faults: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn value(&self) -> usize {
        self.inner.value.load(Ordering::Acquire)
    }

    pub fn is_zero(&self) -> bool {
        self.value() == 0
    }

    /// Returns true if both handles refer to the same counter.
    pub fn ptr_eq(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Atomically decrements by one.
    ///
    /// Returns `true` only for the call that takes the value from 1 to 0; that
    /// call also wakes every blocked waiter. A decrement on a counter already
    /// at zero is refused and returns `false`.
    pub fn decrement_and_check(&self) -> bool {
        let previous = match self.inner.value.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |value| value.checked_sub(1),
        ) {
            Ok(previous) => previous,
            Err(_) => {
                tracing::error!("refusing to decrement a counter that already reached zero");
                return false;
            }
        };

        if previous != 1 {
            return false;
        }

        let (lock, cvar) = &self.inner.zero;
        let _guard = lock_ignoring_poison(lock);
        cvar.notify_all();
        true
    }

    /// Blocks the calling OS thread until the value differs from `expected`.
    ///
    /// Returns immediately if it already differs, or if it is zero (a zero
    /// counter never changes again). Only the transition to zero wakes
    /// sleepers, so a waiter that sees `expected` sleeps until the batch
    /// finishes. Returns the value observed on release.
    ///
    /// Never call this from inside a task body: it blocks the worker thread.
    /// Await a [`SuspendGate`](crate::SuspendGate) instead.
    pub fn wait(&self, expected: usize) -> usize {
        let (lock, cvar) = &self.inner.zero;
        let mut guard = lock_ignoring_poison(lock);
        loop {
            let current = self.value();
            if current != expected || current == 0 {
                return current;
            }
            guard = cvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks the calling OS thread until the counter reaches zero.
    pub fn wait_for_zero(&self) {
        loop {
            let current = self.value();
            if current == 0 {
                return;
            }
            self.wait(current);
        }
    }

    /// Blocks until zero, then reports whether any member task faulted.
    pub fn join(&self) -> Result<()> {
        self.wait_for_zero();
        let faults = lock_ignoring_poison(&self.inner.faults);
        match faults.first() {
            None => Ok(()),
            Some(first) => Err(TaskError::BatchFaulted {
                failed: faults.len(),
                first: first.clone(),
            }),
        }
    }

    /// Faults recorded by member tasks so far, in retirement order.
    pub fn faults(&self) -> Vec<TaskFault> {
        lock_ignoring_poison(&self.inner.faults).clone()
    }

    pub fn has_faults(&self) -> bool {
        !lock_ignoring_poison(&self.inner.faults).is_empty()
    }

    pub(crate) fn record_fault(&self, fault: TaskFault) {
        lock_ignoring_poison(&self.inner.faults).push(fault);
    }
}

// Neither mutex guards an invariant that a panic could break.
fn lock_ignoring_poison<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PartialEq for Counter {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Counter {}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("value", &self.value())
            .field("faults", &lock_ignoring_poison(&self.inner.faults).len())
            .finish()
    }
}

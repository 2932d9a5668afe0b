//! A unit of work: start function, live continuation, batch counter.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::continuation::{start_fn, Continuation, IntoOutcome, StartFn};
use crate::counter::Counter;
use crate::error::{Result, TaskError, TaskFault};

/// Process-unique task identifier, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Binds a start function, its continuation once started, and the batch
/// counter the task decrements when it retires.
///
/// Not `Clone`: a task owns a unique resumable frame. Dropping a task that
/// has not finished releases its continuation.
pub struct Task {
    id: TaskId,
    start: Option<StartFn>,
    continuation: Continuation,
    counter: Option<Counter>,
}

impl Task {
    /// Creates a task that is not bound to any batch counter.
    pub fn new<F, Fut, O>(start: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: IntoOutcome,
    {
        Self::from_start(start_fn(start), None)
    }

    pub(crate) fn from_start(start: StartFn, counter: Option<Counter>) -> Self {
        Self {
            id: TaskId::next(),
            start: Some(start),
            continuation: Continuation::default(),
            counter,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// True while the task still has a start function or a live continuation.
    pub fn is_valid(&self) -> bool {
        self.start.is_some() || self.continuation.is_valid()
    }

    pub fn is_complete(&self) -> bool {
        self.continuation.is_valid() && self.continuation.is_done()
    }

    pub fn is_parked(&self) -> bool {
        self.continuation.is_valid() && self.continuation.is_parked()
    }

    pub fn wait_target(&self) -> Option<&Counter> {
        self.continuation.wait_target()
    }

    /// Batch counter this task decrements on retirement.
    pub fn counter(&self) -> Option<&Counter> {
        self.counter.as_ref()
    }

    pub fn fault(&self) -> Option<&TaskFault> {
        self.continuation.fault()
    }

    /// Runs the next slice.
    ///
    /// The first call invokes the start function and executes eagerly to the
    /// first suspension; later calls resume the existing continuation.
    pub fn run(&mut self) -> Result<()> {
        if self.continuation.is_valid() {
            if self.continuation.is_done() {
                return Err(TaskError::AlreadyComplete);
            }
            return self.continuation.resume();
        }

        let start = self.start.take().ok_or(TaskError::InvalidTask)?;
        self.continuation = Continuation::launch(start);
        Ok(())
    }

    pub(crate) fn bind_counter(&mut self, counter: Counter) {
        self.counter = Some(counter);
    }

    pub(crate) fn take_counter(&mut self) -> Option<Counter> {
        self.counter.take()
    }

    pub(crate) fn take_fault(&mut self) -> Option<TaskFault> {
        self.continuation.take_fault()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("started", &self.start.is_none())
            .field("continuation", &self.continuation)
            .field("counter", &self.counter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::test_support::suspend_always;
    use crate::gate::suspend_until;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn ids_are_unique() {
        let a = Task::new(|| async {});
        let b = Task::new(|| async {});
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn new_task_is_valid_but_not_started() {
        let task = Task::new(|| async {});
        assert!(task.is_valid());
        assert!(!task.is_complete());
        assert!(!task.is_parked());
        assert!(task.counter().is_none());
    }

    #[test]
    fn first_run_starts_later_runs_resume() {
        let starts = Arc::new(AtomicUsize::new(0));
        let seen = starts.clone();
        let mut task = Task::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            suspend_always(2)
        });

        task.run().unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(!task.is_complete());

        task.run().unwrap();
        task.run().unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(task.is_complete());
    }

    #[test]
    fn run_after_completion_is_an_error() {
        let mut task = Task::new(|| async {});
        task.run().unwrap();
        assert!(task.is_complete());
        assert_eq!(task.run(), Err(TaskError::AlreadyComplete));
    }

    #[test]
    fn parked_follows_wait_target() {
        let target = Counter::new(1);
        let gate_target = target.clone();
        let mut task = Task::new(move || async move {
            suspend_until(&gate_target).await;
        });

        task.run().unwrap();
        assert!(task.is_parked());
        assert_eq!(task.wait_target(), Some(&target));

        target.decrement_and_check();
        assert!(!task.is_parked());
        task.run().unwrap();
        assert!(task.is_complete());
    }

    #[test]
    fn bound_counter_is_kept_until_taken() {
        let counter = Counter::new(1);
        let mut task = Task::new(|| async {});
        task.bind_counter(counter.clone());
        assert_eq!(task.counter(), Some(&counter));
        assert_eq!(task.take_counter(), Some(counter));
        assert!(task.counter().is_none());
    }

    #[test]
    fn fault_is_visible_after_completion() {
        let mut task = Task::new(|| async { Err::<(), _>("bad input") });
        task.run().unwrap();
        assert!(task.is_complete());
        assert_eq!(task.fault(), Some(&TaskFault::Failed("bad input".to_string())));
        assert_eq!(
            task.take_fault(),
            Some(TaskFault::Failed("bad input".to_string()))
        );
        assert!(task.fault().is_none());
    }
}

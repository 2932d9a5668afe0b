//! The task queue: ready sequence, parked set, and the worker loop.
//!
//! Worker threads are created by the caller; each one calls
//! [`TaskQueue::run_worker`] once. A worker pops the head of the ready
//! sequence, runs one slice with the lock released, then classifies the task:
//!
//! - complete: retire it, decrement its batch counter, and if that was the
//!   last member wake everything parked on the counter
//! - suspended on a nonzero target: move it to the parked set
//! - otherwise: push it to the back of the ready sequence
//!
//! The one mutex guards both collections and is never held while user code
//! runs, so task bodies may submit more work.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::{debug, error, info, trace, warn};

use crate::config::QueueConfig;
use crate::continuation::{start_fn, IntoOutcome, StartFn};
use crate::counter::Counter;
use crate::error::{Result, TaskFault};
use crate::sleeping::SleepingTask;
use crate::task::{Task, TaskId};

struct QueueState {
    ready: VecDeque<Task>,
    sleeping: Vec<SleepingTask>,
}

/// Cooperative multitasking queue shared by caller-owned worker threads.
///
/// Usually wrapped in an `Arc` so task bodies can submit follow-up work.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use core_tasks::TaskQueue;
///
/// let queue = Arc::new(TaskQueue::new());
/// let workers: Vec<_> = (0..2)
///     .map(|_| {
///         let queue = queue.clone();
///         thread::spawn(move || queue.run_worker())
///     })
///     .collect();
///
/// let batch = queue.submit_many((0..8).map(|i| move || async move {
///     let _ = i * i;
/// }));
/// batch.join().expect("no task faulted");
///
/// queue.request_abort();
/// for worker in workers {
///     worker.join().unwrap();
/// }
/// ```
pub struct TaskQueue {
    state: Mutex<QueueState>,
    work_available: Condvar,
    abort: AtomicBool,
    config: QueueConfig,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::from_valid_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: QueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState {
                ready: VecDeque::with_capacity(config.ready_capacity),
                sleeping: Vec::with_capacity(config.parked_capacity),
            }),
            work_available: Condvar::new(),
            abort: AtomicBool::new(false),
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Submits a batch sharing one fresh counter sized to the batch.
    ///
    /// The counter reaches zero once every member has completed. Await it
    /// from another task with [`suspend_until`](crate::suspend_until) or
    /// block on it from outside with [`Counter::join`].
    pub fn submit_many<I, F, Fut, O>(&self, tasks: I) -> Counter
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: IntoOutcome,
    {
        let starts: Vec<StartFn> = tasks.into_iter().map(start_fn).collect();
        let counter = Counter::new(starts.len());
        self.enqueue(
            starts
                .into_iter()
                .map(|start| Task::from_start(start, Some(counter.clone()))),
        );
        counter
    }

    /// Fire-and-forget form of [`submit_many`](Self::submit_many).
    pub fn submit_many_detached<I, F, Fut, O>(&self, tasks: I)
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: IntoOutcome,
    {
        self.enqueue(
            tasks
                .into_iter()
                .map(|start| Task::from_start(start_fn(start), None)),
        );
    }

    /// Submits a single task with a counter of one.
    pub fn submit<F, Fut, O>(&self, task: F) -> Counter
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: IntoOutcome,
    {
        self.submit_many(std::iter::once(task))
    }

    pub fn submit_detached<F, Fut, O>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: IntoOutcome,
    {
        self.submit_many_detached(std::iter::once(task));
    }

    /// Submits prebuilt tasks (bodies of different types) as one batch.
    ///
    /// Every task is rebound to the returned counter.
    pub fn submit_tasks(&self, tasks: Vec<Task>) -> Counter {
        let counter = Counter::new(tasks.len());
        self.enqueue(tasks.into_iter().map(|mut task| {
            task.bind_counter(counter.clone());
            task
        }));
        counter
    }

    pub fn submit_tasks_detached(&self, tasks: Vec<Task>) {
        self.enqueue(tasks);
    }

    fn enqueue(&self, tasks: impl IntoIterator<Item = Task>) {
        let mut state = self.lock_state();
        let before = state.ready.len();
        state.ready.extend(tasks);
        let added = state.ready.len() - before;
        drop(state);

        if added > 0 {
            debug!(queue = %self.config.name, added, "tasks submitted");
            self.work_available.notify_all();
        }
    }

    /// Worker entry point; call once per caller-owned thread.
    ///
    /// Runs slices until [`request_abort`](Self::request_abort) is observed.
    /// Sleeps on the queue's condition only when nothing is ready.
    pub fn run_worker(&self) {
        let span = tracing::debug_span!(
            "worker",
            queue = %self.config.name,
            thread = ?std::thread::current().id()
        );
        let _enter = span.enter();
        debug!("worker started");

        let mut slices: u64 = 0;
        while !self.is_aborted() {
            match self.pop_ready() {
                Some(task) => {
                    self.run_slice(task);
                    slices += 1;
                }
                None => self.wait_for_work(),
            }
        }

        debug!(slices, "worker stopped");
    }

    /// Runs ready slices on the calling thread until nothing is ready or
    /// abort is requested. Returns the number of slices run.
    ///
    /// Parked tasks stay parked; they return to the ready sequence (and get
    /// run by this call) only if their target reaches zero meanwhile.
    pub fn run_pending(&self) -> usize {
        let mut slices = 0;
        while !self.is_aborted() {
            let Some(task) = self.pop_ready() else {
                break;
            };
            self.run_slice(task);
            slices += 1;
        }
        slices
    }

    /// Stops workers after their in-flight slice.
    ///
    /// Parked and unfinished tasks are left in place; release them with
    /// [`drain`](Self::drain) or by dropping the queue.
    pub fn request_abort(&self) {
        info!(queue = %self.config.name, "abort requested");
        self.abort.store(true, Ordering::Release);
        // Notify under the lock: a worker checks the flag under it before sleeping.
        let _state = self.lock_state();
        self.work_available.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    fn pop_ready(&self) -> Option<Task> {
        self.lock_state().ready.pop_front()
    }

    fn wait_for_work(&self) {
        let mut state = self.lock_state();
        while state.ready.is_empty() && !self.is_aborted() {
            state = self
                .work_available
                .wait(state)
                .expect("task queue state poisoned");
        }
    }

    fn run_slice(&self, mut task: Task) {
        let span = tracing::trace_span!("slice", task = %task.id());
        let _enter = span.enter();

        if let Err(err) = task.run() {
            error!(error = %err, "task cannot run, retiring it");
            self.retire(task, Some(TaskFault::Failed(err.to_string())));
            return;
        }

        if task.is_complete() {
            let fault = task.take_fault();
            self.retire(task, fault);
        } else {
            self.reschedule(task);
        }
    }

    fn reschedule(&self, task: Task) {
        let mut state = self.lock_state();
        // Checked under the lock so a concurrent zero transition either is
        // seen here or finds the task in the parked set.
        match SleepingTask::park(task) {
            Ok(sleeper) => {
                trace!(remaining = sleeper.target().value(), "task parked");
                state.sleeping.push(sleeper);
            }
            Err(task) => {
                trace!("task yielded");
                state.ready.push_back(task);
                drop(state);
                self.work_available.notify_all();
            }
        }
    }

    fn retire(&self, mut task: Task, fault: Option<TaskFault>) {
        let id = task.id();
        let counter = task.take_counter();

        if let Some(fault) = fault {
            warn!(task = %id, fault = %fault, "task body faulted");
            if let Some(counter) = &counter {
                counter.record_fault(fault.clone());
            }
            self.notify_fault_handler(id, &fault);
        }
        drop(task);

        let Some(counter) = counter else {
            return;
        };
        if !counter.decrement_and_check() {
            return;
        }

        let mut state = self.lock_state();
        let (woken, still_sleeping): (Vec<_>, Vec<_>) = std::mem::take(&mut state.sleeping)
            .into_iter()
            .partition(|sleeper| sleeper.is_waiting_on(&counter));
        state.sleeping = still_sleeping;
        let woken_count = woken.len();
        state.ready.extend(woken.into_iter().map(SleepingTask::wake));
        drop(state);

        if woken_count > 0 {
            debug!(woken = woken_count, "counter reached zero, waking parked tasks");
            self.work_available.notify_all();
        }
    }

    // The hook is user code; a panic in it must not skip the decrement.
    fn notify_fault_handler(&self, task: TaskId, fault: &TaskFault) {
        let Some(handler) = &self.config.fault_handler else {
            return;
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.on_fault(task, fault)));
        if let Err(payload) = outcome {
            error!(
                task = %task,
                panic = %TaskFault::from_panic(payload),
                "fault handler panicked"
            );
        }
    }

    pub fn ready_len(&self) -> usize {
        self.lock_state().ready.len()
    }

    pub fn parked_len(&self) -> usize {
        self.lock_state().sleeping.len()
    }

    /// Removes every ready and parked task, releasing unfinished
    /// continuations. Their counters are left untouched. Returns how many
    /// tasks were removed.
    pub fn drain(&self) -> usize {
        let mut state = self.lock_state();
        let ready = std::mem::take(&mut state.ready);
        let sleeping = std::mem::take(&mut state.sleeping);
        drop(state);

        let released = ready.len() + sleeping.len();
        if released > 0 {
            info!(queue = %self.config.name, released, "drained unfinished tasks");
        }
        released
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        // No user code runs under this lock; poisoning means the queue's own
        // bookkeeping panicked.
        self.state.lock().expect("task queue state poisoned")
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let pending = state.ready.len() + state.sleeping.len();
        if pending > 0 {
            info!(queue = %self.config.name, pending, "dropping queue with unfinished tasks");
        }
    }
}

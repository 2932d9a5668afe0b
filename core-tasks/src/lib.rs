//! # Core Tasks
//!
//! Cooperative multitasking for a fixed pool of caller-owned OS threads:
//! - Resumable task bodies (continuations) started eagerly and stepped by hand
//! - Batch countdown counters that wake waiters when they reach zero
//! - A suspend gate that parks a task until a counter reaches zero
//! - A shared queue of ready and parked tasks driven by worker loops
//!
//! ## Overview
//!
//! A task body is an `async` block. Awaiting [`suspend_until`] inside it hands
//! control back to the worker thread; the task is parked against the counter
//! and resumed on some worker once the counter hits zero. Nothing here spawns
//! threads, times out, or preempts: a body runs until it awaits a gate or
//! returns.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use core_tasks::{suspend_until, TaskQueue};
//!
//! let queue = Arc::new(TaskQueue::new());
//! let workers: Vec<_> = (0..4)
//!     .map(|_| {
//!         let queue = queue.clone();
//!         thread::spawn(move || queue.run_worker())
//!     })
//!     .collect();
//!
//! let inner = queue.clone();
//! let root = queue.submit(move || async move {
//!     let leaves = inner.submit_many((0..16).map(|_| || async {}));
//!     suspend_until(&leaves).await;
//! });
//!
//! root.wait_for_zero();
//! queue.request_abort();
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! ```

pub mod config;
pub mod continuation;
pub mod counter;
pub mod error;
pub mod gate;
pub mod queue;
mod sleeping;
pub mod task;

pub use config::{FaultHandler, QueueConfig};
pub use continuation::{Continuation, IntoOutcome};
pub use counter::Counter;
pub use error::{Result, TaskError, TaskFault};
pub use gate::{suspend_until, SuspendGate};
pub use queue::TaskQueue;
pub use task::{Task, TaskId};

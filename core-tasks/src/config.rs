//! Queue configuration.
//!
//! ```rust
//! use std::sync::Arc;
//! use core_tasks::{QueueConfig, TaskFault, TaskId, TaskQueue};
//!
//! let config = QueueConfig::default()
//!     .with_name("frame")
//!     .with_ready_capacity(256)
//!     .with_fault_handler(Arc::new(|task: TaskId, fault: &TaskFault| {
//!         eprintln!("{task} faulted: {fault}");
//!     }));
//!
//! let queue = TaskQueue::with_config(config).expect("valid config");
//! assert_eq!(queue.config().name, "frame");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TaskError, TaskFault};
use crate::task::TaskId;

/// Upper bound for the preallocated capacity of either collection.
pub const MAX_CAPACITY: usize = 1 << 20;

/// Hook invoked for every task that finishes with a fault, including
/// detached tasks that have no batch counter.
///
/// Runs on the worker thread that retired the task, outside the queue lock.
pub trait FaultHandler: Send + Sync {
    fn on_fault(&self, task: TaskId, fault: &TaskFault);
}

impl<F> FaultHandler for F
where
    F: Fn(TaskId, &TaskFault) + Send + Sync,
{
    fn on_fault(&self, task: TaskId, fault: &TaskFault) {
        self(task, fault)
    }
}

#[derive(Clone)]
pub struct QueueConfig {
    /// Label attached to worker log spans
    pub name: String,
    /// Initial capacity of the ready sequence
    pub ready_capacity: usize,
    /// Initial capacity of the parked set
    pub parked_capacity: usize,
    /// Optional process-wide fault hook
    pub fault_handler: Option<Arc<dyn FaultHandler>>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "tasks".to_string(),
            ready_capacity: 64,
            parked_capacity: 16,
            fault_handler: None,
        }
    }
}

impl QueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_ready_capacity(mut self, capacity: usize) -> Self {
        self.ready_capacity = capacity;
        self
    }

    pub fn with_parked_capacity(mut self, capacity: usize) -> Self {
        self.parked_capacity = capacity;
        self
    }

    pub fn with_fault_handler(mut self, handler: Arc<dyn FaultHandler>) -> Self {
        self.fault_handler = Some(handler);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TaskError::Config("Queue name cannot be empty".to_string()));
        }

        if self.ready_capacity > MAX_CAPACITY {
            return Err(TaskError::Config(format!(
                "Ready capacity {} exceeds maximum of {}",
                self.ready_capacity, MAX_CAPACITY
            )));
        }

        if self.parked_capacity > MAX_CAPACITY {
            return Err(TaskError::Config(format!(
                "Parked capacity {} exceeds maximum of {}",
                self.parked_capacity, MAX_CAPACITY
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for QueueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueConfig")
            .field("name", &self.name)
            .field("ready_capacity", &self.ready_capacity)
            .field("parked_capacity", &self.parked_capacity)
            .field(
                "fault_handler",
                &self.fault_handler.as_ref().map(|_| "FaultHandler { ... }"),
            )
            .finish()
    }
}

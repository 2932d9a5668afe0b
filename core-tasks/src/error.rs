use std::any::Any;

use thiserror::Error;

/// A fault raised inside a task body.
///
/// Captured at the continuation boundary and attached to the task's batch
/// [`Counter`](crate::Counter) instead of being dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFault {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task failed: {0}")]
    Failed(String),
}

impl TaskFault {
    /// Builds a `Panicked` fault from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::Panicked(message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("continuation is not valid (released, taken, or never started)")]
    InvalidContinuation,

    #[error("continuation already ran to completion")]
    AlreadyComplete,

    #[error("task has neither a start function nor a live continuation")]
    InvalidTask,

    #[error("{failed} task(s) in batch faulted, first: {first}")]
    BatchFaulted { failed: usize, first: TaskFault },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payload_str_and_string() {
        let fault = TaskFault::from_panic(Box::new("boom"));
        assert_eq!(fault, TaskFault::Panicked("boom".to_string()));

        let fault = TaskFault::from_panic(Box::new(String::from("bang")));
        assert_eq!(fault, TaskFault::Panicked("bang".to_string()));

        let fault = TaskFault::from_panic(Box::new(17u32));
        assert_eq!(fault, TaskFault::Panicked("unknown panic".to_string()));
    }

    #[test]
    fn batch_fault_message_names_first_fault() {
        let err = TaskError::BatchFaulted {
            failed: 2,
            first: TaskFault::Failed("disk full".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "2 task(s) in batch faulted, first: task failed: disk full"
        );
    }
}

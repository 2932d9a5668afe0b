//! Workspace placeholder crate.
//!
//! Re-exports the task queue from `core-tasks` so host applications can depend
//! on `ctl-workspace` alone. The default `runtime` feature also exposes
//! `core-runtime` (logging and configuration helpers).

pub use core_tasks::*;

#[cfg(feature = "runtime")]
pub use core_runtime;

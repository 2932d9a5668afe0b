//! # Core Runtime Module
//!
//! Provides the ambient runtime infrastructure around `core-tasks`:
//! - Logging and tracing infrastructure
//! - Configuration management (builder and JSON settings)
//! - Queue start-up
//!
//! ## Overview
//!
//! This crate contains the runtime utilities a host uses to bring up a task
//! queue. It establishes the logging conventions and configuration layer;
//! the scheduling itself lives in `core-tasks`.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{RuntimeConfig, RuntimeConfigBuilder, RuntimeSettings};
pub use error::{Error, Result};

//! # Runtime Configuration
//!
//! Builds the settings a host needs to bring up a task queue: the queue's
//! own [`QueueConfig`] plus logging.
//!
//! ## Overview
//!
//! [`RuntimeConfig`] is assembled through [`RuntimeConfigBuilder`] and
//! validated on `build()`. Hosts that keep settings in a file can describe
//! the plain-data part as JSON ([`RuntimeSettings`]) and load it with
//! [`RuntimeConfig::from_json`]. Hooks such as the fault handler or a log
//! sink cannot be expressed in JSON and are attached through the builder.
//!
//! Worker threads are always owned by the caller; [`RuntimeConfig::start`]
//! only returns the shared queue.
//!
//! ## Usage
//!
//! ```rust
//! use std::thread;
//! use core_runtime::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::builder()
//!     .queue_name("frame")
//!     .ready_capacity(128)
//!     .enable_logging(false)
//!     .build()
//!     .expect("Failed to build config");
//!
//! let queue = config.start().expect("Failed to start runtime");
//! let worker = {
//!     let queue = queue.clone();
//!     thread::spawn(move || queue.run_worker())
//! };
//!
//! queue.submit(|| async {}).wait_for_zero();
//! queue.request_abort();
//! worker.join().unwrap();
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::RuntimeConfig;
//!
//! // An empty queue name is rejected
//! let config = RuntimeConfig::builder()
//!     .queue_name("")
//!     .build()
//!     .expect("Should fail - empty queue name");
//! ```

use crate::error::{Error, Result};
use crate::logging::{init_logging, LogFormat, LogLevel, LoggerSink, LoggingConfig};
use core_tasks::{FaultHandler, QueueConfig, TaskQueue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything needed to start a task queue.
///
/// Use [`RuntimeConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Queue name, capacities and fault hook
    pub queue: QueueConfig,

    /// Subscriber settings applied by `start()` when logging is enabled
    pub logging: LoggingConfig,

    /// Install the global tracing subscriber on `start()`
    pub enable_logging: bool,
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Parses [`RuntimeSettings`] from JSON and builds a validated config.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: RuntimeSettings = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid runtime settings: {}", e)))?;
        settings.into_builder().build()
    }

    pub fn validate(&self) -> Result<()> {
        self.queue
            .validate()
            .map_err(|e| Error::Config(format!("Invalid queue settings: {}", e)))
    }

    /// Installs logging (when enabled) and creates the shared queue.
    ///
    /// Callers spawn their own worker threads and call
    /// [`TaskQueue::run_worker`] on each.
    ///
    /// # Errors
    ///
    /// Fails if logging is enabled and a global subscriber is already
    /// installed, or if the queue configuration is invalid.
    pub fn start(&self) -> Result<Arc<TaskQueue>> {
        if self.enable_logging {
            init_logging(self.logging.clone())?;
        }

        let queue = TaskQueue::with_config(self.queue.clone())?;
        tracing::info!(
            queue = %self.queue.name,
            ready_capacity = self.queue.ready_capacity,
            parked_capacity = self.queue.parked_capacity,
            "task queue started"
        );
        Ok(Arc::new(queue))
    }
}

/// Plain-data form of [`RuntimeConfig`], suitable for settings files.
///
/// Every field is optional in JSON; missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSettings {
    pub queue: QueueSettings,
    pub logging: LoggingSettings,
    pub enable_logging: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSettings {
    pub name: Option<String>,
    pub ready_capacity: Option<usize>,
    pub parked_capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub format: Option<LogFormat>,
    pub level: Option<LogLevel>,
    pub filter: Option<String>,
    pub spans: Option<bool>,
    pub thread_info: Option<bool>,
}

impl RuntimeSettings {
    /// Seeds a builder with these settings so hooks can be added before
    /// `build()`.
    pub fn into_builder(self) -> RuntimeConfigBuilder {
        let mut queue = QueueConfig::default();
        if let Some(name) = self.queue.name {
            queue = queue.with_name(name);
        }
        if let Some(capacity) = self.queue.ready_capacity {
            queue = queue.with_ready_capacity(capacity);
        }
        if let Some(capacity) = self.queue.parked_capacity {
            queue = queue.with_parked_capacity(capacity);
        }

        let mut logging = LoggingConfig::default();
        if let Some(format) = self.logging.format {
            logging = logging.with_format(format);
        }
        if let Some(level) = self.logging.level {
            logging = logging.with_level(level);
        }
        if let Some(filter) = self.logging.filter {
            logging = logging.with_filter(filter);
        }
        if let Some(spans) = self.logging.spans {
            logging = logging.with_spans(spans);
        }
        if let Some(thread_info) = self.logging.thread_info {
            logging = logging.with_thread_info(thread_info);
        }

        RuntimeConfigBuilder {
            queue,
            logging,
            enable_logging: self.enable_logging,
        }
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    queue: QueueConfig,
    logging: LoggingConfig,
    enable_logging: Option<bool>,
}

impl RuntimeConfigBuilder {
    /// Sets the label attached to worker log spans.
    pub fn queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue = self.queue.with_name(name);
        self
    }

    pub fn ready_capacity(mut self, capacity: usize) -> Self {
        self.queue = self.queue.with_ready_capacity(capacity);
        self
    }

    pub fn parked_capacity(mut self, capacity: usize) -> Self {
        self.queue = self.queue.with_parked_capacity(capacity);
        self
    }

    /// Sets the hook invoked for every task that finishes with a fault.
    pub fn fault_handler(mut self, handler: Arc<dyn FaultHandler>) -> Self {
        self.queue = self.queue.with_fault_handler(handler);
        self
    }

    /// Replaces the whole queue configuration.
    pub fn queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Replaces the whole logging configuration.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.logging = self.logging.with_level(level);
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.logging = self.logging.with_format(format);
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.logging = self.logging.with_filter(filter);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logging = self.logging.with_logger_sink(sink);
        self
    }

    /// Whether `start()` installs the global subscriber. Defaults to `true`.
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = Some(enabled);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the queue settings are out of range.
    pub fn build(self) -> Result<RuntimeConfig> {
        let config = RuntimeConfig {
            queue: self.queue,
            logging: self.logging,
            enable_logging: self.enable_logging.unwrap_or(true),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_tasks::{TaskFault, TaskId};

    #[test]
    fn test_builder_defaults() {
        let config = RuntimeConfig::builder().build().unwrap();
        assert_eq!(config.queue.name, "tasks");
        assert_eq!(config.queue.ready_capacity, 64);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.enable_logging);
    }

    #[test]
    fn test_builder_sets_queue_and_logging() {
        let config = RuntimeConfig::builder()
            .queue_name("render")
            .ready_capacity(512)
            .parked_capacity(32)
            .fault_handler(Arc::new(|_: TaskId, _: &TaskFault| {}))
            .log_level(LogLevel::Trace)
            .log_format(LogFormat::Compact)
            .log_filter("core_tasks=trace")
            .enable_logging(false)
            .build()
            .unwrap();

        assert_eq!(config.queue.name, "render");
        assert_eq!(config.queue.ready_capacity, 512);
        assert_eq!(config.queue.parked_capacity, 32);
        assert!(config.queue.fault_handler.is_some());
        assert_eq!(config.logging.level, LogLevel::Trace);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.logging.filter.as_deref(), Some("core_tasks=trace"));
        assert!(!config.enable_logging);
    }

    #[test]
    fn test_build_rejects_invalid_queue() {
        let err = RuntimeConfig::builder()
            .ready_capacity(core_tasks::config::MAX_CAPACITY + 1)
            .build()
            .unwrap_err();
        match err {
            Error::Config(message) => assert!(message.contains("Ready capacity")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_json_full() {
        let config = RuntimeConfig::from_json(
            r#"{
                "queue": { "name": "io", "ready_capacity": 8, "parked_capacity": 2 },
                "logging": { "format": "json", "level": "debug", "filter": "core_tasks=trace", "thread_info": true },
                "enable_logging": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.queue.name, "io");
        assert_eq!(config.queue.ready_capacity, 8);
        assert_eq!(config.queue.parked_capacity, 2);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filter.as_deref(), Some("core_tasks=trace"));
        assert!(config.logging.display_thread_info);
        assert!(!config.enable_logging);
    }

    #[test]
    fn test_from_json_empty_object_uses_defaults() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config.queue.name, "tasks");
        assert!(config.enable_logging);
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let err = RuntimeConfig::from_json(r#"{ "queue": { "workers": 4 } }"#).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.starts_with("Invalid runtime settings")));
    }

    #[test]
    fn test_from_json_rejects_invalid_values() {
        assert!(RuntimeConfig::from_json(r#"{ "queue": { "name": "" } }"#).is_err());
        assert!(RuntimeConfig::from_json(r#"{ "logging": { "level": "loud" } }"#).is_err());
    }

    #[test]
    fn test_settings_round_trip_through_serde() {
        let settings = RuntimeSettings {
            queue: QueueSettings {
                name: Some("frame".to_string()),
                ..Default::default()
            },
            logging: LoggingSettings {
                level: Some(LogLevel::Warn),
                ..Default::default()
            },
            enable_logging: Some(false),
        };

        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains(r#""level":"warn""#));
        let parsed: RuntimeSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_start_without_logging_returns_queue() {
        let config = RuntimeConfig::builder()
            .queue_name("unit")
            .enable_logging(false)
            .build()
            .unwrap();

        let queue = config.start().unwrap();
        assert_eq!(queue.config().name, "unit");

        let done = queue.submit(|| async {});
        assert_eq!(queue.run_pending(), 1);
        assert!(done.is_zero());
    }
}

use core_tasks::TaskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

pub type Result<T> = std::result::Result<T, Error>;

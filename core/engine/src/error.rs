//! FILENAME: core/engine/src/error.rs

use std::time::Duration;

use thiserror::Error;

use crate::job::JobId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipeError {
    /// The consumer stopped draining and the pipe stayed full past the wait limit.
    #[error("Pipe stalled: no room freed after waiting {waited:?} (capacity {capacity})")]
    Stalled { waited: Duration, capacity: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} status unavailable: {reason}")]
    StatusUnavailable { id: JobId, reason: String },
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Unknown field '{field}' in table '{table}'")]
    UnknownField { table: String, field: String },

    #[error("Invalid criteria on '{field}': {message}")]
    InvalidCriteria { field: String, message: String },

    #[error(transparent)]
    Pipe(#[from] PipeError),

    #[error("Query failed: {0}")]
    Execution(String),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output format error: {0}")]
    Format(String),

    #[error("Writer used out of order: {0}")]
    State(String),
}

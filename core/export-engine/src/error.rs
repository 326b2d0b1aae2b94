//! FILENAME: core/export-engine/src/error.rs

use std::time::Duration;

use engine::{JobId, PipeError, QueryError, WriteError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    /// Bad request: unknown fields or output limits exceeded. Safe to show verbatim.
    #[error("{0}")]
    Validation(String),

    #[error("Export stalled: no rows received for {idle:?} (threshold {threshold:?})")]
    Stall { idle: Duration, threshold: Duration },

    #[error("Lost track of export job {job}: {reason}")]
    JobLost { job: JobId, reason: String },

    #[error("Export job {job} failed: {message}")]
    ProducerFailed { job: JobId, message: String },

    #[error("Export query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Export output failed: {0}")]
    Write(#[from] WriteError),

    #[error(transparent)]
    Pipe(#[from] PipeError),

    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    pub fn is_user_facing(&self) -> bool {
        matches!(self, ExportError::Validation(_))
    }

    /// Message for end users: validation errors verbatim, anything else generic.
    pub fn user_message(&self) -> String {
        match self {
            ExportError::Validation(message) => message.clone(),
            ExportError::Cancelled => "The export was cancelled.".to_string(),
            _ => "The export failed because of an internal error.".to_string(),
        }
    }
}

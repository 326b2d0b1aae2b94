//! FILENAME: core/persistence/src/error.rs

use engine::WriteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XLSX write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON write error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Writer used out of order: {0}")]
    OutOfOrder(String),
}

impl From<PersistenceError> for WriteError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::Io(io) => WriteError::Io(io),
            PersistenceError::OutOfOrder(message) => WriteError::State(message),
            other => WriteError::Format(other.to_string()),
        }
    }
}

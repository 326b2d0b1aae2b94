//! FILENAME: core/pivot-engine/src/error.rs

use engine::{PipeError, QueryError, WriteError};
use parser::FormulaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid report definition: {0}")]
    Definition(String),

    #[error("Report query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Column '{column}' of view '{view}' failed: {source}")]
    Formula {
        view: String,
        column: String,
        #[source]
        source: FormulaError,
    },

    #[error(transparent)]
    Pipe(#[from] PipeError),

    #[error("Report output failed: {0}")]
    Write(#[from] WriteError),
}
